//! One generation of individuals, the cumulative best, and the mating pool.

use std::sync::Arc;

use super::genome::GeneRng;
use super::individual::Individual;
use crate::compute::comparator::CompareError;

/// Replication weight of the individual at ascending 0-based `rank`.
///
/// `round((rank + 1)^2 / population_size)`, halves rounding up. The fittest
/// individual always gets a weight of `population_size`, so the pool is
/// never empty for a non-empty generation. Low ranks may round to zero.
pub fn mating_weight(rank: usize, population_size: usize) -> usize {
    let squared = (rank + 1) * (rank + 1);
    (2 * squared + population_size) / (2 * population_size)
}

/// Current generation plus derived selection state.
#[derive(Debug)]
pub struct Population<P> {
    individuals: Vec<Arc<Individual<P>>>,
    fittest: Option<Arc<Individual<P>>>,
    /// Indices into `individuals`, repeated by mating weight.
    mating_pool: Vec<usize>,
}

impl<P> Default for Population<P> {
    fn default() -> Self {
        Self {
            individuals: Vec::new(),
            fittest: None,
            mating_pool: Vec::new(),
        }
    }
}

impl<P> Population<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate and install a new generation.
    ///
    /// Every individual is evaluated before anything is replaced; if one
    /// evaluation fails, the population is left exactly as it was.
    pub fn update(
        &mut self,
        mut new_individuals: Vec<Individual<P>>,
        phenotype_function: &(dyn Fn(&[f64]) -> P + Send + Sync),
        fitness_function: &(dyn Fn(&P) -> Result<f64, CompareError> + Send + Sync),
        decimal_places: u32,
    ) -> Result<(), CompareError> {
        for individual in &mut new_individuals {
            individual.update(phenotype_function, fitness_function, decimal_places)?;
        }
        let individuals: Vec<Arc<Individual<P>>> =
            new_individuals.into_iter().map(Arc::new).collect();

        // Cumulative best, strict improvement only
        let mut fittest = self.fittest.take();
        for individual in &individuals {
            let improves = match &fittest {
                None => true,
                Some(best) => individual.fitter_than(best),
            };
            if improves {
                fittest = Some(Arc::clone(individual));
            }
        }

        // Rank ascending by fitness; ties keep generation order
        let mut ranked: Vec<usize> = (0..individuals.len()).collect();
        ranked.sort_by(|&a, &b| {
            let fa = individuals[a].fitness().unwrap_or(f64::NEG_INFINITY);
            let fb = individuals[b].fitness().unwrap_or(f64::NEG_INFINITY);
            fa.total_cmp(&fb)
        });

        let n = individuals.len();
        let mut mating_pool = Vec::new();
        for (rank, &idx) in ranked.iter().enumerate() {
            let weight = mating_weight(rank, n);
            mating_pool.extend(std::iter::repeat_n(idx, weight));
        }

        self.individuals = individuals;
        self.fittest = fittest;
        self.mating_pool = mating_pool;
        Ok(())
    }

    /// Two parents drawn independently and uniformly from the mating pool.
    ///
    /// The same individual may be drawn twice. `None` if the pool is empty.
    pub fn random_parents(&self, rng: &mut GeneRng) -> Option<(&Individual<P>, &Individual<P>)> {
        if self.mating_pool.is_empty() {
            return None;
        }
        let first = self.mating_pool[rng.index(self.mating_pool.len())];
        let second = self.mating_pool[rng.index(self.mating_pool.len())];
        Some((&self.individuals[first], &self.individuals[second]))
    }

    /// A uniformly chosen member of the current generation.
    pub fn random_individual(&self, rng: &mut GeneRng) -> Option<&Individual<P>> {
        if self.individuals.is_empty() {
            return None;
        }
        Some(&self.individuals[rng.index(self.individuals.len())])
    }

    /// Best individual seen across all generations so far.
    pub fn fittest(&self) -> Option<&Individual<P>> {
        self.fittest.as_deref()
    }

    pub fn individuals(&self) -> impl Iterator<Item = &Individual<P>> {
        self.individuals.iter().map(|ind| ind.as_ref())
    }

    /// Mating pool entries, each individual repeated by its weight.
    pub fn mating_pool(&self) -> impl Iterator<Item = &Individual<P>> {
        self.mating_pool
            .iter()
            .map(|&idx| self.individuals[idx].as_ref())
    }

    pub fn mating_pool_len(&self) -> usize {
        self.mating_pool.len()
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Mean fitness of the current generation.
    pub fn mean_fitness(&self) -> Option<f64> {
        let scores: Vec<f64> = self.individuals.iter().filter_map(|i| i.fitness()).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
