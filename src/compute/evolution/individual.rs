//! A single candidate solution.

use super::genome::GeneRng;
use crate::compute::comparator::CompareError;

/// Maps a gene vector to its phenotype. Must be pure and total.
pub type PhenotypeFunction<P> = Box<dyn Fn(&[f64]) -> P + Send + Sync>;

/// Scores a phenotype in `[0, 1]`. Must be pure.
pub type FitnessFunction<P> = Box<dyn Fn(&P) -> Result<f64, CompareError> + Send + Sync>;

/// Round to a fixed number of decimal places, half away from zero.
///
/// Keeps floating-point noise from registering as improvement.
pub fn round_fitness(score: f64, decimal_places: u32) -> f64 {
    let factor = 10f64.powi(decimal_places as i32);
    (score * factor).round() / factor
}

/// A gene vector with its cached phenotype and fitness.
///
/// Genes never change after construction; reproduction always creates a new
/// individual.
#[derive(Debug, Clone)]
pub struct Individual<P> {
    genes: Vec<f64>,
    phenotype: Option<P>,
    fitness: Option<f64>,
}

impl<P> Individual<P> {
    /// Wrap genes. Phenotype and fitness stay unset until `update`.
    pub fn new(genes: Vec<f64>) -> Self {
        Self {
            genes,
            phenotype: None,
            fitness: None,
        }
    }

    /// Individual with `genome_size` uniform random genes in `[0, 1)`.
    pub fn randomize(genome_size: usize, rng: &mut GeneRng) -> Self {
        Self::new(rng.random_genes(genome_size))
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub fn phenotype(&self) -> Option<&P> {
        self.phenotype.as_ref()
    }

    /// Rounded fitness, or `None` before the first `update`.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Recompute phenotype, then fitness rounded to `decimal_places`.
    ///
    /// A NaN or infinite score is an error. On error the cached phenotype
    /// and fitness are left unchanged.
    pub fn update(
        &mut self,
        phenotype_function: &(dyn Fn(&[f64]) -> P + Send + Sync),
        fitness_function: &(dyn Fn(&P) -> Result<f64, CompareError> + Send + Sync),
        decimal_places: u32,
    ) -> Result<(), CompareError> {
        let phenotype = phenotype_function(&self.genes);
        let score = fitness_function(&phenotype)?;
        if !score.is_finite() {
            return Err(CompareError::NonFiniteScore(score));
        }
        self.phenotype = Some(phenotype);
        self.fitness = Some(round_fitness(score, decimal_places));
        Ok(())
    }

    /// Strictly fitter than `other`.
    ///
    /// Both individuals must have been evaluated; an unevaluated side is
    /// never fitter.
    pub fn fitter_than(&self, other: &Individual<P>) -> bool {
        debug_assert!(
            self.fitness.is_some() && other.fitness.is_some(),
            "fitter_than called on an unevaluated individual"
        );
        match (self.fitness, other.fitness) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }

    /// Single-point crossover with `other`, then at most one mutated gene.
    ///
    /// Genes after the cut come from `self`, the rest from `other`.
    pub fn breed_with(
        &self,
        other: &Individual<P>,
        mutation_rate: f64,
        rng: &mut GeneRng,
    ) -> Individual<P> {
        let (mut genes, _cut) = rng.crossover(&self.genes, &other.genes);
        rng.mutate(&mut genes, mutation_rate);
        Individual::new(genes)
    }
}
