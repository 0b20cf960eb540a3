//! The generational search driver.
//!
//! An `Evolver` moves through `Uninitialized -> Running -> Finished`. The host
//! calls `initialize` once and then `evolve` once per tick until `finished`
//! reports true. Every call leaves the evolver in a consistent state, so the
//! host may stop at any generation boundary.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::compute::comparator::CompareError;
use crate::schema::{ConfigError, EvolutionProgress, EvolverConfig, EvolverPhase, RunStats};

use super::genome::GeneRng;
use super::individual::{FitnessFunction, Individual, PhenotypeFunction};
use super::population::Population;

/// Errors raised by the evolver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvolveError {
    #[error("Evolver::evolve() called before the evolver was initialized")]
    NotInitialized,
    #[error("No phenotype function set before initialization")]
    MissingPhenotypeFunction,
    #[error("No fitness function set before initialization")]
    MissingFitnessFunction,
    #[error("Genome size must be non-zero")]
    InvalidGenomeSize,
    #[error("Mating pool is empty")]
    EmptyMatingPool,
    #[error("Invalid evolver configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Fitness evaluation failed: {0}")]
    Fitness(#[from] CompareError),
}

/// Per-run bookkeeping, advanced once per generation.
#[derive(Debug, Clone)]
pub struct EvolverState {
    generation_number: usize,
    stagnant_count: usize,
    high_score: Option<f64>,
    max_gens: usize,
    fitness_changed: bool,
    start_time: Instant,
    end_time: Option<Instant>,
}

impl EvolverState {
    /// State for a run whose initial population scored `high_score`.
    pub fn new(max_gens: usize, high_score: Option<f64>) -> Self {
        Self {
            generation_number: 0,
            stagnant_count: 0,
            high_score,
            max_gens,
            fitness_changed: true,
            start_time: Instant::now(),
            end_time: None,
        }
    }

    /// Record a completed generation whose cumulative best is `best`.
    ///
    /// Returns true on strict improvement of the high score.
    pub fn advance(&mut self, best: Option<f64>) -> bool {
        self.generation_number += 1;
        let improved = match (best, self.high_score) {
            (Some(new), Some(old)) => new > old,
            (Some(_), None) => true,
            (None, _) => false,
        };
        self.fitness_changed = improved;
        if improved {
            self.high_score = best;
            self.stagnant_count = 0;
        } else {
            self.stagnant_count += 1;
        }
        improved
    }

    /// Latch the end time. Later calls keep the first value.
    pub fn end(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Instant::now());
        }
    }

    pub fn finished(&self) -> bool {
        self.stagnant_count >= self.max_gens && self.generation_number > 0
    }

    pub fn is_first_gen(&self) -> bool {
        self.generation_number == 1
    }

    pub fn generation_number(&self) -> usize {
        self.generation_number
    }

    pub fn stagnant_count(&self) -> usize {
        self.stagnant_count
    }

    pub fn high_score(&self) -> Option<f64> {
        self.high_score
    }

    pub fn max_gens(&self) -> usize {
        self.max_gens
    }

    pub fn fitness_changed(&self) -> bool {
        self.fitness_changed
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.end_time
    }

    /// Wall time of the run, frozen once the run has ended.
    pub fn elapsed(&self) -> Duration {
        self.end_time
            .unwrap_or_else(Instant::now)
            .duration_since(self.start_time)
    }
}

/// Generational genetic search over gene vectors in `[0, 1)`.
pub struct Evolver<P> {
    config: EvolverConfig,
    rng: GeneRng,
    phenotype_function: Option<PhenotypeFunction<P>>,
    fitness_function: Option<FitnessFunction<P>>,
    population: Population<P>,
    state: Option<EvolverState>,
    genome_size: usize,
}

impl<P> Evolver<P> {
    /// Create an evolver. The RNG is seeded from `config.random_seed` when set.
    pub fn new(config: EvolverConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => GeneRng::new(seed),
            None => GeneRng::random(),
        };
        Self {
            config,
            rng,
            phenotype_function: None,
            fitness_function: None,
            population: Population::new(),
            state: None,
            genome_size: 0,
        }
    }

    /// Set the function mapping genes to phenotypes.
    pub fn set_phenotype_function<F>(&mut self, f: F)
    where
        F: Fn(&[f64]) -> P + Send + Sync + 'static,
    {
        self.phenotype_function = Some(Box::new(f));
    }

    /// Set the function scoring phenotypes.
    pub fn set_fitness_function<F>(&mut self, f: F)
    where
        F: Fn(&P) -> Result<f64, CompareError> + Send + Sync + 'static,
    {
        self.fitness_function = Some(Box::new(f));
    }

    pub fn with_phenotype_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&[f64]) -> P + Send + Sync + 'static,
    {
        self.set_phenotype_function(f);
        self
    }

    pub fn with_fitness_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&P) -> Result<f64, CompareError> + Send + Sync + 'static,
    {
        self.set_fitness_function(f);
        self
    }

    pub fn config(&self) -> &EvolverConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Create and evaluate a random population for `genome_size` genes.
    ///
    /// Does nothing if already initialized. On error the evolver stays
    /// uninitialized.
    pub fn initialize(&mut self, genome_size: usize) -> Result<(), EvolveError> {
        if self.is_initialized() {
            return Ok(());
        }
        self.config.validate()?;
        let phenotype_function = self
            .phenotype_function
            .as_deref()
            .ok_or(EvolveError::MissingPhenotypeFunction)?;
        let fitness_function = self
            .fitness_function
            .as_deref()
            .ok_or(EvolveError::MissingFitnessFunction)?;
        if genome_size == 0 {
            return Err(EvolveError::InvalidGenomeSize);
        }
        let population_size = self.config.population_size_for(genome_size);
        if population_size == 0 {
            return Err(ConfigError::PopulationTooSmall.into());
        }

        let individuals: Vec<Individual<P>> = (0..population_size)
            .map(|_| Individual::randomize(genome_size, &mut self.rng))
            .collect();
        self.population.update(
            individuals,
            phenotype_function,
            fitness_function,
            self.config.fitness_decimal_places,
        )?;

        let high_score = self.population.fittest().and_then(Individual::fitness);
        self.state = Some(EvolverState::new(
            self.config.max_stagnant_generations,
            high_score,
        ));
        self.genome_size = genome_size;

        info!(
            "Initialized population of {} individuals with {} genes (initial fitness {})",
            population_size,
            genome_size,
            format_score(high_score)
        );
        Ok(())
    }

    /// Breed and evaluate one generation.
    ///
    /// Fails if called before `initialize`. Does nothing once finished. If
    /// evaluation fails, the previous generation and state are kept.
    pub fn evolve(&mut self) -> Result<(), EvolveError> {
        let finished = self
            .state
            .as_ref()
            .ok_or(EvolveError::NotInitialized)?
            .finished();
        if finished {
            return Ok(());
        }
        let (Some(phenotype_function), Some(fitness_function)) = (
            self.phenotype_function.as_deref(),
            self.fitness_function.as_deref(),
        ) else {
            return Err(EvolveError::NotInitialized);
        };

        let mut children = Vec::with_capacity(self.population.len());
        for _ in 0..self.population.len() {
            let (a, b) = self
                .population
                .random_parents(&mut self.rng)
                .ok_or(EvolveError::EmptyMatingPool)?;
            children.push(a.breed_with(b, self.config.mutation_rate, &mut self.rng));
        }
        self.population.update(
            children,
            phenotype_function,
            fitness_function,
            self.config.fitness_decimal_places,
        )?;

        let best = self.population.fittest().and_then(Individual::fitness);
        let update_interval = self.config.update_interval.max(1);
        let Some(state) = self.state.as_mut() else {
            return Err(EvolveError::NotInitialized);
        };
        state.advance(best);

        let msg = format!(
            "Generation={:04} Fitness={}",
            state.generation_number(),
            format_score(state.high_score())
        );
        if state.is_first_gen() || state.generation_number() % update_interval == 0 {
            debug!("Current state: {msg}");
        }
        if state.fitness_changed() {
            info!("Fitter solution found [{msg}]...");
        }
        if state.finished() {
            state.end();
            info!(
                "No fitter solution found after {} unchanged generations. Stopping search.",
                state.stagnant_count()
            );
        }
        Ok(())
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> EvolverPhase {
        match &self.state {
            None => EvolverPhase::Uninitialized,
            Some(state) if state.finished() => EvolverPhase::Finished,
            Some(_) => EvolverPhase::Running,
        }
    }

    pub fn finished(&self) -> bool {
        self.state.as_ref().is_some_and(EvolverState::finished)
    }

    /// Best individual seen so far across all generations.
    pub fn fittest(&self) -> Option<&Individual<P>> {
        self.population.fittest()
    }

    pub fn fittest_phenotype(&self) -> Option<&P> {
        self.fittest().and_then(Individual::phenotype)
    }

    /// Phenotype of a random member of the current generation.
    pub fn random_phenotype(&mut self) -> Option<&P> {
        self.population
            .random_individual(&mut self.rng)
            .and_then(Individual::phenotype)
    }

    pub fn high_score(&self) -> Option<f64> {
        self.state.as_ref().and_then(EvolverState::high_score)
    }

    pub fn fitness_changed(&self) -> bool {
        self.state.as_ref().is_some_and(EvolverState::fitness_changed)
    }

    pub fn generation_number(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, EvolverState::generation_number)
    }

    pub fn state(&self) -> Option<&EvolverState> {
        self.state.as_ref()
    }

    pub fn population(&self) -> &Population<P> {
        &self.population
    }

    pub fn genome_size(&self) -> usize {
        self.genome_size
    }

    /// Current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let state = self.state.as_ref();
        EvolutionProgress {
            generation: self.generation_number(),
            high_score: self.high_score(),
            mean_fitness: self.population.mean_fitness(),
            stagnant_count: state.map_or(0, EvolverState::stagnant_count),
            max_stagnant_generations: self.config.max_stagnant_generations,
            fitness_changed: self.fitness_changed(),
            population_size: self.population.len(),
            mating_pool_size: self.population.mating_pool_len(),
            elapsed_seconds: state.map_or(0.0, |s| s.elapsed().as_secs_f64()),
            phase: self.phase(),
        }
    }

    /// Statistics for the run so far.
    pub fn stats(&self) -> RunStats {
        let generations = self.generation_number();
        let evaluations = if self.is_initialized() {
            (generations as u64 + 1) * self.population.len() as u64
        } else {
            0
        };
        RunStats {
            generations,
            total_evaluations: evaluations,
            best_fitness: self.high_score(),
            population_size: self.population.len(),
            genome_size: self.genome_size,
            elapsed_seconds: self
                .state
                .as_ref()
                .map_or(0.0, |s| s.elapsed().as_secs_f64()),
        }
    }

    /// Initialize, then evolve until finished, reporting after every
    /// generation.
    pub fn run_with_callback<F>(
        &mut self,
        genome_size: usize,
        mut callback: F,
    ) -> Result<RunStats, EvolveError>
    where
        F: FnMut(&EvolutionProgress),
    {
        self.initialize(genome_size)?;
        callback(&self.progress());

        while !self.finished() {
            self.evolve()?;
            callback(&self.progress());
        }

        Ok(self.stats())
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "none".to_string(), |s| s.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::compute::{ImageComparator, PartsCatalog, Raster, Renderer};
    use crate::schema::{ComparatorConfig, PreprocessMode, RenderConfig};

    fn test_config(max_gens: usize) -> EvolverConfig {
        EvolverConfig {
            max_stagnant_generations: max_gens,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    /// Phenotype is the gene mean; fitness is the phenotype itself.
    fn mean_evolver(config: EvolverConfig) -> Evolver<f64> {
        Evolver::new(config)
            .with_phenotype_function(|genes: &[f64]| genes.iter().sum::<f64>() / genes.len() as f64)
            .with_fitness_function(|p: &f64| Ok(*p))
    }

    fn constant_evolver(config: EvolverConfig) -> Evolver<f64> {
        Evolver::new(config)
            .with_phenotype_function(|genes: &[f64]| genes[0])
            .with_fitness_function(|_: &f64| Ok(0.5))
    }

    #[test]
    fn test_end_to_end_scenario() {
        let max_gens = 5;
        let mut evolver = constant_evolver(test_config(max_gens));
        assert_eq!(evolver.phase(), EvolverPhase::Uninitialized);

        evolver.initialize(10).unwrap();
        assert_eq!(evolver.population().len(), 15);
        assert_eq!(evolver.generation_number(), 0);
        assert_eq!(evolver.phase(), EvolverPhase::Running);

        evolver.evolve().unwrap();
        assert_eq!(evolver.generation_number(), 1);
        let score = evolver.high_score().unwrap();
        assert!((0.0..=1.0).contains(&score));

        for _ in 1..max_gens {
            assert!(!evolver.finished());
            evolver.evolve().unwrap();
        }
        assert!(evolver.finished());
        assert_eq!(evolver.phase(), EvolverPhase::Finished);
        assert_eq!(evolver.high_score(), Some(0.5));

        // Terminal: further calls change nothing
        evolver.evolve().unwrap();
        assert_eq!(evolver.generation_number(), max_gens);
        assert_eq!(evolver.high_score(), Some(0.5));
    }

    #[test]
    fn test_stagnation_without_improvement() {
        let max_gens = 7;
        let mut evolver = constant_evolver(test_config(max_gens));
        evolver.initialize(4).unwrap();

        for generation in 1..=max_gens {
            evolver.evolve().unwrap();
            let state = evolver.state().unwrap();
            assert_eq!(state.stagnant_count(), state.generation_number());
            assert_eq!(state.generation_number(), generation);
            assert_eq!(evolver.finished(), generation >= max_gens);
            assert!(!evolver.fitness_changed());
        }
    }

    #[test]
    fn test_evolve_before_initialize_fails() {
        let mut evolver = constant_evolver(test_config(3));
        assert_eq!(evolver.evolve(), Err(EvolveError::NotInitialized));
        assert_eq!(evolver.generation_number(), 0);
    }

    #[test]
    fn test_initialize_requires_functions() {
        let mut evolver: Evolver<f64> = Evolver::new(test_config(3));
        assert_eq!(
            evolver.initialize(5),
            Err(EvolveError::MissingPhenotypeFunction)
        );

        evolver.set_phenotype_function(|genes: &[f64]| genes[0]);
        assert_eq!(
            evolver.initialize(5),
            Err(EvolveError::MissingFitnessFunction)
        );
        assert!(!evolver.is_initialized());

        evolver.set_fitness_function(|p: &f64| Ok(*p));
        assert!(evolver.initialize(5).is_ok());
    }

    #[test]
    fn test_initialize_rejects_bad_input() {
        let mut evolver = constant_evolver(test_config(3));
        assert_eq!(evolver.initialize(0), Err(EvolveError::InvalidGenomeSize));

        let mut evolver = constant_evolver(EvolverConfig {
            mutation_rate: -0.1,
            ..test_config(3)
        });
        assert!(matches!(
            evolver.initialize(4),
            Err(EvolveError::Config(ConfigError::InvalidMutationRate(_)))
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut evolver = mean_evolver(test_config(3));
        evolver.initialize(6).unwrap();
        let genes: Vec<Vec<f64>> = evolver
            .population()
            .individuals()
            .map(|i| i.genes().to_vec())
            .collect();

        evolver.initialize(20).unwrap();
        assert_eq!(evolver.genome_size(), 6);
        let again: Vec<Vec<f64>> = evolver
            .population()
            .individuals()
            .map(|i| i.genes().to_vec())
            .collect();
        assert_eq!(genes, again);
    }

    #[test]
    fn test_population_size_override() {
        let mut evolver = mean_evolver(EvolverConfig {
            population_size: Some(4),
            ..test_config(3)
        });
        evolver.initialize(10).unwrap();
        assert_eq!(evolver.population().len(), 4);
        evolver.evolve().unwrap();
        assert_eq!(evolver.population().len(), 4);
    }

    #[test]
    fn test_high_score_is_monotonic() {
        let mut evolver = mean_evolver(test_config(15));
        evolver.initialize(8).unwrap();

        let mut previous = evolver.high_score().unwrap();
        while !evolver.finished() {
            evolver.evolve().unwrap();
            let current = evolver.high_score().unwrap();
            assert!(current >= previous);
            assert_eq!(evolver.fittest().unwrap().fitness(), Some(current));
            previous = current;
        }
        assert!(evolver.state().unwrap().end_time().is_some());
    }

    #[test]
    fn test_improvement_resets_stagnation() {
        // Fitness grows with the generation count, so every generation improves
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut evolver = Evolver::new(EvolverConfig {
            fitness_decimal_places: 6,
            ..test_config(2)
        })
        .with_phenotype_function(|genes: &[f64]| genes[0])
        .with_fitness_function(move |_: &f64| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok((n as f64 / 1000.0).min(1.0))
        });

        evolver.initialize(2).unwrap();
        for _ in 0..5 {
            evolver.evolve().unwrap();
            assert!(evolver.fitness_changed());
            assert_eq!(evolver.state().unwrap().stagnant_count(), 0);
        }
        assert!(!evolver.finished());
        assert_eq!(calls.load(Ordering::SeqCst), 3 * 6);
    }

    #[test]
    fn test_failed_generation_keeps_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let population_size = 6;
        let mut evolver = Evolver::new(test_config(5))
            .with_phenotype_function(|genes: &[f64]| genes[0])
            .with_fitness_function(move |p: &f64| {
                // Fail partway through the second generation
                if counter.fetch_add(1, Ordering::SeqCst) == population_size * 2 + 2 {
                    Err(CompareError::EmptyImage)
                } else {
                    Ok(*p)
                }
            });

        evolver.initialize(4).unwrap();
        evolver.evolve().unwrap();
        let genes_before: Vec<Vec<f64>> = evolver
            .population()
            .individuals()
            .map(|i| i.genes().to_vec())
            .collect();
        let high_before = evolver.high_score();

        assert_eq!(
            evolver.evolve(),
            Err(EvolveError::Fitness(CompareError::EmptyImage))
        );
        assert_eq!(evolver.generation_number(), 1);
        assert_eq!(evolver.high_score(), high_before);
        let genes_after: Vec<Vec<f64>> = evolver
            .population()
            .individuals()
            .map(|i| i.genes().to_vec())
            .collect();
        assert_eq!(genes_before, genes_after);

        // The run can continue afterwards
        evolver.evolve().unwrap();
        assert_eq!(evolver.generation_number(), 2);
    }

    #[test]
    fn test_nan_fitness_fails_initialization() {
        let mut evolver: Evolver<f64> = Evolver::new(test_config(3))
            .with_phenotype_function(|genes: &[f64]| genes[0])
            .with_fitness_function(|_: &f64| Ok(f64::NAN));

        let result = evolver.initialize(4);
        assert!(matches!(
            result,
            Err(EvolveError::Fitness(CompareError::NonFiniteScore(_)))
        ));
        assert!(!evolver.is_initialized());
        assert!(evolver.high_score().is_none());
        assert!(evolver.fittest().is_none());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut evolver = mean_evolver(test_config(4));
            evolver.initialize(6).unwrap();
            let mut scores = vec![evolver.high_score()];
            for _ in 0..10 {
                evolver.evolve().unwrap();
                scores.push(evolver.high_score());
            }
            (scores, evolver.fittest().unwrap().genes().to_vec())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_phenotype_accessors() {
        let mut evolver = mean_evolver(test_config(3));
        assert!(evolver.fittest_phenotype().is_none());
        assert!(evolver.random_phenotype().is_none());

        evolver.initialize(5).unwrap();
        let fittest = *evolver.fittest_phenotype().unwrap();
        assert_eq!(evolver.high_score(), Some((fittest * 100.0).round() / 100.0));
        let random = *evolver.random_phenotype().unwrap();
        assert!((0.0..1.0).contains(&random));
    }

    #[test]
    fn test_end_time_latched_once() {
        let mut state = EvolverState::new(1, Some(0.5));
        assert!(!state.finished());
        state.advance(Some(0.5));
        assert!(state.finished());
        state.end();
        let first = state.end_time().unwrap();
        state.end();
        assert_eq!(state.end_time(), Some(first));
        assert_eq!(state.elapsed(), first.duration_since(state.start_time));
    }

    #[test]
    fn test_run_with_callback() {
        let mut evolver = constant_evolver(test_config(3));
        let mut reports = Vec::new();
        let stats = evolver
            .run_with_callback(4, |progress| reports.push(progress.generation))
            .unwrap();

        assert_eq!(reports, vec![0, 1, 2, 3]);
        assert_eq!(stats.generations, 3);
        assert_eq!(stats.population_size, 6);
        assert_eq!(stats.total_evaluations, 24);
        assert_eq!(stats.best_fitness, Some(0.5));
    }

    #[test]
    fn test_progress_snapshot() {
        let mut evolver = mean_evolver(test_config(3));
        let before = evolver.progress();
        assert_eq!(before.phase, EvolverPhase::Uninitialized);
        assert_eq!(before.population_size, 0);

        evolver.initialize(10).unwrap();
        let after = evolver.progress();
        assert_eq!(after.population_size, 15);
        assert!(after.mating_pool_size >= 15);
        assert!(after.mean_fitness.is_some());
    }

    #[test]
    fn test_collage_search_end_to_end() {
        let render_config = RenderConfig {
            width: 24,
            height: 24,
            number_of_parts: 4,
            ..Default::default()
        };
        let renderer = Renderer::new(render_config, PartsCatalog::procedural(4, 8)).unwrap();
        let genome_size = renderer.genome_size();
        let target = renderer.render(&GeneRng::new(3).random_genes(genome_size));

        let comparator = ImageComparator::new(
            ComparatorConfig {
                strictness: 2,
                modes: vec![PreprocessMode::Gray],
                ..Default::default()
            },
            &[target],
        )
        .unwrap();

        let mut evolver: Evolver<Raster> = Evolver::new(test_config(4))
            .with_phenotype_function(renderer.into_phenotype_function())
            .with_fitness_function(comparator.into_fitness_function());

        let mut scores = Vec::new();
        let stats = evolver
            .run_with_callback(genome_size, |progress| scores.push(progress.high_score))
            .unwrap();

        assert!(evolver.finished());
        assert_eq!(stats.genome_size, 8);
        assert_eq!(stats.population_size, 12);
        let best = stats.best_fitness.unwrap();
        assert!((0.0..=1.0).contains(&best));
        assert!(scores.windows(2).all(|w| w[1] >= w[0]));

        let image = evolver.fittest_phenotype().unwrap();
        assert_eq!((image.width(), image.height()), (24, 24));
    }
}
