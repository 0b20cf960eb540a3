//! Evolutionary search over fixed-length gene vectors.
//!
//! The search is generic over the phenotype type: the caller supplies a
//! phenotype function mapping genes to `P` and a fitness function scoring `P`
//! in `[0, 1]`.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Random generation, crossover, and mutation
//! - **Individuals** (`individual`): Genes with cached phenotype and fitness
//! - **Population** (`population`): Current generation, cumulative best, mating pool
//! - **Evolver** (`evolver`): Lifecycle, stagnation tracking, and the host loop
//!
//! # Example
//!
//! ```rust,no_run
//! use evolutionary_collage::compute::evolution::Evolver;
//! use evolutionary_collage::schema::EvolverConfig;
//!
//! let mut evolver = Evolver::new(EvolverConfig::default())
//!     .with_phenotype_function(|genes: &[f64]| genes.iter().sum::<f64>() / genes.len() as f64)
//!     .with_fitness_function(|mean: &f64| Ok(*mean));
//!
//! let stats = evolver
//!     .run_with_callback(16, |progress| {
//!         println!("Generation {}: fitness = {:?}", progress.generation, progress.high_score);
//!     })
//!     .unwrap();
//! println!("Stopped after {} generations", stats.generations);
//! ```
//!
//! # Selection
//!
//! Each generation is ranked by ascending fitness. The individual at rank `r`
//! enters the mating pool `round((r + 1)^2 / n)` times, and parents are drawn
//! uniformly from the pool. The search stops once the best fitness has not
//! improved for `max_stagnant_generations` consecutive generations.

mod evolver;
mod genome;
mod individual;
mod population;

pub use evolver::{EvolveError, Evolver, EvolverState};
pub use genome::{GeneRng, crossover_at};
pub use individual::{FitnessFunction, Individual, PhenotypeFunction, round_fitness};
pub use population::{Population, mating_weight};
