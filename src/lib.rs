//! Evolutionary Collage - Genetic search for images that resemble a target.
//!
//! A population of gene vectors is evolved by rank-weighted selection,
//! single-point crossover, and point mutation. Each gene vector is rendered
//! to an image (the phenotype) and scored by how closely it matches one or
//! more reference images.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, progress, and report types
//! - `compute`: Rasters, the image comparator, the collage renderer, and the
//!   evolution engine
//!
//! The evolution engine is generic over the phenotype. The renderer and the
//! comparator are one pairing of phenotype and fitness function; any other
//! pure functions can be plugged in.
//!
//! # Example
//!
//! ```rust,no_run
//! use evolutionary_collage::{
//!     compute::{ImageComparator, PartsCatalog, Renderer, evolution::{Evolver, GeneRng}},
//!     schema::CollageConfig,
//! };
//!
//! let config = CollageConfig::default();
//! let renderer = Renderer::new(config.render.clone(), PartsCatalog::procedural(8, 24)).unwrap();
//!
//! // Use a random collage as the reference image
//! let target_genes = GeneRng::new(7).random_genes(renderer.genome_size());
//! let target = renderer.render(&target_genes);
//! let comparator = ImageComparator::new(config.comparator.clone(), &[target]).unwrap();
//!
//! let genome_size = renderer.genome_size();
//! let mut evolver = Evolver::new(config.evolution.clone())
//!     .with_phenotype_function(renderer.into_phenotype_function())
//!     .with_fitness_function(comparator.into_fitness_function());
//!
//! evolver.initialize(genome_size).unwrap();
//! while !evolver.finished() {
//!     evolver.evolve().unwrap();
//! }
//! println!("Best fitness: {:?}", evolver.high_score());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolveError, Evolver};
pub use compute::{ImageComparator, Raster, Renderer};
pub use schema::{CollageConfig, EvolverConfig, RunReport, RunStats};
