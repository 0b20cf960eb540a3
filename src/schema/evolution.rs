//! Evolution configuration and run reporting types.
//!
//! The evolver reads its configuration once at initialization; nothing here
//! is re-read mid-run.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ComparatorConfig, ConfigError, RenderConfig};

/// Largest supported fitness rounding precision.
pub const MAX_FITNESS_DECIMAL_PLACES: u32 = 12;

/// Settings for the generational search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolverConfig {
    /// Probability that a child receives one fresh random gene.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Fitness is rounded to this many decimal places.
    #[serde(default = "default_fitness_decimal_places")]
    pub fitness_decimal_places: u32,
    /// Stop after this many consecutive generations without improvement.
    #[serde(default = "default_max_stagnant_generations")]
    pub max_stagnant_generations: usize,
    /// Population size as a multiple of the genome size.
    #[serde(default = "default_population_ratio")]
    pub population_ratio: f64,
    /// Explicit population size, overriding the ratio.
    #[serde(default)]
    pub population_size: Option<usize>,
    /// Log a progress line every N generations.
    #[serde(default = "default_update_interval")]
    pub update_interval: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            mutation_rate: default_mutation_rate(),
            fitness_decimal_places: default_fitness_decimal_places(),
            max_stagnant_generations: default_max_stagnant_generations(),
            population_ratio: default_population_ratio(),
            population_size: None,
            update_interval: default_update_interval(),
            random_seed: None,
        }
    }
}

fn default_mutation_rate() -> f64 {
    0.08
}
fn default_fitness_decimal_places() -> u32 {
    2
}
fn default_max_stagnant_generations() -> usize {
    50
}
fn default_population_ratio() -> f64 {
    1.5
}
fn default_update_interval() -> usize {
    10
}

impl EvolverConfig {
    /// Population size for a given genome size.
    ///
    /// Uses the explicit override when set, otherwise
    /// `round(genome_size * population_ratio)`.
    pub fn population_size_for(&self, genome_size: usize) -> usize {
        self.population_size
            .unwrap_or_else(|| (genome_size as f64 * self.population_ratio).round() as usize)
    }

    /// Validate evolver settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::InvalidMutationRate(self.mutation_rate));
        }
        if self.fitness_decimal_places > MAX_FITNESS_DECIMAL_PLACES {
            return Err(ConfigError::InvalidPrecision(self.fitness_decimal_places));
        }
        if self.max_stagnant_generations == 0 {
            return Err(ConfigError::InvalidStagnationLimit);
        }
        if !(self.population_ratio > 0.0) {
            return Err(ConfigError::InvalidPopulationRatio(self.population_ratio));
        }
        if self.population_size == Some(0) {
            return Err(ConfigError::PopulationTooSmall);
        }
        Ok(())
    }
}

/// Lifecycle of an evolver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolverPhase {
    /// No population yet.
    #[default]
    Uninitialized,
    /// Generations are being produced.
    Running,
    /// Stagnation threshold reached. Terminal.
    Finished,
}

/// Snapshot of the search, taken between generations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Completed generations.
    pub generation: usize,
    /// Best fitness seen so far.
    pub high_score: Option<f64>,
    /// Mean fitness of the current generation.
    pub mean_fitness: Option<f64>,
    /// Generations since the last improvement.
    pub stagnant_count: usize,
    /// Stagnation threshold.
    pub max_stagnant_generations: usize,
    /// Whether the last generation improved the high score.
    pub fitness_changed: bool,
    /// Individuals per generation.
    pub population_size: usize,
    /// Entries in the current mating pool.
    pub mating_pool_size: usize,
    /// Wall time since initialization.
    pub elapsed_seconds: f64,
    /// Lifecycle phase.
    pub phase: EvolverPhase,
}

/// Statistics from a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Total generations evolved.
    pub generations: usize,
    /// Fitness evaluations performed, including the initial population.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: Option<f64>,
    /// Individuals per generation.
    pub population_size: usize,
    /// Genes per individual.
    pub genome_size: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
}

/// Synthetic target used by the command line runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Seed of the random genome rendered as the reference image.
    #[serde(default = "default_target_seed")]
    pub seed: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            seed: default_target_seed(),
        }
    }
}

fn default_target_seed() -> u64 {
    7
}

/// Top-level configuration file for the command line runner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollageConfig {
    #[serde(default)]
    pub evolution: EvolverConfig,
    #[serde(default)]
    pub comparator: ComparatorConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

impl CollageConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evolution.validate()?;
        self.comparator.validate()?;
        self.render.validate()?;
        Ok(())
    }
}

/// Settings and outcome of a run, written at the end of the search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub config: CollageConfig,
    pub stats: RunStats,
}

impl RunReport {
    /// Write the report as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Read a report written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CollageConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_population_size_heuristic() {
        let config = EvolverConfig::default();
        assert_eq!(config.population_size_for(10), 15);
        assert_eq!(config.population_size_for(50), 75);
        assert_eq!(config.population_size_for(3), 5); // 4.5 rounds up

        let fixed = EvolverConfig {
            population_size: Some(8),
            ..Default::default()
        };
        assert_eq!(fixed.population_size_for(100), 8);
    }

    #[test]
    fn test_evolver_validation() {
        let config = EvolverConfig {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidMutationRate(1.5)));

        let config = EvolverConfig {
            max_stagnant_generations: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidStagnationLimit));

        let config = EvolverConfig {
            population_ratio: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPopulationRatio(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = CollageConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CollageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.evolution.max_stagnant_generations,
            config.evolution.max_stagnant_generations
        );
        assert_eq!(parsed.comparator.modes, config.comparator.modes);
    }

    #[test]
    fn test_report_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = RunReport {
            config: CollageConfig::default(),
            stats: RunStats {
                generations: 12,
                total_evaluations: 195,
                best_fitness: Some(0.87),
                population_size: 15,
                genome_size: 10,
                elapsed_seconds: 0.5,
            },
        };
        report.save(&path).unwrap();

        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded.stats.generations, 12);
        assert_eq!(loaded.stats.best_fitness, Some(0.87));
        assert_eq!(loaded.config.target.seed, report.config.target.seed);

        let missing = RunReport::load(dir.path().join("missing.json"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: CollageConfig =
            serde_json::from_str(r#"{"evolution": {"mutation_rate": 0.2}}"#).unwrap();
        assert_eq!(parsed.evolution.mutation_rate, 0.2);
        assert_eq!(parsed.evolution.fitness_decimal_places, 2);
        assert_eq!(parsed.comparator.strictness, 4);
    }
}
