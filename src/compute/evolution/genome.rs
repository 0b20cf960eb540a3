//! Gene vector utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations.

use rand::prelude::*;

/// Random number generator wrapper for genome operations.
///
/// One instance drives a whole run; seed it once for reproducible runs.
pub struct GeneRng {
    rng: StdRng,
}

impl GeneRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform draw from `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// `len` independent uniform genes.
    pub fn random_genes(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.unit()).collect()
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Single-point crossover of `a` and `b` with a uniformly drawn cut.
    ///
    /// Returns the child genes and the cut point used.
    pub fn crossover(&mut self, a: &[f64], b: &[f64]) -> (Vec<f64>, usize) {
        let cut = self.index(a.len().max(1));
        (crossover_at(a, b, cut), cut)
    }

    /// With probability `rate`, replace one randomly chosen gene with a fresh
    /// uniform value. Returns the index that changed.
    pub fn mutate(&mut self, genes: &mut [f64], rate: f64) -> Option<usize> {
        if genes.is_empty() || self.unit() >= rate {
            return None;
        }
        let idx = self.index(genes.len());
        genes[idx] = self.unit();
        Some(idx)
    }
}

/// Child genes for cut point `cut`: positions after the cut come from `a`,
/// positions up to and including it come from `b`.
pub fn crossover_at(a: &[f64], b: &[f64], cut: usize) -> Vec<f64> {
    a.iter()
        .zip(b)
        .enumerate()
        .map(|(i, (&x, &y))| if i > cut { x } else { y })
        .collect()
}
