//! Image similarity scoring against a fixed set of reference images.
//!
//! Candidate and references are reduced to small pixel samples (size chosen
//! by strictness), converted to one scalar per pixel by the configured
//! preprocessing modes, and compared by mean absolute difference.

use log::warn;

use crate::schema::{ComparatorConfig, ConfigError, PreprocessMode};

use super::raster::{self, Raster};

/// Errors raised while loading references or scoring a candidate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("No reference images to compare against")]
    NoReferences,
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Aspect ratio {candidate} does not match reference aspect ratio {reference}")]
    AspectRatioMismatch { candidate: f64, reference: f64 },
    #[error("Sample of {candidate} pixels does not match reference sample of {reference} pixels")]
    SampleLengthMismatch { candidate: usize, reference: usize },
    #[error("Fitness score {0} is not a finite number")]
    NonFiniteScore(f64),
    #[error("Invalid comparator configuration: {0}")]
    Config(#[from] ConfigError),
}

/// A preprocessed image: one value in `[0, 255]` per sampled pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
    /// Aspect ratio of the source image, rounded to three decimals.
    pub aspect_ratio: f64,
}

/// Scores candidates against references loaded once at construction.
///
/// Every image is resized to the sample dimensions of the first reference,
/// so images whose rounded aspect ratios agree always yield samples of the
/// same length.
#[derive(Debug, Clone)]
pub struct ImageComparator {
    config: ComparatorConfig,
    references: Vec<Sample>,
    sample_dims: (usize, usize),
}

impl ImageComparator {
    /// Preprocess and validate the reference set.
    pub fn new(config: ComparatorConfig, references: &[Raster]) -> Result<Self, CompareError> {
        config.validate()?;
        if config.strictness_clamped() {
            warn!(
                "Strictness {} is outside 1..={}, using sample size {}",
                config.strictness,
                crate::schema::STRICTNESS_SIZES.len(),
                config.sample_size()
            );
        }
        if references.is_empty() {
            return Err(CompareError::NoReferences);
        }

        let color_modes: Vec<PreprocessMode> = config
            .modes
            .iter()
            .copied()
            .filter(PreprocessMode::is_color_sensitive)
            .collect();

        let first = preprocess(&config, &references[0], None)?;
        let sample_dims = (first.width, first.height);
        let mut samples = Vec::with_capacity(references.len());
        samples.push(first);

        for (i, reference) in references.iter().enumerate() {
            if !color_modes.is_empty() && reference.is_grayscale() {
                warn!(
                    "Reference image {} is grayscale but the comparator uses {:?} mode; \
                     color similarity will not be meaningful",
                    i, color_modes
                );
            }
            if i > 0 {
                let sample = preprocess(&config, reference, Some(sample_dims))?;
                check_aspect(sample.aspect_ratio, &samples[0])?;
                samples.push(sample);
            }
        }

        Ok(Self {
            config,
            references: samples,
            sample_dims,
        })
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Preprocessed reference samples.
    pub fn references(&self) -> &[Sample] {
        &self.references
    }

    /// Width and height every image is resized to before comparison.
    pub fn sample_dims(&self) -> (usize, usize) {
        self.sample_dims
    }

    /// Preprocess an image exactly as references are preprocessed.
    ///
    /// Fails if its rounded aspect ratio differs from the references'.
    pub fn sample(&self, image: &Raster) -> Result<Sample, CompareError> {
        if image.is_empty() {
            return Err(CompareError::EmptyImage);
        }
        check_aspect(round3(image.aspect_ratio()), &self.references[0])?;
        preprocess(&self.config, image, Some(self.sample_dims))
    }

    /// Similarity in `[0, 1]`; 1.0 means identical samples.
    ///
    /// The result is the mean over references of
    /// `1 - mean(|candidate - reference| / 255)`.
    pub fn score(&self, candidate: &Raster) -> Result<f64, CompareError> {
        let sample = self.sample(candidate)?;

        let mut total = 0.0;
        for reference in &self.references {
            if sample.values.len() != reference.values.len() {
                return Err(CompareError::SampleLengthMismatch {
                    candidate: sample.values.len(),
                    reference: reference.values.len(),
                });
            }
            total += sample_similarity(&sample.values, &reference.values);
        }

        Ok(total / self.references.len() as f64)
    }

    /// Wrap this comparator as a fitness function over rendered images.
    pub fn into_fitness_function(
        self,
    ) -> impl Fn(&Raster) -> Result<f64, CompareError> + Send + Sync + 'static {
        move |image: &Raster| self.score(image)
    }
}

/// Score one candidate against a set of references without keeping the
/// comparator around.
pub fn compare(
    config: &ComparatorConfig,
    candidate: &Raster,
    references: &[Raster],
) -> Result<f64, CompareError> {
    ImageComparator::new(config.clone(), references)?.score(candidate)
}

fn check_aspect(candidate: f64, reference: &Sample) -> Result<(), CompareError> {
    if candidate != reference.aspect_ratio {
        return Err(CompareError::AspectRatioMismatch {
            candidate,
            reference: reference.aspect_ratio,
        });
    }
    Ok(())
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// `1 - mean(|a - b| / 255)` over paired values.
fn sample_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 1.0;
    }
    let error: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs() / 255.0)
        .sum();
    1.0 - error / a.len() as f64
}

/// Resize and convert an image to one value per pixel.
///
/// Without explicit `dims` the longer side is scaled to the strictness
/// sample size.
fn preprocess(
    config: &ComparatorConfig,
    image: &Raster,
    dims: Option<(usize, usize)>,
) -> Result<Sample, CompareError> {
    if image.is_empty() {
        return Err(CompareError::EmptyImage);
    }
    let aspect_ratio = round3(image.aspect_ratio());
    let small = match dims {
        Some((width, height)) => image.resize(width, height),
        None => image.resize_longer_side(config.sample_size()),
    };

    let mut channels = config
        .modes
        .iter()
        .map(|mode| mode_values(config, *mode, &small));
    let mut values = channels.next().ok_or(ConfigError::NoPreprocessModes)?;

    let mode_count = config.modes.len();
    if mode_count > 1 {
        for other in channels {
            for (v, o) in values.iter_mut().zip(other) {
                *v += o;
            }
        }
        for v in &mut values {
            *v /= mode_count as f64;
        }
    }

    Ok(Sample {
        width: small.width(),
        height: small.height(),
        values,
        aspect_ratio,
    })
}

/// Values of a resized image under one preprocessing mode.
fn mode_values(config: &ComparatorConfig, mode: PreprocessMode, image: &Raster) -> Vec<f64> {
    match mode {
        PreprocessMode::Gray => image.pixels().iter().map(|&p| raster::brightness(p)).collect(),
        PreprocessMode::Color => image
            .pixels()
            .iter()
            .map(|&p| raster::channel_mean(p))
            .collect(),
        PreprocessMode::Hue => image.pixels().iter().map(|&p| raster::hue(p)).collect(),
        PreprocessMode::Binary => {
            let eroded;
            let source = if config.erode_binary {
                eroded = image.erode();
                &eroded
            } else {
                image
            };
            source
                .pixels()
                .iter()
                .map(|&p| {
                    if raster::luminance(p) >= config.threshold {
                        255.0
                    } else {
                        0.0
                    }
                })
                .collect()
        }
    }
}
