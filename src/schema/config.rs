//! Configuration types for image comparison and collage rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sample sizes (in pixels along the longer side) indexed by strictness.
pub const STRICTNESS_SIZES: [usize; 7] = [5, 9, 15, 25, 50, 100, 200];

/// Pixel preprocessing applied before comparison.
///
/// Each mode turns one pixel into one scalar in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PreprocessMode {
    /// Brightness (largest of the three color channels).
    Gray,
    /// Mean of the red, green and blue channels.
    Color,
    /// Hue only, scaled to `[0, 255]`. Ignores brightness.
    Hue,
    /// Luminance thresholded to black or white.
    Binary,
}

impl PreprocessMode {
    /// Canonical configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Color => "color",
            Self::Hue => "hue",
            Self::Binary => "binary",
        }
    }

    /// Whether this mode is only meaningful for references that carry color.
    pub fn is_color_sensitive(&self) -> bool {
        matches!(self, Self::Color | Self::Hue)
    }
}

impl fmt::Display for PreprocessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreprocessMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => Ok(Self::Gray),
            "color" | "colour" => Ok(Self::Color),
            "hue" => Ok(Self::Hue),
            "binary" => Ok(Self::Binary),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for PreprocessMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PreprocessMode> for String {
    fn from(mode: PreprocessMode) -> Self {
        mode.name().to_string()
    }
}

/// Settings for the image comparator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Sample resolution level, `1..=7`. Higher is more faithful and slower.
    #[serde(default = "default_strictness")]
    pub strictness: usize,
    /// Preprocessing modes. Several modes are averaged per pixel.
    #[serde(default = "default_modes")]
    pub modes: Vec<PreprocessMode>,
    /// Binary threshold. Higher values let lighter grays count as black.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Erode before thresholding in binary mode.
    #[serde(default)]
    pub erode_binary: bool,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            strictness: default_strictness(),
            modes: default_modes(),
            threshold: default_threshold(),
            erode_binary: false,
        }
    }
}

fn default_strictness() -> usize {
    4
}
fn default_modes() -> Vec<PreprocessMode> {
    vec![PreprocessMode::Binary]
}
fn default_threshold() -> u8 {
    230
}

impl ComparatorConfig {
    /// Length of the longer side of a sampled image.
    ///
    /// Strictness is clamped onto the ladder, so 0 behaves like 1.
    pub fn sample_size(&self) -> usize {
        let index = self.strictness.clamp(1, STRICTNESS_SIZES.len()) - 1;
        STRICTNESS_SIZES[index]
    }

    /// Whether the configured strictness lies outside the ladder.
    pub fn strictness_clamped(&self) -> bool {
        !(1..=STRICTNESS_SIZES.len()).contains(&self.strictness)
    }

    /// Validate comparator settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modes.is_empty() {
            return Err(ConfigError::NoPreprocessModes);
        }
        Ok(())
    }
}

/// How parts are placed on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayoutKind {
    /// One part per grid cell, centered. Genes per part: part, rotation.
    Grid {
        /// Column count. Defaults to a square grid.
        #[serde(default)]
        columns: Option<usize>,
    },
    /// Free placement. Genes per part: part, x, y, rotation, scale.
    Point,
}

impl Default for LayoutKind {
    fn default() -> Self {
        Self::Grid { columns: None }
    }
}

impl LayoutKind {
    /// Number of genes consumed per placed part.
    pub fn genes_per_part(&self) -> usize {
        match self {
            Self::Grid { .. } => 2,
            Self::Point => 5,
        }
    }
}

/// Settings for the collage renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Canvas width in pixels.
    #[serde(default = "default_canvas_size")]
    pub width: usize,
    /// Canvas height in pixels.
    #[serde(default = "default_canvas_size")]
    pub height: usize,
    /// Layout used to place parts.
    #[serde(default)]
    pub layout: LayoutKind,
    /// Number of parts drawn per phenotype.
    #[serde(default = "default_number_of_parts")]
    pub number_of_parts: usize,
    /// Uniform scale applied to every part before placement.
    #[serde(default = "default_part_uniform_scale")]
    pub part_uniform_scale: f64,
    /// Lower bound of the gene-driven part scale (point layout).
    #[serde(default = "default_part_scale")]
    pub part_scale_min: f64,
    /// Upper bound of the gene-driven part scale (point layout).
    #[serde(default = "default_part_scale")]
    pub part_scale_max: f64,
    /// Scale of the whole drawing about the canvas center, leaving margins.
    #[serde(default = "default_canvas_scale")]
    pub canvas_scale: f64,
    /// Ignore rotation genes.
    #[serde(default)]
    pub disable_rotation: bool,
    /// Allowed rotation angles in degrees. Empty means any of `0..360`.
    #[serde(default = "default_snap_angles")]
    pub snap_angles: Vec<u32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_size(),
            height: default_canvas_size(),
            layout: LayoutKind::default(),
            number_of_parts: default_number_of_parts(),
            part_uniform_scale: default_part_uniform_scale(),
            part_scale_min: default_part_scale(),
            part_scale_max: default_part_scale(),
            canvas_scale: default_canvas_scale(),
            disable_rotation: false,
            snap_angles: default_snap_angles(),
        }
    }
}

fn default_canvas_size() -> usize {
    100
}
fn default_number_of_parts() -> usize {
    25
}
fn default_part_uniform_scale() -> f64 {
    0.9
}
fn default_part_scale() -> f64 {
    1.0
}
fn default_canvas_scale() -> f64 {
    0.85
}
fn default_snap_angles() -> Vec<u32> {
    vec![0, 90, 180, 270]
}

impl RenderConfig {
    /// Length of the gene vector this configuration consumes.
    pub fn genome_size(&self) -> usize {
        self.number_of_parts * self.layout.genes_per_part()
    }

    /// Validate render settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidCanvas);
        }
        if self.number_of_parts == 0 {
            return Err(ConfigError::InvalidPartCount);
        }
        if let LayoutKind::Grid { columns: Some(0) } = self.layout {
            return Err(ConfigError::InvalidColumns);
        }
        if self.part_uniform_scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.part_uniform_scale));
        }
        if self.part_scale_min <= 0.0 || self.part_scale_min > self.part_scale_max {
            return Err(ConfigError::InvalidScaleBounds {
                min: self.part_scale_min,
                max: self.part_scale_max,
            });
        }
        if !(self.canvas_scale > 0.0 && self.canvas_scale <= 1.0) {
            return Err(ConfigError::InvalidScale(self.canvas_scale));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unrecognized preprocessing mode: {0:?}")]
    UnknownMode(String),
    #[error("At least one preprocessing mode is required")]
    NoPreprocessModes,
    #[error("Mutation rate {0} must lie in [0, 1]")]
    InvalidMutationRate(f64),
    #[error("Stagnation threshold must be a positive generation count")]
    InvalidStagnationLimit,
    #[error("Population ratio {0} must be positive")]
    InvalidPopulationRatio(f64),
    #[error("Population size must be non-zero")]
    PopulationTooSmall,
    #[error("Fitness precision of {0} decimal places is out of range")]
    InvalidPrecision(u32),
    #[error("Canvas dimensions must be non-zero")]
    InvalidCanvas,
    #[error("Number of parts must be non-zero")]
    InvalidPartCount,
    #[error("Grid column count must be non-zero")]
    InvalidColumns,
    #[error("Scale factor {0} is out of range")]
    InvalidScale(f64),
    #[error("Part scale bounds are invalid: min {min}, max {max}")]
    InvalidScaleBounds { min: f64, max: f64 },
}
