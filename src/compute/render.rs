//! Collage renderer: turns a gene vector into an image made of parts.
//!
//! This is one possible phenotype function. The evolution core only sees it
//! through `Renderer::into_phenotype_function`.

use std::f64::consts::PI;

use crate::schema::{ConfigError, LayoutKind, RenderConfig};

use super::raster::{Raster, Rgba, WHITE};

/// Renderer construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Parts catalog is empty")]
    EmptyCatalog,
    #[error("Invalid render configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Map a gene in `[0, 1)` onto an index into a list of `len` items.
pub fn normalized_index(value: f64, len: usize) -> usize {
    let scaled = (value.clamp(0.0, 1.0) * len as f64).floor() as usize;
    scaled.min(len.saturating_sub(1))
}

/// The images a collage is assembled from.
///
/// Built once by the host and shared by reference with the renderer.
#[derive(Debug, Clone)]
pub struct PartsCatalog {
    parts: Vec<Raster>,
}

impl PartsCatalog {
    pub fn new(parts: Vec<Raster>) -> Result<Self, RenderError> {
        if parts.is_empty() || parts.iter().any(Raster::is_empty) {
            return Err(RenderError::EmptyCatalog);
        }
        Ok(Self { parts })
    }

    /// Simple generated shapes (squares, discs, triangles, bars) in a few
    /// shades, `size` pixels square, on a transparent background.
    pub fn procedural(count: usize, size: usize) -> Self {
        let size = size.max(1);
        let parts = (0..count.max(1))
            .map(|i| {
                let shade = [20u8, 90, 160][(i / 4) % 3];
                let ink: Rgba = [shade, shade, shade, 255];
                let clear: Rgba = [255, 255, 255, 0];
                let n = size as f64;
                Raster::from_fn(size, size, |x, y| {
                    let u = (x as f64 + 0.5) / n;
                    let v = (y as f64 + 0.5) / n;
                    let inside = match i % 4 {
                        0 => true,
                        1 => (u - 0.5).powi(2) + (v - 0.5).powi(2) <= 0.25,
                        2 => v >= 1.0 - 2.0 * u.min(1.0 - u),
                        _ => (0.35..0.65).contains(&u),
                    };
                    if inside { ink } else { clear }
                })
            })
            .collect();
        Self { parts }
    }

    /// Part selected by a normalized gene.
    pub fn pick(&self, gene: f64) -> usize {
        normalized_index(gene, self.parts.len())
    }

    pub fn get(&self, index: usize) -> &Raster {
        &self.parts[index]
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A part positioned on the (unscaled) canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedPart {
    /// Index into the catalog.
    pub part: usize,
    /// Center in canvas pixels.
    pub center: (f64, f64),
    /// Rotation in degrees, clockwise.
    pub rotation: f64,
    /// Scale applied to the part's native size.
    pub scale: f64,
}

/// Strategy for turning genes into placed parts.
pub trait Layout {
    fn build(
        &self,
        genes: &[f64],
        config: &RenderConfig,
        catalog: &PartsCatalog,
    ) -> Vec<PlacedPart>;
}

/// Parts centered in grid cells. Genes: part, rotation.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    pub columns: Option<usize>,
}

/// Parts placed freely. Genes: part, x, y, rotation, scale.
#[derive(Debug, Clone, Copy)]
pub struct PointLayout;

impl Layout for GridLayout {
    fn build(
        &self,
        genes: &[f64],
        config: &RenderConfig,
        catalog: &PartsCatalog,
    ) -> Vec<PlacedPart> {
        let groups: Vec<&[f64]> = part_genes(genes, 2, config.number_of_parts).collect();
        if groups.is_empty() {
            return Vec::new();
        }

        let columns = self
            .columns
            .unwrap_or_else(|| (groups.len() as f64).sqrt().round() as usize)
            .max(1);
        let rows = groups.len().div_ceil(columns);
        let cell_w = config.width as f64 / columns as f64;
        let cell_h = config.height as f64 / rows as f64;

        groups
            .iter()
            .enumerate()
            .map(|(i, g)| PlacedPart {
                part: catalog.pick(g[0]),
                center: (
                    ((i % columns) as f64 + 0.5) * cell_w,
                    ((i / columns) as f64 + 0.5) * cell_h,
                ),
                rotation: rotation_angle(g[1], config),
                scale: config.part_uniform_scale,
            })
            .collect()
    }
}

impl Layout for PointLayout {
    fn build(
        &self,
        genes: &[f64],
        config: &RenderConfig,
        catalog: &PartsCatalog,
    ) -> Vec<PlacedPart> {
        let spread = config.part_scale_max - config.part_scale_min;
        part_genes(genes, 5, config.number_of_parts)
            .map(|g| PlacedPart {
                part: catalog.pick(g[0]),
                center: (g[1] * config.width as f64, g[2] * config.height as f64),
                rotation: rotation_angle(g[3], config),
                scale: config.part_uniform_scale * (config.part_scale_min + g[4] * spread),
            })
            .collect()
    }
}

impl Layout for LayoutKind {
    fn build(
        &self,
        genes: &[f64],
        config: &RenderConfig,
        catalog: &PartsCatalog,
    ) -> Vec<PlacedPart> {
        match self {
            LayoutKind::Grid { columns } => {
                GridLayout { columns: *columns }.build(genes, config, catalog)
            }
            LayoutKind::Point => PointLayout.build(genes, config, catalog),
        }
    }
}

/// Complete gene groups of `size`, at most `limit` of them.
fn part_genes(genes: &[f64], size: usize, limit: usize) -> impl Iterator<Item = &[f64]> {
    genes.chunks_exact(size).take(limit)
}

/// Rotation from a gene: one of the snap angles, or any whole degree.
fn rotation_angle(gene: f64, config: &RenderConfig) -> f64 {
    if config.disable_rotation {
        return 0.0;
    }
    if config.snap_angles.is_empty() {
        normalized_index(gene, 360) as f64
    } else {
        config.snap_angles[normalized_index(gene, config.snap_angles.len())] as f64
    }
}

/// Cosine and sine, exact for quarter turns.
fn cos_sin(degrees: f64) -> (f64, f64) {
    let d = degrees.rem_euclid(360.0);
    if d == 0.0 {
        (1.0, 0.0)
    } else if d == 90.0 {
        (0.0, 1.0)
    } else if d == 180.0 {
        (-1.0, 0.0)
    } else if d == 270.0 {
        (0.0, -1.0)
    } else {
        let r = d * PI / 180.0;
        (r.cos(), r.sin())
    }
}

/// Renders gene vectors with a fixed configuration and catalog.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
    catalog: PartsCatalog,
}

impl Renderer {
    pub fn new(config: RenderConfig, catalog: PartsCatalog) -> Result<Self, RenderError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(RenderError::EmptyCatalog);
        }
        Ok(Self { config, catalog })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PartsCatalog {
        &self.catalog
    }

    /// Genes consumed per phenotype.
    pub fn genome_size(&self) -> usize {
        self.config.genome_size()
    }

    /// Place parts without drawing them.
    pub fn layout(&self, genes: &[f64]) -> Vec<PlacedPart> {
        self.config.layout.build(genes, &self.config, &self.catalog)
    }

    /// Draw the collage for a gene vector.
    ///
    /// Pure: the same genes always produce the same image. Trailing genes
    /// that do not fill a whole part are ignored.
    pub fn render(&self, genes: &[f64]) -> Raster {
        let mut canvas = Raster::new(self.config.width, self.config.height, WHITE);
        let s = self.config.canvas_scale;
        let margin_x = self.config.width as f64 * (1.0 - s) / 2.0;
        let margin_y = self.config.height as f64 * (1.0 - s) / 2.0;

        for placed in self.layout(genes) {
            let center = (margin_x + s * placed.center.0, margin_y + s * placed.center.1);
            draw_part(
                &mut canvas,
                self.catalog.get(placed.part),
                center,
                placed.rotation,
                s * placed.scale,
            );
        }
        canvas
    }

    /// Wrap this renderer as a phenotype function.
    pub fn into_phenotype_function(self) -> impl Fn(&[f64]) -> Raster + Send + Sync + 'static {
        move |genes: &[f64]| self.render(genes)
    }
}

/// Composite `part` onto `canvas`, centered at `center`, rotated and scaled.
/// Nearest-neighbor sampling.
fn draw_part(canvas: &mut Raster, part: &Raster, center: (f64, f64), rotation: f64, scale: f64) {
    if scale <= 0.0 || part.is_empty() {
        return;
    }
    let (cos, sin) = cos_sin(rotation);
    let (pw, ph) = (part.width() as f64, part.height() as f64);
    let reach = 0.5 * scale * (pw * pw + ph * ph).sqrt();

    let x0 = (center.0 - reach).floor().max(0.0) as usize;
    let y0 = (center.1 - reach).floor().max(0.0) as usize;
    let x1 = ((center.0 + reach).ceil().max(0.0) as usize).min(canvas.width());
    let y1 = ((center.1 + reach).ceil().max(0.0) as usize).min(canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - center.0;
            let dy = y as f64 + 0.5 - center.1;
            // Inverse rotation back into part space
            let u = (dx * cos + dy * sin) / scale + pw / 2.0;
            let v = (-dx * sin + dy * cos) / scale + ph / 2.0;
            if u < 0.0 || v < 0.0 || u >= pw || v >= ph {
                continue;
            }
            canvas.blend(x, y, part.get(u as usize, v as usize));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::raster::BLACK;

    fn grid_config(parts: usize) -> RenderConfig {
        RenderConfig {
            width: 40,
            height: 40,
            number_of_parts: parts,
            canvas_scale: 1.0,
            part_uniform_scale: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalized_index() {
        assert_eq!(normalized_index(0.0, 4), 0);
        assert_eq!(normalized_index(0.2499, 4), 0);
        assert_eq!(normalized_index(0.25, 4), 1);
        assert_eq!(normalized_index(0.9999, 4), 3);
        assert_eq!(normalized_index(1.0, 4), 3);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(
            PartsCatalog::new(Vec::new()).unwrap_err(),
            RenderError::EmptyCatalog
        );
    }

    #[test]
    fn test_grid_layout_positions() {
        let config = grid_config(4);
        let catalog = PartsCatalog::procedural(4, 10);
        let genes = [0.0, 0.0, 0.3, 0.3, 0.6, 0.6, 0.9, 0.9];
        let placed = config.layout.build(&genes, &config, &catalog);

        assert_eq!(placed.len(), 4);
        assert_eq!(placed[0].center, (10.0, 10.0));
        assert_eq!(placed[1].center, (30.0, 10.0));
        assert_eq!(placed[3].center, (30.0, 30.0));
        assert_eq!(placed[1].part, 1);
        assert_eq!(placed[1].rotation, 90.0);
        assert_eq!(placed[3].rotation, 270.0);
    }

    #[test]
    fn test_grid_layout_with_columns() {
        let config = RenderConfig {
            layout: LayoutKind::Grid { columns: Some(3) },
            ..grid_config(5)
        };
        let catalog = PartsCatalog::procedural(2, 5);
        let placed = config.layout.build(&[0.5; 10], &config, &catalog);
        assert_eq!(placed.len(), 5);
        // Three columns, two rows
        assert_eq!(placed[3].center.1, 30.0);
    }

    #[test]
    fn test_point_layout() {
        let config = RenderConfig {
            layout: LayoutKind::Point,
            part_scale_min: 0.5,
            part_scale_max: 1.5,
            snap_angles: Vec::new(),
            ..grid_config(1)
        };
        let catalog = PartsCatalog::procedural(3, 5);
        let placed = config.layout.build(&[0.5, 0.25, 0.75, 0.5, 1.0], &config, &catalog);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].part, 1);
        assert_eq!(placed[0].center, (10.0, 30.0));
        assert_eq!(placed[0].rotation, 180.0);
        assert_eq!(placed[0].scale, 1.5);
    }

    #[test]
    fn test_incomplete_gene_groups_ignored() {
        let config = grid_config(4);
        let catalog = PartsCatalog::procedural(1, 5);
        let placed = config.layout.build(&[0.1, 0.2, 0.3], &config, &catalog);
        assert_eq!(placed.len(), 1);
    }

    #[test]
    fn test_disable_rotation() {
        let config = RenderConfig {
            disable_rotation: true,
            ..grid_config(1)
        };
        assert_eq!(rotation_angle(0.9, &config), 0.0);
    }

    #[test]
    fn test_render_draws_parts() {
        let part = Raster::new(10, 10, BLACK);
        let catalog = PartsCatalog::new(vec![part]).unwrap();
        let renderer = Renderer::new(grid_config(4), catalog).unwrap();
        assert_eq!(renderer.genome_size(), 8);

        let image = renderer.render(&[0.0; 8]);
        assert_eq!((image.width(), image.height()), (40, 40));
        // Cell centers are covered, the gaps between parts are not
        assert_eq!(image.get(10, 10), BLACK);
        assert_eq!(image.get(30, 30), BLACK);
        assert_eq!(image.get(0, 0), WHITE);
        assert_eq!(image.get(20, 20), WHITE);
    }

    #[test]
    fn test_quarter_turn_is_exact() {
        // 4x2 bar rotated 90 degrees covers a 2x4 area
        let part = Raster::new(4, 2, BLACK);
        let mut canvas = Raster::new(10, 10, WHITE);
        draw_part(&mut canvas, &part, (5.0, 5.0), 90.0, 1.0);
        let covered: usize = canvas.pixels().iter().filter(|p| **p == BLACK).count();
        assert_eq!(covered, 8);
        assert_eq!(canvas.get(4, 3), BLACK);
        assert_eq!(canvas.get(3, 4), WHITE);
    }

    #[test]
    fn test_canvas_scale_leaves_margins() {
        let part = Raster::new(20, 20, BLACK);
        let catalog = PartsCatalog::new(vec![part]).unwrap();
        let config = RenderConfig {
            canvas_scale: 0.5,
            ..grid_config(1)
        };
        let renderer = Renderer::new(config, catalog).unwrap();
        let image = renderer.render(&[0.0, 0.0]);
        assert_eq!(image.get(20, 20), BLACK);
        assert_eq!(image.get(5, 5), WHITE);
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = Renderer::new(
            RenderConfig {
                layout: LayoutKind::Point,
                number_of_parts: 6,
                snap_angles: Vec::new(),
                ..grid_config(6)
            },
            PartsCatalog::procedural(8, 12),
        )
        .unwrap();
        let genes: Vec<f64> = (0..renderer.genome_size())
            .map(|i| (i as f64 * 0.137) % 1.0)
            .collect();
        assert_eq!(renderer.render(&genes), renderer.render(&genes));
    }
}
