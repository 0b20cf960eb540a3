//! RGBA pixel buffers and the pixel-level operations the comparator and
//! renderer share.

/// One pixel: red, green, blue, alpha.
pub type Rgba = [u8; 4];

pub const WHITE: Rgba = [255, 255, 255, 255];
pub const BLACK: Rgba = [0, 0, 0, 255];

/// Row-major RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Raster {
    /// Create a raster filled with one color.
    pub fn new(width: usize, height: usize, fill: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width * height],
        }
    }

    /// Wrap existing pixels. Returns `None` if the length does not match.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgba>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster from a per-pixel function of `(x, y)`.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Rgba) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    /// Source-over composite of `src` onto the pixel at `(x, y)`.
    pub fn blend(&mut self, x: usize, y: usize, src: Rgba) {
        let alpha = src[3] as u32;
        if alpha == 0 {
            return;
        }
        let idx = y * self.width + x;
        if alpha == 255 {
            self.pixels[idx] = src;
            return;
        }
        let dst = self.pixels[idx];
        let mut out = [0u8; 4];
        for c in 0..3 {
            let mixed = src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha);
            out[c] = ((mixed + 127) / 255) as u8;
        }
        out[3] = (alpha + dst[3] as u32 * (255 - alpha) / 255).min(255) as u8;
        self.pixels[idx] = out;
    }

    /// Whether every pixel has equal red, green and blue channels.
    pub fn is_grayscale(&self) -> bool {
        self.pixels.iter().all(|p| p[0] == p[1] && p[1] == p[2])
    }

    /// Dimensions after scaling the longer side to `size`, keeping the
    /// aspect ratio. The shorter side never drops below one pixel.
    pub fn scaled_dimensions(&self, size: usize) -> (usize, usize) {
        if self.width > self.height {
            let h = (self.height as f64 * size as f64 / self.width as f64).round() as usize;
            (size, h.max(1))
        } else {
            let w = (self.width as f64 * size as f64 / self.height as f64).round() as usize;
            (w.max(1), size)
        }
    }

    /// Resize with area averaging.
    ///
    /// Each target pixel averages the source pixels its footprint covers, so
    /// downsampling is smooth and the result is independent of call order.
    /// Upsampling degrades to nearest neighbor.
    pub fn resize(&self, width: usize, height: usize) -> Raster {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.is_empty() || width == 0 || height == 0 {
            return Raster::new(width, height, WHITE);
        }

        let span = |dst: usize, dst_len: usize, src_len: usize| {
            let start = dst * src_len / dst_len;
            let end = ((dst + 1) * src_len).div_ceil(dst_len);
            (start, end.clamp(start + 1, src_len))
        };

        Raster::from_fn(width, height, |x, y| {
            let (x0, x1) = span(x, width, self.width);
            let (y0, y1) = span(y, height, self.height);
            let mut sum = [0u32; 4];
            for sy in y0..y1 {
                for sx in x0..x1 {
                    let p = self.get(sx, sy);
                    for c in 0..4 {
                        sum[c] += p[c] as u32;
                    }
                }
            }
            let count = ((x1 - x0) * (y1 - y0)) as u32;
            let mut out = [0u8; 4];
            for c in 0..4 {
                out[c] = ((sum[c] + count / 2) / count) as u8;
            }
            out
        })
    }

    /// Resize so the longer side equals `size`.
    pub fn resize_longer_side(&self, size: usize) -> Raster {
        let (w, h) = self.scaled_dimensions(size);
        self.resize(w, h)
    }

    /// Erode dark regions outward: each pixel takes the darkest of itself and
    /// its four neighbors (by luminance). Edges clamp.
    pub fn erode(&self) -> Raster {
        Raster::from_fn(self.width, self.height, |x, y| {
            let mut best = self.get(x, y);
            let mut best_lum = luminance(best);
            let neighbors = [
                (x.saturating_sub(1), y),
                ((x + 1).min(self.width - 1), y),
                (x, y.saturating_sub(1)),
                (x, (y + 1).min(self.height - 1)),
            ];
            for (nx, ny) in neighbors {
                let p = self.get(nx, ny);
                let lum = luminance(p);
                if lum < best_lum {
                    best = p;
                    best_lum = lum;
                }
            }
            best
        })
    }
}

/// Brightness: the largest color channel.
#[inline]
pub fn brightness(p: Rgba) -> f64 {
    p[0].max(p[1]).max(p[2]) as f64
}

/// Integer luminance, `(77 r + 151 g + 28 b) >> 8`.
#[inline]
pub fn luminance(p: Rgba) -> u8 {
    ((77 * p[0] as u32 + 151 * p[1] as u32 + 28 * p[2] as u32) >> 8) as u8
}

/// Mean of the three color channels.
#[inline]
pub fn channel_mean(p: Rgba) -> f64 {
    (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0
}

/// Hue scaled to `[0, 255)`. Unsaturated pixels have hue 0.
pub fn hue(p: Rgba) -> f64 {
    let (r, g, b) = (p[0] as f64, p[1] as f64, p[2] as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0.0 || max == min {
        return 0.0;
    }
    let range = max - min;
    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;
    let sector = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let mut h = sector / 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    h * 255.0
}
