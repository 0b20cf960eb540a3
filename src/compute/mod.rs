//! Compute module - Rasters, image comparison, collage rendering, and the
//! evolutionary search.

mod comparator;
mod raster;
mod render;

pub mod evolution;

pub use comparator::*;
pub use raster::*;
pub use render::*;
