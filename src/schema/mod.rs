//! Schema module - Configuration and reporting types for the collage search.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
