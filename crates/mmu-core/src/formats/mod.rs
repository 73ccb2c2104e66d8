//! # Formats Module
//!
//! Serialization and layout of converted examples.
//!
//! This module contains:
//! - Binary example format (header + postcard payload)
//! - JSON example format (serde_json, NaN written as `null`)
//! - Output layout naming (`healpix=NNNN/example_NNN.ext`)
//!
//! Note: File I/O operations remain in the app layer (apps/mmu).
//! This module only handles format conversion (pure transformations).

mod layout;
mod nan;
mod persistence;

pub use layout::*;
pub use nan::{nan_f32, nan_vec};
pub use persistence::*;
