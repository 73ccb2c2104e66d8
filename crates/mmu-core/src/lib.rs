//! # mmu-core
//!
//! Conversion engine for Multimodal Universe light curves.
//!
//! The pipeline is:
//!
//! ```text
//! SNANA ASCII text ──► snana::parse_snana ──► SnanaFile
//!                                                │
//!       DatasetSchema::from_files ◄──────────────┤
//!                 │                              │
//!                 ▼                              ▼
//!        dataset::assemble ──► ExampleRecord (per object)
//!                                   │
//!                                   ▼
//!                 formats::encode (binary / JSON) + layout paths
//! ```
//!
//! This crate never touches the filesystem. Directory listing, writing and
//! logging live in the `mmu` binary.

pub mod dataset;
pub mod formats;
pub mod healpix;
pub mod lightcurve;
pub mod snana;

pub use dataset::{
    ConversionOptions, DatasetError, DatasetSchema, ExampleRecord, FieldKind, FieldValue,
    NamedSource, assemble,
};
pub use formats::{
    FormatError, OutputFormat, decode, decode_binary, decode_json, encode, encode_binary,
    encode_json, example_file_name, healpix_dir_name, zero_pad,
};
pub use healpix::{DEFAULT_NSIDE, Healpix, HealpixError};
pub use lightcurve::{BandedBlock, PadRule, align_bands};
pub use snana::{MetaValue, SnanaError, SnanaFile, parse_snana, parse_snana_with_table};

use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum MmuError {
    /// SNANA input could not be parsed.
    #[error("{source_name}: {error}")]
    Snana {
        /// Name of the offending input (usually the file name).
        source_name: String,
        /// The underlying parse error.
        error: SnanaError,
    },

    /// HEALPix parameters or coordinates were invalid.
    #[error(transparent)]
    Healpix(#[from] HealpixError),

    /// Dataset assembly failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Encoding or decoding an example record failed.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl MmuError {
    /// Attach an input name to a parse error.
    pub fn snana(source_name: impl Into<String>, error: SnanaError) -> Self {
        Self::Snana {
            source_name: source_name.into(),
            error,
        }
    }
}

/// Count decimal digits of `n` (`0` has one digit).
#[must_use]
pub fn decimal_digits(n: u64) -> usize {
    let mut digits = 1;
    let mut rest = n / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_digits_counts() {
        assert_eq!(decimal_digits(0), 1);
        assert_eq!(decimal_digits(9), 1);
        assert_eq!(decimal_digits(10), 2);
        assert_eq!(decimal_digits(3072), 4);
        assert_eq!(decimal_digits(u64::MAX), 20);
    }

    #[test]
    fn snana_error_carries_source_name() {
        let err = MmuError::snana("obj_01.dat", SnanaError::DuplicateVarlist { line: 7 });
        let text = err.to_string();
        assert!(text.starts_with("obj_01.dat:"));
        assert!(text.contains("line 7"));
    }
}
