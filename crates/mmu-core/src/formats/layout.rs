//! Output directory and file naming.
//!
//! Examples are grouped by pixel:
//!
//! ```text
//! <output>/healpix=0042/example_007.mmu
//! ```
//!
//! Pixel labels are padded to the digit count of `npix`, object ids to the
//! digit count of the number of examples, so names sort numerically.

use super::OutputFormat;

/// Left-pad `n` with zeros to `width` digits.
#[must_use]
pub fn zero_pad(n: u64, width: usize) -> String {
    format!("{n:0width$}")
}

/// Directory name for a pixel, e.g. `healpix=0042`.
#[must_use]
pub fn healpix_dir_name(pixel: u64, width: usize) -> String {
    format!("healpix={}", zero_pad(pixel, width))
}

/// File name for an example, e.g. `example_007.mmu`.
#[must_use]
pub fn example_file_name(object_id: u64, width: usize, format: OutputFormat) -> String {
    format!(
        "example_{}.{}",
        zero_pad(object_id, width),
        format.extension()
    )
}
