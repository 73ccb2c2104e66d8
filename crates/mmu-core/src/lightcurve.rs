//! # Light-curve Band Alignment
//!
//! Rearranges a flat observation table (one row per observation, each row
//! tagged with its band) into a dense `[band][key][time]` block.
//!
//! Every band is padded at the end to the length of the longest band of the
//! object, so the block is rectangular. Bands the object never observed are
//! fully padded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column holding observation times.
pub const MJD_KEY: &str = "MJD";

/// Pad value for time columns.
pub const MJD_PAD: f32 = -99.0;

/// Pad value for every other column.
pub const DEFAULT_PAD: f32 = 0.0;

// =============================================================================
// PADDING
// =============================================================================

/// Chooses the pad value per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadRule {
    /// Column that gets `time_pad`.
    pub time_key: String,
    /// Pad for the time column.
    pub time_pad: f32,
    /// Pad for all other columns.
    pub default_pad: f32,
}

impl Default for PadRule {
    fn default() -> Self {
        Self {
            time_key: MJD_KEY.to_string(),
            time_pad: MJD_PAD,
            default_pad: DEFAULT_PAD,
        }
    }
}

impl PadRule {
    #[must_use]
    pub fn pad_for(&self, key: &str) -> f32 {
        if key == self.time_key {
            self.time_pad
        } else {
            self.default_pad
        }
    }
}

// =============================================================================
// BANDED BLOCK
// =============================================================================

/// A dense `[band][key][time]` array of f32, stored row-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandedBlock {
    pub n_bands: usize,
    pub n_keys: usize,
    pub max_len: usize,
    #[serde(with = "crate::formats::nan_vec")]
    pub values: Vec<f32>,
}

impl BandedBlock {
    /// `[n_bands, n_keys, max_len]`
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        [self.n_bands, self.n_keys, self.max_len]
    }

    fn offset(&self, band: usize, key: usize) -> usize {
        (band * self.n_keys + key) * self.max_len
    }

    /// Single value, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, band: usize, key: usize, t: usize) -> Option<f32> {
        if band >= self.n_bands || key >= self.n_keys || t >= self.max_len {
            return None;
        }
        self.values.get(self.offset(band, key) + t).copied()
    }

    /// The padded series of one key in one band.
    #[must_use]
    pub fn series(&self, band: usize, key: usize) -> Option<&[f32]> {
        if band >= self.n_bands || key >= self.n_keys {
            return None;
        }
        let start = self.offset(band, key);
        self.values.get(start..start + self.max_len)
    }

    /// Whether the stored values match the declared shape.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.n_bands
            .checked_mul(self.n_keys)
            .and_then(|n| n.checked_mul(self.max_len))
            == Some(self.values.len())
    }
}

/// Arrange one object's observations by band.
///
/// - `bands`: the dataset band list, sorted.
/// - `flt`: band of each observation row.
/// - `keys` / `series`: column names and their values, each `flt.len()` long.
///
/// Rows whose band is not in `bands` are dropped.
#[must_use]
pub fn align_bands(
    bands: &[String],
    flt: &[&str],
    keys: &[String],
    series: &[Vec<f64>],
    pad: &PadRule,
) -> BandedBlock {
    let band_index: BTreeMap<&str, usize> = bands
        .iter()
        .enumerate()
        .map(|(i, b)| (b.as_str(), i))
        .collect();

    // Row indices per band, in observation order.
    let mut rows_by_band: Vec<Vec<usize>> = vec![Vec::new(); bands.len()];
    for (row, band) in flt.iter().enumerate() {
        if let Some(&b) = band_index.get(band) {
            rows_by_band[b].push(row);
        }
    }
    let max_len = rows_by_band.iter().map(Vec::len).max().unwrap_or(0);

    let mut block = BandedBlock {
        n_bands: bands.len(),
        n_keys: keys.len(),
        max_len,
        values: Vec::with_capacity(bands.len() * keys.len() * max_len),
    };

    for rows in &rows_by_band {
        for (key, column) in keys.iter().zip(series) {
            let fill = pad.pad_for(key);
            block.values.extend(
                rows.iter()
                    .map(|&r| column.get(r).map_or(f32::NAN, |&v| v as f32)),
            );
            block
                .values
                .extend(std::iter::repeat_n(fill, max_len - rows.len()));
        }
    }

    block
}

// =============================================================================
// TESTS
// =============================================================================
