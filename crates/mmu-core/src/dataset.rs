//! # Dataset Assembly
//!
//! Turns a set of parsed SNANA files into one [`ExampleRecord`] per object.
//!
//! Assembly runs in two passes:
//! 1. [`DatasetSchema::from_files`] looks at every file to fix the metadata
//!    columns and their types, the observation keys and the band list.
//! 2. [`assemble`] converts each file against that schema. It numbers the
//!    objects, assigns their HEALPix pixel and aligns their light curves by band.

use crate::healpix::{Healpix, HealpixError};
use crate::lightcurve::{BandedBlock, PadRule, align_bands};
use crate::snana::{MetaValue, SnanaFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Keys dropped from metadata and observation columns by default.
pub const DEFAULT_IGNORED_KEYS: &[&str] = &[
    "END",
    "END_PHOTOMETRY",
    "FIELD",
    "FLAG",
    "MASK_USED",
    "#_keywords_from_LC_processing",
    "#_PHOTCAT",
    "#_CNTRD_FLUX_OFFSET",
    "#_HOSTNAME",
    "#_IMSIZE_PIX",
    "#_DIST_FROM_CENTER_DEG",
];

/// Observation keys that make up the core light curve.
pub const DEFAULT_CORE_KEYS: &[&str] = &["MJD", "FLUXCAL", "FLUXCALERR"];

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("no input files")]
    Empty,

    #[error("{source_name}: no '{column}' observation column")]
    MissingBandColumn { source_name: String, column: String },

    #[error("{source_name}: column '{column}' row {row}: '{value}' is not a number")]
    InvalidNumber {
        source_name: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("{source_name}: missing or non-numeric sky coordinates")]
    MissingCoordinates { source_name: String },

    #[error("{source_name}: {error}")]
    Coordinates {
        source_name: String,
        error: HealpixError,
    },
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs for schema derivation and assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Keys dropped from both metadata and observations.
    pub ignored_keys: Vec<String>,
    /// Observation keys routed to the core light curve.
    pub core_keys: Vec<String>,
    /// Observation column holding the band.
    pub band_key: String,
    /// Metadata key holding right ascension (degrees).
    pub ra_key: String,
    /// Metadata key holding declination (degrees).
    pub dec_key: String,
    /// Output names for renamed metadata keys.
    pub renames: Vec<(String, String)>,
    /// Padding applied to band series.
    pub pad: PadRule,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            ignored_keys: DEFAULT_IGNORED_KEYS.iter().map(|k| (*k).to_string()).collect(),
            core_keys: DEFAULT_CORE_KEYS.iter().map(|k| (*k).to_string()).collect(),
            band_key: "FLT".to_string(),
            ra_key: "RA".to_string(),
            dec_key: "DECL".to_string(),
            renames: vec![
                ("RA".to_string(), "ra".to_string()),
                ("DECL".to_string(), "dec".to_string()),
            ],
            pad: PadRule::default(),
        }
    }
}

impl ConversionOptions {
    #[must_use]
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_keys.iter().any(|k| k == key)
    }

    /// Name a metadata key is stored under.
    #[must_use]
    pub fn output_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| from == key)
            .map_or(key, |(_, to)| to.as_str())
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// Storage type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Float,
    Text,
}

/// A typed metadata value in an output record. Floats are narrowed to f32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Float(#[serde(with = "crate::formats::nan_f32")] f32),
    Text(String),
}

impl FieldValue {
    /// Convert a raw value (or its absence) to the column's kind.
    #[must_use]
    pub fn convert(raw: Option<&MetaValue>, kind: FieldKind) -> Self {
        match (kind, raw) {
            (FieldKind::Int, Some(MetaValue::Int(v))) => Self::Int(*v),
            (FieldKind::Text, Some(MetaValue::Text(s))) => Self::Text(s.clone()),
            (FieldKind::Text, Some(other)) => Self::Text(other.to_string()),
            (FieldKind::Text, None) => Self::Text("nan".to_string()),
            (_, raw) => Self::Float(raw.and_then(MetaValue::as_f64).map_or(f32::NAN, |v| v as f32)),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// A parsed input file and the name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSource {
    pub name: String,
    pub file: SnanaFile,
}

impl NamedSource {
    pub fn new(name: impl Into<String>, file: SnanaFile) -> Self {
        Self {
            name: name.into(),
            file,
        }
    }
}

/// Column layout shared by every example of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Metadata keys (input names) with their storage kind.
    pub metadata: Vec<(String, FieldKind)>,
    /// Observation keys in the core block, VARLIST order.
    pub core_keys: Vec<String>,
    /// Remaining observation keys, VARLIST order.
    pub additional_keys: Vec<String>,
    /// Sorted unique bands over the whole dataset.
    pub bands: Vec<String>,
}

impl DatasetSchema {
    /// Derive the schema from every input file.
    ///
    /// Observation keys come from the first file; metadata keys are the union
    /// over all files in first-seen order.
    pub fn from_files(
        sources: &[NamedSource],
        options: &ConversionOptions,
    ) -> Result<Self, DatasetError> {
        let first = sources.first().ok_or(DatasetError::Empty)?;

        let mut metadata_keys: Vec<String> = Vec::new();
        for source in sources {
            for (key, _) in &source.file.metadata {
                if !options.is_ignored(key) && !metadata_keys.contains(key) {
                    metadata_keys.push(key.clone());
                }
            }
        }

        let metadata = metadata_keys
            .into_iter()
            .map(|key| {
                let kind = infer_kind(sources.iter().map(|s| s.file.meta(&key)));
                (key, kind)
            })
            .collect();

        let (core_keys, additional_keys): (Vec<String>, Vec<String>) = first
            .file
            .columns
            .iter()
            .filter(|c| **c != options.band_key && !options.is_ignored(c))
            .cloned()
            .partition(|c| options.core_keys.contains(c));

        let mut bands = BTreeSet::new();
        for source in sources {
            let index = band_column(source, options)?;
            bands.extend(source.file.column_values(index).map(str::to_string));
        }

        Ok(Self {
            metadata,
            core_keys,
            additional_keys,
            bands: bands.into_iter().collect(),
        })
    }

    /// Kind of a metadata column by input name.
    #[must_use]
    pub fn kind_of(&self, key: &str) -> Option<FieldKind> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, kind)| *kind)
    }
}

fn infer_kind<'a>(values: impl Iterator<Item = Option<&'a MetaValue>>) -> FieldKind {
    let mut kind = FieldKind::Int;
    for value in values {
        match value {
            Some(MetaValue::Text(_)) => return FieldKind::Text,
            Some(MetaValue::Float(_)) | None => kind = FieldKind::Float,
            Some(MetaValue::Int(_)) => {}
        }
    }
    kind
}

fn band_column(source: &NamedSource, options: &ConversionOptions) -> Result<usize, DatasetError> {
    source
        .file
        .column(&options.band_key)
        .ok_or_else(|| DatasetError::MissingBandColumn {
            source_name: source.name.clone(),
            column: options.band_key.clone(),
        })
}

// =============================================================================
// EXAMPLE RECORD
// =============================================================================

/// One converted object, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// 1-based position in the input order.
    pub object_id: u64,
    /// NESTED HEALPix pixel of (ra, dec).
    pub healpix: u64,
    /// Input name the record was built from.
    pub source: String,
    /// Typed metadata under output names.
    pub metadata: Vec<(String, FieldValue)>,
    /// Band labels indexing the first block axis.
    pub bands: Vec<String>,
    /// Keys indexing the second axis of `lightcurve`.
    pub core_keys: Vec<String>,
    /// Keys indexing the second axis of `lightcurve_additional`.
    pub additional_keys: Vec<String>,
    pub lightcurve: BandedBlock,
    pub lightcurve_additional: BandedBlock,
}

impl ExampleRecord {
    /// Metadata value by output name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.metadata
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// Convert every source against `schema`.
///
/// Object ids follow the order of `sources`, starting at 1.
pub fn assemble(
    sources: &[NamedSource],
    schema: &DatasetSchema,
    healpix: &Healpix,
    options: &ConversionOptions,
) -> Result<Vec<ExampleRecord>, DatasetError> {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| assemble_one(i as u64 + 1, source, schema, healpix, options))
        .collect()
}

fn assemble_one(
    object_id: u64,
    source: &NamedSource,
    schema: &DatasetSchema,
    healpix: &Healpix,
    options: &ConversionOptions,
) -> Result<ExampleRecord, DatasetError> {
    let file = &source.file;
    let band_index = band_column(source, options)?;
    let flt: Vec<&str> = file.column_values(band_index).collect();

    let core_series = numeric_columns(source, &schema.core_keys)?;
    let additional_series = numeric_columns(source, &schema.additional_keys)?;

    let lightcurve = align_bands(
        &schema.bands,
        &flt,
        &schema.core_keys,
        &core_series,
        &options.pad,
    );
    let lightcurve_additional = align_bands(
        &schema.bands,
        &flt,
        &schema.additional_keys,
        &additional_series,
        &options.pad,
    );

    // Float columns are stored as f32, so the pixel is taken from the stored value.
    let coordinate = |key: &str| -> Option<f64> {
        let value = file.meta(key).and_then(MetaValue::as_f64)?;
        match schema.kind_of(key) {
            Some(FieldKind::Float) => Some(f64::from(value as f32)),
            _ => Some(value),
        }
    };
    let (Some(ra), Some(dec)) = (coordinate(&options.ra_key), coordinate(&options.dec_key)) else {
        return Err(DatasetError::MissingCoordinates {
            source_name: source.name.clone(),
        });
    };
    let pixel = healpix
        .ang2pix_lonlat(ra, dec)
        .map_err(|error| DatasetError::Coordinates {
            source_name: source.name.clone(),
            error,
        })?;

    let metadata = schema
        .metadata
        .iter()
        .map(|(key, kind)| {
            (
                options.output_name(key).to_string(),
                FieldValue::convert(file.meta(key), *kind),
            )
        })
        .collect();

    Ok(ExampleRecord {
        object_id,
        healpix: pixel,
        source: source.name.clone(),
        metadata,
        bands: schema.bands.clone(),
        core_keys: schema.core_keys.clone(),
        additional_keys: schema.additional_keys.clone(),
        lightcurve,
        lightcurve_additional,
    })
}

/// Parse observation columns as numbers. Absent columns are all NaN.
fn numeric_columns(source: &NamedSource, keys: &[String]) -> Result<Vec<Vec<f64>>, DatasetError> {
    let file = &source.file;
    keys.iter()
        .map(|key| {
            let Some(index) = file.column(key) else {
                return Ok(vec![f64::NAN; file.row_count()]);
            };
            file.column_values(index)
                .enumerate()
                .map(|(row, token)| {
                    token.parse::<f64>().map_err(|_| DatasetError::InvalidNumber {
                        source_name: source.name.clone(),
                        column: key.clone(),
                        row: row + 1,
                        value: token.to_string(),
                    })
                })
                .collect()
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
