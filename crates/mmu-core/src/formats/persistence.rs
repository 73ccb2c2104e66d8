//! Example record persistence.
//!
//! Binary layout:
//!
//! ```text
//! +----------+-------------+------------------------+
//! | MMUEXMPL | version u32 | postcard(ExampleRecord) |
//! | 8 bytes  | LE, 4 bytes | rest of file            |
//! +----------+-------------+------------------------+
//! ```
//!
//! JSON is the pretty-printed record. [`decode`] accepts either.

use crate::dataset::ExampleRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Magic bytes opening every binary example.
pub const MAGIC: &[u8; 8] = b"MMUEXMPL";

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not an example file (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("truncated header: {0} bytes")]
    Truncated(usize),

    #[error("binary payload: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown output format '{0}' (expected 'binary' or 'json')")]
    UnknownFormat(String),
}

// =============================================================================
// OUTPUT FORMAT
// =============================================================================

/// On-disk encoding of an example.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Binary,
    Json,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Binary => "mmu",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "bin" | "mmu" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            other => Err(FormatError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Binary => "binary",
            Self::Json => "json",
        })
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a record with the binary header.
pub fn encode_binary(record: &ExampleRecord) -> Result<Vec<u8>, FormatError> {
    let payload = postcard::to_allocvec(record)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a binary example, checking magic and version.
pub fn decode_binary(bytes: &[u8]) -> Result<ExampleRecord, FormatError> {
    if bytes.len() < HEADER_LEN {
        if !MAGIC.starts_with(bytes) {
            return Err(FormatError::BadMagic);
        }
        return Err(FormatError::Truncated(bytes.len()));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(FormatError::BadMagic);
    }
    let (version, payload) = rest.split_at(4);
    let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(payload)?)
}

/// Encode a record as pretty JSON.
pub fn encode_json(record: &ExampleRecord) -> Result<Vec<u8>, FormatError> {
    let mut bytes = serde_json::to_vec_pretty(record)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode_json(bytes: &[u8]) -> Result<ExampleRecord, FormatError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode in the given format.
pub fn encode(record: &ExampleRecord, format: OutputFormat) -> Result<Vec<u8>, FormatError> {
    match format {
        OutputFormat::Binary => encode_binary(record),
        OutputFormat::Json => encode_json(record),
    }
}

/// Decode either format, detected from the leading bytes.
pub fn decode(bytes: &[u8]) -> Result<(ExampleRecord, OutputFormat), FormatError> {
    if bytes.starts_with(MAGIC) {
        decode_binary(bytes).map(|r| (r, OutputFormat::Binary))
    } else if bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        decode_json(bytes).map(|r| (r, OutputFormat::Json))
    } else {
        Err(FormatError::BadMagic)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dataset::FieldValue;
    use crate::lightcurve::BandedBlock;

    fn sample_record() -> ExampleRecord {
        ExampleRecord {
            object_id: 3,
            healpix: 1130,
            source: "2020abc.dat".into(),
            metadata: vec![
                ("SNID".into(), FieldValue::Text("2020abc".into())),
                ("ra".into(), FieldValue::Float(10.5)),
                ("REDSHIFT".into(), FieldValue::Float(f32::NAN)),
                ("NOBS".into(), FieldValue::Int(2)),
            ],
            bands: vec!["g".into(), "r".into()],
            core_keys: vec!["MJD".into()],
            additional_keys: vec![],
            lightcurve: BandedBlock {
                n_bands: 2,
                n_keys: 1,
                max_len: 1,
                values: vec![59000.5, -99.0],
            },
            lightcurve_additional: BandedBlock {
                n_bands: 2,
                n_keys: 0,
                max_len: 1,
                values: vec![],
            },
        }
    }

    fn assert_same(a: &ExampleRecord, b: &ExampleRecord) {
        // NaN != NaN, so compare metadata by display form.
        assert_eq!(a.object_id, b.object_id);
        assert_eq!(a.healpix, b.healpix);
        assert_eq!(a.bands, b.bands);
        assert_eq!(a.lightcurve, b.lightcurve);
        let show = |r: &ExampleRecord| {
            r.metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
        };
        assert_eq!(show(a), show(b));
    }

    #[test]
    fn binary_header_layout() {
        let bytes = encode_binary(&sample_record()).unwrap();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(&bytes[8..12], &FORMAT_VERSION.to_le_bytes());
    }

    #[test]
    fn binary_roundtrip_keeps_nan() {
        let record = sample_record();
        let decoded = decode_binary(&encode_binary(&record).unwrap()).unwrap();
        assert_same(&record, &decoded);
        assert!(matches!(decoded.field("REDSHIFT"), Some(FieldValue::Float(v)) if v.is_nan()));
    }

    #[test]
    fn json_writes_nan_as_null() {
        let bytes = encode_json(&sample_record()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("null"));
        assert!(!text.contains("NaN"));

        let decoded = decode_json(&bytes).unwrap();
        assert_same(&sample_record(), &decoded);
    }

    #[test]
    fn json_reads_infinities_back_as_nan() {
        let mut record = sample_record();
        record.metadata[1].1 = FieldValue::Float(f32::INFINITY);
        record.metadata[2].1 = FieldValue::Float(f32::NEG_INFINITY);
        record.lightcurve.values[1] = f32::INFINITY;

        let bytes = encode_json(&record).unwrap();
        assert!(!String::from_utf8(bytes.clone()).unwrap().contains("inf"));

        let decoded = decode_json(&bytes).unwrap();
        assert!(matches!(decoded.field("ra"), Some(FieldValue::Float(v)) if v.is_nan()));
        assert!(matches!(decoded.field("REDSHIFT"), Some(FieldValue::Float(v)) if v.is_nan()));
        assert!(decoded.lightcurve.values[1].is_nan());
        assert_eq!(decoded.lightcurve.values[0], 59000.5);
    }

    #[test]
    fn decode_detects_format() {
        let record = sample_record();
        let (_, fmt) = decode(&encode(&record, OutputFormat::Binary).unwrap()).unwrap();
        assert_eq!(fmt, OutputFormat::Binary);
        let (_, fmt) = decode(&encode(&record, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(fmt, OutputFormat::Json);
        assert!(matches!(decode(b"garbage"), Err(FormatError::BadMagic)));
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(decode_binary(b"MMU"), Err(FormatError::Truncated(3))));
        assert!(matches!(decode_binary(b"XXXXXXXX\x01\0\0\0"), Err(FormatError::BadMagic)));
        assert!(matches!(decode_binary(b"nope"), Err(FormatError::BadMagic)));

        let mut bytes = encode_binary(&sample_record()).unwrap();
        bytes[8] = 9;
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let bytes = encode_binary(&sample_record()).unwrap();
        let cut = &bytes[..bytes.len() - 4];
        assert!(matches!(decode_binary(cut), Err(FormatError::Postcard(_))));
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("binary".parse::<OutputFormat>().unwrap(), OutputFormat::Binary);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("hdf5".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::default().extension(), "mmu");
    }
}
