//! # SNANA ASCII Reader
//!
//! Line-oriented parser for SNANA light-curve text files.
//!
//! Every meaningful line starts with a `KEY:` token:
//!
//! ```text
//! SNID:      2020abc
//! RA:        150.123
//! DECL:      2.456
//! VARLIST:   MJD  FLT  FLUXCAL  FLUXCALERR
//! OBS:  59000.1  g  102.3  4.1
//! OBS:  59000.2  r   98.7  3.9
//! END:
//! ```
//!
//! `VARLIST:` names the observation columns, rows of the observation table
//! (`OBS:` by default) carry one observation each, and every other keyed line
//! is object metadata holding the first value token.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default name of the observation table.
pub const DEFAULT_TABLE: &str = "OBS";

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while reading SNANA text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnanaError {
    /// An observation row appeared before any `VARLIST:` line.
    #[error("observation row before VARLIST at line {line}")]
    RowBeforeVarlist { line: usize },

    /// The file declared its columns twice.
    #[error("duplicate VARLIST at line {line}")]
    DuplicateVarlist { line: usize },

    /// `VARLIST:` had no column names.
    #[error("empty VARLIST at line {line}")]
    EmptyVarlist { line: usize },

    /// An observation row had the wrong number of values.
    #[error("line {line}: expected {expected} values, found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// METADATA VALUES
// =============================================================================

/// A scalar metadata value, cast the way SNANA readers do: integer first,
/// then float, then plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// Cast a raw token.
    #[must_use]
    pub fn cast(token: &str) -> Self {
        if let Ok(v) = token.parse::<i64>() {
            Self::Int(v)
        } else if let Ok(v) = token.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Text(token.to_string())
        }
    }

    /// Numeric view of the value. Text that does not parse gives `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Whether this value is numeric (int or float).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// =============================================================================
// PARSED FILE
// =============================================================================

/// One parsed SNANA file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnanaFile {
    /// Metadata in first-seen order.
    pub metadata: Vec<(String, MetaValue)>,
    /// Observation column names from `VARLIST:`.
    pub columns: Vec<String>,
    /// Raw observation tokens, one vector per row, `columns.len()` wide.
    pub rows: Vec<Vec<String>>,
}

impl SnanaFile {
    /// Index of an observation column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Look up a metadata value by key.
    #[must_use]
    pub fn meta(&self, name: &str) -> Option<&MetaValue> {
        self.metadata
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Number of observation rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Tokens of one column, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[index].as_str())
    }
}

/// Parse SNANA text using the default `OBS` table name.
pub fn parse_snana(text: &str) -> Result<SnanaFile, SnanaError> {
    parse_snana_with_table(text, DEFAULT_TABLE)
}

/// Parse SNANA text whose observation rows are keyed by `table`.
pub fn parse_snana_with_table(text: &str, table: &str) -> Result<SnanaFile, SnanaError> {
    let mut file = SnanaFile::default();
    let mut has_varlist = false;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        let Some(key) = first.strip_suffix(':') else {
            continue;
        };

        if key == "VARLIST" {
            if has_varlist {
                return Err(SnanaError::DuplicateVarlist { line: line_no });
            }
            file.columns = tokens.map(str::to_string).collect();
            if file.columns.is_empty() {
                return Err(SnanaError::EmptyVarlist { line: line_no });
            }
            has_varlist = true;
        } else if key == table {
            if !has_varlist {
                return Err(SnanaError::RowBeforeVarlist { line: line_no });
            }
            let row: Vec<String> = tokens.map(str::to_string).collect();
            if row.len() != file.columns.len() {
                return Err(SnanaError::RowWidth {
                    line: line_no,
                    expected: file.columns.len(),
                    found: row.len(),
                });
            }
            file.rows.push(row);
        } else if file.meta(key).is_none() {
            let value = tokens
                .next()
                .map_or_else(|| MetaValue::Text(String::new()), MetaValue::cast);
            file.metadata.push((key.to_string(), value));
        }
    }

    Ok(file)
}

// =============================================================================
// TESTS
// =============================================================================
