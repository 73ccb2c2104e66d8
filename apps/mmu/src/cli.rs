//! # CLI Module
//!
//! Command definitions and handlers for the `mmu` binary.
//!
//! Each `cmd_*` function does its own I/O and returns the value it printed,
//! so integration tests can check results without scraping stdout.

use crate::config::{ConfigError, ConvertConfig};
use clap::{ArgAction, Parser, Subcommand};
use mmu_core::formats::{self, FormatError, OutputFormat};
use mmu_core::{
    DatasetError, DatasetSchema, ExampleRecord, Healpix, MmuError, NamedSource, assemble,
    decimal_digits, parse_snana_with_table,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no input files in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error(
        "refusing to remove {}: output {} lies inside it",
        .input.display(),
        .output.display()
    )]
    OutputInsideInput { input: PathBuf, output: PathBuf },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mmu(#[from] MmuError),

    #[error("json output: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DatasetError> for CliError {
    fn from(err: DatasetError) -> Self {
        Self::Mmu(err.into())
    }
}

impl From<FormatError> for CliError {
    fn from(err: FormatError) -> Self {
        Self::Mmu(err.into())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// =============================================================================
// CLI DEFINITION
// =============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "mmu",
    version,
    about = "Convert survey light curves into the Multimodal Universe layout"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a directory of SNANA files into healpix-partitioned examples
    Convert {
        /// Directory holding the SNANA ASCII files
        input_dir: PathBuf,
        /// Directory that receives the healpix=NNNN folders
        output_dir: PathBuf,
        /// Example encoding: binary or json
        #[arg(long)]
        format: Option<OutputFormat>,
        /// HEALPix resolution (power of two)
        #[arg(long)]
        nside: Option<u64>,
        /// Extra key to drop (repeatable)
        #[arg(long = "ignore-key")]
        ignore_keys: Vec<String>,
        /// Delete the input directory after a successful conversion
        #[arg(long)]
        remove_source: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the contents of one converted example
    Inspect {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Print the schema derived from an input directory without converting
    Schema {
        input_dir: PathBuf,
        #[arg(long = "ignore-key")]
        ignore_keys: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Convert {
            input_dir,
            output_dir,
            format,
            nside,
            ignore_keys,
            remove_source,
            json,
        } => {
            let mut config = ConvertConfig::from_env()?;
            if let Some(format) = format {
                config.format = format;
            }
            if let Some(nside) = nside {
                config.nside = nside;
            }
            config.add_ignored_keys(&ignore_keys);
            config.remove_source |= remove_source;
            cmd_convert(&input_dir, &output_dir, &config, json).map(|_| ())
        }
        Commands::Inspect { file, json } => cmd_inspect(&file, json).map(|_| ()),
        Commands::Schema {
            input_dir,
            ignore_keys,
            json,
        } => {
            let mut config = ConvertConfig::from_env()?;
            config.add_ignored_keys(&ignore_keys);
            cmd_schema(&input_dir, &config, json).map(|_| ())
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Regular files of `dir`, sorted by name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-file entry");
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(CliError::EmptyInput(dir.to_path_buf()));
    }
    Ok(files)
}

/// Read and parse every file of `dir`.
pub fn load_sources(dir: &Path, table: &str) -> Result<Vec<NamedSource>, CliError> {
    let files = list_input_files(dir)?;
    info!(count = files.len(), dir = %dir.display(), "reading SNANA files");

    files
        .iter()
        .map(|path| -> Result<NamedSource, CliError> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let text = fs::read_to_string(path).map_err(io_error(path))?;
            let file =
                parse_snana_with_table(&text, table).map_err(|e| MmuError::snana(&name, e))?;
            if file.row_count() == 0 {
                warn!(file = %name, "no observations");
            }
            debug!(file = %name, rows = file.row_count(), "parsed");
            Ok(NamedSource::new(name, file))
        })
        .collect()
}

// =============================================================================
// CONVERT
// =============================================================================

/// Result of a conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    pub examples: usize,
    pub bands: Vec<String>,
    pub healpix_dirs: usize,
    pub format: OutputFormat,
    pub output_dir: PathBuf,
    pub removed_source: bool,
}

/// Convert `input` into healpix-partitioned examples under `output`.
pub fn cmd_convert(
    input: &Path,
    output: &Path,
    config: &ConvertConfig,
    json: bool,
) -> Result<ConvertSummary, CliError> {
    let healpix = config.healpix()?;
    if config.remove_source {
        check_removable(input, output)?;
    }
    let sources = load_sources(input, &config.table)?;

    let schema = DatasetSchema::from_files(&sources, &config.options)?;
    info!(
        bands = schema.bands.len(),
        metadata = schema.metadata.len(),
        core = schema.core_keys.len(),
        additional = schema.additional_keys.len(),
        "derived schema"
    );

    let records = assemble(&sources, &schema, &healpix, &config.options)?;
    let pixels = write_examples(output, &records, &healpix, config.format)?;
    info!(
        examples = records.len(),
        healpix_dirs = pixels.len(),
        output = %output.display(),
        "wrote examples"
    );

    let removed_source = if config.remove_source {
        remove_source(input, output)?;
        true
    } else {
        false
    };

    let summary = ConvertSummary {
        examples: records.len(),
        bands: schema.bands,
        healpix_dirs: pixels.len(),
        format: config.format,
        output_dir: output.to_path_buf(),
        removed_source,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Converted {} examples", summary.examples);
        println!("  bands:        {}", summary.bands.join(", "));
        println!("  healpix dirs: {}", summary.healpix_dirs);
        println!("  format:       {}", summary.format);
        println!("  output:       {}", summary.output_dir.display());
        if summary.removed_source {
            println!("  removed:      {}", input.display());
        }
    }

    Ok(summary)
}

/// Write one file per record into its `healpix=NNNN` directory.
///
/// Returns the set of pixels that received examples.
pub fn write_examples(
    output: &Path,
    records: &[ExampleRecord],
    healpix: &Healpix,
    format: OutputFormat,
) -> Result<BTreeSet<u64>, CliError> {
    let pixel_width = healpix.label_width();
    let id_width = decimal_digits(records.len() as u64);

    let pixels: BTreeSet<u64> = records.iter().map(|r| r.healpix).collect();
    for pixel in &pixels {
        let dir = output.join(formats::healpix_dir_name(*pixel, pixel_width));
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    }

    for record in records {
        let path = example_path(output, record, pixel_width, id_width, format);
        let bytes = formats::encode(record, format)?;
        fs::write(&path, bytes).map_err(io_error(&path))?;
        debug!(object_id = record.object_id, path = %path.display(), "wrote example");
    }

    Ok(pixels)
}

/// Where an example lands inside `output`.
pub fn example_path(
    output: &Path,
    record: &ExampleRecord,
    pixel_width: usize,
    id_width: usize,
    format: OutputFormat,
) -> PathBuf {
    output
        .join(formats::healpix_dir_name(record.healpix, pixel_width))
        .join(formats::example_file_name(record.object_id, id_width, format))
}

/// Fail unless `input` can be deleted without taking `output` with it.
fn check_removable(input: &Path, output: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input).map_err(io_error(input))?;
    let output_abs = resolve_path(output)?;
    if output_abs.starts_with(&input_abs) {
        return Err(CliError::OutputInsideInput {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonical form of `path`, which may not exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing tail is
/// appended to it.
fn resolve_path(path: &Path) -> Result<PathBuf, CliError> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match fs::canonicalize(current) {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc: PathBuf, part| acc.join(part)));
            }
            Err(source) => match (current.parent(), current.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    current = if parent.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        parent
                    };
                }
                _ => return Err(io_error(path)(source)),
            },
        }
    }
}

fn remove_source(input: &Path, output: &Path) -> Result<(), CliError> {
    check_removable(input, output)?;
    warn!(input = %input.display(), "removing source directory");
    fs::remove_dir_all(input).map_err(io_error(input))
}

// =============================================================================
// INSPECT
// =============================================================================

/// Decode one example file and print it.
pub fn cmd_inspect(path: &Path, json: bool) -> Result<ExampleRecord, CliError> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    let (record, format) = formats::decode(&bytes)?;
    debug!(path = %path.display(), %format, "decoded example");

    if json {
        println!("{}", String::from_utf8_lossy(&formats::encode_json(&record)?));
    } else {
        println!("example {} (source {})", record.object_id, record.source);
        println!("  format:     {format}");
        println!("  healpix:    {}", record.healpix);
        println!("  bands:      {}", record.bands.join(", "));
        println!(
            "  lightcurve: {:?} ({})",
            record.lightcurve.shape(),
            record.core_keys.join(", ")
        );
        println!(
            "  additional: {:?} ({})",
            record.lightcurve_additional.shape(),
            record.additional_keys.join(", ")
        );
        println!("  metadata:");
        for (key, value) in &record.metadata {
            println!("    {key} = {value}");
        }
    }

    Ok(record)
}

// =============================================================================
// SCHEMA
// =============================================================================

/// Derive and print the schema of an input directory.
pub fn cmd_schema(
    input: &Path,
    config: &ConvertConfig,
    json: bool,
) -> Result<DatasetSchema, CliError> {
    let sources = load_sources(input, &config.table)?;
    let schema = DatasetSchema::from_files(&sources, &config.options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        println!("files:      {}", sources.len());
        println!("bands:      {}", schema.bands.join(", "));
        println!("core:       {}", schema.core_keys.join(", "));
        println!("additional: {}", schema.additional_keys.join(", "));
        println!("metadata:");
        for (key, kind) in &schema.metadata {
            println!(
                "  {:<24} {:?} -> {}",
                key,
                kind,
                config.options.output_name(key)
            );
        }
    }

    Ok(schema)
}
