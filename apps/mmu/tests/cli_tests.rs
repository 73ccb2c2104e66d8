//! Integration tests for mmu CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use mmu::cli::{
    Cli, CliError, Commands, cmd_convert, cmd_inspect, cmd_schema, list_input_files, run,
};
use mmu::config::ConvertConfig;
use mmu_core::{FieldValue, Healpix, OutputFormat, healpix_dir_name};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn snana(snid: &str, ra: f64, dec: f64, obs: &[(f64, &str, f64)]) -> String {
    let mut text = format!(
        "SURVEY: YSE\nSNID: {snid}\nRA: {ra}\nDECL: {dec}\nMWEBV: 0.02\n#_PHOTCAT: ps1\n\n\
         VARLIST: MJD FLT FIELD FLUXCAL FLUXCALERR PHOTFLAG\n"
    );
    for (mjd, band, flux) in obs {
        text.push_str(&format!("OBS: {mjd} {band} VIEW {flux} 1.5 4096\n"));
    }
    text.push_str("END:\n");
    text
}

/// Three objects: two share a sky position, one is far away.
fn create_input_dir(root: &TempDir) -> PathBuf {
    let dir = root.path().join("yse_dr1");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(
        dir.join("2020aaa.dat"),
        snana(
            "2020aaa",
            10.5,
            -5.25,
            &[(59000.0, "g", 10.0), (59001.0, "r", 20.0), (59002.0, "g", 30.0)],
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("2020bbb.dat"),
        snana("2020bbb", 10.5, -5.25, &[(59100.0, "X", 5.0)]),
    )
    .unwrap();
    std::fs::write(
        dir.join("2020ccc.dat"),
        snana(
            "2020ccc",
            250.0,
            60.0,
            &[(59200.0, "r", 7.0), (59201.0, "r", 8.0)],
        ),
    )
    .unwrap();
    dir
}

fn example_files(output: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in std::fs::read_dir(output).unwrap() {
        let dir = dir.unwrap().path();
        for file in std::fs::read_dir(&dir).unwrap() {
            files.push(file.unwrap().path());
        }
    }
    files.sort();
    files
}

// =============================================================================
// CONVERT COMMAND TESTS
// =============================================================================

#[test]
fn test_convert_writes_healpix_layout() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = temp.path().join("out");

    let summary = cmd_convert(&input, &output, &ConvertConfig::default(), false).unwrap();
    assert_eq!(summary.examples, 3);
    assert_eq!(summary.bands, vec!["X", "g", "r"]);
    assert_eq!(summary.healpix_dirs, 2);
    assert!(!summary.removed_source);
    assert!(input.exists());

    let hp = Healpix::default();
    let near = hp.ang2pix_lonlat(10.5, -5.25).unwrap();
    let dir = output.join(healpix_dir_name(near, 4));
    assert!(dir.join("example_1.mmu").exists());
    assert!(dir.join("example_2.mmu").exists());

    let far = hp.ang2pix_lonlat(250.0, 60.0).unwrap();
    assert!(output.join(healpix_dir_name(far, 4)).join("example_3.mmu").exists());
}

#[test]
fn test_convert_then_inspect() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = temp.path().join("out");
    cmd_convert(&input, &output, &ConvertConfig::default(), false).unwrap();

    let files = example_files(&output);
    assert_eq!(files.len(), 3);

    let record = files
        .iter()
        .map(|f| cmd_inspect(f, false).unwrap())
        .find(|r| r.object_id == 1)
        .unwrap();

    assert_eq!(record.source, "2020aaa.dat");
    assert_eq!(record.field("SNID"), Some(&FieldValue::Text("2020aaa".into())));
    assert_eq!(record.field("ra"), Some(&FieldValue::Float(10.5)));
    assert_eq!(record.field("dec"), Some(&FieldValue::Float(-5.25)));
    assert!(record.field("#_PHOTCAT").is_none());
    assert!(record.field("END").is_none());

    // bands X, g, r; keys MJD, FLUXCAL, FLUXCALERR; g holds two observations
    assert_eq!(record.core_keys, vec!["MJD", "FLUXCAL", "FLUXCALERR"]);
    assert_eq!(record.additional_keys, vec!["PHOTFLAG"]);
    assert_eq!(record.lightcurve.shape(), [3, 3, 2]);
    assert_eq!(record.lightcurve.series(0, 0).unwrap(), &[-99.0, -99.0]);
    assert_eq!(record.lightcurve.series(1, 0).unwrap(), &[59000.0, 59002.0]);
    assert_eq!(record.lightcurve.series(2, 1).unwrap(), &[20.0, 0.0]);
}

#[test]
fn test_convert_json_format() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = temp.path().join("out");
    let config = ConvertConfig {
        format: OutputFormat::Json,
        ..ConvertConfig::default()
    };

    let summary = cmd_convert(&input, &output, &config, true).unwrap();
    assert_eq!(summary.format, OutputFormat::Json);

    let files = example_files(&output);
    assert!(files.iter().all(|f| f.extension().unwrap() == "json"));
    let text = std::fs::read_to_string(&files[0]).unwrap();
    assert!(text.trim_start().starts_with('{'));
    assert_eq!(cmd_inspect(&files[0], true).unwrap().bands.len(), 3);
}

#[test]
fn test_convert_pads_object_ids() {
    let temp = create_temp_dir();
    let input = temp.path().join("many");
    std::fs::create_dir(&input).unwrap();
    for i in 0..10 {
        std::fs::write(
            input.join(format!("obj_{i:02}.dat")),
            snana(&format!("obj{i}"), 0.0, 0.0, &[(59000.0, "g", 1.0)]),
        )
        .unwrap();
    }
    let output = temp.path().join("out");

    cmd_convert(&input, &output, &ConvertConfig::default(), false).unwrap();
    let names: Vec<String> = example_files(&output)
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("example_01.mmu"));
    assert_eq!(names.last().map(String::as_str), Some("example_10.mmu"));
}

#[test]
fn test_convert_empty_dir_fails() {
    let temp = create_temp_dir();
    let input = temp.path().join("empty");
    std::fs::create_dir(&input).unwrap();

    let err = cmd_convert(&input, &temp.path().join("out"), &ConvertConfig::default(), false)
        .unwrap_err();
    assert!(matches!(err, CliError::EmptyInput(_)));
}

#[test]
fn test_convert_missing_dir_fails() {
    let temp = create_temp_dir();
    let err = cmd_convert(
        &temp.path().join("nope"),
        &temp.path().join("out"),
        &ConvertConfig::default(),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, CliError::Io { .. }));
}

#[test]
fn test_convert_reports_bad_file() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    std::fs::write(input.join("broken.dat"), "RA: 1\nDECL: 2\nOBS: 1 g\n").unwrap();

    let err = cmd_convert(&input, &temp.path().join("out"), &ConvertConfig::default(), false)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("broken.dat"), "{message}");
    assert!(message.contains("line 3"), "{message}");
}

#[test]
fn test_convert_rejects_bad_nside() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let config = ConvertConfig {
        nside: 10,
        ..ConvertConfig::default()
    };
    let err = cmd_convert(&input, &temp.path().join("out"), &config, false).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
}

#[test]
fn test_convert_extra_ignored_key() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = temp.path().join("out");
    let mut config = ConvertConfig::default();
    config.add_ignored_keys(["PHOTFLAG", "MWEBV"]);

    cmd_convert(&input, &output, &config, false).unwrap();
    let record = cmd_inspect(&example_files(&output)[0], false).unwrap();
    assert!(record.additional_keys.is_empty());
    assert!(record.field("MWEBV").is_none());
}

// =============================================================================
// SOURCE REMOVAL TESTS
// =============================================================================

#[test]
fn test_remove_source_after_convert() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = temp.path().join("out");
    let config = ConvertConfig {
        remove_source: true,
        ..ConvertConfig::default()
    };

    let summary = cmd_convert(&input, &output, &config, false).unwrap();
    assert!(summary.removed_source);
    assert!(!input.exists());
    assert_eq!(example_files(&output).len(), 3);
}

#[test]
fn test_remove_source_refuses_nested_output() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let output = input.join("converted");
    let config = ConvertConfig {
        remove_source: true,
        ..ConvertConfig::default()
    };

    let err = cmd_convert(&input, &output, &config, false).unwrap_err();
    assert!(matches!(err, CliError::OutputInsideInput { .. }));
    assert!(input.exists());
    assert!(!output.exists(), "nothing should be written before the refusal");

    let deep = input.join("a").join("b");
    let err = cmd_convert(&input, &deep, &config, false).unwrap_err();
    assert!(matches!(err, CliError::OutputInsideInput { .. }));
    assert!(!input.join("a").exists());
}

// =============================================================================
// SCHEMA / INSPECT TESTS
// =============================================================================

#[test]
fn test_schema_command() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);

    let schema = cmd_schema(&input, &ConvertConfig::default(), false).unwrap();
    assert_eq!(schema.bands, vec!["X", "g", "r"]);
    assert_eq!(schema.core_keys, vec!["MJD", "FLUXCAL", "FLUXCALERR"]);
    let keys: Vec<&str> = schema.metadata.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["SURVEY", "SNID", "RA", "DECL", "MWEBV"]);

    // Nothing written next to the input.
    assert_eq!(list_input_files(&input).unwrap().len(), 3);
}

#[test]
fn test_inspect_rejects_garbage() {
    let temp = create_temp_dir();
    let path = temp.path().join("junk.mmu");
    std::fs::write(&path, b"definitely not an example").unwrap();
    assert!(matches!(cmd_inspect(&path, false), Err(CliError::Mmu(_))));
}

// =============================================================================
// ARGUMENT PARSING TESTS
// =============================================================================

#[test]
fn test_parse_convert_args() {
    let cli = Cli::try_parse_from([
        "mmu",
        "-vv",
        "convert",
        "in",
        "out",
        "--format",
        "json",
        "--nside",
        "32",
        "--ignore-key",
        "A",
        "--ignore-key",
        "B",
        "--remove-source",
    ])
    .unwrap();

    assert_eq!(cli.verbose, 2);
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
            assert_eq!(input_dir, PathBuf::from("in"));
            assert_eq!(output_dir, PathBuf::from("out"));
            assert_eq!(format, Some(OutputFormat::Json));
            assert_eq!(nside, Some(32));
            assert_eq!(ignore_keys, vec!["A", "B"]);
            assert!(remove_source);
            assert!(!json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["mmu", "convert", "in", "out", "--format", "hdf5"]).is_err());
}

#[test]
fn test_run_schema_via_cli() {
    let temp = create_temp_dir();
    let input = create_input_dir(&temp);
    let cli = Cli::try_parse_from(["mmu", "schema", input.to_str().unwrap(), "--json"]).unwrap();
    assert!(run(cli).is_ok());
}
