//! Configuration layering and the command-line entry point.

use std::ffi::OsStr;
use std::fs;

use clap::Parser;
use mediavault::actions::RemovalMode;
use mediavault::cli::Cli;
use mediavault::config::{Config, ConfigOverrides};
use mediavault::error::ExitCode;
use mediavault::run_app;
use mediavault::scanner::HashAlgorithm;
use tempfile::tempdir;

use super::support::{gradient, set_mtime, write_png};

fn parse(args: &[&OsStr]) -> Cli {
    Cli::try_parse_from(args.iter().copied()).unwrap()
}

#[test]
fn test_layers_apply_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mediavault.toml");
    fs::write(
        &path,
        "max_concurrent_downloads = 3\nprogress_batch = 9\nhash_algorithm = \"blake3\"\n",
    )
    .unwrap();

    // Only this test touches MEDIAVAULT_* in this binary.
    std::env::set_var("MEDIAVAULT_PROGRESS_BATCH", "12");
    std::env::set_var("MEDIAVAULT_USER_AGENT", "archiver-test/1.0");
    let overrides = ConfigOverrides {
        max_concurrent_downloads: Some(6),
        ..ConfigOverrides::default()
    };
    let config = Config::load(Some(&path), &overrides);
    std::env::remove_var("MEDIAVAULT_PROGRESS_BATCH");
    std::env::remove_var("MEDIAVAULT_USER_AGENT");

    let config = config.unwrap();
    assert_eq!(config.max_concurrent_downloads, 6);
    assert_eq!(config.progress_batch, 12);
    assert_eq!(config.user_agent, "archiver-test/1.0");
    assert_eq!(config.removal_mode, RemovalMode::Permanent);
    assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.chunk_size, Config::default().chunk_size);
}

#[test]
fn test_run_app_dedupe() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("mediavault.toml");
    fs::write(&config, "fingerprint_threads = 2\n").unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    write_png(&a, &gradient(16, 16));
    write_png(&b, &gradient(16, 16));
    set_mtime(&a, 10);
    set_mtime(&b, 20);

    let cli = parse(&[
        OsStr::new("mediavault"),
        OsStr::new("-q"),
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("dedupe"),
        dir.path().as_os_str(),
    ]);
    let code = run_app(cli).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(a.exists());
    assert!(!b.exists());
}

#[test]
fn test_run_app_missing_config_is_config_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let cli = parse(&[
        OsStr::new("mediavault"),
        OsStr::new("-q"),
        OsStr::new("--config"),
        missing.as_os_str(),
        OsStr::new("dedupe"),
        dir.path().as_os_str(),
    ]);

    let err = run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}
