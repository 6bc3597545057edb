//! Command-line interface definitions.
//!
//! ```bash
//! # Download every item of a feed export, then dedupe the directory
//! mediavault archive --items alice.json --dir downloads/alice
//!
//! # Dedupe an existing directory, moving copies to the trash
//! mediavault dedupe downloads/alice --removal-mode trash
//!
//! # Show the direct media URL behind an embed page
//! mediavault resolve https://vidble.com/watch?v=abc
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::RemovalMode;
use crate::config::ConfigOverrides;
use crate::scanner::HashAlgorithm;

/// Archive media from content feeds and remove duplicate copies.
#[derive(Debug, Parser)]
#[command(name = "mediavault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the media of content items, then remove duplicates
    Archive(ArchiveArgs),
    /// Remove duplicate media from a directory
    Dedupe(DedupeArgs),
    /// Print the direct media URL for an embed or watch page
    Resolve(ResolveArgs),
}

impl Commands {
    /// Configuration values set by this command's flags.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        match self {
            Self::Archive(args) => {
                let mut overrides = args.dedupe.overrides();
                overrides.max_concurrent_downloads = args.max_concurrent;
                overrides.chunk_size = args.chunk_size;
                overrides
            }
            Self::Dedupe(args) => args.options.overrides(),
            Self::Resolve(_) => ConfigOverrides::default(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// JSON file holding an array of content items
    #[arg(long, value_name = "FILE")]
    pub items: PathBuf,

    /// Destination directory (created if missing)
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Maximum simultaneous downloads
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Largest write per progress event (e.g. 32KiB, 1MB)
    #[arg(long, value_name = "SIZE", value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// Write a JSON run summary to this path
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    #[command(flatten)]
    pub dedupe: DedupeOptions,
}

#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Directory to deduplicate
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub options: DedupeOptions,
}

/// Flags shared by every command that removes duplicates.
#[derive(Debug, Args)]
pub struct DedupeOptions {
    /// Allowed file extension (repeatable; replaces the configured set)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Hash algorithm for videos and other opaque media
    #[arg(long, value_enum, value_name = "ALG")]
    pub hash: Option<HashAlgorithm>,

    /// Delete duplicates permanently or move them to the trash
    #[arg(long, value_enum, value_name = "MODE")]
    pub removal_mode: Option<RemovalMode>,

    /// Compare GIFs byte-for-byte instead of by appearance
    #[arg(long)]
    pub animated_as_video: bool,

    /// Fingerprint threads (0 = one per core)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

impl DedupeOptions {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            allowed_extensions: (!self.extensions.is_empty()).then(|| self.extensions.clone()),
            hash_algorithm: self.hash,
            removal_mode: self.removal_mode,
            animated_images_as_video: self.animated_as_video.then_some(true),
            fingerprint_threads: self.threads,
            ..ConfigOverrides::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Page or media URL
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Parse a human-readable size string into bytes.
///
/// Supports decimal (KB, MB, GB, TB) and binary (KiB, MiB, GiB, TiB)
/// suffixes, case-insensitively.
///
/// ```
/// use mediavault::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("32KiB").unwrap(), 32_768);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let bytes = parse_size(s)?;
    if bytes == 0 {
        return Err("Chunk size must be at least 1 byte".to_string());
    }
    usize::try_from(bytes).map_err(|_| format!("Chunk size too large: {bytes}"))
}
