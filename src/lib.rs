//! mediavault - media archiver with duplicate removal
//!
//! Downloads the media referenced by content feeds under a concurrency
//! cap, then collapses duplicate copies by perceptual (images) or
//! cryptographic (videos) fingerprints.

pub mod actions;
pub mod archive;
pub mod cli;
pub mod config;
pub mod download;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Context;

use crate::archive::{load_items, Archiver};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::download::{HttpSource, MediaResolver, MediaSource};
use crate::duplicates::DuplicateResolver;
use crate::error::ExitCode;
use crate::progress::{ProgressSink, TerminalProgress};
use crate::signal::CancelToken;

/// Run the parsed command line and return the exit code to use.
///
/// # Errors
///
/// Returns an error for configuration problems and for failures that stop
/// a run outright. Per-file failures are reported through the exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let cancel = signal::install_handler().context("Failed to set up Ctrl+C handling")?;
    let config = Config::load(cli.config.as_deref(), &cli.command.overrides())
        .context("Failed to load configuration")?;
    log::debug!("Effective configuration: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(dispatch(cli.command, &config, cancel, cli.quiet))
}

async fn dispatch(
    command: Commands,
    config: &Config,
    cancel: CancelToken,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Archive(args) => {
            let items = load_items(&args.items)?;
            let sink: Arc<dyn ProgressSink> = Arc::new(TerminalProgress::new(quiet));
            let archiver = Archiver::new(config, http_source(config)?, sink, Some(cancel))?;

            let report = archiver.archive(&items, &args.dir).await?;
            if !quiet {
                println!("{report}");
            }
            if let Some(path) = &args.summary {
                report.write_json(path)?;
                log::info!("Summary written to {}", path.display());
            }

            Ok(if report.cancelled {
                ExitCode::Interrupted
            } else if report.has_failures() {
                ExitCode::PartialSuccess
            } else {
                ExitCode::Success
            })
        }
        Commands::Dedupe(args) => {
            let sink: Arc<dyn ProgressSink> = Arc::new(TerminalProgress::new(quiet));
            let resolver = DuplicateResolver::new(config.resolver_config())?
                .with_sink(sink)
                .with_cancel_token(cancel);

            let report = resolver
                .resolve_with_report(&args.dir, &config.allowed_extensions)
                .await
                .with_context(|| format!("Failed to deduplicate {}", args.dir.display()))?;
            if !quiet {
                println!(
                    "{}: {} file(s), {} duplicate(s) found, {} removed ({} freed)",
                    report.directory.display(),
                    report.files_scanned,
                    report.duplicates_found,
                    report.duplicates_removed,
                    bytesize::ByteSize::b(report.bytes_freed)
                );
            }
            for (path, reason) in &report.failed_removals {
                log::warn!("Could not remove {}: {}", path.display(), reason);
            }

            Ok(if report.cancelled {
                ExitCode::Interrupted
            } else if !report.failed_removals.is_empty() {
                ExitCode::PartialSuccess
            } else {
                ExitCode::Success
            })
        }
        Commands::Resolve(args) => {
            let resolver = MediaResolver::new(http_source(config)?);
            println!("{}", resolver.resolve(&args.url).await);
            Ok(ExitCode::Success)
        }
    }
}

fn http_source(config: &Config) -> anyhow::Result<Arc<dyn MediaSource>> {
    let source = HttpSource::new(&config.user_agent, config.request_timeout())
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(source))
}
