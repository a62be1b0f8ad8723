//! Command handlers for Manga Fetcher CLI
//!
//! This module implements the command handlers that connect parsed CLI
//! arguments and the loaded configuration to the download core.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::client::ScanClient;
use crate::app::coordinator::{Coordinator, SessionResult, SignalHandler};
use crate::app::manifest::{load_manifest, Manifest};
use crate::app::models::{Chapter, DownloadResult};
use crate::app::package::{package_cbz, package_pdf};
use crate::app::paths::OutputLayout;
use crate::app::resolver::{ImageUrlResolver, ManifestResolver};
use crate::cli::{ConfigAction, DownloadArgs, ProgressConfig, ProgressDisplay};
use crate::config::{AppConfig, PackageFormat};
use crate::errors::{AppError, ConfigError, Result};

/// Handle the download command
///
/// Loads the manifest, downloads every chapter and optionally packages the
/// successful ones. Returns an error when any chapter failed so the process
/// exits non-zero.
pub async fn handle_download(args: DownloadArgs, mut config: AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    args.apply_to(&mut config);
    config.validate()?;

    let manifest = load_manifest(&args.manifest).await?;
    let chapters = manifest.chapters();

    let client = Arc::new(ScanClient::with_config(client_config_for(&config, &manifest))?);
    let resolver = ManifestResolver::new(client.clone(), &manifest);

    if args.dry_run {
        return dry_run(&manifest, &chapters, &resolver, &config).await;
    }

    let layout = OutputLayout::new(&config.download.download_dir, &manifest.title);
    info!(
        "Downloading {} chapters of '{}' into {}",
        chapters.len(),
        manifest.title,
        layout.manga_dir().display()
    );

    let cancel = CancellationToken::new();
    let signal_task = SignalHandler::new(cancel.clone()).setup();

    let display = ProgressDisplay::new(ProgressConfig {
        quiet,
        ..Default::default()
    });
    let (progress_tx, progress_handle) = display.start(chapters.len());

    let coordinator = Coordinator::new(config.coordinator_config(), client, layout)
        .with_progress(progress_tx)
        .with_cancellation(cancel.clone());

    let session = coordinator.run_session(&chapters, &resolver, None).await;

    // The display stops once the coordinator's sender is gone
    drop(coordinator);
    progress_handle.finish().await;
    signal_task.abort();

    let packaging_failures = if cancel.is_cancelled() {
        0
    } else {
        package_chapters(
            &session.results,
            config.packaging.format,
            config.packaging.delete_images,
        )
        .await
    };

    report_session(&session, quiet);

    if !session.all_succeeded() {
        return Err(AppError::generic(format!(
            "{} of {} chapters did not download completely",
            session.stats.unsuccessful(),
            session.stats.total_chapters
        )));
    }
    if packaging_failures > 0 {
        return Err(AppError::generic(format!(
            "{} chapters could not be packaged",
            packaging_failures
        )));
    }

    Ok(())
}

/// Handle the config command
pub async fn handle_config(action: ConfigAction, config: &AppConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(config).map_err(ConfigError::from)?;
            println!("{}", rendered);
        }
        ConfigAction::Init { force, path } => {
            let written = AppConfig::write_default(path.as_deref(), force).await?;
            println!("Wrote default configuration to {}", written.display());
        }
    }
    Ok(())
}

/// Client configuration with the manifest's referer taking precedence
fn client_config_for(
    config: &AppConfig,
    manifest: &Manifest,
) -> crate::app::client::ClientConfig {
    let client_config = config.client_config();
    match &manifest.referer {
        Some(referer) => client_config.with_referer(referer.clone()),
        None => client_config,
    }
}

/// Resolve every chapter and print what would be downloaded
async fn dry_run(
    manifest: &Manifest,
    chapters: &[Chapter],
    resolver: &ManifestResolver,
    config: &AppConfig,
) -> Result<()> {
    let layout = OutputLayout::new(&config.download.download_dir, &manifest.title);
    let resolved = resolver
        .resolve_batch(chapters, config.download.url_resolve_concurrency)
        .await;

    println!("Dry run: '{}' ({} chapters)", manifest.title, chapters.len());
    let mut total_images = 0;
    for (chapter, urls) in &resolved {
        total_images += urls.len();
        println!(
            "  [{}] {}: {} images -> {}",
            chapter.index,
            chapter.title,
            urls.len(),
            layout.chapter_dir(&chapter.title).display()
        );
    }
    println!("{} images in total", total_images);

    Ok(())
}

/// Package every successful chapter, returning how many could not be packaged
async fn package_chapters(
    results: &[DownloadResult],
    format: PackageFormat,
    delete_images: bool,
) -> usize {
    let package = match format {
        PackageFormat::None => return 0,
        PackageFormat::Cbz => package_cbz,
        PackageFormat::Pdf => package_pdf,
    };
    let mut failures = 0;

    for result in results.iter().filter(|result| result.success) {
        let dir: PathBuf = result.output_path.clone();
        let packaged = tokio::task::spawn_blocking(move || package(&dir, None, delete_images)).await;

        match packaged {
            Ok(Ok(packaged)) => {
                info!(
                    "Packaged {} ({} images)",
                    packaged.path.display(),
                    packaged.image_count
                );
                for (path, reason) in &packaged.cleanup.failures {
                    warn!("Could not delete {}: {}", path.display(), reason);
                }
            }
            Ok(Err(e)) => {
                warn!("Could not package {}: {}", result.chapter.title, e);
                failures += 1;
            }
            Err(e) => {
                warn!("Packaging task for {} failed: {}", result.chapter.title, e);
                failures += 1;
            }
        }
    }

    failures
}

fn report_session(session: &SessionResult, quiet: bool) {
    if quiet {
        return;
    }

    println!();
    println!("{}", session.summary());
    for failure in session.failures() {
        println!(
            "  ✗ {}: {}",
            failure.chapter.title,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}
