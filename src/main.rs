//! Manga Fetcher CLI application
//!
//! Command-line interface for downloading manga chapters listed in a manifest.
//! Features bounded concurrent downloads, progress tracking, and non-zero exit
//! status when any chapter fails.

use std::process;

use tracing::info;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

use manga_fetcher::cli::{handle_config, handle_download, Cli, Commands, ConfigAction};
use manga_fetcher::config::AppConfig;
use manga_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // `config init` must work even when the existing config is broken
    let config = match &cli.command {
        Commands::Config(args) if matches!(args.action, ConfigAction::Init { .. }) => {
            AppConfig::default()
        }
        _ => AppConfig::load(cli.global.config.clone()).await?,
    };

    init_logging(&cli, &config);

    info!("Manga Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    let quiet = cli.global.quiet;
    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, config, quiet).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args.action, &config).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let log_level = cli.log_level(&config.logging.level);

    let directive = match format!("manga_fetcher={}", log_level).parse::<Directive>() {
        Ok(directive) => directive,
        Err(_) => {
            eprintln!("Unknown log level '{}', using info", log_level);
            LevelFilter::INFO.into()
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
