mod commands;
mod interactive;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bessie_client::{ClientConfig, HttpImageSource, TimingReporter};
use bessie_core::{ImageSource, MemorySource, Mode};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bessie", about = "Browse a remote photo library from the terminal")]
struct Cli {
    /// TOML file overriding BESSIE_* settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Serve images from a JSON fixture instead of the backend
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List one contact-sheet page
    List {
        /// Page ordering: numerical or cluster
        #[arg(short, long, default_value_t = Mode::Numerical)]
        mode: Mode,
        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Show clusters, largest first
    Clusters,
    /// Show one image record
    Show {
        /// Image ID
        id: String,
    },
    /// Set an image's GPS location
    Gps {
        /// Image ID
        id: String,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
    /// Single-image viewer (←/→ navigate, space zoom, q quit)
    View,
    /// Contact sheet (arrows select, c/n mode, PgUp/PgDn page, space open, q quit)
    Gallery {
        #[arg(short, long, default_value_t = Mode::Numerical)]
        mode: Mode,
    },
    /// Show configuration and backend reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env(),
    };
    config.validate()?;

    match &cli.fixture {
        Some(path) => {
            let source = MemorySource::from_file(path)
                .with_context(|| format!("loading fixture {}", path.display()))?;
            run(&cli, &config, Arc::new(source), TimingReporter::disabled()).await
        }
        None => {
            let source = HttpImageSource::new(&config)?;
            let reporter = source.timing_reporter(config.timing_enabled);
            run(&cli, &config, Arc::new(source), reporter).await
        }
    }
}

async fn run<S: ImageSource>(
    cli: &Cli,
    config: &ClientConfig,
    source: Arc<S>,
    reporter: TimingReporter,
) -> Result<()> {
    match &cli.command {
        Commands::List { mode, page } => {
            commands::list(source, config, *mode, *page, cli.json).await
        }
        Commands::Clusters => commands::clusters(source.as_ref(), cli.json).await,
        Commands::Show { id } => commands::show(source.as_ref(), id, cli.json).await,
        Commands::Gps { id, lat, lon } => {
            commands::gps(source.as_ref(), id, *lat, *lon, cli.json).await
        }
        Commands::View => interactive::view(source, config, reporter).await,
        Commands::Gallery { mode } => interactive::gallery(source, config, *mode).await,
        Commands::Status => commands::status(source.as_ref(), config, cli.fixture.is_some()).await,
    }
}
