use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kairos_gateway::config::BackendKind;
use kairos_gateway::db::{self, SongRepo};
use kairos_gateway::recognition::RuleBasedDetector;
use kairos_gateway::{Config, Daemon};

/// Kairos - voice and music-ID control for live presentations
#[derive(Parser)]
#[command(name = "kairos", version, about)]
struct Cli {
    /// Address to bind the API server to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Presentation backend to drive
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Log commands instead of sending them (same as `--backend dry-run`)
    #[arg(long)]
    dry_run: bool,

    /// Song catalog database file
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the built-in intent detector on a phrase
    Detect {
        /// Phrase to classify
        text: String,
    },
    /// Check that the presentation backend is reachable
    Probe,
    /// Manage the song catalog
    Songs {
        #[command(subcommand)]
        action: SongsCommand,
    },
}

#[derive(Subcommand)]
enum SongsCommand {
    /// List catalog entries
    List,
    /// Add a song or replace its identifier
    Add {
        title: String,
        /// Presentation identifier (e.g. a ProPresenter library path)
        identifier: String,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Remove a song by id
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,kairos_gateway=info",
        1 => "info,kairos_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli);
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Detect { text } => detect(&text),
            Command::Probe => probe(config).await,
            Command::Songs { action } => songs(&config, action),
        };
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.presentation.backend,
        "starting kairos gateway"
    );

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(backend) = cli.backend {
        config.presentation.backend = backend;
    }
    if cli.dry_run {
        config.presentation.backend = BackendKind::DryRun;
    }
    if let Some(path) = &cli.db_path {
        config.database.path = Some(path.clone());
    }
}

fn detect(text: &str) -> anyhow::Result<()> {
    let detection = RuleBasedDetector::detect_text(text);
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

async fn probe(config: Config) -> anyhow::Result<()> {
    let daemon = Daemon::new(config)?;
    let health = daemon.orchestrator().gateway().probe().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    if health.reachable == Some(true) {
        Ok(())
    } else {
        anyhow::bail!("{} backend unreachable", health.backend)
    }
}

fn songs(config: &Config, action: SongsCommand) -> anyhow::Result<()> {
    let path = config
        .database
        .path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no song catalog path configured (use --db-path)"))?;
    let repo = SongRepo::new(db::init(path)?);

    match action {
        SongsCommand::List => {
            for song in repo.list()? {
                match &song.artist {
                    Some(artist) => println!("{:>4}  {} ({artist})  ->  {}", song.id, song.title, song.identifier),
                    None => println!("{:>4}  {}  ->  {}", song.id, song.title, song.identifier),
                }
            }
        }
        SongsCommand::Add {
            title,
            identifier,
            artist,
        } => {
            let song = repo.upsert(&title, &identifier, artist.as_deref())?;
            println!("saved #{}: {} -> {}", song.id, song.title, song.identifier);
        }
        SongsCommand::Remove { id } => {
            if repo.delete(id)? {
                println!("removed #{id}");
            } else {
                anyhow::bail!("no song with id {id}");
            }
        }
    }
    Ok(())
}
