use clap::{Parser, Subcommand};
use std::io::Write;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Scribe CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config file, and the transcripts directory.
    Init {
        /// Config file path (default: SCRIBE_CONFIG_PATH or ~/.scribe/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway (Slack Events webhook + transcript API).
    Gateway {
        /// Config file path (default: SCRIBE_CONFIG_PATH or ~/.scribe/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the stored transcript for a workspace and channel (newest first).
    Transcript {
        /// Config file path (default: SCRIBE_CONFIG_PATH or ~/.scribe/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Workspace (team) id, e.g. T0123
        #[arg(long, short)]
        workspace: String,

        /// Channel id, e.g. C0123 or D0123
        #[arg(long = "channel", short = 'C')]
        channel: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("scribe {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Transcript {
            config,
            workspace,
            channel,
        }) => {
            if let Err(e) = run_transcript(config, &workspace, &channel).await {
                log::error!("transcript failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config, path).await
}

async fn run_transcript(
    config_path: Option<std::path::PathBuf>,
    workspace: &str,
    channel: &str,
) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let root = lib::config::resolve_transcripts_dir(&config, &path);
    let store = lib::transcript::TranscriptStore::new(root);
    let bytes = store.read(workspace, channel).await?;
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
