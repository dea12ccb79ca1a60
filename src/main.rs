use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cronwatch")]
#[command(about = "Cron job execution monitor", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuously ingest new log lines and serve the web dashboard
    Watch {
        /// Poll interval in seconds (overrides the configured value)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Ingest the existing log file once from the beginning and exit
    Parse,
    /// Print current statistics and exit
    Stats,
    /// Interactive terminal dashboard
    Tui,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file (or print it with --stdout)
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cronwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Some(Commands::Watch { interval }) => {
            cronwatch::cli::run::watch(config_path, interval).await?;
        }
        None => {
            // Default behavior is to watch
            cronwatch::cli::run::watch(config_path, None).await?;
        }
        Some(Commands::Parse) => {
            cronwatch::cli::run::parse_existing(config_path).await?;
        }
        Some(Commands::Stats) => {
            cronwatch::cli::run::stats(config_path).await?;
        }
        Some(Commands::Tui) => {
            cronwatch::cli::run::tui(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                cronwatch::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}

fn resolve_config_path(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path);
    }

    // Check ~/.config/cronwatch/config.yml
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cronwatch/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Check /etc/cronwatch/config.yml
    let system_config = PathBuf::from("/etc/cronwatch/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
