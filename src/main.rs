use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logbridge")]
#[command(about = "Ships product monitor logs to a collector server", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent until Ctrl+C (default)
    Run {
        /// Collector address to store before connecting, e.g. 10.0.0.5:8080
        #[arg(long)]
        server: Option<String>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented starter config
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
                .unwrap_or_else(|_| "logbridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { server }) => {
            let config_path = logbridge::config::resolve_config_path(cli.config.as_deref());
            logbridge::cli::run::run(config_path, server).await?;
        }
        None => {
            let config_path = logbridge::config::resolve_config_path(cli.config.as_deref());
            logbridge::cli::run::run(config_path, None).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logbridge::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
