//! relaychat - terminal chat client with offline-resilient delivery.

mod app;

use std::path::PathBuf;

use chat_config_and_utils::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};

/// relaychat command-line interface.
#[derive(Parser)]
#[command(name = "relaychat")]
#[command(about = "Send chat messages through the relay, surviving disconnects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.relaychat
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and send each stdin line as a message
    Run {
        /// Conversation to post into
        #[arg(long)]
        conversation: String,
        /// Relay auth token
        #[arg(long, env = "RELAYCHAT_TOKEN")]
        token: String,
        /// This device's identifier
        #[arg(long)]
        device_id: String,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    match cli.command {
        Commands::Run {
            conversation,
            token,
            device_id,
        } => {
            paths.ensure_dirs()?;
            init_logging(&paths, &config.log_level)?;
            app::run_client(config, conversation, token, device_id).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
