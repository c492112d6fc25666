//! soundroute CLI Application

mod commands;

use clap::{Parser, Subcommand};
use soundroute_core::domain::ConfigManager;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "soundroute")]
#[command(version, about = "Keeps a softphone's sound devices in step with the system", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List system and engine audio devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one selection cycle and print the result
    Select,

    /// Store sound preferences, then reselect
    Set {
        #[arg(long)]
        input: Option<String>,

        #[arg(long)]
        output: Option<String>,

        #[arg(long)]
        ringtone_output: Option<String>,

        #[arg(long)]
        ringtone_sound: Option<String>,
    },

    /// Follow device changes until interrupted
    Watch,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("soundroute starting");

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(ConfigManager::default_config_dir()?),
    };
    let runtime = commands::Runtime::open(manager).await;

    match cli.command {
        Command::Devices { json } => commands::devices(&runtime, json).await,
        Command::Select => commands::select(&runtime).await,
        Command::Set {
            input,
            output,
            ringtone_output,
            ringtone_sound,
        } => {
            let edit = commands::PreferenceEdit {
                input,
                output,
                ringtone_output,
                ringtone_sound,
            };
            commands::set(&runtime, edit).await
        }
        Command::Watch => commands::watch(&runtime).await,
    }
}
