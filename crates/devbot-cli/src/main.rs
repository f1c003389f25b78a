mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use devbot_server::supervisor::ConfigSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "devbot",
    about = "Slack relay that turns slash commands into pull requests, design pages and wiki searches",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file (default: read environment variables)
    #[arg(long, global = true, env = "DEVBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server (health endpoint first, relay after the startup delay)
    Serve {
        /// Port to listen on (default: config / PORT / 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Delay before the relay initialises, in milliseconds
        #[arg(long)]
        startup_delay_ms: Option<u64>,
    },

    /// Parse command text the way the relay would, without running it
    Parse {
        /// Slash command, with or without the leading '/'
        command: String,
        /// Command text
        text: String,
    },

    /// List the supported slash commands
    Commands,

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let source = match cli.config {
        Some(path) => ConfigSource::File(path),
        None => ConfigSource::Env,
    };

    let result = match cli.command {
        Commands::Serve {
            port,
            startup_delay_ms,
        } => cmd::serve::run(source, port, startup_delay_ms),
        Commands::Parse { command, text } => cmd::parse::run(&command, &text, cli.json),
        Commands::Commands => cmd::commands::run(cli.json),
        Commands::Config { subcommand } => cmd::config::run(&source, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
