mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{cache::CacheSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;
use wxrelay_core::types::JobKind;

#[derive(Parser)]
#[command(
    name = "wxrelay",
    about = "Relay weather signals and special tips to a chat webhook, once each",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "WXRELAY_CONFIG", default_value = "wxrelay.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the operator HTTP server and the job scheduler
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long, env = "WXRELAY_PORT")]
        port: Option<u16>,
    },

    /// Run one cycle of a job (signals or bulletins)
    Run { job: JobKind },

    /// Inspect or clear the dedup cache
    Cache {
        #[command(subcommand)]
        subcommand: CacheSubcommand,
    },

    /// Clear the kill switch so jobs dispatch again
    Enable,

    /// Set the kill switch; cycles return without contacting anything
    Disable,

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
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_path();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(config, port),
        Commands::Run { job } => cmd::run::run(config, job, cli.json),
        Commands::Cache { subcommand } => cmd::cache::run(config, subcommand, cli.json),
        Commands::Enable => cmd::execute::run(config, true, cli.json),
        Commands::Disable => cmd::execute::run(config, false, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
