//! tutorgate CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP chat gateway
//! - `ask`    : Run one message through the pipeline and print the frames
//! - `seed`   : Rebuild the knowledge base from a TOML file
//! - `doctor` : Check configuration and credentials
//! - `init`   : Write a default config and a sample knowledge file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorgate",
    about = "tutorgate: gated retrieval-augmented chat for a tutoring site",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.tutorgate/config.toml
    #[arg(short, long, global = true, env = "TUTORGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question as a first-time visitor
    Ask {
        /// The question
        message: String,

        /// Session id to tag the exchange with (random by default)
        #[arg(long)]
        session: Option<String>,
    },

    /// Replace the knowledge base with the chunks in a TOML file
    Seed {
        /// Knowledge file (defaults to ~/.tutorgate/knowledge.toml)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Check configuration and credentials
    Doctor,

    /// Write a default config.toml and a sample knowledge.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so `ask` output stays clean on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { message, session } => {
            commands::ask::run(config_path, message, session).await?
        }
        Commands::Seed { file } => commands::seed::run(config_path, file).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Init => commands::init::run().await?,
    }

    Ok(())
}
