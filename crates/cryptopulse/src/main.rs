//! CryptoPulse - a tool-calling market analysis agent

use clap::{Parser, Subcommand};
use tracing::error;

mod commands;

use commands::{
    chat_command, init_command, ops_command, serve_command, status_command, stdio_command,
};

/// CryptoPulse - crypto market analysis in your terminal
#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Tool-calling agent runtime for crypto market analysis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config
    Init,
    /// Chat with the analyst agent
    Chat {
        /// Message for a one-shot answer; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Start the HTTP chat server
    Serve {
        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Serve the operation catalog over stdio (JSON-RPC)
    Stdio,
    /// List the operation catalog
    Ops,
    /// Show system status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Diagnostics always go to stderr; the stdio transport owns stdout
    // and the other commands print their results there.
    match &cli.command {
        Commands::Serve { verbose: true } => {
            tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Chat { message } => {
            if let Err(e) = chat_command(message).await {
                error!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Serve { verbose: _ } => {
            if let Err(e) = serve_command().await {
                error!("Serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Stdio => {
            if let Err(e) = stdio_command().await {
                error!("Stdio server failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Ops => {
            if let Err(e) = ops_command().await {
                error!("Ops listing failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Status => {
            if let Err(e) = status_command().await {
                error!("Status failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
