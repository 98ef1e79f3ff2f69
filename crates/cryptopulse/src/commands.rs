//! CryptoPulse command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cryptopulse_agent::{system_prompt, AgentEvent, AgentLoop, ConversationState};
use cryptopulse_config::Config;
use cryptopulse_market::default_registry;
use cryptopulse_mcp::McpServer;
use cryptopulse_ops::{Executor, Router};
use cryptopulse_provider::openrouter::OpenRouterProvider;
use cryptopulse_server::AppState;

fn build_router(config: &Config) -> Result<Router> {
    let registry = Arc::new(default_registry()?);
    let executor = Executor::with_timeout(config.operation_timeout());
    Ok(Router::new(registry, executor))
}

fn build_agent(config: &Config) -> Result<AgentLoop> {
    let api_key = config.api_key().context(
        "No API key configured. Run `pulse init` and set one in ~/.cryptopulse/config.json",
    )?;

    let provider = OpenRouterProvider::new(api_key, config.api_base(), Some(config.model()));
    Ok(AgentLoop::new(
        Arc::new(provider),
        build_router(config)?,
        config.model(),
        config.max_steps(),
    ))
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("Initializing CryptoPulse...");

    let config = cryptopulse_config::init().await?;
    println!("Config: {}", cryptopulse_config::config_path().display());
    println!("Model:  {}", config.model());

    println!("\nNext steps:");
    println!("  1. Add your API key to ~/.cryptopulse/config.json");
    println!("     Get one at: https://openrouter.ai/keys");
    println!("  2. Start chatting: pulse chat -m \"How is BTC doing?\"");

    Ok(())
}

/// Runs one conversation turn, printing deltas and tool progress as
/// they arrive.
async fn run_turn(agent: &AgentLoop, state: &mut ConversationState) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Delta { text } => {
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                AgentEvent::ToolStarted { name, .. } => {
                    println!("[{}...]", name);
                }
                AgentEvent::ToolCompleted { .. } => {}
                AgentEvent::Done { .. } => println!(),
                AgentEvent::Error { message } => eprintln!("\nerror: {}", message),
            }
        }
    });

    let result = agent.run_streaming(state, tx, cancel).await;
    let _ = printer.await;
    result?;
    Ok(())
}

/// Chat with the analyst agent
pub async fn chat_command(message: Option<String>) -> Result<()> {
    let config = Config::load().await?;
    let agent = build_agent(&config)?;

    let mut state = ConversationState::with_system(system_prompt());

    if let Some(msg) = message {
        state.push_user(msg);
        run_turn(&agent, &mut state).await?;
    } else {
        println!("CryptoPulse interactive mode (type 'exit' to quit)");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            if input == "exit" || input == "quit" {
                break;
            }

            state.push_user(input);
            run_turn(&agent, &mut state).await?;
        }
    }

    Ok(())
}

/// Start the HTTP chat server
pub async fn serve_command() -> Result<()> {
    let config = Config::load().await?;
    let agent = build_agent(&config)?;
    let addr = config.bind_addr();

    println!("CryptoPulse server on http://{}", addr);
    println!("  POST /api/chat       - streaming chat (SSE)");
    println!("  GET  /api/operations - operation catalog");
    println!("Press Ctrl+C to stop");

    let state = AppState::new(Arc::new(agent));

    tokio::select! {
        result = cryptopulse_server::serve(state, &addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            println!("\nShutting down");
        }
    }

    Ok(())
}

/// Serve the operation catalog over stdio
pub async fn stdio_command() -> Result<()> {
    let config = Config::load().await?;
    let server = McpServer::new(build_router(&config)?);
    server.serve_stdio().await?;
    Ok(())
}

/// List the operation catalog
pub async fn ops_command() -> Result<()> {
    let registry = default_registry()?;
    let catalog = registry.describe();

    println!("Operations ({}):", catalog.len());
    for entry in &catalog {
        let name = entry["name"].as_str().unwrap_or("?");
        let description = entry["description"].as_str().unwrap_or("");
        println!("  {} - {}", name, description);

        if let Some(required) = entry["inputSchema"]["required"].as_array() {
            let fields: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
            if !fields.is_empty() {
                println!("    requires: {}", fields.join(", "));
            }
        }
    }

    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = cryptopulse_config::config_path();

    println!("CryptoPulse Status");

    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    println!("Model:    {}", config.model());
    println!(
        "API Key:  {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Server:   {}", config.bind_addr());
    println!("Max steps: {}", config.max_steps());

    let registry = default_registry()?;
    println!("Operations: {}", registry.len());

    Ok(())
}
