//! Coder Agent CLI Entry Point
//!
//! This is the main entry point for the Coder Agent binary.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coder_agent::agent::coder::CoderAgent;
use coder_agent::agent::state::StateManager;
use coder_agent::cli::config::Config;
use coder_agent::llm::bedrock::BedrockClient;
use coder_agent::server::http::{self, AppState};
use coder_agent::tools::{Sandbox, ToolRegistry};
use coder_agent::xpander::agent::{AgentHandle, SavedAgentConfig};
use coder_agent::xpander::client::XpanderClient;

#[derive(Parser)]
#[command(name = "coder-agent")]
#[command(author, version, about = "Coder Agent - xpander.ai coding agent backed by Amazon Bedrock")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the launcher and serve execution requests
    Serve,
    /// Chat with the agent from the terminal
    Chat {
        /// Send a single message instead of starting a REPL
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Show the status of a running launcher
    Status,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve => {
            let config = Config::from_env().context("Invalid launcher configuration")?;
            serve(config).await?;
        }
        Commands::Chat { message } => {
            let config = Config::from_env().context("Invalid launcher configuration")?;
            chat(config, message).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Coder Agent launcher...");

    let coder = build_runtime(&config, false).await?;

    // Bind before announcing anything: a taken port must fail the launch.
    let listener = http::bind(config.bind_addr, config.port).await?;

    let state = Arc::new(AppState {
        coder,
        lifecycle: StateManager::new(),
    });

    info!(port = config.port, "Waiting for execution requests");
    http::run(listener, state).await
}

async fn chat(config: Config, message: Option<String>) -> Result<()> {
    let coder = build_runtime(&config, true).await?;

    if let Some(message) = message {
        let result = coder.chat(&message, None).await;
        println!("Thread: {}", result.thread_id);
        println!("Agent: {}", result.result);
        return Ok(());
    }

    println!("Chatting with agent {} (type exit to quit)", coder.agent_id());
    let mut thread_id: Option<String> = None;
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let result = coder.chat(input, thread_id.as_deref()).await;
        println!("Agent: {}", result.result);
        thread_id = Some(result.thread_id);
    }

    Ok(())
}

/// Construct the full runtime: control-plane handle, Bedrock client,
/// and local tool registry.
///
/// `allow_create` lets the chat flow register a fresh agent when no
/// identity is configured; the launcher itself requires an existing one.
async fn build_runtime(config: &Config, allow_create: bool) -> Result<CoderAgent<BedrockClient>> {
    let client = XpanderClient::new(&config.xpander_api_key, &config.base_url)?;

    let handle = match resolve_agent_id(config)? {
        Some(agent_id) => AgentHandle::acquire(client, &agent_id, &config.state_dir).await?,
        None if allow_create => {
            AgentHandle::create(client, "Coder Agent", &config.state_dir).await?
        }
        None => bail!("XPANDER_AGENT_ID is not set and no saved agent identity was found"),
    };
    info!(agent_id = %handle.id(), name = %handle.name(), "Agent handle acquired");

    let bedrock = BedrockClient::connect(config)
        .await
        .context("Failed to initialize Bedrock client")?;
    let sandbox = Sandbox::new(&config.sandbox_dir)?;

    Ok(CoderAgent::new(handle, bedrock, ToolRegistry::standard(sandbox)))
}

/// Agent id from the environment, falling back to the saved identity.
fn resolve_agent_id(config: &Config) -> Result<Option<String>> {
    if let Some(agent_id) = &config.agent_id {
        return Ok(Some(agent_id.clone()));
    }
    if let Some(saved) = SavedAgentConfig::load(&config.state_dir)? {
        if let Some(agent_id) = saved.agent_id {
            info!(agent_id = %agent_id, "Using saved agent identity");
            return Ok(Some(agent_id));
        }
    }
    Ok(None)
}

async fn show_status() -> Result<()> {
    let port = coder_agent::cli::config::port_from_env()
        .context("Invalid launcher configuration")?;

    let url = format!("http://127.0.0.1:{}/status", port);
    match reqwest::get(&url).await {
        Ok(response) => {
            let body: serde_json::Value = response.json().await?;
            println!("Launcher Status:");
            println!("  State: {}", body["state"].as_str().unwrap_or("unknown"));
            println!("  Uptime: {}s", body["uptime_secs"].as_u64().unwrap_or(0));
            println!("  Threads: {}", body["threads"].as_u64().unwrap_or(0));
            println!("  Host: {}", body["hostname"].as_str().unwrap_or("unknown"));
            println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
        }
        Err(e) => {
            println!("Launcher not reachable on port {}: {}", port, e);
        }
    }
    Ok(())
}

fn show_version() {
    println!("coder-agent {}", env!("CARGO_PKG_VERSION"));
    println!("xpander.ai coding agent runtime backed by Amazon Bedrock");
    println!();
    println!("Features:");
    println!("  - Execution webhook on port 41241");
    println!("  - Bedrock Converse agent loop");
    println!("  - Sandboxed git, file, and shell tools");
    println!("  - Interactive chat mode");
}
