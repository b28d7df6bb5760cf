//! Homelab Assistant: chat with a local model that can operate your homelab.
//!
//! Usage:
//!   homelab-assistant init            Write a default config
//!   homelab-assistant chat <PROMPT>   Ask a question, running tools live
//!   homelab-assistant tools           List available tools
//!   homelab-assistant status          Show config and model availability

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use homelab_assistant::agent::Assistant;
use homelab_assistant::config::{self, AssistantConfig};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "homelab-assistant")]
#[command(version)]
#[command(about = "Homelab automation assistant with streaming tool execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file.
    #[arg(long)]
    config: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Ask the assistant something; tool calls run as the answer streams.
    Chat {
        /// The question or instruction.
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// List tools the model can call.
    Tools,

    /// Show the effective configuration and Ollama status.
    Status,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => config::resolve_path(path),
        None => config::default_home_dir().join("assistant.toml"),
    };
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Logs go to stderr so stdout carries only the conversation
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => cmd_init(&config_path, force),
        Commands::Chat { prompt } => cmd_chat(cfg, &prompt.join(" ")).await,
        Commands::Tools => cmd_tools(cfg).await,
        Commands::Status => cmd_status(cfg, &config_path).await,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            "!!!".yellow().bold(),
            config_path.display()
        );
        return Ok(());
    }

    config::save_config(&AssistantConfig::default(), config_path)?;
    println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
    Ok(())
}

async fn cmd_chat(cfg: AssistantConfig, prompt: &str) -> Result<()> {
    let assistant = Assistant::from_config(cfg);

    // Ctrl+C stops the response at the next chunk boundary
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, cancelling response");
                ctrl_c_cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let messages = assistant.build_messages(&[], prompt).await;
    let stream = assistant.stream_reply(&messages, cancel);
    futures::pin_mut!(stream);

    let mut stdout = tokio::io::stdout();
    while let Some(text) = stream.next().await {
        stdout
            .write_all(text.as_bytes())
            .await
            .context("Failed to write to stdout")?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    Ok(())
}

async fn cmd_tools(cfg: AssistantConfig) -> Result<()> {
    let remote = cfg.mcp_endpoint().map(str::to_string);
    let assistant = Assistant::from_config(cfg);
    let tools = assistant.available_tools().await;

    println!();
    println!("{}", "=== Available Tools ===".bold());
    println!();
    for tool in &tools {
        println!("  {}  {}", tool.name.green().bold(), tool.description);
    }
    println!();
    match remote {
        Some(url) => println!("  {} {}", "MCP:".bold(), url),
        None => println!("  {} {}", "MCP:".bold(), "not configured".dimmed()),
    }
    println!();

    Ok(())
}

async fn cmd_status(cfg: AssistantConfig, config_path: &Path) -> Result<()> {
    let llm = homelab_assistant::llm::OllamaClient::new(&cfg.ollama_url, &cfg.model);
    let models = llm.list_models().await;

    println!();
    println!("{}", "=== Homelab Assistant Status ===".bold());
    println!();
    println!("  {}:  {}", "Config".bold(), config_path.display());
    println!();
    println!("  {}:", "Model".bold());
    println!("    Ollama:   {}", cfg.ollama_url);
    println!("    Model:    {}", cfg.model);
    match &models {
        Ok(names) if names.iter().any(|n| n == &cfg.model || n.starts_with(&format!("{}:", cfg.model))) => {
            println!("    State:    {}", "available".green())
        }
        Ok(_) => println!("    State:    {}", "not pulled".yellow()),
        Err(e) => println!("    State:    {} ({})", "unreachable".red(), e),
    }
    println!();
    println!("  {}:", "Tools".bold());
    println!(
        "    MCP:      {}",
        cfg.mcp_endpoint().unwrap_or("not configured")
    );
    println!("    Timeout:  {}s", cfg.tool_timeout_secs);
    match cfg.max_pending_tool_bytes {
        Some(limit) => println!("    Pending:  abandon after {} bytes", limit),
        None => println!("    Pending:  unbounded"),
    }
    println!();

    Ok(())
}
