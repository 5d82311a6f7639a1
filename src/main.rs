//! Hearth Chat Runtime
//!
//! The entry point for the local chat host.
//! Handles CLI args, config bootstrap, and the interactive
//! read-generate-print loop.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use hearth::chat::conversation::ConversationEvent;
use hearth::chat::host::ChatHost;
use hearth::config::{get_config_path, load_config, resolve_path, save_config};
use hearth::engine::scripted::ScriptedEngine;
use hearth::tools::builtin::builtin_registry;
use hearth::types::{
    default_config, ChatRole, GenerationOptions, LogLevel, StructuredContent, TurnOutcome,
};

const VERSION: &str = "0.1.0";

/// Hearth -- Local Chat Host
#[derive(Parser, Debug)]
#[command(
    name = "hearth",
    version = VERSION,
    about = "Hearth -- local chat host with streaming tool dispatch"
)]
struct Cli {
    /// Start the interactive chat loop
    #[arg(long)]
    run: bool,

    /// Write a default config to ~/.hearth/hearth.json
    #[arg(long)]
    init: bool,

    /// Show the current configuration
    #[arg(long)]
    status: bool,
}

// ---- Status Command ---------------------------------------------------------

/// Display the current host configuration.
fn show_status() {
    let config_path = get_config_path();
    if !config_path.exists() {
        println!("Hearth is not configured. Run: hearth --init");
        return;
    }

    let Some(config) = load_config() else {
        eprintln!("Failed to read config at {}", config_path.display());
        return;
    };

    println!(
        r#"
=== HEARTH STATUS ===
Config:     {}
Model:      {}
Tooling:    {}
Max length: {}
Log level:  {:?}
=====================
"#,
        config_path.display(),
        config.model_path,
        config.enable_tooling,
        config.max_length,
        config.log_level,
    );
}

// ---- Main Run ---------------------------------------------------------------

/// Demo script used when no model script file exists: a plain protocol
/// reply, then a reply that calls a built-in tool.
fn demo_engine() -> ScriptedEngine {
    ScriptedEngine::from_fragments(vec![
        vec![
            ">".to_string(),
            "!".to_string(),
            "Hello! ".to_string(),
            "Ask me ".to_string(),
            "for the time.".to_string(),
            ">".to_string(),
            "END".to_string(),
        ],
        vec![
            ">".to_string(),
            "!".to_string(),
            "Let me check.".to_string(),
            ">".to_string(),
            "#".to_string(),
            "{\"tool\":\"current_time\",\"parameters\":[]}".to_string(),
            ">".to_string(),
            "END".to_string(),
        ],
    ])
}

/// The interactive loop: read a line, run one turn, print the streamed
/// reply and any tool results as they land in the conversation.
async fn run() -> Result<()> {
    let config = load_config().unwrap_or_else(default_config);

    let model_path = resolve_path(&config.model_path);
    let engine = if Path::new(&model_path).exists() {
        ScriptedEngine::from_script_file(&model_path)
            .with_context(|| format!("Failed to load model script {}", model_path))?
    } else {
        debug!(model_path = %model_path, "no model script found, using demo script");
        demo_engine()
    };

    let options = GenerationOptions {
        temperature: config.temperature,
        max_length: config.max_length,
    };
    let mut host = ChatHost::new(
        Arc::new(engine),
        builtin_registry(),
        config.system_prompt.clone(),
        config.enable_tooling,
        options,
    );

    let mut events = host.conversation_mut().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ConversationEvent::StreamingText { delta, .. } => {
                    print!("{}", delta);
                    let _ = std::io::stdout().flush();
                }
                ConversationEvent::MessageAppended { message, .. } => match message.content {
                    Some(StructuredContent::ToolResult(result)) => {
                        println!("\n{} {}", format!("[{}]", result.tool).cyan(), result.output);
                    }
                    _ => {
                        if message.role == ChatRole::System {
                            println!("{}", message.text.red());
                        }
                    }
                },
                ConversationEvent::ProcessingChanged(_) => {}
            }
        }
    });

    println!("{}", "Hearth ready. Type /quit to exit.".green());

    loop {
        let input = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("you")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .context("Input task failed")?;

        let line = match input {
            Ok(line) => line,
            Err(_) => break,
        };
        if line.trim() == "/quit" || line.trim() == "/exit" {
            break;
        }

        // Ctrl+C cancels the running turn instead of killing the host.
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let outcome = host.send_message(&line, cancel).await?;
        watcher.abort();

        match outcome {
            TurnOutcome::Completed => println!(),
            TurnOutcome::Cancelled => println!("\n{}", "(cancelled)".yellow()),
            TurnOutcome::Failed => println!(),
        }
    }

    printer.abort();
    println!("{}", "Goodbye.".green());
    Ok(())
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    let config = load_config().unwrap_or_else(default_config);
    let level = match config.log_level {
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let cli = Cli::parse();

    if cli.init {
        let config = default_config();
        match save_config(&config) {
            Ok(()) => println!("Wrote default config to {}", get_config_path().display()),
            Err(e) => {
                eprintln!("Init failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.status {
        show_status();
        return;
    }

    if cli.run {
        if let Err(e) = run().await {
            eprintln!("Fatal: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Default: show help
    println!("Run \"hearth --help\" for usage information.");
    println!("Run \"hearth --run\" to start chatting.");
}
