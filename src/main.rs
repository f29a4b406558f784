//! GeminiBuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use geminibuddy::{
    cli::{watch_interrupts, Args, Commands, Config, Interrupt},
    execute_user_turn,
    execution::title_chat,
    models::{GeminiClient, ModelClient, ModelInfo, TITLE_MODEL},
    session::{ChatStore, JsonlChatStore},
    telemetry::init_tracing,
    tools::{ToolRegistry, ToolRuntime},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status when a run ends without an answer
const EXIT_INCOMPLETE: i32 = 2;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbosity());

    if let Err(e) = run(&args).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    args.validate().map_err(anyhow::Error::msg)?;

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate()?;

    match &args.command {
        Some(Commands::History { chat }) => show_history(&config, chat),
        Some(Commands::Chats) => list_chats(&config),
        Some(Commands::Delete { chat }) => delete_chat(&config, chat),
        Some(Commands::Rename { chat, title }) => rename_chat(&config, chat, title),
        Some(Commands::Tools) => show_tools(),
        Some(Commands::Models) => {
            for model in ModelInfo::catalog(&config.model.default_model) {
                println!("  {}", model);
            }
            Ok(())
        }
        Some(Commands::Config) => show_config(&config),
        None => match &args.prompt {
            Some(prompt) => run_prompt(args, &config, prompt).await,
            None => Ok(()),
        },
    }
}

async fn run_prompt(args: &Args, config: &Config, prompt: &str) -> Result<()> {
    let sandbox = config.sandbox_root();
    std::fs::create_dir_all(&sandbox)
        .with_context(|| format!("Failed to create sandbox {}", sandbox.display()))?;

    let runtime = ToolRuntime::with_context(&sandbox, config.tool_context())?;
    let store = JsonlChatStore::new(config.chats_dir())?;

    let chat_id = match &args.chat {
        Some(id) => id.clone(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            eprintln!("{} {}", "Chat:".dimmed(), id);
            id
        }
    };

    // A chat stays on the model it was started with unless --model is given
    let model_name = match (&args.model, store.meta(&chat_id)?) {
        (None, Some(meta)) => meta.model,
        _ => config.model.default_model.clone(),
    };
    let model = Arc::new(GeminiClient::from_env(
        model_name,
        Some(config.model.api_base_url.clone()),
        config.request_timeout(),
    )?);

    // First Ctrl-C stops the run at the next iteration boundary; a second one quits
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(watcher, tokio::signal::ctrl_c).await == Interrupt::ForceQuit {
            eprintln!("{}", "Interrupted.".red().bold());
            std::process::exit(EXIT_INCOMPLETE);
        }
    });

    info!(
        chat_id = %chat_id,
        model = %model.model_name(),
        tools = runtime.registry().len(),
        sandbox = %runtime.sandbox_root().display(),
        "running prompt"
    );

    let outcome = execute_user_turn(
        &store,
        &chat_id,
        prompt,
        model,
        runtime,
        config.agent.max_iterations,
        &cancel,
    )
    .await;

    match outcome {
        Ok(report) => {
            name_chat(config, &store, &chat_id, prompt).await;
            println!("{}", report.answer);
            if args.verbosity().show_summary() {
                eprintln!("{}", report.summary().dimmed());
            }
            Ok(())
        }
        Err(e) if e.transcript().is_some() || e.is_model_failure() => {
            eprintln!("{} {}", "Could not complete:".red().bold(), e);
            eprintln!(
                "{}",
                format!("Progress so far is saved; view it with: geminibuddy history {}", chat_id).dimmed()
            );
            std::process::exit(EXIT_INCOMPLETE);
        }
        Err(e) => Err(e.into()),
    }
}

/// Give a new chat a title; failures only cost the title
async fn name_chat(config: &Config, store: &JsonlChatStore, chat_id: &str, prompt: &str) {
    let titler = match GeminiClient::from_env(
        TITLE_MODEL,
        Some(config.model.api_base_url.clone()),
        config.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "title model unavailable");
            return;
        }
    };

    if let Err(e) = title_chat(store, chat_id, prompt, &titler).await {
        warn!(chat_id, error = %e, "failed to title chat");
    }
}

fn show_history(config: &Config, chat: &str) -> Result<()> {
    let store = JsonlChatStore::new(config.chats_dir())?;
    let conversation = store.load_conversation(chat)?;

    if let Some(meta) = store.meta(chat)? {
        println!("{}", meta.header());
    }

    if conversation.is_empty() {
        println!("No messages in chat {}", chat);
    } else {
        print!("{}", conversation.render_transcript());
    }
    Ok(())
}

fn list_chats(config: &Config) -> Result<()> {
    let store = JsonlChatStore::new(config.chats_dir())?;
    let chats = store.list_chats()?;

    if chats.is_empty() {
        println!("No chats yet.");
        return Ok(());
    }

    for chat in chats {
        let updated = chat
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let (title, model) = chat
            .meta
            .as_ref()
            .map(|m| (m.title.as_str(), m.model.as_str()))
            .unwrap_or(("-", "-"));
        println!(
            "  {}  {}  [{}]  {:>4} turns  {}",
            chat.chat_id.cyan(),
            title.bold(),
            model,
            chat.turn_count,
            updated.dimmed()
        );
    }
    Ok(())
}

fn delete_chat(config: &Config, chat: &str) -> Result<()> {
    let store = JsonlChatStore::new(config.chats_dir())?;

    if store.delete(chat)? {
        println!("{} Deleted chat {}", "✓".green(), chat);
    } else {
        println!("Chat {} not found", chat);
    }
    Ok(())
}

fn rename_chat(config: &Config, chat: &str, title: &str) -> Result<()> {
    let store = JsonlChatStore::new(config.chats_dir())?;

    if store.rename(chat, title)? {
        let meta = store.meta(chat)?.map(|m| m.title).unwrap_or_default();
        println!("{} Renamed chat {} to \"{}\"", "✓".green(), chat, meta);
    } else {
        println!("Chat {} not found", chat);
    }
    Ok(())
}

fn show_tools() -> Result<()> {
    let registry = ToolRegistry::builtin()?;
    println!("{}", serde_json::to_string_pretty(&registry.schemas())?);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    if let Some(path) = Config::default_path() {
        println!("{} {}", "Config file:".bold(), path.display());
    }
    println!("{}", config.to_toml()?);
    Ok(())
}
