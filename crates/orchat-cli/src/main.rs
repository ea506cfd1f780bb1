//! orchat - terminal chat client for OpenRouter models

mod commands;
mod config;
mod storage;
mod utils;

use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use clap::Parser;
use orchat_ai::{
    Model, OpenRouterClient, catalog,
    credentials::{self, KeyValidation},
    providers::get_api_key,
};
use orchat_chat::{
    ApiKeyStatus, ChatController, ChatEvent, CredentialManager, ModelChange, ProviderTransport,
    SendOutcome,
};
use tokio::sync::broadcast;

use crate::commands::{CommandResult, ModelCommand};
use crate::storage::FileStore;
use crate::utils::{confirm, mask_key, pluralize};

/// Environment variable consulted when no key is given or stored
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// orchat - chat with OpenRouter models from the terminal
#[derive(Parser, Debug)]
#[command(name = "orchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (OpenRouter id, or part of a catalog id/name)
    #[arg(short, long)]
    model: Option<String>,

    /// API key for this run (not stored)
    #[arg(long)]
    api_key: Option<String>,

    /// Run in non-interactive mode with a single message
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List available models
    #[arg(long)]
    list_models: bool,

    /// Show credit usage for the API key
    #[arg(long)]
    credits: bool,

    /// Validate an API key and store it
    #[arg(long, value_name = "KEY")]
    set_key: Option<String>,

    /// Remove the stored API key
    #[arg(long)]
    clear_key: bool,

    /// Show the stored API key status
    #[arg(long)]
    key_status: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

/// Everything the interactive loop works with
struct App {
    chat: ChatController,
    client: OpenRouterClient,
    credential: Option<String>,
    models: Vec<Model>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("orchat_cli=debug,orchat_ai=debug,orchat_chat=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let client = OpenRouterClient::new(cfg.client_config());
    let mut keys = CredentialManager::load(FileStore::default_location())?;

    if let Some(key) = args.set_key {
        return handle_set_key(&client, &mut keys, &key).await;
    }

    if args.clear_key {
        keys.clear()?;
        println!("Removed stored API key.");
        return Ok(());
    }

    if args.key_status {
        show_key_status(&keys);
        return Ok(());
    }

    let credential = resolve_credential(&client, &mut keys, args.api_key.as_deref()).await;

    if args.credits {
        println!("{}", credits_text(&client, credential.as_deref()).await);
        return Ok(());
    }

    let catalog = catalog::load_models(&client, credential.as_deref()).await;
    if let Some(ref error) = catalog.error {
        eprintln!("Warning: Failed to load models: {}", error);
    }

    if args.list_models {
        println!("{}", ModelCommand::list_models_text(None, &catalog.models));
        return Ok(());
    }

    let transport = Arc::new(ProviderTransport::openrouter(client.clone()));
    let chat = ChatController::new(cfg.chat_config(args.no_stream), transport);
    chat.set_credential(credential.clone());

    // Merge config with CLI args (CLI takes precedence)
    if let Some(query) = args.model.or(cfg.model.clone()) {
        match catalog::find_model(&query, &catalog.models) {
            Some(model) => {
                chat.set_selected_model(model);
            }
            None if query.contains('/') => {
                chat.set_selected_model(commands::model_from_id(&query));
            }
            None => eprintln!("Warning: No model found matching '{}'", query),
        }
    }

    let app = App {
        chat,
        client,
        credential,
        models: catalog.models,
    };

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&app, &command).await;
    }

    run_interactive(&app).await
}

/// Pick this run's key: `--api-key`, then the stored key, then the
/// environment. Only a key that validates is returned; without one, replies
/// are demo responses.
async fn resolve_credential(
    client: &OpenRouterClient,
    keys: &mut CredentialManager<FileStore>,
    provided: Option<&str>,
) -> Option<String> {
    if let Some(key) = provided.map(str::trim).filter(|k| !k.is_empty()) {
        return check_key(client, key).await;
    }

    if keys.has_key() {
        if let Some(key) = keys.valid_key() {
            return Some(key.to_string());
        }

        let key = keys.data().key.clone();
        let result = credentials::validate_key(client, &key).await;
        let status = if result.is_valid {
            ApiKeyStatus::Valid
        } else {
            ApiKeyStatus::Invalid
        };
        if let Err(e) = keys.update_status(status) {
            tracing::warn!("Failed to record key status: {}", e);
        }
        report_validation(&result);
        return result.is_valid.then_some(key);
    }

    match get_api_key(None, API_KEY_ENV) {
        Ok(key) => check_key(client, &key).await,
        Err(_) => None,
    }
}

async fn check_key(client: &OpenRouterClient, key: &str) -> Option<String> {
    let result = credentials::validate_key(client, key).await;
    report_validation(&result);
    result.is_valid.then(|| key.trim().to_string())
}

fn report_validation(result: &KeyValidation) {
    if let Some(ref error) = result.error {
        eprintln!("Warning: {}. Replies will be demo responses.", error);
    }
}

async fn handle_set_key(
    client: &OpenRouterClient,
    keys: &mut CredentialManager<FileStore>,
    key: &str,
) -> anyhow::Result<()> {
    println!("Validating API key...");
    let result = credentials::validate_key(client, key).await;

    if !result.is_valid {
        let error = result
            .error
            .unwrap_or_else(|| "Invalid API key".to_string());
        eprintln!("API key rejected: {}", error);
        std::process::exit(1);
    }

    keys.save(key, ApiKeyStatus::Valid)?;
    println!("API key validated and saved.");
    if let Some(label) = result.key_info.and_then(|info| info.label) {
        println!("Key label: {}", label);
    }
    Ok(())
}

fn show_key_status(keys: &CredentialManager<FileStore>) {
    if !keys.has_key() {
        println!("No API key stored.");
        println!();
        println!("Set one with: orchat --set-key <KEY>");
        println!("Or export {}=sk-or-...", API_KEY_ENV);
        return;
    }

    let data = keys.data();
    let status = match data.status {
        ApiKeyStatus::NotSet => "not validated",
        ApiKeyStatus::Valid => "valid",
        ApiKeyStatus::Invalid => "invalid",
    };
    println!("{:<16} {}", "Stored key:", mask_key(&data.key));
    println!("{:<16} {}", "Status:", status);
    if let Some(validated) = data.last_validated {
        println!(
            "{:<16} {}",
            "Last validated:",
            validated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

async fn credits_text(client: &OpenRouterClient, credential: Option<&str>) -> String {
    let Some(key) = credential else {
        return "A valid API key is required to show credits.".to_string();
    };
    match client.credit_info(key).await {
        Ok(info) => commands::format_credits(&info),
        Err(e) => format!("Failed to fetch credit info: {}", e),
    }
}

/// Prints transcript changes as they arrive
#[derive(Default)]
struct EventPrinter {
    /// Bytes of each message already written
    printed: HashMap<String, usize>,
}

impl EventPrinter {
    fn handle(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::MessageAdded { message } if !message.is_user() => {
                if !message.content.is_empty() {
                    println!("{}", message.content);
                }
                self.printed.insert(message.id, message.content.len());
            }
            ChatEvent::MessageDelta { id, delta } => {
                print!("{}", delta);
                io::stdout().flush().ok();
                *self.printed.entry(id).or_default() += delta.len();
            }
            ChatEvent::MessageUpdated { message } => {
                let done = self.printed.get(&message.id).copied().unwrap_or(0);
                if let Some(rest) = message.content.get(done..) {
                    print!("{}", rest);
                    io::stdout().flush().ok();
                }
                self.printed.insert(message.id, message.content.len());
            }
            ChatEvent::StreamEnd { .. } => {
                println!();
            }
            _ => {}
        }
    }
}

/// Send one message, printing the reply as it streams. Ctrl-C stops the reply.
async fn send_and_print(chat: &ChatController, text: &str) -> SendOutcome {
    let mut events = chat.subscribe();
    let mut printer = EventPrinter::default();

    let send = chat.send_message(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            event = events.recv() => match event {
                Ok(event) => printer.handle(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Display skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                chat.cancel();
            }
        }
    };

    // Events emitted as the send finished
    while let Ok(event) = events.try_recv() {
        printer.handle(event);
    }
    outcome
}

async fn run_command(app: &App, command: &str) -> anyhow::Result<()> {
    println!("orchat> {}", command);
    println!();

    if let SendOutcome::Failed(_) = send_and_print(&app.chat, command).await {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_interactive(app: &App) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        let model = app
            .chat
            .selected_model()
            .map(|m| m.name)
            .unwrap_or_else(|| "no model selected".to_string());
        eprintln!("orchat ({})", model);
        if app.credential.is_none() {
            eprintln!("No valid API key: replies are demo responses.");
            eprintln!("Set one with: orchat --set-key <KEY>");
        }
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        let current = app.chat.selected_model();
        if let Some(result) = commands::execute_command(input, current.as_ref(), &app.models) {
            match result {
                CommandResult::Clear => clear_conversation(&app.chat)?,
                CommandResult::Exit => break,
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::ChangeModel(model) => change_model(&app.chat, model)?,
                CommandResult::ListModels => {
                    println!(
                        "{}",
                        ModelCommand::list_models_text(current.as_ref(), &app.models)
                    );
                }
                CommandResult::ShowCredits => {
                    println!("{}", credits_text(&app.client, app.credential.as_deref()).await);
                }
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        send_and_print(&app.chat, input).await;
        println!();
    }

    Ok(())
}

fn change_model(chat: &ChatController, model: Model) -> io::Result<()> {
    let current = chat.selected_model();

    match chat.set_selected_model(model.clone()) {
        ModelChange::Applied => {
            println!("Switched to: {} ({})", model.name, model.provider);
        }
        ModelChange::NeedsConfirmation => {
            let current_name = current
                .map(|m| m.name)
                .unwrap_or_else(|| "no model".to_string());
            println!(
                "You're currently chatting with {} and have {} in this conversation.",
                current_name,
                pluralize(chat.messages().len(), "message")
            );
            println!(
                "Switching to {} will continue the conversation, but the new model may interpret the conversation differently.",
                model.name
            );
            println!(
                "Tip: Consider starting a new chat (/clear) for the best experience with different models."
            );

            if confirm(&format!("Switch to {}?", model.name))? {
                chat.confirm_model_change();
                println!("Switched to: {} ({})", model.name, model.provider);
            } else {
                chat.cancel_model_change();
                println!("Keeping {}.", current_name);
            }
        }
    }
    Ok(())
}

fn clear_conversation(chat: &ChatController) -> io::Result<()> {
    let count = chat.messages().len();
    if count == 0 {
        println!("Nothing to clear.");
        return Ok(());
    }

    if confirm(&format!(
        "Are you sure you want to delete all {}? This cannot be undone.",
        pluralize(count, "message")
    ))? {
        chat.clear_chat();
        println!("Cleared conversation.");
    } else {
        println!("Kept conversation.");
    }
    Ok(())
}
