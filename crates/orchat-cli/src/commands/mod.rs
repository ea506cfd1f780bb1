//! Slash commands for interactive mode

mod credits;
mod model;

pub use credits::format_credits;
pub use model::{ModelCommand, model_from_id};

use orchat_ai::Model;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Clear the conversation (after confirmation)
    Clear,
    /// Switch to a model (may need confirmation)
    ChangeModel(Model),
    /// List the model catalog
    ListModels,
    /// Fetch and show credit usage
    ShowCredits,
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    current_model: Option<&Model>,
    available_models: &[Model],
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "model" | "m" => ModelCommand::execute(args, current_model, available_models),

        "models" => CommandResult::ListModels,

        "credits" => CommandResult::ShowCredits,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /model, /m [name]    Show the current model or switch to a model
  /models              List available models
  /credits             Show credit usage for the API key
  /clear, /c           Clear conversation history
  /quit, /exit, /q     Exit orchat

Press Ctrl-C while a reply is streaming to stop it.

Examples:
  /model               Show the current model
  /model sonnet        Switch to first model matching "sonnet"
  /clear               Start fresh conversation"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchat_ai::catalog::default_models;

    #[test]
    fn test_not_a_command() {
        assert!(execute_command("hello", None, &[]).is_none());
    }

    #[test]
    fn test_basic_commands() {
        let models = default_models();
        assert_eq!(execute_command("/clear", None, &models), Some(CommandResult::Clear));
        assert_eq!(execute_command(" /Q ", None, &models), Some(CommandResult::Exit));
        assert_eq!(execute_command("/models", None, &models), Some(CommandResult::ListModels));
        assert_eq!(execute_command("/credits", None, &models), Some(CommandResult::ShowCredits));
        assert_eq!(
            execute_command("/frobnicate now", None, &models),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
        assert!(matches!(
            execute_command("/help", None, &models),
            Some(CommandResult::Message(text)) if text.contains("/model")
        ));
    }

    #[test]
    fn test_model_command_switches() {
        let models = default_models();
        assert_eq!(
            execute_command("/m haiku", None, &models),
            Some(CommandResult::ChangeModel(models[3].clone()))
        );
    }
}
