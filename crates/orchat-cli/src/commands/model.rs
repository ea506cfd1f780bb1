//! /model command - show and switch models

use super::CommandResult;
use orchat_ai::{Model, catalog::find_model};

use crate::utils::truncate_chars;

pub struct ModelCommand;

impl ModelCommand {
    /// Execute /model command - shows the current model if no args, or switches to a matching one
    pub fn execute(
        args: &str,
        current_model: Option<&Model>,
        available_models: &[Model],
    ) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(match current_model {
                Some(model) => format!("Current model: {} ({})", model.name, model.id),
                None => "No model selected. Use /models to list models, /model <name> to pick one."
                    .to_string(),
            });
        }

        match find_model(args, available_models) {
            Some(model) => CommandResult::ChangeModel(model),
            // Any provider/model id is accepted even if it isn't in the catalog
            None if args.contains('/') => {
                CommandResult::ChangeModel(model_from_id(args))
            }
            None => CommandResult::Message(format!(
                "No model found matching '{}'\nUse /models to list available models",
                args
            )),
        }
    }

    /// List models as text
    pub fn list_models_text(current_model: Option<&Model>, available_models: &[Model]) -> String {
        list_models(current_model, available_models)
    }
}

/// Build a model reference for an id outside the catalog
pub fn model_from_id(id: &str) -> Model {
    let id = id.trim();
    Model::new(
        id,
        id,
        orchat_ai::catalog::provider_display_name(orchat_ai::provider_prefix(id)),
    )
}

fn list_models(current: Option<&Model>, models: &[Model]) -> String {
    if models.is_empty() {
        return "No models available".to_string();
    }

    let mut output = String::from("Available models:\n");

    // Catalog is sorted by provider, so grouping is a linear scan
    let mut provider = "";
    for model in models {
        if model.provider != provider {
            provider = &model.provider;
            output.push_str(&format!("\n{}:\n", provider));
        }
        let marker = if current.is_some_and(|c| c.id == model.id) {
            " *"
        } else {
            ""
        };
        output.push_str(&format!(
            "  {:<40} {}{}\n",
            model.id,
            truncate_chars(&model.name, 30),
            marker
        ));
    }

    output.push_str("\nSwitch with: /model <name>");
    output
}
