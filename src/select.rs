//! Interactive operator choices.

use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use thiserror::Error;

/// One option offered to the operator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Choice {
    /// Text shown in the prompt.
    pub label: String,
    /// Value returned when the option is picked.
    pub value: String,
}

impl Choice {
    /// Creates a choice.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Errors raised by prompts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SelectError {
    /// The operator dismissed the prompt.
    #[error("selection cancelled")]
    Cancelled,
    /// There was nothing to choose from.
    #[error("no choices available for `{prompt}`")]
    NoChoices {
        /// Prompt that had no options.
        prompt: String,
    },
    /// The terminal prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(String),
}

/// Presents choices and returns the value of the picked one.
pub trait Selector {
    /// Asks the operator to pick one of `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Cancelled`] when the prompt is dismissed and
    /// [`SelectError::NoChoices`] when `choices` is empty.
    fn select(&self, prompt: &str, choices: &[Choice]) -> Result<String, SelectError>;
}

/// Terminal selector backed by `dialoguer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalSelector;

impl Selector for TerminalSelector {
    fn select(&self, prompt: &str, choices: &[Choice]) -> Result<String, SelectError> {
        if choices.is_empty() {
            return Err(SelectError::NoChoices {
                prompt: prompt.to_owned(),
            });
        }

        let labels: Vec<&str> = choices.iter().map(|choice| choice.label.as_str()).collect();
        let picked = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact_opt()
            .map_err(|err| SelectError::Prompt(err.to_string()))?
            .ok_or(SelectError::Cancelled)?;

        choices
            .get(picked)
            .map(|choice| choice.value.clone())
            .ok_or(SelectError::Cancelled)
    }
}
