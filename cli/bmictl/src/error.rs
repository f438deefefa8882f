//! Error handling and display for the CLI.

use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The orchestrator answered with a failure envelope.
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response from einstein: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Api { status: 401, .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: Check --username and --password (BMI_USERNAME, BMI_PASSWORD).".yellow()
                );
            }
            CliError::Api { status: 403, .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: This operation needs an admin or a different --project.".yellow()
                );
            }
            CliError::Network(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check that einstein is running and --url (BMI_URL) points at it."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}
