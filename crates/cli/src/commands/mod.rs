pub mod config;
pub mod discounts;
pub mod doctor;
pub mod migrate;
pub mod quote;
pub mod search;
pub mod seed;
pub mod shell;

use quotedesk_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Plain output for user-facing commands such as a rendered quote.
    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Exit codes shared by every subcommand.
pub mod exit {
    pub const VALIDATION: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const CATALOG: u8 = 4;
    pub const EXECUTION: u8 = 5;
    pub const VERIFICATION: u8 = 6;
}

pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            exit::VALIDATION,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            exit::RUNTIME,
        )
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
