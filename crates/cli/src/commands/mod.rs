pub mod config;
pub mod init;

use serde::Serialize;

/// What a subcommand prints and the exit code the process ends with.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Ways a maintenance command can fail. Each class has a fixed exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
}

impl Failure {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration => 5,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ok,
    Error,
}

/// Single-line JSON status `ebert init` prints for scripts.
#[derive(Serialize)]
struct StatusLine<'a> {
    command: &'a str,
    status: Status,
    error_class: Option<Failure>,
    message: &'a str,
}

impl CommandResult {
    /// Plain text output, used by `ebert config`.
    pub fn text(output: String) -> Self {
        Self { exit_code: 0, output }
    }

    pub fn text_failure(failure: Failure, output: String) -> Self {
        Self { exit_code: failure.exit_code(), output }
    }

    /// JSON status line for `command` built from its outcome.
    pub fn status(command: &str, outcome: Result<String, (Failure, String)>) -> Self {
        let (exit_code, status, error_class, message) = match &outcome {
            Ok(message) => (0, Status::Ok, None, message),
            Err((failure, message)) => {
                (failure.exit_code(), Status::Error, Some(*failure), message)
            }
        };
        let line = StatusLine { command, status, error_class, message };
        let output = serde_json::to_string(&line)
            .unwrap_or_else(|error| format!("{command}: could not encode status: {error}"));
        Self { exit_code, output }
    }
}
