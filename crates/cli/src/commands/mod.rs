pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;

use pricerun_core::config::{AppConfig, ConfigError, LoadOptions};
use pricerun_db::{connect_with_settings, DbPool};

/// Failure classes a command can report. Each maps to a stable exit code so
/// wrapper scripts can branch on `$?` without parsing the JSON payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    SeedExecution,
    SeedVerification,
}

impl FailureClass {
    fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration | Self::SeedExecution => 5,
            Self::SeedVerification => 6,
        }
    }
}

/// A failed command stage, carried as a value so stages compose with `?`.
#[derive(Debug)]
pub struct CommandFailure {
    pub class: FailureClass,
    pub message: String,
}

impl CommandFailure {
    pub fn new(class: FailureClass, message: impl std::fmt::Display) -> Self {
        Self { class, message: message.to_string() }
    }
}

impl From<ConfigError> for CommandFailure {
    fn from(error: ConfigError) -> Self {
        Self::new(FailureClass::ConfigValidation, format!("configuration issue: {error}"))
    }
}

/// Outcome of one command invocation: the process exit code plus the single
/// JSON line printed to stdout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let output = render(OutcomePayload {
            command,
            status: "ok",
            error_class: None,
            message: &message,
        });
        Self { exit_code: 0, output }
    }

    pub fn failure(command: &str, failure: CommandFailure) -> Self {
        let output = render(OutcomePayload {
            command,
            status: "error",
            error_class: Some(failure.class),
            message: &failure.message,
        });
        Self { exit_code: failure.class.exit_code(), output }
    }
}

#[derive(Debug, Serialize)]
struct OutcomePayload<'a> {
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<FailureClass>,
    message: &'a str,
}

fn render(payload: OutcomePayload<'_>) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Shared command scaffolding: validated config plus a current-thread
/// runtime for the store round-trips.
pub(crate) struct DbSession {
    pub(crate) config: AppConfig,
    pub(crate) runtime: tokio::runtime::Runtime,
}

impl DbSession {
    pub(crate) fn open() -> Result<Self, CommandFailure> {
        let config = AppConfig::load(LoadOptions::default())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                CommandFailure::new(
                    FailureClass::RuntimeInit,
                    format!("failed to initialize async runtime: {error}"),
                )
            })?;
        Ok(Self { config, runtime })
    }

    pub(crate) fn connect(&self) -> Result<DbPool, CommandFailure> {
        self.runtime
            .block_on(connect_with_settings(
                &self.config.database.url,
                self.config.database.max_connections,
                self.config.database.timeout_secs,
            ))
            .map_err(|error| CommandFailure::new(FailureClass::DbConnectivity, error))
    }
}
