//! Error types for coopbot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("FAQ assist error: {0}")]
    Faq(#[from] FaqError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors from any of the repository traits.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with key {key}")]
    NotFound { entity: String, key: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stale stage for {phone}: expected {expected}")]
    StaleStage { phone: String, expected: String },
}

/// Chat transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send message to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Transport rejected message to {to}: HTTP {status}")]
    Rejected { to: String, status: u16 },

    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),
}

/// FAQ assist (LLM completion) errors.
#[derive(Debug, thiserror::Error)]
pub enum FaqError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("FAQ assist timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Provider returned an empty completion")]
    EmptyCompletion,
}

/// Admin command validation errors. These produce corrective replies for
/// the issuing admin and are never treated as incidents.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {keyword}")]
    UnknownCommand { keyword: String },

    #[error("Missing argument <{argument}> for {keyword}")]
    MissingArgument {
        keyword: &'static str,
        argument: &'static str,
    },

    #[error("Not an admin command")]
    NotACommand,
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
