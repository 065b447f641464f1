//! Error types for the chat server
//!
//! Defines application-level errors, configuration errors, protocol usage
//! errors and message send errors. Uses thiserror for ergonomic error
//! definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// Every variant is fatal for the session (or the process, during startup).
/// Usage mistakes by a client are `CommandError`s instead and never end a
/// session.
#[derive(Debug, Error)]
pub enum AppError {
    /// Socket IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (includes over-long lines)
    #[error("Line codec error: {0}")]
    Lines(#[from] tokio_util::codec::AnyDelimiterCodecError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration loading errors
///
/// All of them abort startup before the listener is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A non-blank line that is not `key=value`
    #[error("malformed line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    /// A required key never appeared
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    /// `port` is not a valid TCP port number
    #[error("invalid port {value:?}")]
    InvalidPort { value: String },
}

/// Protocol usage errors
///
/// Reported back to the offending client as a notice; the session stays
/// active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `/send` without a recipient list or without a body
    #[error("malformed /send command")]
    MalformedSend,

    /// `/exclude` without a recipient list or without a body
    #[error("malformed /exclude command")]
    MalformedExclude,
}

/// Message send errors
///
/// Occurs when attempting to send lines through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

impl From<SendError> for AppError {
    fn from(_: SendError) -> Self {
        AppError::ChannelSend
    }
}
