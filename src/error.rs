//! Error types for imapmove.

use crate::mailbox::Side;
use crate::message::MessageId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Move error: {0}")]
    Move(#[from] MoveError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid IMAP URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported protocol {0:?}, expected imap or imaps")]
    UnsupportedScheme(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a [`MailboxPort`](crate::mailbox::MailboxPort).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("{command} rejected by server: {response}")]
    Rejected { command: String, response: String },

    #[error("IMAP error: {0}")]
    Imap(#[from] imap::Error),

    #[error("Malformed server response: {0}")]
    Protocol(String),

    #[error("Mailbox {0} is not open")]
    NotOpen(String),
}

/// Errors of a move run, one per step that can fail.
///
/// None of these are retried. The variant tells the caller what state the
/// source mailbox was left in.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// Nothing has been touched yet.
    #[error("Cannot open {side} mailbox: {source}")]
    Connection {
        side: Side,
        #[source]
        source: MailboxError,
    },

    /// Nothing has been touched yet.
    #[error("Failed to list source messages: {0}")]
    Fetch(#[source] MailboxError),

    /// The source mailbox is unchanged.
    #[error("Failed to copy {count} message(s) into the destination: {source}")]
    Transfer {
        count: usize,
        #[source]
        source: MailboxError,
    },

    /// The batch reached the destination but `unmarked` (which starts with
    /// `id`) are still live in the source. Re-running would copy them again;
    /// see [`Mover::mark_transferred`](crate::mover::Mover::mark_transferred).
    #[error(
        "Failed to flag message {id} as deleted, {} transferred message(s) left unmarked: {source}",
        .unmarked.len()
    )]
    Flag {
        id: MessageId,
        unmarked: Vec<MessageId>,
        #[source]
        source: MailboxError,
    },

    /// Moved messages are flagged deleted but still present.
    #[error("Failed to expunge source mailbox: {0}")]
    Expunge(#[source] MailboxError),

    #[error(transparent)]
    AddressFormat(#[from] AddressFormatError),
}

/// A recipient that cannot be rebuilt into a valid header address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address {address:?} in {field} header of message {id}: {reason}")]
pub struct AddressFormatError {
    pub id: MessageId,
    pub field: &'static str,
    pub address: String,
    pub reason: String,
}

/// Result type alias for imapmove.
pub type Result<T> = std::result::Result<T, Error>;
