//! The mail-store capabilities a move needs.

pub mod memory;

use std::fmt;

use crate::error::MailboxError;
use crate::message::{DerivedMessage, MessageId, MessageRecord};

pub use memory::MemoryMailbox;

/// Which end of a move a mailbox is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// One folder of a mail store, opened for read-write access.
///
/// All calls block. Implementations own their connection; the mover borrows
/// the port mutably for the whole run, so there is never more than one user.
pub trait MailboxPort {
    /// Connect if needed and select the folder read-write.
    fn open_read_write(&mut self) -> Result<(), MailboxError>;

    /// Snapshot of every message currently in the folder, in store order.
    fn list_messages(&mut self) -> Result<Vec<MessageRecord>, MailboxError>;

    /// Add `batch` to this folder as one bulk operation, with each copy's
    /// own flags. Need not be atomic.
    fn append_messages(&mut self, batch: &[DerivedMessage]) -> Result<(), MailboxError>;

    /// Set `\Deleted` on one message.
    fn set_deleted(&mut self, id: MessageId) -> Result<(), MailboxError>;

    /// Permanently remove every `\Deleted` message.
    fn expunge(&mut self) -> Result<(), MailboxError>;

    /// Release the connection. Safe to call on a port that was never opened.
    fn close(&mut self) -> Result<(), MailboxError> {
        Ok(())
    }
}
