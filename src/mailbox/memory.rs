//! A mailbox kept in process memory.
//!
//! Behaves like a single IMAP folder: messages get increasing UIDs, appended
//! copies keep their own flags, and expunge drops everything flagged
//! `\Deleted`. Any operation can be made to fail after a number of successful
//! calls, which is how partial-failure states are reproduced in tests.

use tracing::debug;

use crate::error::MailboxError;
use crate::mailbox::MailboxPort;
use crate::message::{DerivedMessage, Flag, Flags, MessageId, MessageRecord};

/// Port operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    List,
    Append,
    SetDeleted,
    Expunge,
}

impl Operation {
    fn command(self) -> &'static str {
        match self {
            Self::Open => "SELECT",
            Self::List => "FETCH",
            Self::Append => "APPEND",
            Self::SetDeleted => "STORE",
            Self::Expunge => "EXPUNGE",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    uid: u32,
    flags: Flags,
    raw: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    operation: Operation,
    remaining_successes: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryMailbox {
    name: String,
    messages: Vec<StoredMessage>,
    next_uid: u32,
    open: bool,
    failure: Option<Failure>,
}

impl MemoryMailbox {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
            next_uid: 1,
            open: false,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a message with no flags.
    pub fn add(&mut self, raw: impl Into<Vec<u8>>) -> MessageId {
        self.add_with_flags(raw, Flags::new())
    }

    pub fn add_with_flags(&mut self, raw: impl Into<Vec<u8>>, flags: Flags) -> MessageId {
        let uid = self.next_uid;
        self.next_uid += 1;
        self.messages.push(StoredMessage {
            uid,
            flags,
            raw: raw.into(),
        });
        MessageId(uid)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Every message currently stored, whether or not the mailbox is open.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.messages
            .iter()
            .map(|m| MessageRecord::new(MessageId(m.uid), m.flags.clone(), m.raw.clone()))
            .collect()
    }

    pub fn flags(&self, id: MessageId) -> Option<&Flags> {
        self.messages.iter().find(|m| m.uid == id.0).map(|m| &m.flags)
    }

    /// Number of stored messages carrying `\Deleted`.
    pub fn deleted_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.flags.contains(&Flag::Deleted))
            .count()
    }

    /// Make the next call of `operation` fail.
    pub fn fail_on(&mut self, operation: Operation) {
        self.fail_after(operation, 0);
    }

    /// Let `successes` calls of `operation` through, then fail every
    /// following one.
    pub fn fail_after(&mut self, operation: Operation, successes: usize) {
        self.failure = Some(Failure {
            operation,
            remaining_successes: successes,
        });
    }

    fn check(&mut self, operation: Operation) -> Result<(), MailboxError> {
        if let Some(failure) = self.failure.as_mut()
            && failure.operation == operation
        {
            if failure.remaining_successes == 0 {
                return Err(MailboxError::Rejected {
                    command: operation.command().to_string(),
                    response: format!("simulated failure in {}", self.name),
                });
            }
            failure.remaining_successes -= 1;
        }
        if operation != Operation::Open && !self.open {
            return Err(MailboxError::NotOpen(self.name.clone()));
        }
        Ok(())
    }
}

impl MailboxPort for MemoryMailbox {
    fn open_read_write(&mut self) -> Result<(), MailboxError> {
        self.check(Operation::Open)?;
        self.open = true;
        debug!("Opened in-memory mailbox {}", self.name);
        Ok(())
    }

    fn list_messages(&mut self) -> Result<Vec<MessageRecord>, MailboxError> {
        self.check(Operation::List)?;
        Ok(self.snapshot())
    }

    fn append_messages(&mut self, batch: &[DerivedMessage]) -> Result<(), MailboxError> {
        self.check(Operation::Append)?;
        for message in batch {
            self.add_with_flags(message.raw().to_vec(), message.flags().clone());
        }
        Ok(())
    }

    fn set_deleted(&mut self, id: MessageId) -> Result<(), MailboxError> {
        self.check(Operation::SetDeleted)?;
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.uid == id.0)
            .ok_or_else(|| MailboxError::Rejected {
                command: "STORE".into(),
                response: format!("no message {id} in {}", self.name),
            })?;
        message.flags.insert(Flag::Deleted);
        Ok(())
    }

    fn expunge(&mut self) -> Result<(), MailboxError> {
        self.check(Operation::Expunge)?;
        self.messages.retain(|m| !m.flags.contains(&Flag::Deleted));
        Ok(())
    }

    fn close(&mut self) -> Result<(), MailboxError> {
        self.open = false;
        Ok(())
    }
}
