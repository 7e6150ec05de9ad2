//! Move orchestration: open, fetch, process, transfer, mark, expunge.
//!
//! The sequence is not atomic. If the transfer succeeds and marking then
//! fails, the transferred messages exist in both mailboxes and the source
//! copies are still live; [`MoveError::Flag`] lists them so the caller can
//! finish with [`Mover::mark_transferred`]. Re-running instead would copy
//! them a second time, since the only re-run protection is the
//! "sent by the destination" filter rule.

use tracing::{info, warn};

use crate::error::MoveError;
use crate::filter::{MessageFilter, SkipReason};
use crate::identity::AddressIdentity;
use crate::mailbox::{MailboxPort, Side};
use crate::message::{DerivedMessage, MessageId, MessageRecord};
use crate::rewrite::MessageRewriter;

/// What to do with a message whose recipients cannot be rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressErrorPolicy {
    /// Fail the run before anything is transferred.
    #[default]
    Abort,
    /// Leave the message in the source, neither copied nor marked.
    Skip,
}

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct MoveOptions {
    /// Prepended to every moved message's subject.
    pub subject_prefix: String,
    /// Expunge the source after marking.
    pub expunge: bool,
    /// Stop after processing; neither mailbox is modified.
    pub dry_run: bool,
    pub on_address_error: AddressErrorPolicy,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            subject_prefix: String::new(),
            expunge: true,
            dry_run: false,
            on_address_error: AddressErrorPolicy::Abort,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveReport {
    /// Messages in the source snapshot.
    pub fetched: usize,
    /// Source messages copied to the destination and flagged deleted, in
    /// fetch order. In a dry run these are the ones that would have moved.
    pub moved: Vec<MessageId>,
    /// Source messages left alone.
    pub skipped: Vec<(MessageId, SkipReason)>,
    /// Whether the source was expunged.
    pub expunged: bool,
}

/// Runs one move between two mailboxes.
#[derive(Debug, Clone)]
pub struct Mover {
    filter: MessageFilter,
    rewriter: MessageRewriter,
    options: MoveOptions,
}

impl Mover {
    pub fn new(
        source: AddressIdentity,
        destination: AddressIdentity,
        options: MoveOptions,
    ) -> Self {
        Self {
            filter: MessageFilter::new(destination.clone()),
            rewriter: MessageRewriter::new(source, destination, options.subject_prefix.clone()),
            options,
        }
    }

    pub fn options(&self) -> &MoveOptions {
        &self.options
    }

    /// Move every eligible message from `source` to `destination`.
    pub fn run<S, D>(&self, source: &mut S, destination: &mut D) -> Result<MoveReport, MoveError>
    where
        S: MailboxPort + ?Sized,
        D: MailboxPort + ?Sized,
    {
        info!("Starting message move");
        source
            .open_read_write()
            .map_err(|source| MoveError::Connection {
                side: Side::Source,
                source,
            })?;
        destination
            .open_read_write()
            .map_err(|source| MoveError::Connection {
                side: Side::Destination,
                source,
            })?;

        let messages = source.list_messages().map_err(MoveError::Fetch)?;
        info!("{} message(s) found in source mailbox", messages.len());

        let mut report = MoveReport {
            fetched: messages.len(),
            ..MoveReport::default()
        };
        let batch = self.process(&messages, &mut report)?;
        info!("{} message(s) will be moved", batch.len());

        if self.options.dry_run {
            info!("Dry run, leaving both mailboxes untouched");
            return Ok(report);
        }
        if batch.is_empty() {
            info!("Nothing to move");
            return Ok(report);
        }

        destination
            .append_messages(&batch)
            .map_err(|source| MoveError::Transfer {
                count: batch.len(),
                source,
            })?;
        info!("Messages moved successfully");

        Self::mark_transferred(source, &report.moved)?;
        info!("Original messages marked for deletion");

        if self.options.expunge {
            source.expunge().map_err(MoveError::Expunge)?;
            report.expunged = true;
            info!("Source mailbox expunged");
        }

        Ok(report)
    }

    /// Flag `ids` deleted in `source`, in order.
    ///
    /// On failure the error carries the failing id and every id after it.
    /// Also the way to finish a run that stopped with [`MoveError::Flag`].
    pub fn mark_transferred<S>(source: &mut S, ids: &[MessageId]) -> Result<(), MoveError>
    where
        S: MailboxPort + ?Sized,
    {
        for (i, id) in ids.iter().enumerate() {
            source
                .set_deleted(*id)
                .map_err(|source| MoveError::Flag {
                    id: *id,
                    unmarked: ids[i..].to_vec(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Filter and rewrite the snapshot, recording each decision in `report`.
    fn process(
        &self,
        messages: &[MessageRecord],
        report: &mut MoveReport,
    ) -> Result<Vec<DerivedMessage>, MoveError> {
        let mut batch = Vec::with_capacity(messages.len());

        for message in messages {
            let envelope = message.envelope();
            let from = envelope
                .from
                .first()
                .map_or_else(|| "UNKNOWN".to_string(), ToString::to_string);
            info!(
                "Message {}: {} ({from})",
                message.id(),
                envelope.subject.as_deref().unwrap_or_default()
            );

            if let Some(reason) = self.filter.check(message) {
                info!("{reason} -- skipped");
                report.skipped.push((message.id(), reason));
                continue;
            }

            match self.rewriter.rewrite(message) {
                Ok(copy) => {
                    report.moved.push(message.id());
                    batch.push(copy);
                }
                Err(e) if self.options.on_address_error == AddressErrorPolicy::Skip => {
                    warn!("{e} -- skipped");
                    report.skipped.push((message.id(), SkipReason::InvalidAddress));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(batch)
    }
}
