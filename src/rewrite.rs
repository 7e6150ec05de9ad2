//! Turns a source message into a copy that looks native to the destination.
//!
//! A new subject is encoded with lettre's header machinery. Recipient headers
//! are edited in place, one mailbox at a time, so addresses that are not
//! being replaced keep their exact text. Everything else passes through
//! untouched.

use lettre::Address;
use lettre::message::Mailbox;
use lettre::message::header::{Header, Headers, Subject};

use crate::error::AddressFormatError;
use crate::identity::AddressIdentity;
use crate::message::{DerivedMessage, Envelope, MessageId, MessageRecord, RecipientField};
use crate::message::{addresses, headers};

/// Builds destination-ready copies of source messages.
#[derive(Debug, Clone)]
pub struct MessageRewriter {
    source: AddressIdentity,
    destination: AddressIdentity,
    subject_prefix: String,
}

impl MessageRewriter {
    pub fn new(
        source: AddressIdentity,
        destination: AddressIdentity,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }

    /// Produce the derived copy of `message`.
    ///
    /// 1. duplicate headers, payload and flags
    /// 2. subject becomes `prefix + subject` (absent subject counts as empty)
    /// 3. source identity replaced by the bare destination address in every
    ///    To, Cc and Bcc header; other mailboxes keep their exact text and
    ///    absent headers stay absent
    /// 4. flags cleared
    pub fn rewrite(&self, message: &MessageRecord) -> Result<DerivedMessage, AddressFormatError> {
        let mut copy = DerivedMessage::duplicate(message);

        let mut recipients_changed = false;
        for field in RecipientField::ALL {
            recipients_changed |= self.rewrite_recipients(&mut copy, field)?;
        }
        if recipients_changed {
            let subject = copy.envelope.subject.take();
            copy.envelope = Envelope::parse(&copy.raw);
            copy.envelope.subject = subject;
        }

        self.rewrite_subject(&mut copy);
        copy.flags.clear();
        Ok(copy)
    }

    /// Prefix the subject.
    ///
    /// An unchanged, present subject keeps its original bytes. A missing
    /// subject always gets a header, so with an empty prefix the copy gains a
    /// blank `Subject:` line.
    fn rewrite_subject(&self, copy: &mut DerivedMessage) {
        let original = copy.envelope.subject.take();
        let subject = format!("{}{}", self.subject_prefix, original.as_deref().unwrap_or_default());

        if !self.subject_prefix.is_empty() || original.is_none() {
            let rendered = render(Subject::from(subject.clone()));
            copy.raw = headers::replace_header(&copy.raw, "Subject", &rendered);
        }
        copy.envelope.subject = Some(subject);
    }

    /// Swap the source identity for the destination address in every
    /// occurrence of `field`. Returns whether anything was replaced.
    fn rewrite_recipients(
        &self,
        copy: &mut DerivedMessage,
        field: RecipientField,
    ) -> Result<bool, AddressFormatError> {
        let destination = destination_mailbox(copy.source_id, field, self.destination.address());
        let replacement = destination
            .as_ref()
            .map_or_else(|_| self.destination.address().to_string(), ToString::to_string);

        let mut replaced = false;
        let raw = headers::rewrite_header(&copy.raw, field.header_name(), |value| {
            let out = addresses::replace_matching(value, |a| self.source.matches(a), &replacement);
            replaced |= out.is_some();
            out
        });
        if !replaced {
            return Ok(false);
        }

        destination?;
        copy.raw = raw;
        Ok(true)
    }
}

/// Encode a single header as CRLF-terminated line(s).
fn render<H: Header>(header: H) -> String {
    let mut headers = Headers::new();
    headers.set(header);
    headers.to_string()
}

/// The destination address must be a valid bare mailbox before it is
/// written into a recipient header.
fn destination_mailbox(
    id: MessageId,
    field: RecipientField,
    address: &str,
) -> Result<Mailbox, AddressFormatError> {
    let email = address.parse::<Address>().map_err(|e| AddressFormatError {
        id,
        field: field.header_name(),
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Mailbox::new(None, email))
}
