//! Decides which source messages stay out of a move.

use std::fmt;

use crate::identity::AddressIdentity;
use crate::message::MessageRecord;

/// Why a message was left in the source mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sent by the destination account itself.
    FromDestination,
    /// Already carries `\Deleted`.
    AlreadyDeleted,
    /// A recipient could not be rewritten and the run is set to skip such
    /// messages.
    InvalidAddress,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromDestination => f.write_str("From destination"),
            Self::AlreadyDeleted => f.write_str("Already deleted"),
            Self::InvalidAddress => f.write_str("Invalid recipient address"),
        }
    }
}

/// Skip rules, checked in order; the first match wins.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    destination: AddressIdentity,
}

impl MessageFilter {
    pub fn new(destination: AddressIdentity) -> Self {
        Self { destination }
    }

    /// `Some(reason)` when the message must not be moved. The sender is the
    /// `From` mailbox list, or `Sender` when `From` is absent.
    ///
    /// Works on the fetched snapshot; flags changed by other clients since
    /// the fetch are not seen.
    pub fn check(&self, message: &MessageRecord) -> Option<SkipReason> {
        let from_destination = message
            .envelope()
            .from
            .iter()
            .any(|a| self.destination.matches(&a.address));
        if from_destination {
            return Some(SkipReason::FromDestination);
        }
        if message.is_deleted() {
            return Some(SkipReason::AlreadyDeleted);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Flags, MessageId};

    fn record(from: &str, flags: &str) -> MessageRecord {
        let raw = format!("From: {from}\r\nTo: src@example.com\r\nSubject: S\r\n\r\nBody\r\n");
        MessageRecord::new(MessageId(1), Flags::parse(flags), raw.into_bytes())
    }

    fn filter() -> MessageFilter {
        MessageFilter::new(AddressIdentity::from_address("dst@example.com"))
    }

    #[test]
    fn ordinary_message_passes() {
        assert_eq!(filter().check(&record("someone@example.com", "\\Seen")), None);
    }

    #[test]
    fn bare_destination_sender_skipped() {
        assert_eq!(
            filter().check(&record("dst@example.com", "")),
            Some(SkipReason::FromDestination)
        );
    }

    #[test]
    fn named_destination_sender_skipped() {
        assert_eq!(
            filter().check(&record("Destination User <dst@example.com>", "")),
            Some(SkipReason::FromDestination)
        );
    }

    #[test]
    fn any_sender_in_list_counts() {
        assert_eq!(
            filter().check(&record("a@example.com, dst@example.com", "")),
            Some(SkipReason::FromDestination)
        );
    }

    #[test]
    fn sender_match_is_case_sensitive() {
        assert_eq!(filter().check(&record("DST@example.com", "")), None);
    }

    #[test]
    fn deleted_message_skipped() {
        assert_eq!(
            filter().check(&record("someone@example.com", "\\Seen \\Deleted")),
            Some(SkipReason::AlreadyDeleted)
        );
    }

    #[test]
    fn destination_rule_checked_first() {
        assert_eq!(
            filter().check(&record("dst@example.com", "\\Deleted")),
            Some(SkipReason::FromDestination)
        );
    }

    #[test]
    fn missing_from_header_is_not_skipped() {
        let raw = b"To: src@example.com\r\n\r\nBody\r\n".to_vec();
        let message = MessageRecord::new(MessageId(2), Flags::new(), raw);
        assert_eq!(filter().check(&message), None);
    }

    #[test]
    fn sender_header_used_when_from_missing() {
        let raw = b"Sender: dst@example.com\r\nTo: src@example.com\r\n\r\nBody\r\n".to_vec();
        let message = MessageRecord::new(MessageId(3), Flags::new(), raw);
        assert_eq!(filter().check(&message), Some(SkipReason::FromDestination));
    }
}
