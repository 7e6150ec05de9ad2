//! Message model: source records, derived copies, flags and envelopes.
//!
//! A [`MessageRecord`] is a read-only view of a message as fetched from the
//! source mailbox. A [`DerivedMessage`] is the copy destined for the
//! destination. The two never share state, so clearing the copy's flags can
//! not leak into the source record and vice versa.

pub mod addresses;
pub mod headers;

use std::collections::BTreeSet;
use std::fmt;

use mail_parser::{HeaderValue, Message, MessageParser};

/// Identifier of a message inside its mailbox (the IMAP UID for IMAP stores).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Flags ───────────────────────────────────────────────────────────

/// A per-message marker maintained by the mail store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    /// Session-only flag; servers never accept it from clients.
    Recent,
    Keyword(String),
}

impl Flag {
    /// Parse an IMAP flag token such as `\Seen` or `$Forwarded`.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "\\seen" => Self::Seen,
            "\\answered" => Self::Answered,
            "\\flagged" => Self::Flagged,
            "\\deleted" => Self::Deleted,
            "\\draft" => Self::Draft,
            "\\recent" => Self::Recent,
            _ => Self::Keyword(token.to_string()),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seen => f.write_str("\\Seen"),
            Self::Answered => f.write_str("\\Answered"),
            Self::Flagged => f.write_str("\\Flagged"),
            Self::Deleted => f.write_str("\\Deleted"),
            Self::Draft => f.write_str("\\Draft"),
            Self::Recent => f.write_str("\\Recent"),
            Self::Keyword(kw) => f.write_str(kw),
        }
    }
}

/// An ordered set of flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space separated IMAP flag list body, e.g. `\Seen \Deleted`.
    pub fn parse(list: &str) -> Self {
        list.split_whitespace().map(Flag::parse).collect()
    }

    pub fn insert(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: &Flag) -> bool {
        self.0.remove(flag)
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Addresses ───────────────────────────────────────────────────────

/// One mailbox of an address header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl MailAddress {
    pub fn new(name: Option<&str>, address: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            address: address.to_string(),
        }
    }

    /// An address without display name.
    pub fn bare(address: &str) -> Self {
        Self::new(None, address)
    }

    fn from_parsed(addr: &mail_parser::Addr<'_>) -> Option<Self> {
        let address = addr.address.as_ref()?;
        Some(Self {
            name: addr.name.as_ref().map(|n| n.to_string()),
            address: address.to_string(),
        })
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// The recipient headers a move rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientField {
    To,
    Cc,
    Bcc,
}

impl RecipientField {
    pub const ALL: [Self; 3] = [Self::To, Self::Cc, Self::Bcc];

    pub fn header_name(self) -> &'static str {
        match self {
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }
}

/// The headers the filter and rewriter look at.
///
/// An absent recipient header is `None`, which is not the same as an empty
/// list. Repeated recipient headers are merged in header order. `from` falls
/// back to `Sender` when the message has no `From`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub from: Vec<MailAddress>,
    pub to: Option<Vec<MailAddress>>,
    pub cc: Option<Vec<MailAddress>>,
    pub bcc: Option<Vec<MailAddress>>,
    pub subject: Option<String>,
}

impl Envelope {
    /// Read the envelope headers of a raw RFC 5322 message.
    pub fn parse(raw: &[u8]) -> Self {
        let Some(parsed) = MessageParser::default().parse(raw) else {
            return Self::default();
        };
        let from = flatten(parsed.from())
            .or_else(|| flatten(parsed.sender()))
            .unwrap_or_default();
        Self {
            from,
            to: recipient_header(&parsed, RecipientField::To),
            cc: recipient_header(&parsed, RecipientField::Cc),
            bcc: recipient_header(&parsed, RecipientField::Bcc),
            subject: parsed.subject().map(str::to_string),
        }
    }

    pub fn recipients(&self, field: RecipientField) -> Option<&[MailAddress]> {
        match field {
            RecipientField::To => self.to.as_deref(),
            RecipientField::Cc => self.cc.as_deref(),
            RecipientField::Bcc => self.bcc.as_deref(),
        }
    }
}

/// Every occurrence of a recipient header, merged.
fn recipient_header(parsed: &Message<'_>, field: RecipientField) -> Option<Vec<MailAddress>> {
    let mut found = false;
    let mut list = Vec::new();
    for header in parsed.headers() {
        if !header.name().eq_ignore_ascii_case(field.header_name()) {
            continue;
        }
        found = true;
        if let HeaderValue::Address(addr) = header.value() {
            list.extend(flatten(Some(addr)).unwrap_or_default());
        }
    }
    found.then_some(list)
}

/// Flatten a parsed address header, groups included.
fn flatten(addr: Option<&mail_parser::Address<'_>>) -> Option<Vec<MailAddress>> {
    let addr = addr?;
    let list = match addr {
        mail_parser::Address::List(addrs) => {
            addrs.iter().filter_map(MailAddress::from_parsed).collect()
        }
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(MailAddress::from_parsed))
            .collect(),
    };
    Some(list)
}

// ── Records ─────────────────────────────────────────────────────────

/// A message as listed from the source mailbox. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    id: MessageId,
    envelope: Envelope,
    flags: Flags,
    raw: Vec<u8>,
}

impl MessageRecord {
    pub fn new(id: MessageId, flags: Flags, raw: Vec<u8>) -> Self {
        let envelope = Envelope::parse(&raw);
        Self {
            id,
            envelope,
            flags,
            raw,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// The full RFC 822 message.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(&Flag::Deleted)
    }
}

/// The destination-bound copy of a [`MessageRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMessage {
    pub(crate) source_id: MessageId,
    pub(crate) envelope: Envelope,
    pub(crate) flags: Flags,
    pub(crate) raw: Vec<u8>,
}

impl DerivedMessage {
    /// An exact copy of `source`, flags included.
    pub fn duplicate(source: &MessageRecord) -> Self {
        Self {
            source_id: source.id,
            envelope: source.envelope.clone(),
            flags: source.flags.clone(),
            raw: source.raw.clone(),
        }
    }

    /// The source message this copy was derived from.
    pub fn source_id(&self) -> MessageId {
        self.source_id
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}
