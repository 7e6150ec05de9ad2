//! IMAP-backed mailbox.

pub mod transport;

use std::borrow::Cow;

use imap::types::{Fetch, Flag as ImapFlag};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::error::MailboxError;
use crate::mailbox::MailboxPort;
use crate::message::{DerivedMessage, Flag, Flags, MessageId, MessageRecord};

pub use transport::Transport;

type Session = imap::Session<Transport>;

/// One folder on an IMAP server, reached through a single session.
pub struct ImapMailbox {
    config: EndpointConfig,
    session: Option<Session>,
    exists: u32,
}

impl ImapMailbox {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            session: None,
            exists: 0,
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn session(&mut self) -> Result<&mut Session, MailboxError> {
        let name = self.config.to_string();
        self.session.as_mut().ok_or(MailboxError::NotOpen(name))
    }
}

impl MailboxPort for ImapMailbox {
    fn open_read_write(&mut self) -> Result<(), MailboxError> {
        if self.session.is_some() {
            return Ok(());
        }
        let cfg = &self.config;
        info!("Connecting to {cfg}");

        let transport = Transport::connect(&cfg.host, cfg.port, cfg.secure, cfg.debug)?;
        let mut client = imap::Client::new(transport);
        client.read_greeting()?;

        let mut session = client
            .login(&cfg.username, cfg.password.expose_secret())
            .map_err(|(e, _)| rejected("LOGIN", e))?;
        let selected = session
            .select(encode_folder(&cfg.mailbox))
            .map_err(|e| rejected("SELECT", e))?;
        self.exists = selected.exists;
        debug!("{} holds {} message(s)", cfg.mailbox, self.exists);

        self.session = Some(session);
        Ok(())
    }

    fn list_messages(&mut self) -> Result<Vec<MessageRecord>, MailboxError> {
        if self.session.is_some() && self.exists == 0 {
            return Ok(Vec::new());
        }
        let fetches = self
            .session()?
            .uid_fetch("1:*", "(UID FLAGS BODY.PEEK[])")
            .map_err(|e| rejected("UID FETCH", e))?;

        let mut records = Vec::with_capacity(fetches.len());
        for fetch in fetches.iter() {
            if let Some(record) = to_record(fetch)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Messages go in one `APPEND` each, so a failure part way through
    /// leaves the earlier ones in the destination.
    fn append_messages(&mut self, batch: &[DerivedMessage]) -> Result<(), MailboxError> {
        let folder = encode_folder(&self.config.mailbox);
        let session = self.session()?;

        for (i, message) in batch.iter().enumerate() {
            session
                .append_with_flags(&folder, message.raw(), &imap_flags(message.flags()))
                .map_err(|e| {
                    if i > 0 {
                        warn!("{i} message(s) were already appended before the failure");
                    }
                    rejected("APPEND", e)
                })?;
        }
        Ok(())
    }

    fn set_deleted(&mut self, id: MessageId) -> Result<(), MailboxError> {
        self.session()?
            .uid_store(id.0.to_string(), "+FLAGS.SILENT (\\Deleted)")
            .map(|_| ())
            .map_err(|e| rejected("UID STORE", e))
    }

    fn expunge(&mut self) -> Result<(), MailboxError> {
        self.session()?
            .expunge()
            .map(|_| ())
            .map_err(|e| rejected("EXPUNGE", e))
    }

    fn close(&mut self) -> Result<(), MailboxError> {
        match self.session.take() {
            Some(mut session) => session.logout().map_err(|e| rejected("LOGOUT", e)),
            None => Ok(()),
        }
    }
}

/// `NO` and `BAD` completions name the command; anything else passes through.
fn rejected(command: &str, error: imap::Error) -> MailboxError {
    match error {
        imap::Error::No(response) | imap::Error::Bad(response) => MailboxError::Rejected {
            command: command.to_string(),
            response,
        },
        other => MailboxError::Imap(other),
    }
}

/// A fetched message, or `None` for a `FETCH` without a body such as an
/// unsolicited flag update.
fn to_record(fetch: &Fetch) -> Result<Option<MessageRecord>, MailboxError> {
    let Some(body) = fetch.body() else {
        debug!("Ignoring FETCH of message {} without a body", fetch.message);
        return Ok(None);
    };
    let uid = fetch.uid.ok_or_else(|| {
        MailboxError::Protocol(format!("FETCH of message {} returned no UID", fetch.message))
    })?;
    let flags: Flags = fetch
        .flags()
        .iter()
        .map(|f| Flag::parse(&f.to_string()))
        .collect();
    Ok(Some(MessageRecord::new(MessageId(uid), flags, body.to_vec())))
}

/// Flags for `APPEND`. `\Recent` is left out since clients may not set it.
fn imap_flags(flags: &Flags) -> Vec<ImapFlag<'static>> {
    flags
        .iter()
        .filter_map(|flag| {
            Some(match flag {
                Flag::Seen => ImapFlag::Seen,
                Flag::Answered => ImapFlag::Answered,
                Flag::Flagged => ImapFlag::Flagged,
                Flag::Deleted => ImapFlag::Deleted,
                Flag::Draft => ImapFlag::Draft,
                Flag::Recent => return None,
                Flag::Keyword(kw) => ImapFlag::Custom(Cow::Owned(kw.clone())),
            })
        })
        .collect()
}

/// Folder names go over the wire in modified UTF-7.
fn encode_folder(folder: &str) -> String {
    utf7_imap::encode_utf7_imap(folder.to_string())
}
