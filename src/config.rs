//! Configuration types.
//!
//! An endpoint comes either from an IMAP URL
//! (`imap[s]://user[:password]@host[:port][/folder]`) or from a Java-style
//! properties file holding `source.*` and `destination.*` keys.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;
use url::Url;

use crate::error::ConfigError;
use crate::identity::AddressIdentity;
use crate::mover::MoveOptions;

pub const DEFAULT_MAILBOX: &str = "INBOX";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_IMAP_PORT: u16 = 143;
pub const DEFAULT_IMAPS_PORT: u16 = 993;

pub const SOURCE_PREFIX: &str = "source.";
pub const DESTINATION_PREFIX: &str = "destination.";
pub const SUBJECT_PREFIX_KEY: &str = "subject.prefix";

// ── Endpoint ────────────────────────────────────────────────────────

/// Everything needed to reach one mailbox folder.
#[derive(Debug)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (`imaps`).
    pub secure: bool,
    pub username: String,
    pub password: SecretString,
    /// Folder to open.
    pub mailbox: String,
    /// Explicit identity address, overriding the derived one.
    pub email: Option<String>,
    /// Log every protocol line (credentials redacted).
    pub debug: bool,
}

impl EndpointConfig {
    pub fn default_port(secure: bool) -> u16 {
        if secure {
            DEFAULT_IMAPS_PORT
        } else {
            DEFAULT_IMAP_PORT
        }
    }

    /// Parse an `imap://` or `imaps://` URL. User and password are
    /// percent-decoded, so `user%40example.com` logs in as
    /// `user@example.com`.
    pub fn from_url(input: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: redact_userinfo(input),
            reason,
        };
        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;

        let secure = match url.scheme() {
            "imap" => false,
            "imaps" => true,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let username = decode(url.username()).map_err(&invalid)?;
        if username.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "username".into(),
                hint: format!("Add the login to the URL, e.g. {}://user@host", url.scheme()),
            });
        }
        let password = url
            .password()
            .map(decode)
            .transpose()
            .map_err(&invalid)?
            .unwrap_or_default();

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string();
        let port = url
            .port()
            .filter(|p| *p != 0)
            .unwrap_or_else(|| Self::default_port(secure));

        let mailbox = decode(url.path().trim_start_matches('/')).map_err(&invalid)?;
        let mailbox = if mailbox.is_empty() {
            DEFAULT_MAILBOX.to_string()
        } else {
            mailbox
        };

        Ok(Self {
            host,
            port,
            secure,
            username,
            password: SecretString::from(password),
            mailbox,
            email: None,
            debug: false,
        })
    }

    /// Read `<prefix>host`, `port`, `secure`, `username`, `password`,
    /// `email`, `mailbox` and `debug`.
    pub fn from_properties(props: &Properties, prefix: &str) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{prefix}{name}");

        let secure = props.get_bool(&key("secure"));
        let port = match props.get(&key("port")).map(str::trim) {
            None | Some("") => 0,
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: key("port"),
                message: format!("{value:?}: {e}"),
            })?,
        };
        let port = if port == 0 {
            Self::default_port(secure)
        } else {
            port
        };

        let username = props
            .get(&key("username"))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: key("username"),
                hint: "Set the IMAP login name".into(),
            })?
            .to_string();

        Ok(Self {
            host: props
                .get(&key("host"))
                .filter(|h| !h.is_empty())
                .unwrap_or(DEFAULT_HOST)
                .to_string(),
            port,
            secure,
            username,
            password: SecretString::from(props.get(&key("password")).unwrap_or_default().to_string()),
            mailbox: props
                .get(&key("mailbox"))
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MAILBOX)
                .to_string(),
            email: props.get(&key("email")).map(str::to_string),
            debug: props.get_bool(&key("debug")),
        })
    }

    /// The address this endpoint treats as its own.
    pub fn identity(&self) -> AddressIdentity {
        AddressIdentity::new(self.email.as_deref(), &self.username, &self.host)
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "imaps" } else { "imap" };
        write!(
            f,
            "{scheme}://{}@{}:{}/{}",
            self.username, self.host, self.port, self.mailbox
        )
    }
}

fn decode(s: &str) -> Result<String, String> {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .map_err(|e| e.to_string())
}

/// Drop credentials from a URL before it ends up in an error message.
fn redact_userinfo(input: &str) -> String {
    if let Some(start) = input.find("://") {
        let rest = &input[start + 3..];
        let authority_end = rest.find('/').unwrap_or(rest.len());
        if let Some(at) = rest[..authority_end].rfind('@') {
            return format!("{}://***@{}", &input[..start], &rest[at + 1..]);
        }
    }
    input.to_string()
}

// ── Move ────────────────────────────────────────────────────────────

/// A complete move: both endpoints plus run settings.
#[derive(Debug)]
pub struct MoveConfig {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub subject_prefix: String,
    pub expunge: bool,
}

impl MoveConfig {
    pub fn from_urls(
        source: &str,
        destination: &str,
        subject_prefix: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            source: EndpointConfig::from_url(source)?,
            destination: EndpointConfig::from_url(destination)?,
            subject_prefix: subject_prefix.to_string(),
            expunge: true,
        })
    }

    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        Ok(Self {
            source: EndpointConfig::from_properties(props, SOURCE_PREFIX)?,
            destination: EndpointConfig::from_properties(props, DESTINATION_PREFIX)?,
            subject_prefix: props.get(SUBJECT_PREFIX_KEY).unwrap_or_default().to_string(),
            expunge: true,
        })
    }

    /// Load a properties file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_properties(&Properties::load(path)?)
    }

    pub fn move_options(&self) -> MoveOptions {
        MoveOptions {
            subject_prefix: self.subject_prefix.clone(),
            expunge: self.expunge,
            ..MoveOptions::default()
        }
    }
}

// ── Properties ──────────────────────────────────────────────────────

/// Key/value pairs in `java.util.Properties` text format.
///
/// Supports `=`, `:` and whitespace separators, `#`/`!` comments, backslash
/// line continuation and the `\t \n \r \f \uXXXX` escapes.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn parse(text: &str) -> Self {
        let entries = logical_lines(text)
            .iter()
            .map(|line| split_entry(line))
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// `true` only for a case-insensitive `true`; anything else, including
    /// a missing key, is `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join continued lines and drop comments and blanks.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for physical in text.lines() {
        let trimmed = physical.trim_start();
        if !continuing && (trimmed.is_empty() || trimmed.starts_with(['#', '!'])) {
            continue;
        }
        current.push_str(trimmed);

        let trailing = current.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            current.pop();
            continuing = true;
        } else {
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }
    if continuing {
        lines.push(current);
    }
    lines
}

fn split_entry(line: &str) -> (String, String) {
    const BLANK: [char; 3] = [' ', '\t', '\x0c'];

    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let rest = line[key_end..].trim_start_matches(BLANK);
    let rest = rest
        .strip_prefix(['=', ':'])
        .unwrap_or(rest)
        .trim_start_matches(BLANK);
    (unescape(&line[..key_end]), unescape(rest))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
