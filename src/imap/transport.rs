//! Byte stream under the IMAP client: plain TCP or TLS (rustls), with an
//! optional protocol trace.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::MailboxError;

/// Socket read timeout; a silent server fails the step instead of hanging.
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest line shown in a protocol trace.
const TRACE_WIDTH: usize = 200;

enum Stream {
    Plain(TcpStream),
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
}

/// Connection to an IMAP server.
pub struct Transport {
    stream: Stream,
    trace: bool,
}

impl Transport {
    /// Open a TCP connection, wrapped in TLS when `secure`. With `trace`,
    /// every line sent and received is logged at debug level, `LOGIN`
    /// arguments redacted.
    pub fn connect(host: &str, port: u16, secure: bool, trace: bool) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((host, port))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let stream = if secure {
            Stream::Tls(Box::new(tls_stream(host, tcp)?))
        } else {
            Stream::Plain(tcp)
        };
        Ok(Self { stream, trace })
    }

    fn log(&self, direction: &str, data: &[u8]) {
        if !self.trace {
            return;
        }
        for line in String::from_utf8_lossy(data).lines() {
            let line = redact(line);
            match line.char_indices().nth(TRACE_WIDTH) {
                Some((cut, _)) => debug!("{direction}: {}...", &line[..cut]),
                None => debug!("{direction}: {line}"),
            }
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.stream {
            Stream::Plain(s) => s.read(buf)?,
            Stream::Tls(s) => s.read(buf)?,
        };
        self.log("S", &buf[..n]);
        Ok(n)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.stream {
            Stream::Plain(s) => s.write(buf)?,
            Stream::Tls(s) => s.write(buf)?,
        };
        self.log("C", &buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

fn tls_stream(
    host: &str,
    tcp: TcpStream,
) -> Result<rustls::StreamOwned<rustls::ClientConnection, TcpStream>, MailboxError> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| MailboxError::InvalidServerName(format!("{host}: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// Hide `LOGIN` credentials from protocol traces.
fn redact(line: &str) -> String {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next()) {
        (Some(tag), Some(cmd)) if cmd.eq_ignore_ascii_case("LOGIN") => format!("{tag} LOGIN <redacted>"),
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redacted() {
        assert_eq!(redact("a1 LOGIN \"u\" \"secret\""), "a1 LOGIN <redacted>");
        assert_eq!(redact("a2 SELECT \"INBOX\""), "a2 SELECT \"INBOX\"");
    }

    #[test]
    fn unreachable_server_is_io_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(matches!(
            Transport::connect("127.0.0.1", port, false, false),
            Err(MailboxError::Io(_))
        ));
    }
}
