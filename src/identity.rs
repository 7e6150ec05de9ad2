//! The address a mailbox endpoint recognises as its own.

use std::fmt;

/// An endpoint's own email address.
///
/// Comparison is an exact, case-sensitive match on the bare address. Display
/// names never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressIdentity {
    address: String,
}

impl AddressIdentity {
    /// Build the identity for an endpoint.
    ///
    /// - explicit address → used verbatim
    /// - username already containing `@` → the username
    /// - otherwise → `username@host`
    pub fn new(explicit: Option<&str>, username: &str, host: &str) -> Self {
        let address = match explicit {
            Some(addr) => addr.to_string(),
            None if username.contains('@') => username.to_string(),
            None => format!("{username}@{host}"),
        };
        Self { address }
    }

    /// Wrap an address that is already known to be the identity.
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a bare address belongs to this identity.
    pub fn matches(&self, address: &str) -> bool {
        self.address == address
    }
}

impl fmt::Display for AddressIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
