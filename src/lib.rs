//! imapmove: move every message from one IMAP folder to another.

pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod imap;
pub mod mailbox;
pub mod message;
pub mod mover;
pub mod rewrite;
