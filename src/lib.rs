//! Hearth -- Local-Model Chat Host
//!
//! Hosts a conversation with a locally-run language model and lets the
//! model invoke registered tools mid-conversation through a marker-based
//! streaming protocol.

pub mod types;
pub mod config;
pub mod engine;
pub mod protocol;
pub mod chat;
pub mod tools;
