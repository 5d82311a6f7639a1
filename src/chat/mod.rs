//! Chat Host
//!
//! Everything a caller needs to run a conversation: the prompt
//! compiler, the observable conversation sink, and the host that drives
//! one turn at a time from user input to tool results.

pub mod conversation;
pub mod host;
pub mod prompt;
