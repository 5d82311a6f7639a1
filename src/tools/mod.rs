//! Tool System
//!
//! The registry the dispatcher resolves against, plus the built-in
//! tools shipped with the host.

pub mod builtin;
pub mod registry;
