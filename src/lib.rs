//! veo-studio library crate.
//!
//! Exposes the generation client, the session context and configuration
//! for the binary and for integration testing.

pub mod config;
pub mod session;
pub mod veo;
