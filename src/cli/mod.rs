//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command};
pub use commands::{
    handle_config_action, handle_key_action, list_models, run_generate, show_status,
    GenerateOptions,
};
