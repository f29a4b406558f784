//! CLI module for GeminiBuddy
//!
//! Handles command-line argument parsing, configuration management, and
//! interrupt handling for a running prompt.

pub mod config;
pub mod args;
pub mod interrupt;

pub use config::Config;
pub use args::{Args, Commands, Verbosity};
pub use interrupt::{watch_interrupts, Interrupt};
