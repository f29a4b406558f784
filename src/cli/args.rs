//! Command-line argument parsing for GeminiBuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::cli::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GeminiBuddy - Gemini chat agent with sandboxed file tools
#[derive(Parser, Debug)]
#[command(name = "geminibuddy")]
#[command(version)]
#[command(about = "Chat with Gemini models that can read and write files in a sandbox", long_about = None)]
pub struct Args {
    /// Message to send
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Chat to continue (a new chat is started when omitted)
    #[arg(long, value_name = "CHAT_ID")]
    pub chat: Option<String>,

    /// Gemini model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sandbox root directory for file tools
    #[arg(long, value_name = "DIR")]
    pub sandbox: Option<PathBuf>,

    /// Maximum tool rounds per message
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Print a chat transcript
    History {
        /// Chat id
        chat: String,
    },

    /// List stored chats
    Chats,

    /// Delete a stored chat
    Delete {
        /// Chat id
        chat: String,
    },

    /// Give a chat a new title
    Rename {
        /// Chat id
        chat: String,

        /// New title (empty resets to "Untitled Chat")
        title: String,
    },

    /// Print the tool schemas advertised to the model
    Tools,

    /// List valid Gemini models
    Models,

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Check that a prompt or a subcommand was given, not both
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_none() && self.prompt.is_none() {
            return Err("Prompt required. Use 'geminibuddy <PROMPT>' or run a subcommand.".to_string());
        }

        if self.command.is_some() && self.prompt.is_some() {
            return Err("Cannot specify a prompt with a subcommand.".to_string());
        }

        Ok(())
    }

    /// Override config values with flags that were given
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model.default_model = model.clone();
        }
        if let Some(sandbox) = &self.sandbox {
            config.tools.sandbox_root = sandbox.to_string_lossy().into_owned();
        }
        if let Some(max_iterations) = self.max_iterations {
            config.agent.max_iterations = max_iterations;
        }
    }
}

impl Verbosity {
    /// Default log filter for this level
    pub fn log_level(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }

    /// Check if should print the run summary
    pub fn show_summary(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
