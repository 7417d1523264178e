//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::inference::DEFAULT_TIMEOUT_SECS;
use crate::server::DEFAULT_PORT;

/// VITChat - local chat UI backed by a Python inference script
#[derive(Parser, Debug)]
#[command(name = "vitchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Message to send (shorthand for the `ask` subcommand)
    #[arg(trailing_var_arg = true)]
    pub message: Vec<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Open browser automatically
        #[arg(long)]
        open: bool,

        /// Python interpreter to run the inference script with
        #[arg(long, default_value = "python3")]
        python: String,

        /// Path to the inference script
        #[arg(long, default_value = "model_inference.py")]
        script: PathBuf,

        /// Timeout in seconds for one inference call
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Send one message through a running server and print the reply
    Ask {
        /// Message to send
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },

    /// Interactive terminal chat session (/new resets, /quit exits)
    Chat,
}
