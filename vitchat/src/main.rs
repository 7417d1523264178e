//! VITChat - a minimal local chat app over a Python inference script.
//!
//! Architecture:
//! - `serve` runs a small axum server: GET / is an embedded single-page chat
//!   UI, POST /api/chat relays the message to the inference script
//! - The relay makes one bounded subprocess call per request and masks any
//!   inference failure with a canned fallback reply
//! - `ask` and `chat` are thin HTTP clients for the same endpoint

mod cli;
mod inference;
mod models;
mod process;
mod server;

use anyhow::Result;
use clap::Parser;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli).await
}
