//! CLI command execution.
//!
//! Everything except `serve` is a thin client - messages go through a
//! running server over HTTP, the same relay endpoint the browser UI uses.

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::inference::InferenceConfig;
use crate::models::{ChatSession, MessageRole};
use crate::server;

use super::args::{Cli, Commands};

/// Join the trailing words of a message argument back into one string.
fn join_message(words: &[String]) -> String {
    words.join(" ").trim().to_string()
}

/// Successful reply from the relay endpoint.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

/// Error body from the relay endpoint.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Send one message to the relay endpoint of a running server.
async fn send_to_server(port: u16, message: &str) -> Result<String> {
    let url = format!("http://127.0.0.1:{port}/api/chat");
    let body = serde_json::json!({ "message": message });

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .context("Failed to reach the chat server")?;

    if !resp.status().is_success() {
        let status = resp.status();
        if let Ok(err) = resp.json::<ErrorResponse>().await {
            bail!("Server returned {status}: {}", err.error);
        }
        bail!("Server returned {status}");
    }

    let reply: ChatResponse = resp.json().await.context("Failed to parse reply")?;
    Ok(reply.response)
}

/// One-shot ask: relay a single message and print the reply.
async fn ask(message: &str) -> Result<()> {
    if message.is_empty() {
        bail!("No message provided. Try: vitchat ask <message>");
    }

    let port = server::ensure_server_running()?;
    let reply = send_to_server(port, message).await?;
    println!("{reply}");
    Ok(())
}

/// Interactive terminal chat keeping a local in-memory session.
async fn chat_repl() -> Result<()> {
    let port = server::ensure_server_running()?;
    let mut session = ChatSession::new();

    println!("VITChat - type a message, /new to reset, /quit to exit");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                let dropped = session.len();
                session.clear();
                println!("(new chat, {dropped} messages dropped)");
                continue;
            }
            _ => {}
        }

        session.push_user(input);
        match send_to_server(port, input).await {
            Ok(reply) => {
                let message = session.push_assistant(reply);
                println!("{}: {}", MessageRole::Assistant, message.content);
            }
            Err(err) => {
                // Mirror the browser UI: a failed request becomes an
                // apology message in the session, not a crash.
                eprintln!("[vitchat] {err}");
                let message =
                    session.push_assistant("Sorry, I encountered an error. Please try again.");
                println!("{}: {}", MessageRole::Assistant, message.content);
            }
        }
    }

    Ok(())
}

/// Execute the parsed CLI.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve {
            port,
            open,
            python,
            script,
            timeout,
        }) => {
            let inference = InferenceConfig {
                python,
                script,
                timeout: Duration::from_secs(timeout),
            };
            server::start_server(port, open, inference).await
        }
        Some(Commands::Ask { message }) => ask(&join_message(&message)).await,
        Some(Commands::Chat) => chat_repl().await,
        None => {
            let message = join_message(&cli.message);
            if message.is_empty() {
                bail!("No command given. Try: vitchat serve, vitchat chat, or vitchat <message>");
            }
            ask(&message).await
        }
    }
}
