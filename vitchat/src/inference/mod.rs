//! Relay core: run the external inference script and parse its reply.
//!
//! The model lives in a separately maintained Python script. The contract is
//! narrow: the script is invoked with the user message as its sole argument
//! and must print one line of JSON `{"response": "..."}` to stdout before
//! exiting zero. Anything else (non-zero exit, timeout, unparseable output)
//! is an inference failure, which callers mask with [`fallback_reply`].

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::process::{spawn_process, ProcessOptions};

/// Default timeout for one inference call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for invoking the inference script.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Python interpreter to run the script with.
    pub python: String,
    /// Path to the inference script.
    pub script: PathBuf,
    /// Hard bound on one inference call.
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            script: PathBuf::from("model_inference.py"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Ways an inference call can fail. None of these reach the end user; the
/// relay swallows them and answers with [`fallback_reply`] instead.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to spawn inference process: {0}")]
    Spawn(String),
    #[error("inference process timed out after {0:?}")]
    Timeout(Duration),
    #[error("inference process exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("inference output was not valid JSON: {0}")]
    BadOutput(String),
    #[error("inference output had no response text")]
    EmptyResponse,
}

/// The single line of JSON the script prints on success.
#[derive(Debug, Deserialize)]
struct InferenceReply {
    response: String,
}

/// Run one inference call and return the model's reply text.
pub async fn run_inference(
    config: &InferenceConfig,
    message: &str,
) -> Result<String, InferenceError> {
    let options = ProcessOptions::new(&config.python)
        .arg(config.script.to_string_lossy())
        .arg(message)
        .timeout(config.timeout);

    let result = spawn_process(options)
        .await
        .map_err(|e| InferenceError::Spawn(e.to_string()))?;

    if result.timed_out {
        return Err(InferenceError::Timeout(config.timeout));
    }

    if !result.success() {
        return Err(InferenceError::Failed {
            code: result.code(),
            stderr: result.stderr_string(),
        });
    }

    // The script may emit warnings on stderr; only stdout carries the reply.
    let stdout = result.stdout_string();
    let reply: InferenceReply = serde_json::from_str(stdout.trim())
        .map_err(|_| InferenceError::BadOutput(stdout.trim().to_string()))?;

    if reply.response.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }

    Ok(reply.response)
}

/// Canned reply used whenever inference fails.
///
/// Keyed on a trivial substring check of the original input: questions that
/// mention VIT still get a useful factual sentence, everything else gets a
/// generic apology.
pub fn fallback_reply(message: &str) -> String {
    let mut reply = String::from("I'm having trouble accessing my model right now. ");

    if message.to_lowercase().contains("vit") {
        reply.push_str(
            "However, I can tell you that VIT (Vellore Institute of Technology) is located in \
             Vellore, Tamil Nadu, India, with additional campuses in Chennai, Bhopal, and Amravati.",
        );
    } else {
        reply.push_str("Please try again in a moment.");
    }

    reply
}
