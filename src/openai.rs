//! OpenAI client construction.
//!
//! Embedding and generation calls are the only operations that block for
//! non-trivial wall-clock time, so every client carries an explicit request
//! timeout supplied by the caller's settings.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client whose requests abort after `timeout`.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Create an OpenAI client with the default 5-minute timeout.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(300))
}
