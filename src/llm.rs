//! Text generation transport.
//!
//! The engine, estimator and validator only see [`TextGenerator`]; [`AnthropicClient`]
//! implements it over the Anthropic Messages API.

use crate::error::{PieError, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default Anthropic model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Environment variable holding the API key
pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";
/// Environment variable overriding the model
pub const MODEL_ENV_VAR: &str = "ANTHROPIC_MODEL";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single-turn text completion service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Anthropic Claude API client
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl AnthropicClient {
    /// Creates a client for `model`, or for `ANTHROPIC_MODEL` / the default when `None`.
    pub fn new(api_key: String, model: Option<&str>) -> Self {
        let model = match model {
            Some(model) => model.to_string(),
            None => std::env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };
        Self {
            api_key,
            client: reqwest::Client::new(),
            model,
        }
    }

    async fn call_api(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<String> {
        let mut body = serde_json::json!({
            "model": &self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": user}]
        });
        if let Some(system) = system {
            body["system"] = serde_json::Value::from(system);
        }

        debug!("Requesting completion from {} (max_tokens={})", self.model, max_tokens);
        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PieError::Transport(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| PieError::Transport("Empty response from Anthropic".to_string()))
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn complete(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<String> {
        self.call_api(system, user, max_tokens).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Finds the API key: key file first, then the explicit value, then `env_var`.
///
/// Values are trimmed and empty values are skipped. A key file that cannot be read is an
/// error.
pub fn resolve_api_key(
    key_file: Option<&Path>,
    explicit: Option<&str>,
    env_var: &str,
) -> Result<Option<String>> {
    let from_file = match key_file {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    let from_env = std::env::var(env_var).ok();

    Ok([from_file.as_deref(), explicit, from_env.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(Option<&str>, &str) -> Result<String> + Send + Sync>;

    /// Generator answering from a closure and recording every request.
    pub(crate) struct FnGenerator {
        responder: Responder,
        pub(crate) calls: Mutex<Vec<(Option<String>, String, u32)>>,
    }

    impl FnGenerator {
        pub(crate) fn new(
            responder: impl Fn(Option<&str>, &str) -> Result<String> + Send + Sync + 'static,
        ) -> Self {
            FnGenerator {
                responder: Box::new(responder),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Always answers with `text`.
        pub(crate) fn fixed(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_, _| Ok(text.clone()))
        }

        /// Always fails with a transport error.
        pub(crate) fn failing(message: &str) -> Self {
            let message = message.to_string();
            Self::new(move |_, _| Err(PieError::Transport(message.clone())))
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for FnGenerator {
        async fn complete(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<String> {
            self.calls.lock().unwrap().push((
                system.map(str::to_string),
                user.to_string(),
                max_tokens,
            ));
            (self.responder)(system, user)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
