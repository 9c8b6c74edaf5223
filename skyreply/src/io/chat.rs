//! OpenAI-compatible chat completions backend.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::router::Persona;
use crate::io::backend::Backend;
use crate::io::config::{ChatAuth, ChatBackendConfig};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Blocking client for `POST {base_url}/chat/completions`.
pub struct ChatBackend {
    endpoint: String,
    model: String,
    temperature: f64,
    auth: ChatAuth,
    api_key: String,
    client: Client,
}

impl ChatBackend {
    /// Build from config, reading the API key from the configured variable.
    pub fn from_config(config: &ChatBackendConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env)
            .with_context(|| format!("read API key from ${}", config.api_key_env))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ChatBackendConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build chat http client")?;
        Ok(Self {
            endpoint: completions_url(&config.base_url),
            model: config.model.clone(),
            temperature: config.temperature,
            auth: config.auth,
            api_key,
            client,
        })
    }

    fn build_request<'a>(&'a self, persona: Persona, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: persona.system_message(),
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        }
    }
}

impl Backend for ChatBackend {
    #[instrument(skip_all, fields(persona = %persona, model = %self.model))]
    fn complete(&self, persona: Persona, prompt: &str) -> Result<String> {
        let request = self.build_request(persona, prompt);
        let builder = self.client.post(&self.endpoint).json(&request);
        let builder = match self.auth {
            ChatAuth::Bearer => builder.bearer_auth(&self.api_key),
            ChatAuth::ApiKey => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().context("send chat completion request")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%status, "chat completion request failed");
            return Err(anyhow!("chat completion failed with {status}: {}", body.trim()));
        }

        let parsed: ChatResponse = response.json().context("parse chat completion response")?;
        let content = first_content(parsed);
        debug!(chars = content.chars().count(), "chat completion received");
        Ok(content)
    }
}

/// Content of the first choice; absent content is an empty completion.
fn first_content(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
