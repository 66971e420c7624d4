//! Ollama client implementing the [`Generator`] capability.
//!
//! Behaviour:
//! - `POST /api/generate` with `stream: false` and per-request sampling options.
//! - Connection failures and timeouts map to [`GeneratorError::Unavailable`].
//! - Non-success statuses and undecodable bodies map to [`GeneratorError::BadResponse`].
//! - `GET /api/version` is used as a readiness probe.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::generator::{GenerateFuture, Generator, GeneratorError};
use crate::memory::core::config::{LlmConfig, SamplingConfig};
use crate::memory::core::errors::MemoryResult;

/// Target context length (tokens).
const CONTEXT_LENGTH: u32 = 8_192;

/// Connect timeout for the local server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the readiness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    keep_alive: &'a str,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Async Ollama client for text generation.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    keep_alive: String,
}

impl OllamaGenerator {
    /// Create a client from the generation service settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> MemoryResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
        })
    }

    /// Model name sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the Ollama server answers its version endpoint.
    pub async fn is_ready(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("Ollama readiness probe failed: {err}");
                false
            }
        }
    }

    async fn post_generate(
        &self,
        prompt: &str,
        sampling: SamplingConfig,
    ) -> Result<String, GeneratorError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            keep_alive: &self.keep_alive,
            options: GenerateOptions {
                temperature: sampling.temperature,
                num_predict: sampling.max_tokens,
                num_ctx: CONTEXT_LENGTH,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| GeneratorError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::BadResponse(format!(
                "status {}",
                status.as_u16()
            )));
        }

        let body = response
            .json::<GenerateResponse>()
            .await
            .map_err(|err| GeneratorError::BadResponse(err.to_string()))?;

        Ok(body.response.unwrap_or_default().trim().to_string())
    }
}

impl Generator for OllamaGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, sampling: SamplingConfig) -> GenerateFuture<'a> {
        Box::pin(self.post_generate(prompt, sampling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn generator_for(base_url: String) -> OllamaGenerator {
        let config = LlmConfig {
            base_url,
            timeout_seconds: 5,
            ..LlmConfig::default()
        };
        OllamaGenerator::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_options_and_trims() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                let reply = format!(
                    "  {} {} {} {}\n",
                    body["model"].as_str().unwrap_or_default(),
                    body["stream"],
                    body["options"]["temperature"],
                    body["options"]["num_predict"]
                );
                Json(serde_json::json!({ "response": reply }))
            }),
        );
        let generator = generator_for(serve(router).await);

        let text = generator
            .generate("hello", SamplingConfig::new(0.2, 32))
            .await
            .unwrap();
        assert_eq!(text, "mistral:7b-instruct-q8_0 false 0.2 32");
    }

    #[tokio::test]
    async fn test_missing_response_field_is_empty() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(serde_json::json!({ "done": true })) }),
        );
        let generator = generator_for(serve(router).await);

        let text = generator
            .generate("hello", SamplingConfig::chat())
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_bad_response() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let generator = generator_for(serve(router).await);

        let result = generator.generate("hello", SamplingConfig::chat()).await;
        assert_eq!(
            result,
            Err(GeneratorError::BadResponse("status 500".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let generator = generator_for(format!("http://{addr}"));

        let result = generator.generate("hello", SamplingConfig::chat()).await;
        assert!(matches!(result, Err(GeneratorError::Unavailable(_))));
        assert!(!generator.is_ready().await);
    }

    #[tokio::test]
    async fn test_readiness_probe() {
        let router = Router::new().route(
            "/api/version",
            get(|| async { Json(serde_json::json!({ "version": "0.5.0" })) }),
        );
        let generator = generator_for(serve(router).await);
        assert!(generator.is_ready().await);
    }
}
