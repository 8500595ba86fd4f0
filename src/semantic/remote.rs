use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{EmbeddingBatch, EmbeddingProvider, SemanticModelConfig, validate_batch};
use crate::config::EmbeddingConfig;
use crate::error::EvalError;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    #[serde(default)]
    total_tokens: u64,
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: SemanticModelConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, model: SemanticModelConfig) -> Result<Self, EvalError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                EvalError::configuration("openai embedding backend requires OPENAI_API_KEY")
            })?
            .to_string();

        let client = Client::builder()
            .user_agent(concat!("sqleval/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| EvalError::configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model.model_id
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions
    }

    fn embed(&self, labels: &[String]) -> Result<EmbeddingBatch, EvalError> {
        if labels.is_empty() {
            return Err(EvalError::invalid_input("cannot embed an empty label batch"));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model.model_id,
                input: labels,
            })
            .send()
            .map_err(|err| EvalError::provider(format!("embedding request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| EvalError::provider(format!("failed to read embedding response: {err}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(model = %self.model.model_id, "embedding quota exhausted");
            return Err(EvalError::provider(format!(
                "embedding quota or rate limit exceeded (HTTP 429): {}",
                truncate(&body, 200)
            )));
        }
        if !status.is_success() {
            return Err(EvalError::provider(format!(
                "embedding request returned HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let batch = parse_embedding_response(&body, labels, self.model.dimensions)?;
        info!(
            model = %self.model.model_id,
            labels = labels.len(),
            tokens = batch.tokens,
            "remote embedding batch"
        );
        Ok(batch)
    }
}

pub(crate) fn parse_embedding_response(
    body: &str,
    labels: &[String],
    expected_dim: usize,
) -> Result<EmbeddingBatch, EvalError> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|err| EvalError::provider(format!("malformed embedding response: {err}")))?;

    response.data.sort_by_key(|datum| datum.index);
    if response
        .data
        .iter()
        .enumerate()
        .any(|(position, datum)| datum.index != position)
    {
        return Err(EvalError::provider(
            "embedding response indices are not a contiguous 0..n range",
        ));
    }

    let batch = EmbeddingBatch {
        vectors: response
            .data
            .into_iter()
            .map(|datum| datum.embedding)
            .collect(),
        tokens: response.usage.map(|usage| usage.total_tokens).unwrap_or(0),
    };
    validate_batch(labels, &batch, expected_dim)?;
    Ok(batch)
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}
