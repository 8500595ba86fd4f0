use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::EvalError;

mod remote;

pub use remote::OpenAiEmbedder;

pub const DEFAULT_LOCAL_MODEL_ID: &str = "label-hash-local-v1";
pub const DEFAULT_LOCAL_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_OPENAI_MODEL_ID: &str = "text-embedding-3-small";

const WORD_FEATURE_WEIGHT: f32 = 1.0;
const TRIGRAM_FEATURE_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub dimensions: usize,
    pub backend: String,
}

pub fn resolve_model_config(config: &EmbeddingConfig) -> SemanticModelConfig {
    let trimmed = config.model_id.trim();
    let model_id = match (trimmed.is_empty(), config.backend) {
        (false, _) => trimmed.to_string(),
        (true, EmbeddingBackend::Local) => DEFAULT_LOCAL_MODEL_ID.to_string(),
        (true, EmbeddingBackend::OpenAi) => DEFAULT_OPENAI_MODEL_ID.to_string(),
    };

    let known_dimensions = match config.backend {
        EmbeddingBackend::Local => DEFAULT_LOCAL_EMBEDDING_DIM,
        EmbeddingBackend::OpenAi => openai_model_dimensions(&model_id),
    };

    SemanticModelConfig {
        model_id,
        dimensions: config.dimensions.unwrap_or(known_dimensions),
        backend: config.backend.as_str().to_string(),
    }
}

fn openai_model_dimensions(model_id: &str) -> usize {
    match model_id {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub tokens: u64,
}

pub trait EmbeddingProvider {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, labels: &[String]) -> Result<EmbeddingBatch, EvalError>;
}

pub fn build_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, EvalError> {
    let model = resolve_model_config(config);
    if model.dimensions == 0 {
        return Err(EvalError::configuration("embedding dimensions must be positive"));
    }

    match config.backend {
        EmbeddingBackend::Local => Ok(Box::new(LocalHashEmbedder::new(model))),
        EmbeddingBackend::OpenAi => Ok(Box::new(OpenAiEmbedder::new(config, model)?)),
    }
}

pub fn validate_batch(
    labels: &[String],
    batch: &EmbeddingBatch,
    expected_dim: usize,
) -> Result<(), EvalError> {
    if batch.vectors.len() != labels.len() {
        return Err(EvalError::provider(format!(
            "expected {} embeddings, received {}",
            labels.len(),
            batch.vectors.len()
        )));
    }

    if let Some((index, vector)) = batch
        .vectors
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != expected_dim)
    {
        return Err(EvalError::provider(format!(
            "embedding {index} has dimension {}, expected {expected_dim}",
            vector.len()
        )));
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    model: SemanticModelConfig,
}

impl LocalHashEmbedder {
    pub fn new(model: SemanticModelConfig) -> Self {
        Self { model }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self::new(SemanticModelConfig {
            model_id: DEFAULT_LOCAL_MODEL_ID.to_string(),
            dimensions,
            backend: EmbeddingBackend::Local.as_str().to_string(),
        })
    }
}

impl Default for LocalHashEmbedder {
    fn default() -> Self {
        Self::with_dimensions(DEFAULT_LOCAL_EMBEDDING_DIM)
    }
}

impl EmbeddingProvider for LocalHashEmbedder {
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

        let vectors = labels
            .iter()
            .map(|label| embed_label_local(label, self.model.dimensions))
            .collect::<Vec<Vec<f32>>>();
        let tokens = labels
            .iter()
            .map(|label| label_words(label).len() as u64)
            .sum::<u64>();

        let batch = EmbeddingBatch { vectors, tokens };
        validate_batch(labels, &batch, self.model.dimensions)?;
        debug!(model = %self.model.model_id, labels = labels.len(), tokens, "local embedding batch");
        Ok(batch)
    }
}

pub fn embed_label_local(label: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0_f32; dimensions];
    if dimensions == 0 {
        return vector;
    }

    for (feature, feature_weight) in label_features(label) {
        let hash = stable_hash(&feature);
        let index = (hash % dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = feature_weight * (1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0));
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (left_value, right_value) in left.iter().zip(right.iter()) {
        let l = f64::from(*left_value);
        let r = f64::from(*right_value);
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }

    if left_norm <= 0.0 || right_norm <= 0.0 {
        return 0.0;
    }

    let similarity = dot / (left_norm * right_norm).sqrt();
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn label_words(label: &str) -> Vec<String> {
    label
        .to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn label_features(label: &str) -> Vec<(String, f32)> {
    let words = label_words(label);
    let mut features = Vec::<(String, f32)>::with_capacity(words.len() * 6);

    for word in &words {
        features.push((format!("w:{word}"), WORD_FEATURE_WEIGHT));

        let padded = format!("#{word}#").chars().collect::<Vec<char>>();
        for window in padded.windows(3) {
            features.push((
                format!("c:{}", window.iter().collect::<String>()),
                TRIGRAM_FEATURE_WEIGHT,
            ));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}
