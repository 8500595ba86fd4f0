use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RunRecordFields;
use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub reference: String,
    pub candidate: String,
    pub score: f64,
    pub threshold: f64,
    pub passed: bool,
}

/// `Default` is the zeroed sentinel used when the generated query fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEvaluation {
    pub threshold: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub benchmark_labels: Vec<String>,
    pub candidate_labels: Vec<String>,
    pub matches: Vec<MatchRecord>,
    pub unmatched_benchmark: Vec<String>,
    pub unmatched_candidate: Vec<String>,
    /// Set when this comparison could not run (an empty label list); the
    /// counts are then zero and the rest of the result still stands.
    pub error: Option<String>,
}

impl LabelEvaluation {
    pub fn rejected(
        threshold: f64,
        benchmark_labels: Vec<String>,
        candidate_labels: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            threshold,
            benchmark_labels,
            candidate_labels,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: String,
    pub query_text: String,
    pub telemetry: Map<String, Value>,
}

impl RunRecord {
    pub fn load(path: &Path, fields: &RunRecordFields) -> Result<Self, EvalError> {
        let raw = fs::read(path).map_err(|err| EvalError::run_record(path, err.to_string()))?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|err| EvalError::run_record(path, format!("invalid json: {err}")))?;
        Self::from_value(value, fields).map_err(|err| match err {
            EvalError::InvalidInput { message } => EvalError::run_record(path, message),
            other => other,
        })
    }

    pub fn from_value(value: Value, fields: &RunRecordFields) -> Result<Self, EvalError> {
        let Value::Object(mut telemetry) = value else {
            return Err(EvalError::invalid_input("run record must be a json object"));
        };

        let id = match telemetry.get(&fields.id_field) {
            Some(Value::String(id)) => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            Some(_) => {
                return Err(EvalError::invalid_input(format!(
                    "run record field `{}` must be a string",
                    fields.id_field
                )));
            }
            None => {
                return Err(EvalError::invalid_input(format!(
                    "run record is missing identifier field `{}`",
                    fields.id_field
                )));
            }
        };
        validate_run_id(&id)?;

        let query_text = match telemetry.remove(&fields.query_field) {
            Some(Value::String(query)) => query,
            Some(Value::Null) | None => String::new(),
            Some(_) => {
                return Err(EvalError::invalid_input(format!(
                    "run record field `{}` must be a string",
                    fields.query_field
                )));
            }
        };

        Ok(Self {
            id,
            query_text,
            telemetry,
        })
    }
}

pub fn validate_run_id(id: &str) -> Result<(), EvalError> {
    if id.is_empty() {
        return Err(EvalError::invalid_input("run identifier is empty"));
    }
    if id.contains(['/', '\\']) || id.contains("..") || id.chars().any(char::is_control) {
        return Err(EvalError::invalid_input(format!(
            "run identifier `{id}` is not a valid file name component"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub run_id: String,
    pub evaluated_at: String,
    pub execution_ok: bool,
    pub execution_error: Option<String>,
    pub coverage: f64,
    pub embedding_model: String,
    pub embedding_tokens: u64,
    pub reference_rows: usize,
    pub candidate_rows: usize,
    pub columns: LabelEvaluation,
    pub events: LabelEvaluation,
    pub run_telemetry: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub source_path: String,
    pub run_id: Option<String>,
    pub status: String,
    pub result_path: Option<String>,
    pub coverage: Option<f64>,
    pub columns_f1: Option<f64>,
    pub events_f1: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub run_records: usize,
    pub evaluated: usize,
    pub execution_failed: usize,
    pub errored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub batch_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub reference_query: String,
    pub reference_rows: usize,
    pub embedding_model: String,
    pub column_threshold: f64,
    pub event_threshold: f64,
    pub results_dir: String,
    pub counts: BatchCounts,
    pub runs: Vec<RunOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricMeans {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub run_count: usize,
    pub executed: usize,
    pub execution_rate: f64,
    pub mean_coverage: f64,
    pub columns: MetricMeans,
    pub events: MetricMeans,
}
