use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

pub const DEFAULT_STRUCTURAL_THRESHOLD: f64 = 0.4;
pub const DEFAULT_CROSS_RUN_THRESHOLD: f64 = 0.9;
pub const DEFAULT_EVENT_COLUMN: &str = "activity";
pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_QUERY_FIELD: &str = "sql_script_enhanced";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecordFields {
    pub id_field: String,
    pub query_field: String,
}

impl Default for RunRecordFields {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            query_field: DEFAULT_QUERY_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub column_threshold: f64,
    pub event_threshold: f64,
    pub event_column: String,
    pub results_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub run_record_fields: RunRecordFields,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            column_threshold: DEFAULT_STRUCTURAL_THRESHOLD,
            event_threshold: DEFAULT_STRUCTURAL_THRESHOLD,
            event_column: DEFAULT_EVENT_COLUMN.to_string(),
            results_dir: PathBuf::from("results/json"),
            artifacts_dir: PathBuf::from("results/tables"),
            run_record_fields: RunRecordFields::default(),
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        validate_threshold("column_threshold", self.column_threshold)
            .map_err(|err| EvalError::configuration(err.to_string()))?;
        validate_threshold("event_threshold", self.event_threshold)
            .map_err(|err| EvalError::configuration(err.to_string()))?;

        if self.event_column.trim().is_empty() {
            return Err(EvalError::configuration("event column name is empty"));
        }
        if self.run_record_fields.id_field.trim().is_empty() {
            return Err(EvalError::configuration("run record id field name is empty"));
        }
        if self.run_record_fields.query_field.trim().is_empty() {
            return Err(EvalError::configuration(
                "run record query field name is empty",
            ));
        }
        Ok(())
    }
}

pub fn validate_threshold(name: &str, value: f64) -> Result<(), EvalError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EvalError::invalid_input(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Result<PathBuf, EvalError> {
        let Some(path) = self.path.as_ref().filter(|path| !path.as_os_str().is_empty()) else {
            return Err(EvalError::configuration(
                "database path is missing (set --db-path or SQLEVAL_DB_PATH)",
            ));
        };
        if !path.is_file() {
            return Err(EvalError::configuration(format!(
                "database file does not exist: {}",
                path.display()
            )));
        }
        Ok(path.clone())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
pub enum EmbeddingBackend {
    Local,
    #[value(name = "openai")]
    OpenAi,
}

impl EmbeddingBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_id: String,
    pub dimensions: Option<usize>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model_id: String::new(),
            dimensions: None,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EvaluatorConfig::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn thresholds_outside_unit_interval_are_configuration_errors() {
        let config = EvaluatorConfig {
            event_threshold: 1.5,
            ..EvaluatorConfig::default()
        };
        let error = config.validate().expect_err("1.5 is not a similarity");
        assert!(matches!(error, EvalError::Configuration { .. }));

        assert!(validate_threshold("t", f64::NAN).is_err());
        assert!(validate_threshold("t", -0.1).is_err());
        assert!(validate_threshold("t", 0.0).is_ok());
        assert!(validate_threshold("t", 1.0).is_ok());
    }

    #[test]
    fn database_path_is_required_and_must_exist() {
        let missing = DatabaseConfig::default();
        assert!(matches!(
            missing.resolved_path(),
            Err(EvalError::Configuration { .. })
        ));

        let dir = tempfile::tempdir().expect("tempdir");
        let absent = DatabaseConfig {
            path: Some(dir.path().join("absent.sqlite")),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            absent.resolved_path(),
            Err(EvalError::Configuration { .. })
        ));

        let present_path = dir.path().join("present.sqlite");
        std::fs::write(&present_path, b"").expect("touch");
        let present = DatabaseConfig {
            path: Some(present_path.clone()),
            ..DatabaseConfig::default()
        };
        assert_eq!(present.resolved_path().expect("exists"), present_path);
    }
}
