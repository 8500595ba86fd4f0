use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sqleval::config::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CROSS_RUN_THRESHOLD, DEFAULT_EVENT_COLUMN, DEFAULT_ID_FIELD,
    DEFAULT_QUERY_FIELD, DEFAULT_STRUCTURAL_THRESHOLD, DatabaseConfig, EmbeddingBackend,
    EmbeddingConfig, EvaluatorConfig, RunRecordFields,
};

#[derive(Parser, Debug)]
#[command(
    name = "sqleval",
    version,
    about = "Semantic evaluation of generated SQL against a reference dataset"
)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Compare(CompareArgs),
    Summarize(SummarizeArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluate(_) => "evaluate",
            Self::Compare(_) => "compare",
            Self::Summarize(_) => "summarize",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "output")]
    pub runs_dir: PathBuf,

    #[arg(long = "run-record")]
    pub run_records: Vec<PathBuf>,

    #[arg(long, default_value = "TestToolAgent_")]
    pub run_prefix: String,

    #[arg(long, default_value = "results/json")]
    pub results_dir: PathBuf,

    #[arg(long, default_value = "results/tables")]
    pub artifacts_dir: PathBuf,

    #[arg(long, env = "SQLEVAL_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    #[arg(long, default_value = "SELECT * FROM mimicel")]
    pub reference_query: String,

    #[arg(long, default_value = DEFAULT_EVENT_COLUMN)]
    pub event_column: String,

    #[arg(long, default_value_t = DEFAULT_STRUCTURAL_THRESHOLD)]
    pub column_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_STRUCTURAL_THRESHOLD)]
    pub event_threshold: f64,

    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    pub id_field: String,

    #[arg(long, default_value = DEFAULT_QUERY_FIELD)]
    pub query_field: String,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

impl EvaluateArgs {
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            column_threshold: self.column_threshold,
            event_threshold: self.event_threshold,
            event_column: self.event_column.clone(),
            results_dir: self.results_dir.clone(),
            artifacts_dir: self.artifacts_dir.clone(),
            run_record_fields: RunRecordFields {
                id_field: self.id_field.clone(),
                query_field: self.query_field.clone(),
            },
        }
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            path: self.db_path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    #[arg(long, value_enum, default_value_t = EmbeddingBackend::Local)]
    pub embedding_backend: EmbeddingBackend,

    #[arg(long)]
    pub embedding_model: Option<String>,

    #[arg(long)]
    pub embedding_dimensions: Option<usize>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub embedding_base_url: String,

    #[arg(long, default_value_t = 60)]
    pub embedding_timeout_secs: u64,
}

impl EmbeddingArgs {
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: self.embedding_backend,
            model_id: self.embedding_model.clone().unwrap_or_default(),
            dimensions: self.embedding_dimensions,
            api_key: self.api_key.clone(),
            base_url: self.embedding_base_url.clone(),
            timeout_secs: self.embedding_timeout_secs,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Comma-separated benchmark labels.
    #[arg(long, value_delimiter = ',', required = true)]
    pub reference: Vec<String>,

    /// Comma-separated candidate labels.
    #[arg(long, value_delimiter = ',', required = true)]
    pub candidate: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_CROSS_RUN_THRESHOLD)]
    pub threshold: f64,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long, default_value = "results/json")]
    pub results_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}
