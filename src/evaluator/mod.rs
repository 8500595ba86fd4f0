use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::EvaluatorConfig;
use crate::error::{EvalError, ExecutionError};
use crate::harness::{QueryEngine, execute_generated_query};
use crate::matching::{LabelComparison, compare_labels, dedupe_labels};
use crate::model::{EvaluationResult, LabelEvaluation, RunRecord, validate_run_id};
use crate::semantic::EmbeddingProvider;
use crate::table::Table;
use crate::util::utc_string;

mod persist;
mod reference;
#[cfg(test)]
mod tests;

pub use persist::{RESULT_FILE_PREFIX, persist_result, result_path};
pub use reference::ReferenceDataset;

/// Ratio of generated rows to reference rows. `0.0` when the reference is
/// empty; that value is a sentinel, not a measured coverage.
pub fn coverage_ratio(reference_rows: usize, candidate_rows: usize) -> f64 {
    if reference_rows == 0 {
        0.0
    } else {
        candidate_rows as f64 / reference_rows as f64
    }
}

pub struct Evaluator {
    config: EvaluatorConfig,
    provider: Box<dyn EmbeddingProvider>,
    engine: Box<dyn QueryEngine>,
    reference: ReferenceDataset,
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        provider: Box<dyn EmbeddingProvider>,
        engine: Box<dyn QueryEngine>,
        reference: ReferenceDataset,
    ) -> Result<Self, EvalError> {
        config.validate()?;
        if reference.event_column() != config.event_column {
            return Err(EvalError::configuration(format!(
                "reference dataset uses event column `{}` but evaluator is configured for `{}`",
                reference.event_column(),
                config.event_column
            )));
        }

        Ok(Self {
            config,
            provider,
            engine,
            reference,
        })
    }

    pub fn with_reference_query(
        config: EvaluatorConfig,
        provider: Box<dyn EmbeddingProvider>,
        engine: Box<dyn QueryEngine>,
        reference_query: &str,
    ) -> Result<Self, EvalError> {
        config.validate()?;
        let reference = ReferenceDataset::load(engine.as_ref(), reference_query, &config.event_column)?;
        Self::new(config, provider, engine, reference)
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceDataset {
        &self.reference
    }

    pub fn embedding_model(&self) -> &str {
        self.provider.model_name()
    }

    pub fn evaluate(&self, record: &RunRecord) -> Result<EvaluationResult, EvalError> {
        self.evaluate_at(record, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        record: &RunRecord,
        evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationResult, EvalError> {
        let result = self.assess(record, evaluated_at)?;
        let path = persist_result(&self.config.results_dir, &result)?;
        info!(
            run_id = %result.run_id,
            execution_ok = result.execution_ok,
            coverage = result.coverage,
            columns_f1 = result.columns.f1,
            events_f1 = result.events.f1,
            path = %path.display(),
            "evaluation result persisted"
        );
        Ok(result)
    }

    pub fn assess(
        &self,
        record: &RunRecord,
        evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationResult, EvalError> {
        validate_run_id(&record.id)?;
        info!(run_id = %record.id, "evaluating run");

        let outcome = execute_generated_query(
            self.engine.as_ref(),
            &record.query_text,
            &record.id,
            &self.config.artifacts_dir,
        )?;
        let evaluated_at = utc_string(evaluated_at);

        match outcome {
            Ok(table) => self.score_table(record, evaluated_at, &table),
            Err(err) => Ok(self.failed_result(record, evaluated_at, err)),
        }
    }

    fn score_table(
        &self,
        record: &RunRecord,
        evaluated_at: String,
        table: &Table,
    ) -> Result<EvaluationResult, EvalError> {
        let event_column = &self.config.event_column;
        let candidate_columns = table.column_labels();
        let candidate_events = if table.has_column(event_column) {
            table.distinct_values(event_column)?
        } else {
            warn!(run_id = %record.id, event_column = %event_column, "generated result has no event column");
            Vec::new()
        };

        let columns = self.compare_or_reject(
            &record.id,
            "columns",
            self.reference.column_labels(),
            &candidate_columns,
            self.config.column_threshold,
        )?;
        let events = self.compare_or_reject(
            &record.id,
            "events",
            self.reference.event_labels(),
            &candidate_events,
            self.config.event_threshold,
        )?;
        if let (Some(column_error), Some(_)) = (&columns.evaluation.error, &events.evaluation.error) {
            return Err(EvalError::invalid_input(format!(
                "run {} has no comparable labels: {column_error}",
                record.id
            )));
        }

        let coverage = coverage_ratio(self.reference.row_count(), table.row_count());

        Ok(EvaluationResult {
            run_id: record.id.clone(),
            evaluated_at,
            execution_ok: true,
            execution_error: None,
            coverage,
            embedding_model: self.provider.model_name().to_string(),
            embedding_tokens: columns.embedding_tokens + events.embedding_tokens,
            reference_rows: self.reference.row_count(),
            candidate_rows: table.row_count(),
            columns: columns.evaluation,
            events: events.evaluation,
            run_telemetry: record.telemetry.clone(),
        })
    }

    // An empty label list only voids its own comparison; provider and other
    // failures still abort the run.
    fn compare_or_reject(
        &self,
        run_id: &str,
        kind: &str,
        reference: &[String],
        candidate: &[String],
        threshold: f64,
    ) -> Result<LabelComparison, EvalError> {
        match compare_labels(self.provider.as_ref(), reference, candidate, threshold) {
            Ok(comparison) => Ok(comparison),
            Err(EvalError::InvalidInput { message }) => {
                warn!(run_id = %run_id, comparison = kind, error = %message, "label comparison rejected");
                Ok(LabelComparison {
                    evaluation: LabelEvaluation::rejected(
                        threshold,
                        dedupe_labels(reference),
                        dedupe_labels(candidate),
                        message,
                    ),
                    embedding_tokens: 0,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn failed_result(
        &self,
        record: &RunRecord,
        evaluated_at: String,
        err: ExecutionError,
    ) -> EvaluationResult {
        warn!(run_id = %record.id, error = %err, "recording failed execution");
        EvaluationResult {
            run_id: record.id.clone(),
            evaluated_at,
            execution_ok: false,
            execution_error: Some(err.message),
            coverage: 0.0,
            embedding_model: self.provider.model_name().to_string(),
            embedding_tokens: 0,
            reference_rows: 0,
            candidate_rows: 0,
            columns: LabelEvaluation::default(),
            events: LabelEvaluation::default(),
            run_telemetry: record.telemetry.clone(),
        }
    }
}
