use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{error, info, warn};

use sqleval::config::RunRecordFields;
use sqleval::evaluator::{Evaluator, result_path};
use sqleval::harness::SqliteEngine;
use sqleval::model::{BatchCounts, BatchManifest, RunOutcome, RunRecord};
use sqleval::semantic::build_provider;
use sqleval::util::{utc_compact_string, utc_string, write_json_atomic};

use crate::cli::EvaluateArgs;

const BATCH_MANIFEST_VERSION: u32 = 1;
const STATUS_EVALUATED: &str = "evaluated";
const STATUS_EXECUTION_FAILED: &str = "execution_failed";
const STATUS_ERROR: &str = "error";

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = utc_string(started_ts);
    let batch_id = format!("evaluation_batch_{}", utc_compact_string(started_ts));

    let record_paths = resolve_run_records(&args)?;
    if record_paths.is_empty() {
        bail!(
            "no run records matching {}*.json found in {}",
            args.run_prefix,
            args.runs_dir.display()
        );
    }

    let config = args.evaluator_config();
    let fields = config.run_record_fields.clone();
    let provider = build_provider(&args.embedding.embedding_config())
        .context("failed to build embedding provider")?;
    let engine = SqliteEngine::new(&args.database_config())
        .context("failed to configure relational engine")?;
    info!(db_path = %engine.path().display(), "relational engine configured");

    let evaluator =
        Evaluator::with_reference_query(config, provider, Box::new(engine), &args.reference_query)
            .context("failed to load reference dataset")?;

    info!(
        batch_id = %batch_id,
        runs = record_paths.len(),
        model = %evaluator.embedding_model(),
        reference_rows = evaluator.reference().row_count(),
        "evaluation batch started"
    );

    let mut counts = BatchCounts {
        run_records: record_paths.len(),
        ..BatchCounts::default()
    };
    let mut runs = Vec::with_capacity(record_paths.len());
    for path in &record_paths {
        let outcome = evaluate_record(&evaluator, path, &fields);
        match outcome.status.as_str() {
            STATUS_EVALUATED => counts.evaluated += 1,
            STATUS_EXECUTION_FAILED => counts.execution_failed += 1,
            _ => counts.errored += 1,
        }
        runs.push(outcome);
    }

    let config = evaluator.config();
    let manifest = BatchManifest {
        manifest_version: BATCH_MANIFEST_VERSION,
        batch_id: batch_id.clone(),
        started_at,
        finished_at: utc_string(Utc::now()),
        reference_query: args.reference_query.clone(),
        reference_rows: evaluator.reference().row_count(),
        embedding_model: evaluator.embedding_model().to_string(),
        column_threshold: config.column_threshold,
        event_threshold: config.event_threshold,
        results_dir: config.results_dir.display().to_string(),
        counts,
        runs,
    };

    let manifest_path = config.results_dir.join(format!("{batch_id}.json"));
    write_json_atomic(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote batch manifest");

    if manifest.counts.errored > 0 {
        warn!(
            errored = manifest.counts.errored,
            "some run records could not be evaluated"
        );
    }
    info!(
        evaluated = manifest.counts.evaluated,
        execution_failed = manifest.counts.execution_failed,
        errored = manifest.counts.errored,
        "evaluation batch completed"
    );

    Ok(())
}

fn evaluate_record(evaluator: &Evaluator, path: &Path, fields: &RunRecordFields) -> RunOutcome {
    let source_path = path.display().to_string();
    let record = match RunRecord::load(path, fields) {
        Ok(record) => record,
        Err(err) => {
            error!(path = %source_path, error = %err, "failed to load run record");
            return error_outcome(source_path, None, err.to_string());
        }
    };

    match evaluator.evaluate(&record) {
        Ok(result) => RunOutcome {
            source_path,
            run_id: Some(result.run_id.clone()),
            status: if result.execution_ok {
                STATUS_EVALUATED.to_string()
            } else {
                STATUS_EXECUTION_FAILED.to_string()
            },
            result_path: Some(
                result_path(&evaluator.config().results_dir, &result.run_id)
                    .display()
                    .to_string(),
            ),
            coverage: Some(result.coverage),
            columns_f1: Some(result.columns.f1),
            events_f1: Some(result.events.f1),
            error: result.execution_error,
        },
        Err(err) => {
            error!(run_id = %record.id, error = %err, "run evaluation failed");
            error_outcome(source_path, Some(record.id), err.to_string())
        }
    }
}

fn error_outcome(source_path: String, run_id: Option<String>, error: String) -> RunOutcome {
    RunOutcome {
        source_path,
        run_id,
        status: STATUS_ERROR.to_string(),
        result_path: None,
        coverage: None,
        columns_f1: None,
        events_f1: None,
        error: Some(error),
    }
}

fn resolve_run_records(args: &EvaluateArgs) -> Result<Vec<PathBuf>> {
    if !args.run_records.is_empty() {
        return Ok(args.run_records.clone());
    }
    discover_run_records(&args.runs_dir, &args.run_prefix)
}

fn discover_run_records(runs_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(runs_dir)
        .with_context(|| format!("failed to read run directory {}", runs_dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", runs_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(".json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
