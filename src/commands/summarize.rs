use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use sqleval::evaluator::RESULT_FILE_PREFIX;
use sqleval::model::{EvaluationResult, LabelEvaluation, MetricMeans, ResultsSummary};
use sqleval::util::write_json_atomic;

use crate::cli::SummarizeArgs;

pub fn run(args: SummarizeArgs) -> Result<()> {
    let paths = discover_results(&args.results_dir)?;
    if paths.is_empty() {
        warn!(results_dir = %args.results_dir.display(), "no result files found");
    }

    let mut results = Vec::with_capacity(paths.len());
    for path in &paths {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let result: EvaluationResult = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        results.push(result);
    }

    let summary = summarize_results(&results);
    info!(
        runs = summary.run_count,
        executed = summary.executed,
        mean_coverage = summary.mean_coverage,
        columns_f1 = summary.columns.f1,
        events_f1 = summary.events.f1,
        "results summarized"
    );

    if let Some(output_path) = &args.output_path {
        write_json_atomic(output_path, &summary)?;
        info!(path = %output_path.display(), "wrote results summary");
    }

    let rendered =
        serde_json::to_string_pretty(&summary).context("failed to render summary as json")?;
    println!("{rendered}");
    Ok(())
}

fn discover_results(results_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(results_dir)
        .with_context(|| format!("failed to read results directory {}", results_dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", results_dir.display()))?
            .path();
        let is_result = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(RESULT_FILE_PREFIX) && name.ends_with(".json"));
        if is_result && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn summarize_results(results: &[EvaluationResult]) -> ResultsSummary {
    let run_count = results.len();
    let executed = results.iter().filter(|result| result.execution_ok).count();

    ResultsSummary {
        run_count,
        executed,
        execution_rate: mean(results.iter().map(|result| f64::from(u8::from(result.execution_ok)))),
        mean_coverage: mean(results.iter().map(|result| result.coverage)),
        columns: metric_means(results.iter().map(|result| &result.columns)),
        events: metric_means(results.iter().map(|result| &result.events)),
    }
}

fn metric_means<'a>(evaluations: impl Iterator<Item = &'a LabelEvaluation> + Clone) -> MetricMeans {
    MetricMeans {
        f1: mean(evaluations.clone().map(|evaluation| evaluation.f1)),
        precision: mean(evaluations.clone().map(|evaluation| evaluation.precision)),
        recall: mean(evaluations.map(|evaluation| evaluation.recall)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
