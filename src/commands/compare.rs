use anyhow::{Context, Result};
use tracing::info;

use sqleval::matching::compare_labels;
use sqleval::semantic::build_provider;

use crate::cli::CompareArgs;

pub fn run(args: CompareArgs) -> Result<()> {
    let reference = normalize_labels(&args.reference);
    let candidate = normalize_labels(&args.candidate);

    let provider = build_provider(&args.embedding.embedding_config())
        .context("failed to build embedding provider")?;
    let comparison = compare_labels(provider.as_ref(), &reference, &candidate, args.threshold)
        .context("label comparison failed")?;

    info!(
        model = %provider.model_name(),
        tokens = comparison.embedding_tokens,
        f1 = comparison.evaluation.f1,
        "comparison completed"
    );

    let rendered = serde_json::to_string_pretty(&comparison.evaluation)
        .context("failed to render comparison as json")?;
    println!("{rendered}");
    Ok(())
}

fn normalize_labels(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
