pub mod assignment;
pub mod scoring;
pub mod similarity;

use std::collections::HashSet;

use tracing::info;

use crate::config::validate_threshold;
use crate::error::EvalError;
use crate::model::LabelEvaluation;
use crate::semantic::EmbeddingProvider;

pub use assignment::{Assignment, solve_assignment};
pub use scoring::{ClassificationCounts, MetricBundle, score_assignment};
pub use similarity::{SimilarityMatrix, build_similarity_matrix};

#[derive(Debug, Clone, PartialEq)]
pub struct LabelComparison {
    pub evaluation: LabelEvaluation,
    pub embedding_tokens: u64,
}

pub fn dedupe_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::<&str>::new();
    let mut unique = Vec::<String>::with_capacity(labels.len());
    for label in labels {
        if seen.insert(label.as_str()) {
            unique.push(label.clone());
        }
    }
    unique
}

/// Fails with `InvalidInput` when either list is empty; a comparison
/// against nothing is undefined, not zero.
pub fn compare_labels(
    provider: &dyn EmbeddingProvider,
    reference: &[String],
    candidate: &[String],
    threshold: f64,
) -> Result<LabelComparison, EvalError> {
    validate_threshold("threshold", threshold)?;
    let reference = dedupe_labels(reference);
    let candidate = dedupe_labels(candidate);

    let (similarity, embedding_tokens) = build_similarity_matrix(provider, &reference, &candidate)?;
    let assignment = solve_assignment(&similarity);
    let evaluation = score_assignment(&assignment, &similarity, &reference, &candidate, threshold)?;

    info!(
        benchmark = reference.len(),
        candidate = candidate.len(),
        threshold,
        true_positives = evaluation.true_positives,
        false_positives = evaluation.false_positives,
        false_negatives = evaluation.false_negatives,
        f1 = evaluation.f1,
        "label comparison scored"
    );

    Ok(LabelComparison {
        evaluation,
        embedding_tokens,
    })
}
