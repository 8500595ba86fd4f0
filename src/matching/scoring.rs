use super::assignment::Assignment;
use super::similarity::SimilarityMatrix;
use crate::config::validate_threshold;
use crate::error::EvalError;
use crate::model::{LabelEvaluation, MatchRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ClassificationCounts {
    pub fn new(reference_len: usize, candidate_len: usize, tp: usize) -> Self {
        let tp = tp.min(reference_len).min(candidate_len);
        Self {
            true_positives: tp,
            false_positives: candidate_len - tp,
            false_negatives: reference_len - tp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricBundle {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl MetricBundle {
    /// Each metric is 0.0 when its denominator is zero.
    pub fn from_counts(counts: &ClassificationCounts) -> Self {
        let precision = ratio(
            counts.true_positives,
            counts.true_positives + counts.false_positives,
        );
        let recall = ratio(
            counts.true_positives,
            counts.true_positives + counts.false_negatives,
        );
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            precision,
            recall,
            f1,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn score_assignment(
    assignment: &Assignment,
    similarity: &SimilarityMatrix,
    reference: &[String],
    candidate: &[String],
    threshold: f64,
) -> Result<LabelEvaluation, EvalError> {
    validate_threshold("threshold", threshold)?;
    if reference.is_empty() || candidate.is_empty() {
        return Err(EvalError::invalid_input(
            "cannot score a comparison against an empty label list",
        ));
    }
    if similarity.rows() != reference.len() || similarity.cols() != candidate.len() {
        return Err(EvalError::invalid_input(format!(
            "similarity matrix is {}x{} but labels are {}x{}",
            similarity.rows(),
            similarity.cols(),
            reference.len(),
            candidate.len()
        )));
    }

    let mut reference_used = vec![false; reference.len()];
    let mut candidate_used = vec![false; candidate.len()];
    let mut matches = Vec::<MatchRecord>::with_capacity(assignment.len());

    for &(row, col) in &assignment.pairs {
        if row >= reference.len() || col >= candidate.len() {
            return Err(EvalError::invalid_input(format!(
                "assignment pair ({row}, {col}) is out of bounds"
            )));
        }
        if reference_used[row] || candidate_used[col] {
            return Err(EvalError::invalid_input(format!(
                "assignment pair ({row}, {col}) reuses an index"
            )));
        }
        reference_used[row] = true;
        candidate_used[col] = true;

        let score = similarity.get(row, col);
        matches.push(MatchRecord {
            reference: reference[row].clone(),
            candidate: candidate[col].clone(),
            score,
            threshold,
            passed: score >= threshold,
        });
    }

    let tp = matches.iter().filter(|record| record.passed).count();
    let counts = ClassificationCounts::new(reference.len(), candidate.len(), tp);
    let metrics = MetricBundle::from_counts(&counts);

    Ok(LabelEvaluation {
        threshold,
        f1: metrics.f1,
        precision: metrics.precision,
        recall: metrics.recall,
        true_positives: counts.true_positives,
        false_positives: counts.false_positives,
        false_negatives: counts.false_negatives,
        benchmark_labels: reference.to_vec(),
        candidate_labels: candidate.to_vec(),
        matches,
        unmatched_benchmark: unused_labels(reference, &reference_used),
        unmatched_candidate: unused_labels(candidate, &candidate_used),
        error: None,
    })
}

fn unused_labels(labels: &[String], used: &[bool]) -> Vec<String> {
    labels
        .iter()
        .zip(used)
        .filter(|(_, used)| !**used)
        .map(|(label, _)| label.clone())
        .collect()
}
