use tracing::debug;

use crate::error::EvalError;
use crate::semantic::{EmbeddingProvider, cosine_similarity};

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn from_vectors(reference: &[Vec<f32>], candidate: &[Vec<f32>]) -> Self {
        let mut values = Vec::<f64>::with_capacity(reference.len() * candidate.len());
        for left in reference {
            for right in candidate {
                values.push(cosine_similarity(left, right));
            }
        }

        Self {
            rows: reference.len(),
            cols: candidate.len(),
            values,
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, EvalError> {
        let row_count = rows.len();
        let col_count = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != col_count) {
            return Err(EvalError::invalid_input(
                "similarity rows must all have the same length",
            ));
        }
        if rows
            .iter()
            .flatten()
            .any(|value| !value.is_finite() || !(-1.0..=1.0).contains(value))
        {
            return Err(EvalError::invalid_input(
                "similarity values must be finite and within [-1, 1]",
            ));
        }

        Ok(Self {
            rows: row_count,
            cols: col_count,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn cost_matrix(&self) -> Vec<f64> {
        self.values.iter().map(|value| 1.0 - value).collect()
    }
}

pub fn build_similarity_matrix(
    provider: &dyn EmbeddingProvider,
    reference: &[String],
    candidate: &[String],
) -> Result<(SimilarityMatrix, u64), EvalError> {
    if reference.is_empty() {
        return Err(EvalError::invalid_input("benchmark label list is empty"));
    }
    if candidate.is_empty() {
        return Err(EvalError::invalid_input("candidate label list is empty"));
    }

    let reference_batch = provider.embed(reference)?;
    let candidate_batch = provider.embed(candidate)?;

    let matrix = SimilarityMatrix::from_vectors(&reference_batch.vectors, &candidate_batch.vectors);
    let tokens = reference_batch.tokens + candidate_batch.tokens;
    debug!(
        rows = matrix.rows(),
        cols = matrix.cols(),
        model = %provider.model_name(),
        tokens,
        "similarity matrix built"
    );
    Ok((matrix, tokens))
}
