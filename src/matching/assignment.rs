use super::similarity::SimilarityMatrix;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub pairs: Vec<(usize, usize)>,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

pub fn solve_assignment(similarity: &SimilarityMatrix) -> Assignment {
    let rows = similarity.rows();
    let cols = similarity.cols();
    if rows == 0 || cols == 0 {
        return Assignment::default();
    }

    let cost = similarity.cost_matrix();
    let mut pairs = if rows <= cols {
        hungarian(&cost, rows, cols)
            .into_iter()
            .enumerate()
            .collect::<Vec<(usize, usize)>>()
    } else {
        let transposed = transpose(&cost, rows, cols);
        hungarian(&transposed, cols, rows)
            .into_iter()
            .enumerate()
            .map(|(col, row)| (row, col))
            .collect::<Vec<(usize, usize)>>()
    };

    pairs.sort_unstable();
    Assignment { pairs }
}

fn transpose(values: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    for row in 0..rows {
        for col in 0..cols {
            out[col * rows + row] = values[row * cols + col];
        }
    }
    out
}

// Solves an `n x m` row-major cost matrix with `n <= m`. Returns the column
// assigned to each row. Index 0 of the internal arrays is a sentinel.
fn hungarian(cost: &[f64], n: usize, m: usize) -> Vec<usize> {
    debug_assert!(n <= m);

    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; m + 1];
    // p[j]: row (1-based) currently matched to column j, 0 when free.
    let mut p = vec![0_usize; m + 1];
    let mut way = vec![0_usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0_usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0_usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let current = cost[(i0 - 1) * m + (j - 1)] - u[i0] - v[j];
                if current < minv[j] {
                    minv[j] = current;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assigned = vec![0_usize; n];
    for j in 1..=m {
        if p[j] != 0 {
            assigned[p[j] - 1] = j - 1;
        }
    }
    assigned
}
