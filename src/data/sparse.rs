//! Sparse feature matrices for the training loop.
//!
//! A filled batch becomes two `(size, FEATURE_COUNT)` binary matrices, one per
//! perspective, in compressed sparse row form. Tensor libraries that expect
//! coordinate lists can take [`SparseMatrix::coo_indices`] directly.

use super::batch::BatchView;
use super::error::{DataError, Violation};
use crate::config::TargetBlend;
use crate::nnue::FEATURE_COUNT;

/// Binary CSR matrix: every stored entry is 1.0
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<u32>,
}

impl SparseMatrix {
    /// Build from `(row, feature)` pairs in any order.
    ///
    /// Rejects rows `>= rows`, features `>= FEATURE_COUNT` and repeated pairs.
    pub fn from_pairs<I>(rows: u32, pairs: I) -> Result<Self, Violation>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut entries: Vec<(u32, u32)> = Vec::new();
        for (row, feature) in pairs {
            if row >= rows {
                return Err(Violation::RowOutOfRange { row, size: rows });
            }
            if feature as usize >= FEATURE_COUNT {
                return Err(Violation::FeatureOutOfRange { feature });
            }
            entries.push((row, feature));
        }
        entries.sort_unstable();
        if let Some(dup) = entries.windows(2).find(|w| w[0] == w[1]) {
            return Err(Violation::DuplicateFeature {
                row: dup[0].0,
                feature: dup[0].1,
            });
        }

        let rows = rows as usize;
        let mut row_offsets = vec![0usize; rows + 1];
        for &(row, _) in &entries {
            row_offsets[row as usize + 1] += 1;
        }
        for r in 0..rows {
            row_offsets[r + 1] += row_offsets[r];
        }

        Ok(SparseMatrix {
            rows,
            cols: FEATURE_COUNT,
            row_offsets,
            col_indices: entries.into_iter().map(|(_, feature)| feature).collect(),
        })
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) entries
    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    /// CSR row pointer, `rows + 1` entries
    #[inline]
    #[must_use]
    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    /// CSR column indices, sorted within each row
    #[inline]
    #[must_use]
    pub fn col_indices(&self) -> &[u32] {
        &self.col_indices
    }

    /// Active features of one row
    #[must_use]
    pub fn row(&self, row: usize) -> &[u32] {
        match (self.row_offsets.get(row), self.row_offsets.get(row + 1)) {
            (Some(&start), Some(&end)) => &self.col_indices[start..end],
            _ => &[],
        }
    }

    /// Value at `[row, col]`: 1.0 if the pair was present, else 0.0
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        let Ok(col) = u32::try_from(col) else {
            return 0.0;
        };
        if self.row(row).binary_search(&col).is_ok() {
            1.0
        } else {
            0.0
        }
    }

    /// Row and column coordinate lists
    #[must_use]
    pub fn coo_indices(&self) -> (Vec<u32>, Vec<u32>) {
        let mut rows = Vec::with_capacity(self.nnz());
        for r in 0..self.rows {
            let len = self.row_offsets[r + 1] - self.row_offsets[r];
            rows.extend(std::iter::repeat(r as u32).take(len));
        }
        (rows, self.col_indices.clone())
    }

    /// Values matching [`Self::coo_indices`]
    #[must_use]
    pub fn values(&self) -> Vec<f32> {
        vec![1.0; self.nnz()]
    }

    /// Row-major dense expansion, `rows * cols` values
    #[must_use]
    pub fn to_dense(&self) -> Vec<f32> {
        let mut dense = vec![0.0; self.rows * self.cols];
        for r in 0..self.rows {
            for &c in self.row(r) {
                dense[r * self.cols + c as usize] = 1.0;
            }
        }
        dense
    }
}

/// Model-ready form of one batch
#[derive(Clone, Debug, PartialEq)]
pub struct SparseBatch {
    pub stm: SparseMatrix,
    pub non_stm: SparseMatrix,
    pub evals: Vec<f32>,
    pub outcomes: Vec<f32>,
}

impl SparseBatch {
    /// Assemble both perspective matrices from a filled batch.
    pub fn from_view(view: &BatchView<'_>) -> Result<Self, DataError> {
        let stm = SparseMatrix::from_pairs(view.size(), view.stm_pairs())?;
        let non_stm = SparseMatrix::from_pairs(view.size(), view.non_stm_pairs())?;
        Ok(SparseBatch {
            stm,
            non_stm,
            evals: view.evals().to_vec(),
            outcomes: view.outcomes().to_vec(),
        })
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.evals.len()
    }

    /// Blended training target per sample
    #[must_use]
    pub fn targets(&self, blend: &TargetBlend) -> Vec<f32> {
        self.evals
            .iter()
            .zip(&self.outcomes)
            .map(|(&eval, &outcome)| blend.target(eval, outcome))
            .collect()
    }
}
