use std::collections::BTreeMap;

/// Density below which a block is better represented sparsely.
pub const SPARSITY_TURN_POINT: f64 = 0.4;

#[derive(Clone, Debug)]
enum Values {
    /// Row-major values, `rows * cols` entries.
    Dense(Vec<f64>),
    /// One ordered `column -> value` map per row. Only non-zero values are stored.
    Sparse(Vec<BTreeMap<usize, f64>>),
}

/// An in-memory matrix of `f64` values.
///
/// The non-zero count is maintained on every [MatrixBlock::set] so it is always exact.
#[derive(Clone, Debug)]
pub struct MatrixBlock {
    rows: usize,
    cols: usize,
    non_zeros: u64,
    values: Values,
}

impl MatrixBlock {
    /// Create a block of zeros.
    pub fn new(rows: usize, cols: usize, sparse: bool) -> Self {
        let values = if sparse {
            Values::Sparse(vec![BTreeMap::new(); rows])
        } else {
            Values::Dense(vec![0.0; rows * cols])
        };
        Self {
            rows,
            cols,
            non_zeros: 0,
            values,
        }
    }

    /// Create a dense block from row-major `values`.
    ///
    /// Returns `None` if `values` does not hold exactly `rows * cols` entries.
    pub fn dense(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        if values.len() != rows * cols {
            return None;
        }
        let non_zeros = values.iter().filter(|v| **v != 0.0).count() as u64;
        Some(Self {
            rows,
            cols,
            non_zeros,
            values: Values::Dense(values),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells (`rows * cols`).
    pub fn cells(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    pub fn non_zeros(&self) -> u64 {
        self.non_zeros
    }

    /// Returns true if the block has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.values, Values::Sparse(_))
    }

    /// Fraction of cells that are non-zero.
    pub fn sparsity(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.non_zeros as f64 / self.cells() as f64
    }

    /// Get the value at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside of the block.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.cols, "cell out of bounds");
        match &self.values {
            Values::Dense(values) => values[row * self.cols + col],
            Values::Sparse(rows) => rows[row].get(&col).copied().unwrap_or(0.0),
        }
    }

    /// Set the value at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside of the block.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.rows && col < self.cols, "cell out of bounds");
        let previous = match &mut self.values {
            Values::Dense(values) => {
                let cell = &mut values[row * self.cols + col];
                std::mem::replace(cell, value)
            }
            Values::Sparse(rows) => {
                if value == 0.0 {
                    rows[row].remove(&col).unwrap_or(0.0)
                } else {
                    rows[row].insert(col, value).unwrap_or(0.0)
                }
            }
        };
        match (previous != 0.0, value != 0.0) {
            (false, true) => self.non_zeros += 1,
            (true, false) => self.non_zeros -= 1,
            _ => {}
        }
    }

    /// Recount non-zero values and return the count.
    pub fn recompute_non_zeros(&mut self) -> u64 {
        self.non_zeros = match &self.values {
            Values::Dense(values) => values.iter().filter(|v| **v != 0.0).count() as u64,
            Values::Sparse(rows) => rows
                .iter()
                .map(|row| row.values().filter(|v| **v != 0.0).count() as u64)
                .sum(),
        };
        self.non_zeros
    }

    /// Switch between dense and sparse representation depending on the current sparsity.
    ///
    /// Single column blocks always stay dense.
    pub fn examine_sparsity(&mut self) {
        let sparse = self.cols > 1 && self.sparsity() < SPARSITY_TURN_POINT;
        if sparse != self.is_sparse() {
            let mut converted = Self::new(self.rows, self.cols, sparse);
            for (row, col, value) in self.iter_non_zeros() {
                converted.set(row, col, value);
            }
            *self = converted;
        }
    }

    /// Iterate over all non-zero cells in row-major order.
    pub fn iter_non_zeros(&self) -> Box<dyn Iterator<Item = (usize, usize, f64)> + '_> {
        match &self.values {
            Values::Dense(values) => {
                let cols = self.cols;
                Box::new(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v != 0.0)
                        .map(move |(i, v)| (i / cols, i % cols, *v)),
                )
            }
            Values::Sparse(rows) => Box::new(rows.iter().enumerate().flat_map(|(row, cols)| {
                cols.iter().map(move |(col, value)| (row, *col, *value))
            })),
        }
    }

    /// Copy a single row into a new dense `1 x cols` block.
    ///
    /// # Panics
    ///
    /// Panics if `row` is outside of the block.
    pub fn slice_row(&self, row: usize) -> Self {
        let mut out = Self::new(1, self.cols, false);
        for col in 0..self.cols {
            out.set(0, col, self.get(row, col));
        }
        out
    }

    /// Copy a single column into a new dense `rows x 1` block.
    ///
    /// # Panics
    ///
    /// Panics if `col` is outside of the block.
    pub fn slice_column(&self, col: usize) -> Self {
        let mut out = Self::new(self.rows, 1, false);
        for row in 0..self.rows {
            out.set(row, 0, self.get(row, col));
        }
        out
    }

    /// Copy the `rows x cols` region starting at (`row`, `col`) into a new block.
    ///
    /// The region is clipped to the bounds of this block.
    pub fn tile(&self, row: usize, col: usize, rows: usize, cols: usize) -> Self {
        let rows = rows.min(self.rows.saturating_sub(row));
        let cols = cols.min(self.cols.saturating_sub(col));
        let mut out = Self::new(rows, cols, self.is_sparse());
        for r in 0..rows {
            for c in 0..cols {
                let value = self.get(row + r, col + c);
                if value != 0.0 {
                    out.set(r, c, value);
                }
            }
        }
        out
    }

    /// Write the non-zero values of `tile` into this block at (`row`, `col`).
    ///
    /// Returns false (and copies nothing) if `tile` does not fit.
    pub fn paste(&mut self, tile: &Self, row: usize, col: usize) -> bool {
        if row + tile.rows > self.rows || col + tile.cols > self.cols {
            return false;
        }
        for (r, c, value) in tile.iter_non_zeros() {
            self.set(row + r, col + c, value);
        }
        true
    }
}

impl PartialEq for MatrixBlock {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.non_zeros == other.non_zeros
            && self
                .iter_non_zeros()
                .all(|(row, col, value)| other.get(row, col) == value)
    }
}
