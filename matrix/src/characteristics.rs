use crate::MatrixBlock;
use std::fmt;

/// Default number of rows (and columns) in a block of a blocked format.
pub const DEFAULT_BLOCK_SIZE: u32 = 1000;

/// Dimensions, blocking, and (if known) non-zero count of a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Characteristics {
    pub rows: u64,
    pub cols: u64,
    pub rows_per_block: u32,
    pub cols_per_block: u32,
    pub non_zeros: Option<u64>,
}

impl Characteristics {
    pub fn new(rows: u64, cols: u64, rows_per_block: u32, cols_per_block: u32) -> Self {
        Self {
            rows,
            cols,
            rows_per_block,
            cols_per_block,
            non_zeros: None,
        }
    }

    pub fn with_non_zeros(mut self, non_zeros: u64) -> Self {
        self.non_zeros = Some(non_zeros);
        self
    }

    /// Characteristics of `block` using the provided blocking.
    pub fn of(block: &MatrixBlock, rows_per_block: u32, cols_per_block: u32) -> Self {
        Self::new(
            block.rows() as u64,
            block.cols() as u64,
            rows_per_block,
            cols_per_block,
        )
        .with_non_zeros(block.non_zeros())
    }

    /// Make the dimensions and non-zero count match `block`.
    pub fn refresh(&mut self, block: &MatrixBlock) {
        self.rows = block.rows() as u64;
        self.cols = block.cols() as u64;
        self.non_zeros = Some(block.non_zeros());
    }

    pub fn cells(&self) -> u64 {
        self.rows.saturating_mul(self.cols)
    }

    /// Expected fraction of non-zero cells (1.0 if the non-zero count is unknown).
    pub fn sparsity(&self) -> f64 {
        match self.non_zeros {
            Some(non_zeros) if self.cells() > 0 => non_zeros as f64 / self.cells() as f64,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Characteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} x {}, nnz={}, blocks ({} x {})]",
            self.rows,
            self.cols,
            self.non_zeros
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            self.rows_per_block,
            self.cols_per_block
        )
    }
}
