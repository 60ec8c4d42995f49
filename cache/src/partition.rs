use std::fmt;

/// How a matrix was pre-split into read-only partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionFormat {
    /// One partition per row.
    RowWise,
    /// One partition per column.
    ColumnWise,
    /// One partition per block of `rows_per_block` rows.
    RowBlockWise,
    /// One partition per block of `cols_per_block` columns.
    ColumnBlockWise,
}

impl PartitionFormat {
    /// Returns true if a partition holds more than one row (or column).
    pub fn is_blockwise(&self) -> bool {
        matches!(self, Self::RowBlockWise | Self::ColumnBlockWise)
    }

    /// Returns true if partitions are addressed by row.
    pub fn is_rowwise(&self) -> bool {
        matches!(self, Self::RowWise | Self::RowBlockWise)
    }
}

impl fmt::Display for PartitionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RowWise => "ROW_WISE",
            Self::ColumnWise => "COLUMN_WISE",
            Self::RowBlockWise => "ROW_BLOCK_WISE",
            Self::ColumnBlockWise => "COLUMN_BLOCK_WISE",
        };
        f.write_str(s)
    }
}

/// Inclusive, 1-based range of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRange {
    pub row_start: u64,
    pub row_end: u64,
    pub col_start: u64,
    pub col_end: u64,
}

impl IndexRange {
    pub fn new(row_start: u64, row_end: u64, col_start: u64, col_end: u64) -> Self {
        Self {
            row_start,
            row_end,
            col_start,
            col_end,
        }
    }

    /// The entire `row` of a matrix with `cols` columns.
    pub fn row(row: u64, cols: u64) -> Self {
        Self::new(row, row, 1, cols)
    }

    /// The entire `col` of a matrix with `rows` rows.
    pub fn column(col: u64, rows: u64) -> Self {
        Self::new(1, rows, col, col)
    }
}

/// Index of the partition holding `range` (used as a path suffix).
///
/// `block` is the number of rows (or columns) per partition and is ignored by the non-blockwise
/// formats. Indices and keys are both 1-based, so rows `1..=block` fall in partition 1.
pub(crate) fn key(format: PartitionFormat, range: &IndexRange, block: u64) -> u64 {
    match format {
        PartitionFormat::RowWise => range.row_start,
        PartitionFormat::ColumnWise => range.col_start,
        PartitionFormat::RowBlockWise => (range.row_start - 1) / block + 1,
        PartitionFormat::ColumnBlockWise => (range.col_start - 1) / block + 1,
    }
}

/// Zero-based offset of `range` inside its (blockwise) partition.
pub(crate) fn offset(format: PartitionFormat, range: &IndexRange, block: u64) -> usize {
    let start = if format.is_rowwise() {
        range.row_start
    } else {
        range.col_start
    };
    ((start - 1) % block) as usize
}

/// Dimensions of partition `key` of a `rows x cols` matrix.
pub(crate) fn shape(
    format: PartitionFormat,
    key: u64,
    rows: u64,
    cols: u64,
    block: u64,
) -> (u64, u64) {
    let clip = |extent: u64| block.min(extent.saturating_sub((key - 1) * block));
    match format {
        PartitionFormat::RowWise => (1, cols),
        PartitionFormat::ColumnWise => (rows, 1),
        PartitionFormat::RowBlockWise => (clip(rows), cols),
        PartitionFormat::ColumnBlockWise => (rows, clip(cols)),
    }
}
