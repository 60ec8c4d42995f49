//! On-disk formats for persisted matrices.
//!
//! Every format is addressed by a stable identifier (see [Format::as_str]) that is recorded in
//! the [crate::Metadata] sidecar and accepted by export overrides.
//!
//! - [Format::TextCell]: one `row col value` line per non-zero cell (1-based indices).
//! - [Format::MatrixMarket]: a coordinate Matrix Market header followed by text cells.
//! - [Format::BinaryCell]: fixed 24-byte `(row u64, col u64, value f64)` records (1-based).
//! - [Format::BinaryBlock]: the matrix cut into `rows_per_block x cols_per_block` tiles, each
//!   stored as `(block_row u64, block_col u64, len u32)` followed by the [crate::native] tile.

use crate::{native, Characteristics, Error, MatrixBlock, SPARSITY_TURN_POINT};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{fmt, str::FromStr};

const MATRIX_MARKET_HEADER: &str = "%%MatrixMarket matrix coordinate real general";
const CELL_SIZE: usize = 8 + 8 + 8;
const TILE_HEADER_SIZE: usize = 8 + 8 + 4;

/// Layout of a persisted matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    TextCell,
    MatrixMarket,
    BinaryCell,
    BinaryBlock,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextCell => "textcell",
            Self::MatrixMarket => "mm",
            Self::BinaryCell => "binarycell",
            Self::BinaryBlock => "binaryblock",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::BinaryCell | Self::BinaryBlock)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "textcell" | "text" => Ok(Self::TextCell),
            "mm" | "matrixmarket" => Ok(Self::MatrixMarket),
            "binarycell" => Ok(Self::BinaryCell),
            "binaryblock" | "binary" => Ok(Self::BinaryBlock),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

/// Serialize `block` in `format`.
///
/// `shape` must describe the dimensions of `block`. Its blocking is only used by
/// [Format::BinaryBlock].
pub fn encode(
    block: &MatrixBlock,
    format: Format,
    shape: &Characteristics,
) -> Result<Bytes, Error> {
    check_dimensions(block, shape)?;
    let encoded = match format {
        Format::TextCell => encode_text(block, false),
        Format::MatrixMarket => encode_text(block, true),
        Format::BinaryCell => {
            let mut buf = BytesMut::with_capacity(block.non_zeros() as usize * CELL_SIZE);
            for (row, col, value) in block.iter_non_zeros() {
                buf.put_u64(row as u64 + 1);
                buf.put_u64(col as u64 + 1);
                buf.put_f64(value);
            }
            buf.freeze()
        }
        Format::BinaryBlock => encode_blocks(block, shape)?,
    };
    Ok(encoded)
}

/// Deserialize a matrix stored in `format`.
///
/// `shape` provides the expected dimensions (and blocking for [Format::BinaryBlock]). The
/// `sparsity` hint selects the initial representation: blocks expected to be sparser than
/// [SPARSITY_TURN_POINT] are allocated sparse.
pub fn decode(
    buf: Bytes,
    format: Format,
    shape: &Characteristics,
    sparsity: f64,
) -> Result<MatrixBlock, Error> {
    let rows = to_usize(shape.rows)?;
    let cols = to_usize(shape.cols)?;
    let sparse = cols > 1 && sparsity < SPARSITY_TURN_POINT;
    let mut block = MatrixBlock::new(rows, cols, sparse);
    match format {
        Format::TextCell | Format::MatrixMarket => {
            let text = std::str::from_utf8(&buf)
                .map_err(|_| Error::Malformed("text is not valid UTF-8".into()))?;
            decode_text(&mut block, text, format == Format::MatrixMarket)?;
        }
        Format::BinaryCell => {
            if buf.len() % CELL_SIZE != 0 {
                return Err(Error::Malformed(format!(
                    "binary cell length not a multiple of {CELL_SIZE}: {}",
                    buf.len()
                )));
            }
            let mut buf = buf;
            while buf.has_remaining() {
                let row = buf.get_u64();
                let col = buf.get_u64();
                let value = buf.get_f64();
                set_cell(&mut block, row, col, value)?;
            }
        }
        Format::BinaryBlock => decode_blocks(&mut block, buf, shape)?,
    }
    Ok(block)
}

fn check_dimensions(block: &MatrixBlock, shape: &Characteristics) -> Result<(), Error> {
    if block.rows() as u64 != shape.rows || block.cols() as u64 != shape.cols {
        return Err(Error::InvalidDimensions {
            expected_rows: shape.rows,
            expected_cols: shape.cols,
            rows: block.rows() as u64,
            cols: block.cols() as u64,
        });
    }
    Ok(())
}

fn to_usize(value: u64) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| Error::Malformed(format!("dimension too large: {value}")))
}

/// Set a 1-based cell, validating it against the block bounds.
fn set_cell(block: &mut MatrixBlock, row: u64, col: u64, value: f64) -> Result<(), Error> {
    if row == 0 || col == 0 || row > block.rows() as u64 || col > block.cols() as u64 {
        return Err(Error::OutOfBounds {
            row,
            col,
            rows: block.rows() as u64,
            cols: block.cols() as u64,
        });
    }
    block.set(row as usize - 1, col as usize - 1, value);
    Ok(())
}

fn encode_text(block: &MatrixBlock, matrix_market: bool) -> Bytes {
    let mut out = String::new();
    if matrix_market {
        out.push_str(MATRIX_MARKET_HEADER);
        out.push('\n');
        out.push_str(&format!(
            "{} {} {}\n",
            block.rows(),
            block.cols(),
            block.non_zeros()
        ));
    }
    for (row, col, value) in block.iter_non_zeros() {
        out.push_str(&format!("{} {} {}\n", row + 1, col + 1, value));
    }
    Bytes::from(out)
}

fn decode_text(block: &mut MatrixBlock, text: &str, matrix_market: bool) -> Result<(), Error> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    if matrix_market {
        match lines.next() {
            Some(header) if header.starts_with("%%MatrixMarket") => {}
            _ => return Err(Error::Malformed("missing matrix market header".into())),
        }
        let size = lines
            .by_ref()
            .find(|line| !line.starts_with('%'))
            .ok_or_else(|| Error::Malformed("missing matrix market size line".into()))?;
        let mut fields = size.split_whitespace();
        let rows = parse_index(fields.next(), size)?;
        let cols = parse_index(fields.next(), size)?;
        if rows != block.rows() as u64 || cols != block.cols() as u64 {
            return Err(Error::InvalidDimensions {
                expected_rows: block.rows() as u64,
                expected_cols: block.cols() as u64,
                rows,
                cols,
            });
        }
    }
    for line in lines {
        if line.starts_with('%') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let row = parse_index(fields.next(), line)?;
        let col = parse_index(fields.next(), line)?;
        let value = fields
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| Error::Malformed(format!("invalid cell: {line}")))?;
        set_cell(block, row, col, value)?;
    }
    Ok(())
}

fn parse_index(field: Option<&str>, line: &str) -> Result<u64, Error> {
    field
        .and_then(|f| f.parse::<u64>().ok())
        .ok_or_else(|| Error::Malformed(format!("invalid cell: {line}")))
}

fn encode_blocks(block: &MatrixBlock, shape: &Characteristics) -> Result<Bytes, Error> {
    let (brlen, bclen) = block_size(shape)?;
    let mut buf = BytesMut::new();
    for (block_row, row) in (0..block.rows()).step_by(brlen).enumerate() {
        for (block_col, col) in (0..block.cols()).step_by(bclen).enumerate() {
            let tile = native::encode(&block.tile(row, col, brlen, bclen));
            buf.reserve(TILE_HEADER_SIZE + tile.len());
            buf.put_u64(block_row as u64 + 1);
            buf.put_u64(block_col as u64 + 1);
            buf.put_u32(tile.len() as u32);
            buf.put_slice(&tile);
        }
    }
    Ok(buf.freeze())
}

fn decode_blocks(
    block: &mut MatrixBlock,
    mut buf: Bytes,
    shape: &Characteristics,
) -> Result<(), Error> {
    let (brlen, bclen) = block_size(shape)?;
    while buf.has_remaining() {
        if buf.remaining() < TILE_HEADER_SIZE {
            return Err(Error::Malformed("truncated tile header".into()));
        }
        let block_row = buf.get_u64();
        let block_col = buf.get_u64();
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(Error::Malformed("truncated tile".into()));
        }
        let tile = native::decode(&buf.split_to(len))?;
        if block_row == 0 || block_col == 0 {
            return Err(Error::Malformed("tile indices are 1-based".into()));
        }
        let row = to_usize(block_row - 1)?.saturating_mul(brlen);
        let col = to_usize(block_col - 1)?.saturating_mul(bclen);
        if tile.rows() > brlen || tile.cols() > bclen || !block.paste(&tile, row, col) {
            return Err(Error::OutOfBounds {
                row: row as u64 + tile.rows() as u64,
                col: col as u64 + tile.cols() as u64,
                rows: block.rows() as u64,
                cols: block.cols() as u64,
            });
        }
    }
    Ok(())
}

fn block_size(shape: &Characteristics) -> Result<(usize, usize), Error> {
    if shape.rows_per_block == 0 || shape.cols_per_block == 0 {
        return Err(Error::InvalidBlockSize(
            shape.rows_per_block,
            shape.cols_per_block,
        ));
    }
    Ok((shape.rows_per_block as usize, shape.cols_per_block as usize))
}
