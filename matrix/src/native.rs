//! Encode a [MatrixBlock] exactly as it is laid out in memory.
//!
//! # Format
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 |  ...  |15 |  ...  |23 |  ...  |30 |  ...  |   |   |   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |     Magic     |Version| L |  Rows (u64)   |  Cols (u64)   |  NNZ (u64)  |...| CRC32 |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//!
//! L = Layout (0 = dense, 1 = sparse)
//! ... = Values (dense: rows * cols f64; sparse: NNZ * (row u64, col u64, value f64))
//! ```
//!
//! _The trailing CRC32 covers every preceding byte so that a torn or corrupted eviction file is
//! detected before any of it is trusted._

use crate::{Error, MatrixBlock};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const MAGIC: [u8; 4] = *b"TSMB";
const VERSION: u16 = 0;
const HEADER_SIZE: usize = 4 + 2 + 1 + 8 + 8 + 8;
const CHECKSUM_SIZE: usize = 4;
const SPARSE_ENTRY_SIZE: usize = 8 + 8 + 8;

const DENSE: u8 = 0;
const SPARSE: u8 = 1;

/// Number of bytes [encode] produces for `block`.
pub fn encode_size(block: &MatrixBlock) -> usize {
    let values = if block.is_sparse() {
        block.non_zeros() as usize * SPARSE_ENTRY_SIZE
    } else {
        block.cells() as usize * 8
    };
    HEADER_SIZE + values + CHECKSUM_SIZE
}

/// Encode `block` into a checksummed buffer.
pub fn encode(block: &MatrixBlock) -> Bytes {
    let mut buf = BytesMut::with_capacity(encode_size(block));
    buf.put_slice(&MAGIC);
    buf.put_u16(VERSION);
    buf.put_u8(if block.is_sparse() { SPARSE } else { DENSE });
    buf.put_u64(block.rows() as u64);
    buf.put_u64(block.cols() as u64);
    buf.put_u64(block.non_zeros());
    if block.is_sparse() {
        for (row, col, value) in block.iter_non_zeros() {
            buf.put_u64(row as u64);
            buf.put_u64(col as u64);
            buf.put_f64(value);
        }
    } else {
        for row in 0..block.rows() {
            for col in 0..block.cols() {
                buf.put_f64(block.get(row, col));
            }
        }
    }
    let checksum = crc32fast::hash(&buf);
    buf.put_u32(checksum);
    buf.freeze()
}

/// Decode a buffer produced by [encode].
pub fn decode(raw: &[u8]) -> Result<MatrixBlock, Error> {
    if raw.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(Error::Malformed(format!("buffer too short: {}", raw.len())));
    }

    // Verify integrity
    let (body, checksum) = raw.split_at(raw.len() - CHECKSUM_SIZE);
    let stored = u32::from_be_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(Error::ChecksumMismatch { stored, computed });
    }

    // Parse header
    let mut buf = body;
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(Error::Malformed("invalid magic".into()));
    }
    let version = buf.get_u16();
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let layout = buf.get_u8();
    let rows = to_usize(buf.get_u64())?;
    let cols = to_usize(buf.get_u64())?;
    let non_zeros = buf.get_u64();

    // Parse values
    let block = match layout {
        DENSE => {
            let cells = rows
                .checked_mul(cols)
                .ok_or_else(|| Error::Malformed("dimensions overflow".into()))?;
            if buf.remaining() != cells.saturating_mul(8) {
                return Err(Error::Malformed("dense length mismatch".into()));
            }
            let mut values = Vec::with_capacity(cells);
            for _ in 0..cells {
                values.push(buf.get_f64());
            }
            MatrixBlock::dense(rows, cols, values)
                .ok_or_else(|| Error::Malformed("dense length mismatch".into()))?
        }
        SPARSE => {
            if buf.remaining() as u64 != non_zeros.saturating_mul(SPARSE_ENTRY_SIZE as u64) {
                return Err(Error::Malformed("sparse length mismatch".into()));
            }
            let mut block = MatrixBlock::new(rows, cols, true);
            while buf.has_remaining() {
                let row = buf.get_u64();
                let col = buf.get_u64();
                let value = buf.get_f64();
                if row >= rows as u64 || col >= cols as u64 {
                    return Err(Error::OutOfBounds {
                        row,
                        col,
                        rows: rows as u64,
                        cols: cols as u64,
                    });
                }
                block.set(row as usize, col as usize, value);
            }
            block
        }
        other => return Err(Error::Malformed(format!("unknown layout: {other}"))),
    };
    if block.non_zeros() != non_zeros {
        return Err(Error::Malformed(format!(
            "non-zero count mismatch: stored={non_zeros}, found={}",
            block.non_zeros()
        )));
    }
    Ok(block)
}

fn to_usize(value: u64) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| Error::Malformed(format!("dimension too large: {value}")))
}
