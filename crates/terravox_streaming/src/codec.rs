//! # Chunk Column Codec
//!
//! Compressed chunk columns as delivered by the network collaborator.
//!
//! ## Format
//!
//! LZ4 block with the uncompressed size prepended. The payload is:
//!
//! ```text
//! u32  stub count
//! per stub:
//!   i32  slab index (y)
//!   u8   1 if voxels follow, 0 if the slab must be assembled locally
//!   u32  voxel count        (only when voxels follow)
//!   u16  voxels[count]      (chunk ordering)
//! ```
//!
//! All integers are little-endian.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use thiserror::Error;

/// Largest voxel count accepted for one stub (a padded 256³ chunk).
const MAX_STUB_VOXELS: usize = 258 * 258 * 258;

/// One slab of a decompressed chunk column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkStub {
    /// Vertical slab index.
    pub y: i32,
    /// Server-provided voxels, `None` to assemble locally.
    pub voxels: Option<Vec<u16>>,
}

impl ChunkStub {
    /// Stub without voxel data.
    #[must_use]
    pub const fn local(y: i32) -> Self {
        Self { y, voxels: None }
    }

    /// Stub carrying voxel data.
    #[must_use]
    pub const fn with_voxels(y: i32, voxels: Vec<u16>) -> Self {
        Self {
            y,
            voxels: Some(voxels),
        }
    }
}

/// Errors raised while decoding a chunk column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The LZ4 block is corrupt.
    #[error("lz4: {0}")]
    Lz4(String),

    /// The payload ended early.
    #[error("payload truncated at byte {0}")]
    Truncated(usize),

    /// A stub declares more voxels than any chunk can hold.
    #[error("stub declares {0} voxels")]
    Oversized(usize),

    /// Unknown voxel presence flag.
    #[error("invalid voxel flag {0}")]
    InvalidFlag(u8),

    /// Bytes left over after the last stub.
    #[error("{0} trailing bytes")]
    Trailing(usize),
}

/// Decompresses chunk columns.
///
/// Stands in for the network collaborator's decompression routine; the
/// coordinator only ever sees this trait.
pub trait ColumnDecoder: Send + Sync {
    /// Decodes one compressed column into its stubs.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` if the bytes are not a valid column.
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<ChunkStub>, CodecError>;
}

/// LZ4 chunk column codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lz4ColumnCodec;

impl Lz4ColumnCodec {
    /// Encodes and compresses a column.
    #[must_use]
    pub fn compress(&self, stubs: &[ChunkStub]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(stubs.len() as u32).to_le_bytes());
        for stub in stubs {
            raw.extend_from_slice(&stub.y.to_le_bytes());
            match &stub.voxels {
                Some(voxels) => {
                    raw.push(1);
                    raw.extend_from_slice(&(voxels.len() as u32).to_le_bytes());
                    raw.reserve(voxels.len() * 2);
                    for voxel in voxels {
                        raw.extend_from_slice(&voxel.to_le_bytes());
                    }
                }
                None => raw.push(0),
            }
        }
        compress_prepend_size(&raw)
    }
}

/// Cursor over a decompressed payload.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::Truncated(self.pos))?;
        let slice = self.bytes.get(self.pos..end).ok_or(CodecError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        self.array().map(i32::from_le_bytes)
    }
}

impl ColumnDecoder for Lz4ColumnCodec {
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<ChunkStub>, CodecError> {
        let raw = decompress_size_prepended(bytes).map_err(|e| CodecError::Lz4(e.to_string()))?;
        let mut reader = Reader {
            bytes: &raw,
            pos: 0,
        };

        let count = reader.u32()? as usize;
        // every stub takes at least five bytes
        if count > raw.len() / 5 {
            return Err(CodecError::Truncated(reader.pos));
        }

        let mut stubs = Vec::with_capacity(count);
        for _ in 0..count {
            let y = reader.i32()?;
            let stub = match reader.u8()? {
                0 => ChunkStub::local(y),
                1 => {
                    let len = reader.u32()? as usize;
                    if len > MAX_STUB_VOXELS {
                        return Err(CodecError::Oversized(len));
                    }
                    let voxels = reader
                        .take(len * 2)?
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect();
                    ChunkStub::with_voxels(y, voxels)
                }
                flag => return Err(CodecError::InvalidFlag(flag)),
            };
            stubs.push(stub);
        }

        let trailing = raw.len() - reader.pos;
        if trailing != 0 {
            return Err(CodecError::Trailing(trailing));
        }
        Ok(stubs)
    }
}
