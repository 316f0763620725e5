//! Deterministic file segmentation.
//!
//! Splits a file into fixed-size block metadata, in file order. Segmentation
//! depends only on the file length and block size, never on read timing or
//! buffering.

use std::fs::File;
use std::num::NonZeroU64;
use std::path::Path;

use crate::errors::{EggError, EggResult};

/// Default block size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Offset and size of one block within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub offset: u64,
    pub size: u64,
}

/// Segment a file into [`DEFAULT_CHUNK_SIZE`] blocks.
pub fn chunk_file(path: &Path) -> EggResult<Vec<ChunkInfo>> {
    chunk_file_with(path, NonZeroU64::new(DEFAULT_CHUNK_SIZE).expect("default chunk size is non-zero"))
}

/// Segment a file into `chunk_size` blocks; the final block may be short.
pub fn chunk_file_with(path: &Path, chunk_size: NonZeroU64) -> EggResult<Vec<ChunkInfo>> {
    let file = File::open(path).map_err(|e| EggError::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| EggError::io(path, e))?
        .len();

    let chunk_size = chunk_size.get();
    let mut chunks = Vec::with_capacity(len.div_ceil(chunk_size) as usize);
    let mut offset = 0;
    while offset < len {
        let size = chunk_size.min(len - offset);
        chunks.push(ChunkInfo { offset, size });
        offset += size;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunks_of(len: usize, chunk_size: u64) -> Vec<ChunkInfo> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![0_u8; len]).unwrap();
        chunk_file_with(&path, NonZeroU64::new(chunk_size).unwrap()).unwrap()
    }

    #[test]
    fn exact_multiple() {
        let chunks = chunks_of(8, 4);
        assert_eq!(
            chunks,
            vec![
                ChunkInfo { offset: 0, size: 4 },
                ChunkInfo { offset: 4, size: 4 },
            ]
        );
    }

    #[test]
    fn trailing_short_chunk() {
        let chunks = chunks_of(10, 4);
        assert_eq!(chunks.last(), Some(&ChunkInfo { offset: 8, size: 2 }));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn empty_file_has_no_chunks() {
        assert!(chunks_of(0, 4).is_empty());
    }

    #[test]
    fn missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = chunk_file(&dir.path().join("absent.bin")).unwrap_err();
        assert_eq!(err.reason_code(), "E_IO");
    }
}
