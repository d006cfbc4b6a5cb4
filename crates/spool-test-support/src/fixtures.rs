//! Deterministic torrent fixtures.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use spool_engine::MemoryTorrent;
use spool_torrent_core::{InfoHash, TorrentLayout};
use tempfile::TempDir;

/// Piece length used by most fixtures.
pub const PIECE_LENGTH: u32 = 16_384;

/// `len` bytes where byte `i` is a function of `i` and `seed` only, so any
/// slice identifies its own position.
#[must_use]
pub fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|index| {
            let mixed = (index as u64)
                .wrapping_mul(2_654_435_761)
                .rotate_left(7)
                ^ u64::from(seed);
            mixed.to_le_bytes()[0] ^ (index % 251) as u8
        })
        .collect()
}

/// Info-hash with every byte set to `seed`.
#[must_use]
pub const fn info_hash(seed: u8) -> InfoHash {
    InfoHash::new([seed; InfoHash::LEN])
}

/// Single-file torrent of `size` patterned bytes.
///
/// # Errors
///
/// Returns an error if the layout is rejected.
pub fn single_file(seed: u8, piece_length: u32, size: u64) -> Result<MemoryTorrent> {
    let name = format!("fixture-{seed}.bin");
    multi_file(seed, piece_length, &[(name.as_str(), size)])
}

/// Torrent with the given files laid out back to back.
///
/// # Errors
///
/// Returns an error if the layout is rejected.
pub fn multi_file(seed: u8, piece_length: u32, files: &[(&str, u64)]) -> Result<MemoryTorrent> {
    let layout = TorrentLayout::new(format!("fixture-{seed}"), piece_length, files.iter().copied())
        .context("invalid fixture layout")?;
    let total = usize::try_from(layout.total_size).context("fixture too large")?;
    let content = Bytes::from(patterned(total, seed));
    MemoryTorrent::new(info_hash(seed), layout, content).context("fixture content mismatch")
}

/// Bytes `[first, first + len)` of file `file_index` in `torrent`.
///
/// # Panics
///
/// Panics if the range is outside the file.
#[must_use]
pub fn file_slice(torrent: &MemoryTorrent, file_index: usize, first: u64, len: u64) -> Bytes {
    let file = &torrent.layout.files[file_index];
    assert!(first + len <= file.size, "slice outside file");
    let start = usize::try_from(file.offset + first).expect("fixture offset fits usize");
    let end = start + usize::try_from(len).expect("fixture length fits usize");
    torrent.content.slice(start..end)
}

/// Temporary directory holding patterned files at the given relative paths.
///
/// # Errors
///
/// Returns an error if the files cannot be written.
pub fn seed_dir(files: &[(&str, usize)]) -> Result<TempDir> {
    let dir = TempDir::new().context("failed to create seed directory")?;
    for (index, (path, size)) in files.iter().enumerate() {
        let target = dir.path().join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let seed = u8::try_from(index % 256).unwrap_or_default();
        write_file(&target, &patterned(*size, seed))?;
    }
    Ok(dir)
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}
