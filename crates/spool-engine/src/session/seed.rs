//! Builds in-memory torrents from local files for loopback serving.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use sha1::{Digest, Sha1};
use spool_torrent_core::{InfoHash, TorrentLayout};
use tracing::info;
use walkdir::WalkDir;

use super::memory::MemoryTorrent;
use crate::error::EngineError;

/// Load `root` (a file or a directory tree) as one torrent.
///
/// Files are laid out in sorted path order. The info-hash is the SHA-1 of the
/// name, piece length and file list, so reloading unchanged content yields the
/// same identifier.
///
/// # Errors
///
/// Returns an error if the tree cannot be read, holds no files, or does not
/// form a valid layout.
pub fn load_path(root: &Path, piece_length: u32) -> Result<MemoryTorrent, EngineError> {
    let name = root
        .file_name()
        .map_or_else(|| "seed".to_string(), |name| name.to_string_lossy().into_owned());

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| EngineError::SeedWalk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mut torrent_path = name.clone();
        for component in relative.components() {
            torrent_path.push('/');
            torrent_path.push_str(&component.as_os_str().to_string_lossy());
        }
        files.push((torrent_path, entry.into_path()));
    }
    if files.is_empty() {
        return Err(EngineError::EmptySeed {
            root: root.to_path_buf(),
        });
    }

    let mut content = BytesMut::new();
    let mut entries = Vec::with_capacity(files.len());
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    hasher.update(piece_length.to_be_bytes());
    for (torrent_path, disk_path) in files {
        let data = std::fs::read(&disk_path).map_err(|source| EngineError::SeedIo {
            operation: "seed.read",
            path: disk_path.clone(),
            source,
        })?;
        hasher.update(torrent_path.as_bytes());
        hasher.update((data.len() as u64).to_be_bytes());
        entries.push((torrent_path, data.len() as u64));
        content.extend_from_slice(&data);
    }
    let mut raw = [0_u8; InfoHash::LEN];
    raw.copy_from_slice(&hasher.finalize());
    let info_hash = InfoHash::new(raw);

    let layout = TorrentLayout::new(name, piece_length, entries).map_err(|source| {
        EngineError::InvalidSeed {
            root: root.to_path_buf(),
            source,
        }
    })?;
    let torrent = MemoryTorrent::new(info_hash, layout, content.freeze()).map_err(|source| {
        EngineError::InvalidSeed {
            root: root.to_path_buf(),
            source,
        }
    })?;
    info!(
        torrent = %torrent.info_hash,
        files = torrent.layout.files.len(),
        bytes = torrent.layout.total_size,
        "seeded torrent from local content"
    );
    Ok(torrent)
}
