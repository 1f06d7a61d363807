//! Inventory helpers: checksum and directory listing for operators.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::domain::artifact::{EntryKind, ListingEntry};
use crate::domain::errors::DumpError;

const CHUNK: usize = 64 * 1024;

/// Hex SHA-256 of a file, read in chunks (dumps can be many GiB).
pub async fn sha256_file(path: &Path) -> Result<String, DumpError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DumpError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| DumpError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Entries of `dir`, sorted by name. Symlinks are reported as such, not followed.
pub async fn list_dir(dir: &Path) -> Result<Vec<ListingEntry>, DumpError> {
    let ctx = || format!("listing {}", dir.display());
    let mut entries = Vec::new();
    let mut rd = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DumpError::io(ctx(), e))?;
    while let Some(entry) = rd.next_entry().await.map_err(|e| DumpError::io(ctx(), e))? {
        let meta = entry.metadata().await.map_err(|e| DumpError::io(ctx(), e))?;
        let kind = if meta.file_type().is_symlink() {
            EntryKind::Symlink
        } else if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            size_bytes: meta.len(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
