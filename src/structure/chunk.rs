use crate::utils::util::Result;
use std::{fs, path::PathBuf};

/// Groups `paths` by on-disk size. A chunk closes once its size exceeds
/// `memory_limit` and it holds at least two files; the last chunk may hold one.
pub fn chunk_by_memory(paths: &[PathBuf], memory_limit: u64) -> Result<Vec<Vec<PathBuf>>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0u64;
    for path in paths {
        let size = fs::metadata(path)
            .map_err(|error| {
                crate::varhive_error!("Failed to stat shard {}: {}", path.display(), error)
            })?
            .len();
        current.push(path.clone());
        current_size = current_size.saturating_add(size);
        if current_size > memory_limit && current.len() > 1 {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}
