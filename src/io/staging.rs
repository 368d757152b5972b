//! Scratch space for one run and the final move of its outputs into place.
//!
//! Nothing under a destination is modified until [`Staging::commit`] is called,
//! and a dropped [`Staging`] removes every intermediate file it holds.

use crate::{constants::BACKUP_SUFFIX, utils::util::Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const STAGING_PREFIX: &str = ".varhive-staging-";

#[derive(Debug)]
pub struct Staging {
    temp_dir: tempfile::TempDir,
    commits: Vec<(PathBuf, PathBuf)>,
    backups: usize,
}

impl Staging {
    /// Scratch directory inside `root`. Pick a root on the destination's
    /// filesystem (see [`staging_root`]) so the final rename is atomic.
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|error| {
            crate::varhive_error!(
                "Failed to create staging root {}: {}",
                root.display(),
                error
            )
        })?;
        let temp_dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|error| {
                crate::varhive_error!(
                    "Failed to create staging directory under {}: {}",
                    root.display(),
                    error
                )
            })?;
        log::debug!("Staging directory: {}", temp_dir.path().display());
        Ok(Self {
            temp_dir,
            commits: Vec::new(),
            backups: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Copies an existing destination into the scratch directory before it is
    /// merged into, and returns the copy to read from.
    pub fn backup(&mut self, destination: &Path) -> Result<PathBuf> {
        let backup = self
            .subdir("backup")?
            .join(backup_file_name(self.backups, destination));
        fs::copy(destination, &backup).map_err(|error| {
            crate::varhive_error!(
                "Failed to back up {} to {}: {}",
                destination.display(),
                backup.display(),
                error
            )
        })?;
        log::debug!(
            "Backed up {} to {}",
            destination.display(),
            backup.display()
        );
        self.backups += 1;
        Ok(backup)
    }

    /// Schedules `staged` to replace `destination` on commit.
    pub fn stage(&mut self, staged: PathBuf, destination: PathBuf) {
        self.commits.push((staged, destination));
    }

    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut committed = Vec::with_capacity(self.commits.len());
        for (staged, destination) in &self.commits {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            move_file(staged, destination)?;
            log::debug!("Committed {}", destination.display());
            committed.push(destination.clone());
        }
        Ok(committed)
    }
}

/// `tmp_root` when configured, otherwise the directory holding `destination`.
pub fn staging_root(destination: &Path, tmp_root: Option<&Path>) -> PathBuf {
    match tmp_root {
        Some(root) => root.to_path_buf(),
        None => destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    }
}

/// `<index>-<file name>.bak`; every partition's file is named `0.parquet`.
fn backup_file_name(index: usize, destination: &Path) -> String {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("{index}-{name}.{BACKUP_SUFFIX}")
}

/// Atomic rename, or copy to a sibling then rename when `from` is on another filesystem.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let mut partial = to.as_os_str().to_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    fs::copy(from, &partial).map_err(|error| {
        crate::varhive_error!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            error
        )
    })?;
    fs::rename(&partial, to)?;
    fs::remove_file(from)?;
    Ok(())
}
