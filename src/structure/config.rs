use super::dedup::DedupKey;
use crate::{constants::MAX_PARTITION_BITS, error::VarhiveError, utils::util::Result};
use std::path::PathBuf;

fn require_nonzero(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        return Err(VarhiveError::InvalidConfig(format!("{name} must be >= 1")));
    }
    Ok(())
}

fn workers(threads: usize, engine_threads: usize) -> usize {
    (threads / engine_threads).max(1)
}

#[derive(Clone, Debug)]
pub struct MergeConfig {
    pub memory_limit: u64,
    pub threads: usize,
    pub engine_threads: usize,
    pub append: bool,
    pub tmp_dir: Option<PathBuf>,
}

impl MergeConfig {
    pub fn new(
        memory_limit: u64,
        threads: usize,
        engine_threads: usize,
        append: bool,
        tmp_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if memory_limit == 0 {
            return Err(VarhiveError::InvalidConfig(
                "memory-limit must be >= 1".to_string(),
            ));
        }
        require_nonzero(threads, "threads")?;
        require_nonzero(engine_threads, "engine-threads")?;
        Ok(Self {
            memory_limit,
            threads,
            engine_threads,
            append,
            tmp_dir,
        })
    }

    pub fn workers(&self) -> usize {
        workers(self.threads, self.engine_threads)
    }

    pub fn worker_config(&self, key: DedupKey) -> WorkerConfig {
        WorkerConfig {
            engine_threads: self.engine_threads,
            key,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HiveConfig {
    pub threads: usize,
    pub merge_threads: usize,
    pub engine_threads: usize,
    pub file_per_thread: usize,
    pub bits: u8,
    pub append: bool,
    pub tmp_dir: Option<PathBuf>,
}

impl HiveConfig {
    pub fn new(
        threads: usize,
        merge_threads: usize,
        engine_threads: usize,
        file_per_thread: usize,
        bits: u8,
        append: bool,
        tmp_dir: Option<PathBuf>,
    ) -> Result<Self> {
        require_nonzero(threads, "threads")?;
        require_nonzero(merge_threads, "merge-threads")?;
        require_nonzero(engine_threads, "engine-threads")?;
        require_nonzero(file_per_thread, "file-per-thread")?;
        if !(1..=MAX_PARTITION_BITS).contains(&bits) {
            return Err(VarhiveError::InvalidConfig(format!(
                "bits ({bits}) must be between 1 and {MAX_PARTITION_BITS}"
            )));
        }
        Ok(Self {
            threads,
            merge_threads,
            engine_threads,
            file_per_thread,
            bits,
            append,
            tmp_dir,
        })
    }

    /// Workers of the bucketing wave.
    pub fn workers(&self) -> usize {
        workers(self.threads, self.engine_threads)
    }

    /// Workers of the per-partition merge wave.
    pub fn merge_workers(&self) -> usize {
        workers(self.merge_threads, self.engine_threads)
    }

    pub fn partitions(&self) -> u32 {
        1u32 << self.bits
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            engine_threads: self.engine_threads,
            key: DedupKey::Genotype,
        }
    }
}

/// Everything a worker task needs besides its file paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    pub engine_threads: usize,
    pub key: DedupKey,
}
