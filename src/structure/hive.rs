//! Hive partitioning of genotype shards into `id_part=<p>/0.parquet`.

use super::{
    config::{HiveConfig, WorkerConfig},
    dedup::dedup_batch,
    pool::WorkerPool,
};
use crate::{
    constants::{ID_COLUMN, PARTITION_COLUMN, PARTITION_FILE_NAME, SHARD_EXTENSION},
    core::variant_id::partition,
    error::VarhiveError,
    io::{
        shard::{
            ensure_no_nulls, missing_columns, read_shards, shard_file_name, shard_stem,
            u64_column, write_shard,
        },
        staging::{staging_root, Staging, STAGING_PREFIX},
    },
    utils::util::{stable_hash64, Result},
};
use arrow::{array::UInt32Array, compute::take_record_batch};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HiveSummary {
    pub input_files: usize,
    /// Partition files written by this run.
    pub outputs: Vec<PathBuf>,
    pub rows: u64,
}

pub fn partition_dir_name(partition: u32) -> String {
    format!("{PARTITION_COLUMN}={partition}")
}

pub(crate) fn parse_partition_dir(name: &str) -> Option<u32> {
    name.strip_prefix(PARTITION_COLUMN)?
        .strip_prefix('=')?
        .parse()
        .ok()
}

/// Shard name for one bucketing batch, unique within a run.
fn batch_file_name(batch_index: usize, inputs: &[PathBuf]) -> String {
    let stems = inputs
        .iter()
        .map(|path| shard_stem(path))
        .collect::<Vec<_>>()
        .join("\0");
    shard_file_name(&format!(
        "batch-{batch_index}-{:016x}",
        stable_hash64(stems.as_bytes())
    ))
}

struct BucketTask {
    inputs: Vec<PathBuf>,
    file_name: String,
}

/// Splits a batch of genotype shards by id partition, one file per non-empty partition.
fn bucket_batch(
    task: &BucketTask,
    bucket_dir: &Path,
    bits: u8,
    worker: &WorkerConfig,
) -> Result<Vec<(u32, PathBuf)>> {
    let shard = read_shards(&task.inputs, worker.engine_threads)?;
    let missing = missing_columns(&shard.schema, worker.key.columns());
    if !missing.is_empty() {
        return Err(VarhiveError::NoGenotypeData {
            path: task.inputs[0].clone(),
            missing,
        });
    }
    let batch = shard.concat()?;
    let ids = u64_column(&batch, ID_COLUMN)?;
    ensure_no_nulls(ids, ID_COLUMN)?;

    let mut rows_by_partition: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (row, id) in ids.values().iter().enumerate() {
        rows_by_partition
            .entry(partition(*id, bits))
            .or_default()
            .push(u32::try_from(row)?);
    }

    let mut written = Vec::with_capacity(rows_by_partition.len());
    for (partition, rows) in rows_by_partition {
        let path = bucket_dir
            .join(partition_dir_name(partition))
            .join(&task.file_name);
        let piece = take_record_batch(&batch, &UInt32Array::from(rows))?;
        write_shard(&path, &shard.schema, &[piece])?;
        written.push((partition, path));
    }
    log::debug!(
        "Bucketed {} shards into {} partitions as {}",
        task.inputs.len(),
        written.len(),
        task.file_name
    );
    Ok(written)
}

struct PartitionTask {
    inputs: Vec<PathBuf>,
    output: PathBuf,
}

/// Folds one partition's bucket files (and any previous content) into a single file.
fn merge_partition(task: &PartitionTask, bucket_dir: &Path, worker: &WorkerConfig) -> Result<u64> {
    let shard = read_shards(&task.inputs, worker.engine_threads)?;
    let merged = shard.concat()?;
    let deduped = dedup_batch(&merged, worker.key)?;
    let rows = write_shard(&task.output, &shard.schema, &[deduped])?;
    for input in task.inputs.iter().filter(|input| input.starts_with(bucket_dir)) {
        if let Err(error) = fs::remove_file(input) {
            log::warn!("Failed to remove bucket file {}: {}", input.display(), error);
        }
    }
    Ok(rows)
}

/// Distributes genotype shards into `<prefix>/id_part=<p>/0.parquet`, one
/// deduplicated file per partition.
pub fn hive(inputs: &[PathBuf], prefix: &Path, config: &HiveConfig) -> Result<HiveSummary> {
    if inputs.is_empty() {
        log::info!("No genotype shards, nothing to partition into {}", prefix.display());
        return Ok(HiveSummary::default());
    }
    let mut staging = Staging::new(&staging_root(prefix, config.tmp_dir.as_deref()))?;
    let worker = config.worker_config();

    let bucket_dir = staging.subdir("bucket")?;
    for partition in 0..config.partitions() {
        fs::create_dir_all(bucket_dir.join(partition_dir_name(partition)))?;
    }
    let bucket_tasks: Vec<BucketTask> = inputs
        .chunks(config.file_per_thread)
        .enumerate()
        .map(|(batch_index, batch)| BucketTask {
            inputs: batch.to_vec(),
            file_name: batch_file_name(batch_index, batch),
        })
        .collect();
    log::info!(
        "Bucketing {} shards in {} batches over {} partitions",
        inputs.len(),
        bucket_tasks.len(),
        config.partitions()
    );
    let bucket_pool = WorkerPool::new("bucket", config.workers(), config.engine_threads)?;
    let reports = bucket_pool.run_all(bucket_tasks, |task| {
        bucket_batch(&task, &bucket_dir, config.bits, &worker)
    })?;
    drop(bucket_pool);

    let mut files_by_partition: BTreeMap<u32, Vec<PathBuf>> = BTreeMap::new();
    for (partition, path) in reports.into_iter().flatten() {
        files_by_partition.entry(partition).or_default().push(path);
    }

    let merged_dir = staging.subdir("merged")?;
    let mut partition_tasks = Vec::with_capacity(files_by_partition.len());
    let mut destinations = Vec::with_capacity(files_by_partition.len());
    for (partition, mut files) in files_by_partition {
        let dir_name = partition_dir_name(partition);
        let destination = prefix.join(&dir_name).join(PARTITION_FILE_NAME);
        if config.append && destination.exists() {
            files.push(staging.backup(&destination)?);
        }
        let output = merged_dir.join(shard_file_name(&dir_name));
        partition_tasks.push(PartitionTask {
            inputs: files,
            output: output.clone(),
        });
        destinations.push((output, destination));
    }

    log::info!("Merging {} partitions", partition_tasks.len());
    let merge_pool = WorkerPool::new("partition", config.merge_workers(), config.engine_threads)?;
    let rows = merge_pool.run_all(partition_tasks, |task| {
        merge_partition(&task, &bucket_dir, &worker)
    })?;

    for (staged, destination) in destinations {
        staging.stage(staged, destination);
    }
    let outputs = staging.commit()?;
    let summary = HiveSummary {
        input_files: inputs.len(),
        outputs,
        rows: rows.iter().sum(),
    };
    log::info!(
        "Wrote {} partition files under {} ({} rows)",
        summary.outputs.len(),
        prefix.display(),
        summary.rows
    );
    Ok(summary)
}

fn is_data_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    path.is_file()
        && !name.starts_with('.')
        && path.extension().is_some_and(|ext| ext == SHARD_EXTENSION)
}

/// Partitions under `prefix` holding more than one data file. Staging
/// directories and backups are ignored.
pub fn check_partition_tree(prefix: &Path, bits: u8) -> Result<Vec<u32>> {
    let mut offenders = Vec::new();
    if !prefix.exists() {
        return Ok(offenders);
    }
    let partitions = 1u64 << bits;
    for entry in fs::read_dir(prefix)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(STAGING_PREFIX) || !entry.path().is_dir() {
            continue;
        }
        let Some(partition) = parse_partition_dir(&name) else {
            continue;
        };
        if u64::from(partition) >= partitions {
            log::warn!("Partition directory {name} is out of range for {bits} bits");
        }
        let mut data_files = 0;
        for file in fs::read_dir(entry.path())? {
            if is_data_file(&file?.path()) {
                data_files += 1;
            }
        }
        if data_files > 1 {
            offenders.push(partition);
        }
    }
    offenders.sort_unstable();
    Ok(offenders)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_dir_names_round_trip() {
        assert_eq!(partition_dir_name(9), "id_part=9");
        assert_eq!(parse_partition_dir("id_part=9"), Some(9));
        assert_eq!(parse_partition_dir("id_part9"), None);
        assert_eq!(parse_partition_dir("other=1"), None);
    }

    #[test]
    fn batch_file_names_depend_on_inputs() {
        let a = batch_file_name(0, &[PathBuf::from("/x/a.parquet"), PathBuf::from("/x/b.parquet")]);
        let b = batch_file_name(0, &[PathBuf::from("/y/a.parquet"), PathBuf::from("/y/b.parquet")]);
        let c = batch_file_name(0, &[PathBuf::from("/x/c.parquet")]);
        let d = batch_file_name(1, &[PathBuf::from("/x/c.parquet")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(c, d);
        assert!(a.starts_with("batch-0-") && a.ends_with(".parquet"));
    }

    #[test]
    fn data_files_exclude_backups_and_hidden() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let dir = temp_dir.path();
        for name in ["0.parquet", "0.parquet.bak", ".hidden.parquet", "notes.txt"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        assert!(is_data_file(&dir.join("0.parquet")));
        assert!(!is_data_file(&dir.join("0.parquet.bak")));
        assert!(!is_data_file(&dir.join(".hidden.parquet")));
        assert!(!is_data_file(&dir.join("notes.txt")));
    }
}
