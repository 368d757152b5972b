//! External merge-dedup of variant shards: a reduction tree over
//! memory-sized chunks, optionally split by chromosome first.

use super::{
    chunk::chunk_by_memory,
    config::{MergeConfig, WorkerConfig},
    dedup::{dedup_batch, DedupKey},
    pool::WorkerPool,
};
use crate::{
    constants::CHR_COLUMN,
    io::{
        shard::{
            ensure_no_nulls, path_safe, read_shard, read_shards, shard_file_name, string_column,
            write_shard,
        },
        staging::{staging_root, Staging},
    },
    utils::util::Result,
};
use arrow::{array::UInt32Array, compute::take_record_batch};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Destination files written by this run.
    pub outputs: Vec<PathBuf>,
    /// Rows across all written destinations.
    pub rows: u64,
    /// Depth of the deepest reduction tree.
    pub levels: usize,
}

/// One destination file and the shards still to be folded into it.
#[derive(Debug)]
struct ReductionGroup {
    label: String,
    destination: PathBuf,
    files: Vec<PathBuf>,
    reduced: bool,
    rows: u64,
}

impl ReductionGroup {
    fn new(label: String, destination: PathBuf, files: Vec<PathBuf>) -> Self {
        Self {
            label,
            destination,
            files,
            reduced: false,
            rows: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.reduced && self.files.len() == 1
    }
}

struct ReductionTask {
    group: usize,
    inputs: Vec<PathBuf>,
    output: PathBuf,
}

/// Concatenates `inputs`, deduplicates on the worker's key and writes `output`.
/// Inputs living under `scratch` are intermediates and are removed once consumed.
fn reduce_chunk(
    inputs: &[PathBuf],
    output: &Path,
    scratch: &Path,
    worker: &WorkerConfig,
) -> Result<u64> {
    let shard = read_shards(inputs, worker.engine_threads)?;
    let merged = shard.concat()?;
    let deduped = dedup_batch(&merged, worker.key)?;
    let rows = write_shard(output, &shard.schema, &[deduped])?;
    log::debug!(
        "Reduced {} files ({} rows) to {} ({} rows)",
        inputs.len(),
        merged.num_rows(),
        output.display(),
        rows
    );
    for input in inputs.iter().filter(|input| input.starts_with(scratch)) {
        if let Err(error) = fs::remove_file(input) {
            log::warn!("Failed to remove intermediate {}: {}", input.display(), error);
        }
    }
    Ok(rows)
}

/// Runs reduction levels until every group is down to one deduplicated file.
/// All groups of a level share `pool`.
fn reduce_groups(
    groups: &mut [ReductionGroup],
    pool: &WorkerPool,
    worker: &WorkerConfig,
    memory_limit: u64,
    scratch: &Path,
) -> Result<usize> {
    let mut level = 0;
    while groups.iter().any(|group| !group.is_done()) {
        let mut tasks = Vec::new();
        for (index, group) in groups.iter_mut().enumerate() {
            if group.is_done() {
                continue;
            }
            let chunks = chunk_by_memory(&group.files, memory_limit)?;
            let level_dir = scratch
                .join("reduce")
                .join(path_safe(&group.label))
                .join(format!("level-{level}"));
            fs::create_dir_all(&level_dir)?;

            let chunk_count = chunks.len();
            let mut next_files = Vec::with_capacity(chunk_count);
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                if chunk.len() == 1 && chunk_count > 1 {
                    next_files.extend(chunk);
                    continue;
                }
                let output = level_dir.join(shard_file_name(&chunk_index.to_string()));
                next_files.push(output.clone());
                tasks.push(ReductionTask {
                    group: index,
                    inputs: chunk,
                    output,
                });
            }
            group.files = next_files;
            group.reduced = true;
            group.rows = 0;
        }

        log::debug!("Reduction level {level}: {} tasks", tasks.len());
        let task_groups: Vec<usize> = tasks.iter().map(|task| task.group).collect();
        let rows = pool.run_all(tasks, |task| {
            reduce_chunk(&task.inputs, &task.output, scratch, worker)
        })?;
        for (group, rows) in task_groups.into_iter().zip(rows) {
            groups[group].rows += rows;
        }
        level += 1;
    }
    Ok(level)
}

/// Reduces the groups, then moves every group's final file into place.
fn finish(
    mut groups: Vec<ReductionGroup>,
    mut staging: Staging,
    config: &MergeConfig,
    key: DedupKey,
    pool: &WorkerPool,
) -> Result<MergeSummary> {
    let worker = config.worker_config(key);
    let levels = reduce_groups(
        &mut groups,
        pool,
        &worker,
        config.memory_limit,
        staging.path(),
    )?;

    let mut rows = 0;
    for group in &mut groups {
        rows += group.rows;
        if let Some(staged) = group.files.pop() {
            staging.stage(staged, group.destination.clone());
        }
    }
    let outputs = staging.commit()?;
    Ok(MergeSummary {
        outputs,
        rows,
        levels,
    })
}

/// Adds a backup of an existing destination to `files` when appending.
fn append_existing(
    staging: &mut Staging,
    destination: &Path,
    files: &mut Vec<PathBuf>,
    append: bool,
) -> Result<()> {
    if !append {
        return Ok(());
    }
    if destination.exists() {
        files.push(staging.backup(destination)?);
    } else {
        log::warn!(
            "Append target {} does not exist, writing it fresh",
            destination.display()
        );
    }
    Ok(())
}

/// Merges `inputs` into the single deduplicated file `output`.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    key: DedupKey,
    config: &MergeConfig,
) -> Result<MergeSummary> {
    if inputs.is_empty() {
        log::info!("No input shards, nothing to merge into {}", output.display());
        return Ok(MergeSummary::default());
    }
    let mut staging = Staging::new(&staging_root(output, config.tmp_dir.as_deref()))?;
    let mut files = inputs.to_vec();
    append_existing(&mut staging, output, &mut files, config.append)?;

    let label = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    let groups = vec![ReductionGroup::new(label, output.to_path_buf(), files)];
    let pool = WorkerPool::new("merge", config.workers(), config.engine_threads)?;
    let summary = finish(groups, staging, config, key, &pool)?;
    log::info!(
        "Merged {} shards into {} ({} rows, {} levels)",
        inputs.len(),
        output.display(),
        summary.rows,
        summary.levels
    );
    Ok(summary)
}

/// Splits one shard into per-chromosome files under `split_dir`.
fn split_by_chromosome(
    input: &Path,
    input_index: usize,
    split_dir: &Path,
) -> Result<Vec<(String, PathBuf)>> {
    let shard = read_shard(input)?;
    let batch = shard.concat()?;
    let chrs = string_column(&batch, CHR_COLUMN)?;
    ensure_no_nulls(&chrs, CHR_COLUMN)?;

    let mut rows_by_chr: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        rows_by_chr
            .entry(chrs.value(row))
            .or_default()
            .push(u32::try_from(row)?);
    }

    let mut pieces = Vec::with_capacity(rows_by_chr.len());
    for (chr, rows) in rows_by_chr {
        let dir = split_dir.join(path_safe(chr));
        fs::create_dir_all(&dir)?;
        let path = dir.join(shard_file_name(&input_index.to_string()));
        let piece = take_record_batch(&batch, &UInt32Array::from(rows))?;
        write_shard(&path, &shard.schema, &[piece])?;
        pieces.push((chr.to_string(), path));
    }
    log::debug!(
        "Split {} into {} chromosomes",
        input.display(),
        pieces.len()
    );
    Ok(pieces)
}

/// Merges `inputs` into one deduplicated `<prefix>/<chr>.parquet` per chromosome.
pub fn merge_by_chromosome(
    inputs: &[PathBuf],
    prefix: &Path,
    key: DedupKey,
    config: &MergeConfig,
) -> Result<MergeSummary> {
    if inputs.is_empty() {
        log::info!("No input shards, nothing to merge into {}", prefix.display());
        return Ok(MergeSummary::default());
    }
    let mut staging = Staging::new(&staging_root(prefix, config.tmp_dir.as_deref()))?;
    let split_dir = staging.subdir("split")?;
    let pool = WorkerPool::new("merge", config.workers(), config.engine_threads)?;

    let indexed: Vec<(usize, &PathBuf)> = inputs.iter().enumerate().collect();
    let pieces = pool.run_all(indexed, |(index, input)| {
        split_by_chromosome(input, index, &split_dir)
    })?;

    let mut files_by_chr: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (chr, path) in pieces.into_iter().flatten() {
        files_by_chr.entry(chr).or_default().push(path);
    }

    let mut groups = Vec::with_capacity(files_by_chr.len());
    for (chr, mut files) in files_by_chr {
        let destination = prefix.join(shard_file_name(&path_safe(&chr)));
        append_existing(&mut staging, &destination, &mut files, config.append)?;
        groups.push(ReductionGroup::new(chr, destination, files));
    }

    let chromosomes = groups.len();
    let summary = finish(groups, staging, config, key, &pool)?;
    log::info!(
        "Merged {} shards into {} chromosome files under {} ({} rows)",
        inputs.len(),
        chromosomes,
        prefix.display(),
        summary.rows
    );
    Ok(summary)
}
