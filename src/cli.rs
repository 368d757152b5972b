use crate::constants::*;
use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

/// Full version string including the crate version and git description.
///
/// # Examples
/// * `0.1.0-1ba958a-dirty` - while on a dirty branch
/// * `0.1.0-1ba958a` - with a fresh commit
pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    let git_describe = env!("VERGEN_GIT_DESCRIBE");
    if git_describe.is_empty() {
        env!("CARGO_PKG_VERSION").to_string()
    } else {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), git_describe)
    }
});

#[derive(Parser, Debug)]
#[command(name="varhive",
          version=&**FULL_VERSION,
          about="Variant id encoding, merge-dedup and hive partitioning of Parquet shards",
          long_about = None,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge variant shards into one deduplicated file per chromosome
    Variants(VariantsArgs),
    /// Partition genotype shards by variant id
    Genotypes(GenotypesArgs),
    /// Compute the variant id column of a shard
    Ids(IdsArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Variants(_) => "variants",
            Command::Genotypes(_) => "genotypes",
            Command::Ids(_) => "ids",
        }
    }
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ShardInputArgs {
    /// Parquet shards to process
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PARQUET",
        num_args = 1..,
        value_parser = check_file_exists
    )]
    pub inputs: Option<Vec<PathBuf>>,

    /// File containing paths of Parquet shards (one per line)
    #[arg(
        long = "input-list",
        value_name = "INPUT_LIST",
        value_parser = check_file_exists
    )]
    pub input_list: Option<PathBuf>,
}

impl ShardInputArgs {
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        match (&self.inputs, &self.input_list) {
            (Some(inputs), None) => Ok(inputs.clone()),
            (None, Some(list_path)) => read_paths_from_file(list_path),
            _ => Err(anyhow!("Either --input or --input-list is required, never both")),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ParallelArgs {
    /// Number of threads to use
    #[arg(
        short = '@',
        long = "threads",
        value_name = "THREADS",
        default_value_t = DEFAULT_THREADS,
        value_parser = threads_in_range
    )]
    pub threads: usize,

    /// Threads each worker uses to read its shards; workers = threads / engine-threads
    #[arg(
        long = "engine-threads",
        value_name = "THREADS",
        default_value_t = DEFAULT_ENGINE_THREADS,
        value_parser = threads_in_range,
        help_heading = "Advanced"
    )]
    pub engine_threads: usize,

    /// Merge into existing outputs instead of replacing them
    #[arg(long = "append")]
    pub append: bool,

    /// Directory for intermediate files [default: next to the output]
    #[arg(
        long = "tmp-dir",
        value_name = "DIR",
        value_parser = check_dir_exists,
        help_heading = "Advanced"
    )]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct VariantsArgs {
    #[command(flatten)]
    pub input: ShardInputArgs,

    /// Output directory, one <chr>.parquet per chromosome
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        value_parser = check_prefix_path
    )]
    pub output: PathBuf,

    /// Columns identifying a duplicate: id | locus
    #[arg(
        long = "key",
        value_name = "KEY",
        default_value = "id",
        value_parser = parse_dedup_key
    )]
    pub key: crate::structure::DedupKey,

    /// Bytes of shard files read by one merge task, accepts K/M/G suffixes
    #[arg(
        long = "memory-limit",
        value_name = "BYTES",
        default_value_t = DEFAULT_MEMORY_LIMIT,
        value_parser = parse_memory_limit
    )]
    pub memory_limit: u64,

    #[command(flatten)]
    pub parallel: ParallelArgs,
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct GenotypesArgs {
    #[command(flatten)]
    pub input: ShardInputArgs,

    /// Output directory, one id_part=<p>/0.parquet per partition
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        value_parser = check_prefix_path
    )]
    pub output: PathBuf,

    /// Number of id bits used for partitioning (2^bits partitions)
    #[arg(
        long = "bits",
        value_name = "BITS",
        default_value_t = DEFAULT_PARTITION_BITS,
        value_parser = bits_in_range
    )]
    pub bits: u8,

    /// Shards read by one bucketing task
    #[arg(
        long = "file-per-thread",
        value_name = "FILES",
        default_value_t = DEFAULT_FILE_PER_THREAD,
        value_parser = threads_in_range,
        help_heading = "Advanced"
    )]
    pub file_per_thread: usize,

    /// Threads of the per-partition merge wave [default: --threads]
    #[arg(
        long = "merge-threads",
        value_name = "THREADS",
        value_parser = threads_in_range,
        help_heading = "Advanced"
    )]
    pub merge_threads: Option<usize>,

    /// Report partitions holding more than one file after the run
    #[arg(long = "check")]
    pub check: bool,

    #[command(flatten)]
    pub parallel: ParallelArgs,
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct IdsArgs {
    /// Parquet shard with chr, pos, ref and alt columns
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PARQUET",
        value_parser = check_file_exists
    )]
    pub input: PathBuf,

    /// Output shard with the id column added
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PARQUET",
        value_parser = check_prefix_path
    )]
    pub output: PathBuf,

    /// Contig length table: contig<TAB|,>length, optionally gzipped
    #[arg(
        long = "contigs",
        value_name = "TABLE",
        value_parser = check_file_exists,
        required_unless_present = "vcf_header"
    )]
    pub contigs: Option<PathBuf>,

    /// VCF whose ##contig header lines provide contig lengths
    #[arg(
        long = "vcf-header",
        value_name = "VCF",
        value_parser = check_file_exists
    )]
    pub vcf_header: Option<PathBuf>,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse::<usize>()
        .map_err(|_| anyhow!("`{}` is not a valid thread number", s))?;
    if thread == 0 {
        return Err(anyhow!("Number of threads must be >= 1"));
    }
    Ok(thread)
}

fn bits_in_range(s: &str) -> Result<u8> {
    let bits: u8 = s
        .parse::<u8>()
        .map_err(|_| anyhow!("`{}` is not a valid number of bits", s))?;
    if !(1..=MAX_PARTITION_BITS).contains(&bits) {
        return Err(anyhow!("bits must be between 1 and {MAX_PARTITION_BITS}"));
    }
    Ok(bits)
}

/// Parses a byte count with an optional K/M/G/T suffix (powers of 1000).
fn parse_memory_limit(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&trimmed[..trimmed.len() - 1], 1_000),
        Some('M') => (&trimmed[..trimmed.len() - 1], 1_000_000),
        Some('G') => (&trimmed[..trimmed.len() - 1], 1_000_000_000),
        Some('T') => (&trimmed[..trimmed.len() - 1], 1_000_000_000_000),
        _ => (trimmed, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| anyhow!("`{}` is not a valid memory limit", s))?;
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("Memory limit `{}` is too large", s))?;
    if bytes == 0 {
        return Err(anyhow!("Memory limit must be >= 1 byte"));
    }
    Ok(bytes)
}

fn parse_dedup_key(s: &str) -> Result<crate::structure::DedupKey> {
    match s.to_ascii_lowercase().as_str() {
        "id" => Ok(crate::structure::DedupKey::VariantId),
        "locus" => Ok(crate::structure::DedupKey::Locus),
        _ => Err(anyhow!("Invalid key: {}. Must be one of id, locus.", s)),
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_dir_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        return Err(anyhow!("Directory does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_prefix_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(anyhow!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn read_paths_from_file(path: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(path)
        .map_err(|e| anyhow!("Failed to open input list file {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);

    let mut paths = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| anyhow!("Error reading line {}: {}", line_num + 1, e))?;
        let trimmed = line.trim();
        // Skip empty or comment lines
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let path = PathBuf::from(trimmed);
        if !path.exists() {
            Err(anyhow!("Input shard does not exist: {}", path.display()))?;
        }
        paths.push(path);
    }

    if paths.is_empty() {
        Err(anyhow!("No shard paths found in the input list".to_string()))?;
    }

    Ok(paths)
}
