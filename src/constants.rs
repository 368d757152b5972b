pub const DEFAULT_MEMORY_LIMIT: u64 = 10_000_000_000;
pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_ENGINE_THREADS: usize = 1;
pub const DEFAULT_FILE_PER_THREAD: usize = 15;
pub const DEFAULT_PARTITION_BITS: u8 = 8;
pub const MAX_PARTITION_BITS: u8 = 16;

/// Width that normalized SV alleles and the star marker are padded to.
/// Anything this long can never take the packed path.
pub const SV_ALT_WIDTH: usize = 64;
pub const STAR_MARKER_FILL: u8 = b'#';
pub const SV_ALT_FILL: u8 = b'-';

pub const PARTITION_COLUMN: &str = "id_part";
pub const PARTITION_FILE_NAME: &str = "0.parquet";
pub const SHARD_EXTENSION: &str = "parquet";
pub const BACKUP_SUFFIX: &str = "bak";

pub const ID_COLUMN: &str = "id";
pub const CHR_COLUMN: &str = "chr";
pub const POS_COLUMN: &str = "pos";
pub const REF_COLUMN: &str = "ref";
pub const ALT_COLUMN: &str = "alt";
pub const SAMPLE_COLUMN: &str = "sample";
pub const GT_COLUMN: &str = "gt";
pub const SVTYPE_COLUMN: &str = "SVTYPE";
pub const SVLEN_COLUMN: &str = "SVLEN";
