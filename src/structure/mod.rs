pub mod chunk;
pub mod config;
pub mod dedup;
pub mod hive;
pub mod merge;
pub mod pool;

pub use config::{HiveConfig, MergeConfig, WorkerConfig};
pub use dedup::DedupKey;
pub use hive::{check_partition_tree, hive, HiveSummary};
pub use merge::{merge_by_chromosome, merge_files, MergeSummary};
