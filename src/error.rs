use std::{
    num::{ParseIntError, TryFromIntError},
    path::PathBuf,
};
use thiserror::Error;

pub type VarhiveResult<T> = std::result::Result<T, VarhiveError>;

#[derive(Debug, Error)]
pub enum VarhiveError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    #[error(transparent)]
    TryFromInt(#[from] TryFromIntError),
    #[error("No contig length information available")]
    MissingCoordinateData,
    #[error("Contig '{contig}' is absent from the contig length table")]
    UnknownContig { contig: String },
    #[error("No genotype data in {}: missing column(s) {}", path.display(), missing.join(", "))]
    NoGenotypeData { path: PathBuf, missing: Vec<String> },
    #[error("Schema of {} does not match the first shard of the run", path.display())]
    SchemaMismatch { path: PathBuf },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid gzip header: {}", path.display())]
    InvalidGzipHeader { path: PathBuf },
}

impl VarhiveError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Process exit code reported by the command line for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Message(_) => 1,
            Self::Io(_) | Self::InvalidGzipHeader { .. } => 2,
            Self::Arrow(_) | Self::Parquet(_) | Self::SchemaMismatch { .. } => 3,
            Self::ParseInt(_) | Self::TryFromInt(_) => 4,
            Self::InvalidConfig(_) => 5,
            Self::MissingCoordinateData => 10,
            Self::UnknownContig { .. } => 11,
            Self::NoGenotypeData { .. } => 12,
        }
    }
}

#[macro_export]
macro_rules! varhive_error {
    ($($arg:tt)*) => {
        $crate::error::VarhiveError::message(format!($($arg)*))
    };
}
