//! Parquet shard reading and writing.

use crate::{
    constants::SHARD_EXTENSION,
    error::VarhiveError,
    utils::util::Result,
};
use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray, UInt64Array},
    compute::{cast, concat_batches},
    datatypes::{DataType, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::{Compression, ZstdLevel},
    file::properties::{WriterProperties, WriterVersion},
};
use rayon::{prelude::*, ThreadPoolBuilder};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// All rows of one or more shards, in memory.
#[derive(Debug, Clone)]
pub struct ShardData {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl ShardData {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Single batch holding every row.
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

pub fn read_shard(path: &Path) -> Result<ShardData> {
    let file = File::open(path).map_err(|error| {
        crate::varhive_error!("Failed to open shard {}: {}", path.display(), error)
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    log::trace!(
        "Read shard {}: {} batches",
        path.display(),
        batches.len()
    );
    Ok(ShardData { schema, batches })
}

/// Reads `paths` on a private pool of `engine_threads` and checks they share one schema.
pub fn read_shards(paths: &[PathBuf], engine_threads: usize) -> Result<ShardData> {
    let first = paths
        .first()
        .ok_or_else(|| crate::varhive_error!("No shard to read"))?;

    let shards: Vec<Result<ShardData>> = if engine_threads > 1 && paths.len() > 1 {
        let pool = ThreadPoolBuilder::new()
            .num_threads(engine_threads)
            .build()
            .map_err(|e| crate::varhive_error!("Failed to initialize engine thread pool: {e}"))?;
        pool.install(|| paths.par_iter().map(|path| read_shard(path)).collect())
    } else {
        paths.iter().map(|path| read_shard(path)).collect()
    };

    let mut schema: Option<SchemaRef> = None;
    let mut batches = Vec::new();
    for (path, shard) in paths.iter().zip(shards) {
        let shard = shard?;
        match schema.as_ref() {
            None => schema = Some(shard.schema.clone()),
            Some(expected) if expected.fields() != shard.schema.fields() => {
                return Err(VarhiveError::SchemaMismatch { path: path.clone() });
            }
            Some(_) => {}
        }
        batches.extend(shard.batches);
    }

    let schema = schema.ok_or_else(|| {
        crate::varhive_error!("No schema found while reading {}", first.display())
    })?;
    Ok(ShardData { schema, batches })
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build()
}

/// Writes `batches` to `path`. An empty batch list still produces a valid, empty shard.
pub fn write_shard(path: &Path, schema: &SchemaRef, batches: &[RecordBatch]) -> Result<u64> {
    let file = File::create(path).map_err(|error| {
        crate::varhive_error!("Failed to create shard {}: {}", path.display(), error)
    })?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(writer_properties()))?;
    let mut rows = 0u64;
    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }
        writer.write(batch)?;
        rows += batch.num_rows() as u64;
    }
    writer.close()?;
    log::trace!("Wrote shard {}: {} rows", path.display(), rows);
    Ok(rows)
}

pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| crate::varhive_error!("Column '{name}' missing from shard"))
}

pub fn u64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| crate::varhive_error!("Expected UInt64 values in column '{name}'"))
}

/// String column as Utf8; LargeUtf8 columns are cast down.
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = column(batch, name)?;
    match array.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            Ok(cast(array, &DataType::Utf8)?.as_string::<i32>().clone())
        }
        other => Err(crate::varhive_error!(
            "Expected string values in column '{name}', found {other}"
        )),
    }
}

/// Names of `required` columns absent from `schema`.
pub fn missing_columns(schema: &SchemaRef, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| schema.column_with_name(name).is_none())
        .map(|name| name.to_string())
        .collect()
}

pub fn ensure_no_nulls(array: &dyn Array, name: &str) -> Result<()> {
    if array.null_count() > 0 {
        return Err(crate::varhive_error!(
            "Column '{name}' holds {} null values",
            array.null_count()
        ));
    }
    Ok(())
}

pub fn shard_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn shard_file_name(stem: &str) -> String {
    format!("{stem}.{SHARD_EXTENSION}")
}

/// Makes an arbitrary value (a contig name) usable as a single path component.
pub fn path_safe(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => escaped.push(byte as char),
            b'.' if !escaped.is_empty() => escaped.push('.'),
            _ => escaped.push_str(&format!("%{byte:02X}")),
        }
    }
    escaped
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    pub fn variant_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::UInt64, false),
            Field::new("chr", DataType::Utf8, false),
            Field::new("pos", DataType::UInt64, false),
            Field::new("ref", DataType::Utf8, false),
            Field::new("alt", DataType::Utf8, false),
        ]))
    }

    pub fn genotype_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::UInt64, false),
            Field::new("sample", DataType::Utf8, false),
            Field::new("gt", DataType::UInt8, true),
            Field::new("dp", DataType::UInt32, true),
        ]))
    }

    pub type VariantRow = (u64, &'static str, u64, &'static str, &'static str);
    pub type GenotypeRow = (u64, &'static str, u8, u32);

    pub fn variant_batch(rows: &[VariantRow]) -> RecordBatch {
        RecordBatch::try_new(
            variant_schema(),
            vec![
                Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.0))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
                Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.2))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.3))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.4))),
            ],
        )
        .expect("variant batch should build")
    }

    pub fn genotype_batch(rows: &[GenotypeRow]) -> RecordBatch {
        RecordBatch::try_new(
            genotype_schema(),
            vec![
                Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.0))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
                Arc::new(arrow::array::UInt8Array::from_iter_values(
                    rows.iter().map(|r| r.2),
                )),
                Arc::new(arrow::array::UInt32Array::from_iter_values(
                    rows.iter().map(|r| r.3),
                )),
            ],
        )
        .expect("genotype batch should build")
    }

    pub fn write_variants(path: &Path, rows: &[VariantRow]) -> PathBuf {
        write_shard(path, &variant_schema(), &[variant_batch(rows)])
            .expect("variant shard should be written");
        path.to_path_buf()
    }

    pub fn write_genotypes(path: &Path, rows: &[GenotypeRow]) -> PathBuf {
        write_shard(path, &genotype_schema(), &[genotype_batch(rows)])
            .expect("genotype shard should be written");
        path.to_path_buf()
    }

    /// Variant shard with its string columns stored as LargeUtf8.
    pub fn write_large_utf8_variants(path: &Path, rows: &[VariantRow]) -> PathBuf {
        let batch = variant_batch(rows);
        let fields: Vec<Field> = batch
            .schema()
            .fields()
            .iter()
            .map(|field| match field.data_type() {
                DataType::Utf8 => field.as_ref().clone().with_data_type(DataType::LargeUtf8),
                _ => field.as_ref().clone(),
            })
            .collect();
        let schema: SchemaRef = Arc::new(Schema::new(fields));
        let columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .zip(schema.fields())
            .map(|(column, field)| cast(column, field.data_type()).expect("cast should succeed"))
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), columns).expect("batch should build");
        write_shard(path, &schema, &[batch]).expect("variant shard should be written");
        path.to_path_buf()
    }

    pub fn read_variant_rows(path: &Path) -> Vec<(u64, String, u64, String, String)> {
        let shard = read_shard(path).expect("variant shard should be readable");
        let mut rows = Vec::new();
        for batch in &shard.batches {
            let ids = u64_column(batch, "id").unwrap();
            let chrs = string_column(batch, "chr").unwrap();
            let positions = u64_column(batch, "pos").unwrap();
            let refs = string_column(batch, "ref").unwrap();
            let alts = string_column(batch, "alt").unwrap();
            for i in 0..batch.num_rows() {
                rows.push((
                    ids.value(i),
                    chrs.value(i).to_string(),
                    positions.value(i),
                    refs.value(i).to_string(),
                    alts.value(i).to_string(),
                ));
            }
        }
        rows.sort();
        rows
    }

    pub fn read_genotype_rows(path: &Path) -> Vec<(u64, String, u8, u32)> {
        let shard = read_shard(path).expect("genotype shard should be readable");
        let mut rows = Vec::new();
        for batch in &shard.batches {
            let ids = u64_column(batch, "id").unwrap();
            let samples = string_column(batch, "sample").unwrap();
            let gts = column(batch, "gt")
                .unwrap()
                .as_any()
                .downcast_ref::<arrow::array::UInt8Array>()
                .unwrap();
            let dps = column(batch, "dp")
                .unwrap()
                .as_any()
                .downcast_ref::<arrow::array::UInt32Array>()
                .unwrap();
            for i in 0..batch.num_rows() {
                rows.push((
                    ids.value(i),
                    samples.value(i).to_string(),
                    gts.value(i),
                    dps.value(i),
                ));
            }
        }
        rows.sort();
        rows
    }
}
