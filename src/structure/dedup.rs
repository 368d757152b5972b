use crate::{
    constants::{ALT_COLUMN, CHR_COLUMN, GT_COLUMN, ID_COLUMN, POS_COLUMN, REF_COLUMN, SAMPLE_COLUMN},
    io::shard::{column, missing_columns},
    utils::util::Result,
};
use arrow::{
    array::{ArrayRef, BooleanArray},
    compute::filter_record_batch,
    record_batch::RecordBatch,
    row::{RowConverter, SortField},
};
use std::{collections::HashSet, fmt};

/// Columns that identify a row for deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DedupKey {
    VariantId,
    Locus,
    Genotype,
}

impl DedupKey {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            DedupKey::VariantId => &[ID_COLUMN],
            DedupKey::Locus => &[CHR_COLUMN, POS_COLUMN, REF_COLUMN, ALT_COLUMN],
            DedupKey::Genotype => &[ID_COLUMN, SAMPLE_COLUMN, GT_COLUMN],
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns().join(","))
    }
}

/// Keeps the first row of every distinct key.
pub fn dedup_batch(batch: &RecordBatch, key: DedupKey) -> Result<RecordBatch> {
    let missing = missing_columns(&batch.schema(), key.columns());
    if !missing.is_empty() {
        return Err(crate::varhive_error!(
            "Deduplication key column(s) missing: {}",
            missing.join(", ")
        ));
    }
    if batch.num_rows() == 0 {
        return Ok(batch.clone());
    }

    let key_columns = key
        .columns()
        .iter()
        .map(|name| column(batch, name).cloned())
        .collect::<Result<Vec<ArrayRef>>>()?;
    let fields = key_columns
        .iter()
        .map(|array| SortField::new(array.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(&key_columns)?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let keep: Vec<bool> = rows.iter().map(|row| seen.insert(row)).collect();
    let kept = seen.len();
    if kept == batch.num_rows() {
        return Ok(batch.clone());
    }
    log::trace!(
        "Dropped {} duplicate rows on key ({})",
        batch.num_rows() - kept,
        key
    );
    Ok(filter_record_batch(batch, &BooleanArray::from(keep))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::shard::{test_utils::*, u64_column};

    #[test]
    fn variant_id_key_keeps_first_occurrence() {
        let batch = variant_batch(&[
            (1, "1", 10, "A", "C"),
            (2, "1", 20, "G", "T"),
            (1, "1", 10, "A", "G"),
        ]);
        let deduped = dedup_batch(&batch, DedupKey::VariantId).expect("dedup should succeed");
        assert_eq!(deduped.num_rows(), 2);
        let ids = u64_column(&deduped, "id").unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 2]);
    }

    #[test]
    fn locus_key_ignores_id() {
        let batch = variant_batch(&[(1, "1", 10, "A", "C"), (9, "1", 10, "A", "C")]);
        let deduped = dedup_batch(&batch, DedupKey::Locus).expect("dedup should succeed");
        assert_eq!(deduped.num_rows(), 1);
    }

    #[test]
    fn genotype_key_distinguishes_gt() {
        let batch = genotype_batch(&[
            (1, "s1", 1, 30),
            (1, "s1", 1, 31),
            (1, "s1", 2, 30),
            (1, "s2", 1, 30),
        ]);
        let deduped = dedup_batch(&batch, DedupKey::Genotype).expect("dedup should succeed");
        assert_eq!(deduped.num_rows(), 3);
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let batch = variant_batch(&[(1, "1", 10, "A", "C")]);
        let error = dedup_batch(&batch, DedupKey::Genotype).expect_err("sample is missing");
        assert!(error.to_string().contains("sample"));
    }

    #[test]
    fn display_lists_columns() {
        assert_eq!(DedupKey::Locus.to_string(), "chr,pos,ref,alt");
    }
}
