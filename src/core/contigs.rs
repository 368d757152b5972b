//! Genome-wide linear coordinates.
//!
//! Contig offsets are a running prefix sum over the order in which contig
//! lengths are supplied, so `offset(contig_i)` is the total length of every
//! contig listed before it.

use crate::{error::VarhiveError, utils::util::Result};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigOffset {
    pub contig: String,
    pub length: u64,
    pub offset: u64,
}

/// Immutable contig → offset table, built once per run before any id is computed.
#[derive(Debug, Clone)]
pub struct ContigIndex {
    entries: Vec<ContigOffset>,
    by_name: HashMap<String, usize>,
    total_length: u64,
}

impl ContigIndex {
    pub fn build(contig_lengths: Vec<(String, u64)>) -> Result<Self> {
        if contig_lengths.is_empty() {
            return Err(VarhiveError::MissingCoordinateData);
        }

        let mut entries = Vec::with_capacity(contig_lengths.len());
        let mut by_name = HashMap::with_capacity(contig_lengths.len());
        let mut offset = 0u64;
        for (contig, length) in contig_lengths {
            if by_name.contains_key(&contig) {
                return Err(crate::varhive_error!(
                    "Contig '{contig}' appears more than once in the contig length table"
                ));
            }
            by_name.insert(contig.clone(), entries.len());
            entries.push(ContigOffset {
                contig,
                length,
                offset,
            });
            offset = offset.checked_add(length).ok_or_else(|| {
                crate::varhive_error!("Sum of contig lengths overflows a 64-bit coordinate")
            })?;
        }

        log::debug!(
            "Built contig index: {} contigs, total length {}",
            entries.len(),
            offset
        );

        Ok(Self {
            entries,
            by_name,
            total_length: offset,
        })
    }

    /// Sum of all contig lengths, the largest meaningful real position.
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn offset(&self, chr: &str) -> Result<u64> {
        self.get(chr)
            .map(|entry| entry.offset)
            .ok_or_else(|| VarhiveError::UnknownContig {
                contig: chr.to_string(),
            })
    }

    pub fn get(&self, chr: &str) -> Option<&ContigOffset> {
        self.by_name.get(chr).map(|&index| &self.entries[index])
    }

    pub fn entries(&self) -> &[ContigOffset] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn example_index() -> ContigIndex {
    ContigIndex::build(vec![
        ("1".to_string(), 10_000_000),
        ("2".to_string(), 50_000),
        ("3".to_string(), 120_000_500),
        ("22".to_string(), 99_239_816),
        ("X".to_string(), 10_000),
    ])
    .expect("example contig index should build")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_prefix_sums_in_input_order() {
        let index = example_index();
        let offsets = index
            .entries()
            .iter()
            .map(|entry| (entry.contig.as_str(), entry.offset))
            .collect::<Vec<_>>();
        assert_eq!(
            offsets,
            vec![
                ("1", 0),
                ("2", 10_000_000),
                ("3", 10_050_000),
                ("22", 130_050_500),
                ("X", 229_290_316),
            ]
        );
        assert_eq!(index.total_length(), 229_300_316);
    }

    #[test]
    fn empty_table_is_missing_coordinate_data() {
        let error = ContigIndex::build(Vec::new()).expect_err("empty table should be rejected");
        assert!(matches!(error, VarhiveError::MissingCoordinateData));
    }

    #[test]
    fn unknown_contig_is_reported_by_name() {
        let index = example_index();
        let error = index.offset("chrUn").expect_err("unknown contig should fail");
        assert!(matches!(error, VarhiveError::UnknownContig { ref contig } if contig == "chrUn"));
    }

    #[test]
    fn duplicate_contig_is_rejected() {
        let error = ContigIndex::build(vec![("1".to_string(), 10), ("1".to_string(), 20)])
            .expect_err("duplicate contig should be rejected");
        assert!(error.to_string().contains("more than once"));
    }
}
