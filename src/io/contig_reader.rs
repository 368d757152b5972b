//! Contig length sources feeding [`ContigIndex::build`].

use super::readers::open_catalog_reader;
use crate::{core::contigs::ContigIndex, error::VarhiveError, utils::util::Result};
use std::{io::BufRead, path::Path};

pub fn line_to_contig(line: &str) -> Result<(String, u64)> {
    let fields: Vec<&str> = line
        .split(|c: char| c == '\t' || c == ',')
        .map(str::trim)
        .collect();
    let (contig, length) = match fields[..] {
        [contig, length] | [contig, length, _] if !contig.is_empty() => (contig, length),
        _ => {
            return Err(crate::varhive_error!(
                "Expected fields in the format 'contig length', found: {}",
                line
            ))
        }
    };
    let length: u64 = length
        .parse()
        .map_err(|e| crate::varhive_error!("Invalid length for contig {contig}: {e}"))?;
    Ok((contig.to_string(), length))
}

/// Reads a `contig<TAB|,>length` table, optionally gzipped. Blank lines, `#`
/// comments and a `contig,length` header line are skipped.
pub fn read_contig_table(path: &Path) -> Result<Vec<(String, u64)>> {
    let reader = open_catalog_reader(path)?;
    let mut contigs = Vec::new();
    for (line_number, result_line) in reader.lines().enumerate() {
        let line = result_line.map_err(|e| {
            crate::varhive_error!("Error at contig table line {}: {}", line_number + 1, e)
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match line_to_contig(trimmed) {
            Ok(contig) => contigs.push(contig),
            Err(_) if line_number == 0 && trimmed.to_ascii_lowercase().starts_with("contig") => {}
            Err(e) => {
                return Err(crate::varhive_error!(
                    "Error at contig table line {}: {}",
                    line_number + 1,
                    e
                ))
            }
        }
    }
    log::debug!(
        "Read {} contig lengths from {}",
        contigs.len(),
        path.display()
    );
    Ok(contigs)
}

/// Contig lengths from `##contig=<ID=...,length=...>` header lines; lines
/// without a length are skipped.
pub fn contigs_from_vcf_header<'a, I>(lines: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.strip_prefix("##contig=<"))
        .filter_map(|body| {
            let body = body.trim_end().strip_suffix('>').unwrap_or(body);
            let mut id = None;
            let mut length = None;
            for field in body.split(',') {
                match field.split_once('=') {
                    Some(("ID", value)) => id = Some(value.to_string()),
                    Some(("length", value)) => length = value.parse::<u64>().ok(),
                    _ => {}
                }
            }
            Some((id?, length?))
        })
        .collect()
}

/// Builds the index from a table file, falling back to VCF header lines.
pub fn load_contig_index<'a, I>(table: Option<&Path>, header_lines: I) -> Result<ContigIndex>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut contigs = match table {
        Some(path) => read_contig_table(path)?,
        None => Vec::new(),
    };
    if contigs.is_empty() {
        contigs = contigs_from_vcf_header(header_lines);
    }
    if contigs.is_empty() {
        return Err(VarhiveError::MissingCoordinateData);
    }
    ContigIndex::build(contigs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_to_contig_valid() {
        assert_eq!(
            line_to_contig("chr1\t248956422").unwrap(),
            ("chr1".to_string(), 248_956_422)
        );
        assert_eq!(line_to_contig("2,50000").unwrap(), ("2".to_string(), 50_000));
    }

    #[test]
    fn test_line_to_contig_invalid() {
        assert!(line_to_contig("chr1").is_err());
        assert!(line_to_contig("chr1\tlong").is_err());
        assert!(line_to_contig("\t10").is_err());
    }

    #[test]
    fn table_skips_header_and_comments() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let path = temp_dir.path().join("grch38.csv");
        std::fs::write(&path, "contig,length\n# primary\n1,10000000\n\n2,50000\n").unwrap();
        let headerless = temp_dir.path().join("headerless.tsv");
        std::fs::write(&headerless, "contig1\t10\n").unwrap();
        assert_eq!(
            read_contig_table(&headerless).unwrap(),
            vec![("contig1".to_string(), 10)]
        );
        let contigs = read_contig_table(&path).expect("table should parse");
        assert_eq!(
            contigs,
            vec![("1".to_string(), 10_000_000), ("2".to_string(), 50_000)]
        );
    }

    #[test]
    fn vcf_header_lines_are_parsed() {
        let header = [
            "##fileformat=VCFv4.3",
            "##contig=<ID=1,length=10000000>",
            "##contig=<ID=2,assembly=b38,length=50000>",
            "##contig=<ID=3>",
            "#CHROM\tPOS",
        ];
        assert_eq!(
            contigs_from_vcf_header(header),
            vec![("1".to_string(), 10_000_000), ("2".to_string(), 50_000)]
        );
    }

    #[test]
    fn missing_sources_fail_with_missing_coordinate_data() {
        let result = load_contig_index(None, ["##fileformat=VCFv4.3"]);
        assert!(matches!(result, Err(VarhiveError::MissingCoordinateData)));

        let index = load_contig_index(None, ["##contig=<ID=1,length=10>"]).unwrap();
        assert_eq!(index.total_length(), 10);
    }
}
