use crate::{
    cli::IdsArgs,
    core::{annotate::annotate_ids, variant_id::IdEncoder},
    io::{
        contig_reader::load_contig_index,
        readers::open_catalog_reader,
        shard::{read_shard, write_shard},
    },
    utils::util::{format_number_with_commas, Result},
};
use arrow::record_batch::RecordBatch;
use std::{io::BufRead, path::Path};

/// `##` header lines of a (possibly gzipped) VCF.
fn read_vcf_header(path: &Path) -> Result<Vec<String>> {
    let reader = open_catalog_reader(path)?;
    let mut header = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.starts_with("##") {
            break;
        }
        header.push(line);
    }
    Ok(header)
}

pub fn ids(args: IdsArgs) -> Result<()> {
    let header = match &args.vcf_header {
        Some(path) => read_vcf_header(path)?,
        None => Vec::new(),
    };
    let table = load_contig_index(args.contigs.as_deref(), header.iter().map(String::as_str))?;
    let encoder = IdEncoder::for_index(&table);
    log::debug!(
        "{} contigs, genome length {}, packed alts up to {:?} bases",
        table.len(),
        format_number_with_commas(table.total_length()),
        encoder.max_packed_alt_len()
    );

    let shard = read_shard(&args.input)?;
    let mut batches = shard
        .batches
        .iter()
        .map(|batch| annotate_ids(batch, &table, &encoder))
        .collect::<Result<Vec<_>>>()?;
    if batches.is_empty() {
        batches.push(annotate_ids(
            &RecordBatch::new_empty(shard.schema.clone()),
            &table,
            &encoder,
        )?);
    }
    let schema = batches[0].schema();
    let rows = write_shard(&args.output, &schema, &batches)?;
    log::info!(
        "Wrote {} variant ids to {}",
        format_number_with_commas(rows),
        args.output.display()
    );
    Ok(())
}
