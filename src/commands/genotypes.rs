use crate::{
    cli::GenotypesArgs,
    structure::{check_partition_tree, hive, HiveConfig},
    utils::util::{format_number_with_commas, Result},
};

pub fn genotypes(args: GenotypesArgs) -> Result<()> {
    let inputs = args
        .input
        .paths()
        .map_err(|error| crate::varhive_error!("{error}"))?;
    let config = HiveConfig::new(
        args.parallel.threads,
        args.merge_threads.unwrap_or(args.parallel.threads),
        args.parallel.engine_threads,
        args.file_per_thread,
        args.bits,
        args.parallel.append,
        args.parallel.tmp_dir.clone(),
    )?;
    log::info!(
        "Partitioning {} genotype shards into {} partitions",
        inputs.len(),
        config.partitions()
    );

    let summary = hive(&inputs, &args.output, &config)?;
    log::info!(
        "Wrote {} partition files with {} genotypes",
        summary.outputs.len(),
        format_number_with_commas(summary.rows)
    );

    if args.check {
        let offenders = check_partition_tree(&args.output, args.bits)?;
        if !offenders.is_empty() {
            return Err(crate::varhive_error!(
                "Partitions holding more than one file: {:?}",
                offenders
            ));
        }
        log::info!("Every partition holds a single file");
    }
    Ok(())
}
