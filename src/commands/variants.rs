use crate::{
    cli::VariantsArgs,
    structure::{merge_by_chromosome, MergeConfig},
    utils::util::{format_number_with_commas, Result},
};

pub fn variants(args: VariantsArgs) -> Result<()> {
    let inputs = args
        .input
        .paths()
        .map_err(|error| crate::varhive_error!("{error}"))?;
    let config = MergeConfig::new(
        args.memory_limit,
        args.parallel.threads,
        args.parallel.engine_threads,
        args.parallel.append,
        args.parallel.tmp_dir.clone(),
    )?;
    log::info!(
        "Merging {} variant shards on key ({}) with {} workers",
        inputs.len(),
        args.key,
        config.workers()
    );

    let summary = merge_by_chromosome(&inputs, &args.output, args.key, &config)?;
    log::info!(
        "Wrote {} chromosome files with {} variants in {} reduction levels",
        summary.outputs.len(),
        format_number_with_commas(summary.rows),
        summary.levels
    );
    Ok(())
}
