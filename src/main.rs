use clap::Parser;
use std::time;
use varhive::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{genotypes, ids, variants},
    utils::{
        util::{handle_error_and_exit, log_warning, Result},
        util_intern::{peak_memory_usage, readable_size},
    },
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    log::trace!("CLI options set: {:?}", cli);

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        &**FULL_VERSION,
        cli.command.name()
    );

    let start_timer = time::Instant::now();
    match cli.command {
        Command::Variants(args) => {
            log::trace!("Variants arguments: {:#?}", args);
            variants(args)?
        }
        Command::Genotypes(args) => {
            log::trace!("Genotypes arguments: {:#?}", args);
            genotypes(args)?
        }
        Command::Ids(args) => {
            log::trace!("Ids arguments: {:#?}", args);
            ids(args)?
        }
    }
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());

    let peak = peak_memory_usage().unwrap_or_else(|error| log_warning(error, 0));
    if peak > 0 {
        let (size, unit) = readable_size(peak);
        log::info!("Peak memory use: {:.2} {}", size, unit);
    }

    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
