pub mod cli;
pub mod commands;
pub mod error;

pub mod core {
    pub mod annotate;
    pub mod contigs;
    pub mod svtype;
    pub mod variant_id;
}

pub mod io {
    pub mod contig_reader;
    pub mod readers;
    pub mod shard;
    pub mod staging;
}

pub mod structure;

pub mod utils {
    pub mod util;
    pub mod util_intern;
}

pub mod constants;

pub use constants::*;
