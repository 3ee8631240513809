//! Folio CLI: resumable block-by-block document transformation.
//!
//! Splits a DOCX into page-sized blocks, transforms each block through an
//! external model, checkpoints after every block, and assembles the final
//! document once the whole source has been processed.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
