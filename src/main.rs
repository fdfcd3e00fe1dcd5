//! keyflash - automatic keyboard firmware flasher
//!
//! Watches a directory for firmware images and programs any attached,
//! supported keyboard sitting in its USB DFU bootloader.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize logger; -v flags raise the default filter
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Run { watch } => commands::run(&watch),
        Commands::Devices => commands::devices(),
    };

    if let Err(error) = result {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
