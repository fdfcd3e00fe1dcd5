//! CLI argument parsing

use clap::{Parser, Subcommand};

/// Directory watched when none is given.
pub const DEFAULT_WATCH_DIR: &str = "~/Downloads/fw";

#[derive(Parser)]
#[command(name = "keyflash")]
#[command(version, about = "Automatically flash keyboard firmware over USB DFU", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a directory and flash new firmware images as they appear
    Run {
        /// Directory to watch for firmware files (a leading ~ expands to
        /// the home directory)
        #[arg(short, long, default_value = DEFAULT_WATCH_DIR)]
        watch: String,
    },

    /// List attached supported devices
    Devices,
}
