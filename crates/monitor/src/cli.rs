//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storage::ClockHour;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (TOML); `DROWSY__*` variables override it
    #[arg(short, long, env = "DROWSY_CONFIG", default_value = "drowsy.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Log in and monitor the video stream until Ctrl-C
    Run {
        username: String,
        password: String,
    },

    /// Create a driver account
    CreateAccount {
        username: String,
        password: String,
        /// Password again
        confirm: String,
    },

    /// Log a night's sleep, e.g. `--sleep "11 PM" --wake "07 AM"`
    RecordSleep {
        username: String,
        password: String,
        #[arg(long)]
        sleep: ClockHour,
        #[arg(long)]
        wake: ClockHour,
    },

    /// Print the sleep log
    History {
        username: String,
        password: String,
    },
}
