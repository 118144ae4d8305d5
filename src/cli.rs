use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "focuslog",
    version = env!("CARGO_PKG_VERSION"),
    about = "Focus timer with an activity log"
)]
pub struct Args {
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[arg(short, long, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    #[command(about = "Run the interactive timer (default)")]
    Run,

    #[command(about = "Print the activity log, newest first")]
    Log {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(about = "Export the activity log as CSV")]
    Export { path: PathBuf },

    #[command(about = "Delete every record from the activity log")]
    Clear {
        #[arg(long, action)]
        yes: bool,
    },
}
