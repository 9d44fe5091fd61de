use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Inspect and script the simulated desktop filesystem")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,
    /// Seed file describing the home directory. Defaults to ./deskfs.yaml when present.
    #[clap(long, short, global = true)]
    pub seed: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List a folder
    Ls {
        path: Option<String>,
        /// Show kind, size, owner, permissions and modification time
        #[clap(long)]
        long: bool,
    },
    /// Print the folder hierarchy
    Tree { path: Option<String> },
    /// Print a file's content
    Cat { path: String },
    /// Find files whose name contains a pattern
    Search { pattern: String },
    /// Check the tree and its path index for corruption
    Validate,
    /// Run a file of shell commands against the filesystem
    Script { file: PathBuf },
}
