//! CLI command definitions
//!
//! Defines the clap commands for the recipe CLI.

use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::codec::Format;

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a recipe and print a summary of the report
    Run {
        /// Recipe file (.json, .yaml or .yml)
        recipe: PathBuf,

        /// Write the full result report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Run in process even if a remote endpoint is configured
        #[arg(long)]
        local: bool,
    },

    /// Decode a recipe and check it can be executed
    Validate {
        /// Recipe file
        recipe: PathBuf,
    },

    /// Re-encode a recipe in another wire format
    Convert {
        /// Recipe file
        recipe: PathBuf,

        /// Target format
        #[arg(long, value_enum)]
        to: OutputFormat,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List the registered step and assertion types
    Tags,

    /// Show which backend recipes would be executed on
    Backend,
}

/// Wire format selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}
