//! Command-line arguments for `ks2-inspect`
//!
//! [`CommonArgs`] carries the decoder settings (config file, streaming
//! threshold override) and is flattened into [`InspectArgs`]. Every
//! [`InspectCommand`] names the recording it reads.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Common arguments shared across all KS2 tools
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,

    /// Override the bulk streaming threshold (MiB)
    #[arg(long = "threshold-mib", env = "KS2_THRESHOLD_MIB")]
    pub threshold_mib: Option<u64>,
}

/// Arguments for ks2-inspect
#[derive(Parser, Debug, Clone)]
#[command(name = "ks2-inspect")]
#[command(about = "Inspect Kyowa KS2 recordings")]
#[command(version)]
pub struct InspectArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: InspectCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum InspectCommand {
    /// Show header and sample matrix summary
    Info {
        /// Path to the .ks2 file
        file: PathBuf,
    },

    /// List per-channel metadata
    Channels {
        /// Path to the .ks2 file
        file: PathBuf,

        /// Also print the first calibrated sample of each channel
        #[arg(short, long)]
        calibrated: bool,
    },

    /// Dump decoded metadata
    Metadata {
        /// Path to the .ks2 file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = MetadataFormat::Json)]
        format: MetadataFormat,
    },
}

impl InspectCommand {
    pub fn file(&self) -> &PathBuf {
        match self {
            Self::Info { file } | Self::Channels { file, .. } | Self::Metadata { file, .. } => {
                file
            }
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    Compact,
}
