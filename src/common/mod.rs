//! Shared infrastructure for the KS2 command-line tools

pub mod cli;
pub use cli::{CommonArgs, InspectArgs, InspectCommand, MetadataFormat};
