//! ks2-inspect - Inspection tool for Kyowa KS2 recordings
//!
//! Usage:
//!   ks2-inspect info <file>                         - Show header and sample summary
//!   ks2-inspect channels <file> [--calibrated]      - List per-channel metadata
//!   ks2-inspect metadata <file> [-o <path>]         - Dump metadata as JSON

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ks2_rs::common::{CommonArgs, InspectArgs, InspectCommand, MetadataFormat};
use ks2_rs::config::Config;
use ks2_rs::ks2::{Document, Ks2Decoder, MAX_DATA_PARENT};

fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ks2_rs=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = InspectArgs::parse();
    let decoder = build_decoder(&args.common)?;

    let path = args.command.file();
    let doc = decoder
        .open(path, 1)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    match &args.command {
        InspectCommand::Info { file } => show_info(file, &doc)?,
        InspectCommand::Channels { calibrated, .. } => show_channels(&doc, *calibrated)?,
        InspectCommand::Metadata { output, format, .. } => {
            write_metadata(&doc, output.as_deref(), *format)?
        }
    }

    Ok(())
}

fn build_decoder(common: &CommonArgs) -> anyhow::Result<Ks2Decoder> {
    let config = if Path::new(&common.config_file).exists() {
        info!(path = %common.config_file, "Loading config");
        Config::load(&common.config_file)
            .with_context(|| format!("Failed to load config {}", common.config_file))?
    } else {
        Config::default()
    };
    let decoder_config = config
        .with_threshold_mib(common.threshold_mib)
        .decoder_config()?;
    Ok(Ks2Decoder::new(decoder_config))
}

fn show_info(path: &Path, doc: &Document) -> anyhow::Result<()> {
    println!("File: {}", path.display());
    println!("Size: {} bytes", std::fs::metadata(path)?.len());
    println!();

    println!("=== Header ===");
    println!("  Device:         {}", doc.device_id());
    println!("  Name:           {}", doc.name());
    println!("  Channels:       {}", doc.channel_count());
    println!("  Cancelled:      {}", doc.header().cancelled_channels);
    println!("  Sample Rate:    {} Hz", doc.sample_rate());
    println!("  Blocks:         {}", doc.block_count());
    match (doc.start_time(), doc.start_time_raw()) {
        (Some(t), _) => println!("  Start Time:     {}", t),
        (None, Some(raw)) => println!("  Start Time:     {} (unparsed)", raw),
        (None, None) => println!("  Start Time:     -"),
    }

    println!();
    println!("=== Samples (block 1) ===");
    println!("  Declared:       {}", doc.sample_count());
    match doc.samples() {
        Some(m) => {
            let (samples, channels) = m.shape();
            println!("  Element Type:   {}", m.element_type());
            println!("  Shape:          {} x {}", samples, channels);
            if doc.sample_rate() > 0 {
                println!(
                    "  Duration:       {:.3} s",
                    samples as f64 / doc.sample_rate() as f64
                );
            }
        }
        None => println!("  No bulk data record before parent tag {}", MAX_DATA_PARENT),
    }

    if !doc.warnings().is_empty() {
        println!();
        println!("=== Warnings ===");
        for w in doc.warnings() {
            println!("  \x1b[33m⚠ {}\x1b[0m", w);
        }
    }

    Ok(())
}

fn show_channels(doc: &Document, calibrated: bool) -> anyhow::Result<()> {
    let ch = doc.channels();
    let physical = if calibrated {
        Some(doc.calibrated().context("Calibration failed")?)
    } else {
        None
    };

    println!(
        "{:>4} {:>5}  {:<24} {:<10} {:<12} {:<8} {:<8} {:>13} {:>13}",
        "Ch", "Valid", "Name", "Unit", "Range", "LPF", "HPF", "Coef A", "Coef B"
    );
    for i in 0..doc.channel_count() {
        let valid = ch
            .valid_index
            .as_ref()
            .and_then(|v| v.get(i))
            .map(|x| x.to_string())
            .unwrap_or_else(|| "-".to_string());
        print!(
            "{:>4} {:>5}  {:<24} {:<10} {:<12} {:<8} {:<8} {:>13} {:>13}",
            i,
            valid,
            text_at(&ch.names, i),
            text_at(&ch.units, i),
            text_at(&ch.ranges, i),
            text_at(&ch.low_pass, i),
            text_at(&ch.high_pass, i),
            float_at(&ch.coef_a, i),
            float_at(&ch.coef_b, i),
        );
        if let Some(m) = &physical {
            match m.get(0, i) {
                Some(v) => print!("  first={:.6}", v),
                None => print!("  first=-"),
            }
        }
        println!();
    }

    Ok(())
}

fn text_at(values: &Option<Vec<String>>, i: usize) -> &str {
    values
        .as_ref()
        .and_then(|v| v.get(i))
        .map(String::as_str)
        .unwrap_or("-")
}

fn float_at(values: &Option<Vec<f32>>, i: usize) -> String {
    values
        .as_ref()
        .and_then(|v| v.get(i))
        .map(|x| format!("{:.6e}", x))
        .unwrap_or_else(|| "-".to_string())
}

fn write_metadata(
    doc: &Document,
    output: Option<&Path>,
    format: MetadataFormat,
) -> anyhow::Result<()> {
    let summary = doc.summary();
    let json = match format {
        MetadataFormat::Json => serde_json::to_string_pretty(&summary)?,
        MetadataFormat::Compact => serde_json::to_string(&summary)?,
    };

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{}", json)?;
            writer.flush()?;
            info!(path = %path.display(), "Wrote metadata");
        }
        None => println!("{}", json),
    }

    Ok(())
}
