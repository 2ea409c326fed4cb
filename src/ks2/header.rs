//! Fixed ASCII header at the start of a KS2 file
//!
//! The first [`HEADER_SIZE`] bytes hold 16 newline-terminated text lines,
//! values optionally wrapped in double quotes. The tagged-record stream
//! begins right after this region.

use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;

use super::error::{DecodeError, DecodeResult};

/// Size of the fixed header region; record offsets are relative to it
pub const HEADER_SIZE: u64 = 256;

/// Number of text lines in the fixed header
pub const HEADER_LINES: usize = 16;

/// Line positions of the fields we keep (0-indexed)
mod line {
    pub const DEVICE_ID: usize = 0;
    pub const NAME: usize = 2;
    pub const CHANNEL_COUNT: usize = 3;
    pub const RAW_CHANNEL_COUNT: usize = 4;
    pub const SAMPLE_RATE: usize = 5;
    pub const BLOCK_COUNT: usize = 9;
    pub const VARIABLE_HEADER_SIZE: usize = 12;
    pub const DATA_HEADER_SIZE: usize = 13;
}

/// Metadata parsed from the fixed header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedHeader {
    /// Instrument identifier
    pub device_id: String,
    /// Dataset name
    pub name: String,
    /// Number of recorded channels
    pub channel_count: usize,
    /// Raw channel count minus recorded channel count
    pub cancelled_channels: i64,
    /// Sample rate in Hz
    pub sample_rate: u64,
    /// Number of acquisition blocks in the file
    pub block_count: u64,
    /// Declared size of the variable-length header section
    pub variable_header_size: u64,
    /// Declared size of the data header section
    pub data_header_size: u64,
}

impl FixedHeader {
    /// Read the fixed header from the start of a stream
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> DecodeResult<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        reader.by_ref().take(HEADER_SIZE).read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Parse the fixed header from its raw bytes
    pub fn from_bytes(data: &[u8]) -> DecodeResult<Self> {
        let lines: Vec<String> = data
            .split_inclusive(|&b| b == b'\n')
            .filter(|l| l.ends_with(b"\n"))
            .take(HEADER_LINES)
            .map(clean_line)
            .collect();

        if lines.len() < HEADER_LINES {
            return Err(DecodeError::malformed_header(format!(
                "expected {} lines, found {}",
                HEADER_LINES,
                lines.len()
            )));
        }

        let channel_count: usize = parse_field(&lines, line::CHANNEL_COUNT, "channel count")?;
        let raw_channels: i64 = parse_field(&lines, line::RAW_CHANNEL_COUNT, "raw channel count")?;
        let cancelled_channels = i64::try_from(channel_count)
            .ok()
            .and_then(|n| raw_channels.checked_sub(n))
            .ok_or_else(|| {
                DecodeError::malformed_header(format!(
                    "channel counts {} and {} out of range",
                    raw_channels, channel_count
                ))
            })?;
        let sample_rate: u64 = parse_field(&lines, line::SAMPLE_RATE, "sample rate")?;
        if sample_rate == 0 {
            return Err(DecodeError::malformed_header("sample rate must be positive"));
        }

        Ok(Self {
            device_id: lines[line::DEVICE_ID].clone(),
            name: lines[line::NAME].clone(),
            channel_count,
            cancelled_channels,
            sample_rate,
            block_count: parse_field(&lines, line::BLOCK_COUNT, "block count")?,
            variable_header_size: parse_field(
                &lines,
                line::VARIABLE_HEADER_SIZE,
                "variable header size",
            )?,
            data_header_size: parse_field(&lines, line::DATA_HEADER_SIZE, "data header size")?,
        })
    }
}

/// Drop quote characters and trailing whitespace (including CR)
fn clean_line(raw: &[u8]) -> String {
    let unquoted: Vec<u8> = raw.iter().copied().filter(|&b| b != b'"').collect();
    String::from_utf8_lossy(&unquoted).trim_end().to_string()
}

fn parse_field<T: std::str::FromStr>(lines: &[String], index: usize, what: &str) -> DecodeResult<T> {
    let text = lines[index].trim();
    text.parse().map_err(|_| {
        DecodeError::malformed_header(format!(
            "line {}: {} '{}' is not a number",
            index, what, text
        ))
    })
}
