//! Traversal controller and decode entry points
//!
//! A decode walks the record stream in two phases:
//! - header scan: records under parents 1 and 2 (envelope, channel metadata)
//! - data scan: data header (16), bulk data (17) and trailer (18) records of
//!   the first block, ending when a parent lower than the highest seen so far
//!   appears, a parent above 18 appears, or the stream is exhausted.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info};

use super::document::Document;
use super::error::{DecodeError, DecodeResult};
use super::header::{FixedHeader, HEADER_SIZE};
use super::interpret::interpret;
use super::record::{RecordStream, Tag};

/// Highest parent tag belonging to an acquisition block
pub const MAX_DATA_PARENT: u8 = 18;

/// Default per-read cap for bulk sample data (512 MiB)
pub const DEFAULT_STREAMING_THRESHOLD: u64 = 512 * 1024 * 1024;

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Bulk payloads larger than this are read in chunks of at most this many bytes
    pub streaming_threshold_bytes: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD,
        }
    }
}

/// Traversal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    HeaderScan,
    DataScan { high_water: u8 },
    Done,
}

/// KS2 file decoder
#[derive(Debug, Clone, Default)]
pub struct Ks2Decoder {
    config: DecoderConfig,
}

impl Ks2Decoder {
    /// Create a new decoder with given configuration
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Create a decoder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(DecoderConfig::default())
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Open and decode a file; the handle is closed when this returns
    pub fn open<P: AsRef<Path>>(&self, path: P, block_number: u32) -> DecodeResult<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening KS2 file");
        let file = File::open(path)?;
        self.decode(BufReader::new(file), block_number)
    }

    /// Decode a seekable stream
    pub fn decode<R: Read + Seek>(&self, mut reader: R, block_number: u32) -> DecodeResult<Document> {
        if block_number != 1 {
            return Err(DecodeError::UnsupportedBlock(block_number));
        }

        let stream_len = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| DecodeError::UnsupportedStream(e.to_string()))?;

        let header = FixedHeader::read_from(&mut reader)?;
        debug!(
            device = %header.device_id,
            channels = header.channel_count,
            sample_rate = header.sample_rate,
            blocks = header.block_count,
            "Read fixed header"
        );

        let mut doc = Document::new(header);
        let mut stream = RecordStream::new(reader, HEADER_SIZE, stream_len);
        self.traverse(&mut stream, &mut doc)?;

        info!(
            name = %doc.name(),
            channels = doc.channel_count(),
            samples = doc.sample_count,
            element_type = ?doc.samples.as_ref().map(|m| m.element_type()),
            warnings = doc.warnings.len(),
            "Decoded KS2 document"
        );
        Ok(doc)
    }

    fn traverse<R: Read + Seek>(
        &self,
        stream: &mut RecordStream<R>,
        doc: &mut Document,
    ) -> DecodeResult<()> {
        let mut delta = 0u64;
        let mut tag = stream.peek_tag(delta)?;
        let mut phase = Phase::HeaderScan;

        loop {
            phase = match phase {
                Phase::HeaderScan => {
                    if matches!(tag.parent, 1 | 2) {
                        delta = self.step(stream, tag, delta, doc)?;
                        tag = stream.peek_tag(delta)?;
                        Phase::HeaderScan
                    } else {
                        debug!(tag = %tag, delta, "Header scan finished");
                        Phase::DataScan {
                            high_water: tag.parent,
                        }
                    }
                }
                Phase::DataScan { high_water } => {
                    if tag.is_end() || tag.parent < high_water || tag.parent > MAX_DATA_PARENT {
                        debug!(tag = %tag, delta, high_water, "Data scan finished");
                        Phase::Done
                    } else {
                        delta = self.step(stream, tag, delta, doc)?;
                        tag = stream.peek_tag(delta)?;
                        Phase::DataScan {
                            high_water: high_water.max(tag.parent),
                        }
                    }
                }
                Phase::Done => return Ok(()),
            };
        }
    }

    /// Resolve and interpret one record; returns the next delta
    fn step<R: Read + Seek>(
        &self,
        stream: &mut RecordStream<R>,
        tag: Tag,
        delta: u64,
        doc: &mut Document,
    ) -> DecodeResult<u64> {
        let record = stream.read_header(tag, delta)?;
        debug!(
            tag = %tag,
            delta,
            width = record.width.bytes(),
            payload_len = record.payload_len,
            type_code = record.type_code,
            "Record"
        );
        interpret(stream, &record, doc, &self.config)?;
        Ok(record.next_delta())
    }
}

/// Open and decode a KS2 file with the default configuration
pub fn open_and_decode<P: AsRef<Path>>(path: P, block_number: u32) -> DecodeResult<Document> {
    Ks2Decoder::with_defaults().open(path, block_number)
}

/// Decode a seekable KS2 stream with the default configuration
pub fn decode_stream<R: Read + Seek>(reader: R, block_number: u32) -> DecodeResult<Document> {
    Ks2Decoder::with_defaults().decode(reader, block_number)
}
