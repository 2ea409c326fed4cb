//! Tagged-record stream: tag cursor and length resolver
//!
//! Record layout (little-endian):
//! ```text
//! ┌────────┬───────┬──────────────────┬─────────────────────┬─────────────┐
//! │ parent │ child │ length (2/4/8 B) │ type code (2 or 4 B)│ payload ... │
//! └────────┴───────┴──────────────────┴─────────────────────┴─────────────┘
//! ```
//! The length field counts the payload plus 2. Records are addressed by a
//! `delta` relative to the end of the fixed header; the stream position is
//! never trusted between records.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;

use super::element::ElementType;
use super::error::{DecodeError, DecodeResult};

/// Fixed per-record byte overhead used when advancing `delta`
pub const RECORD_OVERHEAD: u64 = 6;

/// Amount the length field exceeds the payload length
pub const LENGTH_ADJUST: u64 = 2;

/// (parent, child) pair identifying a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub parent: u8,
    pub child: u8,
}

impl Tag {
    /// End-of-records sentinel returned when the stream is exhausted
    pub const END: Tag = Tag {
        parent: 0,
        child: 0,
    };

    pub const fn new(parent: u8, child: u8) -> Self {
        Self { parent, child }
    }

    pub fn is_end(&self) -> bool {
        *self == Self::END
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.parent, self.child)
    }
}

/// Width of a record's length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    Two,
    Four,
    Eight,
}

impl LengthWidth {
    /// Resolve the length-field width for a tag
    pub fn for_tag(tag: Tag) -> Self {
        match (tag.parent, tag.child) {
            (1, 62) | (1, 70) => Self::Four,
            (16, 35) => Self::Four,
            (17, 1) => Self::Four,
            (17, 2) => Self::Eight,
            (18, 25) => Self::Eight,
            (18, 31) | (18, 32) => Self::Two,
            (18, _) => Self::Four,
            _ => Self::Two,
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Extra bytes added to `delta` beyond the fixed overhead
    pub fn extra(self) -> u64 {
        self.bytes() - 2
    }
}

/// Semantic kind of a record, keyed by its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    ValidChannelIndex,
    CoefficientA,
    CoefficientB,
    Units,
    CalibrationCoefficient,
    ZeroOffset,
    ChannelNames,
    Ranges,
    LowPassFilters,
    HighPassFilters,
    StartTime,
    SampleCount,
    BulkData,
    /// Known parent, payload not needed
    Skip,
    /// Parent outside the dispatch table
    Unrecognized,
}

impl RecordKind {
    pub fn classify(tag: Tag) -> Self {
        match (tag.parent, tag.child) {
            (2, 48) => Self::ValidChannelIndex,
            (2, 3) => Self::CoefficientA,
            (2, 4) => Self::CoefficientB,
            (2, 5) => Self::Units,
            (2, 8) => Self::CalibrationCoefficient,
            (2, 12) => Self::ZeroOffset,
            (2, 49) => Self::ChannelNames,
            (2, 51) => Self::Ranges,
            (2, 53) => Self::LowPassFilters,
            (2, 54) => Self::HighPassFilters,
            (16, 3) => Self::StartTime,
            (16, 30) => Self::SampleCount,
            (17, _) => Self::BulkData,
            (1, _) | (2, _) | (16, _) | (18, _) => Self::Skip,
            _ => Self::Unrecognized,
        }
    }
}

/// Resolved record header; ephemeral, lives for one traversal step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: Tag,
    pub delta: u64,
    pub width: LengthWidth,
    pub payload_len: u64,
    /// Raw element-type code as stored in the record
    pub type_code: i32,
    /// Absolute stream offset of the first payload byte
    pub payload_offset: u64,
}

impl RecordHeader {
    /// Element kind for records whose payload is typed numeric data
    pub fn element_type(&self) -> DecodeResult<ElementType> {
        ElementType::from_code(self.type_code).ok_or(DecodeError::UnknownElementType {
            tag: self.tag,
            code: self.type_code,
        })
    }

    /// Delta of the record following this one
    pub fn next_delta(&self) -> u64 {
        next_delta(self.delta, self.width, self.payload_len)
    }
}

/// Delta arithmetic shared by every record kind
pub fn next_delta(delta: u64, width: LengthWidth, payload_len: u64) -> u64 {
    delta + RECORD_OVERHEAD + width.extra() + payload_len
}

/// Random-access view over the tagged-record region of a stream
pub struct RecordStream<R> {
    reader: R,
    base: u64,
    stream_len: u64,
}

impl<R: Read + Seek> RecordStream<R> {
    pub fn new(reader: R, base: u64, stream_len: u64) -> Self {
        Self {
            reader,
            base,
            stream_len,
        }
    }

    /// Read the tag at `delta` without relying on the previous position
    pub fn peek_tag(&mut self, delta: u64) -> DecodeResult<Tag> {
        self.reader.seek(SeekFrom::Start(self.base + delta))?;
        let mut buf = Vec::with_capacity(2);
        self.reader.by_ref().take(2).read_to_end(&mut buf)?;
        if buf.len() < 2 {
            return Ok(Tag::END);
        }
        Ok(Tag::new(buf[0], buf[1]))
    }

    /// Read the length field and element-type code of the record at `delta`
    pub fn read_header(&mut self, tag: Tag, delta: u64) -> DecodeResult<RecordHeader> {
        let width = LengthWidth::for_tag(tag);
        let code_bytes: u64 = match tag.child {
            61 | 62 | 70 => 2,
            63 => 4,
            _ => 2,
        };

        let start = self.base + delta;
        let fixed = 2 + width.bytes() + code_bytes;
        let available = self.stream_len.saturating_sub(start);
        if fixed > available {
            return Err(DecodeError::TruncatedRecord {
                tag,
                delta,
                declared: fixed,
                available,
            });
        }

        self.reader.seek(SeekFrom::Start(start + 2))?;
        let length = match width {
            LengthWidth::Two => u16::from_le_bytes(self.read_array()?) as u64,
            LengthWidth::Four => u32::from_le_bytes(self.read_array()?) as u64,
            LengthWidth::Eight => u64::from_le_bytes(self.read_array()?),
        };
        let payload_len = length
            .checked_sub(LENGTH_ADJUST)
            .ok_or(DecodeError::InvalidLength {
                tag,
                delta,
                value: length,
            })?;

        let type_code = match tag.child {
            61 | 62 | 70 => i16::from_le_bytes(self.read_array()?) as i32,
            63 => i32::from_le_bytes(self.read_array()?),
            _ => {
                // reserved byte precedes the one-byte code
                let [_, code] = self.read_array::<2>()?;
                code as i32
            }
        };

        // a 4-byte type code overlaps the first two payload bytes; the record
        // footprint is the same for every code width
        let payload_offset = start + fixed;
        let payload_start = start + 2 + width.bytes() + 2;
        let available = self.stream_len - payload_start;
        if payload_len > available {
            return Err(DecodeError::TruncatedRecord {
                tag,
                delta,
                declared: payload_len,
                available,
            });
        }

        Ok(RecordHeader {
            tag,
            delta,
            width,
            payload_len,
            type_code,
            payload_offset,
        })
    }

    /// Position the stream at the start of a record's payload
    pub fn seek_payload(&mut self, header: &RecordHeader) -> DecodeResult<()> {
        self.reader.seek(SeekFrom::Start(header.payload_offset))?;
        Ok(())
    }

    /// Read the first `len` payload bytes of a record
    pub fn read_payload(&mut self, header: &RecordHeader, len: usize) -> DecodeResult<Vec<u8>> {
        self.seek_payload(header)?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from the current position
    pub fn read_exact(&mut self, buf: &mut [u8]) -> DecodeResult<()> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Release the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}
