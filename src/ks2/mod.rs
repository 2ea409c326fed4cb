//! KS2 binary file decoder
//!
//! Decodes recordings produced by Kyowa data-acquisition instruments into a
//! [`Document`]: fixed-header metadata, per-channel calibration, and a typed
//! sample matrix for the first acquisition block.
//!
//! # File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Fixed Header (256 bytes, 16 ASCII lines)    │
//! ├─────────────────────────────────────────────┤
//! │ Record Stream (offsets relative to byte 256)│
//! │  ┌────────────────────────────────────────┐ │
//! │  │ Tag       : parent u8, child u8        │ │
//! │  │ Length    : 2/4/8 bytes LE (by tag)    │ │
//! │  │ Type code : u8 / i16 / i32 (by child)  │ │
//! │  │ Payload   : length - 2 bytes           │ │
//! │  └────────────────────────────────────────┘ │
//! │  parents 1-2  : envelope, channel metadata  │
//! │  parent 16    : data header (time, count)   │
//! │  parent 17    : bulk sample data            │
//! │  parent 18    : data trailer                │
//! │  tag (0, 0)   : end of stream               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All multi-byte integers and floats are little-endian.
//!
//! # Example
//!
//! ```no_run
//! use ks2_rs::ks2::open_and_decode;
//!
//! let doc = open_and_decode("recording.ks2", 1)?;
//! println!("{} channels at {} Hz", doc.channel_count(), doc.sample_rate());
//! let physical = doc.calibrated()?;
//! println!("first value: {:?}", physical.get(0, 0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bulk;
pub mod decoder;
pub mod document;
pub mod element;
pub mod error;
pub mod header;
mod interpret;
pub mod record;

pub use decoder::{
    decode_stream, open_and_decode, DecoderConfig, Ks2Decoder, DEFAULT_STREAMING_THRESHOLD,
    MAX_DATA_PARENT,
};
pub use document::{
    calibrate, CalibratedMatrix, CalibrationError, ChannelSet, Document, DocumentSummary,
    SampleData, SampleMatrix,
};
pub use element::ElementType;
pub use error::{DecodeError, DecodeResult, DecodeWarning};
pub use header::{FixedHeader, HEADER_SIZE};
pub use record::{LengthWidth, RecordHeader, RecordKind, Tag};
