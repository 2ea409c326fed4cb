//! Field interpreter: decodes one record payload into the document

use std::io::{Read, Seek};

use tracing::{debug, warn};

use super::bulk;
use super::decoder::DecoderConfig;
use super::document::Document;
use super::error::{DecodeError, DecodeResult, DecodeWarning};
use super::record::{RecordHeader, RecordKind, RecordStream};

/// Fixed field widths of per-channel records
mod width {
    pub const VALID_INDEX: usize = 2;
    pub const FLOAT: usize = 4;
    pub const UNIT: usize = 10;
    pub const NAME: usize = 40;
    pub const DESCRIPTOR: usize = 20;
    pub const START_TIME: usize = 16;
    pub const SAMPLE_COUNT: usize = 8;
}

/// Decode the payload of `record` into `doc`
///
/// The caller advances `delta` from the record header alone, so every
/// branch may read as much or as little of the payload as it needs.
pub(crate) fn interpret<R: Read + Seek>(
    stream: &mut RecordStream<R>,
    record: &RecordHeader,
    doc: &mut Document,
    config: &DecoderConfig,
) -> DecodeResult<()> {
    let n = doc.channel_count();
    let channels = &mut doc.channels;

    match RecordKind::classify(record.tag) {
        RecordKind::ValidChannelIndex => {
            let bytes = read_field(stream, record, n, width::VALID_INDEX)?;
            channels.valid_index = Some(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            );
        }
        RecordKind::CoefficientA => channels.coef_a = Some(read_f32s(stream, record, n)?),
        RecordKind::CoefficientB => channels.coef_b = Some(read_f32s(stream, record, n)?),
        RecordKind::CalibrationCoefficient => {
            channels.calibration = Some(read_f32s(stream, record, n)?)
        }
        RecordKind::ZeroOffset => channels.zero_offset = Some(read_f32s(stream, record, n)?),
        RecordKind::Units => channels.units = Some(read_strings(stream, record, n, width::UNIT)?),
        RecordKind::ChannelNames => {
            channels.names = Some(read_strings(stream, record, n, width::NAME)?)
        }
        RecordKind::Ranges => {
            channels.ranges = Some(read_strings(stream, record, n, width::DESCRIPTOR)?)
        }
        RecordKind::LowPassFilters => {
            channels.low_pass = Some(read_strings(stream, record, n, width::DESCRIPTOR)?)
        }
        RecordKind::HighPassFilters => {
            channels.high_pass = Some(read_strings(stream, record, n, width::DESCRIPTOR)?)
        }
        RecordKind::StartTime => {
            let len = (record.payload_len as usize).min(width::START_TIME);
            let bytes = stream.read_payload(record, len)?;
            doc.start_time_raw = Some(fixed_str(&bytes));
        }
        RecordKind::SampleCount => {
            let bytes = read_field(stream, record, 1, width::SAMPLE_COUNT)?;
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes);
            doc.sample_count = u64::from_le_bytes(b);
        }
        RecordKind::BulkData => bulk::read_samples(stream, record, doc, config)?,
        RecordKind::Skip => {
            debug!(tag = %record.tag, payload_len = record.payload_len, "Skipping record");
        }
        RecordKind::Unrecognized => {
            warn!(
                tag = %record.tag,
                delta = record.delta,
                "Record outside dispatch table, skipped"
            );
            doc.warnings.push(DecodeWarning::UnrecognizedRecord {
                parent: record.tag.parent,
                child: record.tag.child,
                delta: record.delta,
            });
        }
    }

    Ok(())
}

/// Read `count` fields of `field_width` bytes, failing if the payload is shorter
fn read_field<R: Read + Seek>(
    stream: &mut RecordStream<R>,
    record: &RecordHeader,
    count: usize,
    field_width: usize,
) -> DecodeResult<Vec<u8>> {
    let expected = (count as u64).saturating_mul(field_width as u64);
    let too_short = DecodeError::FieldTooShort {
        tag: record.tag,
        expected,
        actual: record.payload_len,
    };
    if record.payload_len < expected {
        return Err(too_short);
    }
    let len = usize::try_from(expected).map_err(|_| too_short)?;
    stream.read_payload(record, len)
}

fn read_f32s<R: Read + Seek>(
    stream: &mut RecordStream<R>,
    record: &RecordHeader,
    n: usize,
) -> DecodeResult<Vec<f32>> {
    let bytes = read_field(stream, record, n, width::FLOAT)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn read_strings<R: Read + Seek>(
    stream: &mut RecordStream<R>,
    record: &RecordHeader,
    n: usize,
    field_width: usize,
) -> DecodeResult<Vec<String>> {
    let bytes = read_field(stream, record, n, field_width)?;
    Ok(bytes.chunks_exact(field_width).map(fixed_str).collect())
}

/// NUL-padded fixed-width text field
fn fixed_str(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string()
}
