//! Bulk sample reader for the waveform block (parent tag 17)
//!
//! Payloads above the streaming threshold are read in fixed-size row chunks
//! so the transient read buffer never exceeds the threshold. Chunked and
//! single-shot reads fill the same matrix.

use std::io::{Read, Seek};

use tracing::{debug, warn};

use super::decoder::DecoderConfig;
use super::document::{Document, SampleMatrix};
use super::error::{DecodeError, DecodeResult, DecodeWarning};
use super::record::{RecordHeader, RecordStream};

pub(crate) fn read_samples<R: Read + Seek>(
    stream: &mut RecordStream<R>,
    record: &RecordHeader,
    doc: &mut Document,
    config: &DecoderConfig,
) -> DecodeResult<()> {
    let kind = record.element_type()?;
    let channels = doc.channel_count();
    let sample_count = doc.sample_count;
    let too_large = || DecodeError::MatrixTooLarge {
        tag: record.tag,
        samples: sample_count,
        channels,
    };

    let bytes_per_sample = channels
        .checked_mul(kind.size())
        .and_then(|b| u64::try_from(b).ok())
        .ok_or_else(too_large)?;
    let samples = usize::try_from(sample_count).map_err(|_| too_large())?;

    if bytes_per_sample == 0 {
        warn!(tag = %record.tag, "Bulk data record with zero channels, payload skipped");
        doc.samples = Some(SampleMatrix::try_zeros(kind, samples, 0).ok_or_else(too_large)?);
        return Ok(());
    }

    let declared = record.payload_len as f64 / bytes_per_sample as f64;
    if declared.round() as u64 != sample_count {
        warn!(
            declared,
            recorded = sample_count,
            "Number of samples in data record does not match data header"
        );
        doc.warnings.push(DecodeWarning::SampleCountMismatch {
            declared,
            recorded: sample_count,
        });
    }

    let mut matrix = SampleMatrix::try_zeros(kind, samples, channels).ok_or_else(too_large)?;
    let rows = sample_count.min(record.payload_len / bytes_per_sample);

    stream.seek_payload(record)?;
    if record.payload_len <= config.streaming_threshold_bytes {
        let mut buf = vec![0u8; (rows * bytes_per_sample) as usize];
        stream.read_exact(&mut buf)?;
        matrix.fill_rows(0, &buf);
    } else {
        let chunk_rows = (config.streaming_threshold_bytes / bytes_per_sample).max(1);
        debug!(
            chunk_rows,
            chunks = rows.div_ceil(chunk_rows),
            "Reading bulk data in chunks"
        );

        let mut buf = vec![0u8; (chunk_rows * bytes_per_sample) as usize];
        let mut row = 0u64;
        while row < rows {
            let n = chunk_rows.min(rows - row);
            let chunk = &mut buf[..(n * bytes_per_sample) as usize];
            stream.read_exact(chunk)?;
            matrix.fill_rows(row as usize, chunk);
            row += n;
        }
    }

    doc.samples = Some(matrix);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ks2::document::SampleData;
    use crate::ks2::element::ElementType;
    use crate::ks2::header::FixedHeader;
    use crate::ks2::record::Tag;
    use std::io::Cursor;

    fn doc(channels: usize, sample_count: u64) -> Document {
        let mut d = Document::new(FixedHeader {
            device_id: "EDX".to_string(),
            name: "t".to_string(),
            channel_count: channels,
            cancelled_channels: 0,
            sample_rate: 100,
            block_count: 1,
            variable_header_size: 0,
            data_header_size: 0,
        });
        d.sample_count = sample_count;
        d
    }

    fn bulk_record(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![17, 2];
        bytes.extend_from_slice(&(payload.len() as u64 + 2).to_le_bytes());
        bytes.extend_from_slice(&[0, code]);
        bytes.extend_from_slice(payload);
        bytes
    }

    fn decode(bytes: Vec<u8>, d: &mut Document, threshold: u64) -> DecodeResult<()> {
        let len = bytes.len() as u64;
        let mut stream = RecordStream::new(Cursor::new(bytes), 0, len);
        let header = stream.read_header(Tag::new(17, 2), 0)?;
        let config = DecoderConfig {
            streaming_threshold_bytes: threshold,
        };
        read_samples(&mut stream, &header, d, &config)
    }

    #[test]
    fn test_single_shot_int16() {
        let values: Vec<i16> = (0..12).map(|v| v * 100 - 300).collect();
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut d = doc(3, 4);
        decode(bulk_record(1, &payload), &mut d, 1 << 20).unwrap();
        let m = d.samples.unwrap();
        assert_eq!(m.shape(), (4, 3));
        assert_eq!(m.data(), &SampleData::Int16(values));
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn test_chunked_matches_single_shot() {
        let values: Vec<f32> = (0..70).map(|v| v as f32 * 0.25).collect();
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut single = doc(2, 35);
        decode(bulk_record(3, &payload), &mut single, 1 << 20).unwrap();

        // 24-byte threshold: 3 rows per chunk, 11 whole chunks + 2 rows
        let mut chunked = doc(2, 35);
        decode(bulk_record(3, &payload), &mut chunked, 24).unwrap();

        assert_eq!(single.samples, chunked.samples);
        assert_eq!(
            chunked.samples.unwrap().element_type(),
            ElementType::Float32
        );
    }

    #[test]
    fn test_threshold_below_one_row() {
        let payload: Vec<u8> = (0u8..16).collect();
        let mut d = doc(4, 2);
        decode(bulk_record(6, &payload), &mut d, 3).unwrap();
        let m = d.samples.unwrap();
        assert_eq!(m.get(1, 3), Some(u16::from_le_bytes([14, 15]) as f64));
    }

    #[test]
    fn test_short_payload_warns_and_keeps_shape() {
        let payload = vec![1u8; 2 * 9];
        let mut d = doc(2, 10);
        decode(bulk_record(5, &payload), &mut d, 1 << 20).unwrap();
        assert_eq!(d.warnings.len(), 1);
        let m = d.samples.unwrap();
        assert_eq!(m.shape(), (10, 2));
        assert_eq!(m.get(8, 1), Some(1.0));
        assert_eq!(m.get(9, 0), Some(0.0));
    }

    #[test]
    fn test_unaddressable_sample_count_is_an_error() {
        let mut d = doc(2, u64::MAX);
        let err = decode(bulk_record(1, &[0; 8]), &mut d, 1 << 20).unwrap_err();
        assert!(matches!(
            err,
            crate::ks2::error::DecodeError::MatrixTooLarge {
                samples: u64::MAX,
                channels: 2,
                ..
            }
        ));
        assert!(d.samples.is_none());
    }

    #[test]
    fn test_channel_count_overflowing_row_size_is_an_error() {
        let mut d = doc(usize::MAX / 2, 4);
        let err = decode(bulk_record(4, &[0; 8]), &mut d, 1 << 20).unwrap_err();
        assert!(matches!(
            err,
            crate::ks2::error::DecodeError::MatrixTooLarge { .. }
        ));
    }

    #[test]
    fn test_unknown_element_type_is_fatal() {
        let mut d = doc(1, 2);
        let err = decode(bulk_record(12, &[0; 4]), &mut d, 1 << 20).unwrap_err();
        assert!(matches!(
            err,
            crate::ks2::error::DecodeError::UnknownElementType { code: 12, .. }
        ));
        assert!(d.samples.is_none());
    }
}
