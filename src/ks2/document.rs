//! Decoded KS2 document and sample matrices

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use super::element::ElementType;
use super::error::DecodeWarning;
use super::header::FixedHeader;

/// Format of the start-time string
pub const START_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Per-channel attributes, each a sequence indexed by channel number
///
/// `None` means the file carried no record for that attribute. A populated
/// sequence always has exactly `channel_count` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelSet {
    pub valid_index: Option<Vec<i16>>,
    pub names: Option<Vec<String>>,
    pub units: Option<Vec<String>>,
    pub ranges: Option<Vec<String>>,
    pub low_pass: Option<Vec<String>>,
    pub high_pass: Option<Vec<String>>,
    /// Coefficient A (slope)
    pub coef_a: Option<Vec<f32>>,
    /// Coefficient B (offset)
    pub coef_b: Option<Vec<f32>>,
    pub calibration: Option<Vec<f32>>,
    /// Measurement zero
    pub zero_offset: Option<Vec<f32>>,
}

/// Typed raw sample storage, row-major by sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
}

macro_rules! fill_le {
    ($dst:expr, $src:expr, $ty:ty) => {{
        const N: usize = std::mem::size_of::<$ty>();
        for (d, chunk) in $dst.iter_mut().zip($src.chunks_exact(N)) {
            let mut b = [0u8; N];
            b.copy_from_slice(chunk);
            *d = <$ty>::from_le_bytes(b);
        }
    }};
}

fn zeroed<T: Copy + Default>(len: usize) -> Option<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, T::default());
    Some(v)
}

impl SampleData {
    /// Zero-filled storage for `len` elements; `None` if the allocation fails
    pub fn try_zeros(kind: ElementType, len: usize) -> Option<Self> {
        let data = match kind {
            ElementType::Int8 => Self::Int8(zeroed(len)?),
            ElementType::Int16 => Self::Int16(zeroed(len)?),
            ElementType::Int32 => Self::Int32(zeroed(len)?),
            ElementType::Float32 => Self::Float32(zeroed(len)?),
            ElementType::Float64 => Self::Float64(zeroed(len)?),
            ElementType::UInt8 => Self::UInt8(zeroed(len)?),
            ElementType::UInt16 => Self::UInt16(zeroed(len)?),
            ElementType::UInt32 => Self::UInt32(zeroed(len)?),
            ElementType::Int64 => Self::Int64(zeroed(len)?),
            ElementType::UInt64 => Self::UInt64(zeroed(len)?),
        };
        Some(data)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt64(_) => ElementType::UInt64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::UInt64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode little-endian `bytes` into elements starting at `start`
    ///
    /// Writes `bytes.len() / element size` elements, clipped to the storage end.
    pub fn fill_le(&mut self, start: usize, bytes: &[u8]) {
        let start = start.min(self.len());
        match self {
            Self::Int8(v) => fill_le!(v[start..], bytes, i8),
            Self::Int16(v) => fill_le!(v[start..], bytes, i16),
            Self::Int32(v) => fill_le!(v[start..], bytes, i32),
            Self::Float32(v) => fill_le!(v[start..], bytes, f32),
            Self::Float64(v) => fill_le!(v[start..], bytes, f64),
            Self::UInt8(v) => fill_le!(v[start..], bytes, u8),
            Self::UInt16(v) => fill_le!(v[start..], bytes, u16),
            Self::UInt32(v) => fill_le!(v[start..], bytes, u32),
            Self::Int64(v) => fill_le!(v[start..], bytes, i64),
            Self::UInt64(v) => fill_le!(v[start..], bytes, u64),
        }
    }

    /// Element at `index` widened to f64
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        let value = match self {
            Self::Int8(v) => *v.get(index)? as f64,
            Self::Int16(v) => *v.get(index)? as f64,
            Self::Int32(v) => *v.get(index)? as f64,
            Self::Float32(v) => *v.get(index)? as f64,
            Self::Float64(v) => *v.get(index)?,
            Self::UInt8(v) => *v.get(index)? as f64,
            Self::UInt16(v) => *v.get(index)? as f64,
            Self::UInt32(v) => *v.get(index)? as f64,
            Self::Int64(v) => *v.get(index)? as f64,
            Self::UInt64(v) => *v.get(index)? as f64,
        };
        Some(value)
    }
}

/// Raw sample matrix of shape (samples, channels)
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    samples: usize,
    channels: usize,
    data: SampleData,
}

impl SampleMatrix {
    /// Zero-filled matrix; `None` if the shape overflows or cannot be allocated
    pub fn try_zeros(kind: ElementType, samples: usize, channels: usize) -> Option<Self> {
        let len = samples.checked_mul(channels)?;
        Some(Self {
            samples,
            channels,
            data: SampleData::try_zeros(kind, len)?,
        })
    }

    /// Wrap existing row-major storage; `None` if the length does not fit the shape
    pub fn from_data(samples: usize, channels: usize, data: SampleData) -> Option<Self> {
        if samples.checked_mul(channels) != Some(data.len()) {
            return None;
        }
        Some(Self {
            samples,
            channels,
            data,
        })
    }

    /// (samples, channels)
    pub fn shape(&self) -> (usize, usize) {
        (self.samples, self.channels)
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &SampleData {
        &self.data
    }

    /// Decode little-endian rows into the matrix starting at row `first_row`
    pub(crate) fn fill_rows(&mut self, first_row: usize, bytes: &[u8]) {
        self.data.fill_le(first_row * self.channels, bytes);
    }

    pub fn get(&self, sample: usize, channel: usize) -> Option<f64> {
        if sample >= self.samples || channel >= self.channels {
            return None;
        }
        self.data.get_f64(sample * self.channels + channel)
    }

    /// All samples of one channel
    pub fn channel(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.channels {
            return None;
        }
        (0..self.samples)
            .map(|s| self.data.get_f64(s * self.channels + channel))
            .collect()
    }

    /// Row stride that brings `sample_rate` down to roughly `target_hz`
    pub fn decimation_step(sample_rate: u64, target_hz: f64) -> usize {
        if target_hz <= 0.0 {
            return 1;
        }
        ((sample_rate as f64 / target_hz).round() as usize).max(1)
    }
}

/// Calibrated float32 matrix of shape (samples, channels)
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedMatrix {
    pub samples: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl CalibratedMatrix {
    pub fn get(&self, sample: usize, channel: usize) -> Option<f32> {
        if sample >= self.samples || channel >= self.channels {
            return None;
        }
        self.data.get(sample * self.channels + channel).copied()
    }
}

/// Calibration errors
#[derive(Error, Debug, PartialEq)]
pub enum CalibrationError {
    #[error("Coefficient count mismatch: {channels} channels, {coef_a} A and {coef_b} B coefficients")]
    CoefficientCount {
        channels: usize,
        coef_a: usize,
        coef_b: usize,
    },

    #[error("Document has no {0}")]
    Missing(&'static str),
}

/// `data[s, c] = coef_a[c] * raw[s, c] + coef_b[c]`
pub fn calibrate(
    raw: &SampleMatrix,
    coef_a: &[f32],
    coef_b: &[f32],
) -> Result<CalibratedMatrix, CalibrationError> {
    let (samples, channels) = raw.shape();
    if coef_a.len() != channels || coef_b.len() != channels {
        return Err(CalibrationError::CoefficientCount {
            channels,
            coef_a: coef_a.len(),
            coef_b: coef_b.len(),
        });
    }

    let mut data = Vec::with_capacity(samples * channels);
    for s in 0..samples {
        for c in 0..channels {
            let x = raw.data.get_f64(s * channels + c).unwrap_or_default() as f32;
            data.push(coef_a[c] * x + coef_b[c]);
        }
    }

    Ok(CalibratedMatrix {
        samples,
        channels,
        data,
    })
}

/// Result of decoding one KS2 file
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) header: FixedHeader,
    /// Raw start-time string, `YYYYMMDDHHMMSS`
    pub(crate) start_time_raw: Option<String>,
    /// Samples per channel as recorded in the data header
    pub(crate) sample_count: u64,
    pub(crate) channels: ChannelSet,
    pub(crate) samples: Option<SampleMatrix>,
    pub(crate) warnings: Vec<DecodeWarning>,
}

impl Document {
    pub(crate) fn new(header: FixedHeader) -> Self {
        Self {
            header,
            start_time_raw: None,
            sample_count: 0,
            channels: ChannelSet::default(),
            samples: None,
            warnings: Vec::new(),
        }
    }

    pub fn header(&self) -> &FixedHeader {
        &self.header
    }

    pub fn device_id(&self) -> &str {
        &self.header.device_id
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn channel_count(&self) -> usize {
        self.header.channel_count
    }

    pub fn sample_rate(&self) -> u64 {
        self.header.sample_rate
    }

    pub fn block_count(&self) -> u64 {
        self.header.block_count
    }

    /// Samples per channel as recorded in the data header
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Raw sample matrix of the first block, if a bulk data record was found
    pub fn samples(&self) -> Option<&SampleMatrix> {
        self.samples.as_ref()
    }

    /// Recoverable conditions met while decoding
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Start-time string as stored in the file (`YYYYMMDDHHMMSS`)
    pub fn start_time_raw(&self) -> Option<&str> {
        self.start_time_raw.as_deref()
    }

    /// Parse the start-time string
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        let raw = self.start_time_raw.as_deref()?;
        NaiveDateTime::parse_from_str(raw.trim(), START_TIME_FORMAT).ok()
    }

    /// Calibrate the sample matrix with the document's own coefficients
    pub fn calibrated(&self) -> Result<CalibratedMatrix, CalibrationError> {
        let raw = self
            .samples
            .as_ref()
            .ok_or(CalibrationError::Missing("sample matrix"))?;
        let a = self
            .channels
            .coef_a
            .as_deref()
            .ok_or(CalibrationError::Missing("coefficient A"))?;
        let b = self
            .channels
            .coef_b
            .as_deref()
            .ok_or(CalibrationError::Missing("coefficient B"))?;
        calibrate(raw, a, b)
    }

    /// Serializable metadata view (everything except samples)
    pub fn summary(&self) -> DocumentSummary<'_> {
        DocumentSummary {
            header: &self.header,
            start_time: self.start_time_raw.as_deref(),
            sample_count: self.sample_count,
            element_type: self.samples.as_ref().map(|m| m.element_type()),
            shape: self.samples.as_ref().map(|m| m.shape()),
            channels: &self.channels,
            warnings: &self.warnings,
        }
    }
}

/// Metadata view of a [`Document`] for JSON export
#[derive(Debug, Serialize)]
pub struct DocumentSummary<'a> {
    pub header: &'a FixedHeader,
    pub start_time: Option<&'a str>,
    pub sample_count: u64,
    pub element_type: Option<ElementType>,
    pub shape: Option<(usize, usize)>,
    pub channels: &'a ChannelSet,
    pub warnings: &'a [DecodeWarning],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> FixedHeader {
        FixedHeader {
            device_id: "EDX".to_string(),
            name: "run".to_string(),
            channel_count: 2,
            cancelled_channels: 0,
            sample_rate: 1000,
            block_count: 1,
            variable_header_size: 0,
            data_header_size: 0,
        }
    }

    fn int16_matrix() -> SampleMatrix {
        SampleMatrix::from_data(3, 2, SampleData::Int16(vec![1, -2, 3, -4, 5, -6])).unwrap()
    }

    #[test]
    fn test_fill_rows_le() {
        let mut m = SampleMatrix::try_zeros(ElementType::Int16, 2, 2).unwrap();
        m.fill_rows(1, &[0x01, 0x00, 0xFF, 0xFF]);
        assert_eq!(m.data(), &SampleData::Int16(vec![0, 0, 1, -1]));
    }

    #[test]
    fn test_fill_clipped_at_end() {
        let mut d = SampleData::try_zeros(ElementType::UInt8, 3).unwrap();
        d.fill_le(2, &[7, 8, 9]);
        assert_eq!(d, SampleData::UInt8(vec![0, 0, 7]));
    }

    #[test]
    fn test_get_and_channel() {
        let m = int16_matrix();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.get(1, 1), Some(-4.0));
        assert_eq!(m.get(3, 0), None);
        assert_eq!(m.channel(0), Some(vec![1.0, 3.0, 5.0]));
        assert_eq!(m.channel(2), None);
    }

    #[test]
    fn test_from_data_shape_check() {
        assert!(SampleMatrix::from_data(2, 2, SampleData::Int8(vec![0; 3])).is_none());
        assert!(SampleMatrix::from_data(usize::MAX, 2, SampleData::Int8(vec![])).is_none());
    }

    #[test]
    fn test_try_zeros_rejects_impossible_shapes() {
        assert!(SampleMatrix::try_zeros(ElementType::Int16, usize::MAX, 2).is_none());
        assert!(SampleData::try_zeros(ElementType::Float64, usize::MAX).is_none());
        let m = SampleMatrix::try_zeros(ElementType::Int32, 4, 3).unwrap();
        assert_eq!(m.shape(), (4, 3));
        assert_eq!(m.data().len(), 12);
    }

    #[test]
    fn test_calibrate_identity() {
        let m = int16_matrix();
        let cal = calibrate(&m, &[1.0, 1.0], &[0.0, 0.0]).unwrap();
        for s in 0..3 {
            for c in 0..2 {
                assert_eq!(cal.get(s, c).map(f64::from), m.get(s, c));
            }
        }
    }

    #[test]
    fn test_calibrate_linear() {
        let m = int16_matrix();
        let cal = calibrate(&m, &[2.0, 0.5], &[1.0, -1.0]).unwrap();
        assert_eq!(cal.data, vec![3.0, -2.0, 7.0, -3.0, 11.0, -4.0]);
    }

    #[test]
    fn test_calibrate_coefficient_mismatch() {
        let m = int16_matrix();
        let err = calibrate(&m, &[1.0], &[0.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::CoefficientCount {
                channels: 2,
                coef_a: 1,
                coef_b: 2
            }
        );
    }

    #[test]
    fn test_document_calibrated_requires_coefficients() {
        let mut doc = Document::new(header());
        doc.samples = Some(int16_matrix());
        assert_eq!(
            doc.calibrated().unwrap_err(),
            CalibrationError::Missing("coefficient A")
        );
        doc.channels.coef_a = Some(vec![1.0, 1.0]);
        doc.channels.coef_b = Some(vec![0.0, 0.0]);
        assert!(doc.calibrated().is_ok());
    }

    #[test]
    fn test_start_time_parse() {
        let mut doc = Document::new(header());
        assert!(doc.start_time().is_none());
        doc.start_time_raw = Some("20180412153045".to_string());
        let t = doc.start_time().unwrap();
        assert_eq!(t.format("%Y-%m-%d %H:%M:%S").to_string(), "2018-04-12 15:30:45");
    }

    #[test]
    fn test_decimation_step() {
        assert_eq!(SampleMatrix::decimation_step(1000, 200.0), 5);
        assert_eq!(SampleMatrix::decimation_step(100, 200.0), 1);
        assert_eq!(SampleMatrix::decimation_step(10_000, 0.0), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let mut doc = Document::new(header());
        doc.samples = Some(int16_matrix());
        let json = serde_json::to_value(doc.summary()).unwrap();
        assert_eq!(json["header"]["channel_count"], 2);
        assert_eq!(json["element_type"], "int16");
        assert_eq!(json["shape"][0], 3);
    }
}
