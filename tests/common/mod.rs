//! Synthetic KS2 file builder shared by integration tests

#![allow(dead_code)]

use rand::prelude::*;
use rand::rngs::StdRng;

pub const HEADER_SIZE: usize = 256;

/// Length-field width of a tag, written out independently of the decoder
pub fn width_for(parent: u8, child: u8) -> usize {
    match (parent, child) {
        (1, 62) | (1, 70) | (16, 35) | (17, 1) => 4,
        (17, 2) | (18, 25) => 8,
        (18, 31) | (18, 32) => 2,
        (18, _) => 4,
        _ => 2,
    }
}

/// Every tag with a non-default width plus a few default ones
pub const WIDTH_TABLE_TAGS: &[(u8, u8)] = &[
    (1, 61),
    (1, 62),
    (1, 63),
    (1, 70),
    (2, 3),
    (2, 49),
    (16, 3),
    (16, 30),
    (16, 35),
    (17, 1),
    (17, 2),
    (18, 1),
    (18, 25),
    (18, 31),
    (18, 32),
    (18, 200),
];

/// Encode one tagged record
pub fn encode_record(parent: u8, child: u8, code: i32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![parent, child];
    let length = match child {
        // the 4-byte code overlaps the first two counted payload bytes
        63 => payload.len() as u64 + 4,
        _ => payload.len() as u64 + 2,
    };
    match width_for(parent, child) {
        2 => out.extend_from_slice(&(length as u16).to_le_bytes()),
        4 => out.extend_from_slice(&(length as u32).to_le_bytes()),
        _ => out.extend_from_slice(&length.to_le_bytes()),
    }
    match child {
        61 | 62 | 70 => out.extend_from_slice(&(code as i16).to_le_bytes()),
        63 => out.extend_from_slice(&code.to_le_bytes()),
        _ => out.extend_from_slice(&[0, code as u8]),
    }
    out.extend_from_slice(payload);
    out
}

/// NUL-padded fixed-width text fields
pub fn text_fields(values: &[&str], width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * width);
    for v in values {
        let mut field = v.as_bytes().to_vec();
        field.resize(width, 0);
        out.extend_from_slice(&field);
    }
    out
}

pub fn f32_fields(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Builder for a complete KS2 byte image
pub struct Ks2Builder {
    lines: Vec<String>,
    body: Vec<u8>,
}

impl Ks2Builder {
    pub fn new(channels: usize, sample_rate: u64) -> Self {
        let mut lines: Vec<String> = vec!["\"0\"".to_string(); 16];
        lines[0] = "\"EDX-100A\"".to_string();
        lines[1] = "\"01.00\"".to_string();
        lines[2] = "\"synthetic run\"".to_string();
        lines[3] = format!("\"{}\"", channels);
        lines[4] = format!("\"{}\"", channels);
        lines[5] = format!("\"{}\"", sample_rate);
        lines[9] = "\"1\"".to_string();
        Self {
            lines,
            body: Vec::new(),
        }
    }

    pub fn header_line(mut self, index: usize, value: &str) -> Self {
        self.lines[index] = value.to_string();
        self
    }

    pub fn record(mut self, parent: u8, child: u8, code: i32, payload: &[u8]) -> Self {
        self.body
            .extend_from_slice(&encode_record(parent, child, code, payload));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Channel metadata records (parent 2)
    pub fn channel_metadata(self, names: &[&str], units: &[&str], a: &[f32], b: &[f32]) -> Self {
        let index: Vec<u8> = (0..names.len() as i16)
            .flat_map(|i| i.to_le_bytes())
            .collect();
        let ranges: Vec<&str> = names.iter().map(|_| "5000uV/V").collect();
        let lpf: Vec<&str> = names.iter().map(|_| "1kHz").collect();
        let hpf: Vec<&str> = names.iter().map(|_| "OFF").collect();
        let ones: Vec<f32> = names.iter().map(|_| 1.0).collect();
        let zeros: Vec<f32> = names.iter().map(|_| 0.0).collect();
        self.record(2, 48, 1, &index)
            .record(2, 49, 0, &text_fields(names, 40))
            .record(2, 5, 0, &text_fields(units, 10))
            .record(2, 3, 3, &f32_fields(a))
            .record(2, 4, 3, &f32_fields(b))
            .record(2, 8, 3, &f32_fields(&ones))
            .record(2, 12, 3, &f32_fields(&zeros))
            .record(2, 51, 0, &text_fields(&ranges, 20))
            .record(2, 53, 0, &text_fields(&lpf, 20))
            .record(2, 54, 0, &text_fields(&hpf, 20))
    }

    /// Data header records (parent 16)
    pub fn data_header(self, start_time: &str, sample_count: u64) -> Self {
        let mut time = start_time.as_bytes().to_vec();
        time.resize(16, 0);
        self.record(16, 3, 0, &time)
            .record(16, 30, 8, &sample_count.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.body.len());
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        assert!(out.len() <= HEADER_SIZE, "fixed header overflow");
        out.resize(HEADER_SIZE, 0);
        out.extend_from_slice(&self.body);
        out
    }
}

/// Random int16 samples, row-major by sample
pub fn random_i16(rng: &mut StdRng, samples: usize, channels: usize) -> Vec<i16> {
    (0..samples * channels).map(|_| rng.gen()).collect()
}

pub fn i16_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Canonical single-block file with int16 samples
pub fn int16_file(
    rng: &mut StdRng,
    channels: usize,
    samples: usize,
    a: &[f32],
    b: &[f32],
) -> (Vec<u8>, Vec<i16>) {
    let names: Vec<String> = (0..channels).map(|i| format!("CH{:02}", i + 1)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let units: Vec<&str> = (0..channels).map(|_| "με").collect();
    let values = random_i16(rng, samples, channels);

    let bytes = Ks2Builder::new(channels, 1000)
        .record(1, 10, 0, b"KS2")
        .record(1, 62, 0, &[0; 6])
        .channel_metadata(&names, &units, a, b)
        .data_header("20240315093000", samples as u64)
        .record(17, 2, 1, &i16_bytes(&values))
        .record(18, 31, 0, &[])
        .record(18, 25, 0, &[0; 8])
        .build();
    (bytes, values)
}
