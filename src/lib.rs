//! KS2-RS: Decoder for Kyowa KS2 data-acquisition recordings
//!
//! This crate reads the tagged-record KS2 format into a typed sample matrix
//! with per-channel calibration metadata.

pub mod common;
pub mod config;
pub mod ks2;

pub use ks2::{
    calibrate, decode_stream, open_and_decode, DecodeError, DecodeWarning, DecoderConfig,
    Document, Ks2Decoder,
};
