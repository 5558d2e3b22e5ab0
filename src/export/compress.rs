//! Compression adapter.
//!
//! A pure chunk transform between encoder and transport. Gzip uses the
//! default level; the encoder's internal state never exceeds the gzip window
//! because every call drains whatever the codec has produced so far.

use std::io::{self, Write};

use flate2::write::GzEncoder;

use crate::model::Compression;

/// Chunk-level compression between encoder and transport.
pub enum Compressor {
    /// No compression requested; chunks pass through untouched.
    Passthrough,
    /// Gzip at the default level.
    Gzip(GzEncoder<Vec<u8>>),
}

impl Compressor {
    /// Builds the adapter for the requested compression, or a passthrough.
    pub fn new(compression: Option<Compression>) -> Self {
        match compression {
            None => Compressor::Passthrough,
            Some(Compression::Gzip) => {
                Compressor::Gzip(GzEncoder::new(Vec::new(), flate2::Compression::default()))
            }
        }
    }

    /// Transforms one chunk, returning whatever bytes are ready downstream.
    pub fn process(&mut self, chunk: Vec<u8>) -> io::Result<Vec<u8>> {
        match self {
            Compressor::Passthrough => Ok(chunk),
            Compressor::Gzip(encoder) => {
                encoder.write_all(&chunk)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
        }
    }

    /// Finalizes the stream, returning the trailing bytes (gzip trailer).
    pub fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Compressor::Passthrough => Ok(Vec::new()),
            Compressor::Gzip(encoder) => encoder.finish(),
        }
    }
}
