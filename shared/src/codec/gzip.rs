//! Gzip body compression.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compresses `data` with gzip at the fastest level.
///
/// # Errors
///
/// Returns an I/O error if the encoder fails.
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompresses a gzip stream.
///
/// # Errors
///
/// Returns an I/O error if `data` is not a valid gzip stream.
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Returns true if a `Content-Encoding` or `Accept-Encoding` header value
/// lists gzip.
#[must_use]
pub fn accepts_gzip(header_value: &str) -> bool {
    header_value.split(',').any(|coding| {
        coding
            .split(';')
            .next()
            .is_some_and(|name| name.trim().eq_ignore_ascii_case("gzip"))
    })
}
