use std::fmt;
use std::io::{Cursor, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};

use crate::error::{CompressError, Error, Result};

/// Reports how many bytes a stream occupies once compressed.
pub trait Compressor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn compressed_size(&self, bytes: &[u8]) -> std::result::Result<usize, CompressError>;
}

pub const COMPRESSOR_NAMES: &[&str] = &["deflate", "gzip", "zlib", "zstd", "tar"];

pub fn compressor_by_name(name: &str) -> Result<Arc<dyn Compressor>> {
    match name {
        "deflate" => Ok(Arc::new(FlateCompressor::new(FlateFormat::Deflate))),
        "gzip" => Ok(Arc::new(FlateCompressor::new(FlateFormat::Gzip))),
        "zlib" => Ok(Arc::new(FlateCompressor::new(FlateFormat::Zlib))),
        "zstd" => Ok(Arc::new(ZstdCompressor::default())),
        "tar" => Ok(Arc::new(TarArchiver)),
        other => Err(Error::UnknownCompressor(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlateFormat {
    Deflate,
    Gzip,
    Zlib,
}

#[derive(Debug, Clone, Copy)]
pub struct FlateCompressor {
    format: FlateFormat,
    level: Compression,
}

impl FlateCompressor {
    pub fn new(format: FlateFormat) -> Self {
        Self {
            format,
            level: Compression::best(),
        }
    }
}

fn finish_len<W: Write>(
    mut enc: W,
    bytes: &[u8],
    finish: impl FnOnce(W) -> std::io::Result<Vec<u8>>,
) -> std::result::Result<usize, CompressError> {
    enc.write_all(bytes)?;
    Ok(finish(enc)?.len())
}

impl Compressor for FlateCompressor {
    fn name(&self) -> &'static str {
        match self.format {
            FlateFormat::Deflate => "deflate",
            FlateFormat::Gzip => "gzip",
            FlateFormat::Zlib => "zlib",
        }
    }

    fn compressed_size(&self, bytes: &[u8]) -> std::result::Result<usize, CompressError> {
        match self.format {
            FlateFormat::Deflate => finish_len(
                DeflateEncoder::new(Vec::new(), self.level),
                bytes,
                DeflateEncoder::finish,
            ),
            FlateFormat::Gzip => finish_len(
                GzEncoder::new(Vec::new(), self.level),
                bytes,
                GzEncoder::finish,
            ),
            FlateFormat::Zlib => finish_len(
                ZlibEncoder::new(Vec::new(), self.level),
                bytes,
                ZlibEncoder::finish,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 19 }
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compressed_size(&self, bytes: &[u8]) -> std::result::Result<usize, CompressError> {
        Ok(zstd::stream::encode_all(Cursor::new(bytes), self.level)?.len())
    }
}

/// Archive-only format: there is no streaming size to report.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiver;

impl Compressor for TarArchiver {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn compressed_size(&self, _bytes: &[u8]) -> std::result::Result<usize, CompressError> {
        Err(CompressError::NotSupported("tar"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"while (i < n) { total += values[i]; i++; }\n";

    #[test]
    fn every_streaming_compressor_shrinks_repetitive_input() {
        let input = TEXT.repeat(64);
        for name in ["deflate", "gzip", "zlib", "zstd"] {
            let c = compressor_by_name(name).unwrap();
            let size = c.compressed_size(&input).unwrap();
            assert!(size > 0 && size < input.len() / 4, "{name}: {size}");
        }
    }

    #[test]
    fn tar_reports_not_supported_rather_than_io() {
        let c = compressor_by_name("tar").unwrap();
        assert!(matches!(
            c.compressed_size(TEXT),
            Err(CompressError::NotSupported("tar"))
        ));
    }

    #[test]
    fn gzip_framing_costs_more_than_raw_deflate() {
        let deflate = FlateCompressor::new(FlateFormat::Deflate)
            .compressed_size(TEXT)
            .unwrap();
        let gzip = FlateCompressor::new(FlateFormat::Gzip)
            .compressed_size(TEXT)
            .unwrap();
        assert!(gzip > deflate);
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        assert!(matches!(
            compressor_by_name("rar"),
            Err(Error::UnknownCompressor(_))
        ));
    }
}
