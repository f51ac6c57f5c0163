//! Chunked binary accumulation with optional decompression.
//!
//! The downloader consumes network chunks in slices of at most `chunk_size`
//! bytes and reports a [`ByteProgress`] after each slice. For `gzip` and
//! `deflate` bodies a streaming decoder sits between the network and the
//! payload, so progress always counts decoded bytes. The declared length then
//! describes the wire body only, so it is reported as `wire_length` and
//! `content_length` stays `None`. The sum of all reported
//! deltas (including the one returned by [`finish`](ByteDownloader::finish))
//! equals the final payload length.

use crate::protocol::ContentEncoding;
use crate::types::{ByteProgress, DownloadStats};
use bytes::{Bytes, BytesMut};
use flate2::write::{GzDecoder, ZlibDecoder};
use std::io::{self, Write};

enum Decoder {
    Identity,
    Gzip(Box<GzDecoder<Vec<u8>>>),
    Deflate(Box<ZlibDecoder<Vec<u8>>>),
}

impl Decoder {
    fn for_encoding(encoding: &ContentEncoding) -> Self {
        match encoding {
            ContentEncoding::Gzip => Decoder::Gzip(Box::new(GzDecoder::new(Vec::new()))),
            ContentEncoding::Deflate => Decoder::Deflate(Box::new(ZlibDecoder::new(Vec::new()))),
            _ => Decoder::Identity,
        }
    }

    /// Decode `input`, returning whatever output the decoder produced.
    fn decode(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Decoder::Identity => Ok(input.to_vec()),
            Decoder::Gzip(d) => {
                d.write_all(input)?;
                Ok(std::mem::take(d.get_mut()))
            }
            Decoder::Deflate(d) => {
                d.write_all(input)?;
                Ok(std::mem::take(d.get_mut()))
            }
        }
    }

    /// Flush the decoder and return its remaining output.
    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Decoder::Identity => Ok(Vec::new()),
            Decoder::Gzip(d) => (*d).finish(),
            Decoder::Deflate(d) => (*d).finish(),
        }
    }
}

/// Incremental byte-array reader.
pub struct ByteDownloader {
    decoder: Decoder,
    chunk_size: usize,
    content_length: Option<u64>,
    payload: BytesMut,
    compressed_bytes: u64,
}

impl ByteDownloader {
    /// Create a downloader for a body with the given coding.
    ///
    /// With `decompress` off the body is kept as received.
    pub fn new(
        encoding: &ContentEncoding,
        decompress: bool,
        content_length: Option<u64>,
        chunk_size: usize,
    ) -> Self {
        let decoder = if decompress {
            Decoder::for_encoding(encoding)
        } else {
            Decoder::Identity
        };
        ByteDownloader {
            decoder,
            chunk_size: chunk_size.max(1),
            content_length,
            payload: BytesMut::with_capacity(content_length.unwrap_or(0).min(1 << 24) as usize),
            compressed_bytes: 0,
        }
    }

    /// Whether a decoder is active.
    pub fn is_decoding(&self) -> bool {
        !matches!(self.decoder, Decoder::Identity)
    }

    /// Consume one network chunk. Returns one progress report per slice.
    pub fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<ByteProgress>> {
        let mut reports = Vec::with_capacity(chunk.len() / self.chunk_size + 1);
        for slice in chunk.chunks(self.chunk_size) {
            self.compressed_bytes += slice.len() as u64;
            let decoded = self.decoder.decode(slice)?;
            self.payload.extend_from_slice(&decoded);
            reports.push(self.progress(decoded.len() as u64));
        }
        Ok(reports)
    }

    /// Decoded bytes so far.
    pub fn bytes_read(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Flush the decoder and hand back the payload.
    ///
    /// The progress report is `Some` only when the decoder produced a tail.
    pub fn finish(mut self) -> io::Result<(Bytes, DownloadStats, Option<ByteProgress>)> {
        let decoder = std::mem::replace(&mut self.decoder, Decoder::Identity);
        let tail = decoder.finish()?;
        let tail_report = if tail.is_empty() {
            None
        } else {
            self.payload.extend_from_slice(&tail);
            Some(self.progress(tail.len() as u64))
        };

        let stats = DownloadStats {
            compressed_bytes: self.compressed_bytes,
            decompressed_bytes: self.payload.len() as u64,
        };
        Ok((self.payload.freeze(), stats, tail_report))
    }

    fn progress(&self, delta: u64) -> ByteProgress {
        ByteProgress {
            delta,
            bytes_read: self.payload.len() as u64,
            content_length: if self.is_decoding() { None } else { self.content_length },
            wire_read: self.compressed_bytes,
            wire_length: self.content_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn drive(mut downloader: ByteDownloader, body: &[u8], net_chunk: usize) -> (Bytes, DownloadStats, u64) {
        let mut delta_sum = 0;
        for chunk in body.chunks(net_chunk) {
            for report in downloader.push(chunk).unwrap() {
                delta_sum += report.delta;
            }
        }
        let (payload, stats, tail) = downloader.finish().unwrap();
        delta_sum += tail.map_or(0, |t| t.delta);
        (payload, stats, delta_sum)
    }

    #[test]
    fn test_identity_progress_sums_to_length() {
        let data = sample(35_588);
        let downloader =
            ByteDownloader::new(&ContentEncoding::Identity, true, Some(data.len() as u64), 8192);
        assert!(!downloader.is_decoding());
        let (payload, stats, delta_sum) = drive(downloader, &data, 10_000);
        assert_eq!(payload.as_ref(), &data[..]);
        assert_eq!(delta_sum, data.len() as u64);
        assert_eq!(stats.compressed_bytes, stats.decompressed_bytes);
    }

    #[test]
    fn test_slices_respect_chunk_size() {
        let mut downloader = ByteDownloader::new(&ContentEncoding::Identity, true, None, 100);
        let reports = downloader.push(&sample(250)).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].delta, 100);
        assert_eq!(reports[2].delta, 50);
        assert_eq!(reports[2].bytes_read, 250);
        assert_eq!(reports[2].content_length, None);
        assert_eq!(reports[2].wire_read, 250);
    }

    #[test]
    fn test_gzip_progress_stays_within_lengths() {
        let data = sample(40_000);
        let body = gzip(&data);
        let mut downloader =
            ByteDownloader::new(&ContentEncoding::Gzip, true, Some(body.len() as u64), 64);
        let mut reports = Vec::new();
        for chunk in body.chunks(100) {
            reports.extend(downloader.push(chunk).unwrap());
        }
        for report in &reports {
            assert_eq!(report.content_length, None);
            assert_eq!(report.wire_length, Some(body.len() as u64));
            assert!(report.wire_read <= body.len() as u64);
            assert!(report.fraction().unwrap() <= 1.0);
        }
        assert_eq!(reports.last().unwrap().wire_read, body.len() as u64);
    }

    #[test]
    fn test_identity_progress_reports_declared_length() {
        let data = sample(1000);
        let mut downloader =
            ByteDownloader::new(&ContentEncoding::Identity, true, Some(1000), 300);
        let reports = downloader.push(&data).unwrap();
        let last = reports.last().unwrap();
        assert_eq!(last.content_length, Some(1000));
        assert_eq!(last.bytes_read, 1000);
        assert_eq!(last.fraction(), Some(1.0));
    }

    #[test]
    fn test_gzip_decoded() {
        let data = sample(50_000);
        let body = gzip(&data);
        let downloader =
            ByteDownloader::new(&ContentEncoding::Gzip, true, Some(body.len() as u64), 1024);
        assert!(downloader.is_decoding());
        let (payload, stats, delta_sum) = drive(downloader, &body, 3000);
        assert_eq!(payload.as_ref(), &data[..]);
        assert_eq!(delta_sum, data.len() as u64);
        assert_eq!(stats.compressed_bytes, body.len() as u64);
        assert_eq!(stats.decompressed_bytes, data.len() as u64);
    }

    #[test]
    fn test_deflate_decoded() {
        let data = b"deflate me ".repeat(200);
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(&data).unwrap();
        let body = enc.finish().unwrap();

        let downloader = ByteDownloader::new(&ContentEncoding::Deflate, true, None, 64);
        let (payload, _, delta_sum) = drive(downloader, &body, 100);
        assert_eq!(payload.as_ref(), &data[..]);
        assert_eq!(delta_sum, data.len() as u64);
    }

    #[test]
    fn test_decompress_disabled_keeps_raw() {
        let body = gzip(b"hello");
        let downloader = ByteDownloader::new(&ContentEncoding::Gzip, false, None, 1024);
        let (payload, _, _) = drive(downloader, &body, 1024);
        assert_eq!(payload.as_ref(), &body[..]);
    }

    #[test]
    fn test_corrupt_gzip_errors() {
        let mut downloader = ByteDownloader::new(&ContentEncoding::Gzip, true, None, 1024);
        let pushed = downloader.push(b"definitely not gzip data at all");
        let failed = pushed.is_err() || downloader.finish().is_err();
        assert!(failed);
    }
}
