//! Download progress reporting.

/// One progress report from the byte downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteProgress {
    /// Decoded bytes added since the previous report
    pub delta: u64,
    /// Decoded bytes so far
    pub bytes_read: u64,
    /// Decoded length, when known up front. `None` while a decoder is active.
    pub content_length: Option<u64>,
    /// Bytes received on the wire so far
    pub wire_read: u64,
    /// Length declared by the server, if any
    pub wire_length: Option<u64>,
}

impl ByteProgress {
    /// Fraction read, measured on decoded bytes when their total is known and
    /// on wire bytes otherwise.
    pub fn fraction(&self) -> Option<f64> {
        match (self.content_length, self.wire_length) {
            (Some(total), _) if total > 0 => Some(self.bytes_read as f64 / total as f64),
            (None, Some(total)) if total > 0 => Some(self.wire_read as f64 / total as f64),
            _ => None,
        }
    }
}

/// Compressed vs decompressed byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Bytes received on the wire
    pub compressed_bytes: u64,
    /// Bytes after decoding
    pub decompressed_bytes: u64,
}

impl DownloadStats {
    /// Accumulate another download.
    pub fn add(&mut self, other: DownloadStats) {
        self.compressed_bytes += other.compressed_bytes;
        self.decompressed_bytes += other.decompressed_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let p = ByteProgress {
            delta: 10,
            bytes_read: 50,
            content_length: Some(200),
            wire_read: 50,
            wire_length: Some(200),
        };
        assert_eq!(p.fraction(), Some(0.25));
        let unknown = ByteProgress {
            content_length: None,
            wire_length: None,
            ..p
        };
        assert_eq!(unknown.fraction(), None);
    }

    #[test]
    fn test_fraction_uses_wire_bytes_while_decoding() {
        let p = ByteProgress {
            delta: 4000,
            bytes_read: 40_000,
            content_length: None,
            wire_read: 110,
            wire_length: Some(275),
        };
        assert_eq!(p.fraction(), Some(0.4));
    }

    #[test]
    fn test_stats_add() {
        let mut total = DownloadStats::default();
        total.add(DownloadStats {
            compressed_bytes: 3,
            decompressed_bytes: 9,
        });
        total.add(DownloadStats {
            compressed_bytes: 1,
            decompressed_bytes: 1,
        });
        assert_eq!(total.compressed_bytes, 4);
        assert_eq!(total.decompressed_bytes, 10);
    }
}
