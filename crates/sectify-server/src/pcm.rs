//! Raw little-endian 16-bit PCM <-> byte-buffer conversion. The at-rest
//! ciphertext envelope carries these bytes directly; the transcode step
//! that would produce them from an arbitrary upload format is an external
//! subprocess, out of scope here.

/// Interprets `bytes` as little-endian `i16` samples. Trailing odd byte
/// (malformed input) is dropped rather than panicking.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 12345];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes_to_samples(&bytes), samples);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let bytes = vec![1, 0, 2, 0, 0xff];
        assert_eq!(bytes_to_samples(&bytes), vec![1i16, 2i16]);
    }
}
