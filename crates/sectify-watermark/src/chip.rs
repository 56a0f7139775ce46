//! Deterministic chip-sequence and carrier synthesis shared by embedding and
//! detection. Everything here is a pure function of the session id so the
//! detector can regenerate the exact waveform an embedder produced without
//! any shared mutable state.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::{CARRIER_HZ, CHIP_LEN_SAMPLES, PAYLOAD_BITS, SAMPLE_RATE_HZ};

/// Derive the 64-bit payload for a session: `HKDF(session_id, "wm")`.
pub fn derive_payload_bits(session_id: &[u8]) -> [u8; 8] {
    let hk = Hkdf::<Sha256>::new(None, session_id);
    let mut out = [0u8; 8];
    hk.expand(b"wm", &mut out)
        .expect("8-byte output is within HKDF-SHA256 expand limits");
    out
}

fn bit_at(bits: &[u8; 8], index: usize) -> bool {
    let byte = bits[index / 8];
    (byte >> (7 - (index % 8))) & 1 == 1
}

/// Pseudo-random +1/-1 chip sequence for one payload bit, derived from the
/// session id and bit index so every bit gets an independent spreading code.
fn chip_sequence_for_bit(session_id: &[u8], bit_index: usize) -> Vec<i8> {
    let hk = Hkdf::<Sha256>::new(None, session_id);
    let info = format!("sectify-wm-chip-{bit_index}");
    let mut raw = vec![0u8; CHIP_LEN_SAMPLES / 8];
    hk.expand(info.as_bytes(), &mut raw)
        .expect("chip buffer size is within HKDF-SHA256 expand limits");
    let mut chips = Vec::with_capacity(CHIP_LEN_SAMPLES);
    for byte in raw {
        for bit in 0..8 {
            let one = (byte >> bit) & 1 == 1;
            chips.push(if one { 1i8 } else { -1i8 });
        }
    }
    chips
}

/// Build the full repeating watermark unit (one period of all 64 payload
/// bits, each spread over 1024 chips, modulated onto an 18 kHz carrier) as
/// unit-amplitude `f32` samples. Scale by the desired embedding amplitude
/// before adding to PCM.
pub fn synthesize_unit(session_id: &[u8]) -> Vec<f32> {
    let bits = derive_payload_bits(session_id);
    let mut unit = Vec::with_capacity(CHIP_LEN_SAMPLES * PAYLOAD_BITS);
    let mut sample_index: usize = 0;
    for bit_idx in 0..PAYLOAD_BITS {
        let sign: f32 = if bit_at(&bits, bit_idx) { 1.0 } else { -1.0 };
        let chips = chip_sequence_for_bit(session_id, bit_idx);
        for chip in chips {
            let t = sample_index as f64 / SAMPLE_RATE_HZ as f64;
            let carrier = (2.0 * std::f64::consts::PI * CARRIER_HZ * t).sin() as f32;
            unit.push(sign * chip as f32 * carrier);
            sample_index += 1;
        }
    }
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_differs_across_sessions() {
        let a = derive_payload_bits(b"session-a");
        let b = derive_payload_bits(b"session-b");
        assert_ne!(a, b);
    }

    #[test]
    fn unit_has_expected_length() {
        let unit = synthesize_unit(b"session-a");
        assert_eq!(unit.len(), CHIP_LEN_SAMPLES * PAYLOAD_BITS);
    }

    #[test]
    fn units_for_distinct_sessions_diverge() {
        let a = synthesize_unit(b"session-a");
        let b = synthesize_unit(b"session-b");
        assert_ne!(a, b);
    }

    #[test]
    fn unit_is_deterministic() {
        let a = synthesize_unit(b"session-a");
        let b = synthesize_unit(b"session-a");
        assert_eq!(a, b);
    }
}
