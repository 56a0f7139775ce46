//! Chaotic stream cipher: a deterrent/obfuscation layer for at-rest
//! audio, not a replacement for AEAD. Authenticity comes entirely from the
//! trailing HMAC — the keystream itself carries no integrity guarantee.
//!
//! The logistic-map state is iterated in Q2.62 fixed-point (2 integer bits,
//! 62 fraction bits, packed into a `u64`) to keep the keystream reproducible
//! across platforms; `f64` iteration is explicitly disallowed by the design
//! (IEEE-754 rounding is not guaranteed bit-identical across targets).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// 2 integer bits + 62 fraction bits. `ONE` is the fixed-point value 1.0.
const FRAC_BITS: u32 = 62;
const ONE: u64 = 1u64 << FRAC_BITS;

pub const MAGIC: [u8; 4] = [0x53, 0x45, 0x43, 0x01];
pub const VERSION: u8 = 0x01;
pub const NONCE_LEN: usize = 16;
const HMAC_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 1 + NONCE_LEN;

/// Multiply two Q2.62 fixed-point values, rounding down.
fn mul_q2_62(a: u64, b: u64) -> u64 {
    let product = (a as u128) * (b as u128);
    (product >> FRAC_BITS) as u64
}

/// Map a raw `u64` into the half-open fixed-point interval `(lo, hi)`
/// without touching a floating-point unit.
fn scale_into(raw: u64, lo: u64, hi: u64) -> u64 {
    let span = (hi - lo) as u128;
    let scaled = ((raw as u128) * span) >> 64;
    lo + scaled as u64
}

/// Iterated logistic map `x_{n+1} = r * x_n * (1 - x_n)` in Q2.62 fixed
/// point, seeded from the file key and nonce. One byte is emitted per 8
/// iterations by extracting the top byte of the resulting fraction.
struct ChaoticKeystream {
    state: u64,
    r: u64,
}

impl ChaoticKeystream {
    /// `r` is restricted to the chaotic band `[3.9, 3.99999...)`; `state`
    /// (x0) is restricted to `(0, 1)` — both required for the logistic map
    /// to exhibit chaotic (non-periodic, non-convergent) behavior.
    fn seed(file_key: &[u8; 32], file_nonce: &[u8; NONCE_LEN]) -> Self {
        let mut mac = HmacSha256::new_from_slice(file_key).expect("HMAC accepts any key length");
        mac.update(b"sectify-chaotic-seed");
        mac.update(file_nonce);
        let digest = mac.finalize().into_bytes();

        let seed_x0 = u64::from_be_bytes(digest[0..8].try_into().unwrap());
        let seed_r = u64::from_be_bytes(digest[8..16].try_into().unwrap());

        const R_MIN: u64 = (39 * ONE) / 10; // 3.9
        const R_MAX: u64 = (399_999 * ONE) / 100_000; // 3.99999

        let state = scale_into(seed_x0, 1, ONE - 1);
        let r = scale_into(seed_r, R_MIN, R_MAX);

        ChaoticKeystream { state, r }
    }

    fn step(&mut self) {
        let one_minus = ONE - self.state;
        let x_times_1_minus_x = mul_q2_62(self.state, one_minus);
        let mut next = mul_q2_62(self.r, x_times_1_minus_x);
        // Defensive clamp: fixed-point rounding can in principle nudge the
        // state to the boundary, which would otherwise collapse the
        // sequence to a fixed point.
        if next == 0 {
            next = 1;
        } else if next >= ONE {
            next = ONE - 1;
        }
        self.state = next;
    }

    fn next_byte(&mut self) -> u8 {
        for _ in 0..8 {
            self.step();
        }
        (self.state >> (FRAC_BITS - 8)) as u8
    }
}

/// XOR `data` in place with the keystream derived from `(file_key,
/// file_nonce)`. Symmetric: calling twice with the same key/nonce restores
/// the original bytes.
fn xor_keystream(data: &mut [u8], file_key: &[u8; 32], file_nonce: &[u8; NONCE_LEN]) {
    let mut ks = ChaoticKeystream::seed(file_key, file_nonce);
    for byte in data.iter_mut() {
        *byte ^= ks.next_byte();
    }
}

/// Encrypt `plaintext` into the at-rest envelope:
/// `magic(4) || version(1) || nonce(16) || ciphertext(N) || hmac(32)`.
pub fn encrypt_envelope(plaintext: &[u8], file_key: &[u8; 32]) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce);
    encrypt_envelope_with_nonce(plaintext, file_key, nonce)
}

/// Like [`encrypt_envelope`] but with an explicit nonce instead of a fresh
/// CSPRNG one. Exposed for known-answer test tooling (`tools/cipher-kat`);
/// production callers should use [`encrypt_envelope`].
pub fn encrypt_envelope_with_nonce(
    plaintext: &[u8],
    file_key: &[u8; 32],
    nonce: [u8; NONCE_LEN],
) -> Vec<u8> {
    let mut ciphertext = plaintext.to_vec();
    xor_keystream(&mut ciphertext, file_key, &nonce);

    let mut envelope = Vec::with_capacity(HEADER_LEN + ciphertext.len() + HMAC_LEN);
    envelope.extend_from_slice(&MAGIC);
    envelope.push(VERSION);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    ciphertext.zeroize();

    let mut mac = HmacSha256::new_from_slice(file_key).expect("HMAC accepts any key length");
    mac.update(&envelope);
    let tag = mac.finalize().into_bytes();
    envelope.extend_from_slice(&tag);
    envelope
}

/// Verify the trailing HMAC and decrypt. No plaintext byte is ever emitted
/// before the tag has been checked in constant time.
pub fn decrypt_envelope(envelope: &[u8], file_key: &[u8; 32]) -> Result<Vec<u8>> {
    if envelope.len() < HEADER_LEN + HMAC_LEN {
        return Err(CoreError::TruncatedEnvelope);
    }
    let (body, tag) = envelope.split_at(envelope.len() - HMAC_LEN);

    let mut mac = HmacSha256::new_from_slice(file_key).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    if expected.as_slice().ct_eq(tag).unwrap_u8() != 1 {
        return Err(CoreError::IntegrityError);
    }

    if body[0..MAGIC.len()] != MAGIC || body[MAGIC.len()] != VERSION {
        return Err(CoreError::BadMagic);
    }

    let nonce: [u8; NONCE_LEN] = body[MAGIC.len() + 1..HEADER_LEN].try_into().unwrap();
    let mut plaintext = body[HEADER_LEN..].to_vec();
    xor_keystream(&mut plaintext, file_key, &nonce);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn round_trip() {
        let k = key(7);
        let pt = b"the quick brown fox jumps over the lazy dog".to_vec();
        let env = encrypt_envelope(&pt, &k);
        let rt = decrypt_envelope(&env, &k).unwrap();
        assert_eq!(rt, pt);
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let k1 = key(1);
        let k2 = key(2);
        let env = encrypt_envelope(b"secret audio bytes", &k1);
        let err = decrypt_envelope(&env, &k2).unwrap_err();
        assert!(matches!(err, CoreError::IntegrityError));
    }

    #[test]
    fn tampered_byte_fails_integrity() {
        let k = key(3);
        let mut env = encrypt_envelope(b"secret audio bytes", &k);
        let last = env.len() - 1;
        env[HEADER_LEN] ^= 0x01;
        let _ = last;
        let err = decrypt_envelope(&env, &k).unwrap_err();
        assert!(matches!(err, CoreError::IntegrityError));
    }

    #[test]
    fn header_matches_scenario_one() {
        let k = key(9);
        let env = encrypt_envelope_with_nonce(b"x", &k, [0x01; NONCE_LEN]);
        assert_eq!(&env[0..5], &[0x53, 0x45, 0x43, 0x01, 0x01]);
    }

    #[test]
    fn keystream_is_not_trivially_constant() {
        let k = key(4);
        let nonce = [0x42u8; NONCE_LEN];
        let mut ks = ChaoticKeystream::seed(&k, &nonce);
        let bytes: Vec<u8> = (0..256).map(|_| ks.next_byte()).collect();
        let distinct: std::collections::HashSet<u8> = bytes.iter().copied().collect();
        assert!(distinct.len() > 32, "keystream looks degenerate: {distinct:?}");
    }

    #[test]
    fn different_nonces_diverge() {
        let k = key(5);
        let mut a = ChaoticKeystream::seed(&k, &[1u8; NONCE_LEN]);
        let mut b = ChaoticKeystream::seed(&k, &[2u8; NONCE_LEN]);
        let sa: Vec<u8> = (0..32).map(|_| a.next_byte()).collect();
        let sb: Vec<u8> = (0..32).map(|_| b.next_byte()).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let k = key(6);
        let env = encrypt_envelope(b"", &k);
        let rt = decrypt_envelope(&env, &k).unwrap();
        assert!(rt.is_empty());
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let err = decrypt_envelope(&[0u8; 4], &key(1)).unwrap_err();
        assert!(matches!(err, CoreError::TruncatedEnvelope));
    }
}
