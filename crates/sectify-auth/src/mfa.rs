//! Minimal TOTP (RFC 6238-shaped) verification over a user's raw
//! `mfa_secret` bytes. Enrolment and QR provisioning are out of scope —
//! this only checks a submitted code against the current time step and
//! one step of adjacent clock skew.

use hmac::{Hmac, Mac};
use sha2::Sha256;

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;

type HmacSha256 = Hmac<Sha256>;

fn hotp(secret: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);
    binary % 10u32.pow(DIGITS)
}

/// Accepts `code` for the time step containing `unix_time`, or either
/// adjacent step, to absorb typical authenticator-app clock drift.
pub fn verify_totp(secret: &[u8], code: &str, unix_time: u64) -> bool {
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(submitted) = code.parse::<u32>() else {
        return false;
    };
    let counter = unix_time / STEP_SECS;
    [counter.saturating_sub(1), counter, counter + 1]
        .into_iter()
        .any(|c| hotp(secret, c) == submitted)
}
