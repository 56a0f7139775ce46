use crate::chip::synthesize_unit;
use crate::error::{Result, WatermarkError};
use crate::UNIT_LEN_SAMPLES;

/// Relative amplitude of the watermark against the signal peak, chosen so
/// the embedded energy sits at or below -40 dBFS (10^(-40/20) = 0.01).
const RELATIVE_AMPLITUDE: f32 = 0.01;

/// Embed the per-session fingerprint into 16-bit PCM in place. The
/// spreading unit is tiled across the full buffer so the fingerprint
/// survives truncation of the track to any sub-range at least one unit
/// long.
pub fn embed_watermark(pcm: &mut [i16], session_id: &[u8]) -> Result<()> {
    if pcm.is_empty() {
        return Err(WatermarkError::EmptyPcm);
    }
    let unit = synthesize_unit(session_id);
    let peak = pcm.iter().map(|s| s.unsigned_abs()).max().unwrap_or(1) as f32;
    let amplitude = (peak * RELATIVE_AMPLITUDE).max(1.0);

    for (i, sample) in pcm.iter_mut().enumerate() {
        let wm = unit[i % UNIT_LEN_SAMPLES] * amplitude;
        let mixed = *sample as f32 + wm;
        *sample = mixed.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
    Ok(())
}
