use crate::chip::synthesize_unit;
use crate::{DETECTION_THRESHOLD, UNIT_LEN_SAMPLES};

fn normalized_correlation(candidate: &[i16], unit: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut energy_candidate = 0.0f64;
    let mut energy_unit = 0.0f64;
    for (i, &sample) in candidate.iter().enumerate() {
        let s = sample as f64;
        let u = unit[i % UNIT_LEN_SAMPLES] as f64;
        dot += s * u;
        energy_candidate += s * s;
        energy_unit += u * u;
    }
    if energy_candidate == 0.0 || energy_unit == 0.0 {
        return 0.0;
    }
    (dot / (energy_candidate.sqrt() * energy_unit.sqrt())) as f32
}

/// Correlate `candidate` PCM against every registered session's spreading
/// unit and return the session with the highest normalized correlation, if
/// it clears [`DETECTION_THRESHOLD`].
///
/// `registry` maps an opaque session identifier to the session id bytes
/// the unit was originally derived from (the registry stores what it was
/// minted with, not the synthesized waveform, so regeneration here is
/// always consistent with [`crate::embed::embed_watermark`]).
pub fn detect_session<'a, I>(candidate: &[i16], registry: I) -> Option<(String, f32)>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<u8>)>,
{
    let mut best: Option<(String, f32)> = None;
    for (session_label, session_id) in registry {
        let unit = synthesize_unit(session_id);
        let score = normalized_correlation(candidate, &unit);
        if best.as_ref().map(|(_, b)| score > *b).unwrap_or(true) {
            best = Some((session_label.clone(), score));
        }
    }
    best.filter(|(_, score)| *score >= DETECTION_THRESHOLD)
}
