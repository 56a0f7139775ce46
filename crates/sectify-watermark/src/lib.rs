pub mod chip;
pub mod detect;
pub mod embed;
pub mod error;

pub use detect::detect_session;
pub use embed::embed_watermark;
pub use error::{WatermarkError, Result};

pub const SAMPLE_RATE_HZ: u32 = 44_100;
pub const CARRIER_HZ: f64 = 18_000.0;
pub const CHIP_LEN_SAMPLES: usize = 1024;
pub const PAYLOAD_BITS: usize = 64;
pub const UNIT_LEN_SAMPLES: usize = CHIP_LEN_SAMPLES * PAYLOAD_BITS;
/// Normalized-correlation threshold above which a detection is accepted.
pub const DETECTION_THRESHOLD: f32 = 0.6;
