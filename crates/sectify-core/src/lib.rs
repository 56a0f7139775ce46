pub mod chaotic_cipher;
pub mod error;
pub mod kdf;

pub use chaotic_cipher::{decrypt_envelope, encrypt_envelope, encrypt_envelope_with_nonce};
pub use error::{CoreError, Result};
pub use kdf::{derive_key, file_at_rest_salt, MasterSecret, Purpose};
