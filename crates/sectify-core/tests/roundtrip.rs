use proptest::prelude::*;
use sectify_core::{decrypt_envelope, encrypt_envelope, CoreError};

proptest! {
    /// decrypt(encrypt(B, k), k) == B for arbitrary B and k.
    #[test]
    fn round_trip_holds_for_arbitrary_input(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
        key_seed in any::<[u8; 32]>(),
    ) {
        let envelope = encrypt_envelope(&plaintext, &key_seed);
        let recovered = decrypt_envelope(&envelope, &key_seed).unwrap();
        prop_assert_eq!(recovered, plaintext);
    }

    /// Decrypting under any other key must not reproduce the plaintext.
    #[test]
    fn wrong_key_never_reproduces_plaintext(
        plaintext in proptest::collection::vec(any::<u8>(), 1..4096),
        key_a in any::<[u8; 32]>(),
        key_b in any::<[u8; 32]>(),
    ) {
        prop_assume!(key_a != key_b);
        let envelope = encrypt_envelope(&plaintext, &key_a);
        let result = decrypt_envelope(&envelope, &key_b);
        prop_assert!(matches!(result, Err(CoreError::IntegrityError)));
    }

    /// Flipping any single byte of the envelope flips HMAC verification.
    #[test]
    fn any_byte_tamper_fails_integrity(
        plaintext in proptest::collection::vec(any::<u8>(), 1..256),
        key_seed in any::<[u8; 32]>(),
        flip_index in any::<proptest::sample::Index>(),
    ) {
        let mut envelope = encrypt_envelope(&plaintext, &key_seed);
        let idx = flip_index.index(envelope.len());
        envelope[idx] ^= 0x01;
        let result = decrypt_envelope(&envelope, &key_seed);
        prop_assert!(result.is_err());
    }
}
