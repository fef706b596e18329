//! Fuzz test for payload verification.
//!
//! Feeds arbitrary bytes and tags to the verifier (which must reject them
//! without panicking), then signs the same bytes as a value and checks the
//! round trip.
//!
//! Run with: cargo +nightly fuzz run payload_verify_fuzz -- -max_total_time=60

#![no_main]

use babel_cache::{SignedPayload, Signer, TAG_LEN};
use babel_core::{CacheSecret, CacheValue};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(secret) = CacheSecret::new(vec![0x42; 32]) else {
        return;
    };
    let signer = Signer::new(secret, 64 * 1024);

    // Forged tag: the last TAG_LEN bytes, if any.
    if data.len() >= TAG_LEN {
        let (bytes, tag) = data.split_at(data.len() - TAG_LEN);
        let mut tag_arr = [0u8; TAG_LEN];
        tag_arr.copy_from_slice(tag);
        let forged = SignedPayload::from_parts(bytes.to_vec(), tag_arr);
        assert!(signer.verify(&forged).is_err(), "forged tag accepted");
    }

    // Sign the raw bytes as a value and verify the round trip.
    let value = CacheValue::Bytes(data.to_vec());
    if let Ok(payload) = signer.sign(&value) {
        assert_eq!(signer.verify(&payload).ok(), Some(value));
    }
});
