//! Golden test vector validation

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::Deserialize;

use qrseal::flow;

#[derive(Debug, Deserialize)]
struct GoldenVector {
    message: String,
    password: String,
    salt: String,
    nonce: String,
    payload: String,
    comment: String,
}

fn load_golden_vectors() -> Vec<GoldenVector> {
    let json_data = include_str!("../testdata/golden-vectors.json");
    serde_json::from_str(json_data).expect("failed to parse golden vectors")
}

#[test]
fn test_golden_vectors() {
    let vectors = load_golden_vectors();
    assert!(!vectors.is_empty(), "No golden vectors were tested");

    for (i, vector) in vectors.iter().enumerate() {
        let salt: [u8; 16] = BASE64_STANDARD
            .decode(&vector.salt)
            .expect("failed to decode salt")
            .try_into()
            .expect("salt must be 16 bytes");
        let nonce: [u8; 12] = BASE64_STANDARD
            .decode(&vector.nonce)
            .expect("failed to decode nonce")
            .try_into()
            .expect("nonce must be 12 bytes");

        let sealed = flow::encrypt_message_deterministic(
            &vector.message,
            vector.password.as_bytes(),
            &salt,
            &nonce,
        )
        .unwrap_or_else(|e| panic!("vector {} ({}): encrypt failed: {}", i, vector.comment, e));
        let text = sealed.to_text().unwrap();
        assert_eq!(
            text, vector.payload,
            "vector {} ({}): payload mismatch",
            i, vector.comment
        );

        let opened = flow::decrypt_payload(&vector.payload, vector.password.as_bytes())
            .unwrap_or_else(|e| panic!("vector {} ({}): decrypt failed: {}", i, vector.comment, e));
        assert_eq!(
            opened, vector.message,
            "vector {} ({}): message mismatch",
            i, vector.comment
        );
    }
}

#[test]
fn test_usage_example() {
    let vectors = load_golden_vectors();
    let vector = &vectors[0];
    assert_eq!(vector.message, "meet at dawn");

    let err = flow::decrypt_payload(&vector.payload, b"wrong-password").unwrap_err();
    assert_eq!(
        err.kind,
        Some(qrseal::error::ErrorKind::AuthenticationFailed)
    );
}
