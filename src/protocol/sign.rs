// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! RSA signing and verification, per protocol version.
//!
//! V1 is the legacy scheme: the signing input (already a hex-encoded
//! digest, see [`super::canonical`]) is padded with PKCS#1 v1.5 type-1
//! padding and "encrypted" with the private key directly — no `DigestInfo`
//! prefix. V2 is standard RSASSA-PKCS1-v1_5 over a SHA-512 digest.
//!
//! Verification never errors on malformed signature bytes; an invalid
//! ciphertext is a verification failure, not a fault.

use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;

use super::ProtocolVersion;

/// Sign a canonical signing input with the private key.
pub fn sign_payload(
    version: ProtocolVersion,
    signing_input: &[u8],
    key: &RsaPrivateKey,
) -> Result<Vec<u8>, rsa::Error> {
    match version {
        ProtocolVersion::V1 => key.sign(Pkcs1v15Sign::new_unprefixed(), signing_input),
        ProtocolVersion::V2 => key.sign(Pkcs1v15Sign::new::<Sha512>(), signing_input),
    }
}

/// Verify a signature against a canonical signing input.
///
/// Returns `false` for any mismatch, including signatures that are not
/// valid ciphertext for the key at all.
pub fn verify_payload(
    version: ProtocolVersion,
    signing_input: &[u8],
    signature: &[u8],
    key: &RsaPublicKey,
) -> bool {
    let scheme = match version {
        ProtocolVersion::V1 => Pkcs1v15Sign::new_unprefixed(),
        ProtocolVersion::V2 => Pkcs1v15Sign::new::<Sha512>(),
    };
    key.verify(scheme, signing_input, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{signing_input_v1, signing_input_v2};
    use crate::testutil;

    #[test]
    fn v1_round_trip() {
        let (private_key, public_key) = testutil::test_keypair();
        let input = signing_input_v1("GET", "/studies", b"", &testutil::test_uuid(), 1000000000);
        let signature = sign_payload(ProtocolVersion::V1, &input, &private_key).unwrap();
        assert!(verify_payload(ProtocolVersion::V1, &input, &signature, &public_key));
    }

    #[test]
    fn v2_round_trip() {
        let (private_key, public_key) = testutil::test_keypair();
        let input = signing_input_v2(
            "POST",
            "/v1/things",
            Some("a=1"),
            b"{}",
            &testutil::test_uuid(),
            1000000000,
        );
        let signature = sign_payload(ProtocolVersion::V2, &input, &private_key).unwrap();
        assert!(verify_payload(ProtocolVersion::V2, &input, &signature, &public_key));
    }

    #[test]
    fn tampered_input_fails_verification() {
        let (private_key, public_key) = testutil::test_keypair();
        let input = signing_input_v2("GET", "/r", None, b"body", &testutil::test_uuid(), 42);
        let signature = sign_payload(ProtocolVersion::V2, &input, &private_key).unwrap();

        let tampered = signing_input_v2("GET", "/r", None, b"bodY", &testutil::test_uuid(), 42);
        assert!(!verify_payload(ProtocolVersion::V2, &tampered, &signature, &public_key));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (private_key, _) = testutil::test_keypair();
        let (_, other_public) = testutil::other_keypair();
        let input = signing_input_v1("GET", "/r", b"", &testutil::test_uuid(), 42);
        let signature = sign_payload(ProtocolVersion::V1, &input, &private_key).unwrap();
        assert!(!verify_payload(ProtocolVersion::V1, &input, &signature, &other_public));
    }

    #[test]
    fn malformed_signature_bytes_return_false_not_error() {
        let (_, public_key) = testutil::test_keypair();
        let input = signing_input_v1("GET", "/r", b"", &testutil::test_uuid(), 42);
        assert!(!verify_payload(ProtocolVersion::V1, &input, b"junk", &public_key));
        assert!(!verify_payload(ProtocolVersion::V2, &input, &[0u8; 256], &public_key));
    }
}
