/***************************************************************************************************
 * Copyright (c) 2022-2023, Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the “Software”), to deal in the Software without
 * restriction, including without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice (including the next
 * paragraph) shall be included in all copies or substantial portions of the
 * Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
 * BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 **************************************************************************************************/
/***************************************************************************************************
 * COSE_Sign1 and COSE_Sign test cases
 *
 * End-to-end signing and verification against the RFC 9052 message layouts. ECDSA signatures
 * are randomized (no RFC 6979 support in the backing crate), so the deterministic message
 * prefix is byte-checked and the signature itself is checked by verification.
 **************************************************************************************************/
extern crate cose_core;
extern crate cose_rustcrypto;

use cose_core::adapter::CryptoAdapter;
use cose_core::buffers::OutputBuffer;
use cose_core::constants::*;
use cose_core::error::COSEError;
use cose_core::header::Param;
use cose_core::message::{
    Payload, SignDecoder, SignEncoder, SignatureStatus, Signer, Verifier, KIND_MAIN,
    KIND_SHORT_CIRCUIT, OPT_DECODE_ONLY, OPT_OMIT_CBOR_TAG, OPT_TAG_FORBIDDEN, OPT_TAG_REQUIRED,
};
use cose_rustcrypto::RustCrypto;

// Keys for kid '11' from https://github.com/cose-wg/Examples/blob/master/KeySet.txt.
// Public key in uncompressed form per SEC1, v2.0.
const KID_11_PUB: [u8; 65] = [
    0x4, // x
    0xba, 0xc5, 0xb1, 0x1c, 0xad, 0x8f, 0x99, 0xf9, 0xc7, 0x2b, 0x05, 0xcf, 0x4b, 0x9e, 0x26,
    0xd2, 0x44, 0xdc, 0x18, 0x9f, 0x74, 0x52, 0x28, 0x25, 0x5a, 0x21, 0x9a, 0x86, 0xd6, 0xa0,
    0x9e, 0xff, // y
    0x20, 0x13, 0x8b, 0xf8, 0x2d, 0xc1, 0xb6, 0xd5, 0x62, 0xbe, 0x0f, 0xa5, 0x4a, 0xb7, 0x80,
    0x4a, 0x3a, 0x64, 0xb6, 0xd7, 0x2c, 0xcf, 0xed, 0x6b, 0x6f, 0xb6, 0xed, 0x28, 0xbb, 0xfc,
    0x11, 0x7e,
];
// kid '11' private key
const KID_11_PRIV: [u8; 32] = [
    0x57, 0xc9, 0x20, 0x77, 0x66, 0x41, 0x46, 0xe8, 0x76, 0x76, 0x0c, 0x95, 0x20, 0xd0, 0x54,
    0xaa, 0x93, 0xc3, 0xaf, 0xb0, 0x4e, 0x30, 0x67, 0x05, 0xdb, 0x60, 0x90, 0x30, 0x85, 0x07,
    0xb4, 0xd3,
];

fn sign1_hello(adapter: &RustCrypto, options: u32, buf: &mut [u8]) -> usize {
    let key = adapter
        .ec2_signing_key(CURVE_P256, &KID_11_PRIV)
        .expect("import signing key");
    let signer = Signer::main(ALG_ES256, key, Some(b"11".as_slice()));
    let mut out = OutputBuffer::new(buf);
    SignEncoder::sign1(adapter, options)
        .encode(Payload::Embedded(b"hello"), &[], &[signer], &mut out)
        .expect("sign1 encode")
}

#[test]
fn sign1_p256_message_layout() -> Result<(), COSEError> {
    println!("<===================== sign1_p256_message_layout ===================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = sign1_hello(&adapter, 0, &mut buf);

    // Tag 18, array of 4, protected << {1: -7} >>, unprotected {4: '11'}, payload 'hello',
    // then the 64-byte signature byte string.
    let expected_prefix: &[u8] = &[
        0xd2, 0x84, 0x43, 0xa1, 0x01, 0x26, 0xa1, 0x04, 0x42, 0x31, 0x31, 0x45, 0x68, 0x65,
        0x6c, 0x6c, 0x6f, 0x58, 0x40,
    ];
    assert_eq!(&buf[..expected_prefix.len()], expected_prefix);
    assert_eq!(n, expected_prefix.len() + 64);

    // Verification with the matching public key succeeds.
    let verify_key = adapter.ec2_verification_key(CURVE_P256, &KID_11_PUB)?;
    let verifiers = [Verifier::main(verify_key, Some(b"11".as_slice()))];
    let mut slots = [Param::EMPTY; 10];
    let decoded = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.payload, Some(b"hello".as_slice()));
    assert_eq!(decoded.body.alg, Some(ALG_ES256));
    assert_eq!(decoded.body.kid, Some(b"11".as_slice()));
    assert_eq!(decoded.verified, Some(0));
    Ok(())
}

#[test]
fn sign1_wrong_key_is_rejected() {
    println!("<===================== sign1_wrong_key_is_rejected =================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = sign1_hello(&adapter, 0, &mut buf);

    let other = adapter.generate_ec_key(CURVE_P256).expect("keygen");
    let other_pub = adapter.public_half(&other).expect("public half");
    let verifiers = [Verifier::main(other_pub, None)];
    let mut slots = [Param::EMPTY; 10];
    let outcome = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots);
    assert_eq!(outcome.err(), Some(COSEError::SigVerifyFailed));
}

#[test]
fn sign1_decode_only_consults_no_key() -> Result<(), COSEError> {
    println!("<===================== sign1_decode_only ===========================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = sign1_hello(&adapter, 0, &mut buf);

    // No verifiers are configured; DECODE_ONLY returns headers, payload and the raw
    // signature without touching a key.
    let mut slots = [Param::EMPTY; 10];
    let decoded = SignDecoder::sign1(&adapter, OPT_DECODE_ONLY).decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.body.alg, Some(ALG_ES256));
    assert_eq!(decoded.body.kid, Some(b"11".as_slice()));
    assert_eq!(decoded.payload, Some(b"hello".as_slice()));
    assert_eq!(decoded.signature.map(<[u8]>::len), Some(64));
    assert_eq!(decoded.verified, None);
    Ok(())
}

#[test]
fn sign1_tag_number_modes() -> Result<(), COSEError> {
    println!("<===================== sign1_tag_number_modes ======================>");
    let adapter = RustCrypto::new();
    let verify_key = adapter.ec2_verification_key(CURVE_P256, &KID_11_PUB)?;
    let verifiers = [Verifier::main(verify_key, None)];

    let mut tagged = [0u8; 256];
    let nt = sign1_hello(&adapter, 0, &mut tagged);
    let mut untagged = [0u8; 256];
    let nu = sign1_hello(&adapter, OPT_OMIT_CBOR_TAG, &mut untagged);
    assert_eq!(tagged[0], 0xd2);
    assert_ne!(untagged[0], 0xd2);

    // Tag-required rejects untagged input; tag-forbidden rejects tagged input; with neither
    // flag both forms decode to the same state.
    let mut slots = [Param::EMPTY; 10];
    assert_eq!(
        SignDecoder::sign1(&adapter, OPT_TAG_REQUIRED)
            .with_verifiers(&verifiers)
            .decode(&untagged[..nu], None, &mut slots)
            .err(),
        Some(COSEError::TagMismatch)
    );
    let mut slots = [Param::EMPTY; 10];
    assert_eq!(
        SignDecoder::sign1(&adapter, OPT_TAG_FORBIDDEN)
            .with_verifiers(&verifiers)
            .decode(&tagged[..nt], None, &mut slots)
            .err(),
        Some(COSEError::TagMismatch)
    );
    let mut slots = [Param::EMPTY; 10];
    let a = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&tagged[..nt], None, &mut slots)?;
    let mut slots2 = [Param::EMPTY; 10];
    let b = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&untagged[..nu], None, &mut slots2)?;
    assert_eq!(a.payload, b.payload);
    assert_eq!(a.body.alg, b.body.alg);
    assert_eq!(a.body.kid, b.body.kid);
    Ok(())
}

#[test]
fn sign1_detached_payload() -> Result<(), COSEError> {
    println!("<===================== sign1_detached_payload ======================>");
    let adapter = RustCrypto::new();
    let key = adapter.ec2_signing_key(CURVE_P256, &KID_11_PRIV)?;
    let signer = Signer::main(ALG_ES256, key, Some(b"11".as_slice()));
    let mut buf = [0u8; 256];
    let mut out = OutputBuffer::new(&mut buf);
    let n = SignEncoder::sign1(&adapter, 0).encode(
        Payload::Detached(b"conveyed elsewhere"),
        &[],
        &[signer],
        &mut out,
    )?;
    drop(out);

    // The payload slot holds null; the bytes travel out of band and must be re-supplied.
    let verify_key = adapter.ec2_verification_key(CURVE_P256, &KID_11_PUB)?;
    let verifiers = [Verifier::main(verify_key, None)];
    let mut slots = [Param::EMPTY; 10];
    let decoded = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], Some(b"conveyed elsewhere"), &mut slots)?;
    assert_eq!(decoded.payload, Some(b"conveyed elsewhere".as_slice()));

    let mut slots = [Param::EMPTY; 10];
    assert!(SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)
        .is_err());
    Ok(())
}

#[test]
fn sign1_sizing_matches_real_encode() -> Result<(), COSEError> {
    println!("<===================== sign1_sizing_matches_real ===================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = sign1_hello(&adapter, 0, &mut buf);

    let key = adapter.ec2_signing_key(CURVE_P256, &KID_11_PRIV)?;
    let signer = Signer::main(ALG_ES256, key, Some(b"11".as_slice()));
    let mut probe = OutputBuffer::sizing();
    let m = SignEncoder::sign1(&adapter, 0).encode(
        Payload::Embedded(b"hello"),
        &[],
        &[signer],
        &mut probe,
    )?;
    assert_eq!(n, m);
    Ok(())
}

#[test]
fn sign1_external_aad_is_bound() -> Result<(), COSEError> {
    println!("<===================== sign1_external_aad_is_bound =================>");
    let adapter = RustCrypto::new();
    let key = adapter.ec2_signing_key(CURVE_P256, &KID_11_PRIV)?;
    let signer = Signer::main(ALG_ES256, key, None);
    let mut buf = [0u8; 256];
    let mut out = OutputBuffer::new(&mut buf);
    let n = SignEncoder::sign1(&adapter, 0)
        .with_external_aad(b"session-42")
        .encode(Payload::Embedded(b"hello"), &[], &[signer], &mut out)?;
    drop(out);

    let verify_key = adapter.ec2_verification_key(CURVE_P256, &KID_11_PUB)?;
    let verifiers = [Verifier::main(verify_key, None)];
    let mut slots = [Param::EMPTY; 10];
    let ok = SignDecoder::sign1(&adapter, 0)
        .with_external_aad(b"session-42")
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots);
    assert!(ok.is_ok());

    let mut slots = [Param::EMPTY; 10];
    assert_eq!(
        SignDecoder::sign1(&adapter, 0)
            .with_verifiers(&verifiers)
            .decode(&buf[..n], None, &mut slots)
            .err(),
        Some(COSEError::SigVerifyFailed)
    );
    Ok(())
}

#[test]
fn sign1_short_circuit_scheme() -> Result<(), COSEError> {
    println!("<===================== sign1_short_circuit_scheme ==================>");
    let adapter = RustCrypto::new();
    let signer: Signer<RustCrypto> =
        Signer::short_circuit(ALG_SHORT_CIRCUIT_256, Some(b"t0".as_slice()));
    assert_eq!(signer.kind(), KIND_SHORT_CIRCUIT);
    let mut buf = [0u8; 256];
    let mut out = OutputBuffer::new(&mut buf);
    let n = SignEncoder::sign1(&adapter, 0).encode(
        Payload::Embedded(b"bring-up"),
        &[],
        &[signer],
        &mut out,
    )?;
    drop(out);

    let verifiers = [Verifier::short_circuit(Some(b"t0".as_slice()))];
    assert_eq!(verifiers[0].kind(), KIND_SHORT_CIRCUIT);
    let mut slots = [Param::EMPTY; 10];
    let decoded = SignDecoder::sign1(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.verified, Some(0));
    // The fake signature has the width of the matching ECDSA signature.
    assert_eq!(decoded.signature.map(<[u8]>::len), Some(64));

    // Any bit flip in the payload is caught.
    let mut tampered = [0u8; 256];
    tampered[..n].copy_from_slice(&buf[..n]);
    let payload_at = buf[..n]
        .windows(8)
        .position(|w| w == b"bring-up")
        .expect("payload position");
    tampered[payload_at] ^= 0x01;
    let mut slots = [Param::EMPTY; 10];
    assert_eq!(
        SignDecoder::sign1(&adapter, 0)
            .with_verifiers(&verifiers)
            .decode(&tampered[..n], None, &mut slots)
            .err(),
        Some(COSEError::SigVerifyFailed)
    );
    Ok(())
}

#[test]
fn sign1_eddsa_round_trip() -> Result<(), COSEError> {
    println!("<===================== sign1_eddsa_round_trip ======================>");
    let adapter = RustCrypto::new();
    let seed = [7u8; 32];
    let key = adapter.ed25519_signing_key(&seed);
    let verify_key = adapter.public_half(&key)?;
    let signer = Signer::main(ALG_EDDSA, key, Some(b"ed".as_slice()));
    assert_eq!(signer.kind(), KIND_MAIN);

    // EdDSA signs the whole Sig_structure, so both sides carry an auxiliary buffer.
    let mut aux = [0u8; 256];
    let mut buf = [0u8; 256];
    let mut out = OutputBuffer::new(&mut buf);
    let n = SignEncoder::sign1(&adapter, 0)
        .with_aux_buffer(&mut aux)
        .encode(Payload::Embedded(b"hello"), &[], &[signer], &mut out)?;
    drop(out);

    let verifiers = [Verifier::main(verify_key, Some(b"ed".as_slice()))];
    let mut aux2 = [0u8; 256];
    let mut slots = [Param::EMPTY; 10];
    let decoded = SignDecoder::sign1(&adapter, 0)
        .with_aux_buffer(&mut aux2)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.body.alg, Some(ALG_EDDSA));
    assert_eq!(decoded.verified, Some(0));
    Ok(())
}

#[test]
fn ecdsa_der_signatures_are_rejected() -> Result<(), COSEError> {
    println!("<===================== ecdsa_der_signatures_rejected ===============>");
    // The adapter accepts only the fixed-width r||s encoding; a DER-shaped blob of a
    // different length must fail verification outright.
    let adapter = RustCrypto::new();
    let verify_key = adapter.ec2_verification_key(CURVE_P256, &KID_11_PUB)?;
    let mut der = [0u8; 70];
    der[0] = 0x30;
    der[1] = 68;
    assert_eq!(
        adapter.verify(ALG_ES256, &verify_key, &[0u8; 32], &der),
        Err(COSEError::SigVerifyFailed)
    );
    Ok(())
}

fn two_signer_message(adapter: &RustCrypto, buf: &mut [u8]) -> (usize, cose_rustcrypto::RustCryptoKey, cose_rustcrypto::RustCryptoKey) {
    let k256 = adapter
        .ec2_signing_key(CURVE_P256, &KID_11_PRIV)
        .expect("p256 key");
    let p256_pub = adapter.public_half(&k256).expect("p256 public");
    let k384 = adapter.generate_ec_key(CURVE_P384).expect("p384 key");
    let p384_pub = adapter.public_half(&k384).expect("p384 public");

    let signers = [
        Signer::main(ALG_ES256, k256, Some(b"01".as_slice())),
        Signer::main(ALG_ES384, k384, Some(b"02".as_slice())),
    ];
    let mut out = OutputBuffer::new(buf);
    let n = SignEncoder::sign(adapter, 0)
        .encode(Payload::Embedded(b"hello"), &[], &signers, &mut out)
        .expect("sign encode");
    (n, p256_pub, p384_pub)
}

#[test]
fn sign_two_signatures_first_success_wins() -> Result<(), COSEError> {
    println!("<===================== sign_first_success_wins =====================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 512];
    let (n, p256_pub, _p384_pub) = two_signer_message(&adapter, &mut buf);
    assert_eq!(&buf[..2], &[0xd8, 0x62]);

    // Only the first signature's key is configured: it verifies and dispatch stops; the
    // second signature is never examined.
    let verifiers = [Verifier::main(p256_pub, Some(b"01".as_slice()))];
    let mut slots = [Param::EMPTY; 16];
    let decoded = SignDecoder::sign(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.n_signatures, 2);
    assert_eq!(decoded.verified, Some(0));
    assert_eq!(decoded.statuses[0], SignatureStatus::Verified);
    assert_eq!(decoded.statuses[1], SignatureStatus::NotChecked);
    Ok(())
}

#[test]
fn sign_second_signature_can_verify() -> Result<(), COSEError> {
    println!("<===================== sign_second_signature_verifies ==============>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 512];
    let (n, _p256_pub, p384_pub) = two_signer_message(&adapter, &mut buf);

    // The verifier's kid matches only the second signature; the first is declined softly.
    let verifiers = [Verifier::main(p384_pub, Some(b"02".as_slice()))];
    let mut slots = [Param::EMPTY; 16];
    let decoded = SignDecoder::sign(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots)?;
    assert_eq!(decoded.verified, Some(1));
    assert_eq!(decoded.statuses[0], SignatureStatus::Declined);
    assert_eq!(decoded.statuses[1], SignatureStatus::Verified);
    Ok(())
}

#[test]
fn sign_no_matching_verifier_declines() {
    println!("<===================== sign_no_match_declines ======================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 512];
    let (n, p256_pub, _p384_pub) = two_signer_message(&adapter, &mut buf);

    let verifiers = [Verifier::main(p256_pub, Some(b"99".as_slice()))];
    let mut slots = [Param::EMPTY; 16];
    let outcome = SignDecoder::sign(&adapter, 0)
        .with_verifiers(&verifiers)
        .decode(&buf[..n], None, &mut slots);
    assert_eq!(outcome.err(), Some(COSEError::Decline));
}
