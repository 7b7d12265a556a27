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
 * COSE_Encrypt0 and COSE_Encrypt test cases
 *
 * End-to-end encryption over the RFC 9052 message layouts, including the recipient
 * mechanisms: AES Key Wrap, ECDH-ES + HKDF + AES-KW with the RFC 9053 KDF context, HPKE Base
 * mode, and direct key use. AES-GCM ciphertext depends on a random nonce, so the tests check
 * round-trip and tamper behavior rather than ciphertext constants.
 **************************************************************************************************/
extern crate cose_core;
extern crate cose_rustcrypto;

use cose_core::adapter::{hpke_suite_for_alg, CryptoAdapter, NoCrypto};
use cose_core::buffers::OutputBuffer;
use cose_core::constants::*;
use cose_core::error::COSEError;
use cose_core::header::Param;
use cose_core::message::{
    AesKwRecipient, AesKwRecipientDecoder, DirectRecipient, DirectRecipientDecoder,
    EncryptDecoder, EncryptEncoder, EsdhRecipient, EsdhRecipientDecoder, HpkeRecipient,
    HpkeRecipientDecoder, PartyInfo, Recipient, RecipientDecoder, SaltMode, OPT_DECODE_ONLY,
};
use cose_rustcrypto::RustCrypto;

const KEY_128: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

fn encrypt0_message(
    adapter: &RustCrypto,
    plaintext: &[u8],
    aad: Option<&'static [u8]>,
    buf: &mut [u8],
) -> usize {
    let key = adapter.symmetric_key(&KEY_128);
    let mut out = OutputBuffer::new(buf);
    let mut enc = EncryptEncoder::encrypt0(adapter, ALG_A128GCM, 0);
    if let Some(aad) = aad {
        enc = enc.with_external_aad(aad);
    }
    enc.encode(plaintext, Some(&key), &[], &mut [], None, &mut out)
        .expect("encrypt0 encode")
        .message
}

fn decrypt0<'pt>(
    adapter: &RustCrypto,
    message: &[u8],
    aad: Option<&'static [u8]>,
    out: &'pt mut [u8],
) -> Result<usize, COSEError> {
    let key = adapter.symmetric_key(&KEY_128);
    let mut slots = [Param::EMPTY; 10];
    let mut dec = EncryptDecoder::encrypt0(adapter, 0);
    if let Some(aad) = aad {
        dec = dec.with_external_aad(aad);
    }
    let decoded = dec.decode(message, Some(&key), None, &mut slots, out)?;
    Ok(decoded.plaintext.map(<[u8]>::len).unwrap_or(0))
}

#[test]
fn encrypt0_round_trip_and_layout() -> Result<(), COSEError> {
    println!("<===================== encrypt0_round_trip =========================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = encrypt0_message(&adapter, b"plain text", None, &mut buf);

    // Tag 16, array of 3, protected << {1: 1} >>.
    assert_eq!(&buf[..6], &[0xd0, 0x83, 0x43, 0xa1, 0x01, 0x01]);

    let mut pt = [0u8; 64];
    let m = decrypt0(&adapter, &buf[..n], None, &mut pt)?;
    assert_eq!(&pt[..m], b"plain text");
    Ok(())
}

#[test]
fn encrypt0_empty_payload_is_tag_only() -> Result<(), COSEError> {
    println!("<===================== encrypt0_empty_payload ======================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = encrypt0_message(&adapter, b"", None, &mut buf);

    // The ciphertext byte string is exactly the 16-byte GCM tag.
    assert_eq!(buf[n - 17], 0x50);
    let mut pt = [0u8; 64];
    let m = decrypt0(&adapter, &buf[..n], None, &mut pt)?;
    assert_eq!(m, 0);
    Ok(())
}

#[test]
fn encrypt0_tamper_is_data_auth_failed() {
    println!("<===================== encrypt0_tamper =============================>");
    let adapter = RustCrypto::new();
    let aad: &[u8] = &[0x01; 16];
    let mut buf = [0u8; 256];
    let n = encrypt0_message(&adapter, b"plain text", Some(aad), &mut buf);

    // Flipping the last ciphertext byte (inside the GCM tag) fails authentication.
    let mut tampered = [0u8; 256];
    tampered[..n].copy_from_slice(&buf[..n]);
    tampered[n - 1] ^= 0x01;
    let mut pt = [0u8; 64];
    assert_eq!(
        decrypt0(&adapter, &tampered[..n], Some(aad), &mut pt).err(),
        Some(COSEError::DataAuthFailed)
    );

    // Flipping a nonce byte fails authentication. The IV parameter is the first label-5
    // byte string of twelve bytes in the unprotected bucket.
    let iv_at = buf[..n]
        .windows(2)
        .position(|w| w == [0x05, 0x4c])
        .expect("iv position");
    let mut tampered = [0u8; 256];
    tampered[..n].copy_from_slice(&buf[..n]);
    tampered[iv_at + 2] ^= 0x01;
    let mut pt = [0u8; 64];
    assert_eq!(
        decrypt0(&adapter, &tampered[..n], Some(aad), &mut pt).err(),
        Some(COSEError::DataAuthFailed)
    );

    // Flipping any AAD byte fails authentication.
    let flipped: &[u8] = &[
        0x00, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01,
    ];
    let mut pt = [0u8; 64];
    assert_eq!(
        decrypt0(&adapter, &buf[..n], Some(flipped), &mut pt).err(),
        Some(COSEError::DataAuthFailed)
    );
    // And omitting the AAD entirely fails the same way.
    let mut pt = [0u8; 64];
    assert_eq!(
        decrypt0(&adapter, &buf[..n], None, &mut pt).err(),
        Some(COSEError::DataAuthFailed)
    );
}

#[test]
fn encrypt0_detached_ciphertext() -> Result<(), COSEError> {
    println!("<===================== encrypt0_detached_ciphertext ================>");
    let adapter = RustCrypto::new();
    let key = adapter.symmetric_key(&KEY_128);
    let mut buf = [0u8; 256];
    let mut detached = [0u8; 64];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt0(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        Some(&key),
        &[],
        &mut [],
        Some(&mut detached),
        &mut out,
    )?;
    drop(out);
    assert_eq!(lengths.ciphertext, 10 + 16);
    // The ciphertext slot carries null.
    assert!(buf[..lengths.message].contains(&0xf6));

    let mut slots = [Param::EMPTY; 10];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt0(&adapter, 0).decode(
        &buf[..lengths.message],
        Some(&key),
        Some(&detached[..lengths.ciphertext]),
        &mut slots,
        &mut pt,
    )?;
    assert_eq!(decoded.plaintext, Some(b"plain text".as_slice()));
    Ok(())
}

#[test]
fn encrypt0_sizing_matches_real_encode() -> Result<(), COSEError> {
    println!("<===================== encrypt0_sizing =============================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = encrypt0_message(&adapter, b"plain text", None, &mut buf);

    let mut probe = OutputBuffer::sizing();
    let lengths = EncryptEncoder::encrypt0(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut [],
        None,
        &mut probe,
    )?;
    assert_eq!(lengths.message, n);
    Ok(())
}

#[test]
fn encrypt0_decode_only_without_crypto() -> Result<(), COSEError> {
    println!("<===================== encrypt0_decode_only ========================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let n = encrypt0_message(&adapter, b"plain text", None, &mut buf);

    // Header inspection needs no crypto backend at all.
    let nocrypto = NoCrypto;
    let mut slots = [Param::EMPTY; 10];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt0(&nocrypto, OPT_DECODE_ONLY).decode(
        &buf[..n],
        None,
        None,
        &mut slots,
        &mut pt,
    )?;
    assert_eq!(decoded.body.alg, Some(ALG_A128GCM));
    assert_eq!(decoded.body.iv.map(<[u8]>::len), Some(12));
    assert_eq!(decoded.plaintext, None);
    Ok(())
}

#[test]
fn encrypt_with_aes_kw_recipient() -> Result<(), COSEError> {
    println!("<===================== encrypt_aes_kw_recipient ====================>");
    let adapter = RustCrypto::new();
    let mut recipients = [Recipient::AesKw(AesKwRecipient {
        alg: ALG_A128KW,
        kek: adapter.symmetric_key(&KEY_128),
        kid: Some(b"our-kek".as_slice()),
    })];
    let mut buf = [0u8; 512];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut recipients,
        None,
        &mut out,
    )?;
    drop(out);
    assert_eq!(buf[0], 0xd8);
    assert_eq!(buf[1], 0x60);

    let mut decoders = [RecipientDecoder::AesKw(AesKwRecipientDecoder {
        alg: ALG_A128KW,
        kek: adapter.symmetric_key(&KEY_128),
        kid: Some(b"our-kek".as_slice()),
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt(&adapter, 0)
        .with_recipients(&mut decoders)
        .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt)?;
    assert_eq!(decoded.plaintext, Some(b"plain text".as_slice()));
    assert_eq!(decoded.recipient_used, Some(0));
    Ok(())
}

#[test]
fn encrypt_second_recipient_element_recovers() -> Result<(), COSEError> {
    println!("<===================== encrypt_second_recipient ====================>");
    let adapter = RustCrypto::new();
    let other_kek = [0xa5u8; 16];
    let mut recipients = [
        Recipient::AesKw(AesKwRecipient {
            alg: ALG_A128KW,
            kek: adapter.symmetric_key(&other_kek),
            kid: Some(b"kek-a".as_slice()),
        }),
        Recipient::AesKw(AesKwRecipient {
            alg: ALG_A128KW,
            kek: adapter.symmetric_key(&KEY_128),
            kid: Some(b"kek-b".as_slice()),
        }),
    ];
    let mut buf = [0u8; 512];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut recipients,
        None,
        &mut out,
    )?;
    drop(out);

    // The configured decoder matches the second element only; the first declines on kid.
    let mut decoders = [RecipientDecoder::AesKw(AesKwRecipientDecoder {
        alg: ALG_A128KW,
        kek: adapter.symmetric_key(&KEY_128),
        kid: Some(b"kek-b".as_slice()),
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt(&adapter, 0)
        .with_recipients(&mut decoders)
        .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt)?;
    assert_eq!(decoded.recipient_used, Some(1));
    assert_eq!(decoded.plaintext, Some(b"plain text".as_slice()));

    // A decoder matching nothing declines the whole message.
    let mut decoders = [RecipientDecoder::AesKw(AesKwRecipientDecoder {
        alg: ALG_A128KW,
        kek: adapter.symmetric_key(&KEY_128),
        kid: Some(b"kek-z".as_slice()),
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    assert_eq!(
        EncryptDecoder::encrypt(&adapter, 0)
            .with_recipients(&mut decoders)
            .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt)
            .err(),
        Some(COSEError::Decline)
    );
    Ok(())
}

fn esdh_round_trip(
    sender_u: PartyInfo<'static>,
    sender_v: PartyInfo<'static>,
    sender_priv: Option<&'static [u8]>,
    salt: SaltMode<'static>,
    receiver_u: PartyInfo<'static>,
    receiver_priv: Option<&'static [u8]>,
) -> Result<Vec<u8>, COSEError> {
    let adapter = RustCrypto::new();
    let recipient_key = adapter.generate_ec_key(CURVE_P256)?;
    let recipient_pub = adapter.public_half(&recipient_key)?;

    let mut recipients = [Recipient::Esdh(EsdhRecipient {
        alg: ALG_ECDH_ES_A128KW,
        curve: CURVE_P256,
        public_key: recipient_pub,
        kid: Some(b"meriadoc".as_slice()),
        party_u: sender_u,
        party_v: sender_v,
        supp_pub_other: None,
        supp_priv: sender_priv,
        salt,
        context_buffer: None,
    })];
    let mut buf = [0u8; 1024];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"secret message",
        None,
        &[],
        &mut recipients,
        None,
        &mut out,
    )?;
    drop(out);

    let mut decoders = [RecipientDecoder::Esdh(EsdhRecipientDecoder {
        alg: ALG_ECDH_ES_A128KW,
        curve: CURVE_P256,
        private_key: recipient_key,
        kid: Some(b"meriadoc".as_slice()),
        party_u: receiver_u,
        party_v: sender_v,
        supp_pub_other: None,
        supp_priv: receiver_priv,
        salt: SaltMode::None,
        context_buffer: None,
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt(&adapter, 0)
        .with_recipients(&mut decoders)
        .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt)?;
    Ok(decoded.plaintext.unwrap_or(&[]).to_vec())
}

#[test]
fn encrypt_esdh_round_trip() -> Result<(), COSEError> {
    println!("<===================== encrypt_esdh_round_trip =====================>");
    let party_u = PartyInfo {
        identity: Some(b"Alice".as_slice()),
        nonce: None,
        other: None,
    };
    let party_v = PartyInfo {
        identity: Some(b"Bob".as_slice()),
        nonce: None,
        other: None,
    };
    let pt = esdh_round_trip(party_u, party_v, None, SaltMode::Random, party_u, None)?;
    assert_eq!(pt, b"secret message");
    Ok(())
}

#[test]
fn encrypt_esdh_party_info_mismatch_fails() {
    println!("<===================== encrypt_esdh_party_mismatch =================>");
    let party_u = PartyInfo {
        identity: Some(b"Alice".as_slice()),
        nonce: None,
        other: None,
    };
    let party_v = PartyInfo {
        identity: Some(b"Bob".as_slice()),
        nonce: None,
        other: None,
    };
    let wrong_u = PartyInfo {
        identity: Some(b"Mallory".as_slice()),
        nonce: None,
        other: None,
    };
    // A diverging PartyUInfo changes the KDF context, so the derived KEK cannot unwrap.
    assert_eq!(
        esdh_round_trip(party_u, party_v, None, SaltMode::None, wrong_u, None).err(),
        Some(COSEError::DataAuthFailed)
    );
}

#[test]
fn encrypt_esdh_supp_priv_mismatch_fails() {
    println!("<===================== encrypt_esdh_supp_priv_mismatch =============>");
    let party = PartyInfo::default();
    assert_eq!(
        esdh_round_trip(
            party,
            party,
            Some(b"shared-static".as_slice()),
            SaltMode::None,
            party,
            None,
        )
        .err(),
        Some(COSEError::DataAuthFailed)
    );
    // With the matching SuppPrivInfo on both sides, the same exchange succeeds.
    let pt = esdh_round_trip(
        party,
        party,
        Some(b"shared-static".as_slice()),
        SaltMode::None,
        party,
        Some(b"shared-static".as_slice()),
    )
    .expect("matching supp priv");
    assert_eq!(pt, b"secret message");
}

#[test]
fn encrypt_hpke_recipient_round_trip() -> Result<(), COSEError> {
    println!("<===================== encrypt_hpke_round_trip =====================>");
    let adapter = RustCrypto::new();
    let (sk, pk) = adapter.x25519_keypair();
    let suite = hpke_suite_for_alg(ALG_HPKE_BASE_X25519_A128GCM)?;

    let mut recipients = [Recipient::Hpke(HpkeRecipient {
        alg: ALG_HPKE_BASE_X25519_A128GCM,
        suite,
        public_key: pk,
        kid: Some(b"hpke-1".as_slice()),
    })];
    let mut buf = [0u8; 512];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut recipients,
        None,
        &mut out,
    )?;
    drop(out);

    let mut decoders = [RecipientDecoder::Hpke(HpkeRecipientDecoder {
        alg: ALG_HPKE_BASE_X25519_A128GCM,
        suite,
        private_key: sk,
        kid: Some(b"hpke-1".as_slice()),
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    let decoded = EncryptDecoder::encrypt(&adapter, 0)
        .with_recipients(&mut decoders)
        .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt)?;
    assert_eq!(decoded.plaintext, Some(b"plain text".as_slice()));
    Ok(())
}

#[test]
fn encrypt_direct_recipient_element() -> Result<(), COSEError> {
    println!("<===================== encrypt_direct_recipient ====================>");
    let adapter = RustCrypto::new();

    // A direct element carries no key material. The sender always generates a fresh CEK, so
    // the out-of-band key here cannot match it: the element must be accepted by the direct
    // decoder (kid and algorithm match, CEK returned) and the failure must come from content
    // authentication, not from dispatch.
    let shared = adapter.symmetric_key(&KEY_128);
    let mut recipients = [Recipient::Direct::<RustCrypto>(DirectRecipient {
        kid: Some(b"our-secret".as_slice()),
    })];
    let mut buf = [0u8; 512];
    let mut out = OutputBuffer::new(&mut buf);
    let lengths = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut recipients,
        None,
        &mut out,
    )?;
    drop(out);

    let mut decoders = [RecipientDecoder::Direct(DirectRecipientDecoder {
        cek: &shared,
        kid: Some(b"our-secret".as_slice()),
    })];
    let mut slots = [Param::EMPTY; 16];
    let mut pt = [0u8; 64];
    let outcome = EncryptDecoder::encrypt(&adapter, 0)
        .with_recipients(&mut decoders)
        .decode(&buf[..lengths.message], None, None, &mut slots, &mut pt);
    assert_eq!(outcome.err(), Some(COSEError::DataAuthFailed));
    Ok(())
}

#[test]
fn encrypt_requires_a_recipient() {
    println!("<===================== encrypt_requires_recipient ==================>");
    let adapter = RustCrypto::new();
    let mut buf = [0u8; 256];
    let mut out = OutputBuffer::new(&mut buf);
    let outcome = EncryptEncoder::encrypt(&adapter, ALG_A128GCM, 0).encode(
        b"plain text",
        None,
        &[],
        &mut [],
        None,
        &mut out,
    );
    assert_eq!(outcome.err(), Some(COSEError::Decline));
}
