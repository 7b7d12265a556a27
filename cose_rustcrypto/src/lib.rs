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
 * cose_rustcrypto: reference crypto adapter
 *
 * Implements the cose_core crypto adapter contract over the RustCrypto crates (sha2, hmac,
 * hkdf, aes-gcm, aes-kw, p256/p384/p521, hpke) and ed25519-dalek. Hash and MAC operations use
 * per-operation context objects; key handles are an enum over the backing key types and are
 * released by Drop. RSA-PSS and the non-AEAD content ciphers are not provided and are declined
 * with the corresponding unsupported-algorithm errors.
 **************************************************************************************************/
#![warn(missing_docs)]

//! # COSE_RUSTCRYPTO
//!
//! A plug-in implementation of [`cose_core::adapter::CryptoAdapter`] for hosted targets,
//! backed by the RustCrypto ecosystem and ed25519-dalek. Supported COSE algorithms:
//!
//! - Signatures: ES256, ES384, ES512 (fixed-width r‖s encoding) and EdDSA (Ed25519).
//! - Content encryption: A128GCM, A192GCM, A256GCM.
//! - MAC: HMAC 256/256, 384/384, 512/512.
//! - Key distribution: A128KW/A192KW/A256KW, ECDH-ES + HKDF-SHA-256 over P-256/P-384/P-521,
//!   and HPKE Base mode with DHKEM(X25519, HKDF-SHA256) / HKDF-SHA256 / AES-128-GCM.
//!
//! Randomness comes from the operating system via `getrandom`.

extern crate aes;
extern crate aes_gcm;
extern crate aes_kw;
extern crate cose_core;
extern crate ed25519_dalek;
extern crate getrandom;
extern crate hkdf;
extern crate hmac;
extern crate hpke;
extern crate p256;
extern crate p384;
extern crate p521;
extern crate rand_core;
extern crate sha2;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use hpke::{Deserializable, Kem as KemTrait, OpModeR, OpModeS, Serializable};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256, Sha384, Sha512};

use cose_core::adapter::{
    aead_tag_len, curve_coord_len, CryptoAdapter, HpkeSuite, YCoordinate, HPKE_AEAD_A128GCM,
    HPKE_KDF_HKDF_SHA256, HPKE_KEM_X25519_HKDF_SHA256,
};
use cose_core::constants::*;
use cose_core::error::{COSEError, Result};

type Aes192Gcm = AesGcm<aes::Aes192, U12>;
type X25519Kem = hpke::kem::X25519HkdfSha256;
type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

/// A key handle: an enum over the backing key types. Handles are cheap to move and released
/// by Drop.
pub enum RustCryptoKey {
    /// Raw symmetric key bytes (AEAD, HMAC, KEK).
    Symmetric(Vec<u8>),
    /// P-256 private key.
    P256Secret(p256::SecretKey),
    /// P-256 public key.
    P256Public(p256::PublicKey),
    /// P-384 private key.
    P384Secret(p384::SecretKey),
    /// P-384 public key.
    P384Public(p384::PublicKey),
    /// P-521 private key.
    P521Secret(p521::SecretKey),
    /// P-521 public key.
    P521Public(p521::PublicKey),
    /// Ed25519 signing key.
    Ed25519Secret(ed25519_dalek::SigningKey),
    /// Ed25519 verification key.
    Ed25519Public(ed25519_dalek::VerifyingKey),
    /// X25519 KEM private key (HPKE).
    X25519Secret(<X25519Kem as KemTrait>::PrivateKey),
    /// X25519 KEM public key (HPKE).
    X25519Public(<X25519Kem as KemTrait>::PublicKey),
}

// Key material is never shown, only the variant.
impl std::fmt::Debug for RustCryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RustCryptoKey::Symmetric(_) => "RustCryptoKey::Symmetric",
            RustCryptoKey::P256Secret(_) => "RustCryptoKey::P256Secret",
            RustCryptoKey::P256Public(_) => "RustCryptoKey::P256Public",
            RustCryptoKey::P384Secret(_) => "RustCryptoKey::P384Secret",
            RustCryptoKey::P384Public(_) => "RustCryptoKey::P384Public",
            RustCryptoKey::P521Secret(_) => "RustCryptoKey::P521Secret",
            RustCryptoKey::P521Public(_) => "RustCryptoKey::P521Public",
            RustCryptoKey::Ed25519Secret(_) => "RustCryptoKey::Ed25519Secret",
            RustCryptoKey::Ed25519Public(_) => "RustCryptoKey::Ed25519Public",
            RustCryptoKey::X25519Secret(_) => "RustCryptoKey::X25519Secret",
            RustCryptoKey::X25519Public(_) => "RustCryptoKey::X25519Public",
        })
    }
}

/// An in-progress hash; one per operation.
pub enum HashContext {
    /// SHA-256 in progress.
    Sha256(Sha256),
    /// SHA-384 in progress.
    Sha384(Sha384),
    /// SHA-512 in progress.
    Sha512(Sha512),
}

/// An in-progress HMAC; one per operation.
pub enum MacContext {
    /// HMAC-SHA-256 in progress.
    Sha256(HmacSha256),
    /// HMAC-SHA-384 in progress.
    Sha384(HmacSha384),
    /// HMAC-SHA-512 in progress.
    Sha512(HmacSha512),
}

/// The reference crypto adapter. Stateless; every operation creates its own contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCrypto;

impl RustCrypto {
    /// Construct the adapter.
    pub fn new() -> Self {
        RustCrypto
    }

    /// Wrap raw symmetric key bytes in a handle.
    pub fn symmetric_key(&self, raw: &[u8]) -> RustCryptoKey {
        RustCryptoKey::Symmetric(raw.to_vec())
    }

    /// Import an EC2 private key from its scalar bytes.
    pub fn ec2_signing_key(&self, curve: i64, d: &[u8]) -> Result<RustCryptoKey> {
        match curve {
            CURVE_P256 => p256::SecretKey::from_slice(d)
                .map(RustCryptoKey::P256Secret)
                .map_err(|_| COSEError::EmptyKey),
            CURVE_P384 => p384::SecretKey::from_slice(d)
                .map(RustCryptoKey::P384Secret)
                .map_err(|_| COSEError::EmptyKey),
            CURVE_P521 => p521::SecretKey::from_slice(d)
                .map(RustCryptoKey::P521Secret)
                .map_err(|_| COSEError::EmptyKey),
            _ => Err(COSEError::WrongCurve),
        }
    }

    /// Import an EC2 public key from its SEC1 encoding (compressed or uncompressed).
    pub fn ec2_verification_key(&self, curve: i64, sec1: &[u8]) -> Result<RustCryptoKey> {
        match curve {
            CURVE_P256 => p256::PublicKey::from_sec1_bytes(sec1)
                .map(RustCryptoKey::P256Public)
                .map_err(|_| COSEError::EmptyKey),
            CURVE_P384 => p384::PublicKey::from_sec1_bytes(sec1)
                .map(RustCryptoKey::P384Public)
                .map_err(|_| COSEError::EmptyKey),
            CURVE_P521 => p521::PublicKey::from_sec1_bytes(sec1)
                .map(RustCryptoKey::P521Public)
                .map_err(|_| COSEError::EmptyKey),
            _ => Err(COSEError::WrongCurve),
        }
    }

    /// Import an Ed25519 signing key from its seed bytes.
    pub fn ed25519_signing_key(&self, seed: &[u8; 32]) -> RustCryptoKey {
        RustCryptoKey::Ed25519Secret(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// Import an Ed25519 verification key.
    pub fn ed25519_verification_key(&self, bytes: &[u8; 32]) -> Result<RustCryptoKey> {
        ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map(RustCryptoKey::Ed25519Public)
            .map_err(|_| COSEError::EmptyKey)
    }

    /// Generate an X25519 KEM key pair for HPKE, returning (private, public).
    pub fn x25519_keypair(&self) -> (RustCryptoKey, RustCryptoKey) {
        let (sk, pk) = X25519Kem::gen_keypair(&mut OsRng);
        (
            RustCryptoKey::X25519Secret(sk),
            RustCryptoKey::X25519Public(pk),
        )
    }

    /// The public half of an EC or Ed25519 private key handle.
    pub fn public_half(&self, key: &RustCryptoKey) -> Result<RustCryptoKey> {
        match key {
            RustCryptoKey::P256Secret(sk) => Ok(RustCryptoKey::P256Public(sk.public_key())),
            RustCryptoKey::P384Secret(sk) => Ok(RustCryptoKey::P384Public(sk.public_key())),
            RustCryptoKey::P521Secret(sk) => Ok(RustCryptoKey::P521Public(sk.public_key())),
            RustCryptoKey::Ed25519Secret(sk) => {
                Ok(RustCryptoKey::Ed25519Public(sk.verifying_key()))
            }
            RustCryptoKey::X25519Secret(sk) => {
                Ok(RustCryptoKey::X25519Public(X25519Kem::sk_to_pk(sk)))
            }
            _ => Err(COSEError::WrongKeyType),
        }
    }
}

fn copy_out(out: &mut [u8], data: &[u8]) -> Result<usize> {
    if out.len() < data.len() {
        return Err(COSEError::BufferTooSmall);
    }
    out[..data.len()].copy_from_slice(data);
    Ok(data.len())
}

fn symmetric<'k>(key: &'k RustCryptoKey) -> Result<&'k [u8]> {
    match key {
        RustCryptoKey::Symmetric(k) => Ok(k),
        _ => Err(COSEError::WrongKeyType),
    }
}

fn hpke_suite_supported(suite: HpkeSuite) -> bool {
    suite.kem == HPKE_KEM_X25519_HKDF_SHA256
        && suite.kdf == HPKE_KDF_HKDF_SHA256
        && suite.aead == HPKE_AEAD_A128GCM
}

impl CryptoAdapter for RustCrypto {
    type HashCtx = HashContext;
    type MacCtx = MacContext;
    type Key = RustCryptoKey;

    fn is_supported(&self, alg: i64) -> bool {
        matches!(
            alg,
            ALG_ES256
                | ALG_ES384
                | ALG_ES512
                | ALG_EDDSA
                | ALG_A128GCM
                | ALG_A192GCM
                | ALG_A256GCM
                | ALG_HMAC256
                | ALG_HMAC384
                | ALG_HMAC512
                | ALG_A128KW
                | ALG_A192KW
                | ALG_A256KW
                | ALG_ECDH_ES_A128KW
                | ALG_ECDH_ES_A192KW
                | ALG_ECDH_ES_A256KW
                | ALG_HPKE_BASE_X25519_A128GCM
                | ALG_SHA256
                | ALG_SHA384
                | ALG_SHA512
        )
    }

    fn hash_start(&self, alg: i64) -> Result<HashContext> {
        match alg {
            ALG_SHA256 => Ok(HashContext::Sha256(Sha256::new())),
            ALG_SHA384 => Ok(HashContext::Sha384(Sha384::new())),
            ALG_SHA512 => Ok(HashContext::Sha512(Sha512::new())),
            _ => Err(COSEError::UnsupportedHash),
        }
    }

    fn hash_update(&self, ctx: &mut HashContext, data: &[u8]) {
        match ctx {
            HashContext::Sha256(h) => h.update(data),
            HashContext::Sha384(h) => h.update(data),
            HashContext::Sha512(h) => h.update(data),
        }
    }

    fn hash_finish(&self, ctx: HashContext, out: &mut [u8]) -> Result<usize> {
        match ctx {
            HashContext::Sha256(h) => copy_out(out, &h.finalize()),
            HashContext::Sha384(h) => copy_out(out, &h.finalize()),
            HashContext::Sha512(h) => copy_out(out, &h.finalize()),
        }
    }

    fn hmac_setup(&self, alg: i64, key: &RustCryptoKey) -> Result<MacContext> {
        let k = symmetric(key)?;
        match alg {
            ALG_HMAC256 => KeyInit::new_from_slice(k)
                .map(MacContext::Sha256)
                .map_err(|_| COSEError::UnsupportedKeyLength),
            ALG_HMAC384 => KeyInit::new_from_slice(k)
                .map(MacContext::Sha384)
                .map_err(|_| COSEError::UnsupportedKeyLength),
            ALG_HMAC512 => KeyInit::new_from_slice(k)
                .map(MacContext::Sha512)
                .map_err(|_| COSEError::UnsupportedKeyLength),
            _ => Err(COSEError::UnsupportedAlgorithm),
        }
    }

    fn hmac_update(&self, ctx: &mut MacContext, data: &[u8]) {
        match ctx {
            MacContext::Sha256(m) => m.update(data),
            MacContext::Sha384(m) => m.update(data),
            MacContext::Sha512(m) => m.update(data),
        }
    }

    fn hmac_compute_finish(&self, ctx: MacContext, out: &mut [u8]) -> Result<usize> {
        match ctx {
            MacContext::Sha256(m) => copy_out(out, &m.finalize().into_bytes()),
            MacContext::Sha384(m) => copy_out(out, &m.finalize().into_bytes()),
            MacContext::Sha512(m) => copy_out(out, &m.finalize().into_bytes()),
        }
    }

    fn hmac_validate_finish(&self, ctx: MacContext, expected: &[u8]) -> Result<()> {
        let outcome = match ctx {
            MacContext::Sha256(m) => m.verify_slice(expected),
            MacContext::Sha384(m) => m.verify_slice(expected),
            MacContext::Sha512(m) => m.verify_slice(expected),
        };
        outcome.map_err(|_| COSEError::DataAuthFailed)
    }

    fn sig_size(&self, alg: i64, _key: &RustCryptoKey) -> Result<usize> {
        match alg {
            ALG_ES256 | ALG_EDDSA => Ok(64),
            ALG_ES384 => Ok(96),
            ALG_ES512 => Ok(132),
            _ => Err(COSEError::UnsupportedSigningAlgorithm),
        }
    }

    fn sign(&self, alg: i64, key: &RustCryptoKey, tbs: &[u8], out: &mut [u8]) -> Result<usize> {
        match (alg, key) {
            (ALG_ES256, RustCryptoKey::P256Secret(sk)) => {
                let signing = p256::ecdsa::SigningKey::from_bytes(&sk.to_bytes())
                    .map_err(|_| COSEError::EmptyKey)?;
                let sig: p256::ecdsa::Signature =
                    signing.sign_prehash(tbs).map_err(|_| COSEError::SigFailed)?;
                copy_out(out, &sig.to_bytes())
            }
            (ALG_ES384, RustCryptoKey::P384Secret(sk)) => {
                let signing = p384::ecdsa::SigningKey::from_bytes(&sk.to_bytes())
                    .map_err(|_| COSEError::EmptyKey)?;
                let sig: p384::ecdsa::Signature =
                    signing.sign_prehash(tbs).map_err(|_| COSEError::SigFailed)?;
                copy_out(out, &sig.to_bytes())
            }
            (ALG_ES512, RustCryptoKey::P521Secret(sk)) => {
                let signing = p521::ecdsa::SigningKey::from_bytes(&sk.to_bytes())
                    .map_err(|_| COSEError::EmptyKey)?;
                let sig: p521::ecdsa::Signature =
                    signing.sign_prehash(tbs).map_err(|_| COSEError::SigFailed)?;
                copy_out(out, &sig.to_bytes())
            }
            (ALG_EDDSA, RustCryptoKey::Ed25519Secret(sk)) => {
                use ed25519_dalek::Signer as _;
                let sig = sk.sign(tbs);
                copy_out(out, &sig.to_bytes())
            }
            (ALG_PS256, _) | (ALG_PS384, _) | (ALG_PS512, _) => {
                Err(COSEError::UnsupportedSigningAlgorithm)
            }
            _ => Err(COSEError::WrongKeyType),
        }
    }

    fn verify(&self, alg: i64, key: &RustCryptoKey, tbs: &[u8], signature: &[u8]) -> Result<()> {
        match (alg, key) {
            (ALG_ES256, RustCryptoKey::P256Public(pk)) => {
                let sig = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| COSEError::SigVerifyFailed)?;
                let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(
                    pk.to_encoded_point(false).as_bytes(),
                )
                .map_err(|_| COSEError::EmptyKey)?;
                vk.verify_prehash(tbs, &sig)
                    .map_err(|_| COSEError::SigVerifyFailed)
            }
            (ALG_ES384, RustCryptoKey::P384Public(pk)) => {
                let sig = p384::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| COSEError::SigVerifyFailed)?;
                let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(
                    pk.to_encoded_point(false).as_bytes(),
                )
                .map_err(|_| COSEError::EmptyKey)?;
                vk.verify_prehash(tbs, &sig)
                    .map_err(|_| COSEError::SigVerifyFailed)
            }
            (ALG_ES512, RustCryptoKey::P521Public(pk)) => {
                let sig = p521::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| COSEError::SigVerifyFailed)?;
                let vk = p521::ecdsa::VerifyingKey::from_sec1_bytes(
                    pk.to_encoded_point(false).as_bytes(),
                )
                .map_err(|_| COSEError::EmptyKey)?;
                vk.verify_prehash(tbs, &sig)
                    .map_err(|_| COSEError::SigVerifyFailed)
            }
            (ALG_EDDSA, RustCryptoKey::Ed25519Public(vk)) => {
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| COSEError::SigVerifyFailed)?;
                vk.verify_strict(tbs, &sig)
                    .map_err(|_| COSEError::SigVerifyFailed)
            }
            (ALG_PS256, _) | (ALG_PS384, _) | (ALG_PS512, _) => {
                Err(COSEError::UnsupportedSigningAlgorithm)
            }
            _ => Err(COSEError::WrongKeyType),
        }
    }

    fn aead_encrypt(
        &self,
        alg: i64,
        key: &RustCryptoKey,
        nonce: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        let k = symmetric(key)?;
        if nonce.len() != 12 {
            return Err(COSEError::InvalidLength);
        }
        let tag_len = aead_tag_len(alg)?;
        if out.len() < plaintext.len() + tag_len {
            return Err(COSEError::BufferTooSmall);
        }
        out[..plaintext.len()].copy_from_slice(plaintext);
        let aad = aad.unwrap_or(&[]);
        let n = Nonce::from_slice(nonce);
        let tag = match alg {
            ALG_A128GCM => Aes128Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .encrypt_in_place_detached(n, aad, &mut out[..plaintext.len()]),
            ALG_A192GCM => Aes192Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .encrypt_in_place_detached(n, aad, &mut out[..plaintext.len()]),
            ALG_A256GCM => Aes256Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .encrypt_in_place_detached(n, aad, &mut out[..plaintext.len()]),
            _ => return Err(COSEError::UnsupportedEncryptionAlgorithm),
        }
        .map_err(|_| COSEError::EncryptFailed)?;
        out[plaintext.len()..plaintext.len() + tag_len].copy_from_slice(&tag);
        Ok(plaintext.len() + tag_len)
    }

    fn aead_decrypt(
        &self,
        alg: i64,
        key: &RustCryptoKey,
        nonce: &[u8],
        aad: Option<&[u8]>,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        let k = symmetric(key)?;
        if nonce.len() != 12 {
            return Err(COSEError::InvalidLength);
        }
        let tag_len = aead_tag_len(alg)?;
        if ciphertext.len() < tag_len {
            return Err(COSEError::DataAuthFailed);
        }
        let body = ciphertext.len() - tag_len;
        if out.len() < body {
            return Err(COSEError::BufferTooSmall);
        }
        out[..body].copy_from_slice(&ciphertext[..body]);
        let aad = aad.unwrap_or(&[]);
        let n = Nonce::from_slice(nonce);
        let tag = aes_gcm::Tag::from_slice(&ciphertext[body..]);
        let outcome = match alg {
            ALG_A128GCM => Aes128Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .decrypt_in_place_detached(n, aad, &mut out[..body], tag),
            ALG_A192GCM => Aes192Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .decrypt_in_place_detached(n, aad, &mut out[..body], tag),
            ALG_A256GCM => Aes256Gcm::new_from_slice(k)
                .map_err(|_| COSEError::KeySizeMismatch)?
                .decrypt_in_place_detached(n, aad, &mut out[..body], tag),
            _ => return Err(COSEError::UnsupportedEncryptionAlgorithm),
        };
        outcome.map_err(|_| COSEError::DataAuthFailed)?;
        Ok(body)
    }

    fn kw_wrap(
        &self,
        alg: i64,
        kek: &RustCryptoKey,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        let k = symmetric(kek)?;
        if plaintext.len() % 8 != 0 || plaintext.is_empty() {
            return Err(COSEError::InvalidLength);
        }
        if out.len() < plaintext.len() + 8 {
            return Err(COSEError::BufferTooSmall);
        }
        let region = &mut out[..plaintext.len() + 8];
        let outcome = match (alg, k.len()) {
            (ALG_A128KW, 16) => {
                aes_kw::KekAes128::from(*GenericArray::from_slice(k)).wrap(plaintext, region)
            }
            (ALG_A192KW, 24) => {
                aes_kw::KekAes192::from(*GenericArray::from_slice(k)).wrap(plaintext, region)
            }
            (ALG_A256KW, 32) => {
                aes_kw::KekAes256::from(*GenericArray::from_slice(k)).wrap(plaintext, region)
            }
            (ALG_A128KW, _) | (ALG_A192KW, _) | (ALG_A256KW, _) => {
                return Err(COSEError::KeySizeMismatch)
            }
            _ => return Err(COSEError::UnsupportedCipherAlgorithm),
        };
        outcome.map_err(|_| COSEError::EncryptFailed)?;
        Ok(plaintext.len() + 8)
    }

    fn kw_unwrap(
        &self,
        alg: i64,
        kek: &RustCryptoKey,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        let k = symmetric(kek)?;
        if ciphertext.len() < 16 || ciphertext.len() % 8 != 0 {
            return Err(COSEError::DataAuthFailed);
        }
        let body = ciphertext.len() - 8;
        if out.len() < body {
            return Err(COSEError::BufferTooSmall);
        }
        let region = &mut out[..body];
        let outcome = match (alg, k.len()) {
            (ALG_A128KW, 16) => {
                aes_kw::KekAes128::from(*GenericArray::from_slice(k)).unwrap(ciphertext, region)
            }
            (ALG_A192KW, 24) => {
                aes_kw::KekAes192::from(*GenericArray::from_slice(k)).unwrap(ciphertext, region)
            }
            (ALG_A256KW, 32) => {
                aes_kw::KekAes256::from(*GenericArray::from_slice(k)).unwrap(ciphertext, region)
            }
            (ALG_A128KW, _) | (ALG_A192KW, _) | (ALG_A256KW, _) => {
                return Err(COSEError::KeySizeMismatch)
            }
            _ => return Err(COSEError::UnsupportedCipherAlgorithm),
        };
        outcome.map_err(|_| COSEError::DataAuthFailed)?;
        Ok(body)
    }

    fn hkdf(
        &self,
        hash_alg: i64,
        salt: Option<&[u8]>,
        ikm: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<()> {
        let outcome = match hash_alg {
            ALG_SHA256 => Hkdf::<Sha256>::new(salt, ikm).expand(info, okm),
            ALG_SHA384 => Hkdf::<Sha384>::new(salt, ikm).expand(info, okm),
            ALG_SHA512 => Hkdf::<Sha512>::new(salt, ikm).expand(info, okm),
            _ => return Err(COSEError::UnsupportedHash),
        };
        outcome.map_err(|_| COSEError::HkdfFailed)
    }

    fn ecdh(
        &self,
        private_key: &RustCryptoKey,
        public_key: &RustCryptoKey,
        out: &mut [u8],
    ) -> Result<usize> {
        match (private_key, public_key) {
            (RustCryptoKey::P256Secret(sk), RustCryptoKey::P256Public(pk)) => {
                let shared = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                copy_out(out, shared.raw_secret_bytes())
            }
            (RustCryptoKey::P384Secret(sk), RustCryptoKey::P384Public(pk)) => {
                let shared = p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                copy_out(out, shared.raw_secret_bytes())
            }
            (RustCryptoKey::P521Secret(sk), RustCryptoKey::P521Public(pk)) => {
                let shared = p521::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                copy_out(out, shared.raw_secret_bytes())
            }
            _ => Err(COSEError::WrongKeyType),
        }
    }

    fn generate_ec_key(&self, curve: i64) -> Result<RustCryptoKey> {
        match curve {
            CURVE_P256 => Ok(RustCryptoKey::P256Secret(p256::SecretKey::random(
                &mut OsRng,
            ))),
            CURVE_P384 => Ok(RustCryptoKey::P384Secret(p384::SecretKey::random(
                &mut OsRng,
            ))),
            CURVE_P521 => Ok(RustCryptoKey::P521Secret(p521::SecretKey::random(
                &mut OsRng,
            ))),
            _ => Err(COSEError::WrongCurve),
        }
    }

    fn import_ec2_public_key(
        &self,
        curve: i64,
        x: &[u8],
        y: YCoordinate<'_>,
    ) -> Result<RustCryptoKey> {
        let coord = curve_coord_len(curve)?;
        if x.len() != coord {
            return Err(COSEError::KeySizeMismatch);
        }
        let mut sec1 = [0u8; 133];
        let sec1 = match y {
            YCoordinate::Full(y) => {
                if y.len() != coord {
                    return Err(COSEError::KeySizeMismatch);
                }
                sec1[0] = 0x04;
                sec1[1..1 + coord].copy_from_slice(x);
                sec1[1 + coord..1 + 2 * coord].copy_from_slice(y);
                &sec1[..1 + 2 * coord]
            }
            YCoordinate::Sign(sign) => {
                sec1[0] = 0x02 + u8::from(sign);
                sec1[1..1 + coord].copy_from_slice(x);
                &sec1[..1 + coord]
            }
        };
        self.ec2_verification_key(curve, sec1)
    }

    fn export_ec2_public_key(
        &self,
        key: &RustCryptoKey,
        x: &mut [u8],
        y: &mut [u8],
    ) -> Result<(i64, usize)> {
        let (curve, point) = match key {
            RustCryptoKey::P256Secret(sk) => (CURVE_P256, sk.public_key().to_encoded_point(false)),
            RustCryptoKey::P256Public(pk) => (CURVE_P256, pk.to_encoded_point(false)),
            RustCryptoKey::P384Secret(sk) => {
                return export_p384(&sk.public_key(), x, y);
            }
            RustCryptoKey::P384Public(pk) => {
                return export_p384(pk, x, y);
            }
            RustCryptoKey::P521Secret(sk) => {
                return export_p521(&sk.public_key(), x, y);
            }
            RustCryptoKey::P521Public(pk) => {
                return export_p521(pk, x, y);
            }
            _ => return Err(COSEError::WrongKeyType),
        };
        let xb = point.x().ok_or(COSEError::EmptyKey)?;
        let yb = point.y().ok_or(COSEError::EmptyKey)?;
        copy_out(x, xb)?;
        let n = copy_out(y, yb)?;
        Ok((curve, n))
    }

    fn make_symmetric_key(&self, _alg: i64, raw: &[u8]) -> Result<RustCryptoKey> {
        if raw.is_empty() {
            return Err(COSEError::EmptyKey);
        }
        Ok(RustCryptoKey::Symmetric(raw.to_vec()))
    }

    fn export_symmetric_key(&self, key: &RustCryptoKey, out: &mut [u8]) -> Result<usize> {
        let k = symmetric(key)?;
        copy_out(out, k)
    }

    fn get_random(&self, out: &mut [u8]) -> Result<()> {
        getrandom::getrandom(out).map_err(|_| COSEError::RngFailed)
    }

    fn hpke_seal(
        &self,
        suite: HpkeSuite,
        recipient_public: &RustCryptoKey,
        info: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
        enc_out: &mut [u8],
        ct_out: &mut [u8],
    ) -> Result<(usize, usize)> {
        if !hpke_suite_supported(suite) {
            return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
        }
        let pk = match recipient_public {
            RustCryptoKey::X25519Public(pk) => pk,
            _ => return Err(COSEError::WrongKeyType),
        };
        let (encapped, ciphertext) =
            hpke::single_shot_seal::<hpke::aead::AesGcm128, hpke::kdf::HkdfSha256, X25519Kem, _>(
                &OpModeS::Base,
                pk,
                info,
                plaintext,
                aad.unwrap_or(&[]),
                &mut OsRng,
            )
            .map_err(|_| COSEError::EncryptFailed)?;
        let en = copy_out(enc_out, &encapped.to_bytes())?;
        let cn = copy_out(ct_out, &ciphertext)?;
        Ok((en, cn))
    }

    fn hpke_open(
        &self,
        suite: HpkeSuite,
        recipient_private: &RustCryptoKey,
        enc: &[u8],
        info: &[u8],
        aad: Option<&[u8]>,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        if !hpke_suite_supported(suite) {
            return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
        }
        let sk = match recipient_private {
            RustCryptoKey::X25519Secret(sk) => sk,
            _ => return Err(COSEError::WrongKeyType),
        };
        let encapped = <X25519Kem as KemTrait>::EncappedKey::from_bytes(enc)
            .map_err(|_| COSEError::DecryptFailed)?;
        let plaintext =
            hpke::single_shot_open::<hpke::aead::AesGcm128, hpke::kdf::HkdfSha256, X25519Kem>(
                &OpModeR::Base,
                sk,
                &encapped,
                info,
                ciphertext,
                aad.unwrap_or(&[]),
            )
            .map_err(|_| COSEError::DataAuthFailed)?;
        copy_out(out, &plaintext)
    }
}

fn export_p384(pk: &p384::PublicKey, x: &mut [u8], y: &mut [u8]) -> Result<(i64, usize)> {
    let point = pk.to_encoded_point(false);
    let xb = point.x().ok_or(COSEError::EmptyKey)?;
    let yb = point.y().ok_or(COSEError::EmptyKey)?;
    copy_out(x, xb)?;
    let n = copy_out(y, yb)?;
    Ok((CURVE_P384, n))
}

fn export_p521(pk: &p521::PublicKey, x: &mut [u8], y: &mut [u8]) -> Result<(i64, usize)> {
    let point = pk.to_encoded_point(false);
    let xb = point.x().ok_or(COSEError::EmptyKey)?;
    let yb = point.y().ok_or(COSEError::EmptyKey)?;
    copy_out(x, xb)?;
    let n = copy_out(y, yb)?;
    Ok((CURVE_P521, n))
}
