/***************************************************************************************************
 * Copyright (c) 2021-2023, Qualcomm Innovation Center, Inc. All rights reserved.
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
 * cose_core Crypto Adapter contract
 *
 * The narrow trait through which the engines reach all cryptography, together with the fixed
 * algorithm property tables. Implementations plug in concrete backends; the engines never touch
 * key material or an RNG directly. Hash and MAC operations use per-operation context objects so
 * that implementations carry no static mutable state.
 **************************************************************************************************/
use std::convert::Infallible;

use crate::error::{COSEError, Result};

/// The y-coordinate of an EC2 public key: either the full coordinate or its compressed sign
/// bit, as COSE_Key allows both representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YCoordinate<'a> {
    /// Full y-coordinate bytes
    Full(&'a [u8]),
    /// Sign bit of the y-coordinate (point compression)
    Sign(bool),
}

/// An HPKE ciphersuite as the (KEM, KDF, AEAD) identifier triple of RFC 9180.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpkeSuite {
    /// RFC 9180 KEM identifier
    pub kem: u16,
    /// RFC 9180 KDF identifier
    pub kdf: u16,
    /// RFC 9180 AEAD identifier
    pub aead: u16,
}

/// RFC 9180 KEM id: DHKEM(X25519, HKDF-SHA256)
pub const HPKE_KEM_X25519_HKDF_SHA256: u16 = 0x0020;
/// RFC 9180 KEM id: DHKEM(P-256, HKDF-SHA256)
pub const HPKE_KEM_P256_HKDF_SHA256: u16 = 0x0010;
/// RFC 9180 KDF id: HKDF-SHA256
pub const HPKE_KDF_HKDF_SHA256: u16 = 0x0001;
/// RFC 9180 AEAD id: AES-128-GCM
pub const HPKE_AEAD_A128GCM: u16 = 0x0001;
/// RFC 9180 AEAD id: AES-256-GCM
pub const HPKE_AEAD_A256GCM: u16 = 0x0002;

/// The cryptographic operations consumed by the COSE engines.
///
/// Every operation reports failures through the taxonomy in [`crate::error::COSEError`]; in
/// particular AEAD and key-unwrap integrity failures must surface as `DataAuthFailed` so that
/// callers can tell "wrong key or tampered data" from a backend malfunction.
///
/// Keys are opaque handles of the associated `Key` type. Handles created by the engines (the
/// random CEK of `COSE_Encrypt`, the ephemeral key of ECDH-ES) are owned values and released by
/// `Drop` on every exit path.
pub trait CryptoAdapter {
    /// In-progress hash context. One per operation; implementations must not share state.
    type HashCtx;
    /// In-progress MAC context.
    type MacCtx;
    /// Opaque key handle.
    type Key;

    /// Return `true` if the adapter can perform operations for COSE algorithm `alg`.
    fn is_supported(&self, alg: i64) -> bool;

    /// Begin a streaming hash with the given COSE hash algorithm.
    fn hash_start(&self, alg: i64) -> Result<Self::HashCtx>;
    /// Add bytes to a hash in progress.
    fn hash_update(&self, ctx: &mut Self::HashCtx, data: &[u8]);
    /// Finish a hash, writing the digest to `out` and returning its length.
    fn hash_finish(&self, ctx: Self::HashCtx, out: &mut [u8]) -> Result<usize>;

    /// Begin a streaming MAC with the given COSE HMAC algorithm.
    fn hmac_setup(&self, alg: i64, key: &Self::Key) -> Result<Self::MacCtx>;
    /// Add bytes to a MAC in progress.
    fn hmac_update(&self, ctx: &mut Self::MacCtx, data: &[u8]);
    /// Finish a MAC computation, writing the tag to `out` and returning its length.
    fn hmac_compute_finish(&self, ctx: Self::MacCtx, out: &mut [u8]) -> Result<usize>;
    /// Finish a MAC validation against `expected`. Mismatch is `DataAuthFailed`.
    fn hmac_validate_finish(&self, ctx: Self::MacCtx, expected: &[u8]) -> Result<()>;

    /// The size of a signature produced with `alg` and `key`, for sizing output buffers.
    fn sig_size(&self, alg: i64, key: &Self::Key) -> Result<usize>;
    /// Sign `tbs` (the TBS hash, or the full Sig_structure for EdDSA), writing the signature to
    /// `out` and returning its length. ECDSA signatures are the fixed-width r‖s encoding.
    fn sign(&self, alg: i64, key: &Self::Key, tbs: &[u8], out: &mut [u8]) -> Result<usize>;
    /// Verify `signature` over `tbs`. Rejection is `SigVerifyFailed`.
    fn verify(&self, alg: i64, key: &Self::Key, tbs: &[u8], signature: &[u8]) -> Result<()>;

    /// AEAD-encrypt `plaintext`, appending the authentication tag. Returns the number of bytes
    /// written to `out`.
    fn aead_encrypt(
        &self,
        alg: i64,
        key: &Self::Key,
        nonce: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize>;
    /// AEAD-decrypt `ciphertext` (tag appended). Tag mismatch is `DataAuthFailed`.
    fn aead_decrypt(
        &self,
        alg: i64,
        key: &Self::Key,
        nonce: &[u8],
        aad: Option<&[u8]>,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize>;

    /// RFC 3394 key wrap with the default IV. Output is `plaintext.len() + 8` bytes.
    fn kw_wrap(&self, alg: i64, kek: &Self::Key, plaintext: &[u8], out: &mut [u8])
        -> Result<usize>;
    /// RFC 3394 key unwrap. Integrity failure is `DataAuthFailed`.
    fn kw_unwrap(
        &self,
        alg: i64,
        kek: &Self::Key,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize>;

    /// HKDF with the given COSE hash algorithm, filling all of `okm`.
    fn hkdf(
        &self,
        hash_alg: i64,
        salt: Option<&[u8]>,
        ikm: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<()>;

    /// ECDH shared-secret computation. Returns the secret length written to `out`.
    fn ecdh(&self, private_key: &Self::Key, public_key: &Self::Key, out: &mut [u8])
        -> Result<usize>;
    /// Generate an ephemeral EC key pair on `curve`.
    fn generate_ec_key(&self, curve: i64) -> Result<Self::Key>;
    /// Import an EC2 public key from its coordinates.
    fn import_ec2_public_key(&self, curve: i64, x: &[u8], y: YCoordinate<'_>)
        -> Result<Self::Key>;
    /// Export the public half of an EC key. Writes the x and y coordinates and returns the
    /// curve and coordinate length.
    fn export_ec2_public_key(
        &self,
        key: &Self::Key,
        x: &mut [u8],
        y: &mut [u8],
    ) -> Result<(i64, usize)>;

    /// Wrap raw symmetric key bytes in a key handle for `alg`.
    fn make_symmetric_key(&self, alg: i64, raw: &[u8]) -> Result<Self::Key>;
    /// Export the raw bytes of a symmetric key handle.
    fn export_symmetric_key(&self, key: &Self::Key, out: &mut [u8]) -> Result<usize>;

    /// Fill `out` with random bytes.
    fn get_random(&self, out: &mut [u8]) -> Result<()>;

    /// HPKE Base-mode single-shot seal. Writes the encapsulated key to `enc_out` and the
    /// ciphertext (tag appended) to `ct_out`; returns both lengths.
    #[allow(clippy::too_many_arguments)]
    fn hpke_seal(
        &self,
        suite: HpkeSuite,
        recipient_public: &Self::Key,
        info: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
        enc_out: &mut [u8],
        ct_out: &mut [u8],
    ) -> Result<(usize, usize)>;
    /// HPKE Base-mode single-shot open. Integrity failure is `DataAuthFailed`.
    #[allow(clippy::too_many_arguments)]
    fn hpke_open(
        &self,
        suite: HpkeSuite,
        recipient_private: &Self::Key,
        enc: &[u8],
        info: &[u8],
        aad: Option<&[u8]>,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize>;
}

/***************************************************************************************************
 * Null adapter
 **************************************************************************************************/

/// An adapter with no cryptographic capability. Useful with `OPT_DECODE_ONLY` to inspect
/// message headers without carrying a crypto backend; every operation declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCrypto;

impl CryptoAdapter for NoCrypto {
    type HashCtx = Infallible;
    type MacCtx = Infallible;
    type Key = Infallible;

    fn is_supported(&self, _alg: i64) -> bool {
        false
    }

    fn hash_start(&self, _alg: i64) -> Result<Infallible> {
        Err(COSEError::UnsupportedHash)
    }

    fn hash_update(&self, ctx: &mut Infallible, _data: &[u8]) {
        match *ctx {}
    }

    fn hash_finish(&self, ctx: Infallible, _out: &mut [u8]) -> Result<usize> {
        match ctx {}
    }

    fn hmac_setup(&self, _alg: i64, key: &Infallible) -> Result<Infallible> {
        match *key {}
    }

    fn hmac_update(&self, ctx: &mut Infallible, _data: &[u8]) {
        match *ctx {}
    }

    fn hmac_compute_finish(&self, ctx: Infallible, _out: &mut [u8]) -> Result<usize> {
        match ctx {}
    }

    fn hmac_validate_finish(&self, ctx: Infallible, _expected: &[u8]) -> Result<()> {
        match ctx {}
    }

    fn sig_size(&self, _alg: i64, key: &Infallible) -> Result<usize> {
        match *key {}
    }

    fn sign(&self, _alg: i64, key: &Infallible, _tbs: &[u8], _out: &mut [u8]) -> Result<usize> {
        match *key {}
    }

    fn verify(&self, _alg: i64, key: &Infallible, _tbs: &[u8], _signature: &[u8]) -> Result<()> {
        match *key {}
    }

    fn aead_encrypt(
        &self,
        _alg: i64,
        key: &Infallible,
        _nonce: &[u8],
        _aad: Option<&[u8]>,
        _plaintext: &[u8],
        _out: &mut [u8],
    ) -> Result<usize> {
        match *key {}
    }

    fn aead_decrypt(
        &self,
        _alg: i64,
        key: &Infallible,
        _nonce: &[u8],
        _aad: Option<&[u8]>,
        _ciphertext: &[u8],
        _out: &mut [u8],
    ) -> Result<usize> {
        match *key {}
    }

    fn kw_wrap(
        &self,
        _alg: i64,
        kek: &Infallible,
        _plaintext: &[u8],
        _out: &mut [u8],
    ) -> Result<usize> {
        match *kek {}
    }

    fn kw_unwrap(
        &self,
        _alg: i64,
        kek: &Infallible,
        _ciphertext: &[u8],
        _out: &mut [u8],
    ) -> Result<usize> {
        match *kek {}
    }

    fn hkdf(
        &self,
        _hash_alg: i64,
        _salt: Option<&[u8]>,
        _ikm: &[u8],
        _info: &[u8],
        _okm: &mut [u8],
    ) -> Result<()> {
        Err(COSEError::HkdfFailed)
    }

    fn ecdh(
        &self,
        private_key: &Infallible,
        _public_key: &Infallible,
        _out: &mut [u8],
    ) -> Result<usize> {
        match *private_key {}
    }

    fn generate_ec_key(&self, _curve: i64) -> Result<Infallible> {
        Err(COSEError::UnsupportedAlgorithm)
    }

    fn import_ec2_public_key(
        &self,
        _curve: i64,
        _x: &[u8],
        _y: YCoordinate<'_>,
    ) -> Result<Infallible> {
        Err(COSEError::UnsupportedAlgorithm)
    }

    fn export_ec2_public_key(
        &self,
        key: &Infallible,
        _x: &mut [u8],
        _y: &mut [u8],
    ) -> Result<(i64, usize)> {
        match *key {}
    }

    fn make_symmetric_key(&self, _alg: i64, _raw: &[u8]) -> Result<Infallible> {
        Err(COSEError::UnsupportedAlgorithm)
    }

    fn export_symmetric_key(&self, key: &Infallible, _out: &mut [u8]) -> Result<usize> {
        match *key {}
    }

    fn get_random(&self, _out: &mut [u8]) -> Result<()> {
        Err(COSEError::RngFailed)
    }

    fn hpke_seal(
        &self,
        _suite: HpkeSuite,
        recipient_public: &Infallible,
        _info: &[u8],
        _aad: Option<&[u8]>,
        _plaintext: &[u8],
        _enc_out: &mut [u8],
        _ct_out: &mut [u8],
    ) -> Result<(usize, usize)> {
        match *recipient_public {}
    }

    fn hpke_open(
        &self,
        _suite: HpkeSuite,
        recipient_private: &Infallible,
        _enc: &[u8],
        _info: &[u8],
        _aad: Option<&[u8]>,
        _ciphertext: &[u8],
        _out: &mut [u8],
    ) -> Result<usize> {
        match *recipient_private {}
    }
}

/***************************************************************************************************
 * Algorithm property tables
 **************************************************************************************************/
use crate::constants::*;

/// Return `true` if `alg` is an AEAD content-encryption algorithm known to the core.
pub fn is_aead_alg(alg: i64) -> bool {
    matches!(alg, ALG_A128GCM | ALG_A192GCM | ALG_A256GCM)
}

/// The key size in bits demanded by a content-encryption algorithm.
pub fn aead_key_bits(alg: i64) -> Result<u32> {
    match alg {
        ALG_A128GCM => Ok(128),
        ALG_A192GCM => Ok(192),
        ALG_A256GCM => Ok(256),
        _ => Err(COSEError::UnsupportedEncryptionAlgorithm),
    }
}

/// The nonce length demanded by a content-encryption algorithm.
pub fn aead_nonce_len(alg: i64) -> Result<usize> {
    match alg {
        ALG_A128GCM | ALG_A192GCM | ALG_A256GCM => Ok(12),
        _ => Err(COSEError::UnsupportedEncryptionAlgorithm),
    }
}

/// The authentication tag length appended by a content-encryption algorithm.
pub fn aead_tag_len(alg: i64) -> Result<usize> {
    match alg {
        ALG_A128GCM | ALG_A192GCM | ALG_A256GCM => Ok(16),
        _ => Err(COSEError::UnsupportedEncryptionAlgorithm),
    }
}

/// The KEK size in bits demanded by an AES Key Wrap algorithm.
pub fn kw_key_bits(alg: i64) -> Result<u32> {
    match alg {
        ALG_A128KW => Ok(128),
        ALG_A192KW => Ok(192),
        ALG_A256KW => Ok(256),
        _ => Err(COSEError::UnsupportedKeyExchangeAlgorithm),
    }
}

/// The AES Key Wrap algorithm an ECDH-ES combined algorithm wraps with.
pub fn kw_alg_for_esdh(alg: i64) -> Result<i64> {
    match alg {
        ALG_ECDH_ES_A128KW => Ok(ALG_A128KW),
        ALG_ECDH_ES_A192KW => Ok(ALG_A192KW),
        ALG_ECDH_ES_A256KW => Ok(ALG_A256KW),
        _ => Err(COSEError::UnsupportedKeyExchangeAlgorithm),
    }
}

/// The HKDF hash for an ECDH-ES combined algorithm. All three registered combinations use
/// HKDF with SHA-256.
pub fn hkdf_hash_for_esdh(alg: i64) -> Result<i64> {
    match alg {
        ALG_ECDH_ES_A128KW | ALG_ECDH_ES_A192KW | ALG_ECDH_ES_A256KW => Ok(ALG_SHA256),
        _ => Err(COSEError::UnsupportedKeyExchangeAlgorithm),
    }
}

/// The hash a hash-then-sign signature algorithm runs over the Sig_structure. EdDSA is not in
/// this table: it signs the full Sig_structure without pre-hashing.
pub fn hash_alg_for_sign(alg: i64) -> Result<i64> {
    match alg {
        ALG_ES256 | ALG_PS256 | ALG_SHORT_CIRCUIT_256 => Ok(ALG_SHA256),
        ALG_ES384 | ALG_PS384 | ALG_SHORT_CIRCUIT_384 => Ok(ALG_SHA384),
        ALG_ES512 | ALG_PS512 | ALG_SHORT_CIRCUIT_512 => Ok(ALG_SHA512),
        _ => Err(COSEError::UnsupportedSigningAlgorithm),
    }
}

/// The hash underlying a COSE HMAC algorithm. The COSE HMAC algorithms use full-length tags,
/// so the tag length equals the hash output length.
pub fn hmac_hash_alg(alg: i64) -> Result<i64> {
    match alg {
        ALG_HMAC256 => Ok(ALG_SHA256),
        ALG_HMAC384 => Ok(ALG_SHA384),
        ALG_HMAC512 => Ok(ALG_SHA512),
        _ => Err(COSEError::UnsupportedAlgorithm),
    }
}

/// The output length of a COSE hash algorithm.
pub fn hash_len(hash_alg: i64) -> Result<usize> {
    match hash_alg {
        ALG_SHA256 => Ok(32),
        ALG_SHA384 => Ok(48),
        ALG_SHA512 => Ok(64),
        _ => Err(COSEError::UnsupportedHash),
    }
}

/// The fixed signature width of a short-circuit test algorithm (matching the corresponding
/// ECDSA width).
pub fn short_circuit_sig_len(alg: i64) -> Result<usize> {
    match alg {
        ALG_SHORT_CIRCUIT_256 => Ok(64),
        ALG_SHORT_CIRCUIT_384 => Ok(96),
        ALG_SHORT_CIRCUIT_512 => Ok(132),
        _ => Err(COSEError::UnsupportedSigningAlgorithm),
    }
}

/// The coordinate (or raw public key) length in bytes of an elliptic curve.
pub fn curve_coord_len(curve: i64) -> Result<usize> {
    match curve {
        CURVE_P256 => Ok(32),
        CURVE_P384 => Ok(48),
        CURVE_P521 => Ok(66),
        CURVE_X25519 => Ok(32),
        CURVE_X448 => Ok(56),
        CURVE_ED25519 => Ok(32),
        _ => Err(COSEError::WrongCurve),
    }
}

/// The HPKE ciphersuite for a COSE HPKE algorithm identifier.
pub fn hpke_suite_for_alg(alg: i64) -> Result<HpkeSuite> {
    match alg {
        ALG_HPKE_BASE_X25519_A128GCM => Ok(HpkeSuite {
            kem: HPKE_KEM_X25519_HKDF_SHA256,
            kdf: HPKE_KDF_HKDF_SHA256,
            aead: HPKE_AEAD_A128GCM,
        }),
        ALG_HPKE_BASE_P256_A128GCM => Ok(HpkeSuite {
            kem: HPKE_KEM_P256_HKDF_SHA256,
            kdf: HPKE_KDF_HKDF_SHA256,
            aead: HPKE_AEAD_A128GCM,
        }),
        _ => Err(COSEError::UnsupportedKeyExchangeAlgorithm),
    }
}

/// The encapsulated-key size of an HPKE KEM, for sizing output buffers.
pub fn hpke_enc_len(suite: HpkeSuite) -> Result<usize> {
    match suite.kem {
        HPKE_KEM_X25519_HKDF_SHA256 => Ok(32),
        HPKE_KEM_P256_HKDF_SHA256 => Ok(65),
        _ => Err(COSEError::UnsupportedKeyExchangeAlgorithm),
    }
}
