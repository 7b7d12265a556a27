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
 * cose_core module definition
 *
 * A memory efficient encoder and decoder for the COSE message formats (RFC 9052/9053).
 * This implementation is designed for use in constrained systems and requires neither the Rust
 * standard library nor an allocator.
 **************************************************************************************************/

// Default configuration
#![no_std]
#![warn(missing_docs)]

//! # COSE_CORE
//!
//! The `cose_core` crate provides the COSE (CBOR Object Signing and Encryption,
//! [RFC 9052](https://datatracker.ietf.org/doc/rfc9052/) /
//! [RFC 9053](https://datatracker.ietf.org/doc/rfc9053/)) message formats for embedded targets
//! where the programmer wants to maintain low-level control over buffers and key material. The
//! typical use-cases are IoT attestation, firmware update manifests, secure boot payloads and
//! Entity Attestation Tokens.
//!
//! The default configuration of `cose_core` does not require an allocator, and simply encodes
//! or decodes on byte buffers of your choice. An allocator is required to run the tests, but
//! this is only to allow string-based I/O, and is not used by the implementation.
//!
//! ## Features
//!
//! - Encode and decode engines for all six COSE message types: `COSE_Sign1`, `COSE_Sign`,
//!   `COSE_Encrypt0`, `COSE_Encrypt`, `COSE_Mac0` and `COSE_Mac`.
//! - A two-bucket (protected / unprotected) header parameter model with duplicate detection,
//!   `crit` enforcement and pluggable special-parameter decoders.
//! - Recipient processing for direct keys, AES Key Wrap, ECDH-ES + HKDF + AES-KW and HPKE.
//! - All cryptography is reached through the [`adapter::CryptoAdapter`] trait; the
//!   `cose_rustcrypto` crate in this workspace provides a reference implementation, and the
//!   engines themselves never touch a key byte or an RNG.
//! - Output buffers support a size-probe mode: encoding against
//!   [`buffers::OutputBuffer::sizing`] performs no writes and no cryptography but reports the
//!   final message length, so callers can allocate exactly.
//!
//! CBOR serialization is delegated to the `minicbor` crate; `cose_core` drives its encoder and
//! decoder directly and implements `minicbor::encode::Write` on its own output buffer so that
//! ciphertext and signatures are emitted in place, without intermediate copies.
//!
//! ## Example
//!
//! Signing and verifying a `COSE_Sign1` message (the crypto adapter here is the reference
//! implementation from `cose_rustcrypto`; any [`adapter::CryptoAdapter`] will do):
//!
//! ```ignore
//! let adapter = RustCrypto::new();
//! let key = adapter.ec2_signing_key(CURVE_P256, &private_key_bytes)?;
//! let signer = Signer::main(ALG_ES256, key, Some(b"11"));
//!
//! let mut buf = [0u8; 256];
//! let mut out = OutputBuffer::new(&mut buf);
//! let n = SignEncoder::sign1(&adapter, 0)
//!     .encode(Payload::Embedded(b"hello"), &[], &[signer], &mut out)?;
//!
//! let mut slots = [Param::EMPTY; 10];
//! let verify_key = adapter.ec2_verification_key(CURVE_P256, &public_key_bytes)?;
//! let verifier = Verifier::main(verify_key, Some(b"11"));
//! let decoded = SignDecoder::sign1(&adapter, 0)
//!     .with_verifiers(core::slice::from_ref(&verifier))
//!     .decode(&buf[..n], None, &mut slots)?;
//! assert_eq!(decoded.payload, Some(&b"hello"[..]));
//! ```

// Pull in std if we are testing or if it is defined as feature (because we run tests on a
// platform supporting I/O and full feature set.
#[cfg(any(feature = "full", test))]
extern crate std;

// If we are really building no_std, pull in core as well. It is aliased as std so that "use"
// statements are always the same
#[cfg(all(not(feature = "std"), not(test)))]
extern crate core as std;

extern crate minicbor;

pub(crate) mod buffer;
pub(crate) mod crypto;
pub(crate) mod encrypt;
pub(crate) mod mac;
pub(crate) mod options;
pub(crate) mod params;
pub(crate) mod recipient;
pub(crate) mod sign;
pub(crate) mod signer;
pub(crate) mod structure;

/// The `constants` module contains the IANA COSE registry values (algorithm identifiers, header
/// parameter labels, elliptic curves and CBOR tag numbers) used throughout `cose_core`.
pub mod constants;

/// The `error` module contains error definitions used throughout `cose_core`.
pub mod error;

/// The `buffers` module exports the writable output buffer over which all encode engines
/// operate, including its size-probe ("sizing") mode.
pub mod buffers {
    pub use super::buffer::{BytesPlaceholder, OutputBuffer};
}

/// The `header` module exports the header-parameter model: parameter nodes, the caller-supplied
/// parameter storage pool, and the decoded header views.
pub mod header {
    pub use super::params::{
        ContentFormat, EncodeParamFn, Headers, Label, Param, ParamStorage, ParamValue,
        SpecialParams, RECOMMENDED_PARAM_SLOTS,
    };
}

/// The `adapter` module exports the narrow cryptographic contract consumed by the engines, a
/// null adapter for header-inspection use, and the fixed algorithm property tables.
pub mod adapter {
    pub use super::crypto::{
        aead_key_bits, aead_nonce_len, aead_tag_len, curve_coord_len, hash_alg_for_sign,
        hash_len, hkdf_hash_for_esdh, hmac_hash_alg, hpke_enc_len, hpke_suite_for_alg,
        is_aead_alg, kw_alg_for_esdh, kw_key_bits, short_circuit_sig_len, CryptoAdapter, HpkeSuite,
        YCoordinate, HPKE_AEAD_A128GCM, HPKE_AEAD_A256GCM, HPKE_KDF_HKDF_SHA256,
        HPKE_KEM_P256_HKDF_SHA256, HPKE_KEM_X25519_HKDF_SHA256,
    };
    pub use super::crypto::NoCrypto;
}

/// The `message` module exports the six message engines, the signer / verifier / recipient
/// objects they dispatch through, and the option-flag surface controlling their behaviour.
pub mod message {
    pub use super::encrypt::{DecodedEncrypt, EncryptDecoder, EncryptEncoder, EncryptedLengths};
    pub use super::mac::{DecodedMac, MacDecoder, MacEncoder};
    pub use super::options::{
        MessageType, OPT_DECODE_ONLY, OPT_ENABLE_NON_AEAD, OPT_NO_CRIT_CHECK, OPT_OMIT_CBOR_TAG,
        OPT_TAG_FORBIDDEN, OPT_TAG_REQUIRED,
    };
    pub use super::recipient::{
        AesKwRecipient, AesKwRecipientDecoder, DirectRecipient, DirectRecipientDecoder,
        EsdhRecipient, EsdhRecipientDecoder, HpkeRecipient, HpkeRecipientDecoder, PartyInfo,
        Recipient, RecipientDecoder, SaltMode, KIND_AES_KW, KIND_DIRECT, KIND_ESDH, KIND_HPKE,
    };
    pub use super::sign::{
        DecodedSign, Payload, SignDecoder, SignEncoder, SignatureStatus, MAX_SIGNATURES,
    };
    pub use super::signer::{
        MainSigner, MainVerifier, ShortCircuitSigner, ShortCircuitVerifier, SignInputs, Signer,
        Verifier, KIND_MAIN, KIND_SHORT_CIRCUIT,
    };
}

/// The `composer` module exports the Sig_structure / Enc_structure / MAC_structure builders for
/// callers that need to reproduce the to-be-signed bytes outside of an engine.
pub mod composer {
    pub use super::structure::{
        encode_enc_structure, encode_sig_structure, CTX_ENCRYPT, CTX_ENCRYPT0,
        CTX_ENC_RECIPIENT, CTX_MAC, CTX_MAC0, CTX_SIGNATURE, CTX_SIGNATURE1,
    };
}
