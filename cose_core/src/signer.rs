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
 * cose_core Signer and Verifier objects
 *
 * Variant-dispatched handlers for a single signature: the "main" flavor drives a real signature
 * algorithm through the crypto adapter, the "short-circuit" flavor implements the private-use
 * test scheme whose signature is the TBS hash repeated to width. Each object carries a stable
 * kind-tag byte so tests can check dispatch without downcasting.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::Decoder;

use crate::constants::*;
use crate::crypto::{hash_alg_for_sign, short_circuit_sig_len, CryptoAdapter};
use crate::error::{COSEError, Result};
use crate::options::OPT_DECODE_ONLY;
use crate::params::{decode_headers, Headers, Param, ParamStorage};
use crate::structure::{encode_sig_structure, hash_sig_structure, CTX_SIGNATURE, CTX_SIGNATURE1};

/// Kind tag of the main signer/verifier flavor.
pub const KIND_MAIN: u8 = b'M';
/// Kind tag of the short-circuit test flavor.
pub const KIND_SHORT_CIRCUIT: u8 = b'C';

/// The inputs bound into a signature: the serialized protected buckets, the external AAD and
/// the payload. For COSE_Sign1 `sign_protected` is absent and the context is "Signature1".
#[derive(Debug, Clone, Copy)]
pub struct SignInputs<'a> {
    /// Body protected-header bytes, exactly as serialized.
    pub body_protected: &'a [u8],
    /// Per-signature protected-header bytes (COSE_Sign only).
    pub sign_protected: Option<&'a [u8]>,
    /// Externally supplied AAD, when in use.
    pub external_aad: Option<&'a [u8]>,
    /// The payload bytes (detached payloads pass through unchanged).
    pub payload: &'a [u8],
}

impl<'a> SignInputs<'a> {
    fn context(&self) -> &'static str {
        if self.sign_protected.is_some() {
            CTX_SIGNATURE
        } else {
            CTX_SIGNATURE1
        }
    }
}

/// A main signer: a real signature algorithm, a signing-key handle and an optional kid.
pub struct MainSigner<'a, C: CryptoAdapter> {
    /// COSE signature algorithm identifier.
    pub alg: i64,
    /// Signing key handle.
    pub key: C::Key,
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
    /// Additional per-signature parameters.
    pub params: &'a [Param<'a>],
}

/// A short-circuit test signer. No key material; the "signature" is derived from the TBS hash.
#[derive(Debug)]
pub struct ShortCircuitSigner<'a> {
    /// One of the three short-circuit algorithm identifiers.
    pub alg: i64,
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
    /// Additional per-signature parameters.
    pub params: &'a [Param<'a>],
}

/// A signer object: produces one signature over the sign inputs.
pub enum Signer<'a, C: CryptoAdapter> {
    /// Real signature algorithms (ECDSA, EdDSA, RSA-PSS).
    Main(MainSigner<'a, C>),
    /// The short-circuit test scheme.
    ShortCircuit(ShortCircuitSigner<'a>),
}

impl<'a, C: CryptoAdapter> Signer<'a, C> {
    /// Construct a main signer.
    pub fn main(alg: i64, key: C::Key, kid: Option<&'a [u8]>) -> Self {
        Signer::Main(MainSigner {
            alg,
            key,
            kid,
            params: &[],
        })
    }

    /// Construct a short-circuit test signer.
    pub fn short_circuit(alg: i64, kid: Option<&'a [u8]>) -> Self {
        Signer::ShortCircuit(ShortCircuitSigner {
            alg,
            kid,
            params: &[],
        })
    }

    /// Attach additional per-signature parameters.
    pub fn with_params(mut self, params: &'a [Param<'a>]) -> Self {
        match &mut self {
            Signer::Main(s) => s.params = params,
            Signer::ShortCircuit(s) => s.params = params,
        }
        self
    }

    /// The stable kind-tag byte of this variant.
    pub fn kind(&self) -> u8 {
        match self {
            Signer::Main(_) => KIND_MAIN,
            Signer::ShortCircuit(_) => KIND_SHORT_CIRCUIT,
        }
    }

    pub(crate) fn alg(&self) -> i64 {
        match self {
            Signer::Main(s) => s.alg,
            Signer::ShortCircuit(s) => s.alg,
        }
    }

    pub(crate) fn kid(&self) -> Option<&'a [u8]> {
        match self {
            Signer::Main(s) => s.kid,
            Signer::ShortCircuit(s) => s.kid,
        }
    }

    pub(crate) fn params(&self) -> &'a [Param<'a>] {
        match self {
            Signer::Main(s) => s.params,
            Signer::ShortCircuit(s) => s.params,
        }
    }

    /// The worst-case signature size, for sizing the output byte string before signing.
    pub(crate) fn sig_size(&self, adapter: &C) -> Result<usize> {
        match self {
            Signer::Main(s) => adapter.sig_size(s.alg, &s.key),
            Signer::ShortCircuit(s) => short_circuit_sig_len(s.alg),
        }
    }

    /// Prepare the to-be-signed bytes for this signer: the TBS hash for hash-then-sign
    /// algorithms, or the full materialized Sig_structure for EdDSA (which requires the
    /// caller-supplied auxiliary buffer `aux`).
    pub(crate) fn prepare<'t>(
        &self,
        adapter: &C,
        inputs: &SignInputs<'_>,
        tbs: &'t mut [u8; 64],
        aux: Option<&'t mut [u8]>,
    ) -> Result<&'t [u8]> {
        match self {
            Signer::Main(s) if s.alg == ALG_EDDSA => {
                let aux = aux.ok_or(COSEError::BufferTooSmall)?;
                let n = encode_sig_structure(
                    aux,
                    inputs.context(),
                    inputs.body_protected,
                    inputs.sign_protected,
                    inputs.external_aad,
                    inputs.payload,
                )?;
                Ok(&aux[..n])
            }
            _ => {
                let hn = hash_tbs(adapter, self.alg(), inputs, &mut tbs[..])?;
                Ok(&tbs[..hn])
            }
        }
    }

    /// Produce the signature over bytes prepared with [`Signer::prepare`], writing it to `out`
    /// and returning its length.
    pub(crate) fn sign_prepared(&self, adapter: &C, tbs: &[u8], out: &mut [u8]) -> Result<usize> {
        match self {
            Signer::Main(s) => adapter.sign(s.alg, &s.key, tbs, out),
            Signer::ShortCircuit(s) => {
                let n = short_circuit_sig_len(s.alg)?;
                if out.len() < n {
                    return Err(COSEError::BufferTooSmall);
                }
                for (i, byte) in out.iter_mut().enumerate().take(n) {
                    *byte = tbs[i % tbs.len()];
                }
                Ok(n)
            }
        }
    }
}

fn hash_tbs<C: CryptoAdapter>(
    adapter: &C,
    alg: i64,
    inputs: &SignInputs<'_>,
    out: &mut [u8],
) -> Result<usize> {
    let hash_alg = hash_alg_for_sign(alg)?;
    hash_sig_structure(
        adapter,
        hash_alg,
        inputs.context(),
        inputs.body_protected,
        inputs.sign_protected,
        inputs.external_aad,
        inputs.payload,
        out,
    )
}

/// A main verifier: a verification-key handle and an optional expected kid.
pub struct MainVerifier<'a, C: CryptoAdapter> {
    /// Verification key handle.
    pub key: C::Key,
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
}

/// A short-circuit test verifier.
#[derive(Debug)]
pub struct ShortCircuitVerifier<'a> {
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
}

/// A verifier object: checks one signature against the sign inputs.
pub enum Verifier<'a, C: CryptoAdapter> {
    /// Real signature algorithms (ECDSA, EdDSA, RSA-PSS).
    Main(MainVerifier<'a, C>),
    /// The short-circuit test scheme.
    ShortCircuit(ShortCircuitVerifier<'a>),
}

/// The algorithms the main verifier will process.
fn main_supports(alg: i64) -> bool {
    matches!(
        alg,
        ALG_ES256 | ALG_ES384 | ALG_ES512 | ALG_PS256 | ALG_PS384 | ALG_PS512 | ALG_EDDSA
    )
}

impl<'a, C: CryptoAdapter> Verifier<'a, C> {
    /// Construct a main verifier.
    pub fn main(key: C::Key, kid: Option<&'a [u8]>) -> Self {
        Verifier::Main(MainVerifier { key, kid })
    }

    /// Construct a short-circuit test verifier.
    pub fn short_circuit(kid: Option<&'a [u8]>) -> Self {
        Verifier::ShortCircuit(ShortCircuitVerifier { kid })
    }

    /// The stable kind-tag byte of this variant.
    pub fn kind(&self) -> u8 {
        match self {
            Verifier::Main(_) => KIND_MAIN,
            Verifier::ShortCircuit(_) => KIND_SHORT_CIRCUIT,
        }
    }

    fn kid(&self) -> Option<&'a [u8]> {
        match self {
            Verifier::Main(v) => v.kid,
            Verifier::ShortCircuit(v) => v.kid,
        }
    }

    /// Check one signature whose headers are already decoded. Algorithm check, then kid check
    /// (byte equality; skipped when this verifier has no configured kid), then the crypto
    /// verification, which `OPT_DECODE_ONLY` suppresses.
    pub(crate) fn verify1(
        &self,
        adapter: &C,
        options: u32,
        inputs: &SignInputs<'_>,
        headers: &Headers<'_>,
        signature: &[u8],
        aux: Option<&mut [u8]>,
    ) -> Result<()> {
        let alg = headers.alg.ok_or(COSEError::NoAlgParameter)?;
        match self {
            Verifier::Main(_) => {
                if !main_supports(alg) || !adapter.is_supported(alg) {
                    return Err(COSEError::UnsupportedSigningAlgorithm);
                }
            }
            Verifier::ShortCircuit(_) => {
                if short_circuit_sig_len(alg).is_err() {
                    return Err(COSEError::UnsupportedSigningAlgorithm);
                }
            }
        }
        if let Some(want) = self.kid() {
            if headers.kid != Some(want) {
                return Err(COSEError::KidUnmatched);
            }
        }
        if options & OPT_DECODE_ONLY != 0 {
            return Ok(());
        }
        match self {
            Verifier::Main(v) => {
                if alg == ALG_EDDSA {
                    let aux = aux.ok_or(COSEError::BufferTooSmall)?;
                    let n = encode_sig_structure(
                        aux,
                        inputs.context(),
                        inputs.body_protected,
                        inputs.sign_protected,
                        inputs.external_aad,
                        inputs.payload,
                    )?;
                    adapter.verify(alg, &v.key, &aux[..n], signature)
                } else {
                    let mut tbs = [0u8; 64];
                    let hn = hash_tbs(adapter, alg, inputs, &mut tbs)?;
                    adapter.verify(alg, &v.key, &tbs[..hn], signature)
                }
            }
            Verifier::ShortCircuit(_) => {
                let mut tbs = [0u8; 64];
                let hn = hash_tbs(adapter, alg, inputs, &mut tbs)?;
                let n = short_circuit_sig_len(alg)?;
                if signature.len() != n {
                    return Err(COSEError::SigVerifyFailed);
                }
                for (i, byte) in signature.iter().enumerate() {
                    if *byte != tbs[i % hn] {
                        return Err(COSEError::SigVerifyFailed);
                    }
                }
                Ok(())
            }
        }
    }

    /// Decode one COSE_Signature element and check it. Used by the COSE_Sign decode engine.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn verify<'buf>(
        &self,
        adapter: &C,
        options: u32,
        body_protected: &[u8],
        external_aad: Option<&[u8]>,
        payload: &[u8],
        d: &mut Decoder<'buf>,
        storage: &mut ParamStorage<'_, 'buf>,
        aux: Option<&mut [u8]>,
    ) -> Result<Headers<'buf>> {
        let (headers, signature) = decode_signature_element(d, storage, options)?;
        let inputs = SignInputs {
            body_protected,
            sign_protected: Some(headers.protected_raw),
            external_aad,
            payload,
        };
        self.verify1(adapter, options, &inputs, &headers, signature, aux)?;
        Ok(headers)
    }
}

/// Decode one COSE_Signature element: `[ protected bstr, unprotected map, signature bstr ]`.
pub(crate) fn decode_signature_element<'buf>(
    d: &mut Decoder<'buf>,
    storage: &mut ParamStorage<'_, 'buf>,
    options: u32,
) -> Result<(Headers<'buf>, &'buf [u8])> {
    let n = d.array()?.ok_or(COSEError::Format)?;
    if n != 3 {
        return Err(COSEError::BadArrayLength);
    }
    let headers = decode_headers(d, storage, None, options)?;
    if d.datatype()? != Type::Bytes {
        return Err(COSEError::WrongType);
    }
    let signature = d.bytes()?;
    Ok((headers, signature))
}
