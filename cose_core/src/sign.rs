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
 * cose_core Sign engine
 *
 * Encode and decode of COSE_Sign1 and COSE_Sign. The encoder serializes the header buckets,
 * composes the Sig_structure over the emitted protected bytes, and drives the attached signer
 * objects; the decoder walks the message, dispatching each signature through the configured
 * verifier list with soft-error rewind semantics, stopping at the first success.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::buffer::OutputBuffer;
use crate::constants::{HDR_ALG, HDR_KID};
use crate::crypto::CryptoAdapter;
use crate::error::{COSEError, Result};
use crate::options::{consume_tag, emit_tag, MessageType, OPT_DECODE_ONLY};
use crate::params::{decode_headers, encode_headers, Headers, Param, ParamStorage};
use crate::signer::{decode_signature_element, SignInputs, Signer, Verifier};

/// The most signatures a COSE_Sign decode will process.
pub const MAX_SIGNATURES: usize = 8;

/// The payload handed to an encode engine: embedded in the message, or detached (signed or
/// encrypted as usual, but the message carries CBOR `null` in the payload slot).
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Payload carried inside the message.
    Embedded(&'a [u8]),
    /// Payload conveyed out-of-band.
    Detached(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub(crate) fn bytes(&self) -> &'a [u8] {
        match self {
            Payload::Embedded(b) | Payload::Detached(b) => b,
        }
    }

    pub(crate) fn is_detached(&self) -> bool {
        matches!(self, Payload::Detached(_))
    }
}

/// The outcome recorded for one signature of a COSE_Sign message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The signature verified.
    Verified,
    /// Every configured verifier declined the signature.
    Declined,
    /// The signature was not examined (decode-only, or a previous signature already verified).
    NotChecked,
}

/// Encoder for COSE_Sign1 and COSE_Sign.
#[derive(Debug)]
pub struct SignEncoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    external_aad: Option<&'a [u8]>,
    aux_buffer: Option<&'a mut [u8]>,
}

impl<'a, C: CryptoAdapter> SignEncoder<'a, C> {
    /// An encoder producing COSE_Sign1.
    pub fn sign1(adapter: &'a C, options: u32) -> Self {
        SignEncoder {
            adapter,
            options,
            message_type: MessageType::Sign1,
            external_aad: None,
            aux_buffer: None,
        }
    }

    /// An encoder producing COSE_Sign.
    pub fn sign(adapter: &'a C, options: u32) -> Self {
        SignEncoder {
            adapter,
            options,
            message_type: MessageType::Sign,
            external_aad: None,
            aux_buffer: None,
        }
    }

    /// Bind externally supplied AAD into the signatures.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Supply the auxiliary buffer EdDSA needs to materialize the full Sig_structure.
    pub fn with_aux_buffer(mut self, aux: &'a mut [u8]) -> Self {
        self.aux_buffer = Some(aux);
        self
    }

    /// Encode a signed message over `payload`, returning the encoded length.
    ///
    /// `params` are the caller's body header parameters; the engine contributes `alg` (and
    /// `kid`, for COSE_Sign1) from the signer. Encoding against a sizing buffer skips all
    /// cryptography and returns the length the message will have, using each signer's
    /// worst-case signature size.
    pub fn encode(
        &mut self,
        payload: Payload<'_>,
        params: &[Param<'_>],
        signers: &[Signer<'a, C>],
        out: &mut OutputBuffer<'_>,
    ) -> Result<usize> {
        if signers.is_empty() {
            return Err(COSEError::Decline);
        }
        if self.message_type == MessageType::Sign1 && signers.len() > 1 {
            return Err(COSEError::InvalidLength);
        }
        let options = self.options;
        let external_aad = self.external_aad;
        let sizing = out.is_sizing();

        let mut e = Encoder::new(&mut *out);
        emit_tag(&mut e, options, self.message_type)?;
        e.array(4)?;

        // Body headers. For COSE_Sign1 the single signer's alg and kid are body parameters;
        // for COSE_Sign they belong to the per-signature buckets.
        let mut core = [Param::EMPTY; 2];
        let mut n_core = 0;
        if self.message_type == MessageType::Sign1 {
            core[n_core] = Param::int(HDR_ALG, signers[0].alg()).in_protected();
            n_core += 1;
            if let Some(kid) = signers[0].kid() {
                core[n_core] = Param::bytes(HDR_KID, kid);
                n_core += 1;
            }
        }
        let (body_ps, body_pe) = encode_headers(&mut e, &core[..n_core], params)?;

        if payload.is_detached() {
            e.null()?;
        } else {
            e.bytes(payload.bytes())?;
        }

        match self.message_type {
            MessageType::Sign1 => {
                self.encode_signature_bytes(
                    &mut e,
                    &signers[0],
                    (body_ps, body_pe),
                    None,
                    external_aad,
                    payload.bytes(),
                    sizing,
                )?;
            }
            _ => {
                e.array(signers.len() as u64)?;
                for signer in signers {
                    e.array(3)?;
                    let mut sig_core = [Param::EMPTY; 2];
                    let mut n = 0;
                    sig_core[n] = Param::int(HDR_ALG, signer.alg()).in_protected();
                    n += 1;
                    if let Some(kid) = signer.kid() {
                        sig_core[n] = Param::bytes(HDR_KID, kid);
                        n += 1;
                    }
                    let (sig_ps, sig_pe) =
                        encode_headers(&mut e, &sig_core[..n], signer.params())?;
                    self.encode_signature_bytes(
                        &mut e,
                        signer,
                        (body_ps, body_pe),
                        Some((sig_ps, sig_pe)),
                        external_aad,
                        payload.bytes(),
                        sizing,
                    )?;
                }
            }
        }
        drop(e);
        Ok(out.len())
    }

    /// Compose the Sig_structure over the emitted protected bytes, run the signer, and emit
    /// the signature byte string in place.
    #[allow(clippy::too_many_arguments)]
    fn encode_signature_bytes(
        &mut self,
        e: &mut Encoder<&mut OutputBuffer<'_>>,
        signer: &Signer<'a, C>,
        body_range: (usize, usize),
        sign_range: Option<(usize, usize)>,
        external_aad: Option<&[u8]>,
        payload: &[u8],
        sizing: bool,
    ) -> Result<usize> {
        let adapter = self.adapter;
        let sig_max = signer.sig_size(adapter)?;
        if sizing {
            let ph = e.writer_mut().open_bytes(sig_max)?;
            e.writer_mut().close_bytes(ph, sig_max)?;
            return Ok(sig_max);
        }

        let mut tbs_store = [0u8; 64];
        let prepared: &[u8] = {
            let body_protected = e.writer().written(body_range.0, body_range.1)?;
            let sign_protected = match sign_range {
                Some((s, t)) => Some(e.writer().written(s, t)?),
                None => None,
            };
            let inputs = SignInputs {
                body_protected,
                sign_protected,
                external_aad,
                payload,
            };
            signer.prepare(
                adapter,
                &inputs,
                &mut tbs_store,
                self.aux_buffer.as_deref_mut(),
            )?
        };

        let ph = e.writer_mut().open_bytes(sig_max)?;
        let region = e.writer_mut().bytes_mut(&ph)?;
        let n = signer.sign_prepared(adapter, prepared, region)?;
        e.writer_mut().close_bytes(ph, n)?;
        Ok(n)
    }
}

/// The decoded view of a COSE_Sign1 or COSE_Sign message.
#[derive(Debug)]
pub struct DecodedSign<'buf, 's> {
    /// The payload: embedded bytes, the caller's detached payload, or `None` when the message
    /// carries `null` and no detached payload was supplied (decode-only).
    pub payload: Option<&'buf [u8]>,
    /// The decoded body headers.
    pub body: Headers<'buf>,
    /// Every parameter decoded from the message, body and signature elements alike.
    pub params: &'s [Param<'buf>],
    /// The raw signature bytes (COSE_Sign1 only).
    pub signature: Option<&'buf [u8]>,
    /// Per-signature outcomes, in on-wire order.
    pub statuses: [SignatureStatus; MAX_SIGNATURES],
    /// The number of signatures present.
    pub n_signatures: usize,
    /// The index of the signature that verified, if any.
    pub verified: Option<usize>,
}

/// Decoder for COSE_Sign1 and COSE_Sign.
pub struct SignDecoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    external_aad: Option<&'a [u8]>,
    aux_buffer: Option<&'a mut [u8]>,
    verifiers: &'a [Verifier<'a, C>],
}

impl<'a, C: CryptoAdapter> SignDecoder<'a, C> {
    /// A decoder for COSE_Sign1.
    pub fn sign1(adapter: &'a C, options: u32) -> Self {
        SignDecoder {
            adapter,
            options,
            message_type: MessageType::Sign1,
            external_aad: None,
            aux_buffer: None,
            verifiers: &[],
        }
    }

    /// A decoder for COSE_Sign.
    pub fn sign(adapter: &'a C, options: u32) -> Self {
        SignDecoder {
            adapter,
            options,
            message_type: MessageType::Sign,
            external_aad: None,
            aux_buffer: None,
            verifiers: &[],
        }
    }

    /// Bind externally supplied AAD into the verification.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Supply the auxiliary buffer EdDSA verification requires.
    pub fn with_aux_buffer(mut self, aux: &'a mut [u8]) -> Self {
        self.aux_buffer = Some(aux);
        self
    }

    /// Attach the verifier list tried, in order, against each signature.
    pub fn with_verifiers(mut self, verifiers: &'a [Verifier<'a, C>]) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// Decode (and, unless `OPT_DECODE_ONLY` is set, verify) a signed message.
    ///
    /// `detached_payload` supplies the payload when the message carries `null` in its payload
    /// slot. Decoded parameters are drawn from `slots`.
    pub fn decode<'buf, 's>(
        &mut self,
        input: &'buf [u8],
        detached_payload: Option<&'buf [u8]>,
        slots: &'s mut [Param<'buf>],
    ) -> Result<DecodedSign<'buf, 's>> {
        let adapter = self.adapter;
        let options = self.options;
        let external_aad = self.external_aad;
        let verifiers = self.verifiers;
        let decode_only = options & OPT_DECODE_ONLY != 0;

        let mut storage = ParamStorage::new(slots);
        let mut d = Decoder::new(input);
        consume_tag(&mut d, options, self.message_type)?;
        let n = d.array()?.ok_or(COSEError::Format)?;
        if n != 4 {
            return Err(COSEError::BadArrayLength);
        }
        let body = decode_headers(&mut d, &mut storage, None, options)?;

        let payload: Option<&'buf [u8]> = match d.datatype()? {
            Type::Null => {
                d.null()?;
                detached_payload
            }
            Type::Bytes => Some(d.bytes()?),
            _ => return Err(COSEError::WrongType),
        };

        let mut statuses = [SignatureStatus::NotChecked; MAX_SIGNATURES];
        let mut verified = None;
        let mut signature = None;
        let n_signatures;

        if self.message_type == MessageType::Sign1 {
            if d.datatype()? != Type::Bytes {
                return Err(COSEError::WrongType);
            }
            let sig = d.bytes()?;
            signature = Some(sig);
            n_signatures = 1;
            if !decode_only {
                let payload_bytes = payload.ok_or(COSEError::Format)?;
                let inputs = SignInputs {
                    body_protected: body.protected_raw,
                    sign_protected: None,
                    external_aad,
                    payload: payload_bytes,
                };
                let mut ok = false;
                for v in verifiers {
                    match v.verify1(
                        adapter,
                        options,
                        &inputs,
                        &body,
                        sig,
                        self.aux_buffer.as_deref_mut(),
                    ) {
                        Ok(()) => {
                            ok = true;
                            break;
                        }
                        Err(err) if err.is_soft() => continue,
                        Err(err) => return Err(err),
                    }
                }
                if !ok {
                    return Err(COSEError::Decline);
                }
                statuses[0] = SignatureStatus::Verified;
                verified = Some(0);
            }
        } else {
            let sigs = d.array()?.ok_or(COSEError::Format)?;
            if sigs == 0 {
                return Err(COSEError::BadArrayLength);
            }
            if sigs as usize > MAX_SIGNATURES {
                return Err(COSEError::InvalidLength);
            }
            n_signatures = sigs as usize;
            let mut any_verified = false;
            for status in statuses.iter_mut().take(n_signatures) {
                if decode_only {
                    // Walk the element so its headers land in the pool, but check nothing.
                    let _ = decode_signature_element(&mut d, &mut storage, options)?;
                    continue;
                }
                if any_verified {
                    // First success ends dispatch; remaining elements are stepped over.
                    d.skip()?;
                    continue;
                }
                let payload_bytes = payload.ok_or(COSEError::Format)?;
                let mark_pos = d.position();
                let mark_storage = storage.len();
                let mut outcome = SignatureStatus::Declined;
                for v in verifiers {
                    d.set_position(mark_pos);
                    storage.rewind(mark_storage);
                    match v.verify(
                        adapter,
                        options,
                        body.protected_raw,
                        external_aad,
                        payload_bytes,
                        &mut d,
                        &mut storage,
                        self.aux_buffer.as_deref_mut(),
                    ) {
                        Ok(_headers) => {
                            outcome = SignatureStatus::Verified;
                            break;
                        }
                        Err(err) if err.is_soft() => continue,
                        Err(err) => return Err(err),
                    }
                }
                if outcome == SignatureStatus::Verified {
                    any_verified = true;
                } else {
                    d.set_position(mark_pos);
                    storage.rewind(mark_storage);
                    d.skip()?;
                }
                *status = outcome;
            }
            verified = statuses[..n_signatures]
                .iter()
                .position(|s| *s == SignatureStatus::Verified);
            if !decode_only && verified.is_none() {
                return Err(COSEError::Decline);
            }
        }

        if d.position() != input.len() {
            return Err(COSEError::Format);
        }

        Ok(DecodedSign {
            payload,
            body,
            params: storage.into_params(),
            signature,
            statuses,
            n_signatures,
            verified,
        })
    }
}
