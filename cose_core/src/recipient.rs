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
 * cose_core Recipient objects
 *
 * Variant-dispatched handlers for a single COSE_Recipient element: direct key use, AES Key
 * Wrap, ECDH-ES + HKDF + AES-KW (with COSE_KDF_Context construction per RFC 9053 §5.2), and
 * HPKE Base mode. Encode-side objects wrap the content-encryption key; decode-side objects
 * recover it, reporting unwrap integrity failures as DataAuthFailed.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::buffer::OutputBuffer;
use crate::constants::*;
use crate::crypto::{
    curve_coord_len, hash_len, hkdf_hash_for_esdh, hpke_enc_len, kw_alg_for_esdh, kw_key_bits,
    CryptoAdapter, HpkeSuite, YCoordinate,
};
use crate::error::{COSEError, Result};
use crate::params::{
    decode_headers, encode_protected, Headers, Label, Param, ParamStorage, ParamValue,
    SpecialParams,
};

/// Kind tag of the direct-key recipient flavor.
pub const KIND_DIRECT: u8 = b'D';
/// Kind tag of the AES Key Wrap recipient flavor.
pub const KIND_AES_KW: u8 = b'K';
/// Kind tag of the ECDH-ES recipient flavor.
pub const KIND_ESDH: u8 = b'E';
/// Kind tag of the HPKE recipient flavor.
pub const KIND_HPKE: u8 = b'H';

/// The largest CEK the recipient layer handles (A256GCM or HMAC-512 keys).
pub(crate) const MAX_CEK: usize = 64;

/// Default size of the internal COSE_KDF_Context buffer. Callers with long party identities
/// attach a larger buffer to the recipient object.
const DEFAULT_KDF_CONTEXT: usize = 256;

// Large enough for a wrapped CEK or any supported encapsulated key.
const ZERO_FILL: [u8; 144] = [0u8; 144];

/// One party's contribution to the COSE_KDF_Context (RFC 9053 §5.2). Absent members encode as
/// CBOR `nil` and must match byte-for-byte on both sides of the exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartyInfo<'a> {
    /// PartyU/V identity.
    pub identity: Option<&'a [u8]>,
    /// PartyU/V nonce.
    pub nonce: Option<&'a [u8]>,
    /// PartyU/V other provided information.
    pub other: Option<&'a [u8]>,
}

/// How the HKDF salt is chosen on encode.
#[derive(Debug, Clone, Copy)]
pub enum SaltMode<'a> {
    /// No salt.
    None,
    /// A caller-fixed salt.
    Fixed(&'a [u8]),
    /// A freshly random salt of the hash output size, carried in the unprotected bucket.
    Random,
}

/***************************************************************************************************
 * COSE_KDF_Context
 **************************************************************************************************/

fn encode_party(e: &mut Encoder<&mut OutputBuffer<'_>>, party: &PartyInfo<'_>) -> Result<()> {
    e.array(3)?;
    match party.identity {
        Some(b) => {
            e.bytes(b)?;
        }
        None => {
            e.null()?;
        }
    }
    match party.nonce {
        Some(b) => {
            e.bytes(b)?;
        }
        None => {
            e.null()?;
        }
    }
    match party.other {
        Some(b) => {
            e.bytes(b)?;
        }
        None => {
            e.null()?;
        }
    }
    Ok(())
}

/// Serialize a COSE_KDF_Context into `out`, returning its length. The serialization must be
/// byte-identical on sender and recipient or the derived KEK will not match.
#[allow(clippy::too_many_arguments)]
pub(crate) fn encode_kdf_context(
    out: &mut [u8],
    algorithm_id: i64,
    party_u: &PartyInfo<'_>,
    party_v: &PartyInfo<'_>,
    key_bits: u32,
    protected: &[u8],
    supp_pub_other: Option<&[u8]>,
    supp_priv: Option<&[u8]>,
) -> Result<usize> {
    let mut ob = OutputBuffer::new(out);
    let mut e = Encoder::new(&mut ob);
    e.array(4 + u64::from(supp_priv.is_some()))?;
    e.i64(algorithm_id)?;
    encode_party(&mut e, party_u)?;
    encode_party(&mut e, party_v)?;
    e.array(if supp_pub_other.is_some() { 3 } else { 2 })?;
    e.u64(u64::from(key_bits))?;
    e.bytes(protected)?;
    if let Some(other) = supp_pub_other {
        e.bytes(other)?;
    }
    if let Some(sp) = supp_priv {
        e.bytes(sp)?;
    }
    drop(e);
    Ok(ob.len())
}

/***************************************************************************************************
 * Encode-side recipient objects
 **************************************************************************************************/

/// Direct use of a caller-provided CEK. Emits a degenerate element with a zero-length
/// ciphertext.
#[derive(Debug)]
pub struct DirectRecipient<'a> {
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
}

/// AES Key Wrap under a pre-shared KEK.
pub struct AesKwRecipient<'a, C: CryptoAdapter> {
    /// A128KW, A192KW or A256KW.
    pub alg: i64,
    /// The key-encryption key; its size must match `alg`.
    pub kek: C::Key,
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
}

/// ECDH-ES + HKDF-SHA-256 + AES Key Wrap toward a recipient public key.
pub struct EsdhRecipient<'a, C: CryptoAdapter> {
    /// ECDH-ES+A128KW, +A192KW or +A256KW.
    pub alg: i64,
    /// The recipient key's curve.
    pub curve: i64,
    /// The recipient's public key.
    pub public_key: C::Key,
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
    /// PartyUInfo of the KDF context; the identity also travels in the unprotected bucket.
    pub party_u: PartyInfo<'a>,
    /// PartyVInfo of the KDF context; the identity also travels in the unprotected bucket.
    pub party_v: PartyInfo<'a>,
    /// SuppPubInfo "other" member.
    pub supp_pub_other: Option<&'a [u8]>,
    /// SuppPrivInfo member; never transmitted.
    pub supp_priv: Option<&'a [u8]>,
    /// HKDF salt selection.
    pub salt: SaltMode<'a>,
    /// Scratch for the serialized KDF context; attach a larger buffer for long party info.
    pub context_buffer: Option<&'a mut [u8]>,
}

/// HPKE Base mode toward a recipient public key (draft-ietf-cose-hpke).
pub struct HpkeRecipient<'a, C: CryptoAdapter> {
    /// The COSE HPKE algorithm identifier.
    pub alg: i64,
    /// The HPKE ciphersuite matching `alg`.
    pub suite: HpkeSuite,
    /// The recipient's KEM public key.
    pub public_key: C::Key,
    /// Key identifier emitted in the unprotected bucket, if any.
    pub kid: Option<&'a [u8]>,
}

/// An encode-side recipient object: contributes one COSE_Recipient element wrapping the CEK.
pub enum Recipient<'a, C: CryptoAdapter> {
    /// Direct key use.
    Direct(DirectRecipient<'a>),
    /// AES Key Wrap.
    AesKw(AesKwRecipient<'a, C>),
    /// ECDH-ES + HKDF + AES-KW.
    Esdh(EsdhRecipient<'a, C>),
    /// HPKE Base mode.
    Hpke(HpkeRecipient<'a, C>),
}

impl<'a, C: CryptoAdapter> Recipient<'a, C> {
    /// The stable kind-tag byte of this variant.
    pub fn kind(&self) -> u8 {
        match self {
            Recipient::Direct(_) => KIND_DIRECT,
            Recipient::AesKw(_) => KIND_AES_KW,
            Recipient::Esdh(_) => KIND_ESDH,
            Recipient::Hpke(_) => KIND_HPKE,
        }
    }

    /// Emit this recipient's COSE_Recipient element, wrapping `cek`. On a sizing buffer the
    /// cryptography is skipped and placeholder bytes of the right lengths are counted.
    pub(crate) fn encode(
        &mut self,
        adapter: &C,
        e: &mut Encoder<&mut OutputBuffer<'_>>,
        cek: &[u8],
    ) -> Result<()> {
        let sizing = e.writer().is_sizing();
        e.array(3)?;
        match self {
            Recipient::Direct(r) => {
                let core = [Param::int(HDR_ALG, ALG_DIRECT).in_protected()];
                encode_protected(e, &core, &[])?;
                emit_unprotected_kid_only(e, r.kid)?;
                e.bytes(&[])?;
                Ok(())
            }
            Recipient::AesKw(r) => {
                kw_key_bits(r.alg)?;
                let core = [Param::int(HDR_ALG, r.alg).in_protected()];
                encode_protected(e, &core, &[])?;
                emit_unprotected_kid_only(e, r.kid)?;
                let wrapped = cek.len() + 8;
                if sizing {
                    e.bytes(&ZERO_FILL[..wrapped])?;
                } else {
                    let ph = e.writer_mut().open_bytes(wrapped)?;
                    let region = e.writer_mut().bytes_mut(&ph)?;
                    let n = adapter.kw_wrap(r.alg, &r.kek, cek, region)?;
                    e.writer_mut().close_bytes(ph, n)?;
                }
                Ok(())
            }
            Recipient::Esdh(r) => encode_esdh(adapter, e, r, cek, sizing),
            Recipient::Hpke(r) => encode_hpke(adapter, e, r, cek, sizing),
        }
    }
}

fn emit_unprotected_kid_only(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    kid: Option<&[u8]>,
) -> Result<()> {
    match kid {
        Some(k) => {
            e.map(1)?;
            e.i64(HDR_KID)?;
            e.bytes(k)?;
        }
        None => {
            e.map(0)?;
        }
    }
    Ok(())
}

fn encode_esdh<C: CryptoAdapter>(
    adapter: &C,
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    r: &mut EsdhRecipient<'_, C>,
    cek: &[u8],
    sizing: bool,
) -> Result<()> {
    let kw_alg = kw_alg_for_esdh(r.alg)?;
    let kek_bits = kw_key_bits(kw_alg)?;
    let hkdf_alg = hkdf_hash_for_esdh(r.alg)?;
    let coord_len = curve_coord_len(r.curve)?;

    // Ephemeral key pair and shared secret. In sizing mode neither exists; the coordinate
    // lengths are all that matter.
    let mut x = [0u8; 66];
    let mut y = [0u8; 66];
    let mut secret = [0u8; 66];
    let mut secret_len = 0;
    let ephemeral = if sizing {
        None
    } else {
        let ephemeral = adapter.generate_ec_key(r.curve)?;
        let (curve, n) = adapter.export_ec2_public_key(&ephemeral, &mut x, &mut y)?;
        if curve != r.curve || n != coord_len {
            return Err(COSEError::WrongCurve);
        }
        secret_len = adapter.ecdh(&ephemeral, &r.public_key, &mut secret)?;
        Some(ephemeral)
    };

    // Salt selection happens before the headers are emitted, since a random salt travels in
    // the unprotected bucket.
    let mut salt_buf = [0u8; 64];
    let salt: Option<&[u8]> = match r.salt {
        SaltMode::None => None,
        SaltMode::Fixed(s) => Some(s),
        SaltMode::Random => {
            let n = hash_len(hkdf_alg)?;
            if !sizing {
                adapter.get_random(&mut salt_buf[..n])?;
            }
            Some(&salt_buf[..n])
        }
    };

    let core = [Param::int(HDR_ALG, r.alg).in_protected()];
    let (ps, pe) = encode_protected(e, &core, &[])?;

    // Unprotected bucket: ephemeral key, then kid, party identities and salt as configured.
    let entries = 1
        + u64::from(r.kid.is_some())
        + u64::from(r.party_u.identity.is_some())
        + u64::from(r.party_v.identity.is_some())
        + u64::from(salt.is_some());
    e.map(entries)?;
    e.i64(HDR_EPHEMERAL_KEY)?;
    e.map(4)?;
    e.i64(KEY_KTY)?;
    e.i64(KTY_EC2)?;
    e.i64(KEY_CRV)?;
    e.i64(r.curve)?;
    e.i64(KEY_X)?;
    e.bytes(&x[..coord_len])?;
    e.i64(KEY_Y)?;
    e.bytes(&y[..coord_len])?;
    if let Some(kid) = r.kid {
        e.i64(HDR_KID)?;
        e.bytes(kid)?;
    }
    if let Some(id) = r.party_u.identity {
        e.i64(HDR_PARTY_U_IDENTITY)?;
        e.bytes(id)?;
    }
    if let Some(id) = r.party_v.identity {
        e.i64(HDR_PARTY_V_IDENTITY)?;
        e.bytes(id)?;
    }
    if let Some(s) = salt {
        e.i64(HDR_SALT)?;
        e.bytes(s)?;
    }

    // Wrapped CEK.
    let wrapped = cek.len() + 8;
    if sizing {
        e.bytes(&ZERO_FILL[..wrapped])?;
        return Ok(());
    }

    // Derive the KEK: HKDF over the shared secret with the serialized KDF context as info.
    // The context embeds this recipient's protected bytes exactly as emitted.
    let mut default_ctx = [0u8; DEFAULT_KDF_CONTEXT];
    let ctx_buf: &mut [u8] = match r.context_buffer.as_deref_mut() {
        Some(b) => b,
        None => &mut default_ctx,
    };
    let ctx_len = {
        let protected = e.writer().written(ps, pe)?;
        encode_kdf_context(
            ctx_buf,
            kw_alg,
            &r.party_u,
            &r.party_v,
            kek_bits,
            protected,
            r.supp_pub_other,
            r.supp_priv,
        )?
    };
    let mut kek_bytes = [0u8; 32];
    let kek_len = (kek_bits / 8) as usize;
    adapter.hkdf(
        hkdf_alg,
        salt,
        &secret[..secret_len],
        &ctx_buf[..ctx_len],
        &mut kek_bytes[..kek_len],
    )?;
    let kek = adapter.make_symmetric_key(kw_alg, &kek_bytes[..kek_len])?;

    let ph = e.writer_mut().open_bytes(wrapped)?;
    let region = e.writer_mut().bytes_mut(&ph)?;
    let n = adapter.kw_wrap(kw_alg, &kek, cek, region)?;
    e.writer_mut().close_bytes(ph, n)?;
    drop(kek);
    drop(ephemeral);
    Ok(())
}

fn encode_hpke<C: CryptoAdapter>(
    adapter: &C,
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    r: &mut HpkeRecipient<'_, C>,
    cek: &[u8],
    sizing: bool,
) -> Result<()> {
    let enc_len = hpke_enc_len(r.suite)?;
    let ct_len = cek.len() + 16;

    let core = [Param::int(HDR_ALG, r.alg).in_protected()];
    let (ps, pe) = encode_protected(e, &core, &[])?;

    if sizing {
        e.map(1 + u64::from(r.kid.is_some()))?;
        e.i64(HDR_HPKE_SENDER_INFO)?;
        e.bytes(&ZERO_FILL[..enc_len])?;
        if let Some(kid) = r.kid {
            e.i64(HDR_KID)?;
            e.bytes(kid)?;
        }
        e.bytes(&ZERO_FILL[..ct_len])?;
        return Ok(());
    }

    let mut enc = [0u8; 133];
    let mut ct = [0u8; MAX_CEK + 16];
    let (en, cn) = {
        let protected = e.writer().written(ps, pe)?;
        adapter.hpke_seal(
            r.suite,
            &r.public_key,
            protected,
            None,
            cek,
            &mut enc,
            &mut ct,
        )?
    };

    e.map(1 + u64::from(r.kid.is_some()))?;
    e.i64(HDR_HPKE_SENDER_INFO)?;
    e.bytes(&enc[..en])?;
    if let Some(kid) = r.kid {
        e.i64(HDR_KID)?;
        e.bytes(kid)?;
    }
    e.bytes(&ct[..cn])?;
    Ok(())
}

/***************************************************************************************************
 * Decode-side recipient objects
 **************************************************************************************************/

/// Decode-side counterpart of [`DirectRecipient`]: the CEK is the caller's key.
pub struct DirectRecipientDecoder<'a, C: CryptoAdapter> {
    /// The content-encryption key agreed out of band.
    pub cek: &'a C::Key,
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
}

/// Decode-side counterpart of [`AesKwRecipient`].
pub struct AesKwRecipientDecoder<'a, C: CryptoAdapter> {
    /// A128KW, A192KW or A256KW.
    pub alg: i64,
    /// The key-encryption key.
    pub kek: C::Key,
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
}

/// Decode-side counterpart of [`EsdhRecipient`]. The party info, SuppPubInfo "other" and
/// SuppPrivInfo come from this configuration; the salt and the ephemeral public key come from
/// the received unprotected bucket. Any divergence from the sender's inputs makes the KDF
/// context differ and the unwrap fail with `DataAuthFailed`.
pub struct EsdhRecipientDecoder<'a, C: CryptoAdapter> {
    /// ECDH-ES+A128KW, +A192KW or +A256KW.
    pub alg: i64,
    /// The expected curve of the ephemeral key.
    pub curve: i64,
    /// The recipient's private key.
    pub private_key: C::Key,
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
    /// PartyUInfo of the KDF context.
    pub party_u: PartyInfo<'a>,
    /// PartyVInfo of the KDF context.
    pub party_v: PartyInfo<'a>,
    /// SuppPubInfo "other" member.
    pub supp_pub_other: Option<&'a [u8]>,
    /// SuppPrivInfo member.
    pub supp_priv: Option<&'a [u8]>,
    /// Fallback salt when the element carries none.
    pub salt: SaltMode<'a>,
    /// Scratch for the serialized KDF context.
    pub context_buffer: Option<&'a mut [u8]>,
}

/// Decode-side counterpart of [`HpkeRecipient`].
pub struct HpkeRecipientDecoder<'a, C: CryptoAdapter> {
    /// The COSE HPKE algorithm identifier.
    pub alg: i64,
    /// The HPKE ciphersuite matching `alg`.
    pub suite: HpkeSuite,
    /// The recipient's KEM private key.
    pub private_key: C::Key,
    /// When set, only elements whose kid matches byte-for-byte are accepted.
    pub kid: Option<&'a [u8]>,
}

/// A decode-side recipient object: recovers the CEK from one COSE_Recipient element.
pub enum RecipientDecoder<'a, C: CryptoAdapter> {
    /// Direct key use.
    Direct(DirectRecipientDecoder<'a, C>),
    /// AES Key Wrap.
    AesKw(AesKwRecipientDecoder<'a, C>),
    /// ECDH-ES + HKDF + AES-KW.
    Esdh(EsdhRecipientDecoder<'a, C>),
    /// HPKE Base mode.
    Hpke(HpkeRecipientDecoder<'a, C>),
}

/// An ephemeral public key received as a COSE_Key map.
#[derive(Debug, Clone, Copy)]
struct EphemeralKey<'buf> {
    kty: i64,
    crv: i64,
    x: &'buf [u8],
    y: Option<YCoordinate<'buf>>,
}

/// The recipient-layer parameters claimed ahead of the generic header decode.
#[derive(Debug, Default)]
struct CapturedRecipientParams<'buf> {
    ephemeral: Option<EphemeralKey<'buf>>,
    salt: Option<&'buf [u8]>,
    hpke_enc: Option<&'buf [u8]>,
}

fn decode_cose_key<'buf>(d: &mut Decoder<'buf>) -> Result<EphemeralKey<'buf>> {
    let n = d.map()?.ok_or(COSEError::Format)?;
    let mut kty = None;
    let mut crv = None;
    let mut x = None;
    let mut y = None;
    for _ in 0..n {
        let label = d.i64()?;
        match label {
            KEY_KTY => kty = Some(d.i64()?),
            KEY_CRV => crv = Some(d.i64()?),
            KEY_X => x = Some(d.bytes()?),
            KEY_Y => match d.datatype()? {
                Type::Bytes => y = Some(YCoordinate::Full(d.bytes()?)),
                Type::Bool => y = Some(YCoordinate::Sign(d.bool()?)),
                _ => return Err(COSEError::WrongParameterType),
            },
            _ => d.skip()?,
        }
    }
    Ok(EphemeralKey {
        kty: kty.ok_or(COSEError::Format)?,
        crv: crv.ok_or(COSEError::Format)?,
        x: x.ok_or(COSEError::Format)?,
        y,
    })
}

impl<'buf> SpecialParams<'buf> for CapturedRecipientParams<'buf> {
    fn claim(
        &mut self,
        label: Label<'buf>,
        _protected: bool,
        d: &mut Decoder<'buf>,
    ) -> Result<Option<ParamValue<'buf>>> {
        match label {
            Label::Int(HDR_EPHEMERAL_KEY) => {
                let start = d.position();
                let key = decode_cose_key(d)?;
                let end = d.position();
                self.ephemeral = Some(key);
                let raw = d
                    .input()
                    .get(start..end)
                    .ok_or(COSEError::Format)?;
                Ok(Some(ParamValue::Bytes(raw)))
            }
            Label::Int(HDR_SALT) => {
                if d.datatype()? != Type::Bytes {
                    return Err(COSEError::WrongParameterType);
                }
                let s = d.bytes()?;
                self.salt = Some(s);
                Ok(Some(ParamValue::Bytes(s)))
            }
            Label::Int(HDR_HPKE_SENDER_INFO) => {
                // Canonical form is a plain byte string; the older array form is accepted and
                // its last byte-string member taken as the encapsulated key.
                match d.datatype()? {
                    Type::Bytes => {
                        let enc = d.bytes()?;
                        self.hpke_enc = Some(enc);
                        Ok(Some(ParamValue::Bytes(enc)))
                    }
                    Type::Array => {
                        let n = d.array()?.ok_or(COSEError::Format)?;
                        let mut enc = None;
                        for _ in 0..n {
                            if d.datatype()? == Type::Bytes {
                                enc = Some(d.bytes()?);
                            } else {
                                d.skip()?;
                            }
                        }
                        let enc = enc.ok_or(COSEError::Format)?;
                        self.hpke_enc = Some(enc);
                        Ok(Some(ParamValue::Bytes(enc)))
                    }
                    _ => Err(COSEError::WrongParameterType),
                }
            }
            _ => Ok(None),
        }
    }
}

/// Walk one COSE_Recipient element without recovering a key: headers plus ciphertext. Used by
/// decode-only processing.
pub(crate) fn decode_recipient_element<'buf>(
    d: &mut Decoder<'buf>,
    storage: &mut ParamStorage<'_, 'buf>,
    options: u32,
) -> Result<(Headers<'buf>, &'buf [u8])> {
    let n = d.array()?.ok_or(COSEError::Format)?;
    if n != 3 {
        return Err(COSEError::BadArrayLength);
    }
    let mut capture = CapturedRecipientParams::default();
    let headers = decode_headers(d, storage, Some(&mut capture), options)?;
    if d.datatype()? != Type::Bytes {
        return Err(COSEError::WrongType);
    }
    let ct = d.bytes()?;
    Ok((headers, ct))
}

fn check_kid(want: Option<&[u8]>, headers: &Headers<'_>) -> Result<()> {
    if let Some(want) = want {
        if headers.kid != Some(want) {
            return Err(COSEError::KidUnmatched);
        }
    }
    Ok(())
}

impl<'a, C: CryptoAdapter> RecipientDecoder<'a, C> {
    /// The stable kind-tag byte of this variant.
    pub fn kind(&self) -> u8 {
        match self {
            RecipientDecoder::Direct(_) => KIND_DIRECT,
            RecipientDecoder::AesKw(_) => KIND_AES_KW,
            RecipientDecoder::Esdh(_) => KIND_ESDH,
            RecipientDecoder::Hpke(_) => KIND_HPKE,
        }
    }

    /// Decode one COSE_Recipient element and recover the CEK into `cek_out`, returning its
    /// length and the element's headers. Algorithm and kid mismatches are soft errors so the
    /// dispatch loop can try the next handler.
    pub(crate) fn decode<'buf>(
        &mut self,
        adapter: &C,
        d: &mut Decoder<'buf>,
        storage: &mut ParamStorage<'_, 'buf>,
        options: u32,
        cek_out: &mut [u8],
    ) -> Result<(usize, Headers<'buf>)> {
        let n = d.array()?.ok_or(COSEError::Format)?;
        if n != 3 {
            return Err(COSEError::BadArrayLength);
        }
        let mut capture = CapturedRecipientParams::default();
        let headers = decode_headers(d, storage, Some(&mut capture), options)?;
        if d.datatype()? != Type::Bytes {
            return Err(COSEError::WrongType);
        }
        let ct = d.bytes()?;
        let alg = headers.alg.ok_or(COSEError::NoAlgParameter)?;

        let len = match self {
            RecipientDecoder::Direct(r) => {
                if alg != ALG_DIRECT {
                    return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
                }
                check_kid(r.kid, &headers)?;
                if !ct.is_empty() {
                    return Err(COSEError::Format);
                }
                adapter.export_symmetric_key(r.cek, cek_out)?
            }
            RecipientDecoder::AesKw(r) => {
                if alg != r.alg || kw_key_bits(alg).is_err() {
                    return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
                }
                check_kid(r.kid, &headers)?;
                if ct.len() < 16 {
                    return Err(COSEError::DataAuthFailed);
                }
                if ct.len() - 8 > cek_out.len() {
                    return Err(COSEError::BufferTooSmall);
                }
                adapter.kw_unwrap(alg, &r.kek, ct, cek_out)?
            }
            RecipientDecoder::Esdh(r) => {
                if alg != r.alg || kw_alg_for_esdh(alg).is_err() {
                    return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
                }
                check_kid(r.kid, &headers)?;
                let kw_alg = kw_alg_for_esdh(alg)?;
                let kek_bits = kw_key_bits(kw_alg)?;
                let hkdf_alg = hkdf_hash_for_esdh(alg)?;

                let ek = capture.ephemeral.ok_or(COSEError::Format)?;
                if ek.kty != KTY_EC2 {
                    return Err(COSEError::WrongKeyType);
                }
                if ek.crv != r.curve {
                    return Err(COSEError::WrongCurve);
                }
                let y = ek.y.ok_or(COSEError::Format)?;
                let ephemeral = adapter.import_ec2_public_key(ek.crv, ek.x, y)?;

                let mut secret = [0u8; 66];
                let secret_len = adapter.ecdh(&r.private_key, &ephemeral, &mut secret)?;

                let salt: Option<&[u8]> = match capture.salt {
                    Some(s) => Some(s),
                    None => match r.salt {
                        SaltMode::Fixed(s) => Some(s),
                        _ => None,
                    },
                };

                let mut default_ctx = [0u8; DEFAULT_KDF_CONTEXT];
                let ctx_buf: &mut [u8] = match r.context_buffer.as_deref_mut() {
                    Some(b) => b,
                    None => &mut default_ctx,
                };
                let ctx_len = encode_kdf_context(
                    ctx_buf,
                    kw_alg,
                    &r.party_u,
                    &r.party_v,
                    kek_bits,
                    headers.protected_raw,
                    r.supp_pub_other,
                    r.supp_priv,
                )?;

                let mut kek_bytes = [0u8; 32];
                let kek_len = (kek_bits / 8) as usize;
                adapter.hkdf(
                    hkdf_alg,
                    salt,
                    &secret[..secret_len],
                    &ctx_buf[..ctx_len],
                    &mut kek_bytes[..kek_len],
                )?;
                let kek = adapter.make_symmetric_key(kw_alg, &kek_bytes[..kek_len])?;

                if ct.len() < 16 {
                    return Err(COSEError::DataAuthFailed);
                }
                if ct.len() - 8 > cek_out.len() {
                    return Err(COSEError::BufferTooSmall);
                }
                adapter.kw_unwrap(kw_alg, &kek, ct, cek_out)?
            }
            RecipientDecoder::Hpke(r) => {
                if alg != r.alg {
                    return Err(COSEError::UnsupportedKeyExchangeAlgorithm);
                }
                check_kid(r.kid, &headers)?;
                // Canonical sender-info form, with the older ephemeral COSE_Key form (an OKP
                // key whose x is the encapsulated key) accepted on input.
                let enc = match capture.hpke_enc {
                    Some(enc) => enc,
                    None => match capture.ephemeral {
                        Some(ek) if ek.kty == KTY_OKP => ek.x,
                        _ => return Err(COSEError::Format),
                    },
                };
                if ct.len() < 16 {
                    return Err(COSEError::DataAuthFailed);
                }
                if ct.len() - 16 > cek_out.len() {
                    return Err(COSEError::BufferTooSmall);
                }
                adapter.hpke_open(
                    r.suite,
                    &r.private_key,
                    enc,
                    headers.protected_raw,
                    None,
                    ct,
                    cek_out,
                )?
            }
        };
        Ok((len, headers))
    }
}
