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
 * cose_core Structure composer
 *
 * Builds the Sig_structure, Enc_structure and MAC_structure byte strings of RFC 9052 §4.4,
 * §5.3 and §6.3: the exact bytes fed to the signature, AEAD and MAC primitives. Protected
 * header bytes are taken pre-serialized and are never re-encoded, since CBOR maps admit more
 * than one valid serialization. The composer streams its output into a sink so that
 * hash-then-sign algorithms and HMACs consume the structure incrementally; EdDSA, which signs
 * the whole structure, uses the materializing form instead.
 **************************************************************************************************/
use crate::buffer::{cbor_head, MT_ARRAY, MT_BSTR, MT_TSTR};
use crate::crypto::CryptoAdapter;
use crate::error::{COSEError, Result};

/// Sig_structure context string for COSE_Sign.
pub const CTX_SIGNATURE: &str = "Signature";
/// Sig_structure context string for COSE_Sign1.
pub const CTX_SIGNATURE1: &str = "Signature1";
/// Enc_structure context string for COSE_Encrypt.
pub const CTX_ENCRYPT: &str = "Encrypt";
/// Enc_structure context string for COSE_Encrypt0.
pub const CTX_ENCRYPT0: &str = "Encrypt0";
/// Enc_structure context string for a COSE_Recipient layer.
pub const CTX_ENC_RECIPIENT: &str = "Enc_Recipient";
/// MAC_structure context string for COSE_Mac.
pub const CTX_MAC: &str = "MAC";
/// MAC_structure context string for COSE_Mac0.
pub const CTX_MAC0: &str = "MAC0";

fn sink_bstr<F>(sink: &mut F, data: &[u8]) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let (head, n) = cbor_head(MT_BSTR, data.len() as u64);
    sink(&head[..n])?;
    sink(data)
}

/// Stream one of the three structures into `sink` in encoded order: array head, context
/// string, the protected byte string(s), the external AAD (empty byte string when absent) and,
/// for Sig_structure and MAC_structure, the payload.
fn feed<F>(
    sink: &mut F,
    context: &str,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let items = 3 + usize::from(sign_protected.is_some()) + usize::from(payload.is_some());
    let (head, n) = cbor_head(MT_ARRAY, items as u64);
    sink(&head[..n])?;

    let (head, n) = cbor_head(MT_TSTR, context.len() as u64);
    sink(&head[..n])?;
    sink(context.as_bytes())?;

    sink_bstr(sink, body_protected)?;
    if let Some(sp) = sign_protected {
        sink_bstr(sink, sp)?;
    }
    sink_bstr(sink, external_aad.unwrap_or(&[]))?;
    if let Some(p) = payload {
        sink_bstr(sink, p)?;
    }
    Ok(())
}

/// Materialize a Sig_structure into `out`, returning the encoded length. This is the form
/// EdDSA signs directly; detached payloads are passed here unchanged.
pub fn encode_sig_structure(
    out: &mut [u8],
    context: &str,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: Option<&[u8]>,
    payload: &[u8],
) -> Result<usize> {
    let mut pos = 0usize;
    feed(
        &mut |b: &[u8]| {
            if pos + b.len() > out.len() {
                return Err(COSEError::BufferTooSmall);
            }
            out[pos..pos + b.len()].copy_from_slice(b);
            pos += b.len();
            Ok(())
        },
        context,
        body_protected,
        sign_protected,
        external_aad,
        Some(payload),
    )?;
    Ok(pos)
}

/// Materialize an Enc_structure into `out`, returning the encoded length. The result is the
/// AAD handed to the content AEAD.
pub fn encode_enc_structure(
    out: &mut [u8],
    context: &str,
    protected: &[u8],
    external_aad: Option<&[u8]>,
) -> Result<usize> {
    let mut pos = 0usize;
    feed(
        &mut |b: &[u8]| {
            if pos + b.len() > out.len() {
                return Err(COSEError::BufferTooSmall);
            }
            out[pos..pos + b.len()].copy_from_slice(b);
            pos += b.len();
            Ok(())
        },
        context,
        protected,
        None,
        external_aad,
        None,
    )?;
    Ok(pos)
}

/// Hash a Sig_structure incrementally, writing the digest to `out` and returning its length.
pub(crate) fn hash_sig_structure<C: CryptoAdapter>(
    adapter: &C,
    hash_alg: i64,
    context: &str,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: Option<&[u8]>,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    let mut ctx = adapter.hash_start(hash_alg)?;
    feed(
        &mut |b: &[u8]| {
            adapter.hash_update(&mut ctx, b);
            Ok(())
        },
        context,
        body_protected,
        sign_protected,
        external_aad,
        Some(payload),
    )?;
    adapter.hash_finish(ctx, out)
}

/// Feed a MAC_structure into a MAC in progress.
pub(crate) fn mac_structure_feed<C: CryptoAdapter>(
    adapter: &C,
    mac: &mut C::MacCtx,
    context: &str,
    protected: &[u8],
    external_aad: Option<&[u8]>,
    payload: &[u8],
) -> Result<()> {
    feed(
        &mut |b: &[u8]| {
            adapter.hmac_update(mac, b);
            Ok(())
        },
        context,
        protected,
        None,
        external_aad,
        Some(payload),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign1_structure_bytes() {
        // ["Signature1", << {1: -7} >>, h'', 'hello']
        let mut out = [0u8; 64];
        let n = encode_sig_structure(
            &mut out,
            CTX_SIGNATURE1,
            &[0xa1, 0x01, 0x26],
            None,
            None,
            b"hello",
        )
        .unwrap();
        assert_eq!(
            &out[..n],
            &[
                0x84, 0x6a, 0x53, 0x69, 0x67, 0x6e, 0x61, 0x74, 0x75, 0x72, 0x65, 0x31, 0x43,
                0xa1, 0x01, 0x26, 0x40, 0x45, 0x68, 0x65, 0x6c, 0x6c, 0x6f
            ]
        );
    }

    #[test]
    fn sign_structure_has_five_items() {
        let mut out = [0u8; 64];
        let n = encode_sig_structure(
            &mut out,
            CTX_SIGNATURE,
            &[0xa0],
            Some(&[0xa1, 0x01, 0x26]),
            None,
            b"x",
        )
        .unwrap();
        assert_eq!(out[0], 0x85);
        assert!(n > 0);
    }

    #[test]
    fn enc_structure_bytes() {
        // ["Encrypt0", << {1: 1} >>, h'']
        let mut out = [0u8; 64];
        let n = encode_enc_structure(&mut out, CTX_ENCRYPT0, &[0xa1, 0x01, 0x01], None).unwrap();
        assert_eq!(
            &out[..n],
            &[
                0x83, 0x68, 0x45, 0x6e, 0x63, 0x72, 0x79, 0x70, 0x74, 0x30, 0x43, 0xa1, 0x01,
                0x01, 0x40
            ]
        );
    }

    #[test]
    fn external_aad_is_passed_through() {
        let mut with_aad = [0u8; 64];
        let n1 =
            encode_enc_structure(&mut with_aad, CTX_ENCRYPT0, &[0xa0], Some(&[0x01; 4])).unwrap();
        let mut without = [0u8; 64];
        let n2 = encode_enc_structure(&mut without, CTX_ENCRYPT0, &[0xa0], None).unwrap();
        assert_ne!(&with_aad[..n1], &without[..n2]);
    }

    #[test]
    fn too_small_buffer_fails() {
        let mut out = [0u8; 4];
        assert_eq!(
            encode_sig_structure(&mut out, CTX_SIGNATURE1, &[0xa0], None, None, b"hello")
                .unwrap_err(),
            COSEError::BufferTooSmall
        );
    }
}
