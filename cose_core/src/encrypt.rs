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
 * cose_core Encrypt engine
 *
 * Encode and decode of COSE_Encrypt0 and COSE_Encrypt. The encoder generates the content
 * nonce, for COSE_Encrypt also the random CEK, AEAD-encrypts directly into the output byte
 * string over the Enc_structure AAD, and drives the attached recipient objects; the decoder
 * recovers the CEK through the configured recipient decoders with soft-error rewind semantics
 * and then decrypts into the caller's buffer.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::buffer::OutputBuffer;
use crate::constants::{HDR_ALG, HDR_IV};
use crate::crypto::{
    aead_key_bits, aead_nonce_len, aead_tag_len, is_aead_alg, CryptoAdapter,
};
use crate::error::{COSEError, Result};
use crate::options::{
    consume_tag, emit_tag, MessageType, OPT_DECODE_ONLY, OPT_ENABLE_NON_AEAD,
};
use crate::params::{decode_headers, encode_headers, Headers, Param, ParamStorage};
use crate::recipient::{decode_recipient_element, Recipient, RecipientDecoder, MAX_CEK};
use crate::structure::{encode_enc_structure, CTX_ENCRYPT, CTX_ENCRYPT0};

/// Default size of the internal Enc_structure buffer. Callers with long external AAD or many
/// protected parameters attach a larger one.
const DEFAULT_ENC_STRUCT: usize = 256;

/// The result of an encrypt encode: the message length and the ciphertext length (the latter
/// matters when the ciphertext is detached).
#[derive(Debug, Clone, Copy)]
pub struct EncryptedLengths {
    /// Bytes written (or counted) for the COSE message itself.
    pub message: usize,
    /// Bytes of ciphertext plus tag.
    pub ciphertext: usize,
}

/// Encoder for COSE_Encrypt0 and COSE_Encrypt.
#[derive(Debug)]
pub struct EncryptEncoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    payload_alg: i64,
    external_aad: Option<&'a [u8]>,
    enc_struct_buf: Option<&'a mut [u8]>,
}

impl<'a, C: CryptoAdapter> EncryptEncoder<'a, C> {
    /// An encoder producing COSE_Encrypt0 under content algorithm `alg`.
    pub fn encrypt0(adapter: &'a C, alg: i64, options: u32) -> Self {
        EncryptEncoder {
            adapter,
            options,
            message_type: MessageType::Encrypt0,
            payload_alg: alg,
            external_aad: None,
            enc_struct_buf: None,
        }
    }

    /// An encoder producing COSE_Encrypt under content algorithm `alg`.
    pub fn encrypt(adapter: &'a C, alg: i64, options: u32) -> Self {
        EncryptEncoder {
            adapter,
            options,
            message_type: MessageType::Encrypt,
            payload_alg: alg,
            external_aad: None,
            enc_struct_buf: None,
        }
    }

    /// Bind externally supplied AAD into the Enc_structure.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Attach a larger Enc_structure scratch buffer.
    pub fn with_enc_structure_buffer(mut self, buf: &'a mut [u8]) -> Self {
        self.enc_struct_buf = Some(buf);
        self
    }

    /// Encrypt `plaintext` into a COSE message, returning the encoded lengths.
    ///
    /// For COSE_Encrypt0 the caller supplies the CEK handle in `cek`; for COSE_Encrypt the
    /// engine generates a random CEK, wraps it toward every attached recipient and releases
    /// the handle before returning. Passing `detached_ciphertext` places CBOR `null` in the
    /// ciphertext slot and writes ciphertext-plus-tag to the detached buffer instead. On a
    /// sizing buffer no cryptography runs and only lengths are produced.
    pub fn encode(
        &mut self,
        plaintext: &[u8],
        cek: Option<&C::Key>,
        params: &[Param<'_>],
        recipients: &mut [Recipient<'a, C>],
        mut detached_ciphertext: Option<&mut [u8]>,
        out: &mut OutputBuffer<'_>,
    ) -> Result<EncryptedLengths> {
        let adapter = self.adapter;
        let options = self.options;
        let alg = self.payload_alg;
        let external_aad = self.external_aad;
        let sizing = out.is_sizing();
        let aead = is_aead_alg(alg);

        if !aead {
            if options & OPT_ENABLE_NON_AEAD == 0 {
                return Err(COSEError::UnsupportedEncryptionAlgorithm);
            }
            // Without an AEAD there is no integrity over the protected bucket, so it must be
            // empty.
            if params.iter().any(|p| p.protected) {
                return Err(COSEError::ParameterInWrongBucket);
            }
        }
        let bits = aead_key_bits(alg)?;
        let nonce_len = aead_nonce_len(alg)?;
        let tag_len = aead_tag_len(alg)?;
        let cek_len = (bits / 8) as usize;

        let mut iv = [0u8; 16];
        if !sizing {
            adapter.get_random(&mut iv[..nonce_len])?;
        }

        // Content key: caller-supplied for COSE_Encrypt0, freshly generated for COSE_Encrypt.
        // The generated handle is dropped on every exit path.
        let mut cek_bytes = [0u8; MAX_CEK];
        let mut generated: Option<C::Key> = None;
        let content_key: Option<&C::Key> = match self.message_type {
            MessageType::Encrypt0 => match cek {
                Some(key) => Some(key),
                None if sizing => None,
                None => return Err(COSEError::EmptyKey),
            },
            _ => {
                if !sizing {
                    adapter.get_random(&mut cek_bytes[..cek_len])?;
                    generated = Some(adapter.make_symmetric_key(alg, &cek_bytes[..cek_len])?);
                }
                generated.as_ref()
            }
        };

        let mut e = Encoder::new(&mut *out);
        emit_tag(&mut e, options, self.message_type)?;
        e.array(if self.message_type == MessageType::Encrypt0 {
            3
        } else {
            4
        })?;

        let core = [
            Param::int(HDR_ALG, alg).in_protected(),
            Param::bytes(HDR_IV, &iv[..nonce_len]),
        ];
        let (ps, pe) = encode_headers(&mut e, &core, params)?;

        let ct_len = plaintext.len() + tag_len;
        let context = if self.message_type == MessageType::Encrypt0 {
            CTX_ENCRYPT0
        } else {
            CTX_ENCRYPT
        };

        if sizing {
            match detached_ciphertext {
                Some(_) => {
                    e.null()?;
                }
                None => {
                    let ph = e.writer_mut().open_bytes(ct_len)?;
                    e.writer_mut().close_bytes(ph, ct_len)?;
                }
            }
        } else {
            let key = content_key.ok_or(COSEError::EmptyKey)?;
            let mut default_scratch = [0u8; DEFAULT_ENC_STRUCT];
            let scratch: &mut [u8] = match self.enc_struct_buf.as_deref_mut() {
                Some(b) => b,
                None => &mut default_scratch,
            };
            let aad_len = if aead {
                let protected = e.writer().written(ps, pe)?;
                encode_enc_structure(scratch, context, protected, external_aad)?
            } else {
                0
            };
            let aad = if aead { Some(&scratch[..aad_len]) } else { None };

            match detached_ciphertext.as_deref_mut() {
                Some(buf) => {
                    if buf.len() < ct_len {
                        return Err(COSEError::BufferTooSmall);
                    }
                    let n =
                        adapter.aead_encrypt(alg, key, &iv[..nonce_len], aad, plaintext, buf)?;
                    debug_assert_eq!(n, ct_len);
                    e.null()?;
                }
                None => {
                    let ph = e.writer_mut().open_bytes(ct_len)?;
                    let region = e.writer_mut().bytes_mut(&ph)?;
                    let n =
                        adapter.aead_encrypt(alg, key, &iv[..nonce_len], aad, plaintext, region)?;
                    e.writer_mut().close_bytes(ph, n)?;
                }
            }
        }

        if self.message_type == MessageType::Encrypt {
            if recipients.is_empty() {
                return Err(COSEError::Decline);
            }
            e.array(recipients.len() as u64)?;
            for recipient in recipients.iter_mut() {
                recipient.encode(adapter, &mut e, &cek_bytes[..cek_len])?;
            }
        }

        drop(e);
        drop(generated);
        Ok(EncryptedLengths {
            message: out.len(),
            ciphertext: ct_len,
        })
    }
}

/// The decoded view of a COSE_Encrypt0 or COSE_Encrypt message.
#[derive(Debug)]
pub struct DecodedEncrypt<'buf, 's, 'pt> {
    /// The recovered plaintext; `None` in decode-only mode.
    pub plaintext: Option<&'pt [u8]>,
    /// The decoded body headers.
    pub body: Headers<'buf>,
    /// Every parameter decoded from the message, body and recipient elements alike.
    pub params: &'s [Param<'buf>],
    /// The index of the recipient element whose decoder recovered the CEK, if any.
    pub recipient_used: Option<usize>,
}

/// Decoder for COSE_Encrypt0 and COSE_Encrypt.
pub struct EncryptDecoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    external_aad: Option<&'a [u8]>,
    enc_struct_buf: Option<&'a mut [u8]>,
    recipients: &'a mut [RecipientDecoder<'a, C>],
}

impl<'a, C: CryptoAdapter> EncryptDecoder<'a, C> {
    /// A decoder for COSE_Encrypt0.
    pub fn encrypt0(adapter: &'a C, options: u32) -> Self {
        EncryptDecoder {
            adapter,
            options,
            message_type: MessageType::Encrypt0,
            external_aad: None,
            enc_struct_buf: None,
            recipients: &mut [],
        }
    }

    /// A decoder for COSE_Encrypt.
    pub fn encrypt(adapter: &'a C, options: u32) -> Self {
        EncryptDecoder {
            adapter,
            options,
            message_type: MessageType::Encrypt,
            external_aad: None,
            enc_struct_buf: None,
            recipients: &mut [],
        }
    }

    /// Bind externally supplied AAD into the Enc_structure.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Attach a larger Enc_structure scratch buffer.
    pub fn with_enc_structure_buffer(mut self, buf: &'a mut [u8]) -> Self {
        self.enc_struct_buf = Some(buf);
        self
    }

    /// Attach the recipient decoders tried, in order, against each recipient element.
    pub fn with_recipients(mut self, recipients: &'a mut [RecipientDecoder<'a, C>]) -> Self {
        self.recipients = recipients;
        self
    }

    /// Decode (and, unless `OPT_DECODE_ONLY` is set, decrypt) an encrypted message.
    ///
    /// For COSE_Encrypt0 the caller supplies the CEK handle; for COSE_Encrypt it is recovered
    /// through the recipient decoders. The plaintext lands in `plaintext_out`.
    pub fn decode<'buf, 's, 'pt>(
        &mut self,
        input: &'buf [u8],
        cek: Option<&C::Key>,
        detached_ciphertext: Option<&'buf [u8]>,
        slots: &'s mut [Param<'buf>],
        plaintext_out: &'pt mut [u8],
    ) -> Result<DecodedEncrypt<'buf, 's, 'pt>> {
        let adapter = self.adapter;
        let options = self.options;
        let external_aad = self.external_aad;
        let decode_only = options & OPT_DECODE_ONLY != 0;

        let mut storage = ParamStorage::new(slots);
        let mut d = Decoder::new(input);
        consume_tag(&mut d, options, self.message_type)?;
        let n = d.array()?.ok_or(COSEError::Format)?;
        let expected = if self.message_type == MessageType::Encrypt0 {
            3
        } else {
            4
        };
        if n != expected {
            return Err(COSEError::BadArrayLength);
        }
        let body = decode_headers(&mut d, &mut storage, None, options)?;

        let ciphertext: Option<&'buf [u8]> = match d.datatype()? {
            Type::Null => {
                d.null()?;
                detached_ciphertext
            }
            Type::Bytes => Some(d.bytes()?),
            _ => return Err(COSEError::WrongType),
        };

        let alg = body.alg.ok_or(COSEError::NoAlgParameter)?;
        let aead = is_aead_alg(alg);
        if !aead {
            if options & OPT_ENABLE_NON_AEAD == 0 {
                return Err(COSEError::UnsupportedEncryptionAlgorithm);
            }
            if !body.protected_raw.is_empty() {
                return Err(COSEError::ParameterInWrongBucket);
            }
        }

        // Recipient processing recovers the CEK bytes for COSE_Encrypt.
        let mut cek_scratch = [0u8; MAX_CEK];
        let mut recovered_len = 0usize;
        let mut recipient_used = None;
        if self.message_type == MessageType::Encrypt {
            let nrec = d.array()?.ok_or(COSEError::Format)?;
            if nrec == 0 {
                return Err(COSEError::BadArrayLength);
            }
            let mut recovered = false;
            for i in 0..nrec as usize {
                if decode_only {
                    let _ = decode_recipient_element(&mut d, &mut storage, options)?;
                    continue;
                }
                if recovered {
                    d.skip()?;
                    continue;
                }
                let mark = d.position();
                let smark = storage.len();
                for recipient in self.recipients.iter_mut() {
                    d.set_position(mark);
                    storage.rewind(smark);
                    match recipient.decode(adapter, &mut d, &mut storage, options, &mut cek_scratch)
                    {
                        Ok((len, _headers)) => {
                            recovered_len = len;
                            recipient_used = Some(i);
                            recovered = true;
                            break;
                        }
                        Err(err) if err.is_soft() => continue,
                        Err(err) => return Err(err),
                    }
                }
                if !recovered {
                    d.set_position(mark);
                    storage.rewind(smark);
                    d.skip()?;
                }
            }
            if !decode_only && recipient_used.is_none() {
                return Err(COSEError::Decline);
            }
        }

        if d.position() != input.len() {
            return Err(COSEError::Format);
        }

        let plaintext: Option<&'pt [u8]> = if decode_only {
            None
        } else {
            let ct = ciphertext.ok_or(COSEError::Format)?;
            let nonce = if aead {
                body.iv.ok_or(COSEError::Format)?
            } else {
                body.iv.unwrap_or(&[])
            };
            let mut default_scratch = [0u8; DEFAULT_ENC_STRUCT];
            let scratch: &mut [u8] = match self.enc_struct_buf.as_deref_mut() {
                Some(b) => b,
                None => &mut default_scratch,
            };
            let context = if self.message_type == MessageType::Encrypt0 {
                CTX_ENCRYPT0
            } else {
                CTX_ENCRYPT
            };
            let n = if self.message_type == MessageType::Encrypt0 {
                let key = cek.ok_or(COSEError::EmptyKey)?;
                decrypt_content(
                    adapter,
                    alg,
                    aead,
                    key,
                    nonce,
                    body.protected_raw,
                    context,
                    external_aad,
                    scratch,
                    ct,
                    plaintext_out,
                )?
            } else {
                // The recovered CEK becomes a key handle of its own, released when this scope
                // ends.
                let key = adapter.make_symmetric_key(alg, &cek_scratch[..recovered_len])?;
                decrypt_content(
                    adapter,
                    alg,
                    aead,
                    &key,
                    nonce,
                    body.protected_raw,
                    context,
                    external_aad,
                    scratch,
                    ct,
                    plaintext_out,
                )?
            };
            Some(&plaintext_out[..n])
        };

        Ok(DecodedEncrypt {
            plaintext,
            body,
            params: storage.into_params(),
            recipient_used,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn decrypt_content<C: CryptoAdapter>(
    adapter: &C,
    alg: i64,
    aead: bool,
    key: &C::Key,
    nonce: &[u8],
    protected_raw: &[u8],
    context: &str,
    external_aad: Option<&[u8]>,
    scratch: &mut [u8],
    ciphertext: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    if aead {
        let n = encode_enc_structure(scratch, context, protected_raw, external_aad)?;
        adapter.aead_decrypt(alg, key, nonce, Some(&scratch[..n]), ciphertext, out)
    } else {
        adapter.aead_decrypt(alg, key, nonce, None, ciphertext, out)
    }
}
