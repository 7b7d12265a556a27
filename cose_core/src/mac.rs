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
 * cose_core MAC engine
 *
 * Encode and decode of COSE_Mac0 and COSE_Mac with the HMAC-SHA-2 algorithms. The
 * MAC_structure is streamed into the adapter's MAC context rather than materialized; for
 * COSE_Mac the authentication key is generated by the engine and conveyed through the
 * recipient objects exactly like a content-encryption key.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::buffer::OutputBuffer;
use crate::constants::HDR_ALG;
use crate::crypto::{hash_len, hmac_hash_alg, CryptoAdapter};
use crate::error::{COSEError, Result};
use crate::options::{consume_tag, emit_tag, MessageType, OPT_DECODE_ONLY};
use crate::params::{decode_headers, encode_headers, Headers, Param, ParamStorage};
use crate::recipient::{decode_recipient_element, Recipient, RecipientDecoder, MAX_CEK};
use crate::sign::Payload;
use crate::structure::{mac_structure_feed, CTX_MAC, CTX_MAC0};

/// Encoder for COSE_Mac0 and COSE_Mac.
#[derive(Debug)]
pub struct MacEncoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    alg: i64,
    external_aad: Option<&'a [u8]>,
}

impl<'a, C: CryptoAdapter> MacEncoder<'a, C> {
    /// An encoder producing COSE_Mac0 under HMAC algorithm `alg`.
    pub fn mac0(adapter: &'a C, alg: i64, options: u32) -> Self {
        MacEncoder {
            adapter,
            options,
            message_type: MessageType::Mac0,
            alg,
            external_aad: None,
        }
    }

    /// An encoder producing COSE_Mac under HMAC algorithm `alg`.
    pub fn mac(adapter: &'a C, alg: i64, options: u32) -> Self {
        MacEncoder {
            adapter,
            options,
            message_type: MessageType::Mac,
            alg,
            external_aad: None,
        }
    }

    /// Bind externally supplied AAD into the MAC_structure.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Authenticate `payload` into a COSE message, returning the encoded length.
    ///
    /// For COSE_Mac0 the caller supplies the authentication key in `key`; for COSE_Mac the
    /// engine generates one, wraps it toward every attached recipient and releases the handle
    /// before returning.
    pub fn encode(
        &mut self,
        payload: Payload<'_>,
        key: Option<&C::Key>,
        params: &[Param<'_>],
        recipients: &mut [Recipient<'a, C>],
        out: &mut OutputBuffer<'_>,
    ) -> Result<usize> {
        let adapter = self.adapter;
        let options = self.options;
        let alg = self.alg;
        let external_aad = self.external_aad;
        let sizing = out.is_sizing();

        let hash = hmac_hash_alg(alg)?;
        let tag_len = hash_len(hash)?;

        let mut key_bytes = [0u8; MAX_CEK];
        let mut generated: Option<C::Key> = None;
        let mac_key: Option<&C::Key> = match self.message_type {
            MessageType::Mac0 => match key {
                Some(k) => Some(k),
                None if sizing => None,
                None => return Err(COSEError::EmptyKey),
            },
            _ => {
                if !sizing {
                    adapter.get_random(&mut key_bytes[..tag_len])?;
                    generated = Some(adapter.make_symmetric_key(alg, &key_bytes[..tag_len])?);
                }
                generated.as_ref()
            }
        };

        let mut e = Encoder::new(&mut *out);
        emit_tag(&mut e, options, self.message_type)?;
        e.array(if self.message_type == MessageType::Mac0 {
            4
        } else {
            5
        })?;

        let core = [Param::int(HDR_ALG, alg).in_protected()];
        let (ps, pe) = encode_headers(&mut e, &core, params)?;

        if payload.is_detached() {
            e.null()?;
        } else {
            e.bytes(payload.bytes())?;
        }

        let context = if self.message_type == MessageType::Mac0 {
            CTX_MAC0
        } else {
            CTX_MAC
        };

        if sizing {
            let ph = e.writer_mut().open_bytes(tag_len)?;
            e.writer_mut().close_bytes(ph, tag_len)?;
        } else {
            let k = mac_key.ok_or(COSEError::EmptyKey)?;
            let mut mac = adapter.hmac_setup(alg, k)?;
            {
                let protected = e.writer().written(ps, pe)?;
                mac_structure_feed(
                    adapter,
                    &mut mac,
                    context,
                    protected,
                    external_aad,
                    payload.bytes(),
                )?;
            }
            let ph = e.writer_mut().open_bytes(tag_len)?;
            let region = e.writer_mut().bytes_mut(&ph)?;
            let n = adapter.hmac_compute_finish(mac, region)?;
            e.writer_mut().close_bytes(ph, n)?;
        }

        if self.message_type == MessageType::Mac {
            if recipients.is_empty() {
                return Err(COSEError::Decline);
            }
            e.array(recipients.len() as u64)?;
            for recipient in recipients.iter_mut() {
                recipient.encode(adapter, &mut e, &key_bytes[..tag_len])?;
            }
        }

        drop(e);
        drop(generated);
        Ok(out.len())
    }
}

/// The decoded view of a COSE_Mac0 or COSE_Mac message.
#[derive(Debug)]
pub struct DecodedMac<'buf, 's> {
    /// The payload: embedded bytes, the caller's detached payload, or `None`.
    pub payload: Option<&'buf [u8]>,
    /// The decoded body headers.
    pub body: Headers<'buf>,
    /// Every parameter decoded from the message, body and recipient elements alike.
    pub params: &'s [Param<'buf>],
    /// The raw authentication tag.
    pub tag: &'buf [u8],
    /// The index of the recipient element whose decoder recovered the key, if any.
    pub recipient_used: Option<usize>,
}

/// Decoder for COSE_Mac0 and COSE_Mac.
pub struct MacDecoder<'a, C: CryptoAdapter> {
    adapter: &'a C,
    options: u32,
    message_type: MessageType,
    external_aad: Option<&'a [u8]>,
    recipients: &'a mut [RecipientDecoder<'a, C>],
}

impl<'a, C: CryptoAdapter> MacDecoder<'a, C> {
    /// A decoder for COSE_Mac0.
    pub fn mac0(adapter: &'a C, options: u32) -> Self {
        MacDecoder {
            adapter,
            options,
            message_type: MessageType::Mac0,
            external_aad: None,
            recipients: &mut [],
        }
    }

    /// A decoder for COSE_Mac.
    pub fn mac(adapter: &'a C, options: u32) -> Self {
        MacDecoder {
            adapter,
            options,
            message_type: MessageType::Mac,
            external_aad: None,
            recipients: &mut [],
        }
    }

    /// Bind externally supplied AAD into the MAC_structure.
    pub fn with_external_aad(mut self, aad: &'a [u8]) -> Self {
        self.external_aad = Some(aad);
        self
    }

    /// Attach the recipient decoders tried, in order, against each recipient element.
    pub fn with_recipients(mut self, recipients: &'a mut [RecipientDecoder<'a, C>]) -> Self {
        self.recipients = recipients;
        self
    }

    /// Decode (and, unless `OPT_DECODE_ONLY` is set, authenticate) a MACed message.
    pub fn decode<'buf, 's>(
        &mut self,
        input: &'buf [u8],
        key: Option<&C::Key>,
        detached_payload: Option<&'buf [u8]>,
        slots: &'s mut [Param<'buf>],
    ) -> Result<DecodedMac<'buf, 's>> {
        let adapter = self.adapter;
        let options = self.options;
        let external_aad = self.external_aad;
        let decode_only = options & OPT_DECODE_ONLY != 0;

        let mut storage = ParamStorage::new(slots);
        let mut d = Decoder::new(input);
        consume_tag(&mut d, options, self.message_type)?;
        let n = d.array()?.ok_or(COSEError::Format)?;
        let expected = if self.message_type == MessageType::Mac0 {
            4
        } else {
            5
        };
        if n != expected {
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

        if d.datatype()? != Type::Bytes {
            return Err(COSEError::WrongType);
        }
        let tag = d.bytes()?;

        let mut key_scratch = [0u8; MAX_CEK];
        let mut recovered_len = 0usize;
        let mut recipient_used = None;
        if self.message_type == MessageType::Mac {
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
                    match recipient.decode(adapter, &mut d, &mut storage, options, &mut key_scratch)
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

        if !decode_only {
            let alg = body.alg.ok_or(COSEError::NoAlgParameter)?;
            hmac_hash_alg(alg)?;
            let payload_bytes = payload.ok_or(COSEError::Format)?;
            let context = if self.message_type == MessageType::Mac0 {
                CTX_MAC0
            } else {
                CTX_MAC
            };
            let mut mac = if self.message_type == MessageType::Mac0 {
                let k = key.ok_or(COSEError::EmptyKey)?;
                adapter.hmac_setup(alg, k)?
            } else {
                let k = adapter.make_symmetric_key(alg, &key_scratch[..recovered_len])?;
                adapter.hmac_setup(alg, &k)?
            };
            mac_structure_feed(
                adapter,
                &mut mac,
                context,
                body.protected_raw,
                external_aad,
                payload_bytes,
            )?;
            adapter.hmac_validate_finish(mac, tag)?;
        }

        Ok(DecodedMac {
            payload,
            body,
            params: storage.into_params(),
            tag,
            recipient_used,
        })
    }
}
