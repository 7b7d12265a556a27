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
 * cose_core Engine options
 *
 * Message type selection, the option flags accepted by every engine, and the CBOR tag-number
 * discipline (tag required / forbidden / either) applied when decoding.
 **************************************************************************************************/
use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};

use crate::buffer::OutputBuffer;
use crate::constants::*;
use crate::error::{COSEError, Result};

/// Suppress the outer CBOR tag number on encode.
pub const OPT_OMIT_CBOR_TAG: u32 = 0x0000_0001;
/// Decode headers and payload only; no cryptographic operation is performed.
pub const OPT_DECODE_ONLY: u32 = 0x0000_0002;
/// Skip the reconciliation of the `crit` array against unknown labels.
pub const OPT_NO_CRIT_CHECK: u32 = 0x0000_0004;
/// Allow non-AEAD content-encryption algorithms. The body protected bucket must then be empty,
/// since its integrity is not otherwise ensured.
pub const OPT_ENABLE_NON_AEAD: u32 = 0x0000_0008;
/// Reject input that does not carry the expected CBOR tag number.
pub const OPT_TAG_REQUIRED: u32 = 0x0000_0010;
/// Reject input that carries a CBOR tag number. With neither tag flag set, both tagged and
/// untagged input are accepted.
pub const OPT_TAG_FORBIDDEN: u32 = 0x0000_0020;

/// The six COSE message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// COSE_Sign1: one signer, tag 18
    Sign1,
    /// COSE_Sign: signature array, tag 98
    Sign,
    /// COSE_Encrypt0: implicit key, tag 16
    Encrypt0,
    /// COSE_Encrypt: recipient array, tag 96
    Encrypt,
    /// COSE_Mac0: implicit key, tag 17
    Mac0,
    /// COSE_Mac: recipient array, tag 97
    Mac,
}

impl MessageType {
    /// The CBOR tag number identifying this message type.
    pub fn tag(self) -> u64 {
        match self {
            MessageType::Sign1 => TAG_COSE_SIGN1,
            MessageType::Sign => TAG_COSE_SIGN,
            MessageType::Encrypt0 => TAG_COSE_ENCRYPT0,
            MessageType::Encrypt => TAG_COSE_ENCRYPT,
            MessageType::Mac0 => TAG_COSE_MAC0,
            MessageType::Mac => TAG_COSE_MAC,
        }
    }

    /// The message type identified by a CBOR tag number, if any.
    pub fn from_tag(tag: u64) -> Option<MessageType> {
        match tag {
            TAG_COSE_SIGN1 => Some(MessageType::Sign1),
            TAG_COSE_SIGN => Some(MessageType::Sign),
            TAG_COSE_ENCRYPT0 => Some(MessageType::Encrypt0),
            TAG_COSE_ENCRYPT => Some(MessageType::Encrypt),
            TAG_COSE_MAC0 => Some(MessageType::Mac0),
            TAG_COSE_MAC => Some(MessageType::Mac),
        _ => None,
        }
    }
}

/// Emit the message tag unless suppressed by `OPT_OMIT_CBOR_TAG`.
pub(crate) fn emit_tag(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    options: u32,
    declared: MessageType,
) -> Result<()> {
    if options & OPT_OMIT_CBOR_TAG == 0 {
        e.tag(Tag::new(declared.tag()))?;
    }
    Ok(())
}

/// Consume the message tag if present, enforcing the configured tag mode against the declared
/// message type.
pub(crate) fn consume_tag(d: &mut Decoder<'_>, options: u32, declared: MessageType) -> Result<()> {
    if d.datatype()? == Type::Tag {
        if options & OPT_TAG_FORBIDDEN != 0 {
            return Err(COSEError::TagMismatch);
        }
        let tag = d.tag()?;
        if tag.as_u64() != declared.tag() {
            return Err(COSEError::TagMismatch);
        }
    } else if options & OPT_TAG_REQUIRED != 0 {
        return Err(COSEError::TagMismatch);
    }
    Ok(())
}
