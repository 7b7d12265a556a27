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
 * cose_core Header Parameter model
 *
 * The two-bucket (protected / unprotected) header parameter codec shared by every message
 * element. Parameters are represented as typed nodes drawn from a caller-supplied storage pool;
 * the protected bucket is serialized once into the output and the emitted bytes are what the
 * crypto layer is later fed. Duplicate labels are rejected, the `crit` array is synthesized on
 * encode and enforced on decode, and special-parameter decoders get the first chance to claim
 * any label.
 **************************************************************************************************/
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::buffer::{OutputBuffer, MT_BSTR};
use crate::constants::*;
use crate::error::{COSEError, Result};
use crate::options::OPT_NO_CRIT_CHECK;

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// A reasonable number of parameter slots for messages using only the common header
/// parameters. Callers decoding messages with many parameters should supply more.
pub const RECOMMENDED_PARAM_SLOTS: usize = 10;

/// Maximum number of labels tracked from a `crit` array during decode.
pub(crate) const MAX_CRIT_LABELS: usize = 8;

/// A header parameter label: an integer or a text string (the COSE registry admits both).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label<'a> {
    /// Integer label
    Int(i64),
    /// Text string label
    Text(&'a str),
}

/// Encode callback for a [`ParamValue::Custom`] parameter. The callback emits exactly one CBOR
/// item (the parameter value) on the encoder.
pub type EncodeParamFn = fn(&Param<'_>, &mut Encoder<&mut OutputBuffer<'_>>) -> Result<()>;

/// The typed value of a header parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<'a> {
    /// Integer value
    Int(i64),
    /// Text string value
    Text(&'a str),
    /// Byte string value
    Bytes(&'a [u8]),
    /// Boolean value
    Bool(bool),
    /// Arbitrary CBOR emitted through a callback
    Custom(EncodeParamFn),
    /// A label the decoder did not understand; recorded for the critical-parameter check
    Unknown,
}

/// One header parameter node.
///
/// On encode, `protected` selects the bucket and `critical` adds the label to the synthesized
/// `crit` array (critical parameters must reside in the protected bucket). On decode, nodes are
/// drawn from a [`ParamStorage`] pool and `critical` is not populated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'a> {
    /// The parameter label
    pub label: Label<'a>,
    /// `true` if the parameter resides in the protected bucket
    pub protected: bool,
    /// `true` if the label is to be listed in the `crit` array on encode
    pub critical: bool,
    /// The parameter value
    pub value: ParamValue<'a>,
}

impl<'a> Param<'a> {
    /// An unused parameter slot, for initializing storage pools.
    pub const EMPTY: Param<'static> = Param {
        label: Label::Int(0),
        protected: false,
        critical: false,
        value: ParamValue::Unknown,
    };

    /// An unprotected integer parameter.
    pub fn int(label: i64, value: i64) -> Self {
        Param {
            label: Label::Int(label),
            protected: false,
            critical: false,
            value: ParamValue::Int(value),
        }
    }

    /// An unprotected text parameter.
    pub fn text(label: i64, value: &'a str) -> Self {
        Param {
            label: Label::Int(label),
            protected: false,
            critical: false,
            value: ParamValue::Text(value),
        }
    }

    /// An unprotected byte-string parameter.
    pub fn bytes(label: i64, value: &'a [u8]) -> Self {
        Param {
            label: Label::Int(label),
            protected: false,
            critical: false,
            value: ParamValue::Bytes(value),
        }
    }

    /// An unprotected boolean parameter.
    pub fn boolean(label: i64, value: bool) -> Self {
        Param {
            label: Label::Int(label),
            protected: false,
            critical: false,
            value: ParamValue::Bool(value),
        }
    }

    /// An unprotected parameter emitted through an encode callback.
    pub fn custom(label: i64, encode: EncodeParamFn) -> Self {
        Param {
            label: Label::Int(label),
            protected: false,
            critical: false,
            value: ParamValue::Custom(encode),
        }
    }

    /// Move this parameter into the protected bucket.
    pub fn in_protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Mark this parameter critical. Critical parameters are always protected.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self.protected = true;
        self
    }
}

/// A caller-supplied pool of parameter slots with a high-water-mark allocator. Decoders draw
/// nodes from the pool; exhaustion is reported as `NotEnoughParameters` and aborts the decode.
#[derive(Debug)]
pub struct ParamStorage<'s, 'buf> {
    slots: &'s mut [Param<'buf>],
    used: usize,
}

impl<'s, 'buf> ParamStorage<'s, 'buf> {
    /// Construct a pool over a slice of slots. Any previous contents are ignored.
    pub fn new(slots: &'s mut [Param<'buf>]) -> Self {
        ParamStorage { slots, used: 0 }
    }

    /// The number of slots allocated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.used
    }

    /// Return `true` if no slots have been allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// The parameters decoded so far.
    pub fn params(&self) -> &[Param<'buf>] {
        &self.slots[..self.used]
    }

    /// Draw one slot from the pool.
    pub(crate) fn alloc(&mut self, p: Param<'buf>) -> Result<()> {
        if self.used < self.slots.len() {
            self.slots[self.used] = p;
            self.used += 1;
            Ok(())
        } else {
            Err(COSEError::NotEnoughParameters)
        }
    }

    /// Release every slot allocated after `mark`. Used by the dispatch loops to discard the
    /// parameters of an element a handler declined.
    pub(crate) fn rewind(&mut self, mark: usize) {
        if mark < self.used {
            self.used = mark;
        }
    }

    /// Consume the pool, returning the allocated parameters with the storage lifetime.
    pub(crate) fn into_params(self) -> &'s [Param<'buf>] {
        let ParamStorage { slots, used } = self;
        &slots[..used]
    }
}

/// A decoder given the first chance to claim any header label before the built-in handling
/// runs. Returning `Ok(None)` declines the label (the decoder position is restored); returning
/// a value claims it and the value is recorded in the parameter list.
pub trait SpecialParams<'buf> {
    /// Offer `label` to this decoder. `d` is positioned at the parameter value.
    fn claim(
        &mut self,
        label: Label<'buf>,
        protected: bool,
        d: &mut Decoder<'buf>,
    ) -> Result<Option<ParamValue<'buf>>>;
}

/// The content-type parameter value: a CoAP content-format number or a MIME type string.
/// Byte-string content types are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat<'a> {
    /// CoAP Content-Format number
    Numeric(u64),
    /// MIME media type
    Mime(&'a str),
}

/// A decoded view of one element's header buckets: the verbatim protected bytes plus
/// quick-access copies of the common parameters. The full parameter list is in the storage
/// pool at `param_start .. param_start + param_count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headers<'buf> {
    /// The exact content bytes of the protected header byte string, as received or emitted.
    pub protected_raw: &'buf [u8],
    /// The `alg` parameter (label 1), if present.
    pub alg: Option<i64>,
    /// The `kid` parameter (label 4), if present.
    pub kid: Option<&'buf [u8]>,
    /// The `iv` parameter (label 5), if present.
    pub iv: Option<&'buf [u8]>,
    /// The `partial iv` parameter (label 6), if present.
    pub partial_iv: Option<&'buf [u8]>,
    /// The `content type` parameter (label 3), if present.
    pub content_type: Option<ContentFormat<'buf>>,
    /// First slot of this element's parameters in the storage pool.
    pub param_start: usize,
    /// Number of parameters this element contributed to the pool.
    pub param_count: usize,
}

/***************************************************************************************************
 * Encode
 **************************************************************************************************/

/// Validate a parameter list prior to encoding: no duplicate labels within the element, bucket
/// rules for the registered labels, and value types consistent with the labels.
fn check_params(first: &[Param<'_>], second: &[Param<'_>]) -> Result<()> {
    let all = first.iter().chain(second.iter());
    for (i, p) in all.clone().enumerate() {
        for q in all.clone().skip(i + 1) {
            if p.label == q.label {
                return Err(COSEError::DuplicateParameter);
            }
        }
        if p.critical && !p.protected {
            return Err(COSEError::CritNotProtected);
        }
        match p.label {
            Label::Int(HDR_ALG) => {
                if !p.protected {
                    return Err(COSEError::ParameterInWrongBucket);
                }
                if !matches!(p.value, ParamValue::Int(_)) {
                    return Err(COSEError::WrongParameterType);
                }
            }
            Label::Int(HDR_CRIT) => {
                // The crit array is synthesized; it cannot be supplied as a parameter.
                return Err(COSEError::WrongParameterType);
            }
            Label::Int(HDR_CONTENT_TYPE) => match p.value {
                ParamValue::Int(v) if v >= 0 => {}
                ParamValue::Text(_) => {}
                _ => return Err(COSEError::WrongParameterType),
            },
            Label::Int(HDR_IV) | Label::Int(HDR_PARTIAL_IV) => {
                if p.protected {
                    return Err(COSEError::ParameterInWrongBucket);
                }
                if !matches!(p.value, ParamValue::Bytes(_)) {
                    return Err(COSEError::WrongParameterType);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn encode_label(e: &mut Encoder<&mut OutputBuffer<'_>>, label: Label<'_>) -> Result<()> {
    match label {
        Label::Int(v) => {
            e.i64(v)?;
        }
        Label::Text(s) => {
            e.str(s)?;
        }
    }
    Ok(())
}

fn encode_value(e: &mut Encoder<&mut OutputBuffer<'_>>, p: &Param<'_>) -> Result<()> {
    match p.value {
        ParamValue::Int(v) => {
            e.i64(v)?;
        }
        ParamValue::Text(s) => {
            e.str(s)?;
        }
        ParamValue::Bytes(b) => {
            e.bytes(b)?;
        }
        ParamValue::Bool(v) => {
            e.bool(v)?;
        }
        ParamValue::Custom(encode) => encode(p, e)?,
        ParamValue::Unknown => return Err(COSEError::WrongParameterType),
    }
    Ok(())
}

/// Emit the protected bucket as a CBOR map: the protected parameters of both lists in order,
/// followed by the synthesized `crit` array when any parameter is critical.
fn write_protected_map(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    first: &[Param<'_>],
    second: &[Param<'_>],
) -> Result<()> {
    let protected = || first.iter().chain(second.iter()).filter(|p| p.protected);
    let crit_count = protected().filter(|p| p.critical).count();
    let entries = protected().count() + usize::from(crit_count > 0);

    e.map(entries as u64)?;
    for p in protected() {
        encode_label(e, p.label)?;
        encode_value(e, p)?;
    }
    if crit_count > 0 {
        e.i64(HDR_CRIT)?;
        e.array(crit_count as u64)?;
        for p in protected().filter(|p| p.critical) {
            encode_label(e, p.label)?;
        }
    }
    Ok(())
}

/// Encode both header buckets onto `e`: the protected map wrapped in a byte string, then the
/// unprotected map. Returns the byte range of the protected map content within the output; the
/// engines feed exactly these bytes to the crypto layer.
///
/// `first` holds the engine-supplied parameters (e.g. `alg`, `iv`), `second` the caller's.
#[cfg_attr(feature = "trace", trace)]
pub(crate) fn encode_headers(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    first: &[Param<'_>],
    second: &[Param<'_>],
) -> Result<(usize, usize)> {
    check_params(first, second)?;
    let range = encode_protected(e, first, second)?;
    encode_unprotected(e, first, second)?;
    Ok(range)
}

/// Emit the protected bucket alone (byte-string wrapped), returning the content range.
/// An empty bucket is emitted as a zero-length byte string, not an encoded empty map.
pub(crate) fn encode_protected(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    first: &[Param<'_>],
    second: &[Param<'_>],
) -> Result<(usize, usize)> {
    let count = first
        .iter()
        .chain(second.iter())
        .filter(|p| p.protected)
        .count();
    if count == 0 {
        e.writer_mut().push_head(MT_BSTR, 0)?;
        let at = e.writer().len();
        return Ok((at, at));
    }

    // Measure the map first so the byte string can be emitted with a definite length.
    let mut probe_buf = OutputBuffer::sizing();
    let mut probe = Encoder::new(&mut probe_buf);
    write_protected_map(&mut probe, first, second)?;
    let content_len = probe.writer().len();

    e.writer_mut().push_head(MT_BSTR, content_len as u64)?;
    let start = e.writer().len();
    write_protected_map(e, first, second)?;
    let end = e.writer().len();
    debug_assert_eq!(end - start, content_len);
    Ok((start, end))
}

/// Emit the unprotected bucket as a CBOR map.
pub(crate) fn encode_unprotected(
    e: &mut Encoder<&mut OutputBuffer<'_>>,
    first: &[Param<'_>],
    second: &[Param<'_>],
) -> Result<()> {
    let unprotected = || first.iter().chain(second.iter()).filter(|p| !p.protected);
    e.map(unprotected().count() as u64)?;
    for p in unprotected() {
        encode_label(e, p.label)?;
        encode_value(e, p)?;
    }
    Ok(())
}

/***************************************************************************************************
 * Decode
 **************************************************************************************************/

fn is_int(t: Type) -> bool {
    matches!(
        t,
        Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::Int
    )
}

fn decode_label<'buf>(d: &mut Decoder<'buf>) -> Result<Label<'buf>> {
    let t = d.datatype()?;
    if is_int(t) {
        Ok(Label::Int(d.i64()?))
    } else if t == Type::String {
        Ok(Label::Text(d.str()?))
    } else {
        Err(COSEError::WrongType)
    }
}

fn expect_bytes<'buf>(d: &mut Decoder<'buf>) -> Result<&'buf [u8]> {
    if d.datatype()? != Type::Bytes {
        return Err(COSEError::WrongParameterType);
    }
    Ok(d.bytes()?)
}

struct CritList<'buf> {
    labels: [Label<'buf>; MAX_CRIT_LABELS],
    count: usize,
}

impl<'buf> CritList<'buf> {
    fn new() -> Self {
        CritList {
            labels: [Label::Int(0); MAX_CRIT_LABELS],
            count: 0,
        }
    }

    fn push(&mut self, label: Label<'buf>) -> Result<()> {
        if self.count == MAX_CRIT_LABELS {
            return Err(COSEError::NotEnoughParameters);
        }
        self.labels[self.count] = label;
        self.count += 1;
        Ok(())
    }

    fn labels(&self) -> &[Label<'buf>] {
        &self.labels[..self.count]
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_param_entry<'buf>(
    d: &mut Decoder<'buf>,
    protected: bool,
    storage: &mut ParamStorage<'_, 'buf>,
    special: &mut Option<&mut dyn SpecialParams<'buf>>,
    headers: &mut Headers<'buf>,
    crit: &mut CritList<'buf>,
    param_start: usize,
) -> Result<()> {
    let label = decode_label(d)?;

    // A label may occur once per element, counting both buckets.
    for p in &storage.params()[param_start..] {
        if p.label == label {
            return Err(COSEError::DuplicateParameter);
        }
    }

    if let Some(sp) = special.as_mut() {
        let mark = d.position();
        match sp.claim(label, protected, d)? {
            Some(value) => {
                return storage.alloc(Param {
                    label,
                    protected,
                    critical: false,
                    value,
                });
            }
            None => d.set_position(mark),
        }
    }

    match label {
        Label::Int(HDR_ALG) => {
            if !protected {
                return Err(COSEError::ParameterInWrongBucket);
            }
            if !is_int(d.datatype()?) {
                return Err(COSEError::NoAlgParameter);
            }
            let v = d.i64()?;
            headers.alg = Some(v);
            storage.alloc(Param {
                label,
                protected,
                critical: false,
                value: ParamValue::Int(v),
            })
        }
        Label::Int(HDR_CRIT) => {
            if !protected {
                return Err(COSEError::CritNotProtected);
            }
            if crit.count > 0 {
                return Err(COSEError::DuplicateParameter);
            }
            let n = d.array()?.ok_or(COSEError::Format)?;
            if n == 0 {
                return Err(COSEError::EmptyCritArray);
            }
            for _ in 0..n {
                let l = decode_label(d)?;
                crit.push(l)?;
            }
            Ok(())
        }
        Label::Int(HDR_CONTENT_TYPE) => {
            let t = d.datatype()?;
            let (format, value) = if t == Type::String {
                let s = d.str()?;
                (ContentFormat::Mime(s), ParamValue::Text(s))
            } else if is_int(t) {
                let v = d.i64()?;
                if v < 0 {
                    return Err(COSEError::WrongParameterType);
                }
                (ContentFormat::Numeric(v as u64), ParamValue::Int(v))
            } else {
                // Byte-string content types are rejected.
                return Err(COSEError::WrongParameterType);
            };
            headers.content_type = Some(format);
            storage.alloc(Param {
                label,
                protected,
                critical: false,
                value,
            })
        }
        Label::Int(HDR_KID) => {
            let b = expect_bytes(d)?;
            headers.kid = Some(b);
            storage.alloc(Param {
                label,
                protected,
                critical: false,
                value: ParamValue::Bytes(b),
            })
        }
        Label::Int(HDR_IV) | Label::Int(HDR_PARTIAL_IV) => {
            if protected {
                return Err(COSEError::ParameterInWrongBucket);
            }
            let b = expect_bytes(d)?;
            if label == Label::Int(HDR_IV) {
                headers.iv = Some(b);
            } else {
                headers.partial_iv = Some(b);
            }
            storage.alloc(Param {
                label,
                protected,
                critical: false,
                value: ParamValue::Bytes(b),
            })
        }
        _ => {
            d.skip()?;
            storage.alloc(Param {
                label,
                protected,
                critical: false,
                value: ParamValue::Unknown,
            })
        }
    }
}

/// Decode both header buckets of one message element: the protected bucket byte string, then
/// the unprotected map. Parameters are drawn from `storage`; `special`, when provided, gets the
/// first chance to claim any label. On exit the `crit` labels are reconciled against the
/// decoded parameters unless `OPT_NO_CRIT_CHECK` is set.
#[cfg_attr(feature = "trace", trace)]
pub(crate) fn decode_headers<'buf>(
    d: &mut Decoder<'buf>,
    storage: &mut ParamStorage<'_, 'buf>,
    mut special: Option<&mut dyn SpecialParams<'buf>>,
    options: u32,
) -> Result<Headers<'buf>> {
    let param_start = storage.len();
    let mut headers = Headers {
        param_start,
        ..Headers::default()
    };
    let mut crit = CritList::new();

    if d.datatype()? != Type::Bytes {
        return Err(COSEError::WrongType);
    }
    let prot = d.bytes()?;
    headers.protected_raw = prot;
    if !prot.is_empty() {
        // An empty byte string stands for an empty map; anything else must be a single map
        // occupying the whole string.
        let mut pd = Decoder::new(prot);
        let n = pd.map()?.ok_or(COSEError::Format)?;
        for _ in 0..n {
            decode_param_entry(
                &mut pd,
                true,
                storage,
                &mut special,
                &mut headers,
                &mut crit,
                param_start,
            )?;
        }
        if pd.position() != prot.len() {
            return Err(COSEError::Format);
        }
    }

    let n = d.map()?.ok_or(COSEError::Format)?;
    for _ in 0..n {
        decode_param_entry(
            d,
            false,
            storage,
            &mut special,
            &mut headers,
            &mut crit,
            param_start,
        )?;
    }

    if options & OPT_NO_CRIT_CHECK == 0 {
        for label in crit.labels() {
            let found = storage.params()[param_start..]
                .iter()
                .find(|p| p.label == *label);
            match found {
                None => return Err(COSEError::CritNotProtected),
                Some(p) if !p.protected => return Err(COSEError::CritNotProtected),
                Some(p) if matches!(p.value, ParamValue::Unknown) => {
                    return Err(COSEError::UnknownCriticalParameter)
                }
                Some(_) => {}
            }
        }
    }

    headers.param_count = storage.len() - param_start;
    Ok(headers)
}
