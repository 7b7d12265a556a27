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
 * cose_core Output Buffer
 *
 * The writable buffer over which all encode engines operate. The buffer tracks an insert
 * position over a caller-provided byte slice and supports opening a byte string in place so
 * that signatures and ciphertext are written directly into the output with no intermediate
 * copy. A buffer without backing storage ("sizing" mode) counts bytes instead of writing them,
 * which lets a caller compute the final message length before allocating.
 **************************************************************************************************/
use crate::error::{COSEError, Result};

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

// CBOR major types needed for raw head emission
pub(crate) const MT_BSTR: u8 = 0b010_00000;
pub(crate) const MT_TSTR: u8 = 0b011_00000;
pub(crate) const MT_ARRAY: u8 = 0b100_00000;

/// Return `true` if it is possible to obtain a slice of length `len` starting from `start` from
/// `buf`
#[inline]
fn within(buf: &[u8], start: usize, len: usize) -> bool {
    start + len <= buf.len()
}

/// Encode a CBOR item head (major type and argument) into a scratch array, returning the array
/// and the number of bytes used. Preferred (shortest) serialization is always produced.
pub(crate) fn cbor_head(major: u8, value: u64) -> ([u8; 9], usize) {
    let mut head = [0u8; 9];
    let vs = value.to_be_bytes();
    let len = if value < 24 {
        head[0] = major | (value as u8);
        1
    } else if value <= u8::MAX as u64 {
        head[0] = major | 24;
        head[1] = vs[7];
        2
    } else if value <= u16::MAX as u64 {
        head[0] = major | 25;
        head[1..3].copy_from_slice(&vs[6..8]);
        3
    } else if value <= u32::MAX as u64 {
        head[0] = major | 26;
        head[1..5].copy_from_slice(&vs[4..8]);
        5
    } else {
        head[0] = major | 27;
        head[1..9].copy_from_slice(&vs[0..8]);
        9
    };
    (head, len)
}

/// The number of bytes the head of an item with argument `value` occupies.
#[inline]
pub(crate) fn cbor_head_len(value: u64) -> usize {
    if value < 24 {
        1
    } else if value <= u8::MAX as u64 {
        2
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Position bookkeeping for a byte string opened in place with [`OutputBuffer::open_bytes`].
///
/// The placeholder holds no borrow of the buffer, so the underlying slice can be handed to a
/// crypto operation via [`OutputBuffer::bytes_mut`] and the string closed afterwards.
#[derive(Debug)]
pub struct BytesPlaceholder {
    head_index: usize,
    head_len: usize,
    capacity: usize,
}

/// A writable output buffer over a caller-provided byte slice.
///
/// Constructed with [`OutputBuffer::new`] over real storage, or with [`OutputBuffer::sizing`]
/// to compute the encoded length without writing anything. In sizing mode all cryptographic
/// work is skipped by the engines; only lengths are accumulated.
#[derive(Debug)]
pub struct OutputBuffer<'buf> {
    bytes: Option<&'buf mut [u8]>,
    index: usize,
}

impl<'buf> OutputBuffer<'buf> {
    /// Construct an instance of `OutputBuffer` over a buffer.
    #[inline]
    pub fn new(b: &'buf mut [u8]) -> OutputBuffer<'buf> {
        OutputBuffer {
            bytes: Some(b),
            index: 0,
        }
    }

    /// Construct an `OutputBuffer` with no backing storage. Encoding against it produces no
    /// bytes and performs no cryptography, but [`OutputBuffer::len`] reports the length the
    /// encoded message would have.
    #[inline]
    pub fn sizing() -> OutputBuffer<'static> {
        OutputBuffer {
            bytes: None,
            index: 0,
        }
    }

    /// Return `true` if this buffer is a sizing (length-only) buffer.
    #[inline]
    pub fn is_sizing(&self) -> bool {
        self.bytes.is_none()
    }

    /// The number of bytes written (or, in sizing mode, counted) so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.index
    }

    /// Return `true` if nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    /// Return a slice containing the encoded output.
    ///
    /// Fails with `InvalidLength` on a sizing buffer, which has no bytes to return.
    pub fn encoded(&self) -> Result<&[u8]> {
        match &self.bytes {
            Some(b) => Ok(&b[0..self.index]),
            None => Err(COSEError::InvalidLength),
        }
    }

    /// Consume the buffer, returning the encoded output with the lifetime of the underlying
    /// storage.
    pub fn into_encoded(self) -> Result<&'buf [u8]> {
        let index = self.index;
        match self.bytes {
            Some(b) => Ok(&b[0..index]),
            None => Err(COSEError::InvalidLength),
        }
    }

    /// Borrow a previously written region. Used by the engines to re-read the serialized
    /// protected header bytes, which must be fed to the crypto layer exactly as emitted.
    pub(crate) fn written(&self, start: usize, end: usize) -> Result<&[u8]> {
        match &self.bytes {
            Some(b) if start <= end && end <= self.index => Ok(&b[start..end]),
            _ => Err(COSEError::InvalidLength),
        }
    }

    /// Append raw bytes, or count them in sizing mode.
    #[cfg_attr(feature = "trace", trace)]
    pub(crate) fn push(&mut self, src: &[u8]) -> Result<()> {
        match &mut self.bytes {
            Some(b) => {
                if within(b, self.index, src.len()) {
                    b[self.index..self.index + src.len()].copy_from_slice(src);
                } else {
                    return Err(COSEError::BufferTooSmall);
                }
            }
            None => {}
        }
        self.index += src.len();
        Ok(())
    }

    /// Append a CBOR item head, returning its length.
    pub(crate) fn push_head(&mut self, major: u8, value: u64) -> Result<usize> {
        let (head, len) = cbor_head(major, value);
        self.push(&head[..len])?;
        Ok(len)
    }

    /// Open a byte string of at most `capacity` bytes in place.
    ///
    /// The head is emitted for `capacity`; the content region is then available through
    /// [`OutputBuffer::bytes_mut`] and the string is completed with
    /// [`OutputBuffer::close_bytes`], which fixes the head up if fewer bytes were used.
    #[cfg_attr(feature = "trace", trace)]
    pub(crate) fn open_bytes(&mut self, capacity: usize) -> Result<BytesPlaceholder> {
        let head_index = self.index;
        let head_len = self.push_head(MT_BSTR, capacity as u64)?;
        if let Some(b) = &self.bytes {
            if !within(b, self.index, capacity) {
                return Err(COSEError::BufferTooSmall);
            }
        }
        Ok(BytesPlaceholder {
            head_index,
            head_len,
            capacity,
        })
    }

    /// The writable content region of an open byte string.
    pub(crate) fn bytes_mut(&mut self, ph: &BytesPlaceholder) -> Result<&mut [u8]> {
        let start = ph.head_index + ph.head_len;
        match &mut self.bytes {
            Some(b) => Ok(&mut b[start..start + ph.capacity]),
            None => Err(COSEError::InvalidLength),
        }
    }

    /// Close a byte string opened with [`OutputBuffer::open_bytes`], recording that `used`
    /// bytes of its capacity were filled. If the head shrinks, the content is moved down so
    /// the encoding stays contiguous.
    #[cfg_attr(feature = "trace", trace)]
    pub(crate) fn close_bytes(&mut self, ph: BytesPlaceholder, used: usize) -> Result<()> {
        if used > ph.capacity {
            return Err(COSEError::InvalidLength);
        }
        let new_head_len = cbor_head_len(used as u64);
        if let Some(b) = &mut self.bytes {
            let data_start = ph.head_index + ph.head_len;
            if new_head_len != ph.head_len {
                b.copy_within(data_start..data_start + used, ph.head_index + new_head_len);
            }
            let (head, len) = cbor_head(MT_BSTR, used as u64);
            b[ph.head_index..ph.head_index + len].copy_from_slice(&head[..len]);
        }
        self.index = ph.head_index + new_head_len + used;
        Ok(())
    }
}

impl<'buf> minicbor::encode::Write for OutputBuffer<'buf> {
    type Error = COSEError;

    fn write_all(&mut self, buf: &[u8]) -> std::result::Result<(), COSEError> {
        self.push(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_encodings() {
        for (value, expect) in [
            (0u64, &[0x40u8][..]),
            (23, &[0x57][..]),
            (24, &[0x58, 0x18][..]),
            (255, &[0x58, 0xff][..]),
            (256, &[0x59, 0x01, 0x00][..]),
            (65536, &[0x5a, 0x00, 0x01, 0x00, 0x00][..]),
        ]
        .iter()
        {
            let (head, len) = cbor_head(MT_BSTR, *value);
            assert_eq!(&head[..len], *expect);
            assert_eq!(cbor_head_len(*value), expect.len());
        }
    }

    #[test]
    fn open_close_exact() {
        let mut storage = [0u8; 16];
        let mut buf = OutputBuffer::new(&mut storage);
        let ph = buf.open_bytes(4).unwrap();
        buf.bytes_mut(&ph).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        buf.close_bytes(ph, 4).unwrap();
        assert_eq!(buf.encoded().unwrap(), &[0x44, 1, 2, 3, 4]);
    }

    #[test]
    fn open_close_shrinks_head() {
        // Opened for 64 bytes (two-byte head), closed at 8 (one-byte head): content moves down.
        let mut storage = [0u8; 80];
        let mut buf = OutputBuffer::new(&mut storage);
        let ph = buf.open_bytes(64).unwrap();
        {
            let region = buf.bytes_mut(&ph).unwrap();
            for (i, byte) in region.iter_mut().enumerate().take(8) {
                *byte = i as u8;
            }
        }
        buf.close_bytes(ph, 8).unwrap();
        assert_eq!(buf.encoded().unwrap(), &[0x48, 0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn sizing_matches_real() {
        let mut storage = [0u8; 32];
        let mut real = OutputBuffer::new(&mut storage);
        let ph = real.open_bytes(10).unwrap();
        real.close_bytes(ph, 10).unwrap();
        real.push(&[0xf6]).unwrap();

        let mut probe = OutputBuffer::sizing();
        let ph = probe.open_bytes(10).unwrap();
        probe.close_bytes(ph, 10).unwrap();
        probe.push(&[0xf6]).unwrap();

        assert_eq!(real.len(), probe.len());
    }

    #[test]
    fn overflow_reports_buffer_too_small() {
        let mut storage = [0u8; 2];
        let mut buf = OutputBuffer::new(&mut storage);
        assert_eq!(buf.push(&[0, 1, 2]), Err(COSEError::BufferTooSmall));
    }
}
