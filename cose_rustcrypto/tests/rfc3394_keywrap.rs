/***************************************************************************************************
 * Copyright (c) 2022-2023, Qualcomm Innovation Center, Inc. All rights reserved.
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
 * AES Key Wrap test cases from RFC 3394
 *
 * Test vector from RFC 3394, Section 4.1 (128-bit key data with a 128-bit KEK), checked
 * byte-exact against the adapter, plus the length and integrity-failure properties the
 * recipient layer relies on.
 **************************************************************************************************/
extern crate cose_core;
extern crate cose_rustcrypto;

use cose_core::adapter::CryptoAdapter;
use cose_core::constants::*;
use cose_core::error::COSEError;
use cose_rustcrypto::RustCrypto;

const KEK: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];
const KEY_DATA: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];
const EXPECTED_WRAP: [u8; 24] = [
    0x1f, 0xa6, 0x8b, 0x0a, 0x81, 0x12, 0xb4, 0x47, 0xae, 0xf3, 0x4b, 0xd8, 0xfb, 0x5a, 0x7b,
    0x82, 0x9d, 0x3e, 0x86, 0x23, 0x71, 0xd2, 0xcf, 0xe5,
];

#[test]
fn rfc3394_section_4_1_vector() -> Result<(), COSEError> {
    println!("<===================== rfc3394_section_4_1_vector ==================>");
    let adapter = RustCrypto::new();
    let kek = adapter.symmetric_key(&KEK);

    let mut wrapped = [0u8; 24];
    let n = adapter.kw_wrap(ALG_A128KW, &kek, &KEY_DATA, &mut wrapped)?;
    assert_eq!(n, KEY_DATA.len() + 8);
    assert_eq!(wrapped, EXPECTED_WRAP);

    let mut unwrapped = [0u8; 16];
    let m = adapter.kw_unwrap(ALG_A128KW, &kek, &wrapped, &mut unwrapped)?;
    assert_eq!(&unwrapped[..m], &KEY_DATA);
    Ok(())
}

#[test]
fn rfc3394_tamper_is_data_auth_failed() {
    println!("<===================== rfc3394_tamper ==============================>");
    let adapter = RustCrypto::new();
    let kek = adapter.symmetric_key(&KEK);

    let mut tampered = EXPECTED_WRAP;
    tampered[23] ^= 0x01;
    let mut out = [0u8; 16];
    assert_eq!(
        adapter.kw_unwrap(ALG_A128KW, &kek, &tampered, &mut out),
        Err(COSEError::DataAuthFailed)
    );
}

#[test]
fn keywrap_length_discipline() {
    println!("<===================== keywrap_length_discipline ===================>");
    let adapter = RustCrypto::new();
    let kek = adapter.symmetric_key(&KEK);

    // Plaintext must be a non-empty multiple of eight bytes.
    let mut out = [0u8; 64];
    assert_eq!(
        adapter.kw_wrap(ALG_A128KW, &kek, &[0u8; 7], &mut out),
        Err(COSEError::InvalidLength)
    );
    // Output is always |plaintext| + 8.
    for len in [8usize, 16, 24, 32] {
        let pt = vec![0x42u8; len];
        let n = adapter
            .kw_wrap(ALG_A128KW, &kek, &pt, &mut out)
            .expect("wrap");
        assert_eq!(n, len + 8);
    }
}

#[test]
fn keywrap_kek_size_must_match_algorithm() {
    println!("<===================== keywrap_kek_size ============================>");
    let adapter = RustCrypto::new();
    let short = adapter.symmetric_key(&KEK);
    let mut out = [0u8; 64];
    // A 128-bit KEK cannot drive A256KW.
    assert_eq!(
        adapter.kw_wrap(ALG_A256KW, &short, &KEY_DATA, &mut out),
        Err(COSEError::KeySizeMismatch)
    );
}
