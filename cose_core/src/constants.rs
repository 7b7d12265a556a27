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
 * cose_core COSE registry constants
 *
 * Algorithm identifiers, header parameter labels, elliptic curve identifiers and CBOR tag
 * numbers from the IANA COSE registry (RFC 9052/9053), plus the private-use identifiers used
 * by the short-circuit test signature scheme.
 **************************************************************************************************/

// Signature algorithms

/// ECDSA w/ SHA-256 over P-256
pub const ALG_ES256: i64 = -7;
/// ECDSA w/ SHA-384 over P-384
pub const ALG_ES384: i64 = -35;
/// ECDSA w/ SHA-512 over P-521
pub const ALG_ES512: i64 = -36;
/// EdDSA (pure; the signed message is the full Sig_structure)
pub const ALG_EDDSA: i64 = -8;
/// RSASSA-PSS w/ SHA-256
pub const ALG_PS256: i64 = -37;
/// RSASSA-PSS w/ SHA-384
pub const ALG_PS384: i64 = -38;
/// RSASSA-PSS w/ SHA-512
pub const ALG_PS512: i64 = -39;

// Content encryption algorithms

/// AES-GCM, 128-bit key, 128-bit tag
pub const ALG_A128GCM: i64 = 1;
/// AES-GCM, 192-bit key, 128-bit tag
pub const ALG_A192GCM: i64 = 2;
/// AES-GCM, 256-bit key, 128-bit tag
pub const ALG_A256GCM: i64 = 3;

// MAC algorithms

/// HMAC w/ SHA-256, full-length tag
pub const ALG_HMAC256: i64 = 5;
/// HMAC w/ SHA-384, full-length tag
pub const ALG_HMAC384: i64 = 6;
/// HMAC w/ SHA-512, full-length tag
pub const ALG_HMAC512: i64 = 7;

// Key distribution algorithms

/// Direct use of the content encryption key
pub const ALG_DIRECT: i64 = -6;
/// AES Key Wrap, 128-bit key
pub const ALG_A128KW: i64 = -3;
/// AES Key Wrap, 192-bit key
pub const ALG_A192KW: i64 = -4;
/// AES Key Wrap, 256-bit key
pub const ALG_A256KW: i64 = -5;
/// ECDH-ES + HKDF-SHA-256 + A128KW
pub const ALG_ECDH_ES_A128KW: i64 = -29;
/// ECDH-ES + HKDF-SHA-256 + A192KW
pub const ALG_ECDH_ES_A192KW: i64 = -30;
/// ECDH-ES + HKDF-SHA-256 + A256KW
pub const ALG_ECDH_ES_A256KW: i64 = -31;

// HPKE (draft-ietf-cose-hpke) Base-mode algorithms. The draft has not stabilized; these are
// the values from its current registration table.

/// HPKE Base, DHKEM(P-256, HKDF-SHA256), HKDF-SHA256, AES-128-GCM
pub const ALG_HPKE_BASE_P256_A128GCM: i64 = 35;
/// HPKE Base, DHKEM(P-384, HKDF-SHA384), HKDF-SHA384, AES-256-GCM
pub const ALG_HPKE_BASE_P384_A256GCM: i64 = 36;
/// HPKE Base, DHKEM(P-521, HKDF-SHA512), HKDF-SHA512, AES-256-GCM
pub const ALG_HPKE_BASE_P521_A256GCM: i64 = 37;
/// HPKE Base, DHKEM(X25519, HKDF-SHA256), HKDF-SHA256, AES-128-GCM
pub const ALG_HPKE_BASE_X25519_A128GCM: i64 = 38;

// Hash algorithms

/// SHA-256
pub const ALG_SHA256: i64 = -16;
/// SHA-384
pub const ALG_SHA384: i64 = -43;
/// SHA-512
pub const ALG_SHA512: i64 = -44;

// Short-circuit test signature scheme (COSE private use range). The "signature" is the TBS hash
// repeated to the width of the corresponding ECDSA signature, so message processing can be
// exercised without a real signing backend. Not for production use.

/// Short-circuit signature sized like ES256 (64 bytes), hashed with SHA-256
pub const ALG_SHORT_CIRCUIT_256: i64 = -1_000_256;
/// Short-circuit signature sized like ES384 (96 bytes), hashed with SHA-384
pub const ALG_SHORT_CIRCUIT_384: i64 = -1_000_384;
/// Short-circuit signature sized like ES512 (132 bytes), hashed with SHA-512
pub const ALG_SHORT_CIRCUIT_512: i64 = -1_000_512;

// Header parameter labels (RFC 9052 Table 2)

/// Cryptographic algorithm to use
pub const HDR_ALG: i64 = 1;
/// Critical header parameters
pub const HDR_CRIT: i64 = 2;
/// Content type of the payload
pub const HDR_CONTENT_TYPE: i64 = 3;
/// Key identifier
pub const HDR_KID: i64 = 4;
/// Full initialization vector
pub const HDR_IV: i64 = 5;
/// Partial initialization vector
pub const HDR_PARTIAL_IV: i64 = 6;

// Header parameter labels used by recipient structures

/// Ephemeral public key carried as a COSE_Key map (RFC 9053 Table 15)
pub const HDR_EPHEMERAL_KEY: i64 = -1;
/// HPKE encapsulated key (sender information, draft-ietf-cose-hpke)
pub const HDR_HPKE_SENDER_INFO: i64 = -4;
/// KDF salt (RFC 9053 Table 16)
pub const HDR_SALT: i64 = -20;
/// PartyU identity (RFC 9053 Table 16)
pub const HDR_PARTY_U_IDENTITY: i64 = -21;
/// PartyU nonce
pub const HDR_PARTY_U_NONCE: i64 = -22;
/// PartyU other provided information
pub const HDR_PARTY_U_OTHER: i64 = -23;
/// PartyV identity
pub const HDR_PARTY_V_IDENTITY: i64 = -24;
/// PartyV nonce
pub const HDR_PARTY_V_NONCE: i64 = -25;
/// PartyV other provided information
pub const HDR_PARTY_V_OTHER: i64 = -26;

// COSE_Key map labels (RFC 9052 Table 4, RFC 9053 Table 19)

/// Key type
pub const KEY_KTY: i64 = 1;
/// Curve for EC2/OKP keys
pub const KEY_CRV: i64 = -1;
/// x-coordinate (EC2) or public key (OKP)
pub const KEY_X: i64 = -2;
/// y-coordinate (EC2); either the full coordinate or its sign bit
pub const KEY_Y: i64 = -3;
/// Key type value: Octet Key Pair
pub const KTY_OKP: i64 = 1;
/// Key type value: double-coordinate elliptic curve
pub const KTY_EC2: i64 = 2;

// Elliptic curve identifiers (RFC 9053 Table 18)

/// NIST P-256
pub const CURVE_P256: i64 = 1;
/// NIST P-384
pub const CURVE_P384: i64 = 2;
/// NIST P-521
pub const CURVE_P521: i64 = 3;
/// X25519 (ECDH only)
pub const CURVE_X25519: i64 = 4;
/// X448 (ECDH only)
pub const CURVE_X448: i64 = 5;
/// Ed25519 (EdDSA only)
pub const CURVE_ED25519: i64 = 6;
/// Ed448 (EdDSA only)
pub const CURVE_ED448: i64 = 7;

// CBOR tag numbers for the COSE message types (RFC 9052 Table 1)

/// COSE Single Signer Data Object
pub const TAG_COSE_SIGN1: u64 = 18;
/// COSE Signed Data Object
pub const TAG_COSE_SIGN: u64 = 98;
/// COSE Single Recipient Encrypted Data Object
pub const TAG_COSE_ENCRYPT0: u64 = 16;
/// COSE Encrypted Data Object
pub const TAG_COSE_ENCRYPT: u64 = 96;
/// COSE MACed Data Object with implicit key
pub const TAG_COSE_MAC0: u64 = 17;
/// COSE MACed Data Object
pub const TAG_COSE_MAC: u64 = 97;
