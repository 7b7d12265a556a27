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
 * cose_core Error API
 *
 * The single error enumeration returned by every fallible operation in this crate, together
 * with the soft-error predicate used by the verifier and recipient dispatch loops.
 **************************************************************************************************/
use std::result;

#[cfg(any(feature = "full", test))]
use thiserror::Error;

/// An alias for Result<T, COSEError> used throughout this crate.
pub type Result<T> = result::Result<T, COSEError>;

/// `COSEError` provides information about failures while encoding, decoding or cryptographically
/// processing COSE messages.
///
/// A small subset of these values are *soft* errors (see [`COSEError::is_soft`]): during
/// verifier or recipient dispatch a soft error means "this handler declined the element" and the
/// next configured handler is tried. Everything else aborts the enclosing operation.
#[cfg_attr(any(feature="full", test), derive(Copy, Clone, Error, Debug, PartialEq, Eq))]
#[cfg_attr(all(not(feature="full"), not(test)), derive(Copy, Clone, Debug, PartialEq, Eq))]
pub enum COSEError {
    /// The CBOR input is not well-formed, or an element had an unexpected shape.
    #[cfg_attr(any(feature="full", test), error("CBOR is not well-formed or has an unexpected shape"))]
    Format,
    /// A CBOR item was of the wrong type for its position.
    #[cfg_attr(any(feature="full", test), error("CBOR item has the wrong type for its position"))]
    WrongType,
    /// An array did not have the arity required by the message layout.
    #[cfg_attr(any(feature="full", test), error("Array does not have the required number of elements"))]
    BadArrayLength,
    /// The CBOR tag number did not match the declared message type, or its presence violated
    /// the configured tag mode.
    #[cfg_attr(any(feature="full", test), error("CBOR tag number mismatch"))]
    TagMismatch,
    /// The same parameter label occurred more than once in a message element.
    #[cfg_attr(any(feature="full", test), error("Duplicate header parameter label"))]
    DuplicateParameter,
    /// The algorithm parameter (label 1) is missing or is not an integer.
    #[cfg_attr(any(feature="full", test), error("Algorithm parameter missing or not an integer"))]
    NoAlgParameter,
    /// A label listed in the `crit` array is not understood by the decoder.
    #[cfg_attr(any(feature="full", test), error("Unknown parameter listed in crit array"))]
    UnknownCriticalParameter,
    /// The `crit` array is present but empty.
    #[cfg_attr(any(feature="full", test), error("Empty crit array"))]
    EmptyCritArray,
    /// The `crit` parameter, or a label it lists, is not in the protected bucket.
    #[cfg_attr(any(feature="full", test), error("crit or a crit-listed label is not protected"))]
    CritNotProtected,
    /// A parameter occurred in a bucket it is not permitted in (e.g. `alg` unprotected,
    /// `iv` protected).
    #[cfg_attr(any(feature="full", test), error("Parameter present in the wrong header bucket"))]
    ParameterInWrongBucket,
    /// A parameter value had the wrong type for its label.
    #[cfg_attr(any(feature="full", test), error("Parameter value has the wrong type for its label"))]
    WrongParameterType,
    /// The signature algorithm is unknown to this handler. Soft.
    #[cfg_attr(any(feature="full", test), error("Unsupported signing algorithm"))]
    UnsupportedSigningAlgorithm,
    /// The key-exchange (recipient) algorithm is unknown to this handler. Soft.
    #[cfg_attr(any(feature="full", test), error("Unsupported key exchange algorithm"))]
    UnsupportedKeyExchangeAlgorithm,
    /// The content-encryption algorithm is unknown. Soft.
    #[cfg_attr(any(feature="full", test), error("Unsupported encryption algorithm"))]
    UnsupportedEncryptionAlgorithm,
    /// The cipher underlying a key-wrap or content operation is unknown. Soft.
    #[cfg_attr(any(feature="full", test), error("Unsupported cipher algorithm"))]
    UnsupportedCipherAlgorithm,
    /// The hash algorithm is unknown. Soft.
    #[cfg_attr(any(feature="full", test), error("Unsupported hash algorithm"))]
    UnsupportedHash,
    /// The algorithm is not supported by the adapter or engine.
    #[cfg_attr(any(feature="full", test), error("Unsupported algorithm"))]
    UnsupportedAlgorithm,
    /// The supplied key cannot be used with the requested algorithm.
    #[cfg_attr(any(feature="full", test), error("Wrong key type for algorithm"))]
    WrongKeyType,
    /// A key was required but empty or absent.
    #[cfg_attr(any(feature="full", test), error("Key empty or absent"))]
    EmptyKey,
    /// The key is on a different elliptic curve than required.
    #[cfg_attr(any(feature="full", test), error("Key is on the wrong elliptic curve"))]
    WrongCurve,
    /// The key length does not match the algorithm's requirement.
    #[cfg_attr(any(feature="full", test), error("Key size does not match the algorithm"))]
    KeySizeMismatch,
    /// The key length is not one the implementation supports.
    #[cfg_attr(any(feature="full", test), error("Unsupported key length"))]
    UnsupportedKeyLength,
    /// The signing operation could not be run.
    #[cfg_attr(any(feature="full", test), error("Signing operation failed"))]
    SigFailed,
    /// The signature was processed and rejected.
    #[cfg_attr(any(feature="full", test), error("Signature verification failed"))]
    SigVerifyFailed,
    /// The encryption operation could not be run.
    #[cfg_attr(any(feature="full", test), error("Encryption operation failed"))]
    EncryptFailed,
    /// The decryption operation could not be run.
    #[cfg_attr(any(feature="full", test), error("Decryption operation failed"))]
    DecryptFailed,
    /// An AEAD tag or key-unwrap integrity check failed: wrong key or tampered data.
    #[cfg_attr(any(feature="full", test), error("Data authentication failed"))]
    DataAuthFailed,
    /// The random number generator failed.
    #[cfg_attr(any(feature="full", test), error("Random number generation failed"))]
    RngFailed,
    /// The HMAC operation failed.
    #[cfg_attr(any(feature="full", test), error("HMAC operation failed"))]
    HmacFailed,
    /// The HKDF operation failed.
    #[cfg_attr(any(feature="full", test), error("HKDF operation failed"))]
    HkdfFailed,
    /// The output buffer is too small for the encoded result.
    #[cfg_attr(any(feature="full", test), error("Output buffer too small"))]
    BufferTooSmall,
    /// An input is larger than the implementation can process.
    #[cfg_attr(any(feature="full", test), error("Input length invalid or too large"))]
    InvalidLength,
    /// The parameter storage pool is exhausted.
    #[cfg_attr(any(feature="full", test), error("Not enough parameter storage"))]
    NotEnoughParameters,
    /// The adapter ran out of memory.
    #[cfg_attr(any(feature="full", test), error("Insufficient memory"))]
    InsufficientMemory,
    /// No configured handler accepted this element. Soft.
    #[cfg_attr(any(feature="full", test), error("No handler accepted this element"))]
    Decline,
    /// The handler's configured kid does not match the element's kid. Soft.
    #[cfg_attr(any(feature="full", test), error("Key identifier did not match"))]
    KidUnmatched,
    /// The end of a CBOR array was reached during iterative dispatch.
    #[cfg_attr(any(feature="full", test), error("No more items in array"))]
    NoMore,
}

impl COSEError {
    /// Return `true` if this error is in the *soft* set: a handler in a dispatch loop declined
    /// the element and the dispatcher should rewind and try the next handler.
    #[inline]
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            COSEError::UnsupportedSigningAlgorithm
                | COSEError::UnsupportedKeyExchangeAlgorithm
                | COSEError::UnsupportedEncryptionAlgorithm
                | COSEError::UnsupportedCipherAlgorithm
                | COSEError::UnsupportedHash
                | COSEError::KidUnmatched
                | COSEError::Decline
        )
    }
}

// CBOR decoder failures map onto the Format kind: the distinction between "not well-formed"
// and "wrong item here" is re-established by the engines' own type checks.
impl From<minicbor::decode::Error> for COSEError {
    fn from(_e: minicbor::decode::Error) -> Self {
        COSEError::Format
    }
}

// All values handed to the CBOR encoder are valid by construction, so an encode failure can
// only be a write failure on the output buffer.
impl<E> From<minicbor::encode::Error<E>> for COSEError {
    fn from(_e: minicbor::encode::Error<E>) -> Self {
        COSEError::BufferTooSmall
    }
}
