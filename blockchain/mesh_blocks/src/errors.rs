// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Errors raised while parsing a block (or record) out of its wire
/// representation. Every variant corresponds to a "Structural" row in the
/// error-handling design: the caller logs and drops the datagram, it is
/// never propagated as a panic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("datagram too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("declared sensor count {declared} does not match payload length (expected {expected_len} bytes, got {actual_len})")]
    LengthMismatch {
        declared: u32,
        expected_len: usize,
        actual_len: usize,
    },

    #[error("pop_proof is not NUL-terminated within {max} bytes")]
    PopProofNotTerminated { max: usize },

    #[error("pop_proof contains non-ASCII-printable byte 0x{byte:02x}")]
    PopProofNotPrintable { byte: u8 },
}
