// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Base encodings used when rendering sylva digests.
//!
//! Besides the custom [nix base32](base32) codec, this crate exposes a small
//! [`Base`] selector so that callers rendering a digest in several encodings
//! dispatch through one place.

use data_encoding::{BASE64, HEXLOWER};

pub mod base32;

/// An output encoding for raw digest bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    /// Lowercase hexadecimal.
    Hex,
    /// Standard base64 with `=` padding.
    Base64,
    /// Nix's LSB-first base32 (see [`base32`]).
    NixBase32,
}

impl Base {
    /// Encode `raw` in this base.
    pub fn encode(&self, raw: &[u8]) -> String {
        match self {
            Base::Hex => HEXLOWER.encode(raw),
            Base::Base64 => BASE64.encode(raw),
            Base::NixBase32 => base32::encode(raw),
        }
    }

    /// Length of the encoding of `len` raw bytes.
    pub const fn encoded_len(&self, len: usize) -> usize {
        match self {
            Base::Hex => len * 2,
            Base::Base64 => len.div_ceil(3) * 4,
            Base::NixBase32 => base32::encode_len(len),
        }
    }
}
