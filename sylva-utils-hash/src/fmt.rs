// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Rendering and parsing of [`Hash`] values.
//!
//! Three encodings are supported: lowercase hex, SRI
//! (`"<algo>-<base64>"`, with `=` padding), and nix base32. The display
//! adapters borrow the hash, so rendering allocates only when the caller
//! asks for a `String`.

use std::fmt;

use data_encoding::BASE64;
use sylva_utils_base_encoding::{Base, base32};
use thiserror::Error;

use crate::{Algorithm, Hash, InvalidHashError, UnknownAlgorithm};

/// Displays a hash as lowercase hex.
pub struct Hex<'a>(&'a Hash);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Base::Hex.encode(self.0.digest_bytes()))
    }
}

/// Displays a hash in SRI form, `"<algo>-<base64>"`.
pub struct Sri<'a>(&'a Hash);

impl fmt::Display for Sri<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.0.algorithm(),
            Base::Base64.encode(self.0.digest_bytes())
        )
    }
}

/// Displays a hash as bare nix base32.
pub struct NixBase32<'a>(&'a Hash);

impl fmt::Display for NixBase32<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base32::encode(self.0.digest_bytes()))
    }
}

impl Hash {
    /// Lowercase hex adapter.
    pub fn as_hex(&self) -> Hex<'_> {
        Hex(self)
    }

    /// SRI adapter.
    pub fn as_sri(&self) -> Sri<'_> {
        Sri(self)
    }

    /// Nix base32 adapter.
    pub fn as_nix32(&self) -> NixBase32<'_> {
        NixBase32(self)
    }

    /// Renders the hash in every supported encoding at once.
    pub fn bundle(&self) -> HashBundle {
        HashBundle {
            hash: *self,
            hex: self.as_hex().to_string(),
            sri: self.as_sri().to_string(),
            nix32: self.as_nix32().to_string(),
        }
    }
}

/// A digest rendered in every supported encoding.
///
/// `hash` carries the algorithm and the raw digest bytes; the remaining
/// fields are the rendered forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashBundle {
    pub hash: Hash,
    pub hex: String,
    pub sri: String,
    pub nix32: String,
}

#[derive(Error, Debug)]
pub enum ParseHashError {
    #[error("missing '-' separator in SRI hash")]
    MissingSeparator,
    #[error(transparent)]
    Algorithm(#[from] UnknownAlgorithm),
    #[error("invalid base64 in SRI hash: {0}")]
    Base64(#[from] data_encoding::DecodeError),
    #[error(transparent)]
    Length(#[from] InvalidHashError),
}

/// Parses an SRI string (`"sha256-<base64>"`) back into a [`Hash`].
pub fn parse_sri(s: &str) -> Result<Hash, ParseHashError> {
    let (algo, digest) = s.split_once('-').ok_or(ParseHashError::MissingSeparator)?;
    let algorithm: Algorithm = algo.parse()?;
    let raw = BASE64.decode(digest.as_bytes())?;
    Ok(Hash::from_slice(algorithm, &raw)?)
}

#[cfg(test)]
mod unittests {
    use rstest::rstest;

    use super::*;

    fn sha256_abc() -> Hash {
        Algorithm::SHA256.digest("abc")
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(
            sha256_abc().as_hex().to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sri_roundtrip() {
        let sri = sha256_abc().as_sri().to_string();
        assert_eq!(sri, "sha256-ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
        assert_eq!(parse_sri(&sri).unwrap(), sha256_abc());
    }

    #[test]
    fn nix32_matches_reference() {
        assert_eq!(
            sha256_abc().as_nix32().to_string(),
            "1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s"
        );
    }

    #[test]
    fn bundle_is_consistent() {
        let bundle = sha256_abc().bundle();
        assert_eq!(bundle.hash, sha256_abc());
        assert_eq!(bundle.hex, sha256_abc().as_hex().to_string());
        assert_eq!(bundle.sri, sha256_abc().as_sri().to_string());
        assert_eq!(bundle.nix32, sha256_abc().as_nix32().to_string());
    }

    #[rstest]
    #[case::no_separator("sha256ungWv48Bz")]
    #[case::unknown_algorithm("md5-kAFQmDzST7DWlj99KOF/cg==")]
    #[case::bad_base64("sha256-@@@@")]
    #[case::wrong_length("sha256-qZk+NkcGgWq6PiVxeFDCbJzQ2J0=")]
    fn parse_sri_rejects(#[case] input: &str) {
        assert!(parse_sri(input).is_err());
    }
}
