// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Nix base32 encoding.
//!
//! Nix renders hashes in a 32-symbol alphabet that omits `e`, `o`, `u` and
//! `t`, and emits digits least-significant first: the last character of the
//! encoding holds the lowest five bits of the input. There is no `=`
//! padding; the encoding of `n` bytes is always `⌈8n/5⌉` characters.
//!
//! `data-encoding` supports the LSB-first bit order directly; the only
//! extra step is reversing the output (and the input, when decoding),
//! because Nix writes the least significant digit last.

use data_encoding::{BitOrder, DecodeError, Encoding, Specification};
use std::sync::LazyLock;

/// The nix base32 alphabet. `e`, `o`, `u` and `t` are omitted.
pub const ALPHABET: &str = "0123456789abcdfghijklmnpqrsvwxyz";

static NIX_BASE32: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(ALPHABET);
    spec.bit_order = BitOrder::LeastSignificantFirst;
    spec.encoding().expect("alphabet is a valid base32 spec")
});

/// Length of the encoding of `len` raw bytes.
pub const fn encode_len(len: usize) -> usize {
    (len * 8).div_ceil(5)
}

/// Encode `input` as nix base32.
pub fn encode(input: &[u8]) -> String {
    let mut out = vec![0u8; encode_len(input.len())];
    NIX_BASE32.encode_mut(input, &mut out);
    out.reverse();
    String::from_utf8(out).expect("encoding output is ASCII")
}

/// Decode a nix base32 string back to raw bytes.
///
/// The error position refers to the original (un-reversed) input.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reversed = input.to_vec();
    reversed.reverse();
    NIX_BASE32.decode(&reversed).map_err(|err| DecodeError {
        position: input.len().saturating_sub(err.position + 1),
        kind: err.kind,
    })
}

#[cfg(test)]
mod unittests {
    use data_encoding::DecodeKind;
    use hex_literal::hex;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty("", &[])]
    #[case::one_00("00", &hex!("00"))]
    #[case::one_1f("0z", &hex!("1f"))]
    #[case::one_20("10", &hex!("20"))]
    #[case::two("0bqz", &hex!("1f2f"))]
    #[case::three("gy003", &hex!("0300 ff"))]
    #[case::five("aqs14005", &hex!("0500 1234 56"))]
    #[case::sha1_sized("x0xf8v9fxf3jk8zln1cwlsrmhqvp0f88", &hex!("0839 7037 8635 6bca 59b0 f4a3 2987 eb2e 6de4 3ae8"))]
    #[case::sha256_abc("1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s", &hex!("ba78 16bf 8f01 cfea 4141 40de 5dae 2223 b003 61a3 9617 7a9c b410 ff61 f200 15ad"))]
    fn encode_known(#[case] expected: &str, #[case] data: &[u8]) {
        assert_eq!(encode(data), expected);
    }

    #[test]
    fn encode_zero_digest() {
        let encoded = encode(&[0u8; 32]);
        assert_eq!(encoded.len(), 52);
        assert!(encoded.bytes().all(|b| b == b'0'));
    }

    #[test]
    fn encode_stays_in_alphabet() {
        let data: Vec<u8> = (0..=255).collect();
        for c in encode(&data).chars() {
            assert!(ALPHABET.contains(c), "unexpected symbol {c:?}");
        }
    }

    #[rstest]
    #[case::trailing_bits("zz", 0, DecodeKind::Trailing)]
    #[case::bad_symbol("c|zz0", 1, DecodeKind::Symbol)]
    #[case::bad_symbol_late("czz|0", 3, DecodeKind::Symbol)]
    fn decode_errors(#[case] input: &str, #[case] position: usize, #[case] kind: DecodeKind) {
        let err = decode(input.as_bytes()).unwrap_err();
        assert_eq!(err.position, position);
        assert_eq!(err.kind, kind);
    }
}
