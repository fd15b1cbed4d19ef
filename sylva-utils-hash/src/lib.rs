// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Streaming digests for sylva.
//!
//! A [`Hash`] is an algorithm tag plus the raw digest bytes; a [`Context`]
//! accumulates a digest incrementally; a [`HashSink`] is an [`AsyncWrite`]
//! that drains any byte producer into a digest while counting bytes.
//! Rendering (hex, SRI, nix base32) lives in [`fmt`].
//!
//! [`AsyncWrite`]: tokio::io::AsyncWrite

use std::fmt as sfmt;

use ring::digest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

mod algo;
pub mod fmt;

pub use algo::{Algorithm, UnknownAlgorithm};
pub use fmt::HashBundle;

const LARGEST_ALGORITHM: Algorithm = Algorithm::LARGEST;

#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("hash has wrong length {length} != {} for hash type '{algorithm}'", algorithm.size())]
pub struct InvalidHashError {
    algorithm: Algorithm,
    length: usize,
}

/// A finished digest: the algorithm plus the raw digest bytes.
///
/// Stored inline, padded to the largest supported digest size, so the type
/// is `Copy` and allocation-free.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Hash {
    algorithm: Algorithm,
    data: [u8; LARGEST_ALGORITHM.size()],
}

impl Hash {
    /// Builds a hash from `digest`, which must be exactly
    /// `algorithm.size()` bytes.
    pub const fn new(algorithm: Algorithm, digest: &[u8]) -> Hash {
        let mut data = [0u8; LARGEST_ALGORITHM.size()];
        let (prefix, _) = data.split_at_mut(algorithm.size());
        prefix.copy_from_slice(digest);
        Hash { algorithm, data }
    }

    /// Fallible variant of [`Hash::new`].
    pub fn from_slice(algorithm: Algorithm, digest: &[u8]) -> Result<Hash, InvalidHashError> {
        if digest.len() != algorithm.size() {
            return Err(InvalidHashError {
                algorithm,
                length: digest.len(),
            });
        }
        Ok(Hash::new(algorithm, digest))
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    pub fn digest_bytes(&self) -> &[u8] {
        &self.data[0..self.algorithm.size()]
    }
}

impl std::ops::Deref for Hash {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.digest_bytes()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        self.digest_bytes()
    }
}

impl sfmt::Debug for Hash {
    fn fmt(&self, f: &mut sfmt::Formatter<'_>) -> sfmt::Result {
        write!(f, "{}:{}", self.algorithm, self.as_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // SRI string form: "sha256-<base64>"
        serializer.serialize_str(&self.as_sri().to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        fmt::parse_sri(&s).map_err(serde::de::Error::custom)
    }
}

/// A context for multi-step (init-update-finish) digest calculation.
///
/// ```
/// use sylva_utils_hash as hash;
///
/// let one_shot = hash::Algorithm::SHA256.digest("hello, world");
///
/// let mut ctx = hash::Context::new(hash::Algorithm::SHA256);
/// ctx.update("hello");
/// ctx.update(", ");
/// ctx.update("world");
///
/// assert_eq!(one_shot, ctx.finish());
/// ```
#[derive(Clone)]
pub struct Context(Algorithm, digest::Context);

impl Context {
    /// Constructs a new context for `algorithm`.
    pub fn new(algorithm: Algorithm) -> Self {
        Context(algorithm, digest::Context::new(algorithm.digest_algorithm()))
    }

    /// Feeds `data` into the digest. May be called any number of times
    /// before `finish`.
    pub fn update<D: AsRef<[u8]>>(&mut self, data: D) {
        self.1.update(data.as_ref());
    }

    /// Finalizes the calculation, consuming the context.
    pub fn finish(self) -> Hash {
        Hash::new(self.0, self.1.finish().as_ref())
    }

    /// The algorithm this context is using.
    pub fn algorithm(&self) -> Algorithm {
        self.0
    }
}

impl sfmt::Debug for Context {
    fn fmt(&self, f: &mut sfmt::Formatter<'_>) -> sfmt::Result {
        f.debug_tuple("Context").field(&self.0).finish()
    }
}

/// A hash sink that implements [`AsyncWrite`].
///
/// ```
/// use tokio::io;
/// use sylva_utils_hash as hash;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let mut reader: &[u8] = b"hello, world";
/// let mut sink = hash::HashSink::new(hash::Algorithm::SHA256);
///
/// io::copy(&mut reader, &mut sink).await?;
/// let (size, hash) = sink.finish();
///
/// assert_eq!(hash, hash::Algorithm::SHA256.digest("hello, world"));
/// assert_eq!(size, 12);
/// # Ok(())
/// # }
/// ```
///
/// [`AsyncWrite`]: tokio::io::AsyncWrite
#[derive(Debug)]
pub struct HashSink(Option<(u64, Context)>);

impl HashSink {
    /// Constructs a new sink for `algorithm`.
    pub fn new(algorithm: Algorithm) -> HashSink {
        HashSink(Some((0, Context::new(algorithm))))
    }

    /// Finalizes this sink, returning the byte count and the digest.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn finish(mut self) -> (u64, Hash) {
        let (written, ctx) = self.0.take().expect("HashSink::finish called twice");
        (written, ctx.finish())
    }
}

impl tokio::io::AsyncWrite for HashSink {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<Result<usize, std::io::Error>> {
        match self.0.as_mut() {
            None => std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "cannot write to HashSink after calling finish()",
            ))),
            Some((written, ctx)) => {
                *written += buf.len() as u64;
                ctx.update(buf);
                std::task::Poll::Ready(Ok(buf.len()))
            }
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }
}
