// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! NAR (Nix ARchive) format handling.
//!
//! A NAR is a deterministic, byte-exact serialization of a filesystem
//! subtree: regular files (contents plus the executable bit), directories
//! (entries sorted byte-wise by name), and symbolic links (targets taken
//! verbatim, never followed). Because the serialization is canonical, the
//! SHA-256 of the stream identifies the tree itself.
//!
//! # Key features
//!
//! - Streaming pack and unpack with bounded memory: file bodies move in
//!   fixed-size chunks and the archive is never buffered whole
//! - IO-agnostic: the encoder writes to any [`AsyncWrite`], the parser
//!   reads from any [`AsyncBufRead`] and feeds a [`NarSink`]
//! - Archive hashing without an archive file, via a digest sink
//! - Atomic archive-file creation and trailing-garbage detection on
//!   extraction
//!
//! [`AsyncWrite`]: tokio::io::AsyncWrite
//! [`AsyncBufRead`]: tokio::io::AsyncBufRead

/// Byte string type alias.
pub type ByteString = bytes::Bytes;

pub mod archive;
pub mod wire;

mod ops;

pub use archive::{
    DumpOptions, ExecutablePolicy, NarByteStream, NarDumpError, NarParseError, NarRestorer,
    NarSink, NarWriteError, dump, parse_nar,
};
pub use ops::{
    NarError, compute_hashes, extract, hash_path, stream, write_stdout, write_to_file,
};

#[cfg(test)]
pub mod test;
