// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! The NAR archive format: dumping, parsing, restoring, and streaming.

mod byte_stream;
mod dumper;
mod parser;
mod restorer;

pub use byte_stream::NarByteStream;
pub use dumper::{DumpOptions, ExecutablePolicy, NarDumpError, dump};
pub use parser::{NarParseError, NarSink, parse_nar};
pub use restorer::{NarRestorer, NarWriteError};

/// The magic string opening every archive.
pub(crate) const NAR_MAGIC: &[u8] = b"nix-archive-1";

/// Read and write granularity for file bodies.
pub(crate) const FILE_CHUNK_SIZE: usize = 8 * 1024;
