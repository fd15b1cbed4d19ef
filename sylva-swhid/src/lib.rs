// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Software Heritage persistent identifiers (SWHIDs) for filesystem
//! objects.
//!
//! An identifier is the SHA-1 of the Git object a path corresponds to:
//! `cnt` (a blob) for regular files and symlink targets, `dir` (a tree)
//! for directories. The ids are Git-compatible, so `git hash-object`
//! agrees with this crate byte for byte. Higher-level identifier kinds
//! (revision, release, snapshot) are out of scope.

use std::io;
use std::path::{Path, PathBuf};

use bstr::BString;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

pub mod git;
mod swhid;
mod walker;

pub use swhid::{ObjectType, Swhid};
pub use walker::{ExecutablePolicy, WalkOptions};

#[derive(Error, Debug)]
pub enum SwhidError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("refusing to identify {}: not a regular file, directory, or symlink", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("invalid entry name {name:?} in {}", .dir.display())]
    InvalidEntryName { dir: PathBuf, name: BString },

    #[error("file {} changed while reading: expected {expected} bytes, got {actual}", .path.display())]
    FileChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Computes the identifier of `path` with default options: `cnt` for
/// regular files and symlinks, `dir` for directories.
///
/// Qualifiers can be appended to the result with
/// [`Swhid::with_qualifier`]; use [`WalkOptions`] to override the
/// executable-bit predicate.
pub async fn hash_path(path: impl AsRef<Path>) -> Result<Swhid, SwhidError> {
    WalkOptions::new().hash_path(path).await
}

/// The identifier of `path` as a sequence of byte chunks: `"swh:1:"`, the
/// context, `":"`, and the object id in hex.
pub async fn stream(path: impl AsRef<Path>) -> Result<impl Stream<Item = Bytes>, SwhidError> {
    let (object_type, oid) = WalkOptions::new().object_id(path.as_ref()).await?;
    Ok(futures::stream::iter([
        Bytes::from_static(b"swh:1:"),
        Bytes::from_static(object_type.as_str().as_bytes()),
        Bytes::from_static(b":"),
        Bytes::from(oid.to_string()),
    ]))
}
