// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Git object hashing.
//!
//! SWHIDs for filesystem objects are SHA-1 ids of Git objects: file
//! contents and symlink targets become blobs, directories become trees.
//! The framing here must match Git byte for byte (`git hash-object`
//! produces the same ids), including the tree entry sort rule and the
//! mode strings without a leading zero for trees.

use std::fmt;
use std::path::Path;

use data_encoding::HEXLOWER;
use sylva_utils_hash::{Algorithm, Context, Hash};
use tokio::fs;
use tokio::io::AsyncReadExt as _;

use crate::SwhidError;

/// Read granularity for blob contents.
const BLOB_CHUNK_SIZE: usize = 8 * 1024;

/// A 20-byte Git object id, rendered as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid([u8; 20]);

impl Oid {
    pub(crate) fn from_hash(hash: &Hash) -> Oid {
        debug_assert_eq!(hash.algorithm(), Algorithm::SHA1);
        let mut raw = [0u8; 20];
        raw.copy_from_slice(hash.digest_bytes());
        Oid(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

/// Git tree entry modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Directory,
    Regular,
    Executable,
    Symlink,
}

impl EntryMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryMode::Directory => "40000",
            EntryMode::Regular => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
        }
    }

    pub const fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: Vec<u8>,
    pub oid: Oid,
}

impl TreeEntry {
    /// Git's tree sort key: a directory compares as if its name carried a
    /// trailing `/`. This differs from plain name order when a file and a
    /// directory share a prefix.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.clone();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// `"<kind> <size>\0"`.
fn object_header(kind: &str, size: u64) -> Vec<u8> {
    let mut header = Vec::with_capacity(kind.len() + 24);
    header.extend_from_slice(kind.as_bytes());
    header.push(b' ');
    header.extend_from_slice(size.to_string().as_bytes());
    header.push(0);
    header
}

/// Object id of a blob with in-memory contents (symlink targets).
pub fn hash_blob_bytes(contents: &[u8]) -> Oid {
    let mut ctx = Context::new(Algorithm::SHA1);
    ctx.update(object_header("blob", contents.len() as u64));
    ctx.update(contents);
    Oid::from_hash(&ctx.finish())
}

/// Streams the file at `path` into a blob digest.
///
/// The size in the blob header comes from the already-open handle, and the
/// bytes actually read must match it exactly.
pub async fn hash_blob_file(path: &Path) -> Result<Oid, SwhidError> {
    let mut file = fs::File::open(path).await.map_err(|source| SwhidError::Io {
        context: format!("opening {}", path.display()),
        source,
    })?;
    let expected = file
        .metadata()
        .await
        .map_err(|source| SwhidError::Io {
            context: format!("reading metadata of {}", path.display()),
            source,
        })?
        .len();

    let mut ctx = Context::new(Algorithm::SHA1);
    ctx.update(object_header("blob", expected));

    let mut buf = vec![0u8; BLOB_CHUNK_SIZE];
    let mut actual = 0u64;
    loop {
        let n = file.read(&mut buf).await.map_err(|source| SwhidError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        if n == 0 {
            break;
        }
        actual += n as u64;
        if actual > expected {
            return Err(SwhidError::FileChanged {
                path: path.to_owned(),
                expected,
                actual,
            });
        }
        ctx.update(&buf[..n]);
    }
    if actual != expected {
        return Err(SwhidError::FileChanged {
            path: path.to_owned(),
            expected,
            actual,
        });
    }
    Ok(Oid::from_hash(&ctx.finish()))
}

/// Object id of a tree. Entries may arrive in any order; they are sorted
/// here by the Git rule.
pub fn hash_tree(mut entries: Vec<TreeEntry>) -> Oid {
    entries.sort_by_key(TreeEntry::sort_key);

    let mut body = Vec::new();
    for entry in &entries {
        body.extend_from_slice(entry.mode.as_str().as_bytes());
        body.push(b' ');
        body.extend_from_slice(&entry.name);
        body.push(0);
        body.extend_from_slice(entry.oid.as_bytes());
    }

    let mut ctx = Context::new(Algorithm::SHA1);
    ctx.update(object_header("tree", body.len() as u64));
    ctx.update(&body);
    Oid::from_hash(&ctx.finish())
}
