// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Walking a filesystem tree into Git object ids.
//!
//! Directory ids depend on the ids of every child, so the walk is
//! post-order: an explicit frame stack accumulates tree entries and a
//! directory is hashed when its listing is exhausted. Symlinks are never
//! followed; their targets are hashed as blob contents.

use std::path::{Path, PathBuf};
use std::vec;

use bstr::{BString, ByteVec as _};
use tokio::fs;
use tracing::trace;

use crate::SwhidError;
use crate::git::{self, EntryMode, Oid, TreeEntry};
use crate::swhid::{ObjectType, Swhid};

/// Decides whether a file gets tree mode `100755`, given its metadata.
pub type ExecutablePolicy = fn(&std::fs::Metadata) -> bool;

/// Owner-execute bit on Unix.
#[cfg(unix)]
fn default_executable_policy(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    metadata.permissions().mode() & 0o100 != 0
}

/// Platforms without an executable bit identify everything as
/// non-executable; override with [`WalkOptions::executable_policy`] if the
/// caller has a better source of truth.
#[cfg(not(unix))]
fn default_executable_policy(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Options for walking a tree into an identifier.
#[derive(Clone, Copy)]
pub struct WalkOptions {
    executable_policy: ExecutablePolicy,
}

impl WalkOptions {
    pub fn new() -> Self {
        Self {
            executable_policy: default_executable_policy,
        }
    }

    /// Overrides the executable-bit predicate.
    pub fn executable_policy(mut self, policy: ExecutablePolicy) -> Self {
        self.executable_policy = policy;
        self
    }

    /// Computes the identifier of `path`: `cnt` for regular files and
    /// symlinks, `dir` for directories.
    pub async fn hash_path(&self, path: impl AsRef<Path>) -> Result<Swhid, SwhidError> {
        let (object_type, oid) = self.object_id(path.as_ref()).await?;
        Ok(Swhid::new(object_type, oid))
    }

    /// Classifies `path` and computes its Git object id.
    pub(crate) async fn object_id(&self, path: &Path) -> Result<(ObjectType, Oid), SwhidError> {
        let metadata = fs::symlink_metadata(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SwhidError::PathNotFound(path.to_owned())
            } else {
                SwhidError::Io {
                    context: format!("reading metadata of {}", path.display()),
                    source,
                }
            }
        })?;
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            return Ok((ObjectType::Content, symlink_oid(path).await?));
        }
        if file_type.is_file() {
            return Ok((ObjectType::Content, git::hash_blob_file(path).await?));
        }
        if !file_type.is_dir() {
            return Err(SwhidError::UnsupportedFileType(path.to_owned()));
        }

        let mut stack = vec![DirFrame {
            path: path.to_owned(),
            name: Vec::new(),
            pending: read_listing(path).await?,
            entries: Vec::new(),
        }];
        loop {
            let next = stack
                .last_mut()
                .expect("stack holds the root frame until it is hashed")
                .pending
                .next();
            match next {
                Some((name, child)) => {
                    let metadata =
                        fs::symlink_metadata(&child)
                            .await
                            .map_err(|source| SwhidError::Io {
                                context: format!("reading metadata of {}", child.display()),
                                source,
                            })?;
                    let file_type = metadata.file_type();
                    if file_type.is_symlink() {
                        let oid = symlink_oid(&child).await?;
                        push_entry(&mut stack, EntryMode::Symlink, name, oid);
                    } else if file_type.is_file() {
                        let mode = if (self.executable_policy)(&metadata) {
                            EntryMode::Executable
                        } else {
                            EntryMode::Regular
                        };
                        let oid = git::hash_blob_file(&child).await?;
                        push_entry(&mut stack, mode, name, oid);
                    } else if file_type.is_dir() {
                        let pending = read_listing(&child).await?;
                        stack.push(DirFrame {
                            path: child,
                            name,
                            pending,
                            entries: Vec::new(),
                        });
                    } else {
                        return Err(SwhidError::UnsupportedFileType(child));
                    }
                }
                None => {
                    let frame = stack.pop().expect("a frame was just borrowed");
                    let oid = git::hash_tree(frame.entries);
                    trace!(path = %frame.path.display(), %oid, "hashed tree");
                    match stack.last_mut() {
                        Some(parent) => parent.entries.push(TreeEntry {
                            mode: EntryMode::Directory,
                            name: frame.name,
                            oid,
                        }),
                        None => return Ok((ObjectType::Directory, oid)),
                    }
                }
            }
        }
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct DirFrame {
    path: PathBuf,
    /// Entry name within the parent directory; empty for the root.
    name: Vec<u8>,
    pending: vec::IntoIter<(Vec<u8>, PathBuf)>,
    entries: Vec<TreeEntry>,
}

fn push_entry(stack: &mut [DirFrame], mode: EntryMode, name: Vec<u8>, oid: Oid) {
    if let Some(frame) = stack.last_mut() {
        frame.entries.push(TreeEntry { mode, name, oid });
    }
}

async fn symlink_oid(path: &Path) -> Result<Oid, SwhidError> {
    let target = fs::read_link(path).await.map_err(|source| SwhidError::Io {
        context: format!("reading symlink target of {}", path.display()),
        source,
    })?;
    let target = <Vec<u8>>::from_os_string(target.into_os_string()).map_err(|os| SwhidError::Io {
        context: format!("reading symlink target of {}", path.display()),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("target {os:?} is not representable as bytes"),
        ),
    })?;
    Ok(git::hash_blob_bytes(&target))
}

/// Raw entry names of a directory. Order does not matter here; tree
/// hashing sorts by the Git rule.
async fn read_listing(path: &Path) -> Result<vec::IntoIter<(Vec<u8>, PathBuf)>, SwhidError> {
    let mut dir = fs::read_dir(path).await.map_err(|source| SwhidError::Io {
        context: format!("listing {}", path.display()),
        source,
    })?;
    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(|source| SwhidError::Io {
        context: format!("listing {}", path.display()),
        source,
    })? {
        let name = <Vec<u8>>::from_os_string(entry.file_name()).map_err(|os| {
            SwhidError::InvalidEntryName {
                dir: path.to_owned(),
                name: BString::from(os.to_string_lossy().into_owned().into_bytes()),
            }
        })?;
        if name.contains(&b'/') || name.contains(&b'\0') {
            return Err(SwhidError::InvalidEntryName {
                dir: path.to_owned(),
                name: BString::from(name),
            });
        }
        entries.push((name, entry.path()));
    }
    Ok(entries.into_iter())
}
