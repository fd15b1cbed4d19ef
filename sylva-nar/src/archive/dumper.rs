// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Dumping a filesystem tree into the canonical NAR byte stream.
//!
//! The dumper walks the tree iteratively (an explicit stack of directory
//! listings, so archive depth is bounded by memory rather than the call
//! stack) and writes framed strings directly into any [`AsyncWrite`]. File
//! bodies are streamed in fixed-size chunks; the whole archive is never
//! buffered.
//!
//! [`AsyncWrite`]: tokio::io::AsyncWrite

use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use bstr::{BString, ByteVec as _};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tracing::trace;

use crate::archive::{FILE_CHUNK_SIZE, NAR_MAGIC};
use crate::wire;

#[derive(Error, Debug)]
pub enum NarDumpError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("refusing to archive {}: not a regular file, directory, or symlink", .0.display())]
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

impl NarDumpError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> NarDumpError {
        let context = context.into();
        move |source| NarDumpError::Io { context, source }
    }
}

fn write_error(source: io::Error) -> NarDumpError {
    NarDumpError::Io {
        context: "writing archive".into(),
        source,
    }
}

/// Decides whether a file is marked executable in the archive, given its
/// metadata.
pub type ExecutablePolicy = fn(&std::fs::Metadata) -> bool;

/// Owner-execute bit on Unix.
#[cfg(unix)]
fn default_executable_policy(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    metadata.permissions().mode() & 0o100 != 0
}

/// Platforms without an executable bit archive everything as
/// non-executable; override with [`DumpOptions::executable_policy`] if the
/// caller has a better source of truth.
#[cfg(not(unix))]
fn default_executable_policy(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Options for [`dump`].
#[derive(Clone, Copy)]
pub struct DumpOptions {
    executable_policy: ExecutablePolicy,
}

impl DumpOptions {
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

    /// Writes the canonical archive of `path` into `writer`.
    pub async fn dump<P, W>(self, path: P, writer: &mut W) -> Result<(), NarDumpError>
    where
        P: AsRef<Path>,
        W: AsyncWrite + Unpin,
    {
        let root = path.as_ref();
        let metadata = fs::symlink_metadata(root).await.map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                NarDumpError::PathNotFound(root.to_owned())
            } else {
                NarDumpError::Io {
                    context: format!("reading metadata of {}", root.display()),
                    source,
                }
            }
        })?;

        let mut encoder = NarEncoder::new(writer);
        encoder.token(NAR_MAGIC).await.map_err(write_error)?;

        // Directories whose listings are still being emitted, innermost last.
        let mut stack: Vec<vec::IntoIter<(Vec<u8>, PathBuf)>> = Vec::new();

        if let Some(listing) = self.emit_node(&mut encoder, root, &metadata).await? {
            stack.push(listing);
        }
        while let Some(dir) = stack.last_mut() {
            match dir.next() {
                Some((name, child)) => {
                    for token in [&b"entry"[..], &b"("[..], &b"name"[..], &name[..], &b"node"[..]] {
                        encoder.token(token).await.map_err(write_error)?;
                    }
                    let metadata = fs::symlink_metadata(&child)
                        .await
                        .map_err(NarDumpError::io(format!(
                            "reading metadata of {}",
                            child.display()
                        )))?;
                    if let Some(listing) = self.emit_node(&mut encoder, &child, &metadata).await? {
                        stack.push(listing);
                    } else {
                        // Close the entry of a leaf child.
                        encoder.token(b")").await.map_err(write_error)?;
                    }
                }
                None => {
                    // Close the directory node, and the entry holding it.
                    encoder.token(b")").await.map_err(write_error)?;
                    stack.pop();
                    if !stack.is_empty() {
                        encoder.token(b")").await.map_err(write_error)?;
                    }
                }
            }
        }
        encoder.writer.flush().await.map_err(write_error)
    }

    /// Emits one node. Leaves are written completely (including the
    /// closing parenthesis); for a directory the header is written and the
    /// sorted listing is returned for the caller to drive.
    async fn emit_node<W>(
        &self,
        encoder: &mut NarEncoder<W>,
        path: &Path,
        metadata: &std::fs::Metadata,
    ) -> Result<Option<vec::IntoIter<(Vec<u8>, PathBuf)>>, NarDumpError>
    where
        W: AsyncWrite + Unpin,
    {
        let file_type = metadata.file_type();
        encoder.token(b"(").await.map_err(write_error)?;
        encoder.token(b"type").await.map_err(write_error)?;

        if file_type.is_symlink() {
            trace!(path = %path.display(), "dumping symlink");
            encoder.token(b"symlink").await.map_err(write_error)?;
            encoder.token(b"target").await.map_err(write_error)?;
            let target = fs::read_link(path).await.map_err(NarDumpError::io(format!(
                "reading symlink target of {}",
                path.display()
            )))?;
            let target = <Vec<u8>>::from_os_string(target.into_os_string()).map_err(|os| {
                NarDumpError::Io {
                    context: format!("reading symlink target of {}", path.display()),
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("target {os:?} is not representable as bytes"),
                    ),
                }
            })?;
            encoder.token(&target).await.map_err(write_error)?;
            encoder.token(b")").await.map_err(write_error)?;
            Ok(None)
        } else if file_type.is_file() {
            let executable = (self.executable_policy)(metadata);
            trace!(path = %path.display(), executable, "dumping regular file");
            encoder.token(b"regular").await.map_err(write_error)?;
            if executable {
                encoder.token(b"executable").await.map_err(write_error)?;
                encoder.token(b"").await.map_err(write_error)?;
            }
            encoder.token(b"contents").await.map_err(write_error)?;
            emit_contents(encoder, path).await?;
            encoder.token(b")").await.map_err(write_error)?;
            Ok(None)
        } else if file_type.is_dir() {
            trace!(path = %path.display(), "dumping directory");
            encoder.token(b"directory").await.map_err(write_error)?;
            Ok(Some(read_sorted_listing(path).await?.into_iter()))
        } else {
            Err(NarDumpError::UnsupportedFileType(path.to_owned()))
        }
    }
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the canonical archive of `path` into `writer` with default
/// options.
pub async fn dump<P, W>(path: P, writer: &mut W) -> Result<(), NarDumpError>
where
    P: AsRef<Path>,
    W: AsyncWrite + Unpin,
{
    DumpOptions::new().dump(path, writer).await
}

struct NarEncoder<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> NarEncoder<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one framed string: little-endian length, payload, zero
    /// padding to the next 8-byte boundary.
    async fn token(&mut self, token: &[u8]) -> io::Result<()> {
        self.writer.write_u64_le(token.len() as u64).await?;
        self.writer.write_all(token).await?;
        self.pad(token.len() as u64).await
    }

    async fn pad(&mut self, len: u64) -> io::Result<()> {
        let padding = wire::calc_padding(len);
        if padding > 0 {
            self.writer.write_all(&wire::ZEROS[..padding]).await?;
        }
        Ok(())
    }
}

/// Streams one file body: length, raw bytes in [`FILE_CHUNK_SIZE`] slices,
/// padding. The size comes from the already-open handle, and the bytes
/// actually read must match it exactly.
async fn emit_contents<W>(encoder: &mut NarEncoder<W>, path: &Path) -> Result<(), NarDumpError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = fs::File::open(path)
        .await
        .map_err(NarDumpError::io(format!("opening {}", path.display())))?;
    let expected = file
        .metadata()
        .await
        .map_err(NarDumpError::io(format!(
            "reading metadata of {}",
            path.display()
        )))?
        .len();
    encoder
        .writer
        .write_u64_le(expected)
        .await
        .map_err(write_error)?;

    let mut buf = vec![0u8; FILE_CHUNK_SIZE];
    let mut actual = 0u64;
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(NarDumpError::io(format!("reading {}", path.display())))?;
        if n == 0 {
            break;
        }
        actual += n as u64;
        if actual > expected {
            return Err(NarDumpError::FileChanged {
                path: path.to_owned(),
                expected,
                actual,
            });
        }
        encoder
            .writer
            .write_all(&buf[..n])
            .await
            .map_err(write_error)?;
    }
    if actual != expected {
        return Err(NarDumpError::FileChanged {
            path: path.to_owned(),
            expected,
            actual,
        });
    }
    encoder.pad(expected).await.map_err(write_error)
}

/// Reads a directory listing as raw entry names, rejects names the format
/// cannot represent, and sorts byte-wise by basename. This sort is the
/// single place where ordering decides the archive hash.
async fn read_sorted_listing(path: &Path) -> Result<Vec<(Vec<u8>, PathBuf)>, NarDumpError> {
    let mut dir = fs::read_dir(path)
        .await
        .map_err(NarDumpError::io(format!("listing {}", path.display())))?;
    let mut entries = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(NarDumpError::io(format!("listing {}", path.display())))?
    {
        let name = <Vec<u8>>::from_os_string(entry.file_name()).map_err(|os| {
            NarDumpError::InvalidEntryName {
                dir: path.to_owned(),
                name: BString::from(os.to_string_lossy().into_owned().into_bytes()),
            }
        })?;
        if name.contains(&b'/') || name.contains(&b'\0') {
            return Err(NarDumpError::InvalidEntryName {
                dir: path.to_owned(),
                name: BString::from(name),
            });
        }
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
