// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Materializing a parsed NAR stream onto disk.

use std::io;
use std::path::{Path, PathBuf};

use bstr::ByteSlice as _;
use derive_more::Display;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWriteExt as _};
use tracing::trace;

use crate::archive::parser::NarSink;

#[derive(Display, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum NarWriteOperation {
    #[display("creating directory")]
    CreateDirectory,
    #[display("creating symlink")]
    CreateSymlink,
    #[display("creating file")]
    CreateFile,
    #[display("path is not representable on this platform")]
    PathEncoding,
}

#[derive(Error, Debug)]
#[error("{operation} {}: {source}", .path.display())]
pub struct NarWriteError {
    operation: NarWriteOperation,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl NarWriteError {
    pub fn new(operation: NarWriteOperation, path: PathBuf, source: io::Error) -> Self {
        Self {
            operation,
            path,
            source,
        }
    }
    pub fn create_dir_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateDirectory, path, err)
    }
    pub fn create_symlink_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateSymlink, path, err)
    }
    pub fn create_file_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateFile, path, err)
    }
    pub fn path_encoding_error(path: PathBuf, err: bstr::Utf8Error) -> Self {
        Self::new(
            NarWriteOperation::PathEncoding,
            path,
            io::Error::new(io::ErrorKind::InvalidData, err),
        )
    }
}

/// A [`NarSink`] that writes each node to the filesystem under a
/// destination root.
///
/// Directories are created with mode 0755 (before umask), parents on
/// demand; regular files with mode 0666, or 0777 when the archive marks
/// them executable; a file already present where a symlink must go is
/// removed first, so extracting over a previous extraction works.
pub struct NarRestorer {
    path: PathBuf,
    dir_stack: Vec<PathBuf>,
}

impl NarRestorer {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            dir_stack: Vec::new(),
        }
    }
}

impl NarSink for NarRestorer {
    async fn file<R>(
        &mut self,
        name: &[u8],
        executable: bool,
        size: u64,
        reader: &mut R,
    ) -> Result<(), NarWriteError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let path = join_name(&self.path, name)?;
        trace!(path = %path.display(), size, executable, "restoring file");
        ensure_parent(&path)
            .await
            .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            if executable {
                options.mode(0o777);
            } else {
                options.mode(0o666);
            }
        }
        let mut file = options
            .open(&path)
            .await
            .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;
        loop {
            let buf = reader
                .fill_buf()
                .await
                .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;
            if buf.is_empty() {
                break;
            }
            let amt = buf.len();
            file.write_all(buf)
                .await
                .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;
            reader.consume(amt);
        }
        file.flush()
            .await
            .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;
        Ok(())
    }

    async fn symlink(&mut self, name: &[u8], target: &[u8]) -> Result<(), NarWriteError> {
        let path = join_name(&self.path, name)?;
        trace!(path = %path.display(), target = %target.as_bstr(), "restoring symlink");
        ensure_parent(&path)
            .await
            .map_err(|err| NarWriteError::create_symlink_error(path.clone(), err))?;

        // Repeat extraction: whatever sits at the destination is replaced.
        match tokio::fs::symlink_metadata(&path).await {
            Ok(_) => tokio::fs::remove_file(&path)
                .await
                .map_err(|err| NarWriteError::create_symlink_error(path.clone(), err))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(NarWriteError::create_symlink_error(path, err)),
        }

        let target_os = target
            .to_os_str()
            .map_err(|err| {
                let lossy = PathBuf::from(target.to_os_str_lossy().into_owned());
                NarWriteError::path_encoding_error(lossy, err)
            })?
            .to_owned();
        #[cfg(unix)]
        {
            tokio::fs::symlink(target_os, &path)
                .await
                .map_err(|err| NarWriteError::create_symlink_error(path, err))?;
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let _ = target_os;
            Err(NarWriteError::create_symlink_error(
                path,
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    "symlinks are not supported on this platform",
                ),
            ))
        }
    }

    async fn start_directory(&mut self, name: &[u8]) -> Result<(), NarWriteError> {
        let path = join_name(&self.path, name)?;
        trace!(path = %path.display(), "restoring directory");
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder
            .create(&path)
            .await
            .map_err(|err| NarWriteError::create_dir_error(path.clone(), err))?;
        self.dir_stack.push(std::mem::replace(&mut self.path, path));
        Ok(())
    }

    async fn end_directory(&mut self) -> Result<(), NarWriteError> {
        if let Some(parent) = self.dir_stack.pop() {
            self.path = parent;
        }
        Ok(())
    }
}

/// Creates the missing ancestors of `path` with mode 0755.
async fn ensure_parent(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(parent).await
}

fn join_name(path: &Path, name: &[u8]) -> Result<PathBuf, NarWriteError> {
    if name.is_empty() {
        Ok(path.to_owned())
    } else {
        let name_os = name.to_os_str().map_err(|err| {
            let lossy = name.to_os_str_lossy();
            NarWriteError::path_encoding_error(path.join(lossy), err)
        })?;
        Ok(path.join(name_os))
    }
}
