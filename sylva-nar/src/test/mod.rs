// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Shared test fixtures and helpers.

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncReadExt as _};

use crate::archive::{NarSink, NarWriteError};
use crate::wire;


pub use arbitrary::{TestNode, arb_tree};

/// Appends one framed string to `buf`: length, payload, zero padding.
pub fn push_token(buf: &mut Vec<u8>, token: &[u8]) {
    buf.extend_from_slice(&(token.len() as u64).to_le_bytes());
    buf.extend_from_slice(token);
    buf.resize(buf.len() + wire::calc_padding(token.len() as u64), 0);
}

/// Writes `contents` to `path` with the owner-execute bit set.
pub fn write_executable(path: &Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

/// Builds the reference tree used across tests:
///
/// ```text
/// tree/
///   a         "Hello World!\n"
///   ab/
///     x       -> ../a
///   script    executable, "#!/bin/sh\necho hi\n"
/// ```
pub fn fixture_tree(base: &Path) -> PathBuf {
    let root = base.join("tree");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(root.join("a"), b"Hello World!\n").unwrap();
    std::fs::create_dir(root.join("ab")).unwrap();
    std::os::unix::fs::symlink("../a", root.join("ab").join("x")).unwrap();
    write_executable(&root.join("script"), b"#!/bin/sh\necho hi\n");
    root
}

/// What a [`CollectSink`] remembers about one node.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TestEvent {
    File {
        name: Vec<u8>,
        executable: bool,
        contents: Vec<u8>,
    },
    Symlink {
        name: Vec<u8>,
        target: Vec<u8>,
    },
    StartDirectory {
        name: Vec<u8>,
    },
    EndDirectory,
}

/// A [`NarSink`] that records every node, buffering file bodies.
#[derive(Default)]
pub struct CollectSink {
    pub events: Vec<TestEvent>,
}

impl NarSink for CollectSink {
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
        let mut contents = Vec::with_capacity(size as usize);
        reader
            .read_to_end(&mut contents)
            .await
            .map_err(|err| NarWriteError::create_file_error(PathBuf::from("<collect>"), err))?;
        self.events.push(TestEvent::File {
            name: name.to_vec(),
            executable,
            contents,
        });
        Ok(())
    }

    async fn symlink(&mut self, name: &[u8], target: &[u8]) -> Result<(), NarWriteError> {
        self.events.push(TestEvent::Symlink {
            name: name.to_vec(),
            target: target.to_vec(),
        });
        Ok(())
    }

    async fn start_directory(&mut self, name: &[u8]) -> Result<(), NarWriteError> {
        self.events
            .push(TestEvent::StartDirectory { name: name.to_vec() });
        Ok(())
    }

    async fn end_directory(&mut self) -> Result<(), NarWriteError> {
        self.events.push(TestEvent::EndDirectory);
        Ok(())
    }
}
