// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Parsing a NAR byte stream.
//!
//! [`parse_nar`] drives a [`NarSink`] with the nodes of one archive in
//! document order. The parser is an iterative state machine (archive depth
//! never grows the call stack), reads framed strings with per-role length
//! limits before allocating, and hands file bodies to the sink as a
//! length-bounded reader so they stream through in chunks.

use bstr::BString;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt as _};

use crate::ByteString;
use crate::archive::NAR_MAGIC;
use crate::archive::restorer::NarWriteError;
use crate::wire;

/// Longest accepted grammar keyword.
const MAX_TOKEN_LEN: u64 = 32;
/// Longest accepted directory entry name.
const MAX_NAME_LEN: u64 = 4096;
/// Longest accepted symlink target.
const MAX_TARGET_LEN: u64 = 4096;

#[derive(Error, Debug)]
pub enum NarParseError {
    #[error("not a NAR archive (magic string mismatch)")]
    Magic,

    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: BString,
    },

    #[error("unknown node type {0:?}")]
    UnknownNodeType(BString),

    #[error("framed string of {length} bytes exceeds the {limit}-byte limit")]
    StringTooLong { length: u64, limit: u64 },

    #[error("invalid entry name {0:?}")]
    InvalidEntryName(BString),

    #[error("non-zero padding byte")]
    Padding,

    #[error("unexpected end of archive")]
    UnexpectedEof,

    #[error("trailing bytes after end of archive")]
    TrailingData,

    #[error("reading archive: {0}")]
    Io(std::io::Error),

    #[error(transparent)]
    Write(#[from] NarWriteError),
}

fn read_error(err: std::io::Error) -> NarParseError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        NarParseError::UnexpectedEof
    } else {
        NarParseError::Io(err)
    }
}

/// Receives the nodes of a NAR stream in document order.
///
/// `name` is the entry name within the enclosing directory, and is empty
/// for the archive root. For a file the sink is handed a reader bounded to
/// exactly `size` bytes; whatever it leaves unread is drained by the
/// parser.
#[allow(async_fn_in_trait)]
pub trait NarSink {
    async fn file<R>(
        &mut self,
        name: &[u8],
        executable: bool,
        size: u64,
        reader: &mut R,
    ) -> Result<(), NarWriteError>
    where
        R: AsyncBufRead + Unpin + Send;

    async fn symlink(&mut self, name: &[u8], target: &[u8]) -> Result<(), NarWriteError>;

    async fn start_directory(&mut self, name: &[u8]) -> Result<(), NarWriteError>;

    async fn end_directory(&mut self) -> Result<(), NarWriteError>;
}

/// Reads one framed string of at most `limit` bytes, verifying that the
/// padding is zero.
async fn read_string<R>(reader: &mut R, limit: u64) -> Result<Bytes, NarParseError>
where
    R: AsyncRead + Unpin,
{
    let length = reader.read_u64_le().await.map_err(read_error)?;
    if length > limit {
        return Err(NarParseError::StringTooLong { length, limit });
    }
    let mut buf = vec![0u8; length as usize];
    reader.read_exact(&mut buf).await.map_err(read_error)?;
    read_padding(reader, length).await?;
    Ok(Bytes::from(buf))
}

async fn read_padding<R>(reader: &mut R, len: u64) -> Result<(), NarParseError>
where
    R: AsyncRead + Unpin,
{
    let padding = wire::calc_padding(len);
    if padding == 0 {
        return Ok(());
    }
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf[..padding])
        .await
        .map_err(read_error)?;
    if buf[..padding] != wire::ZEROS[..padding] {
        return Err(NarParseError::Padding);
    }
    Ok(())
}

async fn expect<R>(
    reader: &mut R,
    token: &'static [u8],
    what: &'static str,
) -> Result<(), NarParseError>
where
    R: AsyncRead + Unpin,
{
    let found = read_string(reader, MAX_TOKEN_LEN).await?;
    if &found[..] != token {
        return Err(NarParseError::UnexpectedToken {
            expected: what,
            found: BString::from(found.to_vec()),
        });
    }
    Ok(())
}

fn validate_entry_name(name: &[u8]) -> Result<(), NarParseError> {
    if name.is_empty()
        || name == b"."
        || name == b".."
        || name.contains(&b'/')
        || name.contains(&b'\0')
    {
        return Err(NarParseError::InvalidEntryName(BString::from(name)));
    }
    Ok(())
}

/// Parses one complete archive from `reader`, feeding each node to `sink`.
///
/// Consumes exactly the bytes of one archive; anything after the root node
/// is left in the reader for the caller to judge.
pub async fn parse_nar<R, S>(reader: &mut R, sink: &mut S) -> Result<(), NarParseError>
where
    R: AsyncBufRead + Unpin + Send,
    S: NarSink,
{
    let magic = read_string(reader, MAX_TOKEN_LEN).await?;
    if &magic[..] != NAR_MAGIC {
        return Err(NarParseError::Magic);
    }

    // Number of directory levels currently open, and the entry name of the
    // node about to be parsed (empty for the root).
    let mut depth = 0usize;
    let mut pending_name: ByteString = Bytes::new();

    'node: loop {
        expect(reader, b"(", "'('").await?;
        expect(reader, b"type", "'type'").await?;
        let node_type = read_string(reader, MAX_TOKEN_LEN).await?;
        let mut entered_directory = false;
        match &node_type[..] {
            b"regular" => {
                let mut token = read_string(reader, MAX_TOKEN_LEN).await?;
                let mut executable = false;
                if &token[..] == b"executable" {
                    let marker = read_string(reader, MAX_TOKEN_LEN).await?;
                    if !marker.is_empty() {
                        return Err(NarParseError::UnexpectedToken {
                            expected: "empty string after 'executable'",
                            found: BString::from(marker.to_vec()),
                        });
                    }
                    executable = true;
                    token = read_string(reader, MAX_TOKEN_LEN).await?;
                }
                if &token[..] != b"contents" {
                    return Err(NarParseError::UnexpectedToken {
                        expected: "'contents'",
                        found: BString::from(token.to_vec()),
                    });
                }
                let size = reader.read_u64_le().await.map_err(read_error)?;
                let mut body = (&mut *reader).take(size);
                sink.file(&pending_name, executable, size, &mut body).await?;
                // Drain whatever the sink left unread.
                tokio::io::copy(&mut body, &mut tokio::io::sink())
                    .await
                    .map_err(read_error)?;
                if body.limit() > 0 {
                    return Err(NarParseError::UnexpectedEof);
                }
                read_padding(reader, size).await?;
                expect(reader, b")", "')'").await?;
            }
            b"symlink" => {
                expect(reader, b"target", "'target'").await?;
                let target = read_string(reader, MAX_TARGET_LEN).await?;
                sink.symlink(&pending_name, &target).await?;
                expect(reader, b")", "')'").await?;
            }
            b"directory" => {
                sink.start_directory(&pending_name).await?;
                depth += 1;
                entered_directory = true;
            }
            _ => {
                return Err(NarParseError::UnknownNodeType(BString::from(
                    node_type.to_vec(),
                )));
            }
        }

        loop {
            if !entered_directory {
                if depth == 0 {
                    // The root node is complete.
                    break 'node;
                }
                // A child node is complete: close its 'entry' wrapper.
                expect(reader, b")", "')'").await?;
            }
            entered_directory = false;
            let token = read_string(reader, MAX_TOKEN_LEN).await?;
            match &token[..] {
                b")" => {
                    sink.end_directory().await?;
                    depth -= 1;
                    if depth == 0 {
                        break 'node;
                    }
                    // Close the entry wrapper of the directory we left.
                    continue;
                }
                b"entry" => {
                    expect(reader, b"(", "'('").await?;
                    expect(reader, b"name", "'name'").await?;
                    let name = read_string(reader, MAX_NAME_LEN).await?;
                    validate_entry_name(&name)?;
                    expect(reader, b"node", "'node'").await?;
                    pending_name = name;
                    continue 'node;
                }
                _ => {
                    return Err(NarParseError::UnexpectedToken {
                        expected: "'entry' or ')'",
                        found: BString::from(token.to_vec()),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod unittests {
    use tempfile::TempDir;

    use super::*;
    use crate::archive::dump;
    use crate::test::{CollectSink, TestEvent, fixture_tree, push_token};

    async fn parse_to_events(archive: &[u8]) -> Result<Vec<TestEvent>, NarParseError> {
        let mut reader = archive;
        let mut sink = CollectSink::default();
        parse_nar(&mut reader, &mut sink).await?;
        Ok(sink.events)
    }

    #[tokio::test]
    async fn parses_dumped_tree() {
        let dir = TempDir::new().unwrap();
        let root = fixture_tree(dir.path());
        let mut archive = Vec::new();
        dump(&root, &mut archive).await.unwrap();

        let events = parse_to_events(&archive).await.unwrap();
        assert_eq!(
            events,
            vec![
                TestEvent::StartDirectory { name: b"".to_vec() },
                TestEvent::File {
                    name: b"a".to_vec(),
                    executable: false,
                    contents: b"Hello World!\n".to_vec(),
                },
                TestEvent::StartDirectory {
                    name: b"ab".to_vec()
                },
                TestEvent::Symlink {
                    name: b"x".to_vec(),
                    target: b"../a".to_vec(),
                },
                TestEvent::EndDirectory,
                TestEvent::File {
                    name: b"script".to_vec(),
                    executable: true,
                    contents: b"#!/bin/sh\necho hi\n".to_vec(),
                },
                TestEvent::EndDirectory,
            ]
        );
    }

    #[tokio::test]
    async fn parses_root_file() {
        let mut archive = Vec::new();
        for token in [
            &b"nix-archive-1"[..],
            b"(",
            b"type",
            b"regular",
            b"contents",
            b"payload",
            b")",
        ] {
            push_token(&mut archive, token);
        }
        let events = parse_to_events(&archive).await.unwrap();
        assert_eq!(
            events,
            vec![TestEvent::File {
                name: b"".to_vec(),
                executable: false,
                contents: b"payload".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let mut archive = Vec::new();
        push_token(&mut archive, b"not-an-archive");
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::Magic)
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_node_type() {
        let mut archive = Vec::new();
        for token in [&b"nix-archive-1"[..], b"(", b"type", b"hardlink"] {
            push_token(&mut archive, token);
        }
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::UnknownNodeType(_))
        ));
    }

    #[tokio::test]
    async fn rejects_entry_name_with_slash() {
        let mut archive = Vec::new();
        for token in [
            &b"nix-archive-1"[..],
            b"(",
            b"type",
            b"directory",
            b"entry",
            b"(",
            b"name",
            b"evil/name",
        ] {
            push_token(&mut archive, token);
        }
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::InvalidEntryName(_))
        ));
    }

    #[tokio::test]
    async fn rejects_dot_dot_entry_name() {
        let mut archive = Vec::new();
        for token in [
            &b"nix-archive-1"[..],
            b"(",
            b"type",
            b"directory",
            b"entry",
            b"(",
            b"name",
            b"..",
        ] {
            push_token(&mut archive, token);
        }
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::InvalidEntryName(_))
        ));
    }

    #[tokio::test]
    async fn rejects_nonzero_padding() {
        let mut archive = Vec::new();
        push_token(&mut archive, b"nix-archive-1");
        archive.extend_from_slice(&1u64.to_le_bytes());
        archive.push(b'(');
        archive.extend_from_slice(&[0xff; 7]);
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::Padding)
        ));
    }

    #[tokio::test]
    async fn rejects_truncated_stream() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"0123456789").unwrap();
        let mut archive = Vec::new();
        dump(&file, &mut archive).await.unwrap();
        archive.truncate(archive.len() - 9);
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn rejects_oversized_string() {
        let mut archive = Vec::new();
        push_token(&mut archive, b"nix-archive-1");
        archive.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::StringTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_contents_outside_regular_node() {
        let mut archive = Vec::new();
        for token in [&b"nix-archive-1"[..], b"(", b"type", b"directory", b"contents"] {
            push_token(&mut archive, token);
        }
        assert!(matches!(
            parse_to_events(&archive).await,
            Err(NarParseError::UnexpectedToken { .. })
        ));
    }

    #[tokio::test]
    async fn leaves_trailing_bytes_in_reader() {
        let mut archive = Vec::new();
        for token in [
            &b"nix-archive-1"[..],
            b"(",
            b"type",
            b"symlink",
            b"target",
            b"somewhere",
            b")",
        ] {
            push_token(&mut archive, token);
        }
        archive.extend_from_slice(b"garbage");
        let mut reader = &archive[..];
        let mut sink = CollectSink::default();
        parse_nar(&mut reader, &mut sink).await.unwrap();
        assert_eq!(reader, b"garbage");
    }
}
