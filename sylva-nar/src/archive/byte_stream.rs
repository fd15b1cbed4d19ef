// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::archive::dumper::DumpOptions;

/// Default size of the yielded [`Bytes`] chunks (64 KiB).
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// The pipe buffers a few chunks' worth of encoded bytes, so the encoder
/// can work ahead of a slow consumer without unbounded memory growth.
const PIPE_CHUNKS: usize = 4;

/// A [`Stream`] of [`Bytes`] chunks holding the canonical archive of a
/// path.
///
/// A spawned task encodes into one end of an in-memory pipe while this
/// stream reads chunks off the other end, so encoding overlaps with
/// whatever the consumer does with the chunks; the pipe's fixed capacity
/// is the back-pressure. A dump failure is delivered through the stream as
/// an [`io::Error`] item after any chunks already encoded.
pub struct NarByteStream {
    chunks: ReaderStream<DuplexStream>,
    dump_error: Option<oneshot::Receiver<io::Error>>,
}

impl NarByteStream {
    /// Streams the archive of `path` in chunks of the default size.
    pub fn new(path: PathBuf) -> Self {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    /// Streams the archive of `path` with a custom chunk size.
    pub fn with_chunk_size(path: PathBuf, chunk_size: usize) -> Self {
        let (reader, mut writer) = tokio::io::duplex(chunk_size.max(1) * PIPE_CHUNKS);
        let (error_tx, error_rx) = oneshot::channel();

        tokio::task::spawn(async move {
            if let Err(err) = DumpOptions::new().dump(&path, &mut writer).await {
                debug!(path = %path.display(), "archive stream failed: {err}");
                let _ = error_tx.send(io::Error::other(err));
            }
            // Dropping the writer closes the pipe; the error, if any, is
            // already in place by then.
        });

        Self {
            chunks: ReaderStream::with_capacity(reader, chunk_size),
            dump_error: Some(error_rx),
        }
    }
}

impl Stream for NarByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = ready!(Pin::new(&mut self.chunks).poll_next(cx)) {
            return Poll::Ready(Some(item));
        }
        // The pipe is closed; report a dump failure exactly once.
        match self.dump_error.take().map(|mut rx| rx.try_recv()) {
            Some(Ok(err)) => Poll::Ready(Some(Err(err))),
            _ => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod unittests {
    use futures::StreamExt as _;
    use tempfile::TempDir;

    use super::*;
    use crate::archive::dump;
    use crate::test::fixture_tree;

    #[tokio::test]
    async fn chunks_concatenate_to_the_archive() {
        let dir = TempDir::new().unwrap();
        let root = fixture_tree(dir.path());

        let mut expected = Vec::new();
        dump(&root, &mut expected).await.unwrap();

        let mut stream = NarByteStream::with_chunk_size(root, 16);
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn chunks_respect_the_requested_size() {
        let dir = TempDir::new().unwrap();
        let root = fixture_tree(dir.path());

        let mut stream = NarByteStream::with_chunk_size(root, 16);
        while let Some(chunk) = stream.next().await {
            assert!(chunk.unwrap().len() <= 16);
        }
    }

    #[tokio::test]
    async fn dump_failure_surfaces_as_stream_error() {
        let dir = TempDir::new().unwrap();
        let mut stream = NarByteStream::new(dir.path().join("missing"));
        let first = stream.next().await.unwrap();
        assert!(first.is_err());
        assert!(stream.next().await.is_none());
    }
}
