// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! High-level archive operations: hashing, streaming, writing archive
//! files, and extraction.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _};

use sylva_utils_hash::{Algorithm, HashBundle, HashSink};

use crate::archive::{
    FILE_CHUNK_SIZE, NarByteStream, NarDumpError, NarParseError, NarRestorer, NarWriteError, dump,
    parse_nar,
};

#[derive(Error, Debug)]
pub enum NarError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error(transparent)]
    Dump(#[from] NarDumpError),

    #[error(transparent)]
    Parse(#[from] NarParseError),

    #[error(transparent)]
    Restore(#[from] NarWriteError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// SRI-rendered SHA-256 of the canonical archive of `path`, the usual
/// "hash of a path".
pub async fn hash_path(path: impl AsRef<Path>) -> Result<String, NarError> {
    Ok(compute_hashes(path, Algorithm::SHA256).await?.sri)
}

/// Digest of the canonical archive of `path`, rendered in every supported
/// encoding.
pub async fn compute_hashes(
    path: impl AsRef<Path>,
    algorithm: Algorithm,
) -> Result<HashBundle, NarError> {
    let mut sink = HashSink::new(algorithm);
    dump(path, &mut sink).await?;
    let (_size, hash) = sink.finish();
    Ok(hash.bundle())
}

/// The canonical archive of `path` as a chunked byte stream.
pub fn stream(path: impl Into<PathBuf>) -> NarByteStream {
    NarByteStream::new(path.into())
}

/// Archives `path` into the file at `destination`, atomically.
///
/// Bytes stream into a temporary file in the destination directory which
/// is renamed into place only once the archive is complete; on any failure
/// the temporary file is removed and the destination is untouched.
pub async fn write_to_file(
    path: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<(), NarError> {
    let destination = destination.as_ref();
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (file, temp_path) = tempfile::NamedTempFile::new_in(dir)
        .map_err(|source| NarError::Io {
            context: format!("creating temporary file in {}", dir.display()),
            source,
        })?
        .into_parts();

    // Any failure from here on drops `temp_path`, unlinking the temporary.
    let mut writer = tokio::fs::File::from_std(file);
    dump(path, &mut writer).await?;
    writer.sync_all().await.map_err(|source| NarError::Io {
        context: format!("syncing {}", temp_path.display()),
        source,
    })?;
    drop(writer);

    temp_path
        .persist(destination)
        .map_err(|err| NarError::Io {
            context: format!("renaming into {}", destination.display()),
            source: err.error,
        })?;
    Ok(())
}

/// Streams the canonical archive of `path` to standard output.
pub async fn write_stdout(path: impl AsRef<Path>) -> Result<(), NarError> {
    let mut stdout = tokio::io::stdout();
    dump(path, &mut stdout).await?;
    stdout.flush().await.map_err(|source| NarError::Io {
        context: "flushing stdout".into(),
        source,
    })?;
    Ok(())
}

/// Extracts the archive file at `archive` into `destination`.
///
/// Fails on the first invalid byte or filesystem error; a partially
/// materialized tree is left in place for the caller to clean up.
pub async fn extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<(), NarError> {
    let archive = archive.as_ref();
    let file = tokio::fs::File::open(archive).await.map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            NarError::PathNotFound(archive.to_owned())
        } else {
            NarError::Io {
                context: format!("opening {}", archive.display()),
                source,
            }
        }
    })?;
    let mut reader = tokio::io::BufReader::with_capacity(FILE_CHUNK_SIZE, file);

    let mut restorer = NarRestorer::new(destination.as_ref());
    parse_nar(&mut reader, &mut restorer).await?;

    let trailing = reader.fill_buf().await.map_err(|source| NarError::Io {
        context: format!("reading {}", archive.display()),
        source,
    })?;
    if !trailing.is_empty() {
        return Err(NarParseError::TrailingData.into());
    }
    Ok(())
}

#[cfg(test)]
mod unittests {
    use tempfile::TempDir;

    use super::*;
    use crate::archive::dump;
    use crate::test::fixture_tree;

    #[tokio::test]
    async fn hash_path_known_answer() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hello");
        std::fs::write(&file, b"Hello World!\n").unwrap();
        assert_eq!(
            hash_path(&file).await.unwrap(),
            "sha256-O10uvOJfh8DTewsEX93TDfkI6iCt6ohRNx8wITd0Lq8="
        );
    }

    #[tokio::test]
    async fn compute_hashes_bundles_every_encoding() {
        let dir = TempDir::new().unwrap();
        let root = fixture_tree(dir.path());
        let bundle = compute_hashes(&root, Algorithm::SHA256).await.unwrap();
        assert_eq!(
            bundle.hex,
            "7850955cdd86892963dfabc0b0364dfa14d334ec65f053b144bcb6eb7de8e9a5"
        );
        assert_eq!(
            bundle.sri,
            "sha256-eFCVXN2GiSlj36vAsDZN+hTTNOxl8FOxRLy2633o6aU="
        );
        assert_eq!(
            bundle.nix32,
            "19g9x1yypdmw8jqm7w35xhsd657s9lvb1h5bvxijk2c6vmf9al3q"
        );
        assert_eq!(bundle.hash.algorithm(), Algorithm::SHA256);
    }

    #[tokio::test]
    async fn compute_hashes_sha1() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"abc").unwrap();
        let bundle = compute_hashes(&file, Algorithm::SHA1).await.unwrap();
        assert_eq!(bundle.hash.algorithm(), Algorithm::SHA1);
        assert_eq!(bundle.hex.len(), 40);
    }

    #[tokio::test]
    async fn write_then_extract_round_trips() {
        let dir = TempDir::new().unwrap();
        let root = fixture_tree(dir.path());
        // Deepen the fixture: a third level and an empty directory.
        std::fs::create_dir_all(root.join("ab").join("deep").join("empty")).unwrap();
        std::fs::write(root.join("ab").join("deep").join("f"), b"leaf").unwrap();
        let archive = dir.path().join("tree.nar");
        write_to_file(&root, &archive).await.unwrap();

        let restored = dir.path().join("restored");
        extract(&archive, &restored).await.unwrap();

        assert_eq!(
            hash_path(&root).await.unwrap(),
            hash_path(&restored).await.unwrap()
        );
    }

    #[tokio::test]
    async fn write_leaves_only_the_destination_behind() {
        let source = TempDir::new().unwrap();
        let root = fixture_tree(source.path());
        let out = TempDir::new().unwrap();
        let archive = out.path().join("tree.nar");
        write_to_file(&root, &archive).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("tree.nar")]);

        let mut expected = Vec::new();
        dump(&root, &mut expected).await.unwrap();
        assert_eq!(std::fs::read(&archive).unwrap(), expected);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_artifacts() {
        let out = TempDir::new().unwrap();
        let archive = out.path().join("tree.nar");
        let err = write_to_file(out.path().join("missing"), &archive).await;
        assert!(err.is_err());
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn extract_rejects_trailing_bytes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"body").unwrap();
        let archive = dir.path().join("f.nar");
        write_to_file(&file, &archive).await.unwrap();

        let mut bytes = std::fs::read(&archive).unwrap();
        bytes.push(0);
        std::fs::write(&archive, &bytes).unwrap();

        let err = extract(&archive, dir.path().join("out")).await.unwrap_err();
        assert!(matches!(
            err,
            NarError::Parse(NarParseError::TrailingData)
        ));
    }

    #[tokio::test]
    async fn extract_missing_archive_is_path_not_found() {
        let dir = TempDir::new().unwrap();
        let err = extract(dir.path().join("nope.nar"), dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, NarError::PathNotFound(_)));
    }
}
