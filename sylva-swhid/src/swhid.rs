// SPDX-FileCopyrightText: 2026 The sylva authors
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! The identifier value type and its string rendering.

use std::fmt;

use derive_more::Display;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};

use crate::git::Oid;

/// Bytes escaped in qualifier values: everything outside the unreserved
/// set `[A-Za-z0-9._~-]`.
const QUALIFIER_VALUE: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The kind of filesystem object an identifier refers to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// File contents: a regular file, or a symlink target.
    #[display("cnt")]
    Content,
    /// A directory tree.
    #[display("dir")]
    Directory,
}

impl ObjectType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Content => "cnt",
            ObjectType::Directory => "dir",
        }
    }
}

/// A Software Heritage persistent identifier for a filesystem object.
///
/// Renders as `swh:1:<ctx>:<oid>`, followed by `;key=value` qualifiers in
/// insertion order, with values percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swhid {
    object_type: ObjectType,
    oid: Oid,
    qualifiers: Vec<(String, String)>,
}

impl Swhid {
    pub fn new(object_type: ObjectType, oid: Oid) -> Self {
        Self {
            object_type,
            oid,
            qualifiers: Vec::new(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Appends a qualifier. Qualifiers render in the order they were
    /// added.
    pub fn with_qualifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.qualifiers.push((key.into(), value.into()));
        self
    }

    pub fn qualifiers(&self) -> &[(String, String)] {
        &self.qualifiers
    }
}

impl fmt::Display for Swhid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swh:1:{}:{}", self.object_type, self.oid)?;
        for (key, value) in &self.qualifiers {
            write!(
                f,
                ";{key}={}",
                percent_encode(value.as_bytes(), &QUALIFIER_VALUE)
            )?;
        }
        Ok(())
    }
}
