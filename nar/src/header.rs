use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::grammar::{self, MAX_PATH_LEN};
use crate::Error;

/// The three kinds of nodes a NAR can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Regular,
    Directory,
    Symlink,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::Regular => "regular",
            NodeType::Directory => "directory",
            NodeType::Symlink => "symlink",
        })
    }
}

/// Describes a single node of an archive, as produced by the
/// [crate::reader::Decoder] and consumed by the [crate::writer::Encoder].
///
/// `path` is relative to the root of the archive and slash-separated. The
/// root node itself has the empty path.
///
/// Fields that don't apply to `kind` must be left empty: `size` and
/// `executable` only apply to [NodeType::Regular], `link_target` only to
/// [NodeType::Symlink].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub path: BString,
    pub kind: NodeType,
    pub size: u64,
    pub executable: bool,
    pub link_target: BString,
}

impl Header {
    pub fn regular(path: impl Into<BString>, size: u64, executable: bool) -> Self {
        Self {
            path: path.into(),
            kind: NodeType::Regular,
            size,
            executable,
            link_target: BString::default(),
        }
    }

    pub fn directory(path: impl Into<BString>) -> Self {
        Self {
            path: path.into(),
            kind: NodeType::Directory,
            size: 0,
            executable: false,
            link_target: BString::default(),
        }
    }

    pub fn symlink(path: impl Into<BString>, target: impl Into<BString>) -> Self {
        Self {
            path: path.into(),
            kind: NodeType::Symlink,
            size: 0,
            executable: false,
            link_target: target.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The last path component, which is empty for the root.
    pub fn name(&self) -> &BStr {
        split_path(self.path.as_ref()).1
    }

    /// The path of the containing directory, or [None] for the root.
    pub fn parent(&self) -> Option<&BStr> {
        (!self.is_root()).then(|| split_path(self.path.as_ref()).0)
    }

    /// Check the path syntax and that only the fields applicable to `kind`
    /// are set.
    pub fn validate(&self) -> Result<(), Error> {
        validate_path(self.path.as_ref())?;

        let invalid = |reason| {
            Err(Error::InvalidHeader {
                path: self.path.clone(),
                reason,
            })
        };

        match self.kind {
            NodeType::Regular => {
                if !self.link_target.is_empty() {
                    return invalid("regular file with a link target");
                }
            }
            NodeType::Directory => {
                if self.size != 0 || self.executable || !self.link_target.is_empty() {
                    return invalid("directory with size, executable bit or link target");
                }
            }
            NodeType::Symlink => {
                if self.size != 0 || self.executable {
                    return invalid("symlink with size or executable bit");
                }
                if !grammar::is_valid_target(&self.link_target) {
                    return invalid("symlink target is empty, too long or contains NUL");
                }
            }
        }

        Ok(())
    }
}

/// Splits a relative path into its parent and its last component.
/// The root (empty path) splits into two empty strings.
pub(crate) fn split_path(path: &BStr) -> (&BStr, &BStr) {
    match path.rfind_byte(b'/') {
        Some(i) => (path[..i].as_bstr(), path[i + 1..].as_bstr()),
        None => (b"".as_bstr(), path),
    }
}

/// Joins a directory path and an entry name.
pub(crate) fn join_path(dir: &BStr, name: &BStr) -> BString {
    if dir.is_empty() {
        return name.to_owned();
    }

    let mut path = BString::from(Vec::with_capacity(dir.len() + 1 + name.len()));
    path.extend_from_slice(dir);
    path.push(b'/');
    path.extend_from_slice(name);
    path
}

/// Returns true if `path` is a strict descendant of the directory `dir`.
pub(crate) fn is_descendant(dir: &BStr, path: &BStr) -> bool {
    if dir.is_empty() {
        return !path.is_empty();
    }

    path.len() > dir.len() && path.starts_with(dir) && path[dir.len()] == b'/'
}

/// A path is valid if it's empty (the root), or a sequence of valid names
/// separated by single slashes.
pub(crate) fn validate_path(path: &BStr) -> Result<(), Error> {
    if path.len() > MAX_PATH_LEN {
        return Err(Error::InvalidName(path.to_owned()));
    }

    if path.is_empty() {
        return Ok(());
    }

    if !path.split_str("/").all(grammar::is_valid_name) {
        return Err(Error::InvalidName(path.to_owned()));
    }

    Ok(())
}
