//! Serialize a path on the local filesystem into a NAR.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use bstr::BString;
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::{Encoder, Error, Header, NodeType};

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("unable to stat {0}: {1}")]
    UnableToStat(PathBuf, io::Error),

    #[error("unable to open {0}: {1}")]
    UnableToOpen(PathBuf, io::Error),

    #[error("unable to read {0}: {1}")]
    UnableToRead(PathBuf, io::Error),

    #[error("unsupported file type at {0}")]
    UnsupportedNodeKind(PathBuf),

    /// `actual` is `expected + 1` if there was more to read than expected.
    #[error("{path} changed while dumping: expected {expected} bytes, read {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Encoder(#[from] Error),
}

type Filter<'a> = Box<dyn FnMut(&Path, NodeType) -> bool + 'a>;

/// Options for dumping a path.
///
/// The filter receives the filesystem path of every node, including the
/// root, before it is visited. Rejecting a directory excludes its whole
/// subtree.
#[derive(Default)]
pub struct DumpOptions<'a> {
    filter: Option<Filter<'a>>,
}

impl<'a> DumpOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, f: impl FnMut(&Path, NodeType) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Write a complete NAR of `path` to `w`, and give back `w`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn dump<P: AsRef<Path>, W: Write>(self, path: P, w: W) -> Result<W, DumpError> {
        let mut enc = Encoder::new(w)?;
        self.dump_into(&mut enc, path.as_ref())?;
        enc.close()?;

        Ok(enc.into_inner())
    }

    /// Write the nodes below `path` to an existing encoder, without closing
    /// it.
    ///
    /// Nodes are visited depth-first, with the entries of each directory in
    /// byte-wise order of their names. Symlinks are never followed, not
    /// even at the root.
    pub fn dump_into<W: Write>(self, enc: &mut Encoder<W>, path: &Path) -> Result<(), DumpError> {
        let mut filter = self.filter;

        let walker = WalkDir::new(path)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                match (node_type(entry), filter.as_mut()) {
                    (Some(kind), Some(f)) => f(entry.path(), kind),
                    // unsupported nodes are left for dump_entry to reject.
                    _ => true,
                }
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let p = e.path().unwrap_or(path).to_path_buf();
                DumpError::UnableToStat(p, e.into())
            })?;

            dump_entry(enc, path, &entry)?;
        }

        Ok(())
    }
}

/// Write a complete NAR of `path` to `w`, and give back `w`.
pub fn dump<P: AsRef<Path>, W: Write>(path: P, w: W) -> Result<W, DumpError> {
    DumpOptions::new().dump(path, w)
}

/// Like [dump], skipping every node `filter` returns false for.
pub fn dump_filtered<P, W, F>(path: P, w: W, filter: F) -> Result<W, DumpError>
where
    P: AsRef<Path>,
    W: Write,
    F: FnMut(&Path, NodeType) -> bool,
{
    DumpOptions::new().filter(filter).dump(path, w)
}

fn node_type(entry: &DirEntry) -> Option<NodeType> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        Some(NodeType::Directory)
    } else if file_type.is_symlink() {
        Some(NodeType::Symlink)
    } else if file_type.is_file() {
        Some(NodeType::Regular)
    } else {
        None
    }
}

fn dump_entry<W: Write>(enc: &mut Encoder<W>, root: &Path, entry: &DirEntry) -> Result<(), DumpError> {
    let archive_path = BString::from(
        entry
            .path()
            .strip_prefix(root)
            .expect("walked path must be below the root")
            .as_os_str()
            .as_bytes(),
    );

    debug!(path = %entry.path().display(), "dumping");

    match node_type(entry) {
        Some(NodeType::Directory) => enc.write_header(&Header::directory(archive_path))?,
        Some(NodeType::Symlink) => {
            let target = fs::read_link(entry.path())
                .map_err(|e| DumpError::UnableToStat(entry.path().to_path_buf(), e))?;

            enc.write_header(&Header::symlink(
                archive_path,
                target.into_os_string().into_vec(),
            ))?
        }
        Some(NodeType::Regular) => {
            let metadata = entry
                .metadata()
                .map_err(|e| DumpError::UnableToStat(entry.path().to_path_buf(), e.into()))?;

            let size = metadata.len();
            // If it's executable by the user, it'll become executable.
            let executable = metadata.permissions().mode() & 0o100 != 0;

            let file = File::open(entry.path())
                .map_err(|e| DumpError::UnableToOpen(entry.path().to_path_buf(), e))?;

            enc.write_header(&Header::regular(archive_path, size, executable))?;
            copy_contents(enc, file, entry.path(), size)?;
        }
        None => return Err(DumpError::UnsupportedNodeKind(entry.path().to_path_buf())),
    }

    Ok(())
}

/// Copy exactly `size` bytes of `r` into the encoder. A reader ending early,
/// or still having data afterwards, is a [DumpError::SizeMismatch].
fn copy_contents<R: Read, W: Write>(
    enc: &mut Encoder<W>,
    mut r: R,
    path: &Path,
    size: u64,
) -> Result<(), DumpError> {
    let actual = io::copy(&mut r.by_ref().take(size), enc).map_err(|e| match e.downcast::<Error>() {
        Ok(e) => DumpError::Encoder(e),
        Err(e) => DumpError::UnableToRead(path.to_path_buf(), e),
    })?;

    let mismatch = |actual| DumpError::SizeMismatch {
        path: path.to_path_buf(),
        expected: size,
        actual,
    };

    if actual != size {
        return Err(mismatch(actual));
    }

    // procfs and friends report a size of 0 for files with contents.
    let mut extra = [0u8; 1];
    loop {
        match r.read(&mut extra) {
            Ok(0) => return Ok(()),
            Ok(_) => return Err(mismatch(size + 1)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DumpError::UnableToRead(path.to_path_buf(), e)),
        }
    }
}
