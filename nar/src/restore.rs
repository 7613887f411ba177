//! Unpack a NAR onto the local filesystem.

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::{Decoder, Error, NodeType};

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("destination {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("unable to create {0}: {1}")]
    UnableToCreate(PathBuf, io::Error),

    #[error("unable to write {0}: {1}")]
    UnableToWrite(PathBuf, io::Error),

    #[error(transparent)]
    Decoder(#[from] Error),
}

/// Materialize the rest of the archive read by `dec` at `dest`, which must
/// not exist yet.
///
/// Regular files are created with mode 0o755 if they're executable, 0o644
/// otherwise (subject to the umask). On error, whatever has been written so
/// far is left in place.
#[instrument(skip(dec), fields(dest = %dest.as_ref().display()), err)]
pub fn restore<R: Read, P: AsRef<Path>>(dec: &mut Decoder<R>, dest: P) -> Result<(), RestoreError> {
    let dest = dest.as_ref();

    if dest.symlink_metadata().is_ok() {
        return Err(RestoreError::AlreadyExists(dest.to_path_buf()));
    }

    while let Some(header) = dec.next()? {
        // Paths coming out of the decoder never contain "." or ".."
        // components, so joining can't escape dest.
        let path = if header.is_root() {
            dest.to_path_buf()
        } else {
            dest.join(OsStr::from_bytes(&header.path))
        };

        match header.kind {
            NodeType::Directory => {
                fs::create_dir(&path).map_err(|e| RestoreError::UnableToCreate(path.clone(), e))?;
            }
            NodeType::Symlink => {
                std::os::unix::fs::symlink(OsStr::from_bytes(&header.link_target), &path)
                    .map_err(|e| RestoreError::UnableToCreate(path.clone(), e))?;
            }
            NodeType::Regular => {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(if header.executable { 0o755 } else { 0o644 })
                    .open(&path)
                    .map_err(|e| RestoreError::UnableToCreate(path.clone(), e))?;

                io::copy(dec, &mut file).map_err(|e| match e.downcast::<Error>() {
                    Ok(e) => RestoreError::Decoder(e),
                    Err(e) => RestoreError::UnableToWrite(path.clone(), e),
                })?;
            }
        }

        debug!(path = %path.display(), kind = %header.kind, "restored");
    }

    Ok(())
}
