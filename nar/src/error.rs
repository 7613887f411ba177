use std::{io, sync::Arc};

use bstr::BString;

/// Errors produced by the wire primitives, the [crate::reader::Decoder] and
/// the [crate::writer::Encoder].
///
/// Decoders and encoders keep the first error they encounter and return a
/// clone of it from every subsequent call, which is why this type is
/// [Clone] and I/O errors are kept behind an [Arc].
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("stream does not start with the NAR magic")]
    MagicMismatch,

    #[error("unexpected token {got:?}, expected {expected}")]
    UnexpectedToken { expected: &'static str, got: BString },

    #[error("non-zero padding bytes")]
    InvalidPadding,

    #[error("declared length {len} exceeds the maximum of {max} bytes")]
    ContentTooLarge { len: u64, max: u64 },

    #[error("directory entry {name:?} does not sort after {prev:?}")]
    UnsortedEntry { prev: BString, name: BString },

    #[error("invalid nesting at {path:?}: {reason}")]
    InvalidNesting { path: BString, reason: &'static str },

    #[error("regular file is missing {remaining} bytes of content")]
    IncompleteWrite { remaining: u64 },

    #[error("archive has no root node")]
    EmptyArchive,

    #[error("invalid name or path {0:?}")]
    InvalidName(BString),

    #[error("invalid header for {path:?}: {reason}")]
    InvalidHeader { path: BString, reason: &'static str },

    #[error("content exceeds the declared file size of {size} bytes")]
    ContentOverflow { size: u64 },

    #[error("content written while no regular file is open")]
    UnexpectedContent,

    #[error("archive is already closed")]
    Closed,

    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),
}

/// Errors handed out through the [std::io::Read] and [std::io::Write]
/// impls come back unchanged.
impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        match value.downcast::<Error>() {
            Ok(e) => e,
            Err(e) => Error::Io(Arc::new(e)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(e) => io::Error::new(e.kind(), Error::Io(e)),
            Error::ContentOverflow { .. } | Error::UnexpectedContent | Error::Closed => {
                io::Error::new(io::ErrorKind::InvalidInput, value)
            }
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

impl Error {
    /// Returns true if the underlying I/O error is an unexpected EOF,
    /// which is how truncated archives surface.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
