use bstr::BString;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path {0:?} does not exist in the archive")]
    PathNotFound(BString),

    #[error("{0:?} is not a regular file")]
    NotARegularFile(BString),

    #[error(transparent)]
    Nar(#[from] nix_nar::Error),

    #[error(transparent)]
    Dump(#[from] nix_nar::DumpError),

    #[error(transparent)]
    Restore(#[from] nix_nar::RestoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
