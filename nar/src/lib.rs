//! Streaming encoder and decoder for the Nix ARchive format (NAR).
//!
//! A NAR is a deterministic serialization of a filesystem tree made of
//! regular files, symlinks and directories. See [grammar] for the format
//! itself.
//!
//! - [Decoder] turns a byte stream into a sequence of [Header]s, with the
//!   contents of regular files readable in between.
//! - [Encoder] does the reverse.
//! - [dump()] and [restore()] convert between archives and the local
//!   filesystem.
//! - [hashing] computes the `sha256:` NAR hash and size of an archive as it
//!   passes through.

pub mod dump;
mod error;
pub mod grammar;
pub mod hashing;
mod header;
pub mod reader;
pub mod restore;
pub mod wire;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use error::Error;
pub use header::{Header, NodeType};
pub use reader::Decoder;
pub use writer::Encoder;

pub use dump::{dump, dump_filtered, DumpError};
pub use hashing::NarHash;
pub use restore::{restore, RestoreError};
