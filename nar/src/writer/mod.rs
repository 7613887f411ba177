//! Implements an interface for writing the Nix archive format (NAR).
//!
//! NAR files (and their hashed representations) are used in C++ Nix for
//! addressing fixed-output derivations and a variety of other things.
//!
//! The [Encoder] is push-based: the caller hands it a depth-first sequence
//! of [Header]s, and writes the contents of each regular file through
//! [Write] right after its header. Writing a single file might look like
//! this:
//!
//! ```rust
//! use std::io::Write;
//!
//! // Output location to write the NAR to.
//! let mut sink: Vec<u8> = Vec::new();
//!
//! let mut nar = nix_nar::Encoder::new(&mut sink)?;
//! nar.write_header(&nix_nar::Header::regular("", 5, false))?;
//! nar.write_all(&[0, 1, 2, 3, 4])?;
//! nar.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Write};

use bstr::{BString, ByteSlice};
use tracing::trace;

use crate::grammar::{TOK_DIR, TOK_ENT, TOK_EXE, TOK_MAGIC, TOK_NOD, TOK_OPEN, TOK_PAR, TOK_REG, TOK_SYM};
use crate::header::{is_descendant, split_path};
use crate::wire;
use crate::{Error, Header, NodeType};


/// A directory whose closing ")" hasn't been written yet.
#[derive(Debug)]
struct Frame {
    path: BString,
    prev_name: Option<BString>,
}

#[derive(Debug)]
enum State {
    /// Only the magic has been written.
    Empty,
    /// Inside the contents of a regular file.
    InRegular { size: u64, remaining: u64 },
    /// Between nodes.
    Idle,
    Closed,
}

/// Streaming NAR encoder.
///
/// Headers must be supplied depth-first, with the entries of every
/// directory in strictly ascending byte-wise order, exactly the way the
/// [crate::reader::Decoder] produces them. Errors are sticky: once a call
/// failed, every following call returns the same error.
#[derive(Debug)]
pub struct Encoder<W> {
    inner: W,
    stack: Vec<Frame>,
    state: State,
    error: Option<Error>,
}

impl<W: Write> Encoder<W> {
    /// Create a new NAR, writing the magic to `inner` immediately.
    pub fn new(mut inner: W) -> Result<Self, Error> {
        inner.write_all(&TOK_MAGIC)?;

        Ok(Self {
            inner,
            stack: vec![],
            state: State::Empty,
            error: None,
        })
    }

    /// Begin a new node. The first header must be the root.
    ///
    /// Any directories the new node is not part of are closed first. If
    /// the previous node was a regular file, all of its contents must have
    /// been written.
    pub fn write_header(&mut self, header: &Header) -> Result<(), Error> {
        self.check()?;

        let r = self.begin(header);
        if let Err(e) = &r {
            self.error = Some(e.clone());
        }
        r
    }

    /// Finish the archive, closing all open directories, and flush the
    /// underlying writer.
    pub fn close(&mut self) -> Result<(), Error> {
        self.check()?;

        let r = self.finish();
        if let Err(e) = &r {
            self.error = Some(e.clone());
        }
        r
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn check(&self) -> Result<(), Error> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if let State::Closed = self.state {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn begin(&mut self, header: &Header) -> Result<(), Error> {
        header.validate()?;
        trace!(path = %header.path, kind = %header.kind, size = header.size, "write header");

        match self.state {
            State::Empty => {
                if !header.is_root() {
                    return Err(Error::InvalidNesting {
                        path: header.path.clone(),
                        reason: "the first header must be the root",
                    });
                }

                self.inner.write_all(&TOK_OPEN)?;
                return self.write_node(header);
            }
            State::InRegular { size, remaining } => {
                if remaining != 0 {
                    return Err(Error::IncompleteWrite { remaining });
                }
                self.finish_file(size)?;
            }
            State::Idle => {}
            State::Closed => return Err(Error::Closed),
        }

        if header.is_root() {
            return Err(Error::InvalidNesting {
                path: header.path.clone(),
                reason: "the root has already been written",
            });
        }

        // Close all directories the new node is not part of.
        while let Some(top) = self.stack.last() {
            if is_descendant(top.path.as_bstr(), header.path.as_bstr()) {
                break;
            }
            self.close_dir()?;
        }

        let (parent, name) = split_path(header.path.as_bstr());

        let Some(top) = self.stack.last_mut() else {
            return Err(Error::InvalidNesting {
                path: header.path.clone(),
                reason: "the root is not an open directory",
            });
        };

        if top.path != parent {
            return Err(Error::InvalidNesting {
                path: header.path.clone(),
                reason: "the parent is not an open directory",
            });
        }

        if let Some(prev) = &top.prev_name {
            if prev.as_bstr() >= name {
                return Err(Error::UnsortedEntry {
                    prev: prev.clone(),
                    name: name.to_owned(),
                });
            }
        }
        top.prev_name = Some(name.to_owned());

        self.inner.write_all(&TOK_ENT)?;
        wire::write_string(&mut self.inner, name)?;
        self.inner.write_all(&TOK_NOD)?;

        self.write_node(header)
    }

    /// Write the type of a node and everything up to its contents.
    fn write_node(&mut self, header: &Header) -> Result<(), Error> {
        match header.kind {
            NodeType::Regular => {
                self.inner.write_all(if header.executable {
                    &TOK_EXE[..]
                } else {
                    &TOK_REG[..]
                })?;
                wire::write_u64(&mut self.inner, header.size)?;
                self.state = State::InRegular {
                    size: header.size,
                    remaining: header.size,
                };
            }
            NodeType::Symlink => {
                self.inner.write_all(&TOK_SYM)?;
                wire::write_string(&mut self.inner, &header.link_target)?;
                self.end_node()?;
                self.state = State::Idle;
            }
            NodeType::Directory => {
                self.inner.write_all(&TOK_DIR)?;
                self.stack.push(Frame {
                    path: header.path.clone(),
                    prev_name: None,
                });
                self.state = State::Idle;
            }
        }

        Ok(())
    }

    fn finish_file(&mut self, size: u64) -> Result<(), Error> {
        wire::write_padding(&mut self.inner, size)?;
        self.end_node()?;
        self.state = State::Idle;
        Ok(())
    }

    fn close_dir(&mut self) -> Result<(), Error> {
        self.stack.pop();
        self.end_node()
    }

    /// Write the ")" closing a node, and the one closing the entry wrapping
    /// it, unless it's the root.
    fn end_node(&mut self) -> Result<(), Error> {
        self.inner.write_all(&TOK_PAR)?;
        if !self.stack.is_empty() {
            self.inner.write_all(&TOK_PAR)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        match self.state {
            State::Empty => return Err(Error::EmptyArchive),
            State::InRegular { size, remaining } => {
                if remaining != 0 {
                    return Err(Error::IncompleteWrite { remaining });
                }
                self.finish_file(size)?;
            }
            State::Idle => {}
            State::Closed => return Err(Error::Closed),
        }

        while !self.stack.is_empty() {
            self.close_dir()?;
        }

        self.inner.flush()?;
        self.state = State::Closed;
        Ok(())
    }

    fn poison(&mut self, e: Error) -> io::Error {
        self.error = Some(e.clone());
        e.into()
    }
}

/// Writes contents of the current regular file. Writing more than the size
/// declared in its header fails immediately.
impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(e) = &self.error {
            return Err(e.clone().into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let State::InRegular { size, remaining } = &mut self.state else {
            return Err(self.poison(Error::UnexpectedContent));
        };

        if buf.len() as u64 > *remaining {
            let size = *size;
            return Err(self.poison(Error::ContentOverflow { size }));
        }
        *remaining -= buf.len() as u64;

        if let Err(e) = self.inner.write_all(buf) {
            return Err(self.poison(e.into()));
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
