//! Parser for the Nix archive format, aka NAR.
//!
//! NAR files (and their hashed representations) are used in C++ Nix for
//! a variety of things, including addressing fixed-output derivations
//! and transferring store paths between Nix stores.
//!
//! The [Decoder] is a pull-based cursor: every call to [Decoder::next]
//! yields the [Header] of the next node, depth-first, and the contents of
//! the current regular file can be read through [Read]:
//!
//! ```rust
//! # use std::io::Read;
//! # let mut nar = vec![];
//! # {
//! #     let mut enc = nix_nar::Encoder::new(&mut nar)?;
//! #     enc.write_header(&nix_nar::Header::regular("", 12, false))?;
//! #     std::io::Write::write_all(&mut enc, b"Hello World!")?;
//! #     enc.close()?;
//! # }
//! let mut dec = nix_nar::Decoder::new(nar.as_slice())?;
//!
//! while let Some(header) = dec.next()? {
//!     if header.kind == nix_nar::NodeType::Regular {
//!         let mut contents = vec![];
//!         dec.read_to_end(&mut contents)?;
//!         assert_eq!(b"Hello World!", contents.as_slice());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Read};

use bstr::{BString, ByteSlice};
use tracing::trace;

use crate::grammar::{self, Token, MAGIC, MAX_NAME_LEN, MAX_PATH_LEN, MAX_TARGET_LEN, MAX_TOKEN_LEN};
use crate::header::join_path;
use crate::wire::{self, Payload};
use crate::{Error, Header};

#[cfg(test)]
mod test;

/// A directory that has been entered, but whose closing ")" hasn't been
/// read yet.
#[derive(Debug)]
struct Frame {
    path: BString,
    /// Previous directory entry name.
    /// We have to hang onto this to enforce name monotonicity.
    prev_name: Option<BString>,
}

#[derive(Debug)]
enum State {
    /// The magic has been read, the root node hasn't.
    BeforeFirst,
    /// Inside the contents of a regular file.
    InRegular(Payload),
    /// A node has been read entirely, including its closing ")".
    AfterNode,
    /// Waiting for the next "entry", or the ")" closing the directory on
    /// top of the stack.
    AwaitingEntry,
    /// The root node has been closed.
    Done,
}

/// Streaming NAR decoder.
///
/// Errors are sticky: once any call failed, every following call returns
/// the same error, since the position in the underlying stream can no
/// longer be trusted.
///
/// Dropping a decoder before the end of the archive is fine, the
/// underlying reader is simply left wherever decoding stopped.
#[derive(Debug)]
pub struct Decoder<R> {
    inner: R,
    state: State,
    stack: Vec<Frame>,
    error: Option<Error>,
}

impl<R: Read> Decoder<R> {
    /// Start reading a NAR from `inner`, validating the magic.
    pub fn new(mut inner: R) -> Result<Self, Error> {
        match wire::read_bytes(&mut inner, MAX_TOKEN_LEN) {
            Ok(magic) if magic == MAGIC => {}
            Err(Error::Io(e)) if e.kind() != io::ErrorKind::UnexpectedEof => {
                return Err(Error::Io(e))
            }
            _ => return Err(Error::MagicMismatch),
        }

        Ok(Self {
            inner,
            state: State::BeforeFirst,
            stack: vec![],
            error: None,
        })
    }

    /// Advance to the next node, returning its [Header], or [None] once
    /// the archive has been read entirely.
    ///
    /// Unread contents of the current regular file are skipped.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Header>, Error> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }

        match self.advance() {
            Ok(header) => {
                if let Some(h) = &header {
                    trace!(path = %h.path, kind = %h.kind, size = h.size, "read header");
                }
                Ok(header)
            }
            Err(e) => {
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Returns true once the root node has been closed.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Number of content bytes of the current regular file that haven't
    /// been read yet. Zero for any other kind of node.
    pub fn remaining(&self) -> u64 {
        match &self.state {
            State::InRegular(payload) => payload.remaining(),
            _ => 0,
        }
    }

    /// Give back the underlying reader, positioned wherever decoding
    /// stopped.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn advance(&mut self) -> Result<Option<Header>, Error> {
        loop {
            match &mut self.state {
                State::BeforeFirst => {
                    self.expect(Token::Open)?;
                    self.expect(Token::Type)?;
                    return self.read_node(BString::default()).map(Some);
                }
                State::InRegular(payload) => {
                    payload.drain(&mut self.inner)?;
                    self.expect(Token::Close)?;
                    self.state = State::AfterNode;
                }
                State::AfterNode => {
                    if self.stack.is_empty() {
                        self.state = State::Done;
                        return Ok(None);
                    }

                    // close the "entry" wrapping the node we just finished.
                    self.expect(Token::Close)?;
                    self.state = State::AwaitingEntry;
                }
                State::AwaitingEntry => match self.keyword("\"entry\" or \")\"")? {
                    Token::Close => {
                        self.stack.pop();
                        self.state = State::AfterNode;
                    }
                    Token::Entry => return self.read_entry().map(Some),
                    t => return Err(unexpected("\"entry\" or \")\"", t.as_bytes())),
                },
                State::Done => return Ok(None),
            }
        }
    }

    /// Read a directory entry, after its "entry" token, up to and including
    /// the header of the node it contains.
    fn read_entry(&mut self) -> Result<Header, Error> {
        self.expect(Token::Open)?;
        self.expect(Token::Name)?;

        let name = wire::read_string(&mut self.inner, MAX_NAME_LEN)?;
        if !grammar::is_valid_name(&name) {
            return Err(Error::InvalidName(name));
        }

        let Some(frame) = self.stack.last_mut() else {
            return Err(Error::InvalidNesting {
                path: name,
                reason: "entry outside of a directory",
            });
        };

        // Enforce strict monotonicity of directory entry names.
        if let Some(prev) = &frame.prev_name {
            if *prev >= name {
                return Err(Error::UnsortedEntry {
                    prev: prev.clone(),
                    name,
                });
            }
        }

        let path = join_path(frame.path.as_bstr(), name.as_bstr());
        if path.len() > MAX_PATH_LEN {
            return Err(Error::InvalidName(path));
        }
        frame.prev_name = Some(name);

        self.expect(Token::Node)?;
        self.expect(Token::Open)?;
        self.expect(Token::Type)?;

        self.read_node(path)
    }

    /// Read the type of a node and everything up to its contents.
    ///
    /// Symlinks are read entirely, including their closing ")". Regular
    /// files stop right before their contents, directories right before
    /// their first entry.
    fn read_node(&mut self, path: BString) -> Result<Header, Error> {
        match self.keyword("node type")? {
            Token::Regular => {
                let executable = match self.keyword("\"executable\" or \"contents\"")? {
                    Token::Executable => {
                        let marker = wire::read_bytes(&mut self.inner, MAX_TOKEN_LEN)?;
                        if !marker.is_empty() {
                            return Err(unexpected("\"\"", &marker));
                        }
                        self.expect(Token::Contents)?;
                        true
                    }
                    Token::Contents => false,
                    t => return Err(unexpected("\"executable\" or \"contents\"", t.as_bytes())),
                };

                let size = wire::read_u64(&mut self.inner)?;
                self.state = State::InRegular(Payload::new(size));

                Ok(Header::regular(path, size, executable))
            }
            Token::Symlink => {
                self.expect(Token::Target)?;
                let target = wire::read_string(&mut self.inner, MAX_TARGET_LEN)?;
                if !grammar::is_valid_target(&target) {
                    return Err(Error::InvalidHeader {
                        path,
                        reason: "symlink target is empty or contains NUL",
                    });
                }
                self.expect(Token::Close)?;
                self.state = State::AfterNode;

                Ok(Header::symlink(path, target))
            }
            Token::Directory => {
                self.stack.push(Frame {
                    path: path.clone(),
                    prev_name: None,
                });
                self.state = State::AwaitingEntry;

                Ok(Header::directory(path))
            }
            t => Err(unexpected("node type", t.as_bytes())),
        }
    }

    /// Consume a keyword token, whichever it is.
    fn keyword(&mut self, expected: &'static str) -> Result<Token, Error> {
        let raw = wire::read_bytes(&mut self.inner, MAX_TOKEN_LEN)?;
        Token::from_bytes(&raw).ok_or_else(|| unexpected(expected, &raw))
    }

    /// Consume a known keyword token.
    fn expect(&mut self, token: Token) -> Result<(), Error> {
        let raw = wire::read_bytes(&mut self.inner, MAX_TOKEN_LEN)?;
        if raw != token.as_bytes() {
            return Err(unexpected(token.describe(), &raw));
        }
        Ok(())
    }
}

fn unexpected(expected: &'static str, got: &[u8]) -> Error {
    Error::UnexpectedToken {
        expected,
        got: BString::from(got),
    }
}

/// Reads the contents of the current regular file. Returns 0 for any other
/// kind of node, and once the contents have been read entirely.
impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = &self.error {
            return Err(e.clone().into());
        }

        let State::InRegular(payload) = &mut self.state else {
            return Ok(0);
        };

        payload.read(&mut self.inner, buf).map_err(|e| {
            self.error = Some(e.clone());
            e.into()
        })
    }
}
