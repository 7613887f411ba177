use std::io::{self, Read};

use crate::Error;

use super::{read_padding, read_u64};

/// Position inside the payload of a bytes packet whose size has already
/// been read. Shared between [BytesReader] and the decoder, which keeps one
/// of these around for the contents of the current regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Payload {
    /// Total payload length, needed for the padding computation.
    len: u64,
    remaining: u64,
    /// Set once the padding has been consumed and validated.
    finished: bool,
}

impl Payload {
    pub(crate) fn new(len: u64) -> Self {
        Self {
            len,
            remaining: len,
            finished: false,
        }
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read payload bytes into `buf`. Once the last payload byte has been
    /// handed out, the padding is consumed and validated.
    pub(crate) fn read<R: Read + ?Sized>(
        &mut self,
        r: &mut R,
        mut buf: &mut [u8],
    ) -> Result<usize, Error> {
        if self.remaining == 0 {
            self.finish_padding(r)?;
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if buf.len() as u64 > self.remaining {
            buf = &mut buf[..self.remaining as usize];
        }

        let n = loop {
            match r.read(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        self.remaining -= n as u64;

        if self.remaining == 0 {
            self.finish_padding(r)?;
        }

        Ok(n)
    }

    /// Discard whatever is left of the payload, and validate the padding.
    pub(crate) fn drain<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<(), Error> {
        let mut buf = [0; 8192];
        while self.read(r, &mut buf)? != 0 {}
        self.finish_padding(r)
    }

    fn finish_padding<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<(), Error> {
        if !self.finished {
            read_padding(r, self.len)?;
            self.finished = true;
        }
        Ok(())
    }
}

/// Reads the payload of a "bytes wire packet" from the underlying reader.
/// The format is the same as in [crate::wire::read_bytes], however this
/// structure provides a [Read] interface, allowing to not having to pass
/// around the entire payload in memory.
///
/// The padding is consumed and validated as soon as the last payload byte
/// is read. Use [BytesReader::finish] to skip over the rest of the packet
/// and get the underlying reader back.
///
/// In case of an error, the underlying reader is no longer usable and
/// might return garbage.
#[derive(Debug)]
pub struct BytesReader<R> {
    inner: R,
    payload: Payload,
}

impl<R: Read> BytesReader<R> {
    /// Constructs a new BytesReader, reading the size field from `inner`
    /// and rejecting sizes above `max_len`.
    pub fn new(mut inner: R, max_len: u64) -> Result<Self, Error> {
        let len = read_u64(&mut inner)?;
        if len > max_len {
            return Err(Error::ContentTooLarge { len, max: max_len });
        }

        Ok(Self::with_size(inner, len))
    }

    /// Construct a new BytesReader with a known, and already-read size.
    pub fn with_size(inner: R, len: u64) -> Self {
        Self {
            inner,
            payload: Payload::new(len),
        }
    }

    /// Remaining payload length, ie not including data already read.
    pub fn len(&self) -> u64 {
        self.payload.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Skip over the remaining payload and padding, returning the
    /// underlying reader positioned right after the packet.
    pub fn finish(mut self) -> Result<R, Error> {
        self.payload.drain(&mut self.inner)?;
        Ok(self.inner)
    }
}

impl<R: Read> Read for BytesReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.payload.read(&mut self.inner, buf)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hex_literal::hex;

    use super::*;

    #[test]
    fn stream_payload() {
        let wire = hex!("0900000000000000 0102030405060708 0900000000000000 ff");
        let mut r = BytesReader::new(Cursor::new(&wire[..]), 1024).unwrap();
        assert_eq!(9, r.len());

        let mut buf = vec![];
        r.read_to_end(&mut buf).unwrap();
        assert_eq!(hex!("010203040506070809"), buf.as_slice());
        assert!(r.is_empty());

        // the padding has been consumed, the trailing byte is still there.
        let inner = r.finish().unwrap();
        assert_eq!(24, inner.position());
    }

    #[test]
    fn finish_skips_unread_payload() {
        let wire = hex!("0300000000000000 6162630000000000 0100000000000000");
        let mut r = BytesReader::new(Cursor::new(&wire[..]), 1024).unwrap();

        let mut one = [0; 1];
        r.read_exact(&mut one).unwrap();
        assert_eq!(b"a", &one);

        let mut inner = r.finish().unwrap();
        assert_eq!(1, crate::wire::read_u64(&mut inner).unwrap());
    }

    #[test]
    fn reject_too_large() {
        let wire = hex!("0004000000000000");
        assert!(matches!(
            BytesReader::new(Cursor::new(&wire[..]), 1023),
            Err(Error::ContentTooLarge {
                len: 1024,
                max: 1023
            })
        ));
    }

    #[test]
    fn reject_nonzero_padding() {
        let wire = hex!("0300000000000000 6162630000000001");
        let mut r = BytesReader::new(Cursor::new(&wire[..]), 1024).unwrap();

        let mut buf = vec![];
        let err = r.read_to_end(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::InvalidData, err.kind());
    }

    #[test]
    fn truncated_payload() {
        let wire = hex!("1000000000000000 6162");
        let mut r = BytesReader::new(Cursor::new(&wire[..]), 1024).unwrap();

        let mut buf = vec![];
        let err = r.read_to_end(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
    }
}
