//! Observe the bytes of an archive as they pass through, to compute the
//! "NAR hash" and "NAR size" of it.

use std::fmt;
use std::io::{self, Read, Write};

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

/// Wraps an existing [Read], and allows querying for the digest and size
/// of all data read "through" it.
/// The hash function is configurable by type parameter.
pub struct HashingReader<R, H = Sha256> {
    inner: R,
    hasher: H,
    count: u64,
}

pub type Sha256HashingReader<R> = HashingReader<R, Sha256>;

impl<R: Read, H: Digest> HashingReader<R, H> {
    pub fn from(r: R) -> Self {
        Self {
            inner: r,
            hasher: H::new(),
            count: 0,
        }
    }

    /// Number of bytes read so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Return the digest, and the number of bytes read.
    pub fn digest(self) -> (digest::Output<H>, u64) {
        (self.hasher.finalize(), self.count)
    }
}

impl<R: Read, H: Digest> Read for HashingReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// Wraps an existing [Write], and allows querying for the digest and size
/// of all data written "through" it.
pub struct HashingWriter<W, H = Sha256> {
    inner: W,
    hasher: H,
    count: u64,
}

pub type Sha256HashingWriter<W> = HashingWriter<W, Sha256>;

impl<W: Write, H: Digest> HashingWriter<W, H> {
    pub fn from(w: W) -> Self {
        Self {
            inner: w,
            hasher: H::new(),
            count: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Return the inner writer, the digest, and the number of bytes
    /// written.
    pub fn finalize(self) -> (W, digest::Output<H>, u64) {
        (self.inner, self.hasher.finalize(), self.count)
    }
}

impl<W: Write, H: Digest> Write for HashingWriter<W, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // only hash what the inner writer accepted.
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The SHA-256 digest and size of a serialized archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarHash {
    pub digest: [u8; 32],
    pub size: u64,
}

impl NarHash {
    pub fn from_reader<R: Read>(r: Sha256HashingReader<R>) -> Self {
        let (digest, size) = r.digest();
        Self {
            digest: digest.into(),
            size,
        }
    }

    pub fn from_writer<W: Write>(w: Sha256HashingWriter<W>) -> (W, Self) {
        let (inner, digest, size) = w.finalize();
        (
            inner,
            Self {
                digest: digest.into(),
                size,
            },
        )
    }
}

/// Renders as `sha256:` followed by the lowercase hex digest.
impl fmt::Display for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", HEXLOWER.encode(&self.digest))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use hex_literal::hex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{NarHash, Sha256HashingReader, Sha256HashingWriter};
    use crate::fixtures::{COMPLICATED_NAR, HELLOWORLD_NAR, SYMLINK_NAR};
    use crate::{Decoder, Encoder};

    #[test]
    fn empty() {
        let mut r = Sha256HashingReader::from(io::empty());
        io::copy(&mut r, &mut io::sink()).unwrap();

        let h = NarHash::from_reader(r);
        assert_eq!(0, h.size);
        assert_eq!(
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"),
            h.digest
        );
        assert_eq!(
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            h.to_string()
        );
    }

    /// Hashing the input of a decoder and the output of an encoder copying
    /// from it gives the same result.
    #[rstest]
    #[case::symlink(SYMLINK_NAR)]
    #[case::helloworld(HELLOWORLD_NAR)]
    #[case::complicated(COMPLICATED_NAR)]
    fn reader_and_writer_agree(#[case] nar: &[u8]) {
        let mut dec = Decoder::new(Sha256HashingReader::from(Cursor::new(nar))).unwrap();
        let mut enc = Encoder::new(Sha256HashingWriter::from(vec![])).unwrap();

        while let Some(h) = dec.next().unwrap() {
            enc.write_header(&h).unwrap();
            io::copy(&mut dec, &mut enc).unwrap();
        }
        enc.close().unwrap();

        let read = NarHash::from_reader(dec.into_inner());
        let (buf, written) = NarHash::from_writer(enc.into_inner());

        assert_eq!(nar, buf.as_slice());
        assert_eq!(nar.len() as u64, read.size);
        assert_eq!(read, written);
    }
}
