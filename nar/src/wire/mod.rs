//! Module parsing and emitting the primitives of the NAR wire format:
//! little-endian u64s and "bytes wire packets".
//!
//! A bytes packet is made up of three parts:
//! - a length header, u64, LE-encoded
//! - the payload itself
//! - null bytes to the next 8 byte boundary

use std::io::{self, Read, Write};

use bstr::BString;

use crate::Error;

mod bytes_reader;
pub use bytes_reader::BytesReader;
pub(crate) use bytes_reader::Payload;

#[cfg(feature = "async")]
pub mod r#async;

/// 8 null bytes, used to write out padding.
const EMPTY_BYTES: &[u8; 8] = &[0u8; 8];

/// Computes the number of bytes we should add to len (a length in
/// bytes) to be aligned on 64 bits (8 bytes).
pub fn padding_len(len: u64) -> usize {
    match (len & 7) as usize {
        0 => 0,
        n => 8 - n,
    }
}

/// Read a u64 from the reader (little endian).
pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<u64, Error> {
    let mut buf = [0; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write a u64 to the writer (little endian).
pub fn write_u64<W: Write + ?Sized>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Consume the padding following a payload of `len` bytes, and ensure it's
/// all zeroes.
pub fn read_padding<R: Read + ?Sized>(r: &mut R, len: u64) -> Result<(), Error> {
    let pad = padding_len(len);
    if pad != 0 {
        let mut buf = [0; 8];
        r.read_exact(&mut buf[..pad])?;

        if buf != [0; 8] {
            return Err(Error::InvalidPadding);
        }
    }

    Ok(())
}

/// Write the padding following a payload of `len` bytes.
pub fn write_padding<W: Write + ?Sized>(w: &mut W, len: u64) -> io::Result<()> {
    match padding_len(len) {
        0 => Ok(()),
        n => w.write_all(&EMPTY_BYTES[..n]),
    }
}

/// Read a "bytes wire packet" from the reader.
/// Rejects payloads longer than `max_len` before allocating anything.
///
/// On success, the returned `Vec<u8>` only contains the payload itself.
/// On failure the reader is left at an unspecified position and should
/// be abandoned.
///
/// This buffers the entire payload into memory, a streaming version is
/// available at [BytesReader].
pub fn read_bytes<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<Vec<u8>, Error> {
    let len = read_u64(r)?;
    if len > max_len as u64 {
        return Err(Error::ContentTooLarge {
            len,
            max: max_len as u64,
        });
    }

    // we know the length fits in a usize now
    let mut buf = vec![0; len as usize];
    r.read_exact(&mut buf)?;
    read_padding(r, len)?;

    Ok(buf)
}

/// Read a "bytes wire packet" as a string. No encoding is enforced,
/// the payload is returned as raw bytes.
pub fn read_string<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<BString, Error> {
    read_bytes(r, max_len).map(BString::from)
}

/// Writes a "bytes wire packet" to a (hopefully buffered) writer.
///
/// See [read_bytes] for a description of the format.
pub fn write_bytes<W: Write + ?Sized, B: AsRef<[u8]>>(w: &mut W, b: B) -> io::Result<()> {
    let b = b.as_ref();
    write_u64(w, b.len() as u64)?;
    w.write_all(b)?;
    write_padding(w, b.len() as u64)
}

/// Writes a string as a "bytes wire packet".
pub fn write_string<W: Write + ?Sized, S: AsRef<[u8]>>(w: &mut W, s: S) -> io::Result<()> {
    write_bytes(w, s)
}
