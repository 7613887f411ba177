//! tokio versions of the wire primitives, for consumers exchanging bytes
//! packets over async transports. Semantics and errors match the
//! synchronous functions in [crate::wire].

use std::io;

use bstr::BString;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{padding_len, EMPTY_BYTES};
use crate::Error;

/// Read a u64 from the AsyncRead (little endian).
pub async fn read_u64<R: AsyncRead + Unpin>(r: &mut R) -> Result<u64, Error> {
    Ok(r.read_u64_le().await?)
}

/// Write a u64 to the AsyncWrite (little endian).
pub async fn write_u64<W: AsyncWrite + Unpin>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_u64_le(v).await
}

/// Read a "bytes wire packet" from the AsyncRead.
/// Rejects payloads longer than `max_len` before allocating anything.
pub async fn read_bytes<R: AsyncRead + Unpin>(r: &mut R, max_len: usize) -> Result<Vec<u8>, Error> {
    let len = read_u64(r).await?;
    if len > max_len as u64 {
        return Err(Error::ContentTooLarge {
            len,
            max: max_len as u64,
        });
    }

    let mut buf = vec![0; len as usize];
    r.read_exact(&mut buf).await?;

    let pad = padding_len(len);
    if pad != 0 {
        let mut padding = [0; 8];
        r.read_exact(&mut padding[..pad]).await?;
        if padding != [0; 8] {
            return Err(Error::InvalidPadding);
        }
    }

    Ok(buf)
}

/// Read a "bytes wire packet" as a raw string.
pub async fn read_string<R: AsyncRead + Unpin>(r: &mut R, max_len: usize) -> Result<BString, Error> {
    read_bytes(r, max_len).await.map(BString::from)
}

/// Writes a "bytes wire packet" to a (hopefully buffered) AsyncWrite.
pub async fn write_bytes<W: AsyncWrite + Unpin, B: AsRef<[u8]>>(
    w: &mut W,
    b: B,
) -> io::Result<()> {
    let b = b.as_ref();
    write_u64(w, b.len() as u64).await?;
    w.write_all(b).await?;

    let pad = padding_len(b.len() as u64);
    if pad != 0 {
        w.write_all(&EMPTY_BYTES[..pad]).await?;
    }
    Ok(())
}
