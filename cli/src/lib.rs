use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use nix_nar::hashing::Sha256HashingReader;
use nix_nar::{Decoder, Header, NarHash, NodeType};
use tracing::{instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

pub mod args;
mod errors;

pub use args::{Args, Command};
pub use errors::Error;

/// Open a NAR for reading, `-` being stdin.
pub fn open_nar(path: &Path) -> io::Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }

    Ok(Box::new(BufReader::new(File::open(path)?)))
}

/// Paths inside an archive are accepted with or without leading and
/// trailing slashes. The root is the empty path.
pub fn normalize_path(path: &str) -> BString {
    BString::from(path.trim_matches('/'))
}

/// Copy the contents of the current regular file, keeping decoder errors
/// apart from errors writing the output.
fn copy_contents<R: Read, W: Write>(dec: &mut Decoder<R>, w: &mut W) -> Result<u64, Error> {
    io::copy(dec, w).map_err(|e| match e.downcast::<nix_nar::Error>() {
        Ok(e) => Error::Nar(e),
        Err(e) => Error::Io(e),
    })
}

/// Write the contents of the regular file at `path` to `w`.
pub fn cat<R: Read, W: Write>(nar: R, path: &BStr, mut w: W) -> Result<(), Error> {
    let mut dec = Decoder::new(nar)?;

    while let Some(header) = dec.next()? {
        if header.path != path {
            continue;
        }

        if header.kind != NodeType::Regular {
            return Err(Error::NotARegularFile(header.path));
        }

        copy_contents(&mut dec, &mut w)?;
        w.flush()?;
        return Ok(());
    }

    Err(Error::PathNotFound(path.to_owned()))
}

/// Format a node the way `nix nar ls -l` does.
fn long_line(header: &Header, rel_path: &BStr) -> String {
    let mode = match header.kind {
        NodeType::Regular if header.executable => "-r-xr-xr-x",
        NodeType::Regular => "-r--r--r--",
        NodeType::Symlink => "lr-xr-xr-x",
        NodeType::Directory => "dr-xr-xr-x",
    };

    let mut line = format!("{} {:>20} {}", mode, header.size, rel_path);
    if header.kind == NodeType::Symlink {
        line.push_str(" -> ");
        line.push_str(&header.link_target.to_str_lossy());
    }
    line
}

/// List the node at `path`. If it's a directory, its entries are listed
/// instead, relative to it and prefixed with `./`, and with `recursive`
/// their entries too. A root that isn't a directory is listed as `.`.
pub fn ls<R: Read, W: Write>(
    nar: R,
    path: &BStr,
    recursive: bool,
    long: bool,
    mut w: W,
) -> Result<(), Error> {
    let mut dec = Decoder::new(nar)?;
    let mut found = false;

    while let Some(header) = dec.next()? {
        let rel_path: BString = if header.path == path {
            found = true;
            if header.kind == NodeType::Directory {
                continue;
            }
            if header.is_root() {
                BString::from(".")
            } else {
                header.name().to_owned()
            }
        } else if let Some(rest) = strip_dir(path, header.path.as_bstr()) {
            if !recursive && rest.contains(&b'/') {
                continue;
            }
            let mut p = BString::from("./");
            p.extend_from_slice(rest);
            p
        } else if found {
            // the decoder is depth-first, nothing further down can be
            // below path anymore.
            break;
        } else {
            continue;
        };

        if long {
            writeln!(w, "{}", long_line(&header, rel_path.as_bstr()))?;
        } else {
            writeln!(w, "{}", rel_path)?;
        }
    }

    if !found {
        return Err(Error::PathNotFound(path.to_owned()));
    }

    w.flush()?;
    Ok(())
}

/// If `path` is below the directory `dir`, returns the rest of it.
fn strip_dir<'a>(dir: &BStr, path: &'a BStr) -> Option<&'a [u8]> {
    if dir.is_empty() {
        return (!path.is_empty()).then_some(path.as_bytes());
    }

    path.strip_prefix(dir.as_bytes())
        .and_then(|rest| rest.strip_prefix(b"/"))
}

/// Serialize `path` into `w`.
#[instrument(skip_all, fields(path = %path.display(), indicatif.pb_show=1), err)]
pub fn dump_path<W: Write>(path: &Path, w: W) -> Result<(), Error> {
    let span = Span::current();
    span.pb_set_style(&nar_tracing::PB_SPINNER_STYLE);
    span.pb_set_message(&format!("Dumping {}", path.display()));
    span.pb_start();

    let mut w = nix_nar::dump::DumpOptions::new()
        .filter(|_, _| {
            span.pb_inc(1);
            true
        })
        .dump(path, w)?;
    w.flush()?;

    Ok(())
}

/// Unpack `nar` at `dest`.
#[instrument(skip_all, fields(dest = %dest.display(), indicatif.pb_show=1), err)]
pub fn restore<R: Read>(nar: R, dest: &Path) -> Result<(), Error> {
    let span = Span::current();
    span.pb_set_style(&nar_tracing::PB_SPINNER_STYLE);
    span.pb_set_message(&format!("Restoring to {}", dest.display()));
    span.pb_start();

    let mut dec = Decoder::new(nar)?;
    nix_nar::restore(&mut dec, dest)?;

    Ok(())
}

/// Decode all of `nar`, and return the hash and size of it.
pub fn hash<R: Read>(nar: R) -> Result<NarHash, Error> {
    let mut dec = Decoder::new(Sha256HashingReader::from(nar))?;
    while dec.next()?.is_some() {}

    Ok(NarHash::from_reader(dec.into_inner()))
}
