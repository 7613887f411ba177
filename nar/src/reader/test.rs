use std::io::{Cursor, Read};

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::fixtures::{nar, COMPLICATED_NAR, HELLOWORLD_NAR, SYMLINK_NAR};
use crate::grammar::{MAX_NAME_LEN, MAX_PATH_LEN, MAX_TARGET_LEN};
use crate::{Decoder, Error, Header};

fn headers(data: &[u8]) -> Vec<Header> {
    let mut dec = Decoder::new(Cursor::new(data)).expect("magic must match");
    let mut out = vec![];
    while let Some(h) = dec.next().expect("next must succeed") {
        out.push(h);
    }
    out
}

#[test]
fn symlink() {
    assert_eq!(
        vec![Header::symlink("", "/nix/store/somewhereelse")],
        headers(SYMLINK_NAR)
    );
}

#[test]
fn file() {
    let mut dec = Decoder::new(Cursor::new(HELLOWORLD_NAR)).unwrap();

    assert_eq!(
        Some(Header::regular("", 12, false)),
        dec.next().expect("next must succeed")
    );
    assert_eq!(12, dec.remaining());

    let mut buf = vec![];
    dec.read_to_end(&mut buf).expect("read must succeed");
    assert_eq!(&b"Hello World!"[..], &buf);

    assert_eq!(None, dec.next().unwrap());
    assert!(dec.is_done());

    // the archive has been consumed entirely
    assert_eq!(HELLOWORLD_NAR.len() as u64, dec.into_inner().position());
}

#[test]
fn complicated() {
    assert_eq!(
        vec![
            Header::directory(""),
            Header::regular(".keep", 0, false),
            Header::symlink("aa", "/nix/store/somewhereelse"),
            Header::directory("keep"),
            Header::regular("keep/.keep", 0, false),
        ],
        headers(COMPLICATED_NAR)
    );
}

#[test]
fn next_skips_unread_contents() {
    let data = nar(&[
        b"(", b"type", b"directory",
        b"entry", b"(", b"name", b"a", b"node",
        b"(", b"type", b"regular", b"contents", b"0123456789", b")",
        b")",
        b"entry", b"(", b"name", b"b", b"node",
        b"(", b"type", b"regular", b"executable", b"", b"contents", b"xyz", b")",
        b")",
        b")",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    assert_eq!(Some(Header::directory("")), dec.next().unwrap());
    assert_eq!(Some(Header::regular("a", 10, false)), dec.next().unwrap());

    // only read part of the contents.
    let mut buf = [0; 4];
    dec.read_exact(&mut buf).unwrap();
    assert_eq!(b"0123", &buf);

    assert_eq!(Some(Header::regular("b", 3, true)), dec.next().unwrap());
    let mut buf = vec![];
    dec.read_to_end(&mut buf).unwrap();
    assert_eq!(b"xyz", buf.as_slice());

    assert_eq!(None, dec.next().unwrap());
}

#[test]
fn read_outside_regular_file() {
    let mut dec = Decoder::new(Cursor::new(COMPLICATED_NAR)).unwrap();

    // before the first header
    assert_eq!(0, dec.read(&mut [0; 8]).unwrap());

    assert_eq!(Some(Header::directory("")), dec.next().unwrap());
    assert_eq!(0, dec.read(&mut [0; 8]).unwrap());
}

#[test]
fn end_of_archive_is_repeatable() {
    let mut dec = Decoder::new(Cursor::new(SYMLINK_NAR)).unwrap();
    assert!(dec.next().unwrap().is_some());
    assert_eq!(None, dec.next().unwrap());
    assert_eq!(None, dec.next().unwrap());
}

#[rstest]
#[case::wrong_version(b"nix-archive-2")]
#[case::empty_magic(b"")]
#[case::too_long(b"nix-archive-1-and-then-some-more-bytes-here")]
fn magic_mismatch(#[case] magic: &[u8]) {
    let mut data = vec![];
    crate::wire::write_bytes(&mut data, magic).unwrap();

    assert!(matches!(
        Decoder::new(Cursor::new(data)),
        Err(Error::MagicMismatch)
    ));
}

#[test]
fn invalid_padding_in_contents_is_sticky() {
    let mut data = nar(&[b"(", b"type", b"regular", b"contents", b"\x01", b")"]);
    // corrupt the padding following the single content byte.
    let pad_offset = 24 + 16 + 16 + 16 + 16 + 8 + 1;
    data[pad_offset] = 0xff;

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    assert_eq!(Some(Header::regular("", 1, false)), dec.next().unwrap());

    let mut buf = vec![];
    let err = dec.read_to_end(&mut buf).unwrap_err();
    assert_eq!(std::io::ErrorKind::InvalidData, err.kind());

    assert!(matches!(dec.next(), Err(Error::InvalidPadding)));
    assert!(matches!(dec.next(), Err(Error::InvalidPadding)));
    assert!(dec.read(&mut [0; 1]).is_err());
}

#[test]
fn invalid_padding_skipped_contents() {
    let mut data = nar(&[b"(", b"type", b"regular", b"contents", b"\x01", b")"]);
    let pad_offset = 24 + 16 + 16 + 16 + 16 + 8 + 1;
    data[pad_offset + 3] = 0x01;

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    dec.next().unwrap();
    assert!(matches!(dec.next(), Err(Error::InvalidPadding)));
}

#[test]
fn unexpected_token() {
    let data = nar(&[b"(", b"type", b"fifo", b")"]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    match dec.next() {
        Err(Error::UnexpectedToken { got, .. }) => assert_eq!("fifo", got),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unsorted_entries() {
    let data = nar(&[
        b"(", b"type", b"directory",
        b"entry", b"(", b"name", b"b", b"node",
        b"(", b"type", b"symlink", b"target", b"x", b")",
        b")",
        b"entry", b"(", b"name", b"a", b"node",
        b"(", b"type", b"symlink", b"target", b"x", b")",
        b")",
        b")",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    dec.next().unwrap();
    dec.next().unwrap();
    assert!(matches!(dec.next(), Err(Error::UnsortedEntry { .. })));
}

#[test]
fn duplicate_entries() {
    let data = nar(&[
        b"(", b"type", b"directory",
        b"entry", b"(", b"name", b"a", b"node",
        b"(", b"type", b"directory", b")",
        b")",
        b"entry", b"(", b"name", b"a", b"node",
        b"(", b"type", b"directory", b")",
        b")",
        b")",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    dec.next().unwrap();
    dec.next().unwrap();
    assert!(matches!(dec.next(), Err(Error::UnsortedEntry { .. })));
}

#[rstest]
#[case::slash(b"a/b")]
#[case::dot(b".")]
#[case::dotdot(b"..")]
#[case::empty(b"")]
#[case::nul(b"a\0")]
fn invalid_names(#[case] name: &[u8]) {
    let data = nar(&[
        b"(", b"type", b"directory",
        b"entry", b"(", b"name", name, b"node",
        b"(", b"type", b"directory", b")",
        b")",
        b")",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    dec.next().unwrap();
    assert!(matches!(dec.next(), Err(Error::InvalidName(_))));
}

#[test]
fn name_too_long() {
    let name = [b'x'; 256];
    let data = nar(&[
        b"(", b"type", b"directory",
        b"entry", b"(", b"name", &name, b"node",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    dec.next().unwrap();
    assert!(matches!(
        dec.next(),
        Err(Error::ContentTooLarge { len: 256, max: 255 })
    ));
}

#[test]
fn path_too_long() {
    let name = [b'x'; MAX_NAME_LEN];

    // 16 levels of 255 byte names stay within MAX_PATH_LEN, 17 don't.
    let mut packets: Vec<&[u8]> = vec![];
    packets.extend_from_slice(&[b"(", b"type", b"directory"]);
    for _ in 0..17 {
        packets.extend_from_slice(&[
            b"entry", b"(", b"name", &name, b"node",
            b"(", b"type", b"directory",
        ]);
    }
    let data = nar(&packets);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    for _ in 0..17 {
        dec.next().unwrap().unwrap();
    }
    match dec.next() {
        Err(Error::InvalidName(path)) => {
            assert_eq!(17 * MAX_NAME_LEN + 16, path.len());
            assert!(path.len() > MAX_PATH_LEN);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[rstest]
#[case::at_limit(MAX_TARGET_LEN, true)]
#[case::over_limit(MAX_TARGET_LEN + 1, false)]
fn target_length(#[case] len: usize, #[case] ok: bool) {
    let target = vec![b'x'; len];
    let data = nar(&[b"(", b"type", b"symlink", b"target", &target, b")"]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    if ok {
        assert_eq!(Some(Header::symlink("", target)), dec.next().unwrap());
    } else {
        assert!(matches!(
            dec.next(),
            Err(Error::ContentTooLarge { len: 4096, max: 4095 })
        ));
    }
}

#[test]
fn truncated() {
    let data = &COMPLICATED_NAR[..COMPLICATED_NAR.len() - 20];

    let mut dec = Decoder::new(Cursor::new(data)).unwrap();
    let err = loop {
        match dec.next() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("truncated archive must not end cleanly"),
            Err(e) => break e,
        }
    };
    assert!(err.is_unexpected_eof(), "{err:?}");
}

#[test]
fn executable_marker_must_be_empty() {
    let data = nar(&[
        b"(", b"type", b"regular", b"executable", b"yes", b"contents", b"", b")",
    ]);

    let mut dec = Decoder::new(Cursor::new(&data)).unwrap();
    assert!(matches!(dec.next(), Err(Error::UnexpectedToken { .. })));
}
