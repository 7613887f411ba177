//! NAR grammar, without I/O details, shared by the [crate::reader] and the
//! [crate::writer].
//!
//! The wire format is an S-expression format, encoded onto the wire
//! using simple encoding rules.
//!
//! # Encoding
//!
//! Lengths are represented as 64-bit unsigned integers in little-endian
//! format. Byte strings, including file contents and syntactic strings
//! part of the grammar, are prefixed by their 64-bit length, and padded
//! to 8-byte (64-bit) alignment with zero bytes. The zero-length string
//! is therefore encoded as eight zero bytes representing its length.
//!
//! # Grammar
//!
//! ```plain
//! archive ::= "nix-archive-1" node
//!
//! node ::= "(" "type" "symlink" "target" string ")"
//!      ||= "(" "type" "regular" ("executable" "")? "contents" string ")"
//!      ||= "(" "type" "directory" entry* ")"
//!
//! entry ::= "entry" "(" "name" string "node" node ")"
//! ```
//!
//! The decoder reads the grammar one [Token] at a time, so it can report
//! precisely where a stream went wrong. The encoder writes pre-encoded
//! runs of tokens (the `TOK_*` constants), which always appear together.
//!
//! # Restrictions
//!
//! Directory entry names cannot have the reserved names `.` and `..`, nor
//! contain forward slashes. They must appear in strictly ascending
//! lexicographic order within a directory, and can be at most
//! [MAX_NAME_LEN] bytes in length.
//!
//! Symlink targets can be at most [MAX_TARGET_LEN] bytes in length.
//!
//! Neither is permitted to be empty, or contain null bytes.

/// The magic string every archive starts with.
pub const MAGIC: &[u8] = b"nix-archive-1";

/// Maximum length of a keyword token. Comfortably above the longest one.
pub const MAX_TOKEN_LEN: usize = 32;
// These values are the standard Linux length limits
/// Maximum length of a directory entry name
pub const MAX_NAME_LEN: usize = 255;
/// Maximum length of a symlink target
pub const MAX_TARGET_LEN: usize = 4095;
/// Maximum length of a whole relative path inside an archive
pub const MAX_PATH_LEN: usize = 4096;

/// The literal keywords of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Open,
    Close,
    Type,
    Regular,
    Executable,
    Contents,
    Symlink,
    Target,
    Directory,
    Entry,
    Name,
    Node,
}

impl Token {
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Token::Open => b"(",
            Token::Close => b")",
            Token::Type => b"type",
            Token::Regular => b"regular",
            Token::Executable => b"executable",
            Token::Contents => b"contents",
            Token::Symlink => b"symlink",
            Token::Target => b"target",
            Token::Directory => b"directory",
            Token::Entry => b"entry",
            Token::Name => b"name",
            Token::Node => b"node",
        }
    }

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        Some(match b {
            b"(" => Token::Open,
            b")" => Token::Close,
            b"type" => Token::Type,
            b"regular" => Token::Regular,
            b"executable" => Token::Executable,
            b"contents" => Token::Contents,
            b"symlink" => Token::Symlink,
            b"target" => Token::Target,
            b"directory" => Token::Directory,
            b"entry" => Token::Entry,
            b"name" => Token::Name,
            b"node" => Token::Node,
            _ => return None,
        })
    }

    /// Human-readable form, used in error messages.
    pub const fn describe(self) -> &'static str {
        match self {
            Token::Open => "\"(\"",
            Token::Close => "\")\"",
            Token::Type => "\"type\"",
            Token::Regular => "\"regular\"",
            Token::Executable => "\"executable\"",
            Token::Contents => "\"contents\"",
            Token::Symlink => "\"symlink\"",
            Token::Target => "\"target\"",
            Token::Directory => "\"directory\"",
            Token::Entry => "\"entry\"",
            Token::Name => "\"name\"",
            Token::Node => "\"node\"",
        }
    }
}

/// Returns true if `name` may appear as a directory entry name.
pub fn is_valid_name(name: &[u8]) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != b"."
        && name != b".."
        && !name.contains(&b'/')
        && !name.contains(&0)
}

/// Returns true if `target` may appear as a symlink target.
pub fn is_valid_target(target: &[u8]) -> bool {
    !target.is_empty() && target.len() <= MAX_TARGET_LEN && !target.contains(&0)
}

#[cfg(test)]
fn token(xs: &[&str]) -> Vec<u8> {
    let mut out = vec![];
    for x in xs {
        crate::wire::write_bytes(&mut out, x.as_bytes()).unwrap();
    }
    out
}

pub const TOK_MAGIC: [u8; 24] = *b"\x0d\0\0\0\0\0\0\0nix-archive-1\0\0\0";
pub const TOK_OPEN: [u8; 32] = *b"\x01\0\0\0\0\0\0\0(\0\0\0\0\0\0\0\x04\0\0\0\0\0\0\0type\0\0\0\0";
pub const TOK_SYM: [u8; 32] = *b"\x07\0\0\0\0\0\0\0symlink\0\x06\0\0\0\0\0\0\0target\0\0";
pub const TOK_REG: [u8; 32] = *b"\x07\0\0\0\0\0\0\0regular\0\x08\0\0\0\0\0\0\0contents";
pub const TOK_EXE: [u8; 64] = *b"\x07\0\0\0\0\0\0\0regular\0\x0a\0\0\0\0\0\0\0executable\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x08\0\0\0\0\0\0\0contents";
pub const TOK_DIR: [u8; 24] = *b"\x09\0\0\0\0\0\0\0directory\0\0\0\0\0\0\0";
pub const TOK_ENT: [u8; 48] = *b"\x05\0\0\0\0\0\0\0entry\0\0\0\x01\0\0\0\0\0\0\0(\0\0\0\0\0\0\0\x04\0\0\0\0\0\0\0name\0\0\0\0";
pub const TOK_NOD: [u8; 48] = *b"\x04\0\0\0\0\0\0\0node\0\0\0\0\x01\0\0\0\0\0\0\0(\0\0\0\0\0\0\0\x04\0\0\0\0\0\0\0type\0\0\0\0";
pub const TOK_PAR: [u8; 16] = *b"\x01\0\0\0\0\0\0\0)\0\0\0\0\0\0\0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        let cases: &[(&[u8], &[&str])] = &[
            (&TOK_MAGIC, &["nix-archive-1"]),
            (&TOK_OPEN, &["(", "type"]),
            (&TOK_SYM, &["symlink", "target"]),
            (&TOK_REG, &["regular", "contents"]),
            (&TOK_EXE, &["regular", "executable", "", "contents"]),
            (&TOK_DIR, &["directory"]),
            (&TOK_ENT, &["entry", "(", "name"]),
            (&TOK_NOD, &["node", "(", "type"]),
            (&TOK_PAR, &[")"]),
        ];

        for &(tok, xs) in cases {
            assert_eq!(tok, token(xs));
            assert_eq!(tok.len() % 8, 0);
        }
    }

    #[test]
    fn keywords_round_trip() {
        for t in [
            Token::Open,
            Token::Close,
            Token::Type,
            Token::Regular,
            Token::Executable,
            Token::Contents,
            Token::Symlink,
            Token::Target,
            Token::Directory,
            Token::Entry,
            Token::Name,
            Token::Node,
        ] {
            assert!(t.as_bytes().len() <= MAX_TOKEN_LEN);
            assert_eq!(Some(t), Token::from_bytes(t.as_bytes()));
        }
        assert_eq!(None, Token::from_bytes(b"nix-archive-1"));
    }

    #[test]
    fn names() {
        assert!(is_valid_name(b"a"));
        assert!(is_valid_name(b".keep"));
        assert!(is_valid_name(&[b'x'; MAX_NAME_LEN]));

        assert!(!is_valid_name(b""));
        assert!(!is_valid_name(b"."));
        assert!(!is_valid_name(b".."));
        assert!(!is_valid_name(b"a/b"));
        assert!(!is_valid_name(b"a\0b"));
        assert!(!is_valid_name(&[b'x'; MAX_NAME_LEN + 1]));
    }
}
