use crate::wire;

pub const SYMLINK_NAR: &[u8] = include_bytes!("tests/symlink.nar");
pub const HELLOWORLD_NAR: &[u8] = include_bytes!("tests/helloworld.nar");
pub const COMPLICATED_NAR: &[u8] = include_bytes!("tests/complicated.nar");

/// Encode each element as a bytes packet, after the magic. Used to
/// hand-craft archives, valid or not.
pub fn nar(packets: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![];
    wire::write_bytes(&mut out, b"nix-archive-1").unwrap();
    for p in packets {
        wire::write_bytes(&mut out, p).unwrap();
    }
    out
}
