pub mod timecode;

pub use timecode::{decode, decode_remote, encode, TimeCode, TIMECODE_TEXT_LEN};
