//! Map file parsing.
//!
//! A map file lists, one per line, an output name on the SD card and the
//! source it comes from:
//!
//! ```text
//! # slot 01: audio book
//! 01;/music/books/momo/
//! mp3/0001.mp3;/music/jingles/hello.wav
//! ```
//!
//! Fields are separated by [`FIELD_DELIMITER`]. Blank lines and lines whose
//! first non-blank character is [`COMMENT_MARKER`] are ignored.

mod parser;

pub use parser::{load_map_file, parse_map_str, MapEntry, COMMENT_MARKER, FIELD_DELIMITER};
