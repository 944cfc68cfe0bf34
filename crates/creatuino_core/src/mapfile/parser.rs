//! Map file reader producing ordered `MapEntry` values.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{MalformedMapLine, ParseError};

/// Separator between the output name and the input path.
pub const FIELD_DELIMITER: char = ';';

/// Lines starting with this character are comments.
pub const COMMENT_MARKER: char = '#';

/// One mapping line: where a source should end up on the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapEntry {
    /// 1-based line number in the map file.
    pub line: usize,
    /// Output name relative to the output root.
    pub output_name: String,
    /// Input file or directory as written in the map file.
    pub input_path: PathBuf,
}

/// Read and parse a map file.
///
/// A missing file is reported before anything is read. Every malformed line
/// is collected and reported together.
pub fn load_map_file(path: &Path) -> Result<Vec<MapEntry>, ParseError> {
    if !path.exists() {
        return Err(ParseError::MapFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ParseError::MapFileNotFound {
            path: path.to_path_buf(),
        },
        _ => ParseError::MapFileUnreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let entries = parse_map_str(&content).map_err(|lines| ParseError::MalformedLines {
        path: path.to_path_buf(),
        lines,
    })?;

    tracing::info!(
        "Parsed {} map entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Parse map file content, preserving line order.
///
/// Returns every malformed line if at least one line is bad.
pub fn parse_map_str(content: &str) -> Result<Vec<MapEntry>, Vec<MalformedMapLine>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut entries = Vec::new();
    let mut malformed = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        match parse_line(line_no, line) {
            Ok(entry) => {
                tracing::debug!(
                    "Map line {}: '{}' <- '{}'",
                    line_no,
                    entry.output_name,
                    entry.input_path.display()
                );
                entries.push(entry);
            }
            Err(err) => {
                tracing::warn!("Malformed map {}", err);
                malformed.push(err);
            }
        }
    }

    if malformed.is_empty() {
        Ok(entries)
    } else {
        Err(malformed)
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<MapEntry, MalformedMapLine> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();

    let [output_name, input_path] = fields.as_slice() else {
        return Err(MalformedMapLine::new(
            line_no,
            format!(
                "expected 2 fields separated by '{}', found {}",
                FIELD_DELIMITER,
                fields.len()
            ),
        ));
    };

    if output_name.is_empty() {
        return Err(MalformedMapLine::new(line_no, "output name is empty"));
    }
    if input_path.is_empty() {
        return Err(MalformedMapLine::new(line_no, "input path is empty"));
    }

    Ok(MapEntry {
        line: line_no,
        output_name: (*output_name).to_string(),
        input_path: PathBuf::from(*input_path),
    })
}
