//! Media file classification by extension.

use std::path::Path;

/// Extensions accepted when expanding a directory entry.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "ogg", "oga", "opus", "m4a", "aac", "wma", "aiff", "aif",
];

/// Lowercased extension of a path, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether a directory member should become a job.
///
/// Hidden files (leading `.`) are never media, whatever their extension.
pub fn is_media_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    if hidden {
        return false;
    }

    extension_of(path).is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}
