//! Copy jobs: the source already has the target format.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use super::staging::{publish, stage_file, Published};
use crate::errors::JobError;

/// Copy `source` to `dest` through a temp file in the destination directory.
pub(crate) fn copy_file(
    source: &Path,
    dest: &Path,
    overwrite: bool,
) -> Result<Published, JobError> {
    let input = File::open(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => JobError::SourceMissing {
            path: source.to_path_buf(),
        },
        _ => JobError::io("opening", source, e),
    })?;

    let mut staged = stage_file(dest)?;
    {
        let mut reader = BufReader::new(input);
        let mut writer = BufWriter::new(staged.as_file_mut());
        io::copy(&mut reader, &mut writer).map_err(|e| JobError::io("copying to", dest, e))?;
        writer
            .flush()
            .map_err(|e| JobError::io("copying to", dest, e))?;
    }
    staged
        .as_file()
        .sync_all()
        .map_err(|e| JobError::io("syncing", dest, e))?;

    publish(staged.into_temp_path(), dest, overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn copies_bytes_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("song.mp3");
        fs::write(&source, b"ID3 fake mp3 data").unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let dest = out.join("001.mp3");

        let result = copy_file(&source, &dest, false).unwrap();

        assert_eq!(result, Published::Written);
        assert_eq!(fs::read(&dest).unwrap(), b"ID3 fake mp3 data");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn vanished_source_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = copy_file(&tmp.path().join("gone.mp3"), &tmp.path().join("01.mp3"), false)
            .unwrap_err();

        assert!(matches!(err, JobError::SourceMissing { .. }));
        assert!(!tmp.path().join("01.mp3").exists());
    }

    #[test]
    fn existing_destination_is_left_alone() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("song.mp3");
        fs::write(&source, b"new").unwrap();
        let dest = tmp.path().join("01.mp3");
        fs::write(&dest, b"old").unwrap();

        assert_eq!(copy_file(&source, &dest, false).unwrap(), Published::DestinationExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }
}
