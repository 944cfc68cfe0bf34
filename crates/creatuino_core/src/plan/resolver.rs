//! Expansion of map entries into concrete jobs.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::media::{extension_of, is_media_file};
use super::types::{Job, JobKind, SequenceIndex};
use crate::config::Settings;
use crate::errors::PlanIssue;
use crate::mapfile::MapEntry;

/// Settings the resolver needs, derived once from `Settings`.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Relative input paths are resolved against this directory.
    pub base_dir: PathBuf,
    /// Canonical output extension, lowercase, no dot.
    pub target_extension: String,
    /// Re-encode sources already in the target format.
    pub recode: bool,
    /// Minimum ordinal width for directory expansion.
    pub min_ordinal_width: usize,
}

impl ResolverConfig {
    pub fn from_settings(settings: &Settings, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            target_extension: settings.encoder.normalized_extension(),
            recode: settings.encoder.recode,
            min_ordinal_width: settings.jobs.min_ordinal_width,
        }
    }
}

/// What a map entry's input path turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// A single regular file.
    File(PathBuf),
    /// A directory whose media files are expanded.
    Dir(PathBuf),
}

/// Turns map entries into jobs.
#[derive(Debug, Clone)]
pub struct EntryResolver {
    config: ResolverConfig,
}

impl EntryResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Classify the entry's input path.
    pub fn classify(&self, entry: &MapEntry) -> Result<ResolvedInput, PlanIssue> {
        let path = if entry.input_path.is_relative() {
            self.config.base_dir.join(&entry.input_path)
        } else {
            entry.input_path.clone()
        };

        let invalid = |reason: String| PlanIssue::InvalidInputPath {
            line: entry.line,
            path: path.clone(),
            reason,
        };

        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => invalid("does not exist".to_string()),
            _ => invalid(e.to_string()),
        })?;

        if metadata.is_file() {
            Ok(ResolvedInput::File(path))
        } else if metadata.is_dir() {
            Ok(ResolvedInput::Dir(path))
        } else {
            Err(invalid("not a regular file or directory".to_string()))
        }
    }

    /// Resolve one entry into its jobs.
    ///
    /// `entry_index` is the entry's position among all entries and becomes
    /// the first half of each job's `SequenceIndex`.
    pub fn resolve(&self, entry_index: usize, entry: &MapEntry) -> Result<Vec<Job>, PlanIssue> {
        let output = validate_output_name(entry)?;

        match self.classify(entry)? {
            ResolvedInput::File(source) => {
                let dest = output.with_extension(&self.config.target_extension);
                let kind = self.kind_for(&source);
                Ok(vec![Job {
                    source_path: source,
                    dest_path: dest,
                    kind,
                    sequence_index: SequenceIndex::new(entry_index, 1),
                    map_line: entry.line,
                }])
            }
            ResolvedInput::Dir(dir) => {
                let files = list_media_files(&dir).map_err(|e| PlanIssue::InvalidInputPath {
                    line: entry.line,
                    path: dir.clone(),
                    reason: format!("cannot list directory: {}", e),
                })?;

                if files.is_empty() {
                    tracing::warn!(
                        "Line {}: directory {} contains no media files",
                        entry.line,
                        dir.display()
                    );
                }

                let width = ordinal_width(files.len(), self.config.min_ordinal_width);
                let jobs = files
                    .into_iter()
                    .enumerate()
                    .map(|(i, source)| {
                        let ordinal = i + 1;
                        let name = format!(
                            "{:0width$}.{}",
                            ordinal,
                            self.config.target_extension,
                            width = width
                        );
                        let kind = self.kind_for(&source);
                        Job {
                            source_path: source,
                            dest_path: output.join(name),
                            kind,
                            sequence_index: SequenceIndex::new(entry_index, ordinal),
                            map_line: entry.line,
                        }
                    })
                    .collect();
                Ok(jobs)
            }
        }
    }

    /// Copy when the source already has the target format, unless recoding.
    fn kind_for(&self, source: &Path) -> JobKind {
        let same_format =
            extension_of(source).is_some_and(|ext| ext == self.config.target_extension);
        if same_format && !self.config.recode {
            JobKind::Copy
        } else {
            JobKind::Encode
        }
    }
}

/// Resolve every entry, keeping failures next to successes.
///
/// One entry's failure never stops resolution of the others; the planner
/// decides what to do with the collected issues.
pub fn resolve_all(
    resolver: &EntryResolver,
    entries: &[MapEntry],
) -> Vec<Result<Vec<Job>, PlanIssue>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let result = resolver.resolve(i, entry);
            match &result {
                Ok(jobs) => tracing::debug!(
                    "Line {}: '{}' resolved to {} job(s)",
                    entry.line,
                    entry.output_name,
                    jobs.len()
                ),
                Err(issue) => tracing::debug!("Resolution failed: {}", issue),
            }
            result
        })
        .collect()
}

/// Output names must be non-empty relative paths without `..`.
fn validate_output_name(entry: &MapEntry) -> Result<PathBuf, PlanIssue> {
    let invalid = |reason: &str| PlanIssue::InvalidOutputName {
        line: entry.line,
        name: entry.output_name.clone(),
        reason: reason.to_string(),
    };

    let path = Path::new(&entry.output_name);
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the output root"))
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(invalid("must name a file or directory"));
    }
    Ok(normalized)
}

/// Regular media files directly inside `dir`, sorted by file name.
///
/// Only a failure to read `dir` itself is an error. Members that cannot be
/// inspected, such as dangling symlinks, are skipped.
fn list_media_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_media_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Digits needed for the largest ordinal, but at least `min_width`.
fn ordinal_width(count: usize, min_width: usize) -> usize {
    count.max(1).to_string().len().max(min_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(base: &Path) -> EntryResolver {
        EntryResolver::new(ResolverConfig {
            base_dir: base.to_path_buf(),
            target_extension: "mp3".to_string(),
            recode: false,
            min_ordinal_width: 1,
        })
    }

    fn entry(line: usize, output: &str, input: &str) -> MapEntry {
        MapEntry {
            line,
            output_name: output.to_string(),
            input_path: PathBuf::from(input),
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"FAKE").unwrap();
    }

    #[test]
    fn file_entry_gets_target_extension() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("src/a.wav"));

        let jobs = resolver(tmp.path())
            .resolve(0, &entry(1, "track1", "src/a.wav"))
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].dest_path, PathBuf::from("track1.mp3"));
        assert_eq!(jobs[0].kind, JobKind::Encode);
        assert_eq!(jobs[0].source_path, tmp.path().join("src/a.wav"));
        assert_eq!(jobs[0].sequence_index, SequenceIndex::new(0, 1));
    }

    #[test]
    fn same_format_source_is_copied_unless_recode() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("song.MP3"));
        let e = entry(1, "mp3/0001.mp3", "song.MP3");

        let jobs = resolver(tmp.path()).resolve(0, &e).unwrap();
        assert_eq!(jobs[0].kind, JobKind::Copy);

        let recoding = EntryResolver::new(ResolverConfig {
            recode: true,
            ..resolver(tmp.path()).config
        });
        let jobs = recoding.resolve(0, &e).unwrap();
        assert_eq!(jobs[0].kind, JobKind::Encode);
    }

    #[test]
    fn directory_expands_sorted_with_ordinals() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("src/dir/c.wav"));
        touch(&tmp.path().join("src/dir/b.wav"));

        let jobs = resolver(tmp.path())
            .resolve(1, &entry(2, "track2.mp3", "src/dir/"))
            .unwrap();

        let dests: Vec<_> = jobs.iter().map(|j| j.dest_path.clone()).collect();
        assert_eq!(
            dests,
            vec![
                PathBuf::from("track2.mp3/1.mp3"),
                PathBuf::from("track2.mp3/2.mp3")
            ]
        );
        assert!(jobs[0].source_path.ends_with("b.wav"));
        assert!(jobs[1].source_path.ends_with("c.wav"));
        assert_eq!(jobs[1].sequence_index, SequenceIndex::new(1, 2));
    }

    #[test]
    fn directory_filters_hidden_and_non_media() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("album");
        touch(&dir.join("01.flac"));
        touch(&dir.join(".02.flac"));
        touch(&dir.join("cover.jpg"));
        touch(&dir.join("nested/03.flac"));

        let jobs = resolver(tmp.path())
            .resolve(0, &entry(1, "01", "album"))
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].dest_path, PathBuf::from("01/1.mp3"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_in_directory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("album");
        touch(&dir.join("01.wav"));
        std::os::unix::fs::symlink(dir.join("gone.wav"), dir.join("02.wav")).unwrap();

        let jobs = resolver(tmp.path())
            .resolve(0, &entry(1, "01", "album"))
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_path, dir.join("01.wav"));
        assert_eq!(jobs[0].dest_path, PathBuf::from("01/1.mp3"));
    }

    #[test]
    fn ordinal_width_grows_with_count() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("many");
        for i in 0..12 {
            touch(&dir.join(format!("t{:02}.wav", i)));
        }

        let jobs = resolver(tmp.path())
            .resolve(0, &entry(1, "02", "many"))
            .unwrap();

        assert_eq!(jobs.len(), 12);
        assert_eq!(jobs[0].dest_path, PathBuf::from("02/01.mp3"));
        assert_eq!(jobs[11].dest_path, PathBuf::from("02/12.mp3"));
    }

    #[test]
    fn min_ordinal_width_is_respected() {
        assert_eq!(ordinal_width(2, 1), 1);
        assert_eq!(ordinal_width(2, 3), 3);
        assert_eq!(ordinal_width(1000, 3), 4);
        assert_eq!(ordinal_width(0, 1), 1);
    }

    #[test]
    fn empty_directory_yields_no_jobs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        touch(&tmp.path().join("empty/notes.txt"));

        let jobs = resolver(tmp.path())
            .resolve(0, &entry(1, "03", "empty"))
            .unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn missing_input_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let err = resolver(tmp.path())
            .resolve(0, &entry(4, "x", "nope.wav"))
            .unwrap_err();

        match err {
            PlanIssue::InvalidInputPath { line, reason, .. } => {
                assert_eq!(line, 4);
                assert!(reason.contains("does not exist"));
            }
            other => panic!("unexpected issue: {:?}", other),
        }
    }

    #[test]
    fn output_name_must_stay_inside_root() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.wav"));
        let r = resolver(tmp.path());

        for bad in ["../escape", "/abs/path", "./.", "a/../../b"] {
            let err = r.resolve(0, &entry(1, bad, "a.wav")).unwrap_err();
            assert!(
                matches!(err, PlanIssue::InvalidOutputName { .. }),
                "{} should be rejected",
                bad
            );
        }

        let ok = r.resolve(0, &entry(1, "./01/intro", "a.wav")).unwrap();
        assert_eq!(ok[0].dest_path, PathBuf::from("01/intro.mp3"));
    }

    #[test]
    fn resolve_all_continues_after_failure() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.wav"));
        touch(&tmp.path().join("b.wav"));

        let entries = vec![
            entry(1, "one", "a.wav"),
            entry(2, "two", "missing.wav"),
            entry(3, "three", "b.wav"),
        ];
        let results = resolve_all(&resolver(tmp.path()), &entries);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
