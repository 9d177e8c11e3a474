//! Building the ordered source list for a job.

use super::error::BatchError;
use crate::image_io::is_supported_input;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Expand `inputs` into source paths.
///
/// Directories contribute their supported image files (not recursing),
/// sorted by path. Anything else is passed through unchanged so that a
/// missing or unreadable file still shows up as a failed item in the
/// report.
pub fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, BatchError> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = images_in_dir(input)?;
            debug!(dir = %input.display(), count = found.len(), "Collected images from directory");
            sources.append(&mut found);
        } else {
            sources.push(input.clone());
        }
    }

    Ok(sources)
}

fn images_in_dir(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let unreadable = |source| BatchError::SourceListUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_supported_input(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Read a newline-separated list of source paths.
///
/// Blank lines and lines starting with `#` are skipped. Relative paths are
/// taken relative to the list file's directory.
pub fn read_source_list(list: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let content = fs::read_to_string(list).map_err(|source| BatchError::SourceListUnreadable {
        path: list.to_path_buf(),
        source,
    })?;
    let base = list.parent().unwrap_or_else(|| Path::new(""));

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let path = Path::new(line);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_directory_expansion_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.webp"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let sources = collect_sources(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp"]);
    }

    #[test]
    fn test_files_pass_through_in_order() {
        let inputs = vec![PathBuf::from("/z/last.png"), PathBuf::from("/a/missing.jpg")];
        assert_eq!(collect_sources(&inputs).unwrap(), inputs);
    }

    #[test]
    fn test_source_list_skips_comments_and_resolves_relative() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "# holiday\n\nbeach.jpg\n  /abs/sunset.png  \n").unwrap();

        let sources = read_source_list(&list).unwrap();
        assert_eq!(
            sources,
            vec![dir.path().join("beach.jpg"), PathBuf::from("/abs/sunset.png")]
        );
    }

    #[test]
    fn test_missing_source_list_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = read_source_list(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, BatchError::SourceListUnreadable { .. }));
    }
}
