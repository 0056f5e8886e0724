//! Calibration image discovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

/// Extensions accepted as calibration images, matched without regard to case.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("image directory {0} does not exist or is not a directory")]
    NotADirectory(PathBuf),
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

/// List every image file directly inside `dir`, sorted.
///
/// On case-insensitive file systems the same file can match more than one
/// pattern; such duplicates are reported once.
pub fn discover_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, DiscoveryError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }

    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());

    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        let pattern = format!("{escaped}/*.{ext}");
        for path in glob::glob_with(&pattern, options)? {
            let path = path?;
            if !path.is_file() {
                continue;
            }
            if seen.insert(path.to_string_lossy().to_lowercase()) {
                paths.push(path);
            }
        }
    }

    paths.sort();
    debug!("found {} images in {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_mixed_case_extensions_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.PNG", "a.jpg", "c.JpEg", "d.tif", "e.TIFF", "f.bmp"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        let found = discover_images(dir.path()).expect("discover");
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.JpEg", "d.tif", "e.TIFF", "f.bmp"]);
    }

    #[test]
    fn ignores_other_files_and_subdirectories() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.txt"), b"x").expect("write");
        fs::write(dir.path().join("board.png.bak"), b"x").expect("write");
        fs::create_dir(dir.path().join("nested.png")).expect("mkdir");
        fs::write(dir.path().join("view.png"), b"x").expect("write");

        let found = discover_images(dir.path()).expect("discover");
        assert_eq!(found, vec![dir.path().join("view.png")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            discover_images(dir.path().join("absent")),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }
}
