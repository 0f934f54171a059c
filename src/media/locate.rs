use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

/// Candidate artifact extensions, probed in this order during the
/// extension-swap step. Closed set shared with the delivery side.
pub const CANDIDATE_EXTENSIONS: &[&str] = &["mp3", "m4a", "webm", "mp4"];

/// Directories the locator searches besides the expected path. In
/// containerized deployments the extractor's working directory, the temp
/// dir and the platform scratch dir can all diverge from what the library
/// assumed, so the reported output path is not trusted.
#[derive(Debug, Clone)]
pub struct SearchRoots {
    pub scratch: PathBuf,
    pub alt_root: PathBuf,
}

impl Default for SearchRoots {
    fn default() -> Self {
        Self {
            scratch: PathBuf::from("/tmp"),
            alt_root: PathBuf::from("/app"),
        }
    }
}

impl SearchRoots {
    /// Expected path first, then scratch, cwd and the alternate root.
    fn locations(&self, expected: &Path) -> Vec<PathBuf> {
        let base = expected
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| expected.to_path_buf());
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        vec![
            expected.to_path_buf(),
            self.scratch.join(&base),
            cwd.join(&base),
            self.alt_root.join(&base),
        ]
    }

    fn scan_dirs(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        vec![self.scratch.clone(), cwd, self.alt_root.clone()]
    }
}

/// Find the downloaded file, trying progressively weaker evidence:
///
/// 1. the expected path itself;
/// 2. its basename under scratch, cwd and the alternate root;
/// 3. the same four spots with each candidate extension swapped in;
/// 4. the newest file carrying the expected extension in scratch, cwd and
///    the alternate root, in that order.
///
/// Step 4 is a race-prone last resort; unique per-request filenames (the
/// request id in the output template) keep concurrent downloads from ever
/// needing it.
pub fn locate(expected: &Path, roots: &SearchRoots, context: &str) -> Result<PathBuf> {
    debug!("{context} - looking for artifact at {}", expected.display());

    for candidate in roots.locations(expected) {
        if candidate.is_file() {
            info!("{context} - artifact found: {}", candidate.display());
            return Ok(candidate);
        }
    }
    warn!(
        "{context} - artifact missing at expected path {}, trying extension variants",
        expected.display()
    );

    for ext in CANDIDATE_EXTENSIONS {
        let swapped = expected.with_extension(ext);
        for candidate in roots.locations(&swapped) {
            if candidate.is_file() {
                info!(
                    "{context} - artifact found with swapped extension: {}",
                    candidate.display()
                );
                return Ok(candidate);
            }
        }
    }

    let wanted_ext = expected
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_string();
    for dir in roots.scan_dirs() {
        if let Some(newest) = newest_with_extension(&dir, &wanted_ext) {
            warn!(
                "{context} - falling back to newest .{wanted_ext} file: {}",
                newest.display()
            );
            return Ok(newest);
        }
    }

    Err(anyhow!(
        "{context} - artifact not found anywhere, expected {}",
        expected.display()
    ))
}

/// Most recently modified regular file in `dir` with the given extension.
fn newest_with_extension(dir: &Path, ext: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(stamp) = meta.modified().or_else(|_| meta.created()) else {
            continue;
        };
        match &newest {
            Some((best, _)) if *best >= stamp => {}
            _ => newest = Some((stamp, path)),
        }
    }

    newest.map(|(_, p)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn roots(scratch: &TempDir, alt: &TempDir) -> SearchRoots {
        SearchRoots {
            scratch: scratch.path().to_path_buf(),
            alt_root: alt.path().to_path_buf(),
        }
    }

    #[test]
    fn test_expected_path_wins_over_scratch_copy() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        let expected = home.path().join("song.mp3");
        fs::write(&expected, b"expected").unwrap();
        fs::write(scratch.path().join("song.mp3"), b"scratch").unwrap();

        let found = locate(&expected, &roots(&scratch, &alt), "test").unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_basename_found_in_scratch() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();

        let expected = PathBuf::from("/nonexistent/dir/song.mp3");
        fs::write(scratch.path().join("song.mp3"), b"x").unwrap();

        let found = locate(&expected, &roots(&scratch, &alt), "test").unwrap();
        assert_eq!(found, scratch.path().join("song.mp3"));
    }

    #[test]
    fn test_basename_found_in_alt_root() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();

        let expected = PathBuf::from("/nonexistent/dir/clip.mp4");
        fs::write(alt.path().join("clip.mp4"), b"x").unwrap();

        let found = locate(&expected, &roots(&scratch, &alt), "test").unwrap();
        assert_eq!(found, alt.path().join("clip.mp4"));
    }

    #[test]
    fn test_extension_swap() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        // foo.mp4 expected, only foo.mp3 exists
        let expected = home.path().join("foo.mp4");
        fs::write(home.path().join("foo.mp3"), b"x").unwrap();

        let found = locate(&expected, &roots(&scratch, &alt), "test").unwrap();
        assert_eq!(found, home.path().join("foo.mp3"));
    }

    #[test]
    fn test_newest_file_fallback_prefers_scratch() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();

        fs::write(scratch.path().join("old.mp3"), b"old").unwrap();
        fs::write(scratch.path().join("new.mp3"), b"new").unwrap();
        // Different basename than anything expected, so only step 4 can hit.
        let expected = PathBuf::from("/nonexistent/dir/totally-absent.mp3");

        let found = locate(&expected, &roots(&scratch, &alt), "test").unwrap();
        assert_eq!(found.parent().unwrap(), scratch.path());
        assert_eq!(found.extension().unwrap(), "mp3");
    }

    #[test]
    fn test_newest_file_ignores_other_extensions() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();

        fs::write(scratch.path().join("unrelated.txt"), b"x").unwrap();
        let expected = PathBuf::from("/nonexistent/dir/absent.ogg");

        let err = locate(&expected, &roots(&scratch, &alt), "test").unwrap_err();
        assert!(err.to_string().contains("absent.ogg"));
    }

    #[test]
    fn test_exhaustion_carries_expected_path() {
        let scratch = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();

        let expected = PathBuf::from("/nonexistent/dir/ghost.ogg");
        let err = locate(&expected, &roots(&scratch, &alt), "ctx").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost.ogg"));
        assert!(msg.contains("ctx"));
    }
}
