//! Writes generated artifacts to disk.
//!
//! A file is only touched when its contents actually change, so build systems
//! watching the output tree do not see spurious rebuilds. Replacement goes
//! through a temporary file in the target directory.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Result of committing one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Existing file already had these bytes
    Unchanged,
    Written,
    /// Dry run: the file is missing or differs
    Outdated,
    Failed(String),
}

impl WriteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }
}

/// Compare-then-write committer
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputWriter {
    dry_run: bool,
}

impl OutputWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Write `text` to `path` unless the file already holds exactly those bytes
    pub fn commit(&self, path: &Path, text: &str) -> WriteOutcome {
        match self.try_commit(path, text.as_bytes()) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("failed to write {}: {}", path.display(), e);
                WriteOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_commit(&self, path: &Path, bytes: &[u8]) -> io::Result<WriteOutcome> {
        match fs::read(path) {
            Ok(existing) if existing == bytes => return Ok(WriteOutcome::Unchanged),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if self.dry_run {
            return Ok(WriteOutcome::Outdated);
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::debug!("wrote {}", path.display());
        Ok(WriteOutcome::Written)
    }

    /// Delete a stale artifact; in dry-run mode only reports whether it exists
    pub fn remove(&self, path: &Path) -> io::Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        if !self.dry_run {
            fs::remove_file(path)?;
            tracing::debug!("removed stale {}", path.display());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/a.gen.h");
        let writer = OutputWriter::new(false);

        assert_eq!(writer.commit(&path, "one"), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "one");
        assert_eq!(writer.commit(&path, "one"), WriteOutcome::Unchanged);
        assert_eq!(writer.commit(&path, "two"), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn test_dry_run_reports_outdated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.gen.h");
        let writer = OutputWriter::new(true);

        assert_eq!(writer.commit(&path, "text"), WriteOutcome::Outdated);
        assert!(!path.exists());

        fs::write(&path, "text").unwrap();
        assert_eq!(writer.commit(&path, "text"), WriteOutcome::Unchanged);
    }

    #[test]
    fn test_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let outcome = OutputWriter::new(false).commit(&blocker.join("a.gen.h"), "text");
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.gen.h");
        fs::write(&path, "stale").unwrap();

        assert!(OutputWriter::new(true).remove(&path).unwrap());
        assert!(path.exists());
        assert!(OutputWriter::new(false).remove(&path).unwrap());
        assert!(!path.exists());
        assert!(!OutputWriter::new(false).remove(&path).unwrap());
    }
}
