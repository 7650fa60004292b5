//! Filesystem sample store: reads samples next to the source instrument and
//! writes them below the destination directory.

use crate::error::{Error, Result};
use anyhow::Context;
use nanoconv_sfz::path_utils::{normalize_separators, resolve_sample_file};
use nanoconv_sfz::SampleStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// What to do when a destination file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Ask for every existing file
    Ask,
    /// Replace existing files
    Always,
    /// Keep existing files
    Never,
}

impl Default for OverwritePolicy {
    fn default() -> Self {
        Self::Ask
    }
}

/// Decides whether an existing file may be replaced
pub type ConfirmOverwrite = Box<dyn FnMut(&Path) -> bool>;

pub struct FileSampleStore {
    source_dir: PathBuf,
    destination_dir: PathBuf,
    policy: OverwritePolicy,
    confirm: ConfirmOverwrite,
    written: usize,
    kept: usize,
}

impl FileSampleStore {
    /// With [`OverwritePolicy::Ask`] and no [`with_confirm`](Self::with_confirm)
    /// callback, existing files are kept.
    pub fn new(source_dir: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>, policy: OverwritePolicy) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
            policy,
            confirm: Box::new(|_| false),
            written: 0,
            kept: 0,
        }
    }

    pub fn with_confirm(mut self, confirm: impl FnMut(&Path) -> bool + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Files written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Existing files left untouched because of the overwrite policy
    pub fn kept(&self) -> usize {
        self.kept
    }

    /// Where a path recorded in the tree lands below the destination.
    ///
    /// Absolute paths and paths climbing out with `..` are rejected.
    pub fn destination_path(&self, relative: &str) -> Result<PathBuf> {
        let normalized = normalize_separators(relative);
        let mut path = self.destination_dir.clone();
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(Error::SamplePath(relative.to_string())),
            }
        }
        Ok(path)
    }

    /// Write `bytes` below the destination, honoring the overwrite policy.
    ///
    /// Returns false when an existing file was kept.
    pub fn write_file(&mut self, relative: &str, bytes: &[u8]) -> Result<bool> {
        let path = self.destination_path(relative)?;
        if path.exists() && !self.may_overwrite(&path) {
            log::info!("Keeping existing {}", path.display());
            self.kept += 1;
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        self.written += 1;
        Ok(true)
    }

    /// Copy a sample unchanged.
    pub fn copy_sample(&mut self, sample: &str) -> anyhow::Result<bool> {
        let bytes = self.read(sample)?;
        Ok(self.write_file(sample, &bytes)?)
    }

    fn may_overwrite(&mut self, path: &Path) -> bool {
        match self.policy {
            OverwritePolicy::Always => true,
            OverwritePolicy::Never => false,
            OverwritePolicy::Ask => (self.confirm)(path),
        }
    }
}

impl SampleStore for FileSampleStore {
    fn read(&mut self, sample: &str) -> anyhow::Result<Vec<u8>> {
        let path = resolve_sample_file(&self.source_dir, sample);
        fs::read(&path).with_context(|| format!("Failed to read sample {}", path.display()))
    }

    fn write(&mut self, sample: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.write_file(sample, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn store_with(policy: OverwritePolicy) -> (tempfile::TempDir, FileSampleStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/samples")).unwrap();
        fs::write(dir.path().join("src/samples/a.wav"), b"new").unwrap();
        let store = FileSampleStore::new(dir.path().join("src"), dir.path().join("dst"), policy);
        (dir, store)
    }

    #[test]
    fn test_copy_creates_directories() {
        let (dir, mut store) = store_with(OverwritePolicy::Never);
        assert!(store.copy_sample("samples\\a.wav").unwrap());
        assert_eq!(fs::read(dir.path().join("dst/samples/a.wav")).unwrap(), b"new");
        assert_eq!(store.written(), 1);
    }

    #[test]
    fn test_never_keeps_existing_files() {
        let (dir, mut store) = store_with(OverwritePolicy::Never);
        fs::create_dir_all(dir.path().join("dst/samples")).unwrap();
        fs::write(dir.path().join("dst/samples/a.wav"), b"old").unwrap();

        assert!(!store.copy_sample("samples/a.wav").unwrap());
        assert_eq!(fs::read(dir.path().join("dst/samples/a.wav")).unwrap(), b"old");
        assert_eq!(store.kept(), 1);
    }

    #[test]
    fn test_ask_consults_callback() {
        let (dir, store) = store_with(OverwritePolicy::Ask);
        fs::create_dir_all(dir.path().join("dst/samples")).unwrap();
        fs::write(dir.path().join("dst/samples/a.wav"), b"old").unwrap();

        let asked = Rc::new(Cell::new(0));
        let counter = asked.clone();
        let mut store = store.with_confirm(move |_| {
            counter.set(counter.get() + 1);
            true
        });

        assert!(store.copy_sample("samples/a.wav").unwrap());
        assert_eq!(asked.get(), 1);
        assert_eq!(fs::read(dir.path().join("dst/samples/a.wav")).unwrap(), b"new");

        // files that do not exist yet need no confirmation
        assert!(store.write_file("other.wav", b"x").unwrap());
        assert_eq!(asked.get(), 1);
    }

    #[test]
    fn test_paths_outside_destination_are_rejected() {
        let (_dir, store) = store_with(OverwritePolicy::Always);
        assert!(matches!(
            store.destination_path("../escape.wav"),
            Err(Error::SamplePath(_))
        ));
        assert!(matches!(
            store.destination_path("/etc/escape.wav"),
            Err(Error::SamplePath(_))
        ));
        assert!(store.destination_path("./samples/a.wav").is_ok());
    }

    #[test]
    fn test_missing_sample_read_fails() {
        let (_dir, mut store) = store_with(OverwritePolicy::Always);
        assert!(store.read("samples/missing.wav").is_err());
    }
}
