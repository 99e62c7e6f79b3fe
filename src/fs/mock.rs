// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct MockFile {
    contents: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<PathBuf, MockFile>,
    dirs: BTreeSet<PathBuf>,
    /// Logical clock in seconds; every write advances it by one.
    clock: u64,
}

impl MockState {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_secs(self.clock)
    }

    fn ensure_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
    }
}

/// In-memory filesystem with a deterministic modification clock.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.lock().unwrap();
        let modified = state.tick();
        state.ensure_parents(&path);
        state.files.insert(
            path,
            MockFile {
                contents: content.into(),
                modified,
            },
        );
    }

    /// Bump a file's modification time to "now" on the logical clock.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        let modified = state.tick();
        if let Some(file) = state.files.get_mut(path.as_ref()) {
            file.modified = modified;
        }
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.files.get(path.as_ref()).map(|f| f.contents.clone())
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock().unwrap();
        state.dirs.contains(path.as_ref())
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.files.get(path) {
            Some(file) => Ok(file.contents.clone()),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.dirs.insert(path.to_path_buf());
        state.ensure_parents(path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        let state = self.state.lock().unwrap();
        state.files.get(path).map(|f| f.modified)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect())
    }

    fn prune_empty_dirs(&self, start: &Path, stop: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            let occupied = state.files.keys().any(|p| p.starts_with(&current))
                || state
                    .dirs
                    .iter()
                    .any(|d| d != &current && d.starts_with(&current));
            if occupied {
                break;
            }
            state.dirs.remove(&current);
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }
}
