//! Filesystem seam for the migration passes.
//!
//! Transform logic never touches `std::fs` directly: everything goes through
//! [CorpusFs] so the passes are unit-testable against [MemFs] and dry-run is
//! just [DryRunFs] (reads pass through, writes are recorded, nothing mutates).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait CorpusFs: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entries directly under `path`, sorted by name. Sorting keeps every
    /// pass deterministic regardless of readdir order.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real disk access. Used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl CorpusFs for DiskFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to).map(|_| ())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        Ok(entries)
    }
}

/// In-memory filesystem for tests. Directories are implied by file paths and
/// can also be created explicitly (so empty folders are listable).
#[derive(Debug, Default)]
pub struct MemFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<std::collections::BTreeSet<PathBuf>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&self, path: impl AsRef<Path>, contents: &str) {
        let _ = CorpusFs::write(self, path.as_ref(), contents.as_bytes());
    }

    pub fn file_count(&self) -> usize {
        lock(&self.files).len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.files).keys().cloned().collect()
    }

    fn note_ancestors(&self, path: &Path) {
        let mut dirs = lock(&self.dirs);
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
}

impl CorpusFs for MemFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        lock(&self.files).insert(path.to_path_buf(), contents.to_vec());
        self.note_ancestors(path);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = self.read(from)?;
        CorpusFs::write(self, to, &data)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = {
            let mut files = lock(&self.files);
            files.remove(from).ok_or_else(|| not_found(from))?
        };
        CorpusFs::write(self, to, &data)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        lock(&self.dirs).insert(path.to_path_buf());
        self.note_ancestors(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || lock(&self.dirs).contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        lock(&self.dirs).contains(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(path) {
            return Err(not_found(path));
        }
        let mut entries = std::collections::BTreeSet::new();
        for file in lock(&self.files).keys() {
            if file.parent() == Some(path) {
                entries.insert(file.clone());
            }
        }
        for dir in lock(&self.dirs).iter() {
            if dir.parent() == Some(path) {
                entries.insert(dir.clone());
            }
        }
        Ok(entries.into_iter().collect())
    }
}

/// Wraps another filesystem: reads delegate, mutations are recorded as
/// human-readable planned operations and never applied.
pub struct DryRunFs<'a> {
    inner: &'a dyn CorpusFs,
    planned: Mutex<Vec<String>>,
}

impl<'a> DryRunFs<'a> {
    pub fn new(inner: &'a dyn CorpusFs) -> Self {
        Self {
            inner,
            planned: Mutex::new(Vec::new()),
        }
    }

    pub fn planned_ops(&self) -> Vec<String> {
        lock(&self.planned).clone()
    }

    fn plan(&self, op: String) {
        lock(&self.planned).push(op);
    }
}

impl CorpusFs for DryRunFs<'_> {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.plan(format!("write {} ({} bytes)", path.display(), contents.len()));
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.plan(format!("copy {} -> {}", from.display(), to.display()));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.plan(format!("rename {} -> {}", from.display(), to.display()));
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.list_dir(path)
    }
}
