//! Case-insensitive index of the centralized asset store.
//!
//! Built once from a sorted directory listing so lookups are deterministic,
//! then kept current by the resolver as assets are copied in or renamed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fsio::CorpusFs;
use crate::record::poster::CANONICAL_STORE_PREFIX;

/// Folder under the asset root that holds centralized images.
pub const ORIGINALS_FOLDER: &str = "originals";

/// Lookup priority when a reference names a stem without a usable extension.
pub const EXTENSION_PRIORITY: &[&str] = &["webp", "png", "jpg"];

#[derive(Debug, Clone, Default)]
pub struct AssetStoreIndex {
    store_dir: PathBuf,
    /// lowercase filename -> actual filename on disk
    by_name: BTreeMap<String, String>,
    /// lowercase stem -> actual filename; on stem collisions the entry with
    /// the highest-priority extension wins, then lexicographic order.
    by_stem: BTreeMap<String, String>,
}

impl AssetStoreIndex {
    /// Scan `<asset_root>/originals`. A missing store directory yields an
    /// empty index; every reference then resolves to an orphan.
    pub fn scan(fs: &dyn CorpusFs, asset_root: &Path) -> Self {
        let store_dir = asset_root.join(ORIGINALS_FOLDER);
        let mut index = Self {
            store_dir: store_dir.clone(),
            by_name: BTreeMap::new(),
            by_stem: BTreeMap::new(),
        };

        let Ok(entries) = fs.list_dir(&store_dir) else {
            return index;
        };
        for entry in entries {
            if fs.is_dir(&entry) {
                continue;
            }
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                index.insert(name);
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Actual on-disk filenames, sorted.
    pub fn names(&self) -> Vec<String> {
        self.by_name.values().cloned().collect()
    }

    pub fn insert(&mut self, name: &str) {
        self.by_name.insert(name.to_lowercase(), name.to_string());
        let stem = stem_of(name).to_lowercase();
        let takes_slot = match self.by_stem.get(&stem) {
            Some(existing) => replaces_for_stem(name, existing),
            None => true,
        };
        if takes_slot {
            self.by_stem.insert(stem, name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.by_name.remove(&name.to_lowercase());
        let stem = stem_of(name).to_lowercase();
        if self.by_stem.get(&stem).map(String::as_str) == Some(name) {
            self.by_stem.remove(&stem);
            // Reinstate the next-best holder of this stem, if any.
            let holders: Vec<String> = self
                .by_name
                .values()
                .filter(|other| stem_of(other).to_lowercase() == stem)
                .cloned()
                .collect();
            for holder in holders {
                let takes_slot = match self.by_stem.get(&stem) {
                    Some(existing) => replaces_for_stem(&holder, existing),
                    None => true,
                };
                if takes_slot {
                    self.by_stem.insert(stem.clone(), holder);
                }
            }
        }
    }

    /// Case-insensitive exact filename lookup.
    pub fn lookup(&self, filename: &str) -> Option<&str> {
        self.by_name.get(&filename.to_lowercase()).map(String::as_str)
    }

    /// Case-insensitive stem lookup (reference without extension).
    pub fn lookup_stem(&self, stem: &str) -> Option<&str> {
        self.by_stem.get(&stem.to_lowercase()).map(String::as_str)
    }

    /// Site-relative canonical path for an asset in the store.
    pub fn asset_path(&self, actual_name: &str) -> String {
        format!("{CANONICAL_STORE_PREFIX}{actual_name}")
    }

    /// On-disk path for an asset in the store.
    pub fn disk_path(&self, actual_name: &str) -> PathBuf {
        self.store_dir.join(actual_name)
    }
}

pub fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && super::resolver::is_known_extension(ext) => stem,
        _ => name,
    }
}

fn extension_rank(name: &str) -> usize {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();
    EXTENSION_PRIORITY
        .iter()
        .position(|p| *p == ext)
        .unwrap_or(EXTENSION_PRIORITY.len())
}

/// `candidate` takes the stem slot from `existing` when its extension ranks
/// higher, or ties and sorts earlier.
fn replaces_for_stem(candidate: &str, existing: &str) -> bool {
    let (c, e) = (extension_rank(candidate), extension_rank(existing));
    c < e || (c == e && candidate < existing)
}
