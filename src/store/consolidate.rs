//! Merge per-category poster folders into one flat store without ever
//! overwriting a file. Same-name collisions get a `__<sourceFolder>` suffix,
//! further collisions an incrementing numeric suffix. The plan is computed in
//! full before anything moves, so dry-run is just "print the plan".

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fsio::CorpusFs;
use crate::record::journey::JOURNEYS_FOLDER;

/// Folders under the corpus root that are never treated as categories.
pub const RESERVED_FOLDERS: &[&str] = &[JOURNEYS_FOLDER, "images", "backups"];

/// Give up probing suffixed names after this many attempts; the move for
/// that one file is aborted, not the batch.
const MAX_COLLISION_PROBES: u32 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub renamed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationPlan {
    pub moves: Vec<PlannedMove>,
    /// Files for which no free destination name could be found.
    pub exhausted: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub planned: usize,
    pub moved: usize,
    pub renamed: usize,
    pub failed: Vec<String>,
}

#[derive(Debug)]
pub enum ConsolidateError {
    MissingRoot(PathBuf),
    Io(std::io::Error),
}

impl fmt::Display for ConsolidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot(path) => write!(f, "corpus root not found: {}", path.display()),
            Self::Io(err) => write!(f, "consolidation i/o failure: {err}"),
        }
    }
}

impl From<std::io::Error> for ConsolidateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

pub fn is_reserved_folder(name: &str) -> bool {
    RESERVED_FOLDERS.contains(&name) || name.starts_with('.')
}

/// Category folders under the corpus root, excluding reserved ones and the
/// consolidation target itself.
pub fn category_folders(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    exclude: Option<&str>,
) -> std::io::Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in fs.list_dir(corpus_root)? {
        if !fs.is_dir(&entry) {
            continue;
        }
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_reserved_folder(name) || Some(name) == exclude {
            continue;
        }
        folders.push(entry);
    }
    Ok(folders)
}

/// Compute the full source -> destination mapping. Nothing is touched.
pub fn plan_consolidation(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    target_folder: &str,
) -> Result<ConsolidationPlan, ConsolidateError> {
    if !fs.is_dir(corpus_root) {
        return Err(ConsolidateError::MissingRoot(corpus_root.to_path_buf()));
    }
    let target_dir = corpus_root.join(target_folder);
    let mut plan = ConsolidationPlan::default();

    // Names already claimed: existing files in the target plus names this
    // plan has assigned. Case-insensitive so the store invariant holds on
    // case-preserving filesystems too.
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    if let Ok(existing) = fs.list_dir(&target_dir) {
        for entry in existing {
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                claimed.insert(name.to_lowercase());
            }
        }
    }

    for folder in category_folders(fs, corpus_root, Some(target_folder))? {
        let folder_name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        for entry in fs.list_dir(&folder).map_err(ConsolidateError::Io)? {
            if fs.is_dir(&entry) {
                continue;
            }
            if entry.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(file_name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match free_name(file_name, &folder_name, &claimed) {
                Some(dest_name) => {
                    claimed.insert(dest_name.to_lowercase());
                    plan.moves.push(PlannedMove {
                        renamed: dest_name != file_name,
                        dest: target_dir.join(&dest_name),
                        source: entry,
                    });
                }
                None => plan.exhausted.push(entry),
            }
        }
    }

    Ok(plan)
}

/// Apply a plan. Each failed move is reported and the batch continues.
pub fn apply_consolidation(fs: &dyn CorpusFs, plan: &ConsolidationPlan) -> ConsolidationReport {
    let mut report = ConsolidationReport {
        planned: plan.moves.len(),
        ..ConsolidationReport::default()
    };
    for exhausted in &plan.exhausted {
        report
            .failed
            .push(format!("{}: no free destination name", exhausted.display()));
    }

    for planned in &plan.moves {
        // Never overwrite a distinct existing file, even if the world moved
        // under the plan.
        if fs.exists(&planned.dest) {
            report.failed.push(format!(
                "{}: destination already exists: {}",
                planned.source.display(),
                planned.dest.display()
            ));
            continue;
        }
        if let Some(parent) = planned.dest.parent() {
            if let Err(err) = fs.create_dir_all(parent) {
                report
                    .failed
                    .push(format!("{}: {err}", planned.dest.display()));
                continue;
            }
        }
        match fs.rename(&planned.source, &planned.dest) {
            Ok(()) => {
                report.moved += 1;
                if planned.renamed {
                    report.renamed += 1;
                }
            }
            Err(err) => report
                .failed
                .push(format!("{}: {err}", planned.source.display())),
        }
    }
    report
}

fn free_name(file_name: &str, folder_name: &str, claimed: &BTreeSet<String>) -> Option<String> {
    if !claimed.contains(&file_name.to_lowercase()) {
        return Some(file_name.to_string());
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    };
    let with_ext = |name: String| {
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    };

    let suffixed = with_ext(format!("{stem}__{folder_name}"));
    if !claimed.contains(&suffixed.to_lowercase()) {
        return Some(suffixed);
    }
    for counter in 2..MAX_COLLISION_PROBES {
        let numbered = with_ext(format!("{stem}__{folder_name}_{counter}"));
        if !claimed.contains(&numbered.to_lowercase()) {
            return Some(numbered);
        }
    }
    None
}
