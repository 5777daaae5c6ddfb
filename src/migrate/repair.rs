//! Post-reorganization integrity sweep: re-point image references at the
//! centralized store, and optionally strip category prefixes from store
//! assets when the bare name is still unique.
//!
//! Journey records are repaired too, but only their poster `thumbnail`
//! fields; `filename` is the join key into the poster corpus and is never
//! rewritten. The de-prefix rename is atomic per asset: the full referencer
//! set is computed and validated before the rename commits.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::fsio::CorpusFs;
use crate::migrate::batch::{json_files_in, poster_files, write_with_backup, BackupPlan, BatchError};
use crate::migrate::report::{ErrorKind, MigrationReport};
use crate::record::journey::JOURNEYS_FOLDER;
use crate::record::poster::{to_record_json, CANONICAL_STORE_PREFIX};
use crate::store::index::AssetStoreIndex;
use crate::store::resolver::strip_category_prefix;
use crate::store::ImageResolver;

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Also run the de-prefix rename pass over the store.
    pub deprefix: bool,
}

pub fn run_repair(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    asset_root: &Path,
    backup: &BackupPlan,
    options: &RepairOptions,
) -> Result<MigrationReport, BatchError> {
    if !fs.is_dir(corpus_root) {
        return Err(BatchError::MissingRoot(corpus_root.to_path_buf()));
    }

    let mut report = MigrationReport::default();
    let index = AssetStoreIndex::scan(fs, asset_root);
    let resolver = ImageResolver::new(index);

    let posters = poster_files(fs, corpus_root)?;
    let journeys = journey_files(fs, corpus_root);

    for path in &posters {
        repair_file(fs, corpus_root, path, &resolver, backup, false, &mut report);
    }
    for path in &journeys {
        repair_file(fs, corpus_root, path, &resolver, backup, true, &mut report);
    }

    if options.deprefix {
        deprefix_assets(fs, corpus_root, &posters, &journeys, resolver, backup, &mut report);
    }

    Ok(report)
}

fn journey_files(fs: &dyn CorpusFs, corpus_root: &Path) -> Vec<PathBuf> {
    json_files_in(fs, &corpus_root.join(JOURNEYS_FOLDER)).unwrap_or_default()
}

fn repair_file(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    path: &Path,
    resolver: &ImageResolver,
    backup: &BackupPlan,
    is_journey: bool,
    report: &mut MigrationReport,
) {
    report.scanned += 1;
    let raw = match fs.read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            report.push_error(path, ErrorKind::Io, err.to_string());
            return;
        }
    };
    let mut value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            report.push_error(path, ErrorKind::Parse, err.to_string());
            return;
        }
    };

    let mut orphans: Vec<String> = Vec::new();
    let mut fix = |reference: &str| -> Option<String> {
        if !needs_repair(reference, resolver.index()) {
            return None;
        }
        match resolver.resolve(reference) {
            Some(path) => Some(path),
            None => {
                orphans.push(reference.to_string());
                None
            }
        }
    };
    let changes = if is_journey {
        rewrite_journey_refs(&mut value, &mut fix)
    } else {
        rewrite_poster_refs(&mut value, &mut fix)
    };

    for orphan in orphans {
        report.push_orphan(path, orphan);
    }

    if changes == 0 {
        report.push_outcome(path, kind_label(is_journey), "unchanged", "");
        return;
    }
    match write_with_backup(fs, corpus_root, path, to_record_json(&value).as_bytes(), backup) {
        Ok(()) => {
            report.repaired_references += changes;
            report.normalized += 1;
            report.push_outcome(
                path,
                kind_label(is_journey),
                "repaired",
                format!("{changes} reference(s)"),
            );
        }
        Err(err) => report.push_error(path, ErrorKind::WriteFailure, err.to_string()),
    }
}

fn kind_label(is_journey: bool) -> &'static str {
    if is_journey {
        "journey"
    } else {
        "poster"
    }
}

/// A reference needs repair when it is not a live canonical store path.
/// External http(s) references are never touched.
pub fn needs_repair(reference: &str, index: &AssetStoreIndex) -> bool {
    if reference.starts_with("http") {
        return false;
    }
    match reference.strip_prefix(CANONICAL_STORE_PREFIX) {
        Some(name) => index.lookup(name).is_none(),
        None => true,
    }
}

/// Rewrite every image slot of a poster record through `fix`.
/// Slots: `front.thumbnail`, `back.image.src`, `back.images[*].src`.
pub fn rewrite_poster_refs(
    value: &mut Value,
    fix: &mut impl FnMut(&str) -> Option<String>,
) -> usize {
    let mut changes = 0;
    if let Some(front) = value.get_mut("front").and_then(Value::as_object_mut) {
        changes += rewrite_str_field(front, "thumbnail", fix);
    }
    if let Some(back) = value.get_mut("back").and_then(Value::as_object_mut) {
        if let Some(image) = back.get_mut("image").and_then(Value::as_object_mut) {
            changes += rewrite_str_field(image, "src", fix);
        }
        if let Some(images) = back.get_mut("images").and_then(Value::as_array_mut) {
            for entry in images {
                if let Some(object) = entry.as_object_mut() {
                    changes += rewrite_str_field(object, "src", fix);
                }
            }
        }
    }
    changes
}

/// Journeys expose exactly one repairable slot per poster reference.
pub fn rewrite_journey_refs(
    value: &mut Value,
    fix: &mut impl FnMut(&str) -> Option<String>,
) -> usize {
    let mut changes = 0;
    if let Some(posters) = value.get_mut("posters").and_then(Value::as_array_mut) {
        for entry in posters {
            if let Some(object) = entry.as_object_mut() {
                changes += rewrite_str_field(object, "thumbnail", fix);
            }
        }
    }
    changes
}

fn rewrite_str_field(
    object: &mut Map<String, Value>,
    key: &str,
    fix: &mut impl FnMut(&str) -> Option<String>,
) -> usize {
    let Some(current) = object.get(key).and_then(Value::as_str).map(str::to_string) else {
        return 0;
    };
    match fix(&current) {
        Some(new_value) if new_value != current => {
            object.insert(key.to_string(), Value::String(new_value));
            1
        }
        _ => 0,
    }
}

/// Strip `<category>_` prefixes from store assets whose bare name is unique
/// store-wide, rewriting every referencing record in the same step. Per
/// asset: compute and validate the full referencer set, then rename, then
/// write the prepared contents.
fn deprefix_assets(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    posters: &[PathBuf],
    journeys: &[PathBuf],
    mut resolver: ImageResolver,
    backup: &BackupPlan,
    report: &mut MigrationReport,
) {
    let names = resolver.index().names();

    // Bare names must stay unique: a candidate is skipped when the bare name
    // already exists or two prefixed assets would collapse onto it.
    let mut bare_counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for name in &names {
        if let Some(bare) = strip_category_prefix(name) {
            *bare_counts.entry(bare.to_lowercase()).or_insert(0) += 1;
        }
    }

    for name in &names {
        let Some(bare) = strip_category_prefix(name).map(str::to_string) else {
            continue;
        };
        if resolver.index().lookup(&bare).is_some() {
            continue;
        }
        if bare_counts.get(&bare.to_lowercase()).copied().unwrap_or(0) != 1 {
            continue;
        }

        let old_ref = format!("{CANONICAL_STORE_PREFIX}{name}");
        let new_ref = format!("{CANONICAL_STORE_PREFIX}{bare}");

        // Compute and validate the full referencer set first; a file that
        // fails to parse vetoes the rename.
        let mut prepared: Vec<(PathBuf, String)> = Vec::new();
        let mut veto = false;
        for (path, is_journey) in posters
            .iter()
            .map(|p| (p, false))
            .chain(journeys.iter().map(|p| (p, true)))
        {
            let raw = match fs.read_to_string(path) {
                Ok(raw) => raw,
                Err(err) => {
                    report.push_error(path, ErrorKind::Io, err.to_string());
                    veto = true;
                    break;
                }
            };
            if !raw.contains(old_ref.as_str()) {
                continue;
            }
            let mut value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    report.push_error(path, ErrorKind::Parse, err.to_string());
                    veto = true;
                    break;
                }
            };
            let mut fix = |reference: &str| -> Option<String> {
                (reference == old_ref).then(|| new_ref.clone())
            };
            let changes = if is_journey {
                rewrite_journey_refs(&mut value, &mut fix)
            } else {
                rewrite_poster_refs(&mut value, &mut fix)
            };
            if changes > 0 {
                prepared.push((path.clone(), to_record_json(&value)));
            }
        }
        if veto {
            continue;
        }

        let old_path = resolver.index().disk_path(name);
        let new_path = resolver.index().disk_path(&bare);
        if let Err(err) = fs.rename(&old_path, &new_path) {
            report.push_error(&old_path, ErrorKind::Io, err.to_string());
            continue;
        }
        resolver.index_mut().remove(name);
        resolver.index_mut().insert(&bare);
        report.renamed_assets += 1;
        report.push_outcome(&old_path, "asset", "renamed", bare.clone());

        for (path, contents) in prepared {
            match write_with_backup(fs, corpus_root, &path, contents.as_bytes(), backup) {
                Ok(()) => {
                    report.repaired_references += 1;
                    report.push_outcome(&path, "record", "repaired", format!("-> {new_ref}"));
                }
                Err(err) => report.push_error(&path, ErrorKind::WriteFailure, err.to_string()),
            }
        }
    }
}
