//! Corpus tree walker and pass orchestration. One file is read, transformed
//! in memory, and written (backup first) before the next is touched; every
//! per-file failure folds into the report and the batch keeps going.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;

use crate::fsio::CorpusFs;
use crate::migrate::categories::folder_mismatch;
use crate::migrate::migrator::{migrate_direct_image, migrate_record, MigrationContext, MigrationError};
use crate::migrate::normalize::{normalize_record, NormalizeContext, NormalizeOptions};
use crate::migrate::repair::{needs_repair, rewrite_journey_refs, rewrite_poster_refs};
use crate::migrate::report::{CategoryConflict, CategoryMismatch, ErrorKind, MigrationReport};
use crate::record::detect::{detect_variant, is_image_extension, RecordVariant};
use crate::record::journey::JOURNEYS_FOLDER;
use crate::record::poster::to_record_json;
use crate::store::consolidate::category_folders;
use crate::store::index::AssetStoreIndex;
use crate::store::ImageResolver;

#[derive(Debug)]
pub enum BatchError {
    MissingRoot(PathBuf),
    Io(io::Error),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot(path) => write!(f, "corpus root not found: {}", path.display()),
            Self::Io(err) => write!(f, "batch i/o failure: {err}"),
        }
    }
}

impl From<io::Error> for BatchError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Where pre-overwrite snapshots go for one run:
/// `<root>/migration-<unix-ms>/<category>/<file>`.
#[derive(Debug, Clone)]
pub struct BackupPlan {
    pub root: PathBuf,
    pub stamp_ms: i64,
}

impl BackupPlan {
    pub fn new(root: impl Into<PathBuf>, stamp_ms: i64) -> Self {
        Self {
            root: root.into(),
            stamp_ms,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join(format!("migration-{}", self.stamp_ms))
    }

    fn backup_path(&self, corpus_root: &Path, file: &Path) -> PathBuf {
        let relative = file
            .strip_prefix(corpus_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(file.file_name().unwrap_or_default()));
        self.run_dir().join(relative)
    }
}

/// Snapshot the existing file, then overwrite it. The in-memory transform is
/// always fully computed before this is called, so a failure here leaves the
/// original intact.
pub fn write_with_backup(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    path: &Path,
    contents: &[u8],
    backup: &BackupPlan,
) -> io::Result<()> {
    if fs.exists(path) {
        fs.copy(path, &backup.backup_path(corpus_root, path))?;
    }
    fs.write(path, contents)
}

pub fn json_files_in(fs: &dyn CorpusFs, dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(fs
        .list_dir(dir)?
        .into_iter()
        .filter(|path| !fs.is_dir(path))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect())
}

fn image_files_in(fs: &dyn CorpusFs, dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(fs
        .list_dir(dir)?
        .into_iter()
        .filter(|path| !fs.is_dir(path))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map_or(false, is_image_extension)
        })
        .collect())
}

/// Every poster record file: `<category>/*.json` for all category folders.
pub fn poster_files(fs: &dyn CorpusFs, corpus_root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for folder in category_folders(fs, corpus_root, None)? {
        files.extend(json_files_in(fs, &folder)?);
    }
    Ok(files)
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Normalize files that are not canonical v2 instead of skipping them.
    pub include_non_v2: bool,
    /// Asset store root; defaults to `<corpus-root>/images`.
    pub assets_root: Option<PathBuf>,
    pub backup: BackupPlan,
    pub normalize: NormalizeOptions,
    /// ISO-8601 timestamp used for every fill in this run.
    pub now: String,
}

impl BatchOptions {
    fn asset_root(&self, corpus_root: &Path) -> PathBuf {
        self.assets_root
            .clone()
            .unwrap_or_else(|| corpus_root.join("images"))
    }
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Full migration pass: detect, migrate legacy variants, normalize, write.
/// Direct images in category folders get sibling records synthesized; images
/// under a category's `images/` subfolder are centralized into the store.
pub fn run_migrate(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    options: &BatchOptions,
) -> Result<MigrationReport, BatchError> {
    if !fs.is_dir(corpus_root) {
        return Err(BatchError::MissingRoot(corpus_root.to_path_buf()));
    }
    let mut report = MigrationReport::default();
    let index = AssetStoreIndex::scan(fs, &options.asset_root(corpus_root));
    let mut resolver = ImageResolver::new(index);

    for folder in category_folders(fs, corpus_root, None)? {
        let category = folder_name(&folder);

        for path in json_files_in(fs, &folder)? {
            migrate_one_file(fs, corpus_root, &folder, &category, &path, &mut resolver, options, &mut report);
        }

        for image in image_files_in(fs, &folder)? {
            synthesize_direct_image(fs, &folder, &category, &image, &mut resolver, options, &mut report);
        }

        let images_dir = folder.join("images");
        if fs.is_dir(&images_dir) {
            for image in image_files_in(fs, &images_dir)? {
                centralize_loose_image(fs, &category, &image, &mut resolver, &mut report);
            }
        }
    }

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn migrate_one_file(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    folder: &Path,
    category: &str,
    path: &Path,
    resolver: &mut ImageResolver,
    options: &BatchOptions,
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
    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.push_error(path, ErrorKind::Parse, err.to_string());
            report.skipped += 1;
            return;
        }
    };
    let variant = detect_variant(Some(&parsed), Some("json"));
    report.record_variant(variant);

    let stem = file_stem(path);
    let normalize_ctx = NormalizeContext {
        file_stem: &stem,
        folder: Some(category),
        now: &options.now,
        options: &options.normalize,
    };

    match variant {
        RecordVariant::AlreadyV2 => {
            let mut value = parsed;
            let outcome = normalize_record(&mut value, &normalize_ctx);
            note_category_conflict(report, path, &outcome.category_conflict);
            if !outcome.changed {
                report.push_outcome(path, variant.as_str(), "unchanged", "");
                return;
            }
            match write_with_backup(fs, corpus_root, path, to_record_json(&value).as_bytes(), &options.backup) {
                Ok(()) => {
                    report.normalized += 1;
                    report.push_outcome(path, variant.as_str(), "normalized", outcome.filled.join(","));
                }
                Err(err) => report.push_error(path, ErrorKind::WriteFailure, err.to_string()),
            }
        }
        RecordVariant::Unknown => {
            report.skipped += 1;
            report.unknown_files.push(path.display().to_string());
            report.push_outcome(path, variant.as_str(), "skipped", "unrecognized record shape");
        }
        RecordVariant::LegacyText | RecordVariant::LegacyWebsite | RecordVariant::LegacyImageWrapper => {
            let migration_ctx = MigrationContext {
                category,
                file_stem: &stem,
                now: &options.now,
                category_dir: folder,
            };
            let mut outcome = match migrate_record(variant, &parsed, &migration_ctx, resolver, fs) {
                Ok(outcome) => outcome,
                Err(err) => {
                    let kind = match err {
                        MigrationError::Io(_) => ErrorKind::Io,
                        _ => ErrorKind::Parse,
                    };
                    report.push_error(path, kind, err.to_string());
                    return;
                }
            };
            report.images_moved += outcome.images_copied;
            for orphan in &outcome.orphan_references {
                report.push_orphan(path, orphan.clone());
            }
            let normalize_outcome = normalize_record(&mut outcome.record, &normalize_ctx);
            note_category_conflict(report, path, &normalize_outcome.category_conflict);
            match write_with_backup(
                fs,
                corpus_root,
                path,
                to_record_json(&outcome.record).as_bytes(),
                &options.backup,
            ) {
                Ok(()) => {
                    report.migrated += 1;
                    report.push_outcome(path, variant.as_str(), "migrated", "");
                }
                Err(err) => report.push_error(path, ErrorKind::WriteFailure, err.to_string()),
            }
        }
        RecordVariant::LegacyDirectImage => {
            // JSON files never classify as direct images.
            report.skipped += 1;
        }
    }
}

fn synthesize_direct_image(
    fs: &dyn CorpusFs,
    folder: &Path,
    category: &str,
    image: &Path,
    resolver: &mut ImageResolver,
    options: &BatchOptions,
    report: &mut MigrationReport,
) {
    report.scanned += 1;
    report.record_variant(RecordVariant::LegacyDirectImage);

    let sibling = image.with_extension("json");
    if fs.exists(&sibling) {
        report.skipped += 1;
        report.push_outcome(
            image,
            RecordVariant::LegacyDirectImage.as_str(),
            "skipped",
            "sibling record already exists",
        );
        return;
    }

    let stem = file_stem(image);
    let migration_ctx = MigrationContext {
        category,
        file_stem: &stem,
        now: &options.now,
        category_dir: folder,
    };
    let mut outcome = match migrate_direct_image(image, &migration_ctx, resolver, fs) {
        Ok(outcome) => outcome,
        Err(err) => {
            report.push_error(image, ErrorKind::MissingSourceAsset, err.to_string());
            return;
        }
    };
    report.images_moved += outcome.images_copied;

    let normalize_ctx = NormalizeContext {
        file_stem: &stem,
        folder: Some(category),
        now: &options.now,
        options: &options.normalize,
    };
    normalize_record(&mut outcome.record, &normalize_ctx);

    match fs.write(&sibling, to_record_json(&outcome.record).as_bytes()) {
        Ok(()) => {
            report.migrated += 1;
            report.push_outcome(
                image,
                RecordVariant::LegacyDirectImage.as_str(),
                "migrated",
                sibling.display().to_string(),
            );
        }
        Err(err) => report.push_error(&sibling, ErrorKind::WriteFailure, err.to_string()),
    }
}

fn centralize_loose_image(
    fs: &dyn CorpusFs,
    category: &str,
    image: &Path,
    resolver: &mut ImageResolver,
    report: &mut MigrationReport,
) {
    match resolver.centralize(fs, image, category) {
        Ok((_, true)) => {
            report.images_moved += 1;
            report.push_outcome(image, "image", "centralized", "");
        }
        Ok((_, false)) => {}
        Err(err) => report.push_error(image, ErrorKind::Io, err.to_string()),
    }
}

fn note_category_conflict(
    report: &mut MigrationReport,
    path: &Path,
    conflict: &Option<(Vec<String>, Vec<String>)>,
) {
    if let Some((meta, root)) = conflict {
        report.category_conflicts.push(CategoryConflict {
            file: path.display().to_string(),
            meta_categories: meta.clone(),
            root_categories: root.clone(),
        });
    }
}

/// Normalization-only pass over canonical records. Non-v2 files are skipped
/// unless `include_non_v2` is set.
pub fn run_normalize(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    options: &BatchOptions,
) -> Result<MigrationReport, BatchError> {
    if !fs.is_dir(corpus_root) {
        return Err(BatchError::MissingRoot(corpus_root.to_path_buf()));
    }
    let mut report = MigrationReport::default();

    for folder in category_folders(fs, corpus_root, None)? {
        let category = folder_name(&folder);
        for path in json_files_in(fs, &folder)? {
            report.scanned += 1;
            let raw = match fs.read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    report.push_error(&path, ErrorKind::Io, err.to_string());
                    continue;
                }
            };
            let mut value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    report.push_error(&path, ErrorKind::Parse, err.to_string());
                    report.skipped += 1;
                    continue;
                }
            };
            let variant = detect_variant(Some(&value), Some("json"));
            report.record_variant(variant);
            if variant != RecordVariant::AlreadyV2 && !options.include_non_v2 {
                report.skipped += 1;
                report.push_outcome(&path, variant.as_str(), "skipped", "not canonical v2");
                continue;
            }

            let stem = file_stem(&path);
            let ctx = NormalizeContext {
                file_stem: &stem,
                folder: Some(&category),
                now: &options.now,
                options: &options.normalize,
            };
            let outcome = normalize_record(&mut value, &ctx);
            note_category_conflict(&mut report, &path, &outcome.category_conflict);
            if !outcome.changed {
                report.push_outcome(&path, variant.as_str(), "unchanged", "");
                continue;
            }
            match write_with_backup(fs, corpus_root, &path, to_record_json(&value).as_bytes(), &options.backup) {
                Ok(()) => {
                    report.normalized += 1;
                    report.push_outcome(&path, variant.as_str(), "normalized", outcome.filled.join(","));
                }
                Err(err) => report.push_error(&path, ErrorKind::WriteFailure, err.to_string()),
            }
        }
    }

    Ok(report)
}

/// Read-only corpus audit: folder/category mismatches, dual category
/// sources, orphan image references. Mutates nothing, so the scan fans out
/// across files.
pub fn run_audit(
    fs: &dyn CorpusFs,
    corpus_root: &Path,
    options: &BatchOptions,
) -> Result<MigrationReport, BatchError> {
    if !fs.is_dir(corpus_root) {
        return Err(BatchError::MissingRoot(corpus_root.to_path_buf()));
    }
    let index = AssetStoreIndex::scan(fs, &options.asset_root(corpus_root));
    let resolver = ImageResolver::new(index);

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for folder in category_folders(fs, corpus_root, None)? {
        let category = folder_name(&folder);
        for path in json_files_in(fs, &folder)? {
            files.push((category.clone(), path));
        }
    }
    let journeys_dir = corpus_root.join(JOURNEYS_FOLDER);
    let journeys = json_files_in(fs, &journeys_dir).unwrap_or_default();

    let mut report = files
        .par_iter()
        .map(|(category, path)| audit_poster(fs, category, path, &resolver))
        .collect::<Vec<MigrationReport>>()
        .into_iter()
        .fold(MigrationReport::default(), |mut merged, partial| {
            merged.merge(partial);
            merged
        });

    for path in &journeys {
        report.merge(audit_journey(fs, path, &resolver));
    }

    Ok(report)
}

fn audit_poster(
    fs: &dyn CorpusFs,
    category: &str,
    path: &Path,
    resolver: &ImageResolver,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    report.scanned += 1;
    let Ok(raw) = fs.read_to_string(path) else {
        report.push_error(path, ErrorKind::Io, "unreadable file");
        return report;
    };
    let mut value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            report.push_error(path, ErrorKind::Parse, err.to_string());
            return report;
        }
    };
    let variant = detect_variant(Some(&value), Some("json"));
    report.record_variant(variant);

    let meta_categories: Vec<String> = value
        .get("meta")
        .and_then(|meta| meta.get("categories"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let root_present = value
        .get("categories")
        .and_then(Value::as_array)
        .map_or(false, |items| !items.is_empty());
    if folder_mismatch(&meta_categories, category) {
        report.category_mismatches.push(CategoryMismatch {
            file: path.display().to_string(),
            folder: category.to_string(),
            categories: meta_categories.clone(),
        });
    }
    if !meta_categories.is_empty() && root_present {
        report.category_conflicts.push(CategoryConflict {
            file: path.display().to_string(),
            meta_categories,
            root_categories: value
                .get("categories")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        });
    }

    let mut orphans = Vec::new();
    let mut check = |reference: &str| -> Option<String> {
        if needs_repair(reference, resolver.index()) && resolver.resolve(reference).is_none() {
            orphans.push(reference.to_string());
        }
        None
    };
    rewrite_poster_refs(&mut value, &mut check);
    for orphan in orphans {
        report.push_orphan(path, orphan);
    }
    report
}

fn audit_journey(fs: &dyn CorpusFs, path: &Path, resolver: &ImageResolver) -> MigrationReport {
    let mut report = MigrationReport::default();
    report.scanned += 1;
    let Ok(raw) = fs.read_to_string(path) else {
        report.push_error(path, ErrorKind::Io, "unreadable file");
        return report;
    };
    let mut value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            report.push_error(path, ErrorKind::Parse, err.to_string());
            return report;
        }
    };
    let mut orphans = Vec::new();
    let mut check = |reference: &str| -> Option<String> {
        if needs_repair(reference, resolver.index()) && resolver.resolve(reference).is_none() {
            orphans.push(reference.to_string());
        }
        None
    };
    rewrite_journey_refs(&mut value, &mut check);
    for orphan in orphans {
        report.push_orphan(path, orphan);
    }
    report
}
