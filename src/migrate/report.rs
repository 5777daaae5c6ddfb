//! Batch report accumulator. Built per run, threaded through the passes and
//! returned by value; never persisted as corpus state.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::record::detect::RecordVariant;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub normalized: usize,
    pub repaired_references: usize,
    pub renamed_assets: usize,
    pub skipped: usize,
    pub images_moved: usize,
    pub per_variant: BTreeMap<String, usize>,
    pub orphan_images: Vec<OrphanImage>,
    pub category_mismatches: Vec<CategoryMismatch>,
    pub category_conflicts: Vec<CategoryConflict>,
    pub unknown_files: Vec<String>,
    pub errors: Vec<FileError>,
    /// Per-file outcome trail; drives verbose output and the CSV export.
    pub outcomes: Vec<FileOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanImage {
    pub file: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMismatch {
    pub file: String,
    pub folder: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryConflict {
    pub file: String,
    pub meta_categories: Vec<String>,
    pub root_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileError {
    pub file: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Parse,
    UnknownVariant,
    MissingSourceAsset,
    OrphanReference,
    CollisionExhausted,
    WriteFailure,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::UnknownVariant => "unknown-variant",
            Self::MissingSourceAsset => "missing-source-asset",
            Self::OrphanReference => "orphan-reference",
            Self::CollisionExhausted => "collision-exhausted",
            Self::WriteFailure => "write-failure",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub variant: String,
    pub action: String,
    pub detail: String,
}

impl MigrationReport {
    pub fn record_variant(&mut self, variant: RecordVariant) {
        *self.per_variant.entry(variant.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn push_error(&mut self, file: &Path, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(FileError {
            file: file.display().to_string(),
            kind,
            message: message.into(),
        });
    }

    pub fn push_orphan(&mut self, file: &Path, reference: impl Into<String>) {
        self.orphan_images.push(OrphanImage {
            file: file.display().to_string(),
            reference: reference.into(),
        });
    }

    pub fn push_outcome(
        &mut self,
        file: &Path,
        variant: &str,
        action: &str,
        detail: impl Into<String>,
    ) {
        self.outcomes.push(FileOutcome {
            file: file.display().to_string(),
            variant: variant.to_string(),
            action: action.to_string(),
            detail: detail.into(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Fold another report in; used when the audit pass fans out.
    pub fn merge(&mut self, other: MigrationReport) {
        self.scanned += other.scanned;
        self.migrated += other.migrated;
        self.normalized += other.normalized;
        self.repaired_references += other.repaired_references;
        self.renamed_assets += other.renamed_assets;
        self.skipped += other.skipped;
        self.images_moved += other.images_moved;
        for (variant, count) in other.per_variant {
            *self.per_variant.entry(variant).or_insert(0) += count;
        }
        self.orphan_images.extend(other.orphan_images);
        self.category_mismatches.extend(other.category_mismatches);
        self.category_conflicts.extend(other.category_conflicts);
        self.unknown_files.extend(other.unknown_files);
        self.errors.extend(other.errors);
        self.outcomes.extend(other.outcomes);
    }

    /// Human-readable summary on stdout. Counts first, then itemized lists;
    /// nothing is silently dropped.
    pub fn print_summary(&self, verbose: bool) {
        println!(
            "scanned={} migrated={} normalized={} repaired={} skipped={} images_moved={} errors={}",
            self.scanned,
            self.migrated,
            self.normalized,
            self.repaired_references,
            self.skipped,
            self.images_moved,
            self.error_count()
        );
        if !self.per_variant.is_empty() {
            let breakdown: Vec<String> = self
                .per_variant
                .iter()
                .map(|(variant, count)| format!("{variant}={count}"))
                .collect();
            println!("variants: {}", breakdown.join(" "));
        }
        if self.renamed_assets > 0 {
            println!("assets renamed: {}", self.renamed_assets);
        }
        if !self.orphan_images.is_empty() {
            println!("orphan image references: {}", self.orphan_images.len());
            for orphan in &self.orphan_images {
                println!("- {} -> '{}'", orphan.file, orphan.reference);
            }
        }
        if !self.category_mismatches.is_empty() {
            println!("category/folder mismatches: {}", self.category_mismatches.len());
            for mismatch in &self.category_mismatches {
                println!(
                    "- {} folder='{}' categories={:?}",
                    mismatch.file, mismatch.folder, mismatch.categories
                );
            }
        }
        if !self.category_conflicts.is_empty() {
            println!(
                "records with both meta and root categories: {}",
                self.category_conflicts.len()
            );
            for conflict in &self.category_conflicts {
                println!(
                    "- {} meta={:?} root={:?}",
                    conflict.file, conflict.meta_categories, conflict.root_categories
                );
            }
        }
        if !self.unknown_files.is_empty() {
            println!("unrecognized records (not migrated): {}", self.unknown_files.len());
            for file in &self.unknown_files {
                println!("- {file}");
            }
        }
        if !self.errors.is_empty() {
            println!("errors: {}", self.errors.len());
            for error in &self.errors {
                println!("- [{}] {}: {}", error.kind, error.file, error.message);
            }
        }
        if verbose {
            for outcome in &self.outcomes {
                println!(
                    "  {} [{}] {} {}",
                    outcome.action, outcome.variant, outcome.file, outcome.detail
                );
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Per-file outcome table as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["file", "variant", "action", "detail"])?;
        for outcome in &self.outcomes {
            writer.write_record([
                outcome.file.as_str(),
                outcome.variant.as_str(),
                outcome.action.as_str(),
                outcome.detail.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
