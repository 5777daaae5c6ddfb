//! Pure per-variant migrations: one legacy record in, one canonical v2
//! record out. Dispatch is a tagged-union match over [RecordVariant]; no
//! variant is ever guessed.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::fsio::CorpusFs;
use crate::migrate::normalize::{alt_from_src, title_from_stem};
use crate::record::detect::RecordVariant;
use crate::record::legacy::{LegacyImageWrapperRecord, LegacyTextRecord, LegacyWebsiteRecord};
use crate::record::poster::{
    Back, Front, ImageRef, LinkRef, Meta, PosterRecord, POSTER_SCHEMA_VERSION,
};
use crate::store::ImageResolver;

#[derive(Debug)]
pub enum MigrationError {
    Parse(serde_json::Error),
    UnknownVariant,
    Io(std::io::Error),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse record JSON: {err}"),
            Self::UnknownVariant => write!(f, "record matches no known legacy variant"),
            Self::Io(err) => write!(f, "i/o failure during migration: {err}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    /// Category folder the record lives in.
    pub category: &'a str,
    /// Filename without extension.
    pub file_stem: &'a str,
    /// ISO-8601 timestamp for `meta.modified`.
    pub now: &'a str,
    /// The category folder on disk; wrapper image search starts here.
    pub category_dir: &'a Path,
}

/// Result of migrating one record. Orphans are reported, never fatal.
#[derive(Debug, Default)]
pub struct MigrationOutcome {
    pub record: Value,
    pub orphan_references: Vec<String>,
    pub images_copied: usize,
}

pub fn migrate_record(
    variant: RecordVariant,
    raw: &Value,
    ctx: &MigrationContext,
    resolver: &mut ImageResolver,
    fs: &dyn CorpusFs,
) -> Result<MigrationOutcome, MigrationError> {
    match variant {
        RecordVariant::LegacyText => {
            let legacy: LegacyTextRecord =
                serde_json::from_value(raw.clone()).map_err(MigrationError::Parse)?;
            Ok(migrate_text(&legacy, ctx, resolver))
        }
        RecordVariant::LegacyWebsite => {
            let legacy: LegacyWebsiteRecord =
                serde_json::from_value(raw.clone()).map_err(MigrationError::Parse)?;
            Ok(migrate_website(&legacy, ctx, resolver))
        }
        RecordVariant::LegacyImageWrapper => {
            let legacy: LegacyImageWrapperRecord =
                serde_json::from_value(raw.clone()).map_err(MigrationError::Parse)?;
            Ok(migrate_image_wrapper(&legacy, ctx, resolver, fs))
        }
        RecordVariant::AlreadyV2
        | RecordVariant::LegacyDirectImage
        | RecordVariant::Unknown => Err(MigrationError::UnknownVariant),
    }
}

fn base_record(variant: RecordVariant, ctx: &MigrationContext, categories: &[String]) -> PosterRecord {
    PosterRecord {
        version: POSTER_SCHEMA_VERSION,
        uid: String::new(),
        front: Front::default(),
        back: Back::default(),
        meta: Meta {
            created: None,
            modified: Some(ctx.now.to_string()),
            categories: categories.to_vec(),
            tags: Vec::new(),
            source: None,
            migrated_from: Some(variant.as_str().to_string()),
        },
    }
}

fn record_value(record: &PosterRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

pub fn migrate_text(
    legacy: &LegacyTextRecord,
    ctx: &MigrationContext,
    resolver: &ImageResolver,
) -> MigrationOutcome {
    let mut outcome = MigrationOutcome::default();
    let mut record = base_record(RecordVariant::LegacyText, ctx, &legacy.categories);

    record.front.title = legacy
        .figure
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("Untitled")
        .to_string();
    record.back.text = legacy
        .header
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    // Chronology passes through untouched, whatever its exact shape.
    record.front.chronology = legacy.chronology.clone();

    if let Some(thumbnail) = legacy.thumbnail.as_deref() {
        match resolver.resolve(thumbnail) {
            Some(path) => record.front.thumbnail = Some(path),
            None => outcome.orphan_references.push(thumbnail.to_string()),
        }
    }

    outcome.record = record_value(&record);
    outcome
}

pub fn migrate_website(
    legacy: &LegacyWebsiteRecord,
    ctx: &MigrationContext,
    resolver: &ImageResolver,
) -> MigrationOutcome {
    let mut outcome = MigrationOutcome::default();
    let mut record = base_record(RecordVariant::LegacyWebsite, ctx, &legacy.categories);

    record.front.title = legacy
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("Website")
        .to_string();
    record.back.text = legacy
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    if let Some(url) = legacy.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        record.back.links = vec![LinkRef {
            link_type: "external".to_string(),
            label: "Open Website".to_string(),
            url: Some(url.to_string()),
            target: None,
            path: None,
            primary: Some(true),
        }];
    }

    if let Some(thumbnail) = legacy.thumbnail.as_deref() {
        if thumbnail.starts_with("http") {
            // External thumbnails stay verbatim; nothing to centralize.
            record.front.thumbnail = Some(thumbnail.to_string());
        } else {
            match resolver.resolve(thumbnail) {
                Some(path) => record.front.thumbnail = Some(path),
                None => outcome.orphan_references.push(thumbnail.to_string()),
            }
        }
    }

    outcome.record = record_value(&record);
    outcome
}

pub fn migrate_image_wrapper(
    legacy: &LegacyImageWrapperRecord,
    ctx: &MigrationContext,
    resolver: &mut ImageResolver,
    fs: &dyn CorpusFs,
) -> MigrationOutcome {
    let mut outcome = MigrationOutcome::default();
    let mut record = base_record(RecordVariant::LegacyImageWrapper, ctx, &legacy.categories);

    record.front.title = legacy
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or_default()
        .to_string();

    let mut text = legacy
        .description
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string();
    let notes: Vec<&str> = legacy
        .annotations
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if !notes.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str("**Notes:**");
        for note in notes {
            text.push_str("\n- ");
            text.push_str(note);
        }
    }
    if !text.is_empty() {
        record.back.text = Some(text);
    }

    if let Some(image_path) = legacy.image_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        match locate_wrapper_image(image_path, ctx, fs) {
            Some(source) => match resolver.centralize(fs, &source, ctx.category) {
                Ok((path, copied)) => {
                    if copied {
                        outcome.images_copied += 1;
                    }
                    record.back.image = Some(image_ref(&path));
                }
                Err(_) => outcome.orphan_references.push(image_path.to_string()),
            },
            // Source gone; a rerun may already have centralized it.
            None => match resolver.resolve(image_path) {
                Some(path) => record.back.image = Some(image_ref(&path)),
                None => outcome.orphan_references.push(image_path.to_string()),
            },
        }
    }

    outcome.record = record_value(&record);
    outcome
}

/// Wrapper image search order: literal path under the category's `images/`
/// subfolder, then the category folder itself.
fn locate_wrapper_image(
    image_path: &str,
    ctx: &MigrationContext,
    fs: &dyn CorpusFs,
) -> Option<PathBuf> {
    let relative = Path::new(image_path);
    let in_images = ctx.category_dir.join("images").join(relative);
    if fs.exists(&in_images) && !fs.is_dir(&in_images) {
        return Some(in_images);
    }
    let in_category = ctx.category_dir.join(relative);
    if fs.exists(&in_category) && !fs.is_dir(&in_category) {
        return Some(in_category);
    }
    None
}

/// Synthesize a sibling record for an image sitting directly in a category
/// folder. The image file itself is left in place.
pub fn migrate_direct_image(
    image_file: &Path,
    ctx: &MigrationContext,
    resolver: &mut ImageResolver,
    fs: &dyn CorpusFs,
) -> Result<MigrationOutcome, MigrationError> {
    let mut outcome = MigrationOutcome::default();
    let mut record = base_record(RecordVariant::LegacyDirectImage, ctx, &[]);

    let stem = image_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(ctx.file_stem);
    record.front.title = title_from_stem(stem);

    let (path, copied) = resolver
        .centralize(fs, image_file, ctx.category)
        .map_err(MigrationError::Io)?;
    if copied {
        outcome.images_copied += 1;
    }
    record.back.image = Some(image_ref(&path));

    outcome.record = record_value(&record);
    Ok(outcome)
}

fn image_ref(src: &str) -> ImageRef {
    ImageRef {
        src: src.to_string(),
        alt: alt_from_src(src),
        position: Some("top".to_string()),
        max_width: None,
        max_height: None,
        fit: None,
    }
}
