//! Canonical poster record (v2 schema). Written by the migrator, repaired by
//! the normalizer, consumed by the browser editors and the viewer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fsio::CorpusFs;

/// Schema version stamped on every canonical record.
pub const POSTER_SCHEMA_VERSION: u64 = 2;

/// Site-relative prefix every centralized image reference starts with.
pub const CANONICAL_STORE_PREFIX: &str = "images/originals/";

/// Back-of-card image list is capped at this length.
pub const MAX_BACK_IMAGES: usize = 5;

pub const DEFAULT_LAYOUT: &str = "auto";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterRecord {
    pub version: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default)]
    pub front: Front,
    #[serde(default)]
    pub back: Back,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Front {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Copied verbatim from legacy records; shape documented by [Chronology].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chronology: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// The canonical chronology shape. The migrator carries legacy chronology
/// objects through untouched, so [Front::chronology] stays a raw value; this
/// type is what well-formed records contain and what the editors emit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chronology {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_end: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub epoch_events: Vec<EpochEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochEvent {
    pub year: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Back {
    #[serde(default)]
    pub layout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    #[serde(rename = "type", default)]
    pub link_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Handoff stamp from the migrator, stripped by the normalizer.
    #[serde(
        rename = "migratedFrom",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub migrated_from: Option<String>,
}

impl PosterRecord {
    pub fn is_canonical_version(value: &serde_json::Value) -> bool {
        value.get("version").and_then(serde_json::Value::as_u64) == Some(POSTER_SCHEMA_VERSION)
    }
}

/// Load a poster record from disk. Returns `None` if the file is missing or
/// does not parse as a v2 record (callers treat that as "not canonical").
pub fn load_poster_record(fs: &dyn CorpusFs, path: &Path) -> Option<PosterRecord> {
    let data = fs.read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Serialize a record value the way the editors expect: two-space pretty
/// print with a trailing newline.
pub fn to_record_json(value: &serde_json::Value) -> String {
    let mut body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    body.push('\n');
    body
}
