//! Journey records: ordered playlists of posters, referenced by filename.
//! Not owned by the migration engine; only poster `thumbnail` fields are
//! eligible for repair (`filename` is the join key and is never rewritten).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fsio::CorpusFs;

/// Folder under the corpus root that holds journey files.
pub const JOURNEYS_FOLDER: &str = "Journeys";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub posters: Vec<JourneyPosterRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyPosterRef {
    pub filename: String,
    #[serde(rename = "type", default)]
    pub poster_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

pub fn load_journey_record(fs: &dyn CorpusFs, path: &Path) -> Option<JourneyRecord> {
    let data = fs.read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
