//! Raw shapes of the legacy variants, deserialized tolerantly: every field
//! defaulted, alternate spellings accepted via aliases. These are inputs to
//! the migrator only; nothing here is ever written back.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyTextRecord {
    #[serde(default)]
    pub figure: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub chronology: Option<Value>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyWebsiteRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyImageWrapperRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "imagePath", alias = "image_path", alias = "path")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}
