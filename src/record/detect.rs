//! Structural schema detection for legacy poster files.
//!
//! Legacy variants carry no discriminator; classification inspects shape in a
//! fixed rule order. Detection is pure and total: any input maps to exactly
//! one variant and nothing here can fail.

use serde_json::Value;

use crate::record::poster::PosterRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordVariant {
    AlreadyV2,
    LegacyText,
    LegacyWebsite,
    LegacyImageWrapper,
    LegacyDirectImage,
    Unknown,
}

impl RecordVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyV2 => "already-v2",
            Self::LegacyText => "legacy-text",
            Self::LegacyWebsite => "legacy-website",
            Self::LegacyImageWrapper => "legacy-image-wrapper",
            Self::LegacyDirectImage => "legacy-direct-image",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            Self::LegacyText | Self::LegacyWebsite | Self::LegacyImageWrapper | Self::LegacyDirectImage
        )
    }
}

impl std::fmt::Display for RecordVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extensions treated as image files when scanning category folders.
pub const IMAGE_EXTENSIONS: &[&str] = &["webp", "png", "jpg", "jpeg", "gif"];

pub fn is_image_extension(extension: &str) -> bool {
    let lowered = extension.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&lowered.as_str())
}

/// Classify a file by parsed content and extension.
///
/// Rule order: image extension, explicit `version: 2`, `type: "website"`,
/// `type: "image"`, presence of `figure`/`header`, otherwise unknown.
pub fn detect_variant(parsed: Option<&Value>, extension: Option<&str>) -> RecordVariant {
    if extension.map_or(false, is_image_extension) {
        return RecordVariant::LegacyDirectImage;
    }

    let Some(value) = parsed else {
        return RecordVariant::Unknown;
    };
    let Some(object) = value.as_object() else {
        return RecordVariant::Unknown;
    };

    if PosterRecord::is_canonical_version(value) {
        return RecordVariant::AlreadyV2;
    }

    match value.get("type").and_then(Value::as_str) {
        Some("website") => return RecordVariant::LegacyWebsite,
        Some("image") => return RecordVariant::LegacyImageWrapper,
        _ => {}
    }

    if object.contains_key("figure") || object.contains_key("header") {
        return RecordVariant::LegacyText;
    }

    RecordVariant::Unknown
}
