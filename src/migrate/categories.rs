//! Category list normalization and source precedence.
//!
//! Precedence: `meta.categories` if non-empty, else the legacy root-level
//! `categories` field, else the record's containing folder, else the
//! configured default. When both meta and root lists are non-empty the
//! conflict is surfaced to the report instead of silently dropping the root
//! field; `--prefer-root-categories` flips the winner.

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

#[derive(Debug, Clone)]
pub struct CategoryOptions {
    pub default_category: String,
    /// Guarantee the folder-derived category is present (append, never reorder).
    pub ensure_folder: bool,
    /// Escape hatch: legacy root `categories` wins over `meta.categories`.
    pub prefer_root: bool,
}

impl Default for CategoryOptions {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            ensure_folder: false,
            prefer_root: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryResolution {
    pub categories: Vec<String>,
    /// Root field was the chosen source and should be consumed.
    pub consumed_root: bool,
    /// Both meta and root were non-empty; callers flag this.
    pub conflict: bool,
}

/// Trim, drop empties, de-duplicate case-insensitively keeping the
/// first-seen casing, preserve input order.
pub fn dedupe_case_insensitive(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut result = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            result.push(trimmed.to_string());
        }
    }
    result
}

pub fn contains_case_insensitive(values: &[String], needle: &str) -> bool {
    values.iter().any(|v| v.eq_ignore_ascii_case(needle))
}

pub fn resolve_categories(
    meta: &[String],
    root: &[String],
    folder: Option<&str>,
    options: &CategoryOptions,
) -> CategoryResolution {
    let meta_clean = dedupe_case_insensitive(meta);
    let root_clean = dedupe_case_insensitive(root);

    let mut resolution = CategoryResolution::default();
    resolution.categories = match (meta_clean.is_empty(), root_clean.is_empty()) {
        (false, false) => {
            resolution.conflict = true;
            if options.prefer_root {
                root_clean
            } else {
                meta_clean
            }
        }
        (false, true) => meta_clean,
        (true, false) => {
            resolution.consumed_root = true;
            root_clean
        }
        (true, true) => match folder {
            Some(name) if !name.trim().is_empty() => vec![name.trim().to_string()],
            _ => vec![options.default_category.clone()],
        },
    };

    if options.ensure_folder {
        if let Some(name) = folder {
            let name = name.trim();
            if !name.is_empty() && !contains_case_insensitive(&resolution.categories, name) {
                resolution.categories.push(name.to_string());
            }
        }
    }

    resolution
}

/// Audit check: does the normalized list include the containing folder?
pub fn folder_mismatch(categories: &[String], folder: &str) -> bool {
    !folder.trim().is_empty() && !contains_case_insensitive(categories, folder)
}
