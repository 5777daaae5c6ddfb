//! Idempotent field repair for records in canonical v2 shape.
//!
//! Every fill is gated on absence, so a record that already satisfies the
//! invariants is left byte-for-byte as read: the pass works on the parsed
//! `serde_json::Value` in place, tracks whether anything actually changed,
//! and only then is the file reserialized and `meta.modified` bumped. Unknown
//! fields pass through untouched.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::migrate::categories::{resolve_categories, CategoryOptions};
use crate::record::poster::{DEFAULT_LAYOUT, MAX_BACK_IMAGES};

/// Selectable normalization passes (`--mod`), with descriptions for
/// `--list-mods`.
pub const MODS: &[(&str, &str)] = &[
    ("uid", "fill a missing uid with a random opaque token"),
    ("title", "fill a missing front.title from the filename"),
    ("layout", "default back.layout to \"auto\""),
    ("text", "adopt stray legacy text fields or generate placeholder back.text"),
    ("images", "derive image alt/position, order and cap back.images"),
    ("links", "backfill link type/label and the url-shaped field"),
    ("categories", "resolve, trim and dedupe meta.categories"),
    ("timestamps", "fill meta.created, bump meta.modified on change"),
];

#[derive(Debug, Clone)]
pub struct ModSet {
    enabled: BTreeSet<String>,
}

impl ModSet {
    pub fn all() -> Self {
        Self {
            enabled: MODS.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }

    /// Build from `--mod` values; unknown names are invocation errors.
    pub fn from_names(names: &[String]) -> Result<Self, String> {
        if names.is_empty() {
            return Ok(Self::all());
        }
        let mut enabled = BTreeSet::new();
        for name in names {
            if !MODS.iter().any(|(known, _)| known == name) {
                return Err(format!("unknown mod '{name}' (see --list-mods)"));
            }
            enabled.insert(name.clone());
        }
        Ok(Self { enabled })
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }
}

impl Default for ModSet {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub mods: ModSet,
    pub categories: CategoryOptions,
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Filename without extension; source for derived titles.
    pub file_stem: &'a str,
    /// Containing category folder, when the record lives in one.
    pub folder: Option<&'a str>,
    /// ISO-8601 timestamp stamped on fills; passed in so the pass is pure.
    pub now: &'a str,
    pub options: &'a NormalizeOptions,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub changed: bool,
    pub filled: Vec<&'static str>,
    /// Raw (meta, root) category lists when both were non-empty.
    pub category_conflict: Option<(Vec<String>, Vec<String>)>,
}

pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Derive a display title from a filename stem: split on `_`/`-`, capitalize
/// each token.
pub fn title_from_stem(stem: &str) -> String {
    let title: Vec<String> = stem
        .split(['_', '-'])
        .filter(|token| !token.is_empty())
        .map(capitalize)
        .collect();
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title.join(" ")
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Alt text derived from an image src path.
pub fn alt_from_src(src: &str) -> String {
    let base = src.rsplit(['/', '\\']).next().unwrap_or(src);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    title_from_stem(stem)
}

pub fn normalize_record(value: &mut Value, ctx: &NormalizeContext) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    if !value.is_object() {
        return outcome;
    }
    let before = value.clone();
    let mods = &ctx.options.mods;

    if let Some(root) = value.as_object_mut() {
        if mods.enabled("uid") && str_field_empty(root.get("uid")) {
            root.insert("uid".to_string(), Value::String(new_uid()));
            outcome.filled.push("uid");
        }

        if mods.enabled("title") {
            let front = object_entry(root, "front");
            if str_field_empty(front.get("title")) {
                front.insert(
                    "title".to_string(),
                    Value::String(title_from_stem(ctx.file_stem)),
                );
                outcome.filled.push("front.title");
            }
        }

        if mods.enabled("layout") {
            let back = object_entry(root, "back");
            if str_field_empty(back.get("layout")) {
                back.insert("layout".to_string(), Value::String(DEFAULT_LAYOUT.to_string()));
                outcome.filled.push("back.layout");
            }
        }

        if mods.enabled("text") {
            let back_text_empty = str_field_empty(
                root.get("back").and_then(|back| back.get("text")),
            );
            if back_text_empty {
                let mut adopted: Option<String> = None;
                for key in ["text", "header", "description"] {
                    let candidate = root
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                        .map(str::to_string);
                    if let Some(text) = candidate {
                        root.remove(key);
                        adopted = Some(text);
                        break;
                    }
                }
                let text = adopted.unwrap_or_else(|| {
                    let title = root
                        .get("front")
                        .and_then(|front| front.get("title"))
                        .and_then(Value::as_str)
                        .unwrap_or("Untitled");
                    let category = ctx
                        .folder
                        .unwrap_or(ctx.options.categories.default_category.as_str());
                    format!("{title}. From the {category} collection.")
                });
                object_entry(root, "back").insert("text".to_string(), Value::String(text));
                outcome.filled.push("back.text");
            }
        }

        if mods.enabled("images") {
            if let Some(back) = root.get_mut("back").and_then(Value::as_object_mut) {
                if normalize_primary_image(back) {
                    outcome.filled.push("back.image");
                }
                if normalize_image_list(back) {
                    outcome.filled.push("back.images");
                }
            }
        }

        if mods.enabled("links") {
            if let Some(links) = root
                .get_mut("back")
                .and_then(|back| back.get_mut("links"))
                .and_then(Value::as_array_mut)
            {
                let mut any = false;
                for link in links.iter_mut() {
                    if let Some(object) = link.as_object_mut() {
                        any |= normalize_link(object);
                    }
                }
                if any {
                    outcome.filled.push("back.links");
                }
            }
        }

        if mods.enabled("categories") {
            let meta_categories = string_list(root.get("meta").and_then(|meta| meta.get("categories")));
            let root_categories = string_list(root.get("categories"));
            let resolution = resolve_categories(
                &meta_categories,
                &root_categories,
                ctx.folder,
                &ctx.options.categories,
            );
            if resolution.conflict {
                outcome.category_conflict = Some((meta_categories.clone(), root_categories));
            }
            if resolution.consumed_root {
                root.remove("categories");
                outcome.filled.push("categories(root)");
            }
            if meta_categories != resolution.categories {
                let list = resolution
                    .categories
                    .into_iter()
                    .map(Value::String)
                    .collect();
                object_entry(root, "meta").insert("categories".to_string(), Value::Array(list));
                outcome.filled.push("meta.categories");
            }
        }

        if mods.enabled("timestamps") {
            let meta = object_entry(root, "meta");
            if str_field_empty(meta.get("created")) {
                meta.insert("created".to_string(), Value::String(ctx.now.to_string()));
                outcome.filled.push("meta.created");
            }
        }

        // Migrator handoff stamp never survives normalization.
        if let Some(meta) = root.get_mut("meta").and_then(Value::as_object_mut) {
            if meta.remove("migratedFrom").is_some() {
                outcome.filled.push("meta.migratedFrom");
            }
        }
    }

    if *value != before && ctx.options.mods.enabled("timestamps") {
        if let Some(root) = value.as_object_mut() {
            object_entry(root, "meta")
                .insert("modified".to_string(), Value::String(ctx.now.to_string()));
        }
    }
    outcome.changed = *value != before;
    outcome
}

fn str_field_empty(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .map_or(true, |text| text.trim().is_empty())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut().expect("entry was just made an object")
}

/// Derive `alt` and default `position` on `back.image`.
fn normalize_primary_image(back: &mut Map<String, Value>) -> bool {
    let Some(image) = back.get_mut("image").and_then(Value::as_object_mut) else {
        return false;
    };
    let Some(src) = image.get("src").and_then(Value::as_str).map(str::to_string) else {
        return false;
    };
    let mut changed = false;
    if str_field_empty(image.get("alt")) {
        image.insert("alt".to_string(), Value::String(alt_from_src(&src)));
        changed = true;
    }
    if str_field_empty(image.get("position")) {
        image.insert("position".to_string(), Value::String("top".to_string()));
        changed = true;
    }
    changed
}

/// `back.images` consistency: the primary image leads the list, duplicates by
/// src are dropped, the list is capped, and entries get derived alt text.
fn normalize_image_list(back: &mut Map<String, Value>) -> bool {
    let primary_src = back
        .get("image")
        .and_then(|image| image.get("src"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let had_key = back.contains_key("images");
    let original: Vec<Value> = back
        .get("images")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut list = original.clone();

    if let Some(src) = &primary_src {
        let position = list
            .iter()
            .position(|entry| entry.get("src").and_then(Value::as_str) == Some(src.as_str()));
        match position {
            Some(0) => {}
            Some(index) => {
                let entry = list.remove(index);
                list.insert(0, entry);
            }
            None => {
                if let Some(image) = back.get("image").cloned() {
                    list.insert(0, image);
                }
            }
        }
    }

    let mut seen = BTreeSet::new();
    list.retain(|entry| match entry.get("src").and_then(Value::as_str) {
        Some(src) => seen.insert(src.to_lowercase()),
        None => true,
    });
    list.truncate(MAX_BACK_IMAGES);

    for entry in &mut list {
        if let Some(object) = entry.as_object_mut() {
            let src = object.get("src").and_then(Value::as_str).map(str::to_string);
            if let Some(src) = src {
                if str_field_empty(object.get("alt")) {
                    object.insert("alt".to_string(), Value::String(alt_from_src(&src)));
                }
            }
        }
    }

    if list == original {
        return false;
    }
    if list.is_empty() && !had_key {
        return false;
    }
    back.insert("images".to_string(), Value::Array(list));
    true
}

/// Backfill `type`, the url-shaped field matching it, and `label`.
fn normalize_link(link: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    let mut link_type = link
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if link_type.is_empty() {
        link_type = if link.contains_key("url") {
            "external"
        } else if link.contains_key("path") {
            "file"
        } else if link.contains_key("target") {
            "internal"
        } else {
            "external"
        }
        .to_string();
        link.insert("type".to_string(), Value::String(link_type.clone()));
        changed = true;
    }

    let wanted = match link_type.as_str() {
        "internal" => "target",
        "file" => "path",
        _ => "url",
    };
    if !link.contains_key(wanted) {
        for key in ["url", "target", "path"] {
            if key == wanted {
                continue;
            }
            if let Some(moved) = link.remove(key) {
                link.insert(wanted.to_string(), moved);
                changed = true;
                break;
            }
        }
    }

    if str_field_empty(link.get("label")) {
        let label = match link_type.as_str() {
            "file" => link
                .get("path")
                .and_then(Value::as_str)
                .map(alt_from_src)
                .unwrap_or_else(|| "Open File".to_string()),
            "internal" => "Open Page".to_string(),
            _ => "Open Website".to_string(),
        };
        link.insert("label".to_string(), Value::String(label));
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context<'a>(options: &'a NormalizeOptions) -> NormalizeContext<'a> {
        NormalizeContext {
            file_stem: "ancient_rome",
            folder: Some("Empires"),
            now: "2026-08-06T00:00:00Z",
            options,
        }
    }

    #[test]
    fn satisfied_record_is_untouched() {
        let options = NormalizeOptions::default();
        let mut value = json!({
            "version": 2,
            "uid": "u-1",
            "front": {"title": "Rome"},
            "back": {"layout": "auto", "text": "A city."},
            "meta": {
                "created": "2020-01-01T00:00:00Z",
                "modified": "2020-01-01T00:00:00Z",
                "categories": ["Empires"]
            }
        });
        let before = value.clone();
        let outcome = normalize_record(&mut value, &context(&options));
        assert!(!outcome.changed);
        assert!(outcome.filled.is_empty());
        assert_eq!(value, before);
    }

    #[test]
    fn fills_converge_to_a_fixed_point() {
        let options = NormalizeOptions::default();
        let mut value = json!({"version": 2, "back": {"image": {"src": "images/originals/rome_map.png"}}});

        let first = normalize_record(&mut value, &context(&options));
        assert!(first.changed);
        assert_eq!(value["front"]["title"], "Ancient Rome");
        assert_eq!(value["back"]["layout"], "auto");
        assert_eq!(value["back"]["image"]["alt"], "Rome Map");
        assert_eq!(value["back"]["image"]["position"], "top");
        assert_eq!(value["back"]["images"][0]["src"], "images/originals/rome_map.png");
        assert_eq!(value["meta"]["categories"], json!(["Empires"]));
        assert_eq!(value["meta"]["created"], "2026-08-06T00:00:00Z");
        assert_eq!(value["meta"]["modified"], "2026-08-06T00:00:00Z");
        assert!(!value["uid"].as_str().unwrap_or("").is_empty());

        let snapshot = value.clone();
        let second = normalize_record(&mut value, &context(&options));
        assert!(!second.changed, "second pass changed: {:?}", second.filled);
        assert_eq!(value, snapshot);
    }

    #[test]
    fn primary_image_leads_and_duplicates_drop() {
        let options = NormalizeOptions::default();
        let mut value = json!({
            "version": 2,
            "uid": "u",
            "front": {"title": "T"},
            "back": {
                "layout": "auto",
                "text": "t",
                "image": {"src": "images/originals/b.png", "alt": "B", "position": "top"},
                "images": [
                    {"src": "images/originals/a.png", "alt": "A"},
                    {"src": "images/originals/b.png", "alt": "B"},
                    {"src": "images/originals/A.PNG", "alt": "dup"}
                ]
            },
            "meta": {"created": "x", "modified": "x", "categories": ["C"]}
        });
        let outcome = normalize_record(&mut value, &context(&options));
        assert!(outcome.changed);
        let images = value["back"]["images"].as_array().expect("images array");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["src"], "images/originals/b.png");
        assert_eq!(images[1]["src"], "images/originals/a.png");
    }

    #[test]
    fn image_list_caps_at_five() {
        let options = NormalizeOptions::default();
        let entries: Vec<serde_json::Value> = (0..7)
            .map(|i| json!({"src": format!("images/originals/p{i}.png"), "alt": "x"}))
            .collect();
        let mut value = json!({
            "version": 2, "uid": "u",
            "front": {"title": "T"},
            "back": {"layout": "auto", "text": "t", "images": entries},
            "meta": {"created": "x", "modified": "x", "categories": ["C"]}
        });
        normalize_record(&mut value, &context(&options));
        assert_eq!(value["back"]["images"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn links_get_type_label_and_url_shaped_field() {
        let options = NormalizeOptions::default();
        let mut value = json!({
            "version": 2, "uid": "u",
            "front": {"title": "T"},
            "back": {
                "layout": "auto", "text": "t",
                "links": [
                    {"url": "https://example.com"},
                    {"type": "file", "url": "docs/guide_v2.pdf"},
                    {"type": "internal", "label": "Go", "target": "rome.json"}
                ]
            },
            "meta": {"created": "x", "modified": "x", "categories": ["C"]}
        });
        normalize_record(&mut value, &context(&options));
        let links = value["back"]["links"].as_array().expect("links");
        assert_eq!(links[0]["type"], "external");
        assert_eq!(links[0]["label"], "Open Website");
        assert_eq!(links[1]["path"], "docs/guide_v2.pdf");
        assert!(links[1].get("url").is_none());
        assert_eq!(links[1]["label"], "Guide V2");
        assert_eq!(links[2], json!({"type": "internal", "label": "Go", "target": "rome.json"}));
    }

    #[test]
    fn stray_legacy_text_is_adopted_once() {
        let options = NormalizeOptions::default();
        let mut value = json!({
            "version": 2, "uid": "u",
            "front": {"title": "T"},
            "header": "Old body text.",
            "back": {"layout": "auto"},
            "meta": {"created": "x", "modified": "x", "categories": ["C"]}
        });
        normalize_record(&mut value, &context(&options));
        assert_eq!(value["back"]["text"], "Old body text.");
        assert!(value.get("header").is_none());
    }

    #[test]
    fn migrated_from_stamp_is_stripped() {
        let options = NormalizeOptions::default();
        let mut value = json!({
            "version": 2, "uid": "u",
            "front": {"title": "T"},
            "back": {"layout": "auto", "text": "t"},
            "meta": {
                "created": "x", "modified": "x", "categories": ["C"],
                "migratedFrom": "legacy-text"
            }
        });
        let outcome = normalize_record(&mut value, &context(&options));
        assert!(outcome.changed);
        assert!(value["meta"].get("migratedFrom").is_none());
    }

    #[test]
    fn selected_mods_limit_what_fills() {
        let mods = ModSet::from_names(&["uid".to_string()]).expect("known mod");
        let options = NormalizeOptions {
            mods,
            ..NormalizeOptions::default()
        };
        let mut value = json!({"version": 2});
        let outcome = normalize_record(&mut value, &context(&options));
        assert!(outcome.changed);
        assert!(value.get("front").is_none());
        assert!(value.get("back").is_none());
        // timestamps mod is off: no modified bump either.
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn unknown_mod_name_is_rejected() {
        assert!(ModSet::from_names(&["bogus".to_string()]).is_err());
    }

    #[test]
    fn title_casing_splits_tokens() {
        assert_eq!(title_from_stem("ancient-rome_map"), "Ancient Rome Map");
        assert_eq!(title_from_stem("x"), "X");
        assert_eq!(title_from_stem(""), "Untitled");
        assert_eq!(alt_from_src("images/originals/Empires_rome_map.png"), "Empires Rome Map");
    }
}
