//! Resolve legacy or broken image references against the centralized store,
//! and centralize source images into it with collision-safe naming.
//!
//! Resolution is priority-ordered, never fuzzy: exact filename, then the
//! filename with its `word_` category prefix stripped, then both again per
//! extension in [EXTENSION_PRIORITY] order, finally a bare stem lookup for
//! references without a usable extension. First hit wins; a miss is an orphan
//! reference for the caller to report, not an error.

use std::io;
use std::path::Path;

use crate::fsio::CorpusFs;
use crate::record::detect::IMAGE_EXTENSIONS;
use crate::store::index::{stem_of, AssetStoreIndex, EXTENSION_PRIORITY};

pub fn is_known_extension(ext: &str) -> bool {
    let lowered = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&lowered.as_str())
}

/// Strip a leading lowercase category prefix (`competitors_Chatbots.png` ->
/// `Chatbots.png`). The pattern is strict: one run of lowercase ASCII letters
/// followed by an underscore.
pub fn strip_category_prefix(name: &str) -> Option<&str> {
    let (prefix, rest) = name.split_once('_')?;
    if rest.is_empty() || prefix.is_empty() {
        return None;
    }
    if prefix.chars().all(|c| c.is_ascii_lowercase()) {
        Some(rest)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct ImageResolver {
    index: AssetStoreIndex,
}

impl ImageResolver {
    pub fn new(index: AssetStoreIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &AssetStoreIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut AssetStoreIndex {
        &mut self.index
    }

    /// Resolve a reference path or filename to a canonical store path.
    /// Deterministic for a fixed store listing.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let base = base_name(reference);
        if base.is_empty() {
            return None;
        }

        let mut candidates = vec![base];
        if let Some(stripped) = strip_category_prefix(base) {
            candidates.push(stripped);
        }

        for candidate in &candidates {
            if let Some(hit) = self.index.lookup(candidate) {
                return Some(self.index.asset_path(hit));
            }
        }

        for ext in EXTENSION_PRIORITY {
            for candidate in &candidates {
                let retry = format!("{}.{ext}", stem_of(candidate));
                if let Some(hit) = self.index.lookup(&retry) {
                    return Some(self.index.asset_path(hit));
                }
            }
        }

        for candidate in &candidates {
            if let Some(hit) = self.index.lookup_stem(stem_of(candidate)) {
                return Some(self.index.asset_path(hit));
            }
        }

        None
    }

    /// Copy (never move) a source image into the store as
    /// `originals/<category>_<basename>`. An existing name is a no-op that
    /// returns the existing canonical path, so reruns are harmless. Returns
    /// the canonical path and whether a copy actually happened.
    pub fn centralize(
        &mut self,
        fs: &dyn CorpusFs,
        source: &Path,
        category: &str,
    ) -> io::Result<(String, bool)> {
        let basename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("source has no filename: {}", source.display()),
                )
            })?;

        let store_name = format!("{category}_{basename}");
        if let Some(existing) = self.index.lookup(&store_name) {
            return Ok((self.index.asset_path(existing), false));
        }

        let dest = self.index.disk_path(&store_name);
        fs.copy(source, &dest)?;
        self.index.insert(&store_name);
        Ok((self.index.asset_path(&store_name), true))
    }
}

fn base_name(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsio::MemFs;

    fn resolver_with(names: &[&str]) -> ImageResolver {
        let mut index = AssetStoreIndex::default();
        for name in names {
            index.insert(name);
        }
        ImageResolver::new(index)
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let resolver = resolver_with(&["Chatbots.webp"]);
        assert_eq!(
            resolver.resolve("chatbots.WEBP"),
            Some("images/originals/Chatbots.webp".to_string())
        );
    }

    #[test]
    fn prefix_strip_and_extension_retry_find_renamed_asset() {
        // Spec scenario: "competitors_Chatbots.png" missing, store holds
        // "Chatbots.webp".
        let resolver = resolver_with(&["Chatbots.webp"]);
        assert_eq!(
            resolver.resolve("competitors_Chatbots.png"),
            Some("images/originals/Chatbots.webp".to_string())
        );
    }

    #[test]
    fn directory_components_are_ignored() {
        let resolver = resolver_with(&["Rome.png"]);
        assert_eq!(
            resolver.resolve("Empires/images/Rome.png"),
            Some("images/originals/Rome.png".to_string())
        );
    }

    #[test]
    fn extension_priority_orders_ambiguity() {
        let resolver = resolver_with(&["Rome.png", "Rome.webp"]);
        assert_eq!(
            resolver.resolve("Rome.gif"),
            Some("images/originals/Rome.webp".to_string())
        );
    }

    #[test]
    fn bare_stem_resolves_without_extension() {
        let resolver = resolver_with(&["Rome.webp"]);
        assert_eq!(
            resolver.resolve("Rome"),
            Some("images/originals/Rome.webp".to_string())
        );
    }

    #[test]
    fn miss_is_none_and_repeatable() {
        let resolver = resolver_with(&["Rome.webp"]);
        assert_eq!(resolver.resolve("Carthage.png"), None);
        assert_eq!(resolver.resolve("Carthage.png"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn prefix_strip_requires_lowercase_run() {
        assert_eq!(strip_category_prefix("competitors_Chatbots.png"), Some("Chatbots.png"));
        assert_eq!(strip_category_prefix("Rome_Map.png"), None);
        assert_eq!(strip_category_prefix("a1_map.png"), None);
        assert_eq!(strip_category_prefix("map.png"), None);
        assert_eq!(strip_category_prefix("_map.png"), None);
    }

    #[test]
    fn centralize_copies_once_then_noops() {
        let fs = MemFs::new();
        fs.write_str("corpus/Empires/images/rome.png", "img-bytes");
        let index = AssetStoreIndex::scan(&fs, Path::new("corpus/images"));
        let mut resolver = ImageResolver::new(index);

        let (path, copied) = resolver
            .centralize(&fs, Path::new("corpus/Empires/images/rome.png"), "Empires")
            .expect("centralize");
        assert_eq!(path, "images/originals/Empires_rome.png");
        assert!(copied);
        assert!(fs.exists(Path::new("corpus/images/originals/Empires_rome.png")));

        let (again, copied_again) = resolver
            .centralize(&fs, Path::new("corpus/Empires/images/rome.png"), "Empires")
            .expect("rerun");
        assert_eq!(again, path);
        assert!(!copied_again);
    }
}
