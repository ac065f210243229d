//! The in-memory resource table built from a configuration tree.

use std::borrow::Cow;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ConfigNode, ConfigTree};
use crate::locale::{FallbackChain, Locale, LocaleMetadata};

/// How resource keys are compared. Fixed for the lifetime of a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyComparison {
    /// Exact, case-sensitive comparison.
    #[default]
    Ordinal,
    /// Unicode case-insensitive comparison.
    IgnoreCase,
}

impl KeyComparison {
    fn fold<'a>(self, key: &'a str) -> Cow<'a, str> {
        match self {
            Self::Ordinal => Cow::Borrowed(key),
            Self::IgnoreCase => Cow::Owned(key.to_lowercase()),
        }
    }
}

fn fold_locale(name: &str) -> String {
    name.to_lowercase()
}

/// Translations of one resource key, by locale name (case-insensitive).
///
/// An empty template is a real translation; a missing locale is not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslationEntry {
    translations: FxHashMap<String, String>,
}

impl TranslationEntry {
    pub fn insert(&mut self, locale: &str, template: impl Into<String>) {
        self.translations.insert(fold_locale(locale), template.into());
    }

    /// Template for exactly `locale`, without fallback.
    pub fn get(&self, locale: &Locale) -> Option<&str> {
        self.translations
            .get(&fold_locale(locale.name()))
            .map(String::as_str)
    }

    /// First template along the fallback chain of `locale`.
    pub fn resolve(&self, locale: &Locale, metadata: &dyn LocaleMetadata) -> Option<&str> {
        FallbackChain::new(locale, metadata).find_map(|candidate| self.get(&candidate))
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

/// Stored key -> translations, in tree enumeration order.
///
/// A table is immutable once loaded; reloads build a new one.
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    comparison: KeyComparison,
    entries: IndexMap<String, (String, TranslationEntry)>,
}

impl ResourceTable {
    pub fn new(comparison: KeyComparison) -> Self {
        Self {
            comparison,
            entries: IndexMap::new(),
        }
    }

    /// Scan the first two levels of `tree`.
    ///
    /// First-level keys are stored resource keys, second-level keys are
    /// locale names. Nodes that do not fit that shape are skipped.
    pub fn load(tree: &dyn ConfigTree, comparison: KeyComparison) -> Self {
        let mut table = Self::new(comparison);
        for node in tree.children() {
            table.add_node(&node);
        }
        debug!(keys = table.len(), ?comparison, "resource table loaded");
        table
    }

    fn add_node(&mut self, node: &ConfigNode) {
        if node.children().is_empty() && node.value().is_some() {
            warn!(path = node.path(), "skipping resource without locale entries");
            return;
        }

        let mut entry = TranslationEntry::default();
        for child in node.children() {
            if !child.children().is_empty() {
                warn!(path = child.path(), "skipping nested section where a translation was expected");
                continue;
            }
            if let Some(template) = child.value() {
                entry.insert(child.key(), template);
            }
        }
        self.insert(node.key(), entry);
    }

    /// Insert or replace the translations of `stored_key`.
    pub fn insert(&mut self, stored_key: &str, entry: TranslationEntry) {
        let folded = self.comparison.fold(stored_key).into_owned();
        self.entries.insert(folded, (stored_key.to_string(), entry));
    }

    pub fn comparison(&self) -> KeyComparison {
        self.comparison
    }

    pub fn entry(&self, stored_key: &str) -> Option<&TranslationEntry> {
        self.entries
            .get(self.comparison.fold(stored_key).as_ref())
            .map(|(_, entry)| entry)
    }

    /// Resolve `stored_key` along the fallback chain of `locale`.
    pub fn resolve(
        &self,
        stored_key: &str,
        locale: &Locale,
        metadata: &dyn LocaleMetadata,
    ) -> Option<&str> {
        self.entry(stored_key)?.resolve(locale, metadata)
    }

    /// `(stored key, translations)` in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TranslationEntry)> {
        self.entries
            .values()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
