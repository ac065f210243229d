//! Locale names, parent chains, and the ambient per-thread locales.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::format::FormatConventions;

/// Upper bound on fallback chain length; real chains are three or four long.
const MAX_CHAIN_LEN: usize = 32;

/// Script parents that cannot be derived by truncating subtags.
const SCRIPT_PARENTS: &[(&str, &str)] = &[
    ("zh-CN", "zh-Hans"),
    ("zh-SG", "zh-Hans"),
    ("zh-TW", "zh-Hant"),
    ("zh-HK", "zh-Hant"),
    ("zh-MO", "zh-Hant"),
];

/// Normalize locale identifiers to a canonical form for lookup.
///
/// - Trims whitespace and converts `_` to `-` (POSIX and Android report `en_US`).
/// - Drops encoding and modifier suffixes (`.UTF-8`, `@euro`).
/// - Canonical casing: `zh-hans-sg` -> `zh-Hans-SG`.
pub fn normalize_locale(s: &str) -> String {
    let base = s.trim().split(['.', '@']).next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for (i, tag) in base.split(['-', '_']).enumerate() {
        if i > 0 {
            out.push('-');
        }
        let alpha = tag.chars().all(|c| c.is_ascii_alphabetic());
        if i > 0 && alpha && tag.len() == 4 {
            let mut chars = tag.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars.map(|c| c.to_ascii_lowercase()));
            }
        } else if i > 0 && alpha && tag.len() == 2 {
            out.push_str(&tag.to_ascii_uppercase());
        } else {
            out.push_str(&tag.to_ascii_lowercase());
        }
    }
    out
}

/// A culture name such as `pt-BR`, `zh-Hans` or the invariant locale `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(normalize_locale(name.as_ref()))
    }

    /// The root of every fallback chain.
    pub fn invariant() -> Self {
        Self(String::new())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_invariant(&self) -> bool {
        self.0.is_empty()
    }

    /// The primary language subtag (`pt` for `pt-BR`).
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Fallback chain of this locale under [`DefaultLocaleMetadata`].
    pub fn fallback_chain(&self) -> Vec<Locale> {
        FallbackChain::new(self, default_metadata()).collect()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invariant() {
            f.write_str("(invariant)")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Locale {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Locale {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Locale> for Locale {
    fn from(l: &Locale) -> Self {
        l.clone()
    }
}

/// Culture data the localizer consumes: parent chains and formatting conventions.
pub trait LocaleMetadata: Send + Sync {
    /// Parent of `locale`. The invariant locale must be its own parent.
    fn parent(&self, locale: &Locale) -> Locale;

    /// Number and date conventions used by positional formatting.
    fn conventions(&self, locale: &Locale) -> FormatConventions {
        FormatConventions::for_locale(locale)
    }
}

/// Built-in metadata: subtag truncation plus the Chinese script table.
#[derive(Clone, Debug, Default)]
pub struct DefaultLocaleMetadata {
    overrides: FxHashMap<Locale, Locale>,
}

impl DefaultLocaleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit parent, taking precedence over the built-in rules.
    pub fn with_parent(mut self, locale: impl Into<Locale>, parent: impl Into<Locale>) -> Self {
        self.overrides.insert(locale.into(), parent.into());
        self
    }
}

impl LocaleMetadata for DefaultLocaleMetadata {
    fn parent(&self, locale: &Locale) -> Locale {
        if let Some(parent) = self.overrides.get(locale) {
            return parent.clone();
        }
        let name = locale.name();
        if let Some((_, parent)) = SCRIPT_PARENTS.iter().find(|(child, _)| *child == name) {
            return Locale(parent.to_string());
        }
        match name.rfind('-') {
            Some(idx) => Locale(name[..idx].to_string()),
            None => Locale::invariant(),
        }
    }
}

pub(crate) fn default_metadata() -> &'static DefaultLocaleMetadata {
    static DEFAULT: OnceLock<DefaultLocaleMetadata> = OnceLock::new();
    DEFAULT.get_or_init(DefaultLocaleMetadata::new)
}

/// Lazily walks `locale`, its parent, its grandparent, ... up to and including
/// the first locale that is its own parent.
pub struct FallbackChain<'a> {
    next: Option<Locale>,
    metadata: &'a dyn LocaleMetadata,
    steps: usize,
}

impl<'a> FallbackChain<'a> {
    pub fn new(locale: &Locale, metadata: &'a dyn LocaleMetadata) -> Self {
        Self {
            next: Some(locale.clone()),
            metadata,
            steps: 0,
        }
    }
}

impl Iterator for FallbackChain<'_> {
    type Item = Locale;

    fn next(&mut self) -> Option<Locale> {
        let current = self.next.take()?;
        self.steps += 1;

        let parent = self.metadata.parent(&current);
        if parent != current {
            if self.steps < MAX_CHAIN_LEN {
                self.next = Some(parent);
            } else {
                warn!(locale = %current, "locale parent chain does not terminate; stopping");
            }
        }
        Some(current)
    }
}

/// Create a fallback chain for translation lookup under the default metadata.
///
/// Example: `zh-SG` -> `["zh-SG", "zh-Hans", "zh", ""]`
pub fn locale_fallback_chain(locale: &str) -> Vec<Locale> {
    Locale::new(locale).fallback_chain()
}

// ========== Ambient locales ==========

thread_local! {
    static CURRENT: RefCell<Option<Locale>> = const { RefCell::new(None) };
    static CURRENT_UI: RefCell<Option<Locale>> = const { RefCell::new(None) };
}

/// The process default, read once from `LC_ALL`, `LC_MESSAGES` or `LANG`.
pub fn process_locale() -> &'static Locale {
    static PROCESS: OnceLock<Locale> = OnceLock::new();
    PROCESS.get_or_init(|| {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.is_empty())
            .map(|v| posix_locale(&v))
            .unwrap_or_default()
    })
}

fn posix_locale(value: &str) -> Locale {
    match value.split(['.', '@']).next().unwrap_or_default() {
        "C" | "POSIX" => Locale::invariant(),
        base => Locale::new(base),
    }
}

/// Locale used for number and date formatting on this thread.
pub fn current_locale() -> Locale {
    CURRENT
        .with(|c| c.borrow().clone())
        .unwrap_or_else(|| process_locale().clone())
}

/// Locale used for resource lookup on this thread.
pub fn current_ui_locale() -> Locale {
    CURRENT_UI
        .with(|c| c.borrow().clone())
        .unwrap_or_else(|| process_locale().clone())
}

pub fn set_current_locale(locale: impl Into<Locale>) {
    let locale = locale.into();
    CURRENT.with(|c| *c.borrow_mut() = Some(locale));
}

pub fn set_current_ui_locale(locale: impl Into<Locale>) {
    let locale = locale.into();
    CURRENT_UI.with(|c| *c.borrow_mut() = Some(locale));
}

/// Set both the formatting and the lookup locale of this thread.
pub fn set_thread_locale(locale: impl Into<Locale>) {
    let locale = locale.into();
    set_current_locale(locale.clone());
    set_current_ui_locale(locale);
}

/// Restores the thread's previous locales when dropped.
#[must_use = "the previous locale is restored as soon as the guard is dropped"]
pub struct LocaleGuard {
    previous: Option<Locale>,
    previous_ui: Option<Locale>,
    _thread_bound: PhantomData<*const ()>,
}

/// Switch this thread to `locale` until the returned guard is dropped.
pub fn scoped_locale(locale: impl Into<Locale>) -> LocaleGuard {
    let locale = locale.into();
    let previous = CURRENT.with(|c| c.borrow_mut().replace(locale.clone()));
    let previous_ui = CURRENT_UI.with(|c| c.borrow_mut().replace(locale));
    LocaleGuard {
        previous,
        previous_ui,
        _thread_bound: PhantomData,
    }
}

impl Drop for LocaleGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let previous_ui = self.previous_ui.take();
        CURRENT.with(|c| *c.borrow_mut() = previous);
        CURRENT_UI.with(|c| *c.borrow_mut() = previous_ui);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(chain: Vec<Locale>) -> Vec<String> {
        chain.into_iter().map(|l| l.name().to_string()).collect()
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_locale(" en_us "), "en-US");
        assert_eq!(normalize_locale("zh-hans-sg"), "zh-Hans-SG");
        assert_eq!(normalize_locale("pt_BR.UTF-8"), "pt-BR");
        assert_eq!(normalize_locale("es-419"), "es-419");
        assert_eq!(normalize_locale(""), "");
    }

    #[test]
    fn region_falls_back_to_language_then_invariant() {
        assert_eq!(names(locale_fallback_chain("pt-BR")), ["pt-BR", "pt", ""]);
        assert_eq!(names(locale_fallback_chain("fr")), ["fr", ""]);
        assert_eq!(names(locale_fallback_chain("")), [""]);
    }

    #[test]
    fn chinese_regions_go_through_scripts() {
        assert_eq!(
            names(locale_fallback_chain("zh-SG")),
            ["zh-SG", "zh-Hans", "zh", ""]
        );
        assert_eq!(
            names(locale_fallback_chain("zh-TW")),
            ["zh-TW", "zh-Hant", "zh", ""]
        );
        assert_eq!(
            names(locale_fallback_chain("sr-Latn-RS")),
            ["sr-Latn-RS", "sr-Latn", "sr", ""]
        );
    }

    #[test]
    fn overrides_take_precedence() {
        let metadata = DefaultLocaleMetadata::new().with_parent("en-AU", "en-GB");
        let chain: Vec<_> = FallbackChain::new(&Locale::new("en-AU"), &metadata).collect();
        assert_eq!(names(chain), ["en-AU", "en-GB", "en", ""]);
    }

    struct Cyclic;

    impl LocaleMetadata for Cyclic {
        fn parent(&self, locale: &Locale) -> Locale {
            if locale.name() == "a" {
                Locale::new("b")
            } else {
                Locale::new("a")
            }
        }
    }

    #[test]
    fn cyclic_metadata_is_bounded() {
        let chain: Vec<_> = FallbackChain::new(&Locale::new("a"), &Cyclic).collect();
        assert_eq!(chain.len(), MAX_CHAIN_LEN);
    }

    #[test]
    fn chain_is_lazy() {
        let mut chain = FallbackChain::new(&Locale::new("de-DE"), default_metadata());
        assert_eq!(chain.next(), Some(Locale::new("de-DE")));
        assert_eq!(chain.next(), Some(Locale::new("de")));
    }

    #[test]
    fn posix_values() {
        assert_eq!(posix_locale("C"), Locale::invariant());
        assert_eq!(posix_locale("POSIX"), Locale::invariant());
        assert_eq!(posix_locale("de_DE.UTF-8@euro"), Locale::new("de-DE"));
    }

    #[test]
    fn guard_restores_previous_locale() {
        set_thread_locale("fr-FR");
        {
            let _guard = scoped_locale("ja-JP");
            assert_eq!(current_ui_locale(), Locale::new("ja-JP"));
            assert_eq!(current_locale(), Locale::new("ja-JP"));
        }
        assert_eq!(current_ui_locale(), Locale::new("fr-FR"));
        assert_eq!(current_locale(), Locale::new("fr-FR"));
    }
}
