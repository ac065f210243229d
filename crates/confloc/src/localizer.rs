use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tracing::trace;

use crate::config::{ConfigTree, Subscription};
use crate::error::LocalizerError;
use crate::format::{format_positional, FormatArg};
use crate::key::{DelimiterEscape, KeyCodec};
use crate::locale::{current_locale, current_ui_locale, DefaultLocaleMetadata, Locale, LocaleMetadata};
use crate::table::{KeyComparison, ResourceTable};

/// Result of a lookup: the requested name, the resolved text and whether a
/// translation was found. When nothing was found the text is the name itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizedString {
    name: String,
    value: String,
    found: bool,
}

impl LocalizedString {
    pub fn new(name: impl Into<String>, value: impl Into<String>, found: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            found,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn resource_not_found(&self) -> bool {
        !self.found
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Display for LocalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for LocalizedString {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl PartialEq<str> for LocalizedString {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for LocalizedString {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl From<LocalizedString> for String {
    fn from(s: LocalizedString) -> Self {
        s.value
    }
}

/// Object-safe localizer surface, for hosts that hold `Box<dyn StringLocalizer>`.
pub trait StringLocalizer: Send + Sync {
    fn localize(&self, name: &str) -> Result<LocalizedString, LocalizerError>;

    fn localize_args(&self, name: &str, args: &[FormatArg]) -> Result<LocalizedString, LocalizerError>;

    fn all_strings(&self, include_parent_locales: bool) -> Vec<LocalizedString>;

    fn for_locale(&self, locale: Locale) -> Box<dyn StringLocalizer>;
}

struct Resources {
    tree: Arc<dyn ConfigTree>,
    comparison: KeyComparison,
    table: ArcSwap<ResourceTable>,
}

impl Resources {
    fn reload(&self) {
        let table = ResourceTable::load(self.tree.as_ref(), self.comparison);
        self.table.store(Arc::new(table));
    }
}

/// Resolves resource keys against a configuration tree.
///
/// Clones and [`with_locale`](Self::with_locale) views share one live table,
/// which is rebuilt whenever the tree reports a change. The subscription is
/// released when the last of them is dropped.
#[derive(Clone)]
pub struct ConfigLocalizer {
    resources: Arc<Resources>,
    codec: Arc<dyn KeyCodec>,
    metadata: Arc<dyn LocaleMetadata>,
    locale: Option<Locale>,
    _subscription: Arc<Subscription>,
}

impl ConfigLocalizer {
    /// A localizer with ordinal key comparison, the default key codec and
    /// the built-in locale metadata.
    pub fn new(tree: Arc<dyn ConfigTree>) -> Self {
        Self::builder(tree).build()
    }

    pub fn builder(tree: Arc<dyn ConfigTree>) -> ConfigLocalizerBuilder {
        ConfigLocalizerBuilder {
            tree,
            comparison: KeyComparison::default(),
            codec: None,
            metadata: None,
        }
    }

    /// Resolve `name` for the effective UI locale.
    ///
    /// Returns [`LocalizerError::InvalidArgument`] when `name` is `None`.
    pub fn get<'a>(&self, name: impl Into<Option<&'a str>>) -> Result<LocalizedString, LocalizerError> {
        let name = require_name(name.into())?;
        let table = self.resources.table.load();
        Ok(match self.lookup(&table, name) {
            Some(value) => LocalizedString::new(name, value, true),
            None => LocalizedString::new(name, name, false),
        })
    }

    /// Resolve `name`, then substitute `{index}` placeholders with `args`
    /// using the conventions of the effective formatting locale. Without a
    /// translation the name itself is used as the template.
    pub fn format<'a>(
        &self,
        name: impl Into<Option<&'a str>>,
        args: &[FormatArg],
    ) -> Result<LocalizedString, LocalizerError> {
        let name = require_name(name.into())?;
        let table = self.resources.table.load();
        let template = self.lookup(&table, name);
        let conventions = self.metadata.conventions(&self.effective_locale());
        let value = format_positional(template.unwrap_or(name), args, &conventions)?;
        Ok(LocalizedString::new(name, value, template.is_some()))
    }

    /// Every key of the table.
    ///
    /// With `include_parent_locales` each key is resolved through the
    /// fallback chain and unresolved keys are reported as not found. Without
    /// it only keys translated for exactly the effective UI locale are
    /// returned.
    pub fn get_all(&self, include_parent_locales: bool) -> Vec<LocalizedString> {
        let table = self.resources.table.load();
        let locale = self.effective_ui_locale();

        table
            .iter()
            .filter_map(|(stored, entry)| {
                let name = self.codec.decode(stored);
                let hit = if include_parent_locales {
                    entry.resolve(&locale, self.metadata.as_ref())
                } else {
                    Some(entry.get(&locale)?)
                };
                Some(match hit {
                    Some(value) => LocalizedString::new(name, value, true),
                    None => LocalizedString::new(name.clone(), name, false),
                })
            })
            .collect()
    }

    /// A view that resolves against `locale` instead of the ambient locales.
    pub fn with_locale(&self, locale: impl Into<Locale>) -> Self {
        Self {
            locale: Some(locale.into()),
            ..self.clone()
        }
    }

    /// Locale used for lookups: the bound locale, else this thread's UI locale.
    pub fn effective_ui_locale(&self) -> Locale {
        self.locale.clone().unwrap_or_else(current_ui_locale)
    }

    /// Locale used for formatting: the bound locale, else this thread's locale.
    pub fn effective_locale(&self) -> Locale {
        self.locale.clone().unwrap_or_else(current_locale)
    }

    /// The table currently in use.
    pub fn snapshot(&self) -> Arc<ResourceTable> {
        self.resources.table.load_full()
    }

    fn lookup<'t>(&self, table: &'t ResourceTable, name: &str) -> Option<&'t str> {
        let stored = self.codec.encode(name);
        let locale = self.effective_ui_locale();
        let hit = table.resolve(&stored, &locale, self.metadata.as_ref());
        trace!(key = name, %locale, found = hit.is_some(), "lookup");
        hit
    }
}

fn require_name(name: Option<&str>) -> Result<&str, LocalizerError> {
    name.ok_or(LocalizerError::InvalidArgument("resource name must not be null"))
}

impl fmt::Debug for ConfigLocalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLocalizer")
            .field("locale", &self.locale)
            .field("comparison", &self.resources.comparison)
            .field("keys", &self.resources.table.load().len())
            .finish_non_exhaustive()
    }
}

impl StringLocalizer for ConfigLocalizer {
    fn localize(&self, name: &str) -> Result<LocalizedString, LocalizerError> {
        self.get(name)
    }

    fn localize_args(&self, name: &str, args: &[FormatArg]) -> Result<LocalizedString, LocalizerError> {
        self.format(name, args)
    }

    fn all_strings(&self, include_parent_locales: bool) -> Vec<LocalizedString> {
        self.get_all(include_parent_locales)
    }

    fn for_locale(&self, locale: Locale) -> Box<dyn StringLocalizer> {
        Box::new(self.with_locale(locale))
    }
}

/// Options for [`ConfigLocalizer`].
pub struct ConfigLocalizerBuilder {
    tree: Arc<dyn ConfigTree>,
    comparison: KeyComparison,
    codec: Option<Arc<dyn KeyCodec>>,
    metadata: Option<Arc<dyn LocaleMetadata>>,
}

impl ConfigLocalizerBuilder {
    pub fn key_comparison(mut self, comparison: KeyComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn key_codec(mut self, codec: Arc<dyn KeyCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn locale_metadata(mut self, metadata: Arc<dyn LocaleMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Subscribe to tree changes, then load the initial table.
    pub fn build(self) -> ConfigLocalizer {
        let resources = Arc::new(Resources {
            tree: self.tree,
            comparison: self.comparison,
            table: ArcSwap::from_pointee(ResourceTable::new(self.comparison)),
        });

        let weak: Weak<Resources> = Arc::downgrade(&resources);
        let subscription = resources.tree.subscribe(Arc::new(move || {
            if let Some(resources) = weak.upgrade() {
                resources.reload();
            }
        }));
        resources.reload();

        ConfigLocalizer {
            resources,
            codec: self.codec.unwrap_or_else(|| Arc::new(DelimiterEscape)),
            metadata: self
                .metadata
                .unwrap_or_else(|| Arc::new(DefaultLocaleMetadata::new())),
            locale: None,
            _subscription: Arc::new(subscription),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, MemorySource};
    use crate::locale::scoped_locale;
    use pretty_assertions::assert_eq;

    fn localizer(source: MemorySource) -> (Arc<Configuration>, ConfigLocalizer) {
        let config = Arc::new(Configuration::builder().add_memory(source).build().unwrap());
        let localizer = ConfigLocalizer::new(config.clone());
        (config, localizer)
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with("Close:pt-BR", "Fechar".to_string())
            .with("Colour:de", "Farbe".to_string())
            .with("Colour:zh-Hans", "颜色".to_string())
            .with("a&colon;b:en", "escaped".to_string())
            .with("Count:en", "{0} items".to_string())
    }

    #[test]
    fn get_uses_ambient_ui_locale() {
        let (_config, loc) = localizer(source());

        let _guard = scoped_locale("pt-BR");
        assert_eq!(loc.get("Close").unwrap(), LocalizedString::new("Close", "Fechar", true));

        let _guard = scoped_locale("zh-SG");
        assert_eq!(loc.get("Colour").unwrap().value(), "颜色");
    }

    #[test]
    fn missing_returns_the_name() {
        let (_config, loc) = localizer(source());
        let _guard = scoped_locale("fr");
        let value = loc.get("Colour").unwrap();
        assert!(value.resource_not_found());
        assert_eq!(value, "Colour");
        assert_eq!(loc.get("Nope").unwrap(), LocalizedString::new("Nope", "Nope", false));
    }

    #[test]
    fn null_name_is_rejected() {
        let (_config, loc) = localizer(source());
        assert!(matches!(loc.get(None::<&str>), Err(LocalizerError::InvalidArgument(_))));
        assert!(matches!(loc.format(None::<&str>, &[]), Err(LocalizerError::InvalidArgument(_))));
    }

    #[test]
    fn keys_with_delimiters_are_escaped() {
        let (_config, loc) = localizer(source());
        let gb = loc.with_locale("en-GB");
        assert_eq!(gb.get("a:b").unwrap().value(), "escaped");
        assert!(gb.get_all(false).is_empty());

        let names: Vec<String> = loc
            .with_locale("en")
            .get_all(false)
            .into_iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["a:b", "Count"]);
    }

    #[test]
    fn format_substitutes_arguments() {
        let (_config, loc) = localizer(source());
        let en = loc.with_locale("en");
        assert_eq!(en.format("Count", &[3i64.into()]).unwrap().value(), "3 items");

        let missing = en.format("{0} of {1}", &[1i64.into(), 2i64.into()]).unwrap();
        assert_eq!(missing, LocalizedString::new("{0} of {1}", "1 of 2", false));

        assert!(matches!(
            en.format("Count", &[]),
            Err(LocalizerError::Format(_))
        ));
    }

    #[test]
    fn bound_view_ignores_ambient_locale() {
        let (_config, loc) = localizer(source());
        let de = loc.with_locale("de-CH");
        let _guard = scoped_locale("pt-BR");
        assert_eq!(de.get("Colour").unwrap().value(), "Farbe");
        assert_eq!(de.effective_ui_locale(), Locale::new("de-CH"));
        assert_eq!(loc.effective_ui_locale(), Locale::new("pt-BR"));
    }

    #[test]
    fn reload_is_visible_to_all_views() {
        let source = source();
        let (config, loc) = localizer(source.clone());
        let pt = loc.with_locale("pt-BR");

        source.set("Close:pt-BR", "Encerrar".to_string());
        assert_eq!(pt.get("Close").unwrap().value(), "Fechar");

        config.reload().unwrap();
        assert_eq!(pt.get("Close").unwrap().value(), "Encerrar");
        assert!(loc.with_locale("pt").get("Close").unwrap().resource_not_found());
    }

    #[test]
    fn dropping_the_last_view_unsubscribes() {
        let notifier = crate::config::ChangeNotifier::new();

        struct Tree(Arc<crate::config::ChangeNotifier>);
        impl ConfigTree for Tree {
            fn children(&self) -> Vec<crate::config::ConfigNode> {
                Vec::new()
            }
            fn subscribe(&self, listener: crate::config::ChangeListener) -> Subscription {
                self.0.subscribe(listener)
            }
        }

        let loc = ConfigLocalizer::new(Arc::new(Tree(notifier.clone())));
        let view = loc.with_locale("en");
        assert_eq!(notifier.listener_count(), 1);

        drop(loc);
        assert_eq!(notifier.listener_count(), 1);
        drop(view);
        assert_eq!(notifier.listener_count(), 0);
    }
}
