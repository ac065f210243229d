//! Creating localizers from shared options.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigTree;
use crate::error::LocalizerError;
use crate::key::KeyCodec;
use crate::locale::LocaleMetadata;
use crate::localizer::ConfigLocalizer;
use crate::table::KeyComparison;

/// Settings shared by every localizer a factory creates.
#[derive(Clone, Default)]
pub struct LocalizationOptions {
    pub configuration: Option<Arc<dyn ConfigTree>>,
    pub key_comparison: KeyComparison,
    pub key_codec: Option<Arc<dyn KeyCodec>>,
    pub locale_metadata: Option<Arc<dyn LocaleMetadata>>,
}

impl LocalizationOptions {
    pub fn new(configuration: Arc<dyn ConfigTree>) -> Self {
        Self {
            configuration: Some(configuration),
            ..Self::default()
        }
    }

    pub fn key_comparison(mut self, comparison: KeyComparison) -> Self {
        self.key_comparison = comparison;
        self
    }
}

impl fmt::Debug for LocalizationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalizationOptions")
            .field("configuration", &self.configuration.is_some())
            .field("key_comparison", &self.key_comparison)
            .field("key_codec", &self.key_codec.is_some())
            .field("locale_metadata", &self.locale_metadata.is_some())
            .finish()
    }
}

/// What a localizer is requested for. Every descriptor yields an
/// equivalent localizer over the same configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceSource {
    Type(&'static str),
    Named {
        base_name: Option<String>,
        location: Option<String>,
    },
}

impl ResourceSource {
    pub fn of<T: ?Sized>() -> Self {
        Self::Type(std::any::type_name::<T>())
    }
}

pub struct ConfigLocalizerFactory {
    configuration: Arc<dyn ConfigTree>,
    options: LocalizationOptions,
}

impl ConfigLocalizerFactory {
    /// Fails with [`LocalizerError::MissingConfiguration`] when `options`
    /// carry no configuration tree.
    pub fn new(options: LocalizationOptions) -> Result<Self, LocalizerError> {
        let configuration = options
            .configuration
            .clone()
            .ok_or(LocalizerError::MissingConfiguration)?;
        Ok(Self {
            configuration,
            options,
        })
    }

    pub fn create(&self, source: &ResourceSource) -> ConfigLocalizer {
        debug!(?source, "creating localizer");
        let mut builder = ConfigLocalizer::builder(Arc::clone(&self.configuration))
            .key_comparison(self.options.key_comparison);
        if let Some(codec) = &self.options.key_codec {
            builder = builder.key_codec(Arc::clone(codec));
        }
        if let Some(metadata) = &self.options.locale_metadata {
            builder = builder.locale_metadata(Arc::clone(metadata));
        }
        builder.build()
    }

    pub fn create_for<T: ?Sized>(&self) -> ConfigLocalizer {
        self.create(&ResourceSource::of::<T>())
    }

    pub fn create_named(&self, base_name: Option<&str>, location: Option<&str>) -> ConfigLocalizer {
        self.create(&ResourceSource::Named {
            base_name: base_name.map(str::to_string),
            location: location.map(str::to_string),
        })
    }
}

impl fmt::Debug for ConfigLocalizerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLocalizerFactory")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, MemorySource};
    use pretty_assertions::assert_eq;

    #[test]
    fn options_without_configuration_are_rejected() {
        let err = ConfigLocalizerFactory::new(LocalizationOptions::default()).unwrap_err();
        assert!(matches!(err, LocalizerError::MissingConfiguration));
    }

    #[test]
    fn descriptors_do_not_change_the_result() {
        let source = MemorySource::new().with("Close:pt-BR", "Fechar".to_string());
        let config = Arc::new(Configuration::builder().add_memory(source).build().unwrap());
        let options = LocalizationOptions::new(config).key_comparison(KeyComparison::IgnoreCase);
        let factory = ConfigLocalizerFactory::new(options).unwrap();

        let localizers = [
            factory.create(&ResourceSource::Named { base_name: None, location: None }),
            factory.create_for::<String>(),
            factory.create_named(Some("Pages.Index"), Some("app")),
        ];
        for localizer in &localizers {
            let value = localizer.with_locale("pt-BR").get("close").unwrap();
            assert_eq!(value.value(), "Fechar");
        }
    }
}
