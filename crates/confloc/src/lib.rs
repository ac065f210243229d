//! Configuration-backed string localization.
//!
//! Translations live in an ordinary hierarchical configuration tree, two
//! levels deep:
//!
//! ```text
//! Close:
//!   pt-BR: Fechar
//! Colour:
//!   de: Farbe
//!   zh-Hans: 颜色
//! ```
//!
//! - [`config`]: layered JSON / YAML / TOML / INI / environment / in-memory
//!   sources merged into one reloadable tree
//! - [`ConfigLocalizer`]: resolves keys through locale fallback chains
//!   (`zh-SG` -> `zh-Hans` -> `zh` -> invariant) and rebuilds its table
//!   whenever the tree changes
//! - [`format_positional`]: `{0}`-style templates with locale-aware numbers
//!   and dates

pub mod config;
mod error;
mod factory;
mod format;
mod key;
mod locale;
mod localizer;
mod table;

pub use error::{ConfigError, LocalizerError};
pub use factory::{ConfigLocalizerFactory, LocalizationOptions, ResourceSource};
pub use format::{format_positional, FormatArg, FormatConventions, FormatError};
pub use key::{
    escape_key, unescape_key, DelimiterEscape, FnKeyCodec, KeyCodec, ESCAPED_DELIMITER,
    KEY_DELIMITER,
};
pub use locale::{
    current_locale, current_ui_locale, locale_fallback_chain, normalize_locale, process_locale,
    scoped_locale, set_current_locale, set_current_ui_locale, set_thread_locale,
    DefaultLocaleMetadata, FallbackChain, Locale, LocaleGuard, LocaleMetadata,
};
pub use localizer::{ConfigLocalizer, ConfigLocalizerBuilder, LocalizedString, StringLocalizer};
pub use table::{KeyComparison, ResourceTable, TranslationEntry};

/// Look up a resource, formatting it when arguments are given.
///
/// Examples:
/// - `localize!(loc, "Close")`
/// - `localize!(loc, "CreatedOn", date)`
#[macro_export]
macro_rules! localize {
    ($localizer:expr, $name:expr) => {
        $localizer.get($name)
    };
    ($localizer:expr, $name:expr, $($arg:expr),+ $(,)?) => {
        $localizer.format($name, &[$($crate::FormatArg::from($arg)),+])
    };
}
