//! CLI settings file handling (confloc.toml)

use anyhow::{Context, Result};
use confloc::KeyComparison;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE: &str = "confloc.toml";

/// Top-level CLI configuration
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub localizer: LocalizerConfig,
}

/// Where translations are read from, in override order
#[derive(Debug, Default, Deserialize)]
pub struct ResourcesConfig {
    /// Resource files (relative to the settings file)
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Files that may be missing
    #[serde(default)]
    pub optional: Vec<PathBuf>,
    /// Environment variable prefix layered on top of the files
    #[serde(default)]
    pub env_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalizerConfig {
    #[serde(default)]
    pub key_comparison: KeyComparison,
    /// Locale used when `--locale` is not given
    #[serde(default)]
    pub locale: Option<String>,
}

impl CliConfig {
    /// Load an explicit settings file, or `confloc.toml` in the working
    /// directory when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resources.rebase(base);
        }
        Ok(config)
    }
}

impl ResourcesConfig {
    fn rebase(&mut self, base: &Path) {
        for file in self.files.iter_mut().chain(self.optional.iter_mut()) {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_when_sections_are_missing() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert!(config.resources.files.is_empty());
        assert_eq!(config.localizer.key_comparison, KeyComparison::Ordinal);
        assert_eq!(config.localizer.locale, None);
    }

    #[test]
    fn relative_files_follow_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        fs::write(
            &path,
            r#"
[resources]
files = ["i18n/base.json", "/abs/override.ini"]
env_prefix = "APP_"

[localizer]
key_comparison = "ignore_case"
locale = "pt-BR"
"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.resources.files,
            [dir.path().join("i18n/base.json"), PathBuf::from("/abs/override.ini")]
        );
        assert_eq!(config.resources.env_prefix.as_deref(), Some("APP_"));
        assert_eq!(config.localizer.key_comparison, KeyComparison::IgnoreCase);
        assert_eq!(config.localizer.locale.as_deref(), Some("pt-BR"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(CliConfig::load(Some(Path::new("/no/such/confloc.toml"))).is_err());
    }
}
