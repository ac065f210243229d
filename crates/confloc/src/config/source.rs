use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::warn;

use super::ini;
use crate::error::ConfigError;
use crate::key::KEY_DELIMITER;

/// Flattened `path -> value` pairs produced by a source, in source order.
pub type ConfigEntries = Vec<(String, Option<String>)>;

/// One layer of a [`Configuration`](super::Configuration).
pub trait ConfigSource: Send + Sync {
    /// Read the source from scratch.
    fn load(&self) -> Result<ConfigEntries, ConfigError>;

    /// File to watch for changes, if the source asked for reloads.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
    Ini,
}

impl FileFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "ini" => Some(Self::Ini),
            _ => None,
        }
    }
}

/// A resource file on disk.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    format: Option<FileFormat>,
    optional: bool,
    reload_on_change: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            optional: false,
            reload_on_change: false,
        }
    }

    /// Override format inference.
    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// A missing optional file loads as empty instead of failing.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn reload_on_change(mut self, reload: bool) -> Self {
        self.reload_on_change = reload;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, format: FileFormat, text: &str) -> Result<ConfigEntries, ConfigError> {
        let mut out = ConfigEntries::new();
        match format {
            FileFormat::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(text).map_err(|source| ConfigError::Json {
                        path: self.path.clone(),
                        source,
                    })?;
                if !value.is_object() {
                    return Err(self.root_not_a_map());
                }
                flatten_json(&value, None, &mut out);
            }
            FileFormat::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                        path: self.path.clone(),
                        source,
                    })?;
                match value {
                    serde_yaml::Value::Null => {}
                    serde_yaml::Value::Mapping(_) => flatten_yaml(&value, None, &mut out),
                    _ => return Err(self.root_not_a_map()),
                }
            }
            FileFormat::Toml => {
                let table: toml::Table =
                    toml::from_str(text).map_err(|source| ConfigError::Toml {
                        path: self.path.clone(),
                        source,
                    })?;
                for (key, value) in &table {
                    flatten_toml(value, &join(None, key), &mut out);
                }
            }
            FileFormat::Ini => {
                out = ini::parse(text).map_err(|e| ConfigError::Syntax {
                    path: self.path.clone(),
                    line: e.line,
                    msg: e.msg,
                })?;
            }
        }
        Ok(out)
    }

    fn root_not_a_map(&self) -> ConfigError {
        ConfigError::Syntax {
            path: self.path.clone(),
            line: 1,
            msg: "the top-level value must be a map".to_string(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigEntries, ConfigError> {
        let format = self
            .format
            .or_else(|| FileFormat::from_path(&self.path))
            .ok_or_else(|| ConfigError::UnknownFormat {
                path: self.path.clone(),
            })?;

        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound && self.optional => {
                return Ok(ConfigEntries::new())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::Missing {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        self.parse(format, &text)
    }

    fn watch_path(&self) -> Option<&Path> {
        self.reload_on_change.then_some(self.path.as_path())
    }
}

fn join(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{KEY_DELIMITER}{key}"),
        None => key.to_string(),
    }
}

fn flatten_json(value: &serde_json::Value, path: Option<&str>, out: &mut ConfigEntries) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            if map.is_empty() {
                if let Some(path) = path {
                    out.push((path.to_string(), None));
                }
            }
            for (key, child) in map {
                flatten_json(child, Some(&join(path, key)), out);
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                if let Some(path) = path {
                    out.push((path.to_string(), None));
                }
            }
            for (idx, child) in items.iter().enumerate() {
                flatten_json(child, Some(&join(path, &idx.to_string())), out);
            }
        }
        Value::Null => push_scalar(path, String::new(), out),
        Value::String(s) => push_scalar(path, s.clone(), out),
        Value::Bool(b) => push_scalar(path, b.to_string(), out),
        Value::Number(n) => push_scalar(path, n.to_string(), out),
    }
}

fn flatten_yaml(value: &serde_yaml::Value, path: Option<&str>, out: &mut ConfigEntries) {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            if map.is_empty() {
                if let Some(path) = path {
                    out.push((path.to_string(), None));
                }
            }
            for (key, child) in map {
                let key = match key {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    other => {
                        warn!(key = ?other, "skipping yaml entry with a non-scalar key");
                        continue;
                    }
                };
                flatten_yaml(child, Some(&join(path, &key)), out);
            }
        }
        Value::Sequence(items) => {
            if items.is_empty() {
                if let Some(path) = path {
                    out.push((path.to_string(), None));
                }
            }
            for (idx, child) in items.iter().enumerate() {
                flatten_yaml(child, Some(&join(path, &idx.to_string())), out);
            }
        }
        Value::Tagged(tagged) => flatten_yaml(&tagged.value, path, out),
        Value::Null => push_scalar(path, String::new(), out),
        Value::String(s) => push_scalar(path, s.clone(), out),
        Value::Bool(b) => push_scalar(path, b.to_string(), out),
        Value::Number(n) => push_scalar(path, n.to_string(), out),
    }
}

fn flatten_toml(value: &toml::Value, path: &str, out: &mut ConfigEntries) {
    use toml::Value;

    match value {
        Value::Table(table) => {
            if table.is_empty() {
                out.push((path.to_string(), None));
            }
            for (key, child) in table {
                flatten_toml(child, &join(Some(path), key), out);
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push((path.to_string(), None));
            }
            for (idx, child) in items.iter().enumerate() {
                flatten_toml(child, &join(Some(path), &idx.to_string()), out);
            }
        }
        Value::String(s) => out.push((path.to_string(), Some(s.clone()))),
        Value::Integer(i) => out.push((path.to_string(), Some(i.to_string()))),
        Value::Float(f) => out.push((path.to_string(), Some(f.to_string()))),
        Value::Boolean(b) => out.push((path.to_string(), Some(b.to_string()))),
        Value::Datetime(d) => out.push((path.to_string(), Some(d.to_string()))),
    }
}

fn push_scalar(path: Option<&str>, value: String, out: &mut ConfigEntries) {
    if let Some(path) = path {
        out.push((path.to_string(), Some(value)));
    }
}

/// Environment variables starting with a prefix; `__` separates path segments
/// (`APP_Close__pt-BR` -> `Close:pt-BR` with prefix `APP_`).
#[derive(Clone, Debug, Default)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigEntries, ConfigError> {
        let prefix = self.prefix.to_ascii_uppercase();
        let mut out: ConfigEntries = std::env::vars_os()
            .filter_map(|(name, value)| {
                let (name, value) = (name.into_string().ok()?, value.into_string().ok()?);
                let head = name.get(..self.prefix.len())?;
                if head.to_ascii_uppercase() != prefix {
                    return None;
                }
                let path = name[self.prefix.len()..].replace("__", KEY_DELIMITER);
                Some((path, Some(value)))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// An in-memory source. Clones share the same entries, so a handle kept by
/// the caller can change values before [`Configuration::reload`](super::Configuration::reload).
#[derive(Clone, Default)]
pub struct MemorySource {
    entries: Arc<RwLock<IndexMap<String, Option<String>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(self, path: impl Into<String>, value: impl Into<Option<String>>) -> Self {
        self.set(path, value);
        self
    }

    pub fn set(&self, path: impl Into<String>, value: impl Into<Option<String>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), value.into());
    }

    pub fn remove(&self, path: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(path);
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MemorySource").field("entries", &len).finish()
    }
}

impl ConfigSource for MemorySource {
    fn load(&self) -> Result<ConfigEntries, ConfigError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn some(path: &str, value: &str) -> (String, Option<String>) {
        (path.to_string(), Some(value.to_string()))
    }

    fn parse(format: FileFormat, text: &str) -> Result<ConfigEntries, ConfigError> {
        FileSource::new("inline").parse(format, text)
    }

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.JSON")), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_path(Path::new("b.yml")), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_path(Path::new("b.toml")), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_path(Path::new("b.ini")), Some(FileFormat::Ini));
        assert_eq!(FileFormat::from_path(Path::new("b.txt")), None);
    }

    #[test]
    fn json_flattens_nested_objects() {
        let entries = parse(
            FileFormat::Json,
            r#"{ "Close": { "pt-BR": "Fechar" }, "Invariant": { "": "x" },
                 "NullValue": { "en-NZ": null }, "Empty": {}, "List": [1, true] }"#,
        )
        .unwrap();
        let mut entries = entries;
        entries.sort();
        assert_eq!(
            entries,
            vec![
                some("Close:pt-BR", "Fechar"),
                ("Empty".to_string(), None),
                some("Invariant:", "x"),
                some("List:0", "1"),
                some("List:1", "true"),
                some("NullValue:en-NZ", ""),
            ]
        );
    }

    #[test]
    fn json_root_must_be_an_object() {
        assert!(matches!(
            parse(FileFormat::Json, "[1, 2]"),
            Err(ConfigError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse(FileFormat::Json, "{"),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn yaml_and_toml_flatten_like_json() {
        let yaml = parse(
            FileFormat::Yaml,
            "Close:\n  pt-BR: Fechar\nNullValue:\n  en-NZ: ~\n",
        )
        .unwrap();
        assert_eq!(
            yaml,
            vec![some("Close:pt-BR", "Fechar"), some("NullValue:en-NZ", "")]
        );

        let toml = parse(FileFormat::Toml, "[Close]\n\"pt-BR\" = \"Fechar\"\n").unwrap();
        assert_eq!(toml, vec![some("Close:pt-BR", "Fechar")]);

        assert!(parse(FileFormat::Yaml, "").unwrap().is_empty());
    }

    #[test]
    fn missing_files() {
        let required = FileSource::new("/definitely/not/here.json");
        assert!(matches!(required.load(), Err(ConfigError::Missing { .. })));

        let optional = FileSource::new("/definitely/not/here.json").optional(true);
        assert!(optional.load().unwrap().is_empty());

        let unknown = FileSource::new("/definitely/not/here.txt").optional(true);
        assert!(matches!(unknown.load(), Err(ConfigError::UnknownFormat { .. })));
    }

    #[test]
    fn only_reloading_files_are_watched() {
        let file = FileSource::new("a.json");
        assert_eq!(file.watch_path(), None);
        let file = file.reload_on_change(true);
        assert_eq!(file.watch_path(), Some(Path::new("a.json")));
    }

    #[test]
    fn memory_source_is_shared_between_clones() {
        let source = MemorySource::new().with("Close:pt-BR", "Fechar".to_string());
        let handle = source.clone();
        handle.set("Close:de", "Schließen".to_string());
        handle.remove("Close:pt-BR");
        assert_eq!(source.load().unwrap(), vec![some("Close:de", "Schließen")]);
    }

    #[test]
    fn env_source_strips_prefix_and_splits_segments() {
        std::env::set_var("CONFLOC_SRC_TEST_Close__pt-BR", "Fechar");
        let entries = EnvSource::new("CONFLOC_SRC_TEST_").load().unwrap();
        assert_eq!(entries, vec![some("Close:pt-BR", "Fechar")]);
    }

    #[cfg(unix)]
    #[test]
    fn env_source_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("CONFLOC_UNRELATED_BYTES", OsStr::from_bytes(b"\xff\xfe"));
        std::env::set_var("CONFLOC_UTF8_TEST_Close__de", "Schließen");
        let entries = EnvSource::new("CONFLOC_UTF8_TEST_").load().unwrap();
        assert_eq!(entries, vec![some("Close:de", "Schließen")]);
    }
}
