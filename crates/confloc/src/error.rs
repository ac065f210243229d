use std::path::PathBuf;

use thiserror::Error;

use crate::format::FormatError;

#[derive(Debug, Error)]
pub enum LocalizerError {
    /// A query was made without a resource name.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("localization options do not name a configuration tree")]
    MissingConfiguration,
}

/// Errors raised while reading configuration sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file `{}` was not found and is not optional", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error in `{}`", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("yaml error in `{}`", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("toml error in `{}`", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("syntax error in `{}` at line {line}: {msg}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("cannot infer the format of `{}` (expected .json, .yaml, .yml, .toml or .ini)", path.display())]
    UnknownFormat { path: PathBuf },

    #[cfg(feature = "watch")]
    #[error("failed to watch configuration files")]
    Watch(#[from] notify::Error),
}
