//! confloc - inspect configuration-backed translations
//!
//! - `get`: resolve one key, optionally formatting it with arguments
//! - `list`: every key for a locale
//! - `chain`: the fallback chain of a locale
//! - `watch`: print keys again whenever a resource file changes

mod config;

use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use confloc::config::{ConfigBuilder, ConfigTree, Configuration, FileSource};
use confloc::{ConfigLocalizer, FormatArg, KeyComparison, Locale, LocalizedString};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

/// Resolve and inspect translations stored in configuration files
#[derive(Parser, Debug)]
#[command(name = "confloc")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./confloc.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resource file; repeat to layer files, later ones win
    #[arg(short, long = "resource", global = true)]
    resources: Vec<PathBuf>,

    /// Compare resource keys case-insensitively
    #[arg(long, global = true)]
    ignore_case: bool,

    /// Locale to resolve against (defaults to the settings file, then LANG)
    #[arg(short, long, global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a key
    Get {
        key: String,
        /// Positional arguments for `{0}`, `{1}`, ... placeholders
        args: Vec<String>,
    },
    /// List every key
    List {
        /// Only keys translated for exactly this locale
        #[arg(long)]
        exact: bool,
    },
    /// Print the fallback chain of a locale
    Chain { locale: String },
    /// Print keys now and after every resource file change
    Watch { keys: Vec<String> },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = CliConfig::load(cli.config.as_deref())?;

    if let Command::Chain { locale } = &cli.command {
        for locale in Locale::new(locale).fallback_chain() {
            println!("{locale}");
        }
        return Ok(());
    }

    let watch = matches!(cli.command, Command::Watch { .. });
    let configuration = Arc::new(build_configuration(&cli, &settings, watch)?);
    let comparison = if cli.ignore_case {
        KeyComparison::IgnoreCase
    } else {
        settings.localizer.key_comparison
    };
    let localizer = ConfigLocalizer::builder(configuration.clone())
        .key_comparison(comparison)
        .build();
    let localizer = match cli.locale.as_deref().or(settings.localizer.locale.as_deref()) {
        Some(locale) => localizer.with_locale(locale),
        None => localizer,
    };
    debug!(locale = %localizer.effective_ui_locale(), ?comparison, "localizer ready");

    match cli.command {
        Command::Get { key, args } => {
            let args: Vec<FormatArg> = args.iter().map(|a| parse_arg(a)).collect();
            let value = if args.is_empty() {
                localizer.get(key.as_str())?
            } else {
                localizer.format(key.as_str(), &args)?
            };
            if value.resource_not_found() {
                warn!(key = value.name(), locale = %localizer.effective_ui_locale(), "no translation");
            }
            println!("{value}");
        }
        Command::List { exact } => {
            for value in localizer.get_all(!exact) {
                print_entry(&value);
            }
        }
        Command::Watch { keys } => {
            let (tx, rx) = mpsc::channel();
            let _subscription = configuration.subscribe(Arc::new(move || {
                let _ = tx.send(());
            }));
            info!("watching for resource changes; press Ctrl-C to stop");

            print_keys(&localizer, &keys)?;
            while rx.recv().is_ok() {
                println!("--");
                print_keys(&localizer, &keys)?;
            }
        }
        Command::Chain { .. } => {}
    }

    Ok(())
}

fn build_configuration(cli: &Cli, settings: &CliConfig, watch: bool) -> Result<Configuration> {
    let mut builder = ConfigBuilder::new();
    let mut layers = 0;

    for path in settings.resources.files.iter().chain(&cli.resources) {
        builder = builder.add_source(FileSource::new(path).reload_on_change(watch));
        layers += 1;
    }
    for path in &settings.resources.optional {
        builder = builder.add_source(FileSource::new(path).optional(true).reload_on_change(watch));
        layers += 1;
    }
    if let Some(prefix) = &settings.resources.env_prefix {
        builder = builder.add_env(prefix.clone());
        layers += 1;
    }

    if layers == 0 {
        bail!("No resources given. Pass --resource FILE or list files in {}.", config::DEFAULT_FILE);
    }
    Ok(builder.build()?)
}

/// Integers, then floats, then dates (`2018-06-15`, `2018-06-15T10:30:00`),
/// otherwise the text itself.
fn parse_arg(raw: &str) -> FormatArg {
    if let Ok(i) = raw.parse::<i64>() {
        return FormatArg::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return FormatArg::Float(f);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return FormatArg::DateTime(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.into();
    }
    FormatArg::from(raw)
}

fn print_entry(value: &LocalizedString) {
    if value.is_found() {
        println!("{} = {}", value.name(), value.value());
    } else {
        println!("{} (missing)", value.name());
    }
}

fn print_keys(localizer: &ConfigLocalizer, keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        for value in localizer.get_all(true) {
            print_entry(&value);
        }
        return Ok(());
    }
    for key in keys {
        print_entry(&localizer.get(key.as_str())?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arguments_are_typed() {
        assert!(matches!(parse_arg("42"), FormatArg::Int(42)));
        assert!(matches!(parse_arg("-1.5"), FormatArg::Float(f) if f == -1.5));
        assert!(matches!(parse_arg("2018-06-15"), FormatArg::DateTime(_)));
        assert!(matches!(parse_arg("2018-06-15T10:30:00"), FormatArg::DateTime(_)));
        assert!(matches!(parse_arg("Ada"), FormatArg::Str(ref s) if s == "Ada"));
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "confloc", "get", "Close", "-r", "a.json", "-r", "b.ini", "--locale", "pt-BR",
        ])
        .unwrap();
        assert_eq!(cli.resources, [PathBuf::from("a.json"), PathBuf::from("b.ini")]);
        assert_eq!(cli.locale.as_deref(), Some("pt-BR"));
        assert!(matches!(cli.command, Command::Get { ref key, .. } if key == "Close"));
    }
}
