use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use tracing::debug;

use super::source::{ConfigEntries, ConfigSource, EnvSource, FileFormat, FileSource, MemorySource};
use super::{compare_keys, fold_key, ChangeListener, ChangeNotifier, ConfigNode, ConfigTree, Subscription};
use crate::error::ConfigError;
use crate::key::KEY_DELIMITER;

/// Ordered list of sources; later sources override earlier ones per path.
#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Add a file, inferring its format from the extension.
    pub fn add_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_source(FileSource::new(path))
    }

    pub fn add_json_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_source(FileSource::new(path).format(FileFormat::Json))
    }

    pub fn add_yaml_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_source(FileSource::new(path).format(FileFormat::Yaml))
    }

    pub fn add_toml_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_source(FileSource::new(path).format(FileFormat::Toml))
    }

    pub fn add_ini_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_source(FileSource::new(path).format(FileFormat::Ini))
    }

    pub fn add_env(self, prefix: impl Into<String>) -> Self {
        self.add_source(EnvSource::new(prefix))
    }

    pub fn add_memory(self, source: MemorySource) -> Self {
        self.add_source(source)
    }

    /// Load every source and start watching files that asked for reloads.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let inner = Arc::new(Inner {
            sources: self.sources,
            root: ArcSwap::from_pointee(ConfigNode::default()),
            notifier: ChangeNotifier::new(),
            reload_lock: Mutex::new(()),
        });
        inner.rebuild()?;

        #[cfg(feature = "watch")]
        let watcher = {
            let files: Vec<PathBuf> = inner
                .sources
                .iter()
                .filter_map(|s| s.watch_path().map(|p| p.to_path_buf()))
                .collect();
            if files.is_empty() {
                None
            } else {
                let weak = Arc::downgrade(&inner);
                Some(super::watch::ConfigWatcher::spawn(&files, move || {
                    if let Some(inner) = weak.upgrade() {
                        if let Err(err) = inner.reload() {
                            tracing::warn!(error = %err, "configuration reload failed; keeping previous values");
                        }
                    }
                })?)
            }
        };

        Ok(Configuration {
            inner,
            #[cfg(feature = "watch")]
            _watcher: watcher,
        })
    }
}

/// A merged, reloadable view over ordered sources.
///
/// Paths are case-insensitive; the first spelling seen for a path is kept.
/// Children of every node are ordered with [`compare_keys`].
pub struct Configuration {
    inner: Arc<Inner>,
    #[cfg(feature = "watch")]
    _watcher: Option<super::watch::ConfigWatcher>,
}

struct Inner {
    sources: Vec<Box<dyn ConfigSource>>,
    root: ArcSwap<ConfigNode>,
    notifier: Arc<ChangeNotifier>,
    reload_lock: Mutex<()>,
}

impl Inner {
    /// Read all sources and install the merged tree. Nothing is installed if
    /// any source fails.
    fn rebuild(&self) -> Result<(), ConfigError> {
        let _serial = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let layers = self
            .sources
            .iter()
            .map(|s| s.load())
            .collect::<Result<Vec<ConfigEntries>, _>>()?;

        let mut root = NodeBuilder::default();
        for (path, value) in layers.into_iter().flatten() {
            root.insert(&path, value);
        }
        let root = root.finish();
        debug!(
            sources = self.sources.len(),
            sections = root.children().len(),
            "configuration loaded"
        );
        self.root.store(Arc::new(root));
        Ok(())
    }

    fn reload(&self) -> Result<(), ConfigError> {
        self.rebuild()?;
        self.notifier.notify();
        Ok(())
    }
}

impl Configuration {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Re-read every source, then notify subscribers. On error the previous
    /// values stay in place and nobody is notified.
    pub fn reload(&self) -> Result<(), ConfigError> {
        self.inner.reload()
    }

    /// Value at a `:`-separated path.
    pub fn get(&self, path: &str) -> Option<String> {
        self.inner.root.load().get(path).map(str::to_string)
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.notifier.listener_count()
    }
}

impl ConfigTree for Configuration {
    fn children(&self) -> Vec<ConfigNode> {
        self.inner.root.load().children().to_vec()
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        self.inner.notifier.subscribe(listener)
    }
}

#[derive(Default)]
struct NodeBuilder {
    key: String,
    path: String,
    value: Option<String>,
    children: IndexMap<String, NodeBuilder>,
}

impl NodeBuilder {
    fn insert(&mut self, path: &str, value: Option<String>) {
        let mut node = self;
        let mut end = 0;
        for (i, segment) in path.split(KEY_DELIMITER).enumerate() {
            if i > 0 {
                end += KEY_DELIMITER.len();
            }
            end += segment.len();
            node = node
                .children
                .entry(fold_key(segment))
                .or_insert_with(|| NodeBuilder {
                    key: segment.to_string(),
                    path: path[..end].to_string(),
                    ..Default::default()
                });
        }
        node.value = value;
    }

    fn finish(self) -> ConfigNode {
        let mut children: Vec<ConfigNode> =
            self.children.into_values().map(NodeBuilder::finish).collect();
        children.sort_by(|a, b| compare_keys(a.key(), b.key()));
        ConfigNode {
            key: self.key,
            path: self.path,
            value: self.value,
            children,
        }
    }
}
