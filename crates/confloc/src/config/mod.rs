//! Hierarchical configuration trees.
//!
//! The localizer only needs [`ConfigTree`]: named first-level nodes with named
//! children, plus a change notification. [`Configuration`] is the bundled
//! implementation, merging ordered file, environment and in-memory sources.

mod ini;
mod layered;
mod source;
#[cfg(feature = "watch")]
mod watch;

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub use layered::{ConfigBuilder, Configuration};
pub use source::{ConfigEntries, ConfigSource, EnvSource, FileFormat, FileSource, MemorySource};

use crate::key::KEY_DELIMITER;

/// A node of the configuration tree: a key, an optional value and children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigNode {
    key: String,
    path: String,
    value: Option<String>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    /// A leaf node. `None` marks a key that exists without a value.
    pub fn leaf(key: impl Into<String>, value: impl Into<Option<String>>) -> Self {
        let key = key.into();
        Self {
            path: key.clone(),
            key,
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// A section node; child paths are rewritten under `key`.
    pub fn section(key: impl Into<String>, children: impl IntoIterator<Item = ConfigNode>) -> Self {
        let key = key.into();
        let mut node = Self {
            path: key.clone(),
            key,
            value: None,
            children: children.into_iter().collect(),
        };
        let path = node.path.clone();
        for child in &mut node.children {
            child.rebase(&path);
        }
        node
    }

    fn rebase(&mut self, parent: &str) {
        self.path = format!("{parent}{KEY_DELIMITER}{}", self.key);
        let path = self.path.clone();
        for child in &mut self.children {
            child.rebase(&path);
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full path from the root, segments joined with `:`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    /// Case-insensitive child lookup.
    pub fn child(&self, key: &str) -> Option<&ConfigNode> {
        self.children
            .iter()
            .find(|c| compare_keys(&c.key, key) == Ordering::Equal)
    }

    /// Resolve a `:`-separated path relative to this node.
    pub fn get(&self, path: &str) -> Option<&str> {
        path.split(KEY_DELIMITER)
            .try_fold(self, |node, segment| node.child(segment))?
            .value()
    }
}

/// Compare sibling keys the way configuration providers order them:
/// integer keys first in numeric order, then case-insensitive text.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a
            .chars()
            .flat_map(char::to_uppercase)
            .cmp(b.chars().flat_map(char::to_uppercase)),
    }
}

pub(crate) fn fold_key(key: &str) -> String {
    key.to_uppercase()
}

/// Callback fired after the tree changed.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// The tree a localizer reads resources from.
pub trait ConfigTree: Send + Sync {
    /// First-level nodes, in precedence-aware enumeration order.
    fn children(&self) -> Vec<ConfigNode>;

    /// Register `listener`; it is removed when the subscription is dropped.
    fn subscribe(&self, listener: ChangeListener) -> Subscription;
}

impl<T: ConfigTree + ?Sized> ConfigTree for Arc<T> {
    fn children(&self) -> Vec<ConfigNode> {
        (**self).children()
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        (**self).subscribe(listener)
    }
}

/// Listener registry backing [`ConfigTree::subscribe`].
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
}

impl ChangeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, listener: ChangeListener) -> Subscription {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.lock().push((id, listener));
        Subscription {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    /// Invoke every listener. Listeners run outside the registry lock so they
    /// may subscribe or unsubscribe.
    pub fn notify(&self) {
        let listeners: Vec<ChangeListener> =
            self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().retain(|(i, _)| *i != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, ChangeListener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`ConfigTree::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    notifier: Weak<ChangeNotifier>,
}

impl Subscription {
    /// A subscription to a tree that never changes.
    pub fn detached() -> Self {
        Self {
            id: 0,
            notifier: Weak::new(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn keys_sort_numbers_first_then_text() {
        let mut keys = vec!["b", "10", "A", "2", "a:b", "Close", "colour"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, ["2", "10", "A", "a:b", "b", "Close", "colour"]);
    }

    #[test]
    fn section_paths() {
        let node = ConfigNode::section(
            "Close",
            [
                ConfigNode::leaf("pt-BR", "Fechar".to_string()),
                ConfigNode::section("nested", [ConfigNode::leaf("x", None::<String>)]),
            ],
        );
        assert_eq!(node.children()[0].path(), "Close:pt-BR");
        assert_eq!(node.children()[1].children()[0].path(), "Close:nested:x");
        assert_eq!(node.get("PT-br"), Some("Fechar"));
        assert_eq!(node.get("nested:x"), None);
    }

    #[test]
    fn notifier_fires_until_dropped() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = notifier.subscribe(Arc::new(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        }));

        notifier.notify();
        notifier.notify();
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 2);

        drop(sub);
        assert_eq!(notifier.listener_count(), 0);
        notifier.notify();
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 2);
    }
}
