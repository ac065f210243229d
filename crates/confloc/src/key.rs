//! Resource key escaping.
//!
//! Configuration paths use `:` as the segment delimiter, so a resource key such
//! as `"Branch to: {name}"` cannot be stored as-is: the provider would split it
//! into two levels. Keys are stored with every delimiter replaced by
//! [`ESCAPED_DELIMITER`] and decoded again when they are handed back to callers.
//!
//! Known limitation: a key that already contains `&colon;` verbatim decodes to a
//! different key than the one that was stored.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Path delimiter of the configuration tree.
pub const KEY_DELIMITER: &str = ":";

/// Replacement stored in place of [`KEY_DELIMITER`].
pub const ESCAPED_DELIMITER: &str = "&colon;";

/// Maps logical resource keys to the segment names stored in the tree.
pub trait KeyCodec: Send + Sync {
    fn encode<'a>(&self, key: &'a str) -> Cow<'a, str>;
    fn decode<'a>(&self, stored: &'a str) -> Cow<'a, str>;
}

/// Escape every path delimiter in `key`.
pub fn escape_key(key: &str) -> Cow<'_, str> {
    if key.contains(KEY_DELIMITER) {
        Cow::Owned(key.replace(KEY_DELIMITER, ESCAPED_DELIMITER))
    } else {
        Cow::Borrowed(key)
    }
}

/// Reverse [`escape_key`].
pub fn unescape_key(stored: &str) -> Cow<'_, str> {
    if stored.contains(ESCAPED_DELIMITER) {
        Cow::Owned(stored.replace(ESCAPED_DELIMITER, KEY_DELIMITER))
    } else {
        Cow::Borrowed(stored)
    }
}

/// The default codec: `:` <-> `&colon;`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DelimiterEscape;

impl KeyCodec for DelimiterEscape {
    fn encode<'a>(&self, key: &'a str) -> Cow<'a, str> {
        escape_key(key)
    }

    fn decode<'a>(&self, stored: &'a str) -> Cow<'a, str> {
        unescape_key(stored)
    }
}

type KeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A codec built from a pair of closures.
#[derive(Clone)]
pub struct FnKeyCodec {
    encode: KeyFn,
    decode: KeyFn,
}

impl FnKeyCodec {
    pub fn new(
        encode: impl Fn(&str) -> String + Send + Sync + 'static,
        decode: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl fmt::Debug for FnKeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKeyCodec").finish_non_exhaustive()
    }
}

impl KeyCodec for FnKeyCodec {
    fn encode<'a>(&self, key: &'a str) -> Cow<'a, str> {
        Cow::Owned((self.encode)(key))
    }

    fn decode<'a>(&self, stored: &'a str) -> Cow<'a, str> {
        Cow::Owned((self.decode)(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_every_delimiter() {
        assert_eq!(escape_key("a:b:c"), "a&colon;b&colon;c");
        assert_eq!(
            escape_key("Branch to: {{name}}"),
            "Branch to&colon; {{name}}"
        );
    }

    #[test]
    fn plain_keys_are_borrowed() {
        assert!(matches!(escape_key("Close"), Cow::Borrowed("Close")));
        assert!(matches!(unescape_key("Close"), Cow::Borrowed("Close")));
    }

    #[test]
    fn decode_reverses_encode() {
        let codec = DelimiterEscape;
        for key in ["", ":", "::", "a:b", "Close", "x: y :z", "颜色:色"] {
            assert_eq!(codec.decode(&codec.encode(key)), key);
        }
    }

    #[test]
    fn closure_codec() {
        let codec = FnKeyCodec::new(|k| k.replace('.', "__"), |k| k.replace("__", "."));
        assert_eq!(codec.encode("menu.file"), "menu__file");
        assert_eq!(codec.decode("menu__file"), "menu.file");
    }
}
