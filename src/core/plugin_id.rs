//! Interned plugin identifiers.
//!
//! Plugin ids are compared on every filter decision, so they are interned:
//! every `PluginId` with the same text points at the same leaked string and
//! equality is a pointer comparison.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

static INTERNER: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// Globally unique, user-facing identifier of a plugin (e.g. `"rename"`).
#[derive(Clone, Copy)]
pub struct PluginId {
    inner: &'static str,
}

impl PluginId {
    /// Intern an id.
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref();

        {
            let interner = INTERNER.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&interned) = interner.get(id) {
                return PluginId { inner: interned };
            }
        }

        let mut interner = INTERNER.write().unwrap_or_else(|e| e.into_inner());

        // Another thread may have interned it between the two locks.
        if let Some(&interned) = interner.get(id) {
            return PluginId { inner: interned };
        }

        let leaked: &'static str = Box::leak(id.to_string().into_boxed_str());
        interner.insert(leaked);

        PluginId { inner: leaked }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }
}

impl Deref for PluginId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for PluginId {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl Borrow<str> for PluginId {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl PartialEq for PluginId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for PluginId {}

impl PartialOrd for PluginId {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginId {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

impl Hash for PluginId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with `Borrow<str>` so `HashMap<PluginId, _>` can be
        // queried with a `&str`.
        self.inner.hash(state)
    }
}

impl fmt::Debug for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner, f)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        PluginId::new(s)
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        PluginId::new(s)
    }
}

impl Serialize for PluginId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PluginId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PluginId::new(s))
    }
}
