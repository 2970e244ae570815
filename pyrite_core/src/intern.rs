//! Identifier interning.
//!
//! The lowering pass compares identifiers constantly (every generated
//! temporary, every name reference), so identifiers are interned once and
//! compared by pointer afterwards. The interner is thread-safe; it is the
//! only state that may be shared between builder instances.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A handle to an interned identifier.
///
/// Two handles from the same interner are equal iff they refer to the
/// same string; equality and hashing go through the pointer, not the
/// bytes.
#[derive(Clone)]
pub struct InternedString {
    inner: Arc<str>,
}

impl InternedString {
    #[inline]
    fn new(s: Arc<str>) -> Self {
        Self { inner: s }
    }

    /// Get the string content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// True for generated temporaries (and the reserved `#rtnval` slot):
    /// every identifier the lowering pass invents starts with `#`, which
    /// the parser rejects in user code.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.inner.starts_with('#')
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.as_ptr().hash(state);
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternedString({:?})", self.as_str())
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl PartialEq<str> for InternedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Thread-safe identifier interner.
///
/// Callers that lower several compilation units concurrently can share one
/// interner; a read lock covers the hot already-interned path.
pub struct StringInterner {
    strings: RwLock<FxHashMap<Arc<str>, InternedString>>,
}

impl StringInterner {
    /// Create a new, empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strings: RwLock::new(FxHashMap::default()),
        }
    }

    /// Intern a string, returning a handle.
    ///
    /// Interning the same content twice returns the same handle.
    pub fn intern(&self, s: &str) -> InternedString {
        {
            let strings = self.strings.read();
            if let Some(interned) = strings.get(s) {
                return interned.clone();
            }
        }

        let mut strings = self.strings.write();

        // Re-check: another thread may have inserted between the locks.
        if let Some(interned) = strings.get(s) {
            return interned.clone();
        }

        let arc: Arc<str> = s.into();
        let interned = InternedString::new(arc.clone());
        strings.insert(arc, interned.clone());
        interned
    }

    /// Intern an owned string without re-allocating on the miss path.
    pub fn intern_owned(&self, s: String) -> InternedString {
        {
            let strings = self.strings.read();
            if let Some(interned) = strings.get(s.as_str()) {
                return interned.clone();
            }
        }

        let mut strings = self.strings.write();

        if let Some(interned) = strings.get(s.as_str()) {
            return interned.clone();
        }

        let arc: Arc<str> = s.into();
        let interned = InternedString::new(arc.clone());
        strings.insert(arc, interned.clone());
        interned
    }

    /// Get an already-interned string without inserting.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<InternedString> {
        self.strings.read().get(s).cloned()
    }

    /// Number of distinct interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    /// Check if the interner is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.read().is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("count", &self.strings.read().len())
            .finish()
    }
}
