//! A cheap-to-clone, immutable string type used for [`Value::String`](crate::value::Value::String).
//!
//! Tree-walking evaluation copies `Value`s constantly (into call arguments,
//! struct fields, loop bindings); a plain `String` would force a heap
//! allocation on every one of those copies. `ImmutableString` wraps a
//! `Rc<str>` so cloning is a refcount bump, matching the role the teacher's
//! own `ImmutableString` (backed by a shared `SmartString`) plays for Rhai.

use smartstring::alias::String as SmartString;
use std::{borrow::Borrow, fmt, ops::Deref, rc::Rc};

#[derive(Clone, Eq, Hash, Default)]
pub struct ImmutableString(Rc<SmartString>);

impl ImmutableString {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Number of reference-counted owners of this string's backing storage.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Extract the owned `String`, cloning the backing storage only if it is
    /// still shared.
    #[must_use]
    pub fn into_owned(self) -> String {
        match Rc::try_unwrap(self.0) {
            Ok(s) => s.into(),
            Err(rc) => rc.as_str().to_string(),
        }
    }
}

impl Deref for ImmutableString {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for ImmutableString {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ImmutableString {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for ImmutableString {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0.as_str() == other.0.as_str()
    }
}

impl PartialEq<str> for ImmutableString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl PartialOrd for ImmutableString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImmutableString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

impl fmt::Debug for ImmutableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_str(), f)
    }
}

impl fmt::Display for ImmutableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.0.as_str(), f)
    }
}

impl From<&str> for ImmutableString {
    fn from(s: &str) -> Self {
        Self(Rc::new(SmartString::from(s)))
    }
}

impl From<String> for ImmutableString {
    fn from(s: String) -> Self {
        Self(Rc::new(SmartString::from(s)))
    }
}

impl From<ImmutableString> for String {
    fn from(s: ImmutableString) -> Self {
        s.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_storage() {
        let a: ImmutableString = "hello".into();
        let b = a.clone();
        assert_eq!(a.strong_count(), 2);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hello");
    }

    #[test]
    fn into_owned_does_not_mutate_siblings() {
        let a: ImmutableString = "hello".into();
        let b = a.clone();
        let mut s = a.into_owned();
        s.push_str(", world!");
        assert_eq!(b.as_str(), "hello");
        assert_eq!(s, "hello, world!");
    }
}
