//! Ordered namespace collections.
//!
//! Namespaces select and order settings variants (deployment environment,
//! hostname, and so on). Insertion order is significant: it drives both file
//! discovery order and merge precedence, with later namespaces overriding
//! earlier ones.

/// An ordered, deduplicated set of namespace names.
///
/// Values supplied as closures are evaluated exactly once, at insertion.
/// Empty strings are discarded. Equality is order-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSet {
    names: Vec<String>,
}

impl NamespaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from resolved values, preserving first-occurrence order.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for value in values {
            set.push(value);
        }
        set
    }

    /// Append a resolved value; duplicates and empty strings are dropped.
    pub fn push<S: Into<String>>(&mut self, value: S) {
        let name = value.into();
        if !name.is_empty() && !self.names.iter().any(|n| n == &name) {
            self.names.push(name);
        }
    }

    /// Append a deferred value, evaluating it immediately.
    pub fn push_deferred<F, S>(&mut self, value: F)
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.push(value());
    }

    /// New set with `self`'s names followed by `other`'s, deduplicated.
    /// Neither input is modified.
    pub fn concat(&self, other: &NamespaceSet) -> NamespaceSet {
        let mut merged = self.clone();
        for name in &other.names {
            merged.push(name.clone());
        }
        merged
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NamespaceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<'a> IntoIterator for &'a NamespaceSet {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let set = NamespaceSet::from_values(["production", "host-7", "east"]);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec!["production", "host-7", "east"]
        );
    }

    #[test]
    fn drops_duplicates_keeping_first_occurrence() {
        let set = NamespaceSet::from_values(["a", "b", "a", "c", "b"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn drops_empty_values() {
        let set = NamespaceSet::from_values(["", "a", ""]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn deferred_values_resolve_at_insertion() {
        let mut set = NamespaceSet::new();
        set.push_deferred(|| format!("host-{}", 42));
        assert!(set.contains("host-42"));
    }

    #[test]
    fn concat_is_non_mutating_and_dedups() {
        let left = NamespaceSet::from_values(["a", "b"]);
        let right = NamespaceSet::from_values(["b", "c"]);
        let joined = left.concat(&right);
        assert_eq!(joined.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 2);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let ab = NamespaceSet::from_values(["a", "b"]);
        let ba = NamespaceSet::from_values(["b", "a"]);
        assert_ne!(ab, ba);
        assert_eq!(ab, NamespaceSet::from_values(["a", "b"]));
    }
}
