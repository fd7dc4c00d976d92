use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for element IDs (nodes, ports, edges).
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Interned identifier shared by every element of a diagram.
/// Internally a 4-byte `Spur` index, so copies and hashing are O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(Spur);

impl ElementId {
    /// Intern a string as an ElementId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        ElementId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Build a child id by joining `self` and `suffix` with `-`.
    pub fn child(&self, suffix: &str) -> Self {
        Self::intern(&format!("{}-{suffix}", self.as_str()))
    }

    /// The numeric tail of an `edge-<n>` style id, if any.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let s = self.as_str();
        let digits = s.rsplit('-').next()?;
        if digits.is_empty() || digits.len() == s.len() {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ElementId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ElementId::intern("filter-1");
        let b = ElementId::intern("filter-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "filter-1");
    }

    #[test]
    fn child_ids_join_with_dash() {
        let node = ElementId::intern("mixer");
        assert_eq!(node.child("in").as_str(), "mixer-in");
    }

    #[test]
    fn numeric_suffix_of_edge_ids() {
        assert_eq!(ElementId::intern("edge-7").numeric_suffix(), Some(7));
        assert_eq!(ElementId::intern("edge-x").numeric_suffix(), None);
        assert_eq!(ElementId::intern("42").numeric_suffix(), None);
        assert_eq!(ElementId::intern("edge-").numeric_suffix(), None);
    }
}
