//! Attribute values extracted from cached values.

use std::fmt;

/// A value an index groups keys by.
///
/// Attribute functions return one of these for every indexed value. Variants
/// compare by kind first, then by content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AttrValue {
    /// No attribute.
    #[default]
    Null,
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Int(i64),
    /// String attribute.
    Text(String),
    /// Raw bytes attribute.
    Bytes(Vec<u8>),
}

impl AttrValue {
    /// Returns true for [`AttrValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer, if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(AttrValue::from(true), AttrValue::Bool(true));
        assert_eq!(AttrValue::from(7_i32), AttrValue::Int(7));
        assert_eq!(AttrValue::from(7_u32), AttrValue::Int(7));
        assert_eq!(AttrValue::from("x"), AttrValue::Text("x".into()));
        assert_eq!(AttrValue::from(None::<i64>), AttrValue::Null);
        assert_eq!(AttrValue::from(Some("y")), AttrValue::Text("y".into()));
    }

    #[test]
    fn accessors() {
        assert_eq!(AttrValue::Int(3).as_int(), Some(3));
        assert_eq!(AttrValue::Text("a".into()).as_text(), Some("a"));
        assert!(AttrValue::default().is_null());
        assert!(AttrValue::Bool(false).as_int().is_none());
    }

    #[test]
    fn ordering_groups_by_kind() {
        let mut values = vec![
            AttrValue::Text("b".into()),
            AttrValue::Int(2),
            AttrValue::Null,
            AttrValue::Int(-1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                AttrValue::Null,
                AttrValue::Int(-1),
                AttrValue::Int(2),
                AttrValue::Text("b".into()),
            ]
        );
    }

    #[test]
    fn display() {
        assert_eq!(AttrValue::Text("eu".into()).to_string(), "\"eu\"");
        assert_eq!(AttrValue::Bytes(vec![1, 2]).to_string(), "<2 bytes>");
    }
}
