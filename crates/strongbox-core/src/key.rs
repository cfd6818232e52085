use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    attributes::{Attribute, AttributeSet},
    error::InvalidKeyError,
};

/// Logical name of one secret within a service scope.
///
/// Equality and hashing follow the raw value. Empty names are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidKeyError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidKeyError::Empty);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity attribute for queries and new items.
    pub fn attribute_fragment(&self) -> AttributeSet {
        AttributeSet::new().with(Attribute::Account, self.0.as_str())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Key {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::new(s)
    }
}

impl TryFrom<&str> for Key {
    type Error = InvalidKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Key::new(value)
    }
}

impl TryFrom<String> for Key {
    type Error = InvalidKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Key::new(value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn rejects_empty_raw_value() {
        assert_eq!(Key::new(""), Err(InvalidKeyError::Empty));
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn equal_raw_values_are_interchangeable() {
        let a = Key::new("session").unwrap();
        let b: Key = "session".parse().unwrap();
        let set: HashSet<Key> = [a.clone(), b.clone()].into_iter().collect();

        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn fragment_holds_single_identity_pair() {
        let fragment = Key::new("token").unwrap().attribute_fragment();
        assert_eq!(fragment.len(), 1);
        assert_eq!(fragment.string(Attribute::Account), Some("token"));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let key: Key = serde_json::from_str("\"k1\"").expect("valid key");
        assert_eq!(key.as_str(), "k1");
        assert!(serde_json::from_str::<Key>("\"\"").is_err());
    }
}
