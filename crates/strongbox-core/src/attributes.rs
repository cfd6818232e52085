use std::{
    collections::{hash_map, HashMap},
    fmt,
};

use crate::accessibility::AccessibleTag;

/// Attribute names understood by a secure store provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Item class. Strongbox only stores generic passwords.
    Class,
    /// Service scope the item belongs to.
    Service,
    /// Logical key identity within the service.
    Account,
    /// Accessibility tag.
    Accessible,
    /// Synchronizable flag, or "any" inside queries.
    Synchronizable,
    /// Raw secret payload.
    ValueData,
    /// Ask the provider to return the payload.
    ReturnData,
    /// Ask the provider to return item attributes.
    ReturnAttributes,
    /// How many matches the provider should return.
    MatchLimit,
}

/// Number of items a query may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchLimit {
    One,
    All,
}

/// Enumerated attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    GenericPassword,
    Accessible(AccessibleTag),
    /// Matches synchronizable and device-local items alike. Query-only.
    SynchronizableAny,
    MatchLimit(MatchLimit),
}

/// Closed set of value shapes an attribute may carry.
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Tag(Tag),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<Tag> {
        match self {
            AttributeValue::Tag(value) => Some(*value),
            _ => None,
        }
    }
}

// Payloads are secrets; never print them.
impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(value) => f.debug_tuple("String").field(value).finish(),
            AttributeValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            AttributeValue::Bytes(value) => write!(f, "Bytes(<{} bytes>)", value.len()),
            AttributeValue::Tag(value) => f.debug_tuple("Tag").field(value).finish(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        AttributeValue::Bytes(value.to_vec())
    }
}

impl From<Tag> for AttributeValue {
    fn from(value: Tag) -> Self {
        AttributeValue::Tag(value)
    }
}

impl From<AccessibleTag> for AttributeValue {
    fn from(value: AccessibleTag) -> Self {
        AttributeValue::Tag(Tag::Accessible(value))
    }
}

impl From<MatchLimit> for AttributeValue {
    fn from(value: MatchLimit) -> Self {
        AttributeValue::Tag(Tag::MatchLimit(value))
    }
}

/// Composable query/update descriptor handed to a provider.
///
/// Each attribute appears at most once. Merging is right-biased: values from
/// the merged-in set replace existing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: HashMap<Attribute, AttributeValue>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`AttributeSet::add`].
    pub fn with(mut self, attribute: Attribute, value: impl Into<AttributeValue>) -> Self {
        self.add(attribute, value);
        self
    }

    /// Insert or replace a single attribute.
    pub fn add(&mut self, attribute: Attribute, value: impl Into<AttributeValue>) -> &mut Self {
        self.entries.insert(attribute, value.into());
        self
    }

    /// Right-biased union, in place.
    pub fn merge(&mut self, other: AttributeSet) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    /// Builder form of [`AttributeSet::merge`].
    pub fn merged(mut self, other: AttributeSet) -> Self {
        self.merge(other);
        self
    }

    pub fn get(&self, attribute: Attribute) -> Option<&AttributeValue> {
        self.entries.get(&attribute)
    }

    pub fn string(&self, attribute: Attribute) -> Option<&str> {
        self.get(attribute).and_then(AttributeValue::as_str)
    }

    pub fn bool(&self, attribute: Attribute) -> Option<bool> {
        self.get(attribute).and_then(AttributeValue::as_bool)
    }

    pub fn bytes(&self, attribute: Attribute) -> Option<&[u8]> {
        self.get(attribute).and_then(AttributeValue::as_bytes)
    }

    pub fn tag(&self, attribute: Attribute) -> Option<Tag> {
        self.get(attribute).and_then(AttributeValue::as_tag)
    }

    pub fn remove(&mut self, attribute: Attribute) -> Option<AttributeValue> {
        self.entries.remove(&attribute)
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.entries.contains_key(&attribute)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Attribute, AttributeValue> {
        self.entries.iter()
    }
}

impl FromIterator<(Attribute, AttributeValue)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (Attribute, AttributeValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(Attribute, AttributeValue)> for AttributeSet {
    fn extend<I: IntoIterator<Item = (Attribute, AttributeValue)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for AttributeSet {
    type Item = (Attribute, AttributeValue);
    type IntoIter = hash_map::IntoIter<Attribute, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = (&'a Attribute, &'a AttributeValue);
    type IntoIter = hash_map::Iter<'a, Attribute, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
