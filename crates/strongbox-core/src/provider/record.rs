//! Item records and query evaluation shared by the bundled providers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{QueryResult, Status};
use crate::{
    accessibility::AccessibleTag,
    attributes::{Attribute, AttributeSet, AttributeValue, MatchLimit, Tag},
};

/// One stored generic-password item.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub service: String,
    pub account: String,
    pub accessible: AccessibleTag,
    pub synchronizable: bool,
    pub data: Vec<u8>,
}

impl fmt::Debug for ItemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRecord")
            .field("service", &self.service)
            .field("account", &self.account)
            .field("accessible", &self.accessible)
            .field("synchronizable", &self.synchronizable)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

impl ItemRecord {
    /// Build a record from the attributes of an add request.
    ///
    /// Class, service, account and value data are required. Accessibility
    /// defaults to when-unlocked; synchronizable defaults to false.
    pub fn from_attributes(attributes: &AttributeSet) -> Result<Self, Status> {
        if attributes.tag(Attribute::Class) != Some(Tag::GenericPassword) {
            return Err(Status::PARAM);
        }
        let service = attributes
            .string(Attribute::Service)
            .ok_or(Status::PARAM)?
            .to_string();
        let account = attributes
            .string(Attribute::Account)
            .ok_or(Status::PARAM)?
            .to_string();
        let data = attributes
            .bytes(Attribute::ValueData)
            .ok_or(Status::PARAM)?
            .to_vec();
        let accessible = match attributes.get(Attribute::Accessible) {
            None => AccessibleTag::WhenUnlocked,
            Some(value) => accessible_tag(value)?,
        };
        let synchronizable = match attributes.get(Attribute::Synchronizable) {
            None => false,
            Some(value) => value.as_bool().ok_or(Status::PARAM)?,
        };

        let record = Self {
            service,
            account,
            accessible,
            synchronizable,
            data,
        };
        record.validate()?;
        Ok(record)
    }

    /// Items are unique per service, account and synchronizable flag.
    pub fn same_identity(&self, other: &ItemRecord) -> bool {
        self.service == other.service
            && self.account == other.account
            && self.synchronizable == other.synchronizable
    }

    /// Whether this item satisfies every search attribute of `query`.
    ///
    /// A query without a synchronizable attribute only sees device-local
    /// items; use [`Tag::SynchronizableAny`] to see both.
    pub fn matches(&self, query: &AttributeSet) -> bool {
        if !query.contains(Attribute::Synchronizable) && self.synchronizable {
            return false;
        }
        query.iter().all(|(attribute, value)| match attribute {
            Attribute::Class => value.as_tag() == Some(Tag::GenericPassword),
            Attribute::Service => value.as_str() == Some(self.service.as_str()),
            Attribute::Account => value.as_str() == Some(self.account.as_str()),
            Attribute::Accessible => value.as_tag() == Some(Tag::Accessible(self.accessible)),
            Attribute::Synchronizable => match value {
                AttributeValue::Tag(Tag::SynchronizableAny) => true,
                AttributeValue::Bool(flag) => *flag == self.synchronizable,
                _ => false,
            },
            Attribute::ValueData
            | Attribute::ReturnData
            | Attribute::ReturnAttributes
            | Attribute::MatchLimit => true,
        })
    }

    /// Apply the attributes of an update request in place.
    pub fn apply(&mut self, changes: &AttributeSet) -> Result<(), Status> {
        for (attribute, value) in changes {
            match attribute {
                Attribute::Service => {
                    self.service = value.as_str().ok_or(Status::PARAM)?.to_string();
                }
                Attribute::Account => {
                    self.account = value.as_str().ok_or(Status::PARAM)?.to_string();
                }
                Attribute::Accessible => self.accessible = accessible_tag(value)?,
                Attribute::Synchronizable => {
                    self.synchronizable = value.as_bool().ok_or(Status::PARAM)?;
                }
                Attribute::ValueData => {
                    self.data = value.as_bytes().ok_or(Status::PARAM)?.to_vec();
                }
                Attribute::Class
                | Attribute::ReturnData
                | Attribute::ReturnAttributes
                | Attribute::MatchLimit => return Err(Status::PARAM),
            }
        }
        self.validate()
    }

    /// Attributes describing this item, optionally with its payload.
    pub fn attributes(&self, include_data: bool) -> AttributeSet {
        let mut attributes = AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, self.service.as_str())
            .with(Attribute::Account, self.account.as_str())
            .with(Attribute::Accessible, self.accessible)
            .with(Attribute::Synchronizable, self.synchronizable);
        if include_data {
            attributes.add(Attribute::ValueData, self.data.clone());
        }
        attributes
    }

    fn validate(&self) -> Result<(), Status> {
        if self.synchronizable && self.accessible.is_device_only() {
            return Err(Status::PARAM);
        }
        Ok(())
    }
}

fn accessible_tag(value: &AttributeValue) -> Result<AccessibleTag, Status> {
    match value.as_tag() {
        Some(Tag::Accessible(tag)) => Ok(tag),
        _ => Err(Status::PARAM),
    }
}

/// Fails with [`Status::DUPLICATE_ITEM`] if two records share an identity.
pub fn ensure_unique(records: &[ItemRecord]) -> Result<(), Status> {
    for (index, record) in records.iter().enumerate() {
        if records[index + 1..]
            .iter()
            .any(|other| other.same_identity(record))
        {
            return Err(Status::DUPLICATE_ITEM);
        }
    }
    Ok(())
}

/// Shape the answer to a `copy_matching` query from the matched items.
///
/// No matches yields [`Status::ITEM_NOT_FOUND`]. A query asking for neither
/// data nor attributes, or for the bare data of many items, is rejected with
/// [`Status::PARAM`].
pub fn resolve<'a, I>(matches: I, query: &AttributeSet) -> Result<QueryResult, Status>
where
    I: IntoIterator<Item = &'a ItemRecord>,
{
    let limit = match query.get(Attribute::MatchLimit) {
        None => MatchLimit::One,
        Some(value) => match value.as_tag() {
            Some(Tag::MatchLimit(limit)) => limit,
            _ => return Err(Status::PARAM),
        },
    };
    let return_data = query.bool(Attribute::ReturnData).unwrap_or(false);
    let return_attributes = query.bool(Attribute::ReturnAttributes).unwrap_or(false);
    if !return_data && !return_attributes {
        return Err(Status::PARAM);
    }
    if return_data && !return_attributes && limit == MatchLimit::All {
        return Err(Status::PARAM);
    }

    let mut matches = matches.into_iter().peekable();
    if matches.peek().is_none() {
        return Err(Status::ITEM_NOT_FOUND);
    }

    if !return_attributes {
        let first = matches.next().ok_or(Status::ITEM_NOT_FOUND)?;
        return Ok(QueryResult::Data(first.data.clone()));
    }

    let take = match limit {
        MatchLimit::One => 1,
        MatchLimit::All => usize::MAX,
    };
    Ok(QueryResult::Items(
        matches
            .take(take)
            .map(|record| record.attributes(return_data))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(account: &str, synchronizable: bool) -> ItemRecord {
        ItemRecord {
            service: "svc".into(),
            account: account.into(),
            accessible: AccessibleTag::WhenUnlocked,
            synchronizable,
            data: account.as_bytes().to_vec(),
        }
    }

    fn base_query() -> AttributeSet {
        AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, "svc")
    }

    #[test]
    fn add_requires_identity_and_payload() {
        let missing_account = base_query().with(Attribute::ValueData, b"v".as_slice());
        assert_eq!(
            ItemRecord::from_attributes(&missing_account),
            Err(Status::PARAM)
        );

        let complete = missing_account.with(Attribute::Account, "k");
        let record = ItemRecord::from_attributes(&complete).expect("valid add");
        assert_eq!(record.accessible, AccessibleTag::WhenUnlocked);
        assert!(!record.synchronizable);
    }

    #[test]
    fn device_only_items_cannot_synchronize() {
        let attributes = base_query()
            .with(Attribute::Account, "k")
            .with(Attribute::ValueData, b"v".as_slice())
            .with(Attribute::Accessible, AccessibleTag::WhenUnlockedThisDeviceOnly)
            .with(Attribute::Synchronizable, true);
        assert_eq!(ItemRecord::from_attributes(&attributes), Err(Status::PARAM));
    }

    #[test]
    fn queries_without_sync_attribute_skip_synchronizable_items() {
        let synced = record("k", true);
        assert!(!synced.matches(&base_query()));
        assert!(synced.matches(
            &base_query().with(Attribute::Synchronizable, Tag::SynchronizableAny)
        ));
        assert!(!synced.matches(&base_query().with(Attribute::Synchronizable, false)));
        assert!(record("k", false).matches(&base_query()));
    }

    #[test]
    fn other_service_does_not_match() {
        let query = AttributeSet::new().with(Attribute::Service, "other");
        assert!(!record("k", false).matches(&query));
    }

    #[test]
    fn resolve_shapes_results() {
        let items = [record("a", false), record("b", false)];

        let data_query = base_query().with(Attribute::ReturnData, true);
        assert_eq!(
            resolve(items.iter(), &data_query),
            Ok(QueryResult::Data(b"a".to_vec()))
        );

        let all_query = base_query()
            .with(Attribute::ReturnAttributes, true)
            .with(Attribute::MatchLimit, MatchLimit::All);
        match resolve(items.iter(), &all_query) {
            Ok(QueryResult::Items(found)) => {
                assert_eq!(found.len(), 2);
                assert!(found.iter().all(|a| !a.contains(Attribute::ValueData)));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(
            resolve(std::iter::empty::<&ItemRecord>(), &data_query),
            Err(Status::ITEM_NOT_FOUND)
        );
        assert_eq!(resolve(items.iter(), &base_query()), Err(Status::PARAM));
    }

    #[test]
    fn apply_rejects_query_only_attributes() {
        let mut item = record("k", false);
        let changes = AttributeSet::new().with(Attribute::ReturnData, true);
        assert_eq!(item.apply(&changes), Err(Status::PARAM));

        let changes = AttributeSet::new()
            .with(Attribute::ValueData, b"new".as_slice())
            .with(Attribute::Synchronizable, true);
        item.apply(&changes).expect("valid update");
        assert_eq!(item.data, b"new");
        assert!(item.synchronizable);
    }
}
