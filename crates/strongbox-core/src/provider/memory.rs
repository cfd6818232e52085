use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::{
    record::{self, ItemRecord},
    QueryResult, SecureStoreProvider, Status,
};
use crate::attributes::AttributeSet;

/// Process-local provider for tests and ephemeral sessions.
///
/// Implements the same query semantics as the platform stores but keeps
/// everything in memory; nothing survives the process. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    items: Arc<Mutex<Vec<ItemRecord>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<MutexGuard<'_, Vec<ItemRecord>>, Status> {
        self.items.lock().map_err(|err| {
            warn!("memory provider lock poisoned: {err}");
            Status::INTERNAL_COMPONENT
        })
    }
}

impl SecureStoreProvider for MemoryProvider {
    fn add(&self, attributes: &AttributeSet) -> Result<(), Status> {
        let record = ItemRecord::from_attributes(attributes)?;
        let mut items = self.items()?;
        if items.iter().any(|existing| existing.same_identity(&record)) {
            return Err(Status::DUPLICATE_ITEM);
        }
        items.push(record);
        Ok(())
    }

    fn update(&self, query: &AttributeSet, changes: &AttributeSet) -> Result<(), Status> {
        let mut items = self.items()?;
        let mut updated = items.clone();
        let mut touched = false;
        for item in updated.iter_mut().filter(|item| item.matches(query)) {
            item.apply(changes)?;
            touched = true;
        }
        if !touched {
            return Err(Status::ITEM_NOT_FOUND);
        }
        record::ensure_unique(&updated)?;

        *items = updated;
        Ok(())
    }

    fn delete(&self, query: &AttributeSet) -> Result<(), Status> {
        let mut items = self.items()?;
        let before = items.len();
        items.retain(|item| !item.matches(query));
        if items.len() == before {
            return Err(Status::ITEM_NOT_FOUND);
        }
        Ok(())
    }

    fn copy_matching(&self, query: &AttributeSet) -> Result<QueryResult, Status> {
        let items = self.items()?;
        record::resolve(items.iter().filter(|item| item.matches(query)), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessibility::AccessibleTag,
        attributes::{Attribute, MatchLimit, Tag},
    };

    fn item(account: &str, value: &[u8]) -> AttributeSet {
        AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, "svc")
            .with(Attribute::Account, account)
            .with(Attribute::ValueData, value)
    }

    fn query(account: &str) -> AttributeSet {
        AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, "svc")
            .with(Attribute::Account, account)
            .with(Attribute::Synchronizable, Tag::SynchronizableAny)
    }

    #[test]
    fn add_rejects_duplicates() {
        let provider = MemoryProvider::new();
        provider.add(&item("k", b"v1")).expect("first add");
        assert_eq!(provider.add(&item("k", b"v2")), Err(Status::DUPLICATE_ITEM));

        // A synchronizable twin is a distinct item.
        let twin = item("k", b"v3").with(Attribute::Synchronizable, true);
        provider.add(&twin).expect("synchronizable twin");
    }

    #[test]
    fn copy_matching_returns_payload() {
        let provider = MemoryProvider::new();
        provider.add(&item("k", b"secret")).expect("add");

        let found = provider
            .copy_matching(&query("k").with(Attribute::ReturnData, true))
            .expect("lookup");
        assert_eq!(found, QueryResult::Data(b"secret".to_vec()));

        assert_eq!(
            provider.copy_matching(&query("missing").with(Attribute::ReturnData, true)),
            Err(Status::ITEM_NOT_FOUND)
        );
    }

    #[test]
    fn update_changes_matched_items_only() {
        let provider = MemoryProvider::new();
        provider.add(&item("a", b"1")).expect("add a");
        provider.add(&item("b", b"2")).expect("add b");

        let changes = AttributeSet::new()
            .with(Attribute::ValueData, b"updated".as_slice())
            .with(Attribute::Accessible, AccessibleTag::AfterFirstUnlock);
        provider.update(&query("a"), &changes).expect("update");

        let all = provider
            .copy_matching(
                &AttributeSet::new()
                    .with(Attribute::Service, "svc")
                    .with(Attribute::ReturnAttributes, true)
                    .with(Attribute::ReturnData, true)
                    .with(Attribute::MatchLimit, MatchLimit::All),
            )
            .expect("scan");
        let QueryResult::Items(items) = all else {
            panic!("expected attribute list");
        };
        for attributes in items {
            match attributes.string(Attribute::Account) {
                Some("a") => {
                    assert_eq!(attributes.bytes(Attribute::ValueData), Some(b"updated".as_slice()));
                    assert_eq!(
                        attributes.tag(Attribute::Accessible),
                        Some(Tag::Accessible(AccessibleTag::AfterFirstUnlock))
                    );
                }
                Some("b") => {
                    assert_eq!(attributes.bytes(Attribute::ValueData), Some(b"2".as_slice()))
                }
                other => panic!("unexpected account {other:?}"),
            }
        }

        assert_eq!(
            provider.update(&query("missing"), &changes),
            Err(Status::ITEM_NOT_FOUND)
        );
    }

    #[test]
    fn update_rejects_identity_collisions() {
        let provider = MemoryProvider::new();
        provider.add(&item("a", b"1")).expect("add a");
        provider.add(&item("b", b"2")).expect("add b");

        let rename = AttributeSet::new().with(Attribute::Account, "b");
        assert_eq!(
            provider.update(&query("a"), &rename),
            Err(Status::DUPLICATE_ITEM)
        );
    }

    #[test]
    fn delete_reports_not_found_when_nothing_matched() {
        let provider = MemoryProvider::new();
        provider.add(&item("k", b"v")).expect("add");
        provider.delete(&query("k")).expect("delete");
        assert_eq!(provider.delete(&query("k")), Err(Status::ITEM_NOT_FOUND));
    }

    #[test]
    fn clones_share_items() {
        let provider = MemoryProvider::new();
        let clone = provider.clone();
        provider.add(&item("k", b"v")).expect("add");
        assert!(clone
            .copy_matching(&query("k").with(Attribute::ReturnData, true))
            .is_ok());
    }
}
