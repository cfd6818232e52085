use std::collections::HashSet;

use tracing::debug;

use super::UpsertStrategy;
use crate::{
    accessibility::Accessibility,
    attributes::{Attribute, AttributeSet, MatchLimit, Tag},
    error::StoreError,
    gateway::Session,
    key::Key,
    provider::SecureStoreProvider,
};

/// Query composition and the upsert state machine for one service.
///
/// Everything here runs inside a gateway job, on the worker thread.
#[derive(Debug)]
pub(crate) struct Scope {
    service: String,
    strategy: UpsertStrategy,
}

impl Scope {
    pub(crate) fn new(service: String, strategy: UpsertStrategy) -> Self {
        Self { service, strategy }
    }

    pub(crate) fn service(&self) -> &str {
        &self.service
    }

    pub(crate) fn strategy(&self) -> UpsertStrategy {
        self.strategy
    }

    /// Every generic-password item of this service, synchronizable or not.
    fn scope_query(&self) -> AttributeSet {
        AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, self.service.as_str())
            .with(Attribute::Synchronizable, Tag::SynchronizableAny)
    }

    fn key_query(&self, key: &Key) -> AttributeSet {
        self.scope_query().merged(key.attribute_fragment())
    }

    fn new_item(&self, key: &Key, data: Vec<u8>, accessibility: Accessibility) -> AttributeSet {
        AttributeSet::new()
            .with(Attribute::Class, Tag::GenericPassword)
            .with(Attribute::Service, self.service.as_str())
            .merged(key.attribute_fragment())
            .merged(accessibility.attribute_fragment())
            .with(Attribute::ValueData, data)
    }

    pub(crate) fn set<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
        key: &Key,
        data: Vec<u8>,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let query = self.key_query(key);
        match self.strategy {
            UpsertStrategy::DeleteThenAdd => {
                session.delete(&query)?;
                session.add(&self.new_item(key, data, accessibility))
            }
            UpsertStrategy::ProbeThenUpdate => {
                let probe = query.clone().with(Attribute::ReturnAttributes, true);
                if session.copy_matching::<AttributeSet>(&probe)?.is_some() {
                    debug!("updating existing item");
                    let changes = accessibility
                        .attribute_fragment()
                        .with(
                            Attribute::Synchronizable,
                            accessibility.synchronizable().unwrap_or(false),
                        )
                        .with(Attribute::ValueData, data);
                    session.update(&query, &changes)
                } else {
                    session.add(&self.new_item(key, data, accessibility))
                }
            }
        }
    }

    pub(crate) fn data<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
        key: &Key,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let query = self
            .key_query(key)
            .with(Attribute::ReturnData, true)
            .with(Attribute::MatchLimit, MatchLimit::One);
        session.copy_matching(&query)
    }

    pub(crate) fn accessibility<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
        key: &Key,
    ) -> Result<Option<Accessibility>, StoreError> {
        let query = self
            .key_query(key)
            .with(Attribute::ReturnAttributes, true)
            .with(Attribute::MatchLimit, MatchLimit::One);
        let attributes: Option<AttributeSet> = session.copy_matching(&query)?;
        Ok(attributes.as_ref().and_then(Accessibility::from_attributes))
    }

    /// Identities of every item in scope. Items without a usable identity
    /// attribute are skipped.
    pub(crate) fn all_keys<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
    ) -> Result<HashSet<Key>, StoreError> {
        let query = self
            .scope_query()
            .with(Attribute::ReturnAttributes, true)
            .with(Attribute::MatchLimit, MatchLimit::All);
        let items: Vec<AttributeSet> = session.copy_matching(&query)?.unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| item.string(Attribute::Account))
            .filter_map(|account| Key::new(account).ok())
            .collect())
    }

    pub(crate) fn remove_item<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
        key: &Key,
    ) -> Result<(), StoreError> {
        session.delete(&self.key_query(key))
    }

    pub(crate) fn remove_all_items<P: SecureStoreProvider>(
        &self,
        session: &Session<'_, P>,
    ) -> Result<(), StoreError> {
        session.delete(&self.scope_query())
    }
}
