//! Key/value facades over a [`Gateway`].
//!
//! [`Store`] blocks the caller, [`AsyncStore`] awaits. Both submit each
//! operation to the gateway's worker as one job built from the same
//! [`Scope`] logic, so they behave identically.

mod asynchronous;
mod scope;

use std::{collections::HashSet, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;

pub use asynchronous::AsyncStore;
pub(crate) use scope::Scope;

use crate::{
    accessibility::Accessibility,
    codec::{self, JsonCodec, ValueCodec},
    error::StoreError,
    gateway::Gateway,
    key::Key,
    provider::SecureStoreProvider,
};

/// How `set` replaces an existing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertStrategy {
    /// Delete whatever is stored under the key, then add the new item.
    ///
    /// Both steps run inside one worker job, so no other store operation
    /// can observe the gap. A crash between them leaves the key absent and
    /// the caller has to `set` again.
    #[default]
    DeleteThenAdd,
    /// Probe for the item; update the changed fields if present, add
    /// otherwise. Some platform stores reject updates that change
    /// synchronizability, so this is opt-in.
    ProbeThenUpdate,
}

/// Blocking key/value store scoped to one service.
pub struct Store<P, C = JsonCodec> {
    gateway: Gateway<P>,
    scope: Arc<Scope>,
    codec: Arc<C>,
}

impl<P, C> Clone for Store<P, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            scope: Arc::clone(&self.scope),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<P: SecureStoreProvider> Store<P> {
    /// Store for `service` on the process-wide worker.
    pub fn new(service: impl Into<String>, provider: P) -> Result<Self, StoreError> {
        Ok(Self::with_gateway(service, Gateway::new(provider)?))
    }

    pub fn with_gateway(service: impl Into<String>, gateway: Gateway<P>) -> Self {
        Self {
            gateway,
            scope: Arc::new(Scope::new(service.into(), UpsertStrategy::default())),
            codec: Arc::new(JsonCodec),
        }
    }
}

impl<P: SecureStoreProvider, C: ValueCodec> Store<P, C> {
    pub fn with_codec<D: ValueCodec>(self, codec: D) -> Store<P, D> {
        Store {
            gateway: self.gateway,
            scope: self.scope,
            codec: Arc::new(codec),
        }
    }

    pub fn with_strategy(mut self, strategy: UpsertStrategy) -> Self {
        self.scope = Arc::new(Scope::new(self.scope.service().to_string(), strategy));
        self
    }

    pub fn service(&self) -> &str {
        self.scope.service()
    }

    pub fn strategy(&self) -> UpsertStrategy {
        self.scope.strategy()
    }

    /// Async facade sharing this store's scope, codec and gateway.
    pub fn to_async(&self) -> AsyncStore<P, C> {
        AsyncStore::from_parts(
            self.gateway.clone(),
            Arc::clone(&self.scope),
            Arc::clone(&self.codec),
        )
    }

    pub fn contains_item(&self, key: &Key) -> Result<bool, StoreError> {
        Ok(self.data(key)?.is_some())
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub fn set_data(
        &self,
        key: &Key,
        data: &[u8],
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        let data = data.to_vec();
        self.gateway
            .execute(move |session| scope.set(session, &key, data, accessibility))
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub fn data(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute(move |session| scope.data(session, &key))
    }

    pub fn set_string(
        &self,
        key: &Key,
        value: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        self.set_data(key, value.as_bytes(), accessibility)
    }

    /// Stored bytes as UTF-8. Invalid UTF-8 is a [`CodecError`](crate::CodecError).
    pub fn string(&self, key: &Key) -> Result<Option<String>, StoreError> {
        match self.data(key)? {
            Some(bytes) => Ok(Some(codec::decode_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_value<T: Serialize>(
        &self,
        key: &Key,
        value: &T,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let bytes = self.codec.encode(value)?;
        self.set_data(key, &bytes, accessibility)
    }

    pub fn value<T: DeserializeOwned>(&self, key: &Key) -> Result<Option<T>, StoreError> {
        match self.data(key)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Accessibility policy recorded for the item, if it exists.
    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub fn accessibility(&self, key: &Key) -> Result<Option<Accessibility>, StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute(move |session| scope.accessibility(session, &key))
    }

    #[instrument(skip_all, fields(service = %self.scope.service()))]
    pub fn all_keys(&self) -> Result<HashSet<Key>, StoreError> {
        let scope = Arc::clone(&self.scope);
        self.gateway.execute(move |session| scope.all_keys(session))
    }

    /// Removing a missing key succeeds.
    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub fn remove_item(&self, key: &Key) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute(move |session| scope.remove_item(session, &key))
    }

    #[instrument(skip_all, fields(service = %self.scope.service()))]
    pub fn remove_all_items(&self) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        self.gateway
            .execute(move |session| scope.remove_all_items(session))
    }
}
