use std::{collections::HashSet, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;

use super::{Scope, Store, UpsertStrategy};
use crate::{
    accessibility::Accessibility,
    codec::{self, JsonCodec, ValueCodec},
    error::StoreError,
    gateway::Gateway,
    key::Key,
    provider::SecureStoreProvider,
};

/// Non-blocking counterpart of [`Store`]: same operations, awaited instead
/// of blocking the calling thread.
pub struct AsyncStore<P, C = JsonCodec> {
    gateway: Gateway<P>,
    scope: Arc<Scope>,
    codec: Arc<C>,
}

impl<P, C> Clone for AsyncStore<P, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            scope: Arc::clone(&self.scope),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<P: SecureStoreProvider> AsyncStore<P> {
    /// Store for `service` on the process-wide worker.
    pub fn new(service: impl Into<String>, provider: P) -> Result<Self, StoreError> {
        Ok(Store::new(service, provider)?.to_async())
    }

    pub fn with_gateway(service: impl Into<String>, gateway: Gateway<P>) -> Self {
        Store::with_gateway(service, gateway).to_async()
    }
}

impl<P: SecureStoreProvider, C: ValueCodec> AsyncStore<P, C> {
    pub(crate) fn from_parts(gateway: Gateway<P>, scope: Arc<Scope>, codec: Arc<C>) -> Self {
        Self {
            gateway,
            scope,
            codec,
        }
    }

    pub fn with_strategy(mut self, strategy: UpsertStrategy) -> Self {
        self.scope = Arc::new(Scope::new(self.scope.service().to_string(), strategy));
        self
    }

    pub fn service(&self) -> &str {
        self.scope.service()
    }

    pub async fn contains_item(&self, key: &Key) -> Result<bool, StoreError> {
        Ok(self.data(key).await?.is_some())
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub async fn set_data(
        &self,
        key: &Key,
        data: &[u8],
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        let data = data.to_vec();
        self.gateway
            .execute_async(move |session| scope.set(session, &key, data, accessibility))
            .await
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub async fn data(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute_async(move |session| scope.data(session, &key))
            .await
    }

    pub async fn set_string(
        &self,
        key: &Key,
        value: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        self.set_data(key, value.as_bytes(), accessibility).await
    }

    pub async fn string(&self, key: &Key) -> Result<Option<String>, StoreError> {
        match self.data(key).await? {
            Some(bytes) => Ok(Some(codec::decode_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_value<T: Serialize>(
        &self,
        key: &Key,
        value: &T,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let bytes = self.codec.encode(value)?;
        self.set_data(key, &bytes, accessibility).await
    }

    pub async fn value<T: DeserializeOwned>(&self, key: &Key) -> Result<Option<T>, StoreError> {
        match self.data(key).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub async fn accessibility(&self, key: &Key) -> Result<Option<Accessibility>, StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute_async(move |session| scope.accessibility(session, &key))
            .await
    }

    #[instrument(skip_all, fields(service = %self.scope.service()))]
    pub async fn all_keys(&self) -> Result<HashSet<Key>, StoreError> {
        let scope = Arc::clone(&self.scope);
        self.gateway
            .execute_async(move |session| scope.all_keys(session))
            .await
    }

    #[instrument(skip_all, fields(service = %self.scope.service(), key = %key))]
    pub async fn remove_item(&self, key: &Key) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        let key = key.clone();
        self.gateway
            .execute_async(move |session| scope.remove_item(session, &key))
            .await
    }

    #[instrument(skip_all, fields(service = %self.scope.service()))]
    pub async fn remove_all_items(&self) -> Result<(), StoreError> {
        let scope = Arc::clone(&self.scope);
        self.gateway
            .execute_async(move |session| scope.remove_all_items(session))
            .await
    }
}
