//! Serializing adapter between the facades and a blocking provider.

use std::sync::Arc;

use tracing::debug;

use crate::{
    attributes::AttributeSet,
    error::StoreError,
    provider::{QueryResult, SecureStoreProvider, Status},
    worker::Worker,
};

/// Owns a provider and the worker every call into it runs on.
pub struct Gateway<P> {
    provider: Arc<P>,
    worker: Worker,
}

impl<P> Clone for Gateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            worker: self.worker.clone(),
        }
    }
}

impl<P: SecureStoreProvider> Gateway<P> {
    /// Gateway on the process-wide worker.
    pub fn new(provider: P) -> Result<Self, StoreError> {
        Ok(Self::with_worker(provider, Worker::shared()?))
    }

    pub fn with_worker(provider: P, worker: Worker) -> Self {
        Self {
            provider: Arc::new(provider),
            worker,
        }
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Run `op` on the worker as a single job, blocking until it finishes.
    ///
    /// Provider calls made through the session are never interleaved with
    /// another job's calls.
    pub fn execute<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Session<'_, P>) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        self.worker.run(move || {
            op(&Session {
                provider: provider.as_ref(),
            })
        })?
    }

    /// Async counterpart of [`Gateway::execute`].
    pub async fn execute_async<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Session<'_, P>) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        self.worker
            .run_async(move || {
                op(&Session {
                    provider: provider.as_ref(),
                })
            })
            .await?
    }

    pub fn add(&self, attributes: AttributeSet) -> Result<(), StoreError> {
        self.execute(move |session| session.add(&attributes))
    }

    pub fn update(&self, query: AttributeSet, changes: AttributeSet) -> Result<(), StoreError> {
        self.execute(move |session| session.update(&query, &changes))
    }

    pub fn delete(&self, query: AttributeSet) -> Result<(), StoreError> {
        self.execute(move |session| session.delete(&query))
    }

    pub fn copy_matching<T>(&self, query: AttributeSet) -> Result<Option<T>, StoreError>
    where
        T: FromQueryResult + Send + 'static,
    {
        self.execute(move |session| session.copy_matching(&query))
    }
}

/// Provider access granted to a job running on the gateway's worker.
///
/// Translates statuses: success and (where allowed) item-not-found become
/// `Ok`, everything else becomes [`StoreError::Status`] with the code intact.
pub struct Session<'a, P> {
    provider: &'a P,
}

impl<P: SecureStoreProvider> Session<'_, P> {
    pub fn add(&self, attributes: &AttributeSet) -> Result<(), StoreError> {
        self.provider
            .add(attributes)
            .map_err(|status| failed("add", status))
    }

    pub fn update(&self, query: &AttributeSet, changes: &AttributeSet) -> Result<(), StoreError> {
        self.provider
            .update(query, changes)
            .map_err(|status| failed("update", status))
    }

    /// Deleting something that is not there is not an error.
    pub fn delete(&self, query: &AttributeSet) -> Result<(), StoreError> {
        match self.provider.delete(query) {
            Ok(()) => Ok(()),
            Err(status) if status.is_not_found() => Ok(()),
            Err(status) => Err(failed("delete", status)),
        }
    }

    /// `None` when nothing matched.
    pub fn copy_matching<T: FromQueryResult>(
        &self,
        query: &AttributeSet,
    ) -> Result<Option<T>, StoreError> {
        match self.provider.copy_matching(query) {
            Ok(result) => T::from_query_result(result)
                .map(Some)
                .ok_or(StoreError::UnexpectedResult {
                    expected: T::EXPECTED,
                }),
            Err(status) if status.is_not_found() => Ok(None),
            Err(status) => Err(failed("copy_matching", status)),
        }
    }
}

fn failed(operation: &'static str, status: Status) -> StoreError {
    debug!(operation, %status, "secure store call failed");
    StoreError::Status { status }
}

/// Typed view of a [`QueryResult`].
pub trait FromQueryResult: Sized {
    /// Shape named in [`StoreError::UnexpectedResult`].
    const EXPECTED: &'static str;

    fn from_query_result(result: QueryResult) -> Option<Self>;
}

impl FromQueryResult for Vec<u8> {
    const EXPECTED: &'static str = "item data";

    fn from_query_result(result: QueryResult) -> Option<Self> {
        match result {
            QueryResult::Data(data) => Some(data),
            QueryResult::Items(_) => None,
        }
    }
}

impl FromQueryResult for Vec<AttributeSet> {
    const EXPECTED: &'static str = "item attributes";

    fn from_query_result(result: QueryResult) -> Option<Self> {
        match result {
            QueryResult::Items(items) => Some(items),
            QueryResult::Data(_) => None,
        }
    }
}

impl FromQueryResult for AttributeSet {
    const EXPECTED: &'static str = "attributes of one item";

    fn from_query_result(result: QueryResult) -> Option<Self> {
        match result {
            QueryResult::Items(items) => items.into_iter().next(),
            QueryResult::Data(_) => None,
        }
    }
}
