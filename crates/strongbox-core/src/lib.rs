//! Core of strongbox: attribute queries, the provider contract, the serialized
//! gateway and the key/value facades built on top of it.
//! Concrete on-disk providers live in `strongbox-storage`.

pub mod accessibility;
pub mod attributes;
pub mod codec;
pub mod error;
pub mod gateway;
pub mod key;
pub mod provider;
pub mod store;
pub mod worker;

pub use accessibility::{AccessibleTag, Accessibility};
pub use attributes::{Attribute, AttributeSet, AttributeValue, MatchLimit, Tag};
pub use codec::{JsonCodec, ValueCodec};
pub use error::{CodecError, InvalidKeyError, StoreError};
pub use gateway::{Gateway, Session};
pub use key::Key;
pub use provider::{memory::MemoryProvider, QueryResult, SecureStoreProvider, Status};
pub use store::{AsyncStore, Store, UpsertStrategy};
pub use worker::Worker;
