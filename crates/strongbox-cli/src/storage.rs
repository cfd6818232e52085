use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use strongbox_core::AsyncStore;
use strongbox_storage::{encrypted_provider::EncryptedFileProvider, key_provider::KeyringKeyProvider};
use tracing::debug;

use crate::config::Config;

pub type FileStore = AsyncStore<EncryptedFileProvider<KeyringKeyProvider>>;

/// Scope reserved for `strongbox health`, kept apart from user secrets.
pub const HEALTH_SERVICE: &str = "strongbox-health";

/// Resolve the default data directory for Strongbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("strongbox"))
}

/// Encrypted provider keyed from the OS keyring, honoring config overrides.
pub fn provider_from_config(config: &Config) -> Result<EncryptedFileProvider<KeyringKeyProvider>> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    let (service, account) = config.keyring_entry();
    debug!(?root, %service, "initializing encrypted provider");
    Ok(EncryptedFileProvider::new(
        root,
        KeyringKeyProvider::new(service, account),
    ))
}

/// Store scoped to the configured (or overridden) service.
pub fn store_from_config(config: &Config, service: Option<&str>) -> Result<FileStore> {
    let provider = provider_from_config(config)?;
    Ok(AsyncStore::new(config.service_name(service), provider)?)
}

/// Store for the health check, over the same files and master key.
pub fn health_store_from_config(config: &Config) -> Result<FileStore> {
    let provider = provider_from_config(config)?;
    Ok(AsyncStore::new(HEALTH_SERVICE, provider)?)
}

#[cfg(test)]
pub type TestStore =
    AsyncStore<EncryptedFileProvider<strongbox_storage::key_provider::InMemoryKeyProvider>>;

/// Helper for tests to construct a store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> TestStore {
    test_store_in(
        root,
        "strongbox-test",
        strongbox_storage::key_provider::InMemoryKeyProvider::default(),
    )
}

/// Test store for `service`; stores built from clones of `keys` share a master key.
#[cfg(test)]
pub fn test_store_in(
    root: impl Into<PathBuf>,
    service: &str,
    keys: strongbox_storage::key_provider::InMemoryKeyProvider,
) -> TestStore {
    AsyncStore::new(service, EncryptedFileProvider::new(root, keys)).expect("store")
}
