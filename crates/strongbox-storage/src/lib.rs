//! Persistent secure store provider with encryption at rest.
//! Uses AES-GCM with the master key held in the OS keyring (or a test double).

pub mod encrypted_provider;
pub mod key_provider;
