// src/wallet/mod.rs
pub mod credential_storage;
pub mod key_management;
pub mod secret_store;

pub use credential_storage::CredentialStore;
pub use key_management::KeyHandle;
pub use secret_store::{CredentialKeyHandle, InMemoryWallet, LinkSecretHandle, SecretStore};
