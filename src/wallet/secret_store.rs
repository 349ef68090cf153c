// src/wallet/secret_store.rs
//! Secret store contract and an in-memory wallet implementing it.
//!
//! The engine never sees raw key or secret bytes. It resolves opaque handles
//! and asks them to act: identity keys sign ledger requests, link secrets
//! feed blinding and verification inside the signature scheme, and issuer
//! credential keys sign credentials.

use async_trait::async_trait;
use ark_bn254::Fr;
use ark_ff::PrimeField;
use log::{debug, info};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AnoncredsError, Result};
use crate::models::credential_definition::{CredentialDefinition, CredentialDefinitionId};
use crate::models::did::Did;
use crate::wallet::key_management::KeyHandle;
use crate::zkp::CredentialPrivateKey;

/// Handle to a holder's link secret.
pub struct LinkSecretHandle {
    id: String,
    secret: [u8; 32],
}

impl LinkSecretHandle {
    /// Draws a fresh 256-bit secret from the OS RNG.
    pub fn generate(id: &str) -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        LinkSecretHandle { id: id.to_string(), secret }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The secret as a scheme scalar. Crate-internal so it stays inside the
    /// store boundary.
    pub(crate) fn scalar(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.secret)
    }
}

impl std::fmt::Debug for LinkSecretHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSecretHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Handle to an issuer's credential private key, stored together with the
/// public definition it belongs to.
pub struct CredentialKeyHandle {
    definition: CredentialDefinition,
    key: CredentialPrivateKey,
}

impl CredentialKeyHandle {
    pub fn new(definition: CredentialDefinition, key: CredentialPrivateKey) -> Self {
        CredentialKeyHandle { definition, key }
    }

    pub fn definition(&self) -> &CredentialDefinition {
        &self.definition
    }

    pub(crate) fn key(&self) -> &CredentialPrivateKey {
        &self.key
    }
}

impl std::fmt::Debug for CredentialKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialKeyHandle")
            .field("definition", &self.definition.id)
            .finish_non_exhaustive()
    }
}

/// Persists identity keys, link secrets, and issuer credential keys.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Creates (or, for a seed that was used before, returns) an identity.
    /// Returns the DID and its base58 verkey.
    async fn create_did(&self, seed: Option<&[u8]>) -> Result<(Did, String)>;

    /// `KeyNotFound` if the wallet holds no key for `did`.
    async fn resolve_key(&self, did: &Did) -> Result<Arc<KeyHandle>>;

    /// Generates the link secret once; later calls with the same id are
    /// no-ops so every credential binds to the same secret.
    async fn create_link_secret(&self, id: &str) -> Result<()>;

    /// `LinkSecretNotFound` if `id` does not resolve.
    async fn resolve_link_secret(&self, id: &str) -> Result<Arc<LinkSecretHandle>>;

    /// Stores an issuer key. Refuses to replace an existing key, since that
    /// would orphan every credential signed under it.
    async fn store_credential_key(
        &self,
        definition: CredentialDefinition,
        key: CredentialPrivateKey,
    ) -> Result<Arc<CredentialKeyHandle>>;

    /// `KeyNotFound` if no key is stored under `id`.
    async fn resolve_credential_key(&self, id: &CredentialDefinitionId) -> Result<Arc<CredentialKeyHandle>>;

    /// Releases the store. Later calls fail with `ContextClosed`.
    fn close(&self);
}

#[derive(Default)]
struct WalletState {
    keys: HashMap<Did, Arc<KeyHandle>>,
    link_secrets: HashMap<String, Arc<LinkSecretHandle>>,
    credential_keys: HashMap<CredentialDefinitionId, Arc<CredentialKeyHandle>>,
}

/// Thread-safe in-memory wallet.
pub struct InMemoryWallet {
    id: String,
    open: AtomicBool,
    state: Mutex<WalletState>,
}

impl InMemoryWallet {
    pub fn new(id: &str) -> Self {
        info!("opening wallet {}", id);
        InMemoryWallet {
            id: id.to_string(),
            open: AtomicBool::new(true),
            state: Mutex::new(WalletState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> Result<MutexGuard<'_, WalletState>> {
        if !self.open.load(Ordering::Acquire) {
            return Err(AnoncredsError::ContextClosed("wallet"));
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl SecretStore for InMemoryWallet {
    async fn create_did(&self, seed: Option<&[u8]>) -> Result<(Did, String)> {
        let key = match seed {
            Some(seed) => KeyHandle::from_seed(seed)?,
            None => KeyHandle::generate(),
        };
        let mut state = self.state()?;
        let key = state
            .keys
            .entry(key.did().clone())
            .or_insert_with(|| Arc::new(key))
            .clone();
        debug!("wallet {} holds identity {}", self.id, key.did());
        Ok((key.did().clone(), key.verkey()))
    }

    async fn resolve_key(&self, did: &Did) -> Result<Arc<KeyHandle>> {
        self.state()?
            .keys
            .get(did)
            .cloned()
            .ok_or_else(|| AnoncredsError::KeyNotFound(did.to_string()))
    }

    async fn create_link_secret(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(AnoncredsError::Validation("link secret id must not be empty".into()));
        }
        self.state()?
            .link_secrets
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(LinkSecretHandle::generate(id)));
        Ok(())
    }

    async fn resolve_link_secret(&self, id: &str) -> Result<Arc<LinkSecretHandle>> {
        self.state()?
            .link_secrets
            .get(id)
            .cloned()
            .ok_or_else(|| AnoncredsError::LinkSecretNotFound(id.to_string()))
    }

    async fn store_credential_key(
        &self,
        definition: CredentialDefinition,
        key: CredentialPrivateKey,
    ) -> Result<Arc<CredentialKeyHandle>> {
        let mut state = self.state()?;
        if state.credential_keys.contains_key(&definition.id) {
            return Err(AnoncredsError::Validation(format!(
                "wallet already holds a private key for {}",
                definition.id
            )));
        }
        let id = definition.id.clone();
        let handle = Arc::new(CredentialKeyHandle::new(definition, key));
        state.credential_keys.insert(id, handle.clone());
        Ok(handle)
    }

    async fn resolve_credential_key(&self, id: &CredentialDefinitionId) -> Result<Arc<CredentialKeyHandle>> {
        self.state()?
            .credential_keys
            .get(id)
            .cloned()
            .ok_or_else(|| AnoncredsError::KeyNotFound(id.to_string()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("closing wallet {}", self.id);
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = WalletState::default();
        }
    }
}
