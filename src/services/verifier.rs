// src/services/verifier.rs
//! Credential verification against the ledger.
//!
//! A stored credential carries the definition it was verified against at
//! store time. The verifier re-reads that definition from the ledger, so a
//! record whose embedded definition no longer matches what was published is
//! caught instead of trusted.

use log::debug;
use std::sync::Arc;

use crate::error::{AnoncredsError, Result};
use crate::models::credential::CredentialValues;
use crate::services::definition_manager::DefinitionManager;
use crate::wallet::CredentialStore;

/// Re-verifies stored credentials against ledger-published definitions.
pub struct CredentialVerifier {
    /// Source of published definitions
    definitions: DefinitionManager,
    /// Holder store the records are read from
    store: Arc<CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(definitions: DefinitionManager, store: Arc<CredentialStore>) -> Self {
        CredentialVerifier { definitions, store }
    }

    /// Verifies the stored credential `id` against the ledger's copy of its
    /// definition.
    ///
    /// # Returns
    /// The credential's attribute values once the signature verifies.
    ///
    /// # Errors
    /// * `CredentialNotFound` if `id` is not in the store
    /// * `DefinitionNotFound` if the definition is not visible on the ledger
    /// * `SignatureVerification` if the embedded definition differs from the
    ///   ledger's or the signature does not verify
    pub async fn verify_stored(&self, id: &str) -> Result<CredentialValues> {
        let record = self.store.get(id)?;
        let published = self.definitions.resolve(&record.credential.cred_def_id).await?;
        if published != record.definition {
            return Err(AnoncredsError::SignatureVerification(format!(
                "stored definition for {} differs from the ledger",
                published.id
            )));
        }
        self.store.verify(&record, &published).await?;
        debug!("credential {} verifies against {}", id, published.id);
        Ok(record.credential.values)
    }
}
