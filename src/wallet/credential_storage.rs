// src/wallet/credential_storage.rs
//! Holder-side credential storage.
//!
//! A credential arrives blind-signed: its signature only verifies against the
//! definition's public key once the blinding factor from the request metadata
//! is removed. The store therefore takes credential, metadata, and definition
//! together, verifies before persisting, and keeps all three so the values
//! can be re-derived and re-verified at presentation time.

use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::AgentContext;
use crate::error::{AnoncredsError, Result};
use crate::models::credential::{Credential, CredentialValues, StoredCredential};
use crate::models::credential_definition::CredentialDefinition;
use crate::models::did::Did;
use crate::models::messages::CredentialRequestMetadata;
use crate::zkp::SchemeRegistry;

/// In-memory store of verified credentials.
///
/// Records are keyed by a random id assigned at store time. The store is
/// `Sync`; share it behind an `Arc`.
pub struct CredentialStore {
    context: AgentContext,
    schemes: SchemeRegistry,
    credentials: Mutex<HashMap<String, StoredCredential>>,
}

impl CredentialStore {
    pub fn new(context: AgentContext, schemes: SchemeRegistry) -> Self {
        CredentialStore {
            context,
            schemes,
            credentials: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, StoredCredential>> {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unblinds, verifies, and persists an issued credential.
    ///
    /// # Arguments
    /// * `holder` - Identity the request was made under
    /// * `credential` - Credential received from the issuer
    /// * `metadata` - Metadata retained from `create_request`
    /// * `definition` - Definition the credential claims to be issued under
    ///
    /// # Returns
    /// The id of the stored record.
    ///
    /// # Errors
    /// * `Validation` if credential, metadata, and definition do not belong together
    /// * `LinkSecretNotFound` if the metadata's link secret is gone
    /// * `SignatureVerification` if the unblinded signature does not verify
    /// * `AttributeEncodingMismatch` if a raw value does not match its encoding
    ///
    /// Nothing is persisted on any failure.
    pub async fn store(
        &self,
        holder: &Did,
        credential: Credential,
        metadata: CredentialRequestMetadata,
        definition: CredentialDefinition,
    ) -> Result<String> {
        check_binding(holder, &credential, &metadata, &definition)?;

        let record = StoredCredential {
            id: format!("{:032x}", OsRng.gen::<u128>()),
            holder: holder.clone(),
            credential,
            definition,
            metadata,
            stored_at: Utc::now(),
        };
        if let Err(e) = self.verify(&record, &record.definition).await {
            warn!("refusing to store credential for {}: {}", record.definition.id, e);
            return Err(e);
        }
        record.credential.values.check_against(record.definition.attributes())?;

        let id = record.id.clone();
        info!("stored credential {} under {}", id, record.definition.id);
        self.records().insert(id.clone(), record);
        Ok(id)
    }

    /// Re-verifies `record` against `definition`'s public key using the
    /// record's own request metadata.
    pub async fn verify(&self, record: &StoredCredential, definition: &CredentialDefinition) -> Result<()> {
        let link_secret = self
            .context
            .timeouts
            .wallet(
                "wallet.resolve_link_secret",
                self.context.wallet.resolve_link_secret(&record.metadata.link_secret_id),
            )
            .await?;
        let scheme = self.schemes.get(&definition.signature_type)?;
        let encoded = record.credential.values.encoded_in_order(definition.attributes())?;
        scheme.unblind_and_verify(
            &definition.public_key,
            &record.credential.signature,
            &record.metadata.blinding_factors,
            &link_secret,
            &encoded,
        )
    }

    /// Recovers the attribute values of a stored credential, re-verifying
    /// the signature with the retained request metadata first.
    pub async fn rederive(&self, id: &str) -> Result<CredentialValues> {
        let record = self.get(id)?;
        self.verify(&record, &record.definition).await?;
        debug!("re-derived values of credential {}", id);
        Ok(record.credential.values)
    }

    pub fn get(&self, id: &str) -> Result<StoredCredential> {
        self.records()
            .get(id)
            .cloned()
            .ok_or_else(|| AnoncredsError::CredentialNotFound(id.to_string()))
    }

    /// All records held for `holder`, oldest first.
    pub fn list(&self, holder: &Did) -> Vec<StoredCredential> {
        let mut records: Vec<_> = self
            .records()
            .values()
            .filter(|record| &record.holder == holder)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    pub fn count(&self) -> usize {
        self.records().len()
    }

    /// Returns `true` if a record was removed.
    pub fn remove(&self, id: &str) -> bool {
        self.records().remove(id).is_some()
    }
}

fn check_binding(
    holder: &Did,
    credential: &Credential,
    metadata: &CredentialRequestMetadata,
    definition: &CredentialDefinition,
) -> Result<()> {
    if metadata.prover_did != *holder {
        return Err(AnoncredsError::Validation(format!(
            "request metadata belongs to {}, not {}",
            metadata.prover_did, holder
        )));
    }
    if credential.cred_def_id != definition.id || metadata.cred_def_id != definition.id {
        return Err(AnoncredsError::Validation(format!(
            "credential, request metadata, and definition {} do not match",
            definition.id
        )));
    }
    if credential.schema_id != definition.schema_id {
        return Err(AnoncredsError::Validation(format!(
            "credential schema {} differs from definition schema {}",
            credential.schema_id, definition.schema_id
        )));
    }
    if credential.rev_reg_id.is_some() {
        return Err(AnoncredsError::Validation("revocable credentials are not supported".into()));
    }
    Ok(())
}
