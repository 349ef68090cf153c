// src/services/definition_manager.rs
//! Credential Definition Manager
//!
//! Binds a ledger-visible schema to fresh issuer key material under a
//! registered signature scheme. The private half goes straight into the
//! issuer's secret store together with the public definition; only the
//! public definition is ever written to the ledger.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::context::AgentContext;
use crate::error::{AnoncredsError, Result};
use crate::ledger::{LedgerOperation, LedgerQuery, LedgerRequest, PublishOutcome, Receipt};
use crate::models::credential_definition::{
    validate_tag, CredentialDefinition, CredentialDefinitionId, DefinitionConfig,
};
use crate::models::did::Did;
use crate::models::schema::Schema;
use crate::services::schema_registry::SchemaRegistry;
use crate::wallet::CredentialKeyHandle;
use crate::zkp::SchemeRegistry;

#[derive(Clone)]
pub struct DefinitionManager {
    context: AgentContext,
    schemes: SchemeRegistry,
    schemas: SchemaRegistry,
}

impl DefinitionManager {
    pub fn new(context: AgentContext, schemes: SchemeRegistry) -> Self {
        DefinitionManager {
            schemas: SchemaRegistry::new(context.clone()),
            context,
            schemes,
        }
    }

    /// Creates a credential definition and stores its private key.
    ///
    /// # Arguments
    /// * `issuer` - DID that will own and publish the definition
    /// * `schema` - Schema descriptor; must already be visible on the ledger
    /// * `tag` - Free-form tag distinguishing definitions over one schema
    /// * `signature_type` - Registered scheme name, e.g. `"CL"`
    /// * `config` - Definition options
    ///
    /// # Returns
    /// The definition id, the public descriptor, and the handle to the
    /// private key held by the wallet. Calling again with the same inputs
    /// returns the definition already held instead of generating new keys.
    ///
    /// # Errors
    /// * `Validation` for an empty tag or `support_revocation: true`
    /// * `UnsupportedSignatureType` if `signature_type` is not registered
    /// * `SchemaNotFound` if the schema is not ledger-visible yet
    pub async fn create_definition(
        &self,
        issuer: &Did,
        schema: &Schema,
        tag: &str,
        signature_type: &str,
        config: DefinitionConfig,
    ) -> Result<(CredentialDefinitionId, CredentialDefinition, Arc<CredentialKeyHandle>)> {
        validate_tag(tag)?;
        if config.support_revocation {
            return Err(AnoncredsError::Validation(
                "revocation registries are not supported; set support_revocation to false".into(),
            ));
        }
        let scheme = self.schemes.get(signature_type)?;

        let published = self.schemas.resolve(&schema.id).await?;
        if published.schema != *schema {
            return Err(AnoncredsError::Validation(format!(
                "schema {} differs from the copy on the ledger",
                schema.id
            )));
        }

        let id = CredentialDefinitionId::new(issuer, signature_type, published.seq_no, tag);
        match self
            .context
            .timeouts
            .wallet("wallet.resolve_credential_key", self.context.wallet.resolve_credential_key(&id))
            .await
        {
            Ok(existing) => {
                debug!("wallet already holds keys for {}", id);
                return Ok((id, existing.definition().clone(), existing));
            }
            Err(AnoncredsError::KeyNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let (public_key, private_key) = scheme.generate_keys(&schema.attr_names)?;
        let definition = CredentialDefinition {
            id: id.clone(),
            schema_id: schema.id.clone(),
            issuer_id: issuer.clone(),
            tag: tag.to_string(),
            signature_type: signature_type.to_string(),
            support_revocation: false,
            public_key,
        };
        definition.validate()?;

        let stored = self
            .context
            .timeouts
            .wallet(
                "wallet.store_credential_key",
                self.context.wallet.store_credential_key(definition.clone(), private_key),
            )
            .await;
        match stored {
            Ok(handle) => {
                info!("created credential definition {}", id);
                Ok((id, definition, handle))
            }
            // A concurrent call for the same tag stored its keys first.
            Err(AnoncredsError::Validation(reason)) => {
                let existing = self
                    .context
                    .timeouts
                    .wallet("wallet.resolve_credential_key", self.context.wallet.resolve_credential_key(&id))
                    .await
                    .map_err(|_| AnoncredsError::Validation(reason))?;
                debug!("lost the race to create {}; using the stored keys", id);
                Ok((id, existing.definition().clone(), existing))
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the public definition to the ledger, signed by its issuer.
    pub async fn publish(&self, definition: &CredentialDefinition) -> Result<PublishOutcome> {
        let key = self
            .context
            .timeouts
            .wallet("wallet.resolve_key", self.context.wallet.resolve_key(&definition.issuer_id))
            .await?;

        let operation = LedgerOperation::CredentialDefinition(definition.clone());
        let signed = LedgerRequest::new(definition.issuer_id.clone(), operation.clone()).sign(&key)?;
        let reply = self
            .context
            .timeouts
            .ledger("ledger.submit", self.context.ledger.submit(signed))
            .await?;

        let outcome = PublishOutcome::classify(reply, &operation)?;
        match &outcome {
            PublishOutcome::Created(receipt) => {
                info!("published credential definition {} at seq_no {}", definition.id, receipt.seq_no)
            }
            PublishOutcome::AlreadyPresentIdentical(_) => {
                debug!("credential definition {} already published", definition.id)
            }
            PublishOutcome::Conflict { existing } => warn!(
                "credential definition {} conflicts with seq_no {}",
                definition.id, existing.seq_no
            ),
        }
        Ok(outcome)
    }

    /// Reads a published definition back from the ledger.
    ///
    /// # Errors
    /// `DefinitionNotFound` if it is absent or not yet visible.
    pub async fn resolve(&self, id: &CredentialDefinitionId) -> Result<CredentialDefinition> {
        let entry = self
            .context
            .timeouts
            .ledger(
                "ledger.read",
                self.context.ledger.read(LedgerQuery::CredentialDefinition(id.clone())),
            )
            .await?
            .ok_or_else(|| AnoncredsError::DefinitionNotFound(id.to_string()))?;
        match entry.operation {
            LedgerOperation::CredentialDefinition(definition) => Ok(definition),
            _ => Err(AnoncredsError::DefinitionNotFound(id.to_string())),
        }
    }

    /// Makes sure the wallet-held definition `id` is on the ledger.
    ///
    /// Re-queries the ledger first, so a run that crashed between creating
    /// and publishing (or after publishing but before recording it) resumes
    /// without a blind retry. A different definition under the same id is
    /// `LedgerRejected`.
    pub async fn ensure_published(&self, id: &CredentialDefinitionId) -> Result<Receipt> {
        let held = self
            .context
            .timeouts
            .wallet("wallet.resolve_credential_key", self.context.wallet.resolve_credential_key(id))
            .await?;
        let entry = self
            .context
            .timeouts
            .ledger(
                "ledger.read",
                self.context.ledger.read(LedgerQuery::CredentialDefinition(id.clone())),
            )
            .await?;

        match entry {
            Some(entry) => {
                let receipt = entry.receipt();
                match entry.operation {
                    LedgerOperation::CredentialDefinition(ref on_ledger) if on_ledger == held.definition() => {
                        debug!("{} already visible at seq_no {}", id, receipt.seq_no);
                        Ok(receipt)
                    }
                    _ => Err(AnoncredsError::LedgerRejected {
                        id: id.to_string(),
                        reason: format!("ledger holds a different entry at seq_no {}", receipt.seq_no),
                    }),
                }
            }
            None => self.publish(held.definition()).await?.tolerate_identical(),
        }
    }
}
