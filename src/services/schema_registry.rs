// src/services/schema_registry.rs
//! Schema Registry Service
//!
//! Builds schema descriptors and writes them to the ledger under the
//! issuer's identity. Schema ids are derived from `(issuer, name, version)`,
//! so building the same schema twice yields the same id and the ledger
//! decides whether a second publish is a harmless duplicate or a conflict.

use log::{debug, info};

use crate::context::AgentContext;
use crate::error::{AnoncredsError, Result};
use crate::ledger::{LedgerOperation, LedgerQuery, LedgerRequest, PublishOutcome};
use crate::models::did::Did;
use crate::models::schema::{Schema, SchemaId};

/// A schema as read back from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSchema {
    pub schema: Schema,
    /// Sequence number of the transaction that wrote it
    pub seq_no: u64,
}

#[derive(Clone)]
pub struct SchemaRegistry {
    context: AgentContext,
}

impl SchemaRegistry {
    pub fn new(context: AgentContext) -> Self {
        SchemaRegistry { context }
    }

    /// Builds a schema descriptor. Does not touch the ledger.
    ///
    /// # Arguments
    /// * `issuer` - DID the schema will be published under
    /// * `name` - Schema name, e.g. `"gvt"`
    /// * `version` - Dotted numeric version, e.g. `"1.0"`
    /// * `attr_names` - Attribute names; order is preserved
    ///
    /// # Returns
    /// The derived schema id and the descriptor.
    ///
    /// # Errors
    /// `Validation` if the attribute list is empty or has duplicates, or the
    /// name or version is malformed.
    pub fn create_schema<S: AsRef<str>>(
        &self,
        issuer: &Did,
        name: &str,
        version: &str,
        attr_names: &[S],
    ) -> Result<(SchemaId, Schema)> {
        let attrs = attr_names.iter().map(|a| a.as_ref().to_string()).collect();
        let schema = Schema::new(issuer.clone(), name, version, attrs)?;
        debug!("built schema {}", schema.id);
        Ok((schema.id.clone(), schema))
    }

    /// Writes `schema` to the ledger, signed by its issuer.
    ///
    /// An identical schema already on the ledger comes back as
    /// `AlreadyPresentIdentical`; strict callers turn that into
    /// `LedgerRejected` with [`PublishOutcome::require_created`].
    pub async fn publish(&self, schema: &Schema) -> Result<PublishOutcome> {
        schema.validate()?;
        let key = self
            .context
            .timeouts
            .wallet("wallet.resolve_key", self.context.wallet.resolve_key(&schema.issuer_id))
            .await?;

        let operation = LedgerOperation::Schema(schema.clone());
        let signed = LedgerRequest::new(schema.issuer_id.clone(), operation.clone()).sign(&key)?;
        let reply = self
            .context
            .timeouts
            .ledger("ledger.submit", self.context.ledger.submit(signed))
            .await?;

        let outcome = PublishOutcome::classify(reply, &operation)?;
        match &outcome {
            PublishOutcome::Created(receipt) => info!("published schema {} at seq_no {}", schema.id, receipt.seq_no),
            other => debug!("schema {} not newly written: {:?}", schema.id, other),
        }
        Ok(outcome)
    }

    /// Reads a schema back from the ledger.
    ///
    /// # Errors
    /// `SchemaNotFound` if the schema is absent or not yet visible.
    pub async fn resolve(&self, id: &SchemaId) -> Result<LedgerSchema> {
        let entry = self
            .context
            .timeouts
            .ledger("ledger.read", self.context.ledger.read(LedgerQuery::Schema(id.clone())))
            .await?
            .ok_or_else(|| AnoncredsError::SchemaNotFound(id.to_string()))?;
        match entry.operation {
            LedgerOperation::Schema(schema) => Ok(LedgerSchema {
                schema,
                seq_no: entry.seq_no,
            }),
            _ => Err(AnoncredsError::SchemaNotFound(id.to_string())),
        }
    }
}
