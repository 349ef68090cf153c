// src/ledger/did_registry.rs
//! DID registry on top of the ledger client.
//!
//! Registers and resolves NYM records. Registration is signed by the
//! submitting steward or endorser; the target DID must already be derived
//! from the verkey being written.

use log::{debug, info};

use crate::context::AgentContext;
use crate::error::Result;
use crate::ledger::client::{LedgerOperation, LedgerQuery, LedgerRequest, PublishOutcome};
use crate::models::did::{Did, NymRecord, Role};

/// NYM registration and resolution.
///
/// Holds no state of its own; every call goes through the context's ledger
/// and wallet under their configured deadlines.
pub struct DidRegistry {
    context: AgentContext,
}

impl DidRegistry {
    pub fn new(context: AgentContext) -> Self {
        DidRegistry { context }
    }

    /// Writes a NYM record for `did`.
    ///
    /// # Arguments
    /// * `submitter` - Steward or endorser whose key is in the wallet
    /// * `did` - Identity being registered
    /// * `verkey` - Base58 verification key of `did`
    /// * `role` - Role granted to `did`
    ///
    /// # Returns
    /// How the write resolved. Re-registering the same record is
    /// `AlreadyPresentIdentical`; a different verkey or role is `Conflict`.
    pub async fn register(&self, submitter: &Did, did: &Did, verkey: &str, role: Role) -> Result<PublishOutcome> {
        let key = self
            .context
            .timeouts
            .wallet("wallet.resolve_key", self.context.wallet.resolve_key(submitter))
            .await?;

        let operation = LedgerOperation::Nym(NymRecord {
            did: did.clone(),
            verkey: verkey.to_string(),
            role,
        });
        let signed = LedgerRequest::new(submitter.clone(), operation.clone()).sign(&key)?;
        let reply = self
            .context
            .timeouts
            .ledger("ledger.submit", self.context.ledger.submit(signed))
            .await?;

        let outcome = PublishOutcome::classify(reply, &operation)?;
        if outcome.is_created() {
            info!("registered {} as {:?}", did, role);
        } else {
            debug!("NYM for {} already on ledger", did);
        }
        Ok(outcome)
    }

    /// Resolves the NYM record of `did`, if visible.
    pub async fn resolve(&self, did: &Did) -> Result<Option<NymRecord>> {
        let entry = self
            .context
            .timeouts
            .ledger("ledger.read", self.context.ledger.read(LedgerQuery::Nym(did.clone())))
            .await?;
        Ok(entry.and_then(|entry| match entry.operation {
            LedgerOperation::Nym(record) => Some(record),
            _ => None,
        }))
    }

    /// Creates a fresh identity in the wallet and registers it with `role`.
    pub async fn onboard(&self, submitter: &Did, role: Role) -> Result<(Did, String)> {
        let (did, verkey) = self
            .context
            .timeouts
            .wallet("wallet.create_did", self.context.wallet.create_did(None))
            .await?;
        self.register(submitter, &did, &verkey, role).await?.require_created()?;
        Ok((did, verkey))
    }
}
