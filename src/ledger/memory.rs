// src/ledger/memory.rs
//! In-process ledger pool.
//!
//! Append-only transaction log with the observable behaviour of a replicated
//! ledger: submitters are authenticated against their NYM, every accepted
//! write gets the next sequence number, duplicates are rejected with the
//! existing entry attached, and reads only see a write once its visibility
//! lag has elapsed.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{AnoncredsError, Result};
use crate::ledger::client::{
    LedgerClient, LedgerEntry, LedgerOperation, LedgerQuery, LedgerReply, Receipt, RejectReason,
    Rejection, SignedRequest,
};
use crate::models::did::{Did, NymRecord, Role};
use crate::wallet::key_management::{did_for_verkey, verify_signature};

struct Transaction {
    entry: LedgerEntry,
    visible_at: Instant,
}

#[derive(Default)]
struct LedgerState {
    transactions: Vec<Transaction>,
    index: HashMap<LedgerQuery, usize>,
}

impl LedgerState {
    fn committed(&self, query: &LedgerQuery) -> Option<&Transaction> {
        self.index.get(query).map(|&i| &self.transactions[i])
    }

    fn nym(&self, did: &Did) -> Option<&NymRecord> {
        match self.committed(&LedgerQuery::Nym(did.clone())).map(|t| &t.entry.operation) {
            Some(LedgerOperation::Nym(record)) => Some(record),
            _ => None,
        }
    }

    fn append(&mut self, submitter: Did, operation: LedgerOperation, visible_at: Instant) -> Receipt {
        let entry = LedgerEntry {
            seq_no: self.transactions.len() as u64 + 1,
            txn_time: Utc::now(),
            submitter,
            operation,
        };
        let receipt = entry.receipt();
        self.index.insert(entry.operation.key(), self.transactions.len());
        self.transactions.push(Transaction { entry, visible_at });
        receipt
    }
}

/// Thread-safe in-memory ledger.
pub struct InMemoryLedger {
    pool_name: String,
    visibility_lag: Duration,
    open: AtomicBool,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Opens a pool whose genesis holds a single steward NYM.
    pub fn with_steward(pool_name: &str, steward: Did, verkey: String) -> Self {
        info!("opening ledger pool {} with steward {}", pool_name, steward);
        let mut state = LedgerState::default();
        let genesis = LedgerOperation::Nym(NymRecord {
            did: steward.clone(),
            verkey,
            role: Role::Steward,
        });
        state.append(steward, genesis, Instant::now());
        InMemoryLedger {
            pool_name: pool_name.to_string(),
            visibility_lag: Duration::ZERO,
            open: AtomicBool::new(true),
            state: Mutex::new(state),
        }
    }

    /// Delays read visibility of every later write by `lag`.
    pub fn with_visibility_lag(mut self, lag: Duration) -> Self {
        self.visibility_lag = lag;
        self
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Number of committed transactions, visible or not.
    pub fn len(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AnoncredsError::ContextClosed("ledger pool"))
        }
    }

    fn authorize(state: &LedgerState, signed: &SignedRequest) -> std::result::Result<(), Rejection> {
        let request = &signed.request;
        let submitter = state
            .nym(&request.identifier)
            .ok_or_else(|| reject(RejectReason::Unauthorized, format!("unknown submitter {}", request.identifier)))?;

        let signature = base64::decode(&signed.signature)
            .map_err(|_| reject(RejectReason::Unauthorized, "signature is not base64".into()))?;
        let bytes = request
            .signing_bytes()
            .map_err(|e| reject(RejectReason::InvalidPayload, e.to_string()))?;
        verify_signature(&submitter.verkey, &bytes, &signature)
            .map_err(|e| reject(RejectReason::Unauthorized, e.to_string()))?;

        match &request.operation {
            LedgerOperation::Nym(record) => {
                if !matches!(submitter.role, Role::Steward | Role::Endorser) {
                    return Err(reject(
                        RejectReason::Unauthorized,
                        format!("{} may not register identities", request.identifier),
                    ));
                }
                let derived = did_for_verkey(&record.verkey)
                    .map_err(|e| reject(RejectReason::InvalidPayload, e.to_string()))?;
                if derived != record.did {
                    return Err(reject(RejectReason::InvalidPayload, "DID does not match verkey".into()));
                }
                if record.role == Role::Steward && submitter.role != Role::Steward {
                    return Err(reject(RejectReason::Unauthorized, "only stewards create stewards".into()));
                }
            }
            LedgerOperation::Schema(schema) => {
                schema.validate().map_err(|e| reject(RejectReason::InvalidPayload, e.to_string()))?;
                if schema.issuer_id != request.identifier {
                    return Err(reject(RejectReason::Unauthorized, "schema issuer must submit it".into()));
                }
            }
            LedgerOperation::CredentialDefinition(definition) => {
                definition
                    .validate()
                    .map_err(|e| reject(RejectReason::InvalidPayload, e.to_string()))?;
                if definition.issuer_id != request.identifier {
                    return Err(reject(RejectReason::Unauthorized, "definition issuer must submit it".into()));
                }
                let schema_known = matches!(
                    state.committed(&LedgerQuery::Schema(definition.schema_id.clone())),
                    Some(_)
                );
                if !schema_known {
                    return Err(reject(
                        RejectReason::InvalidPayload,
                        format!("schema {} is not on the ledger", definition.schema_id),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn reject(reason: RejectReason, message: String) -> Rejection {
    Rejection { reason, message, existing: None }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit(&self, request: SignedRequest) -> Result<LedgerReply> {
        self.ensure_open()?;
        let key = request.request.operation.key();
        let mut state = self.lock();

        if let Some(existing) = state.committed(&key) {
            warn!("{}: duplicate write for {}", self.pool_name, key);
            return Ok(LedgerReply::Rejected(Rejection {
                reason: RejectReason::Duplicate,
                message: format!("{} already exists", key),
                existing: Some(existing.entry.clone()),
            }));
        }
        if let Err(rejection) = Self::authorize(&state, &request) {
            warn!("{}: rejected {}: {}", self.pool_name, key, rejection.message);
            return Ok(LedgerReply::Rejected(rejection));
        }

        let SignedRequest { request, .. } = request;
        let visible_at = Instant::now() + self.visibility_lag;
        let receipt = state.append(request.identifier, request.operation, visible_at);
        debug!("{}: committed {} at seq_no {}", self.pool_name, key, receipt.seq_no);
        Ok(LedgerReply::Committed(receipt))
    }

    async fn read(&self, query: LedgerQuery) -> Result<Option<LedgerEntry>> {
        self.ensure_open()?;
        let state = self.lock();
        Ok(state
            .committed(&query)
            .filter(|t| t.visible_at <= Instant::now())
            .map(|t| t.entry.clone()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("closing ledger pool {}", self.pool_name);
        }
    }
}
