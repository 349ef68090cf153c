// src/context.rs
//! Explicit ledger/wallet context.
//!
//! Services receive their collaborators through an [`AgentContext`] instead
//! of process-wide handles. [`ContextGuard`] owns the open pool and wallet
//! and closes both when dropped, so every exit path (including `?` and
//! panics) releases them.

use log::info;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{AnoncredsError, Result};
use crate::ledger::{InMemoryLedger, LedgerClient};
use crate::wallet::{InMemoryWallet, SecretStore};

/// Per-collaborator deadlines. Expiry aborts the call immediately; the
/// aborted future is dropped, so nothing it had not yet written persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub ledger: Duration,
    pub wallet: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            ledger: Duration::from_secs(10),
            wallet: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    pub async fn ledger<F, T>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.ledger, operation, fut).await
    }

    pub async fn wallet<F, T>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.wallet, operation, fut).await
    }
}

async fn bounded<F, T>(limit: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AnoncredsError::Timeout {
            operation,
            millis: limit.as_millis(),
        }),
    }
}

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct AgentContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub wallet: Arc<dyn SecretStore>,
    pub timeouts: Timeouts,
}

impl AgentContext {
    pub fn new(ledger: Arc<dyn LedgerClient>, wallet: Arc<dyn SecretStore>, timeouts: Timeouts) -> Self {
        AgentContext { ledger, wallet, timeouts }
    }

    /// Opens an in-memory ledger and wallet from settings. The steward
    /// identity derived from `ledger.steward_seed` is placed in both the
    /// ledger's genesis and the wallet.
    pub async fn open(settings: &Settings) -> Result<ContextGuard> {
        let wallet = Arc::new(InMemoryWallet::new(&settings.wallet.id));
        let (steward, verkey) = wallet
            .create_did(Some(settings.ledger.steward_seed.as_bytes()))
            .await?;
        let ledger = Arc::new(
            InMemoryLedger::with_steward(&settings.ledger.pool_name, steward, verkey)
                .with_visibility_lag(Duration::from_millis(settings.ledger.visibility_lag_ms)),
        );
        let timeouts = Timeouts {
            ledger: Duration::from_millis(settings.ledger.timeout_ms),
            wallet: Duration::from_millis(settings.wallet.timeout_ms),
        };
        Ok(ContextGuard {
            context: AgentContext::new(ledger, wallet, timeouts),
        })
    }
}

/// Owns an open context and closes it on drop.
pub struct ContextGuard {
    context: AgentContext,
}

impl ContextGuard {
    pub fn wrap(context: AgentContext) -> Self {
        ContextGuard { context }
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }
}

impl Deref for ContextGuard {
    type Target = AgentContext;

    fn deref(&self) -> &AgentContext {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        info!("releasing ledger pool and wallet");
        self.context.ledger.close();
        self.context.wallet.close();
    }
}
