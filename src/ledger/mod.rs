// src/ledger/mod.rs
pub mod client;
pub mod did_registry;
pub mod memory;

pub use client::{
    LedgerClient, LedgerEntry, LedgerOperation, LedgerQuery, LedgerReply, LedgerRequest, PublishOutcome,
    Receipt, RejectReason, Rejection, SignedRequest,
};
pub use did_registry::DidRegistry;
pub use memory::InMemoryLedger;
