// src/lib.rs

//! # Anonymous credential engine
//!
//! Issues and stores blind-signed credentials against a replicated ledger.
//!
//! ## Architecture Overview
//! 1. **Ledger Layer**: `LedgerClient` contract, an in-memory pool, and NYM registration
//! 2. **Wallet Layer**: identity keys, link secrets, issuer keys, and the holder credential store
//! 3. **Services Layer**: schema registry, definition manager, issuance engine, verifier, HTTP API
//! 4. **Cryptography Layer**: the `CL` blind signature scheme over BN254
//!
//! Services take an explicit [`context::AgentContext`] instead of global
//! handles; [`context::ContextGuard`] closes the pool and wallet on drop.

pub mod config;
pub mod context;
pub mod error;
pub mod ledger;       // Ledger client contract and in-memory pool
pub mod models;       // Data structures and exchange messages
pub mod services;     // Registry, definitions, issuance, API
pub mod utils;        // Hashing, encoding, serialization helpers
pub mod wallet;       // Keys, secrets, credential storage
pub mod zkp;          // Blind signature schemes

pub use config::Settings;
pub use context::{AgentContext, ContextGuard, Timeouts};
pub use error::{AnoncredsError, Result};
