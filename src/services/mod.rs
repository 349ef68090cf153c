// src/services/mod.rs
pub mod api_server;
pub mod definition_manager;
pub mod issuance_engine;
pub mod schema_registry;
pub mod verifier;

pub use api_server::ApiServer;
pub use definition_manager::DefinitionManager;
pub use issuance_engine::{IssuanceEngine, IssuanceState};
pub use schema_registry::{LedgerSchema, SchemaRegistry};
pub use verifier::CredentialVerifier;
