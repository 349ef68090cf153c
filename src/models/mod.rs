// src/models/mod.rs
pub mod credential;
pub mod credential_definition;
pub mod did;
pub mod messages;
pub mod schema;

pub use credential::{AttributeValue, Credential, CredentialValues, StoredCredential};
pub use credential_definition::{CredentialDefinition, CredentialDefinitionId, DefinitionConfig};
pub use did::{Did, NymRecord, Role};
pub use messages::{
    CredentialOffer, CredentialRequest, CredentialRequestMetadata, ExchangeMessage, Nonce,
    RevocationWitnessUpdate,
};
pub use schema::{Schema, SchemaId};
