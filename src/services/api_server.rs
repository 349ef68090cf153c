// src/services/api_server.rs
//! API Server for the credential agent
//!
//! REST surface over the issuer and holder operations. Protocol messages
//! travel in their versioned [`ExchangeMessage`] envelopes, so an HTTP
//! client can relay them between issuer and holder agents unchanged.
//!
//! Endpoints:
//! - `POST /dids` onboard an identity through the steward
//! - `POST /schemas`, `GET /schemas/:id`
//! - `POST /credential-definitions`, `GET /credential-definitions/:id`
//! - `POST /offers`, `POST /credentials`
//! - `POST /holder/link-secrets`, `POST /holder/requests`
//! - `POST /holder/credentials`, `GET /holder/credentials/:id`

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::context::AgentContext;
use crate::error::AnoncredsError;
use crate::ledger::DidRegistry;
use crate::models::{
    CredentialDefinition, CredentialDefinitionId, CredentialRequestMetadata, CredentialValues, DefinitionConfig,
    Did, ExchangeMessage, Role, Schema, SchemaId,
};
use crate::services::definition_manager::DefinitionManager;
use crate::services::issuance_engine::IssuanceEngine;
use crate::services::schema_registry::SchemaRegistry;
use crate::services::verifier::CredentialVerifier;
use crate::wallet::CredentialStore;
use crate::zkp::{SchemeRegistry, CL_SIGNATURE_TYPE};

// API request and response structures

/// Request payload for onboarding a new identity
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDidRequest {
    #[serde(default = "default_role")]
    role: Role,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDidResponse {
    did: Did,
    verkey: String,
}

/// Request payload for building and publishing a schema
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSchemaRequest {
    issuer_did: Did,
    name: String,
    version: String,
    attr_names: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaResponse {
    schema_id: SchemaId,
    schema: Schema,
    seq_no: u64,
}

/// Request payload for creating and publishing a credential definition
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDefinitionRequest {
    issuer_did: Did,
    schema_id: SchemaId,
    tag: String,
    #[serde(default = "default_signature_type")]
    signature_type: String,
    #[serde(default)]
    config: DefinitionConfig,
}

fn default_signature_type() -> String {
    CL_SIGNATURE_TYPE.to_string()
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionResponse {
    cred_def_id: CredentialDefinitionId,
    definition: CredentialDefinition,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOfferRequest {
    issuer_did: Did,
    cred_def_id: CredentialDefinitionId,
}

/// Issuer answers a relayed request with a credential
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCredentialRequest {
    issuer_did: Did,
    offer: ExchangeMessage,
    request: ExchangeMessage,
    values: CredentialValues,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkSecretRequest {
    id: String,
}

/// Holder answers a relayed offer
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCredentialRequestRequest {
    holder_did: Did,
    offer: ExchangeMessage,
    link_secret_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCredentialRequestResponse {
    request: ExchangeMessage,
    metadata: CredentialRequestMetadata,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreCredentialRequest {
    holder_did: Did,
    credential: ExchangeMessage,
    metadata: CredentialRequestMetadata,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreCredentialResponse {
    id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredentialResponse {
    id: String,
    values: CredentialValues,
}

/// Engine error carried to the HTTP boundary.
pub struct ApiError(AnoncredsError);

impl From<AnoncredsError> for ApiError {
    fn from(err: AnoncredsError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AnoncredsError::Validation(_)
            | AnoncredsError::UnsupportedSignatureType(_)
            | AnoncredsError::Serialization(_) => StatusCode::BAD_REQUEST,
            AnoncredsError::SchemaNotFound(_)
            | AnoncredsError::DefinitionNotFound(_)
            | AnoncredsError::CredentialNotFound(_)
            | AnoncredsError::LinkSecretNotFound(_)
            | AnoncredsError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            AnoncredsError::LedgerRejected { .. }
            | AnoncredsError::ProtocolSequence(_)
            | AnoncredsError::OfferAlreadyConsumed { .. } => StatusCode::CONFLICT,
            AnoncredsError::SignatureVerification(_) | AnoncredsError::AttributeEncodingMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AnoncredsError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AnoncredsError::ContextClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnoncredsError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// API server state containing all service dependencies
#[derive(Clone)]
pub struct ApiServer {
    context: AgentContext,
    /// Steward that onboards new identities
    steward: Did,
    dids: Arc<DidRegistry>,
    schemas: SchemaRegistry,
    definitions: DefinitionManager,
    engine: Arc<IssuanceEngine>,
    store: Arc<CredentialStore>,
    verifier: Arc<CredentialVerifier>,
    request_timeout: Duration,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `context` - Open ledger and wallet context
    /// * `steward` - DID in the wallet allowed to write NYM records
    /// * `request_timeout` - Deadline applied to every HTTP request
    pub fn new(context: AgentContext, steward: Did, request_timeout: Duration) -> Self {
        let schemes = SchemeRegistry::default();
        let definitions = DefinitionManager::new(context.clone(), schemes.clone());
        let store = Arc::new(CredentialStore::new(context.clone(), schemes.clone()));
        ApiServer {
            dids: Arc::new(DidRegistry::new(context.clone())),
            schemas: SchemaRegistry::new(context.clone()),
            engine: Arc::new(IssuanceEngine::new(context.clone(), schemes)),
            verifier: Arc::new(CredentialVerifier::new(definitions.clone(), store.clone())),
            definitions,
            store,
            context,
            steward,
            request_timeout,
        }
    }

    /// Builds the router with all API routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/dids", post(Self::create_did_handler))
            .route("/schemas", post(Self::create_schema_handler))
            .route("/schemas/:id", get(Self::get_schema_handler))
            .route("/credential-definitions", post(Self::create_definition_handler))
            .route("/credential-definitions/:id", get(Self::get_definition_handler))
            .route("/offers", post(Self::create_offer_handler))
            .route("/credentials", post(Self::issue_credential_handler))
            .route("/holder/link-secrets", post(Self::create_link_secret_handler))
            .route("/holder/requests", post(Self::create_request_handler))
            .route("/holder/credentials", post(Self::store_credential_handler))
            .route("/holder/credentials/:id", get(Self::get_credential_handler))
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, self.request_timeout))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and serves until the listener fails
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Identity and ledger handlers
    // =====================

    /// Creates a wallet identity and registers it on the ledger
    ///
    /// # Endpoint
    /// POST /dids
    async fn create_did_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateDidRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let (did, verkey) = state.dids.onboard(&state.steward, payload.role).await?;
        Ok((StatusCode::CREATED, Json(CreateDidResponse { did, verkey })))
    }

    /// Builds and publishes a schema; republishing an identical schema succeeds
    ///
    /// # Endpoint
    /// POST /schemas
    async fn create_schema_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateSchemaRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let (schema_id, schema) = state.schemas.create_schema(
            &payload.issuer_did,
            &payload.name,
            &payload.version,
            payload.attr_names.as_slice(),
        )?;
        let receipt = state.schemas.publish(&schema).await?.tolerate_identical()?;
        Ok((
            StatusCode::CREATED,
            Json(SchemaResponse { schema_id, schema, seq_no: receipt.seq_no }),
        ))
    }

    /// # Endpoint
    /// GET /schemas/:id
    async fn get_schema_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<String>,
    ) -> ApiResult<impl IntoResponse> {
        let id = SchemaId::parse(&id)?;
        let published = state.schemas.resolve(&id).await?;
        Ok(Json(SchemaResponse {
            schema_id: id,
            schema: published.schema,
            seq_no: published.seq_no,
        }))
    }

    /// Creates a definition over a published schema and publishes it
    ///
    /// # Endpoint
    /// POST /credential-definitions
    async fn create_definition_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateDefinitionRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let schema = state.schemas.resolve(&payload.schema_id).await?.schema;
        let (cred_def_id, definition, _) = state
            .definitions
            .create_definition(
                &payload.issuer_did,
                &schema,
                &payload.tag,
                &payload.signature_type,
                payload.config,
            )
            .await?;
        state.definitions.ensure_published(&cred_def_id).await?;
        Ok((StatusCode::CREATED, Json(DefinitionResponse { cred_def_id, definition })))
    }

    /// # Endpoint
    /// GET /credential-definitions/:id
    async fn get_definition_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<String>,
    ) -> ApiResult<impl IntoResponse> {
        let cred_def_id = CredentialDefinitionId::parse(&id)?;
        let definition = state.definitions.resolve(&cred_def_id).await?;
        Ok(Json(DefinitionResponse { cred_def_id, definition }))
    }

    // =====================
    // Issuer protocol handlers
    // =====================

    /// # Endpoint
    /// POST /offers
    async fn create_offer_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateOfferRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let offer = state.engine.create_offer(&payload.issuer_did, &payload.cred_def_id).await?;
        Ok((StatusCode::CREATED, Json(ExchangeMessage::Offer(offer))))
    }

    /// Takes in the holder's relayed request and signs it
    ///
    /// # Endpoint
    /// POST /credentials
    async fn issue_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<IssueCredentialRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let offer = payload.offer.into_offer()?;
        let request = payload.request.into_request()?;
        state.engine.receive_request(&payload.issuer_did, &offer, &request).await?;
        let credential = state
            .engine
            .create_credential(&payload.issuer_did, &offer, &request, &payload.values)
            .await?;
        Ok((StatusCode::CREATED, Json(ExchangeMessage::Credential(credential))))
    }

    // =====================
    // Holder handlers
    // =====================

    /// # Endpoint
    /// POST /holder/link-secrets
    async fn create_link_secret_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateLinkSecretRequest>,
    ) -> ApiResult<impl IntoResponse> {
        state
            .context
            .timeouts
            .wallet("wallet.create_link_secret", state.context.wallet.create_link_secret(&payload.id))
            .await?;
        Ok((StatusCode::CREATED, Json(json!({ "id": payload.id }))))
    }

    /// Takes in a relayed offer and answers it with a request, fetching the
    /// definition from the ledger
    ///
    /// # Endpoint
    /// POST /holder/requests
    async fn create_request_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateCredentialRequestRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let offer = payload.offer.into_offer()?;
        state.engine.receive_offer(&offer)?;
        let definition = state.definitions.resolve(&offer.cred_def_id).await?;
        let (request, metadata) = state
            .engine
            .create_request(&payload.holder_did, &offer, &definition, &payload.link_secret_id)
            .await?;
        Ok((
            StatusCode::CREATED,
            Json(CreateCredentialRequestResponse {
                request: ExchangeMessage::Request(request),
                metadata,
            }),
        ))
    }

    /// # Endpoint
    /// POST /holder/credentials
    async fn store_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<StoreCredentialRequest>,
    ) -> ApiResult<impl IntoResponse> {
        let credential = payload.credential.into_credential()?;
        let definition = state.definitions.resolve(&credential.cred_def_id).await?;
        let id = state
            .store
            .store(&payload.holder_did, credential, payload.metadata, definition)
            .await?;
        Ok((StatusCode::CREATED, Json(StoreCredentialResponse { id })))
    }

    /// Re-verifies a stored credential against the ledger and returns its values
    ///
    /// # Endpoint
    /// GET /holder/credentials/:id
    async fn get_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<String>,
    ) -> ApiResult<impl IntoResponse> {
        let values = state.verifier.verify_stored(&id).await?;
        Ok(Json(StoredCredentialResponse { id, values }))
    }
}
