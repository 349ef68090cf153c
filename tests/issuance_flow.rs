// tests/issuance_flow.rs
//! End-to-end issuance against an in-memory pool and wallet.

use std::sync::Arc;
use std::time::Duration;

use did_anoncreds::ledger::DidRegistry;
use did_anoncreds::models::{
    CredentialDefinition, CredentialDefinitionId, CredentialOffer, CredentialValues, DefinitionConfig, Did,
    ExchangeMessage, Nonce, Role, Schema,
};
use did_anoncreds::services::{CredentialVerifier, DefinitionManager, IssuanceEngine, IssuanceState, SchemaRegistry};
use did_anoncreds::utils::encoding::encode_attribute;
use did_anoncreds::wallet::{CredentialStore, KeyHandle};
use did_anoncreds::zkp::{SchemeRegistry, CL_SIGNATURE_TYPE};
use did_anoncreds::{AgentContext, AnoncredsError, ContextGuard, Settings};

struct Agent {
    guard: ContextGuard,
    issuer: Did,
    holder: Did,
    schema: Schema,
    definition: CredentialDefinition,
    definitions: DefinitionManager,
    engine: Arc<IssuanceEngine>,
    store: Arc<CredentialStore>,
}

/// Steward onboards an issuer; the issuer publishes the gvt schema and a
/// TAG1 CL definition; the holder gets an identity and a link secret.
async fn gvt_agent() -> Agent {
    let settings = Settings::default();
    let steward = KeyHandle::from_seed(settings.ledger.steward_seed.as_bytes()).unwrap();
    let guard = AgentContext::open(&settings).await.unwrap();
    let context = guard.context().clone();

    let (issuer, _) = DidRegistry::new(context.clone())
        .onboard(steward.did(), Role::Endorser)
        .await
        .unwrap();
    let (holder, _) = context.wallet.create_did(None).await.unwrap();
    context.wallet.create_link_secret("link-secret").await.unwrap();

    let schemas = SchemaRegistry::new(context.clone());
    let (_, schema) = schemas
        .create_schema(&issuer, "gvt", "1.0", &["age", "sex", "height", "name"])
        .unwrap();
    schemas.publish(&schema).await.unwrap().require_created().unwrap();

    let definitions = DefinitionManager::new(context.clone(), SchemeRegistry::default());
    let (_, definition, _) = definitions
        .create_definition(&issuer, &schema, "TAG1", CL_SIGNATURE_TYPE, DefinitionConfig { support_revocation: false })
        .await
        .unwrap();
    definitions.publish(&definition).await.unwrap().tolerate_identical().unwrap();

    Agent {
        engine: Arc::new(IssuanceEngine::new(context.clone(), SchemeRegistry::default())),
        store: Arc::new(CredentialStore::new(context, SchemeRegistry::default())),
        guard,
        issuer,
        holder,
        schema,
        definition,
        definitions,
    }
}

fn gvt_values() -> CredentialValues {
    CredentialValues::new()
        .with_encoded("age", "28", "28")
        .with("sex", "male")
        .with("height", "175")
        .with("name", "Alex")
}

#[tokio::test]
async fn gvt_scenario_issues_stores_verifies_and_refuses_replay() {
    let agent = gvt_agent().await;
    assert_eq!(agent.definition.schema_id, agent.schema.id);

    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();

    // The offer crosses the process boundary as a versioned message.
    let wire = ExchangeMessage::Offer(offer.clone()).to_json().unwrap();
    let received = ExchangeMessage::from_json(&wire).unwrap().into_offer().unwrap();
    assert_eq!(received, offer);

    let (request, metadata) = agent
        .engine
        .create_request(&agent.holder, &received, &agent.definition, "link-secret")
        .await
        .unwrap();
    let credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &request, &gvt_values())
        .await
        .unwrap();
    assert_eq!(credential.values.get("age").unwrap().encoded, "28");

    let id = agent
        .store
        .store(&agent.holder, credential, metadata, agent.definition.clone())
        .await
        .unwrap();
    let verifier = CredentialVerifier::new(agent.definitions.clone(), agent.store.clone());
    let verified = verifier.verify_stored(&id).await.unwrap();
    assert_eq!(verified, gvt_values());

    let replay = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await;
    assert!(matches!(replay, Err(AnoncredsError::OfferAlreadyConsumed { .. })));
    assert!(matches!(
        agent.engine.create_credential(&agent.issuer, &offer, &request, &gvt_values()).await,
        Err(AnoncredsError::OfferAlreadyConsumed { .. })
    ));
}

#[tokio::test]
async fn concurrent_credentials_on_one_offer_have_one_winner() {
    let agent = gvt_agent().await;
    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (request, _) = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = agent.engine.clone();
            let issuer = agent.issuer.clone();
            let offer = offer.clone();
            let request = request.clone();
            tokio::spawn(async move { engine.create_credential(&issuer, &offer, &request, &gvt_values()).await })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AnoncredsError::OfferAlreadyConsumed { .. })));
    assert_eq!(agent.engine.state(&offer.nonce), Some(IssuanceState::Issued));
}

#[tokio::test]
async fn parallel_flows_on_one_definition_stay_isolated() {
    let agent = gvt_agent().await;
    let context = agent.guard.context().clone();
    let (second_holder, _) = context.wallet.create_did(None).await.unwrap();

    let first = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let second = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    assert_ne!(first.nonce, second.nonce);

    let (r1, _) = agent
        .engine
        .create_request(&agent.holder, &first, &agent.definition, "link-secret")
        .await
        .unwrap();
    let (r2, _) = agent
        .engine
        .create_request(&second_holder, &second, &agent.definition, "link-secret")
        .await
        .unwrap();

    agent.engine.create_credential(&agent.issuer, &first, &r1, &gvt_values()).await.unwrap();
    assert_eq!(agent.engine.state(&second.nonce), Some(IssuanceState::Requested));
    agent.engine.create_credential(&agent.issuer, &second, &r2, &gvt_values()).await.unwrap();
}

#[tokio::test]
async fn request_without_offer_is_a_sequence_error() {
    let agent = gvt_agent().await;
    let never_offered = CredentialOffer {
        schema_id: agent.schema.id.clone(),
        cred_def_id: agent.definition.id.clone(),
        issuer_id: agent.issuer.clone(),
        nonce: Nonce::generate(),
    };
    let result = agent
        .engine
        .create_request(&agent.holder, &never_offered, &agent.definition, "link-secret")
        .await;
    assert!(matches!(result, Err(AnoncredsError::ProtocolSequence(_))));
}

#[tokio::test]
async fn mutated_encoded_value_fails_verification_at_store() {
    let agent = gvt_agent().await;
    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (request, metadata) = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await
        .unwrap();
    let mut credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &request, &gvt_values())
        .await
        .unwrap();

    credential.values = credential.values.with_encoded("age", "28", "29");
    let result = agent
        .store
        .store(&agent.holder, credential, metadata, agent.definition.clone())
        .await;
    assert!(matches!(result, Err(AnoncredsError::SignatureVerification(_))));
    assert_eq!(agent.store.count(), 0);
}

#[tokio::test]
async fn non_canonical_encoded_value_fails_verification_at_store() {
    let agent = gvt_agent().await;
    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (request, metadata) = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await
        .unwrap();
    let mut credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &request, &gvt_values())
        .await
        .unwrap();

    // Same integer, different spelling.
    credential.values = credential.values.with_encoded("age", "28", "028");
    let result = agent
        .store
        .store(&agent.holder, credential, metadata, agent.definition.clone())
        .await;
    assert!(matches!(result, Err(AnoncredsError::SignatureVerification(_))));
    assert_eq!(agent.store.count(), 0);
}

#[tokio::test]
async fn mutated_raw_value_fails_encoding_check_at_store() {
    let agent = gvt_agent().await;
    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (request, metadata) = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await
        .unwrap();
    let mut credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &request, &gvt_values())
        .await
        .unwrap();

    credential.values = credential.values.with_encoded("name", "Mallory", encode_attribute("Alex"));
    let result = agent
        .store
        .store(&agent.holder, credential, metadata, agent.definition.clone())
        .await;
    assert!(matches!(result, Err(AnoncredsError::AttributeEncodingMismatch { .. })));
}

#[tokio::test]
async fn store_requires_matching_metadata() {
    let agent = gvt_agent().await;
    let first = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let second = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (r1, _) = agent
        .engine
        .create_request(&agent.holder, &first, &agent.definition, "link-secret")
        .await
        .unwrap();
    let (_, other_metadata) = agent
        .engine
        .create_request(&agent.holder, &second, &agent.definition, "link-secret")
        .await
        .unwrap();
    let credential = agent
        .engine
        .create_credential(&agent.issuer, &first, &r1, &gvt_values())
        .await
        .unwrap();

    let stranger = Did::from_verkey(b"someone else");
    let result = agent
        .store
        .store(&stranger, credential.clone(), other_metadata.clone(), agent.definition.clone())
        .await;
    assert!(matches!(result, Err(AnoncredsError::Validation(_))));

    // Blinding factors from another request cannot unblind this signature.
    let result = agent
        .store
        .store(&agent.holder, credential, other_metadata, agent.definition.clone())
        .await;
    assert!(matches!(result, Err(AnoncredsError::SignatureVerification(_))));
}

#[tokio::test]
async fn rederive_recovers_identical_values() {
    let agent = gvt_agent().await;
    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let (request, metadata) = agent
        .engine
        .create_request(&agent.holder, &offer, &agent.definition, "link-secret")
        .await
        .unwrap();
    let credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &request, &gvt_values())
        .await
        .unwrap();
    let id = agent
        .store
        .store(&agent.holder, credential, metadata, agent.definition.clone())
        .await
        .unwrap();

    assert_eq!(agent.store.rederive(&id).await.unwrap(), gvt_values());
    assert_eq!(agent.store.list(&agent.holder).len(), 1);
    assert!(agent.store.remove(&id));
    assert!(matches!(agent.store.rederive(&id).await, Err(AnoncredsError::CredentialNotFound(_))));
}

#[tokio::test]
async fn definition_requires_visible_schema() {
    let mut settings = Settings::default();
    settings.ledger.visibility_lag_ms = 50;
    let steward = KeyHandle::from_seed(settings.ledger.steward_seed.as_bytes()).unwrap();
    let guard = AgentContext::open(&settings).await.unwrap();
    let context = guard.context().clone();
    let (issuer, _) = DidRegistry::new(context.clone())
        .onboard(steward.did(), Role::Endorser)
        .await
        .unwrap();

    let schemas = SchemaRegistry::new(context.clone());
    let (schema_id, schema) = schemas.create_schema(&issuer, "gvt", "1.0", &["age", "name"]).unwrap();
    schemas.publish(&schema).await.unwrap();

    let definitions = DefinitionManager::new(context, SchemeRegistry::default());
    let early = definitions
        .create_definition(&issuer, &schema, "TAG1", CL_SIGNATURE_TYPE, DefinitionConfig::default())
        .await;
    assert!(matches!(early, Err(AnoncredsError::SchemaNotFound(_))));

    tokio::time::sleep(Duration::from_millis(80)).await;
    let (id, definition, _) = definitions
        .create_definition(&issuer, &schema, "TAG1", CL_SIGNATURE_TYPE, DefinitionConfig::default())
        .await
        .unwrap();
    definitions.publish(&definition).await.unwrap().require_created().unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let resolved = definitions.resolve(&id).await.unwrap();
    assert_eq!(resolved.schema_id, schema_id);
}

#[tokio::test]
async fn crash_between_publishes_is_recovered_by_requery() {
    let agent = gvt_agent().await;

    // Definition created and held in the wallet but never published.
    let (id, _, _) = agent
        .definitions
        .create_definition(&agent.issuer, &agent.schema, "TAG2", CL_SIGNATURE_TYPE, DefinitionConfig::default())
        .await
        .unwrap();
    assert!(matches!(agent.definitions.resolve(&id).await, Err(AnoncredsError::DefinitionNotFound(_))));

    let receipt = agent.definitions.ensure_published(&id).await.unwrap();
    let again = agent.definitions.ensure_published(&id).await.unwrap();
    assert_eq!(receipt, again);

    let unknown = CredentialDefinitionId::new(&agent.issuer, CL_SIGNATURE_TYPE, 999, "TAG9");
    assert!(matches!(
        agent.definitions.ensure_published(&unknown).await,
        Err(AnoncredsError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn closed_context_refuses_further_work() {
    let agent = gvt_agent().await;
    let engine = agent.engine.clone();
    let issuer = agent.issuer.clone();
    let definition_id = agent.definition.id.clone();
    drop(agent);

    assert!(matches!(
        engine.create_offer(&issuer, &definition_id).await,
        Err(AnoncredsError::ContextClosed("wallet"))
    ));
}

#[tokio::test]
async fn issuer_and_holder_agents_exchange_relayed_messages() {
    let agent = gvt_agent().await;

    let holder_guard = AgentContext::open(&Settings::default()).await.unwrap();
    let holder_context = holder_guard.context().clone();
    let (holder, _) = holder_context.wallet.create_did(None).await.unwrap();
    holder_context.wallet.create_link_secret("main").await.unwrap();
    let holder_engine = IssuanceEngine::new(holder_context.clone(), SchemeRegistry::default());
    let holder_store = CredentialStore::new(holder_context, SchemeRegistry::default());

    fn relay(message: ExchangeMessage) -> ExchangeMessage {
        ExchangeMessage::from_json(&message.to_json().unwrap()).unwrap()
    }

    let offer = agent.engine.create_offer(&agent.issuer, &agent.definition.id).await.unwrap();
    let received = relay(ExchangeMessage::Offer(offer.clone())).into_offer().unwrap();
    holder_engine.receive_offer(&received).unwrap();
    let (request, metadata) = holder_engine
        .create_request(&holder, &received, &agent.definition, "main")
        .await
        .unwrap();

    let relayed_request = relay(ExchangeMessage::Request(request)).into_request().unwrap();
    agent
        .engine
        .receive_request(&agent.issuer, &offer, &relayed_request)
        .await
        .unwrap();
    let credential = agent
        .engine
        .create_credential(&agent.issuer, &offer, &relayed_request, &gvt_values())
        .await
        .unwrap();

    let delivered = relay(ExchangeMessage::Credential(credential)).into_credential().unwrap();
    let id = holder_store
        .store(&holder, delivered, metadata, agent.definition.clone())
        .await
        .unwrap();
    assert_eq!(holder_store.rederive(&id).await.unwrap(), gvt_values());
}
