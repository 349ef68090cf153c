// src/services/issuance_engine.rs
//! Issuance Protocol Engine
//!
//! Drives the three-message exchange that blind-signs attribute values into
//! a credential bound to the holder's link secret:
//!
//! ```text
//! issuer                      holder
//!   create_offer   ──offer──▶
//!                  ◀─request─   create_request
//!   create_credential ─credential─▶  (CredentialStore::store)
//! ```
//!
//! Every offer is its own flow, keyed by its nonce and moving
//! `Offered → Requested → Issued`. Flows never share bookkeeping, and the
//! `Requested → Issued` step is a single check-and-set under the flow table
//! lock, so of two racing `create_credential` calls on one offer exactly one
//! wins. All collaborator I/O happens before that step; a call that times out
//! or is cancelled leaves the flow untouched.
//!
//! Issuer and holder may run separate engines. Each side only trusts its own
//! records: the holder answers offers it created or took in through
//! [`IssuanceEngine::receive_offer`], and the issuer signs requests recorded
//! by its own `create_request` or by [`IssuanceEngine::receive_request`].

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::AgentContext;
use crate::error::{AnoncredsError, Result};
use crate::models::credential::{Credential, CredentialValues};
use crate::models::credential_definition::{CredentialDefinition, CredentialDefinitionId};
use crate::models::did::Did;
use crate::models::messages::{
    CredentialOffer, CredentialRequest, CredentialRequestMetadata, Nonce, RevocationWitnessUpdate,
};
use crate::utils::crypto::hash_data;
use crate::zkp::{IssuanceContext, SchemeRegistry};

/// Where a single offer's flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Offered,
    Requested,
    /// Terminal; the nonce is consumed
    Issued,
}

struct IssuanceFlow {
    offer: CredentialOffer,
    state: IssuanceState,
    /// Fingerprints of requests built against this offer
    requests: Vec<[u8; 32]>,
}

/// Issuer- and holder-side protocol steps.
pub struct IssuanceEngine {
    context: AgentContext,
    schemes: SchemeRegistry,
    /// Offers this engine made, as issuer
    flows: Mutex<HashMap<Nonce, IssuanceFlow>>,
    /// Offers relayed to this engine, as holder
    received: Mutex<HashMap<Nonce, CredentialOffer>>,
}

impl IssuanceEngine {
    pub fn new(context: AgentContext, schemes: SchemeRegistry) -> Self {
        IssuanceEngine {
            context,
            schemes,
            flows: Mutex::new(HashMap::new()),
            received: Mutex::new(HashMap::new()),
        }
    }

    fn flows(&self) -> MutexGuard<'_, HashMap<Nonce, IssuanceFlow>> {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn received(&self) -> MutexGuard<'_, HashMap<Nonce, CredentialOffer>> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of the flow opened by `nonce`, if any.
    pub fn state(&self, nonce: &Nonce) -> Option<IssuanceState> {
        self.flows().get(nonce).map(|flow| flow.state)
    }

    /// Opens a flow with a fresh, single-use nonce.
    ///
    /// # Arguments
    /// * `issuer` - DID issuing the credential
    /// * `definition_id` - Definition whose private key the issuer holds
    ///
    /// # Errors
    /// * `KeyNotFound` if the issuer's wallet holds no key for the definition
    /// * `Validation` if the definition belongs to another issuer
    pub async fn create_offer(&self, issuer: &Did, definition_id: &CredentialDefinitionId) -> Result<CredentialOffer> {
        let key = self
            .context
            .timeouts
            .wallet(
                "wallet.resolve_credential_key",
                self.context.wallet.resolve_credential_key(definition_id),
            )
            .await?;
        let definition = key.definition();
        if definition.issuer_id != *issuer {
            return Err(AnoncredsError::Validation(format!(
                "{} is owned by {}, not {}",
                definition_id, definition.issuer_id, issuer
            )));
        }

        let offer = CredentialOffer {
            schema_id: definition.schema_id.clone(),
            cred_def_id: definition_id.clone(),
            issuer_id: issuer.clone(),
            nonce: Nonce::generate(),
        };
        self.flows().insert(
            offer.nonce.clone(),
            IssuanceFlow {
                offer: offer.clone(),
                state: IssuanceState::Offered,
                requests: Vec::new(),
            },
        );
        debug!("offered {} with nonce {}", definition_id, offer.nonce);
        Ok(offer)
    }

    /// Records an offer relayed from another agent so this holder may answer
    /// it. Receiving the same offer twice is a no-op.
    ///
    /// # Errors
    /// * `ProtocolSequence` if a different offer with the same nonce was
    ///   already received
    pub fn receive_offer(&self, offer: &CredentialOffer) -> Result<()> {
        let mut received = self.received();
        if let Some(known) = received.get(&offer.nonce) {
            if known != offer {
                return Err(AnoncredsError::ProtocolSequence(format!(
                    "offer {} conflicts with one already received",
                    offer.nonce
                )));
            }
            return Ok(());
        }
        debug!("received offer {} for {}", offer.nonce, offer.cred_def_id);
        received.insert(offer.nonce.clone(), offer.clone());
        Ok(())
    }

    /// Builds the holder's request: a blinded commitment to the link secret
    /// and its proof of correct formation, bound to this offer and holder.
    ///
    /// # Arguments
    /// * `holder` - DID the credential is requested under
    /// * `offer` - Offer being answered
    /// * `definition` - Public definition named by the offer
    /// * `link_secret_id` - Holder link secret reference in the wallet
    ///
    /// # Returns
    /// The request for the issuer and the metadata the holder must keep to
    /// unblind the credential later.
    ///
    /// # Errors
    /// * `ProtocolSequence` if the offer was neither created nor received here
    /// * `OfferAlreadyConsumed` if the offer already produced a credential
    /// * `LinkSecretNotFound` if `link_secret_id` does not resolve
    /// * `Validation` / `Crypto` for a definition that does not match the
    ///   offer or carries a malformed key
    pub async fn create_request(
        &self,
        holder: &Did,
        offer: &CredentialOffer,
        definition: &CredentialDefinition,
        link_secret_id: &str,
    ) -> Result<(CredentialRequest, CredentialRequestMetadata)> {
        if definition.id != offer.cred_def_id || definition.schema_id != offer.schema_id {
            return Err(AnoncredsError::Validation(format!(
                "definition {} does not match offer for {}",
                definition.id, offer.cred_def_id
            )));
        }
        let issued_here = self.check_answerable(offer)?;

        let scheme = self.schemes.get(&definition.signature_type)?;
        scheme.check_public_key(&definition.public_key)?;
        let link_secret = self
            .context
            .timeouts
            .wallet(
                "wallet.resolve_link_secret",
                self.context.wallet.resolve_link_secret(link_secret_id),
            )
            .await?;

        let context = IssuanceContext {
            definition_id: offer.cred_def_id.as_str(),
            nonce: offer.nonce.as_str(),
            holder_did: holder.as_str(),
        };
        let (blinded, factors) = scheme.blind_link_secret(&definition.public_key, &link_secret, context)?;

        let request = CredentialRequest {
            prover_did: holder.clone(),
            cred_def_id: offer.cred_def_id.clone(),
            blinded_link_secret: blinded,
            nonce: offer.nonce.clone(),
        };
        let metadata = CredentialRequestMetadata {
            link_secret_id: link_secret_id.to_string(),
            blinding_factors: factors,
            nonce: offer.nonce.clone(),
            cred_def_id: offer.cred_def_id.clone(),
            prover_did: holder.clone(),
        };

        if issued_here {
            let fingerprint = fingerprint(&request)?;
            let mut flows = self.flows();
            let flow = live_flow(&mut flows, offer)?;
            flow.requests.push(fingerprint);
            flow.state = IssuanceState::Requested;
        }
        debug!("{} requested {} against nonce {}", holder, offer.cred_def_id, offer.nonce);
        Ok((request, metadata))
    }

    /// Records a request relayed from a holder against an offer this issuer
    /// made, after checking its blinding proof. Receiving a request that is
    /// already recorded is a no-op.
    ///
    /// # Errors
    /// * `ProtocolSequence` if the request does not answer a live offer
    /// * `OfferAlreadyConsumed` if the offer already produced a credential
    /// * `SignatureVerification` if the blinding proof does not verify
    pub async fn receive_request(&self, issuer: &Did, offer: &CredentialOffer, request: &CredentialRequest) -> Result<()> {
        check_answers(issuer, offer, request)?;
        let key = self
            .context
            .timeouts
            .wallet(
                "wallet.resolve_credential_key",
                self.context.wallet.resolve_credential_key(&offer.cred_def_id),
            )
            .await?;
        let definition = key.definition();
        self.schemes
            .get(&definition.signature_type)?
            .verify_blinded_secret(&definition.public_key, &request.blinded_link_secret, request_context(request))?;

        let fingerprint = fingerprint(request)?;
        let mut flows = self.flows();
        let flow = live_flow(&mut flows, offer)?;
        if !flow.requests.contains(&fingerprint) {
            flow.requests.push(fingerprint);
        }
        flow.state = IssuanceState::Requested;
        debug!("received request from {} for offer {}", request.prover_did, offer.nonce);
        Ok(())
    }

    /// Signs the request's blinded secret together with `values` and
    /// consumes the offer.
    ///
    /// # Arguments
    /// * `issuer` - DID that created the offer
    /// * `offer` - Offer the request answers
    /// * `request` - Holder's request
    /// * `values` - Raw and encoded value for every schema attribute
    ///
    /// # Errors
    /// * `ProtocolSequence` if the request does not answer this offer or no
    ///   such request was recorded
    /// * `OfferAlreadyConsumed` if the offer already produced a credential
    /// * `AttributeEncodingMismatch` for missing, extra, or non-canonical values
    /// * `SignatureVerification` if the blinding proof does not verify
    pub async fn create_credential(
        &self,
        issuer: &Did,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &CredentialValues,
    ) -> Result<Credential> {
        check_answers(issuer, offer, request)?;

        let key = self
            .context
            .timeouts
            .wallet(
                "wallet.resolve_credential_key",
                self.context.wallet.resolve_credential_key(&offer.cred_def_id),
            )
            .await?;
        let definition = key.definition();
        let scheme = self.schemes.get(&definition.signature_type)?;

        values.check_against(definition.attributes())?;
        let encoded = values.encoded_in_order(definition.attributes())?;

        scheme.verify_blinded_secret(&definition.public_key, &request.blinded_link_secret, request_context(request))?;
        let fingerprint = fingerprint(request)?;

        let signature = {
            let mut flows = self.flows();
            let flow = live_flow(&mut flows, offer)?;
            if !flow.requests.contains(&fingerprint) {
                return Err(AnoncredsError::ProtocolSequence(format!(
                    "no request from {} was recorded for offer {}",
                    request.prover_did, offer.nonce
                )));
            }
            let signature = scheme.sign(&definition.public_key, key.key(), &request.blinded_link_secret, &encoded)?;
            flow.state = IssuanceState::Issued;
            flow.requests.clear();
            signature
        };

        info!("issued {} credential to {}", offer.cred_def_id, request.prover_did);
        Ok(Credential {
            schema_id: definition.schema_id.clone(),
            cred_def_id: definition.id.clone(),
            values: values.clone(),
            signature,
            rev_reg_id: None,
        })
    }

    /// Reserved fourth step of a revocable flow. No definition this engine
    /// creates is revocable, so every witness update is refused.
    pub fn accept_revocation_witness(&self, update: &RevocationWitnessUpdate) -> Result<()> {
        warn!("refusing revocation witness for {}", update.cred_def_id);
        Err(AnoncredsError::Validation(format!(
            "{} does not support revocation",
            update.cred_def_id
        )))
    }

    /// Whether the holder may answer `offer`. Returns true when this engine
    /// made the offer itself, so the request is recorded in its own flow.
    fn check_answerable(&self, offer: &CredentialOffer) -> Result<bool> {
        {
            let mut flows = self.flows();
            if flows.contains_key(&offer.nonce) {
                return live_flow(&mut flows, offer).map(|_| true);
            }
        }
        match self.received().get(&offer.nonce) {
            Some(known) if known == offer => Ok(false),
            Some(_) => Err(AnoncredsError::ProtocolSequence(format!(
                "offer {} does not match the one received",
                offer.nonce
            ))),
            None => Err(AnoncredsError::ProtocolSequence(format!(
                "no offer with nonce {} was created or received",
                offer.nonce
            ))),
        }
    }
}

/// Stateless checks that `request` answers `offer` made by `issuer`.
fn check_answers(issuer: &Did, offer: &CredentialOffer, request: &CredentialRequest) -> Result<()> {
    if request.nonce != offer.nonce || request.cred_def_id != offer.cred_def_id {
        return Err(AnoncredsError::ProtocolSequence(format!(
            "request for {} / {} does not answer offer {}",
            request.cred_def_id, request.nonce, offer.nonce
        )));
    }
    if offer.issuer_id != *issuer {
        return Err(AnoncredsError::Validation(format!(
            "offer {} was made by {}, not {}",
            offer.nonce, offer.issuer_id, issuer
        )));
    }
    Ok(())
}

fn request_context(request: &CredentialRequest) -> IssuanceContext<'_> {
    IssuanceContext {
        definition_id: request.cred_def_id.as_str(),
        nonce: request.nonce.as_str(),
        holder_did: request.prover_did.as_str(),
    }
}

/// Looks up the flow for `offer` and checks it can still advance.
fn live_flow<'a>(flows: &'a mut HashMap<Nonce, IssuanceFlow>, offer: &CredentialOffer) -> Result<&'a mut IssuanceFlow> {
    let flow = flows.get_mut(&offer.nonce).ok_or_else(|| {
        AnoncredsError::ProtocolSequence(format!("no offer with nonce {} was created", offer.nonce))
    })?;
    if flow.offer != *offer {
        return Err(AnoncredsError::ProtocolSequence(format!(
            "offer {} does not match the one issued",
            offer.nonce
        )));
    }
    if flow.state == IssuanceState::Issued {
        return Err(AnoncredsError::OfferAlreadyConsumed {
            nonce: offer.nonce.to_string(),
        });
    }
    Ok(flow)
}

fn fingerprint(request: &CredentialRequest) -> Result<[u8; 32]> {
    Ok(hash_data(&serde_json::to_vec(request)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::ContextGuard;
    use crate::ledger::DidRegistry;
    use crate::models::credential_definition::DefinitionConfig;
    use crate::models::did::Role;
    use crate::models::messages::ExchangeMessage;
    use crate::services::definition_manager::DefinitionManager;
    use crate::services::schema_registry::SchemaRegistry;
    use crate::wallet::key_management::KeyHandle;
    use crate::wallet::LinkSecretHandle;
    use crate::zkp::{ClScheme, SignatureScheme, CL_SIGNATURE_TYPE};

    struct Fixture {
        guard: ContextGuard,
        issuer: Did,
        holder: Did,
        definition: CredentialDefinition,
    }

    async fn fixture() -> Fixture {
        let settings = Settings::default();
        let steward = KeyHandle::from_seed(settings.ledger.steward_seed.as_bytes()).unwrap();
        let guard = AgentContext::open(&settings).await.unwrap();
        let context = guard.context().clone();
        let dids = DidRegistry::new(context.clone());
        let (issuer, _) = dids.onboard(steward.did(), Role::Endorser).await.unwrap();
        let (holder, _) = context.wallet.create_did(None).await.unwrap();
        context.wallet.create_link_secret("main").await.unwrap();

        let schemas = SchemaRegistry::new(context.clone());
        let (_, schema) = schemas.create_schema(&issuer, "gvt", "1.0", &["age", "name"]).unwrap();
        schemas.publish(&schema).await.unwrap();
        let (_, definition, _) = DefinitionManager::new(context, SchemeRegistry::default())
            .create_definition(&issuer, &schema, "TAG1", CL_SIGNATURE_TYPE, DefinitionConfig::default())
            .await
            .unwrap();
        Fixture { guard, issuer, holder, definition }
    }

    fn values() -> CredentialValues {
        CredentialValues::new().with("age", "28").with("name", "Alex")
    }

    #[tokio::test]
    async fn test_states_advance_in_order() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());

        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Offered));

        let (request, _) = engine.create_request(&f.holder, &offer, &f.definition, "main").await.unwrap();
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Requested));

        let credential = engine.create_credential(&f.issuer, &offer, &request, &values()).await.unwrap();
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Issued));
        assert_eq!(credential.schema_id, f.definition.schema_id);
        assert!(credential.rev_reg_id.is_none());
    }

    #[tokio::test]
    async fn test_request_without_offer_is_out_of_sequence() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let forged = CredentialOffer {
            schema_id: f.definition.schema_id.clone(),
            cred_def_id: f.definition.id.clone(),
            issuer_id: f.issuer.clone(),
            nonce: Nonce::generate(),
        };
        assert!(matches!(
            engine.create_request(&f.holder, &forged, &f.definition, "main").await,
            Err(AnoncredsError::ProtocolSequence(_))
        ));
    }

    #[tokio::test]
    async fn test_credential_without_request_is_out_of_sequence() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();

        // Well-formed request for this offer that never went through create_request.
        let secret = LinkSecretHandle::generate("side");
        let context = IssuanceContext {
            definition_id: offer.cred_def_id.as_str(),
            nonce: offer.nonce.as_str(),
            holder_did: f.holder.as_str(),
        };
        let (blinded, _) = ClScheme
            .blind_link_secret(&f.definition.public_key, &secret, context)
            .unwrap();
        let request = CredentialRequest {
            prover_did: f.holder.clone(),
            cred_def_id: offer.cred_def_id.clone(),
            blinded_link_secret: blinded,
            nonce: offer.nonce.clone(),
        };
        assert!(matches!(
            engine.create_credential(&f.issuer, &offer, &request, &values()).await,
            Err(AnoncredsError::ProtocolSequence(_))
        ));
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Offered));
    }

    #[tokio::test]
    async fn test_second_credential_on_offer_is_consumed() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        let (request, _) = engine.create_request(&f.holder, &offer, &f.definition, "main").await.unwrap();

        engine.create_credential(&f.issuer, &offer, &request, &values()).await.unwrap();
        assert!(matches!(
            engine.create_credential(&f.issuer, &offer, &request, &values()).await,
            Err(AnoncredsError::OfferAlreadyConsumed { .. })
        ));
        assert!(matches!(
            engine.create_request(&f.holder, &offer, &f.definition, "main").await,
            Err(AnoncredsError::OfferAlreadyConsumed { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_canonical_values_rejected_without_consuming() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        let (request, _) = engine.create_request(&f.holder, &offer, &f.definition, "main").await.unwrap();

        let bad = CredentialValues::new().with_encoded("age", "28", "29").with("name", "Alex");
        assert!(matches!(
            engine.create_credential(&f.issuer, &offer, &request, &bad).await,
            Err(AnoncredsError::AttributeEncodingMismatch { .. })
        ));
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Requested));
        assert!(engine.create_credential(&f.issuer, &offer, &request, &values()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_link_secret() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        assert!(matches!(
            engine.create_request(&f.holder, &offer, &f.definition, "nope").await,
            Err(AnoncredsError::LinkSecretNotFound(_))
        ));
        assert_eq!(engine.state(&offer.nonce), Some(IssuanceState::Offered));
    }

    #[tokio::test]
    async fn test_request_lifted_to_other_holder_fails_proof() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        let (request, _) = engine.create_request(&f.holder, &offer, &f.definition, "main").await.unwrap();

        let thief = KeyHandle::generate();
        let lifted = CredentialRequest { prover_did: thief.did().clone(), ..request };
        assert!(matches!(
            engine.create_credential(&f.issuer, &offer, &lifted, &values()).await,
            Err(AnoncredsError::SignatureVerification(_))
        ));
    }

    #[tokio::test]
    async fn test_separate_engines_exchange_relayed_messages() {
        let f = fixture().await;
        let issuer_engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let holder_guard = AgentContext::open(&Settings::default()).await.unwrap();
        let (holder, _) = holder_guard.wallet.create_did(None).await.unwrap();
        holder_guard.wallet.create_link_secret("main").await.unwrap();
        let holder_engine = IssuanceEngine::new(holder_guard.context().clone(), SchemeRegistry::default());

        let offer = issuer_engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        let wire = ExchangeMessage::Offer(offer.clone()).to_json().unwrap();
        let relayed = ExchangeMessage::from_json(&wire).unwrap().into_offer().unwrap();

        assert!(matches!(
            holder_engine.create_request(&holder, &relayed, &f.definition, "main").await,
            Err(AnoncredsError::ProtocolSequence(_))
        ));
        holder_engine.receive_offer(&relayed).unwrap();
        holder_engine.receive_offer(&relayed).unwrap();
        let (request, _) = holder_engine
            .create_request(&holder, &relayed, &f.definition, "main")
            .await
            .unwrap();
        assert_eq!(holder_engine.state(&offer.nonce), None);
        assert_eq!(issuer_engine.state(&offer.nonce), Some(IssuanceState::Offered));

        // The issuer has not seen the request yet.
        assert!(matches!(
            issuer_engine.create_credential(&f.issuer, &offer, &request, &values()).await,
            Err(AnoncredsError::ProtocolSequence(_))
        ));
        issuer_engine.receive_request(&f.issuer, &offer, &request).await.unwrap();
        assert_eq!(issuer_engine.state(&offer.nonce), Some(IssuanceState::Requested));

        issuer_engine.create_credential(&f.issuer, &offer, &request, &values()).await.unwrap();
        assert!(matches!(
            issuer_engine.receive_request(&f.issuer, &offer, &request).await,
            Err(AnoncredsError::OfferAlreadyConsumed { .. })
        ));
    }

    #[tokio::test]
    async fn test_received_offer_cannot_be_swapped() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = CredentialOffer {
            schema_id: f.definition.schema_id.clone(),
            cred_def_id: f.definition.id.clone(),
            issuer_id: f.issuer.clone(),
            nonce: Nonce::generate(),
        };
        engine.receive_offer(&offer).unwrap();

        let swapped = CredentialOffer { issuer_id: f.holder.clone(), ..offer.clone() };
        assert!(matches!(engine.receive_offer(&swapped), Err(AnoncredsError::ProtocolSequence(_))));
        assert!(matches!(
            engine.create_request(&f.holder, &swapped, &f.definition, "main").await,
            Err(AnoncredsError::ProtocolSequence(_))
        ));
    }

    #[tokio::test]
    async fn test_relayed_request_with_bad_proof_is_not_recorded() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        let offer = engine.create_offer(&f.issuer, &f.definition.id).await.unwrap();
        let (request, _) = engine.create_request(&f.holder, &offer, &f.definition, "main").await.unwrap();

        let lifted = CredentialRequest { prover_did: KeyHandle::generate().did().clone(), ..request };
        assert!(matches!(
            engine.receive_request(&f.issuer, &offer, &lifted).await,
            Err(AnoncredsError::SignatureVerification(_))
        ));
    }

    #[tokio::test]
    async fn test_offer_requires_owned_definition() {
        let f = fixture().await;
        let engine = IssuanceEngine::new(f.guard.context().clone(), SchemeRegistry::default());
        assert!(matches!(
            engine.create_offer(&f.holder, &f.definition.id).await,
            Err(AnoncredsError::Validation(_))
        ));
    }

    #[test]
    fn test_revocation_witness_is_refused() {
        let update = RevocationWitnessUpdate {
            cred_def_id: CredentialDefinitionId::new(&Did::from_verkey(b"i"), "CL", 1, "TAG1"),
            rev_reg_id: "reg".into(),
            witness: serde_json::json!({}),
        };
        let engine = tokio_test::block_on(async {
            let guard = AgentContext::open(&Settings::default()).await.unwrap();
            IssuanceEngine::new(guard.context().clone(), SchemeRegistry::default())
        });
        assert!(engine.accept_revocation_witness(&update).is_err());
    }
}
