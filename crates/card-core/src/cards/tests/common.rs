use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::cards::audit::AuditEvent;
use crate::cards::domain::{
    AccountRecord, AccountReference, CallerContext, CardReference, CardState, CardStatus,
    Eligibility, EntitledCard, EntitledOperation, LegalName, PartyId, PartyProfile, PartyRecord,
    PersonaId, PlasticType, PostalAddress, ReplacementOrder, StatusReason,
};
use crate::cards::error::GatewayError;
use crate::cards::gateway::{
    AccountGateway, AuditPublisher, CardEvent, CardGateway, Collaborators, EntitlementGateway,
    EventPublisher, Notification, NotificationPublisher, PartyGateway, PinGateway,
};
use crate::cards::settings::{FixedClock, ReplacementToggles};
use crate::cards::CardService;

pub(super) const CARD: &str = "card-1";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
}

pub(super) fn card_ref(value: &str) -> CardReference {
    CardReference(value.to_string())
}

pub(super) fn caller() -> CallerContext {
    CallerContext {
        party_id: PartyId("party-1".to_string()),
        persona_id: PersonaId("persona-1".to_string()),
        acting_persona_id: None,
    }
}

pub(super) fn delegate_caller() -> CallerContext {
    CallerContext {
        acting_persona_id: Some(PersonaId("persona-2".to_string())),
        ..caller()
    }
}

pub(super) fn issued_card(reference: &str) -> CardState {
    CardState {
        reference: card_ref(reference),
        masked_number: "************4821".to_string(),
        status: CardStatus::Issued,
        status_reason: None,
        activation_status: true,
        pin_changed_count: 1,
        issue_date: NaiveDate::from_ymd_opt(2025, 1, 15),
        replaced_date: None,
        reissue_date: None,
        new_card_reference: None,
        old_card_reference: None,
        card_control_preference: true,
        merchant_update_preference: false,
        design_code: "CLASSIC".to_string(),
        embossing_line1: "JOE BLOW".to_string(),
        embossing_line2: String::new(),
        expiry_date: NaiveDate::from_ymd_opt(2029, 1, 31),
    }
}

pub(super) fn domestic_address() -> PostalAddress {
    PostalAddress {
        line1: "1200 Market Street".to_string(),
        city: "Des Moines".to_string(),
        subdivision: "US-IA".to_string(),
        postal_code: "50309".to_string(),
        country: "US".to_string(),
        ..PostalAddress::default()
    }
}

pub(super) fn party_graph(opened_on: NaiveDate) -> Vec<PartyRecord> {
    vec![PartyRecord {
        party_id: PartyId("party-1".to_string()),
        mailing_address: Some(domestic_address()),
        residential_address: None,
        accounts: vec![
            AccountRecord {
                reference: AccountReference("acct-1".to_string()),
                lookup_key: "key-1".to_string(),
                opened_on,
            },
            AccountRecord {
                reference: AccountReference("acct-2".to_string()),
                lookup_key: "key-2".to_string(),
                opened_on: NaiveDate::from_ymd_opt(2020, 6, 1).expect("valid date"),
            },
        ],
    }]
}

pub(super) fn entitled_card() -> EntitledCard {
    EntitledCard {
        reference: card_ref(CARD),
        account_refs: vec![
            AccountReference("acct-1".to_string()),
            AccountReference("acct-2".to_string()),
        ],
        account_lookup_key: "key-1".to_string(),
    }
}

/// Everything the scripted backend knows and everything it was asked to do.
pub(super) struct BackendState {
    pub(super) cards: HashMap<CardReference, CardState>,
    pub(super) entitled: EntitledCard,
    pub(super) profile: PartyProfile,
    pub(super) graph: Vec<PartyRecord>,
    pub(super) failures: HashMap<String, GatewayError>,
    pub(super) calls: Vec<String>,
    pub(super) status_changes: Vec<(CardReference, CardStatus, Option<StatusReason>)>,
    pub(super) orders: Vec<ReplacementOrder>,
    pub(super) links: Vec<AccountReference>,
    pub(super) registered: Vec<CardReference>,
    pub(super) force_latest_calls: usize,
    pub(super) transfers: Vec<(CardReference, CardReference)>,
    pub(super) pins: Vec<(CardReference, String)>,
    pub(super) events: Vec<CardEvent>,
    pub(super) notifications: Vec<(PersonaId, Notification)>,
    pub(super) audits: Vec<AuditEvent>,
    next_card: u32,
}

pub(super) struct TestBackend {
    today: NaiveDate,
    state: Mutex<BackendState>,
}

impl TestBackend {
    /// An activated card, two linked accounts opened long ago, and a domestic address.
    pub(super) fn standard() -> Arc<Self> {
        let card = issued_card(CARD);
        let mut cards = HashMap::new();
        cards.insert(card.reference.clone(), card);

        Arc::new(Self {
            today: today(),
            state: Mutex::new(BackendState {
                cards,
                entitled: entitled_card(),
                profile: PartyProfile {
                    legal_name: LegalName {
                        first: "Joe".to_string(),
                        last: "Blow".to_string(),
                    },
                    address: None,
                },
                graph: party_graph(NaiveDate::from_ymd_opt(2020, 6, 1).expect("valid date")),
                failures: HashMap::new(),
                calls: Vec::new(),
                status_changes: Vec::new(),
                orders: Vec::new(),
                links: Vec::new(),
                registered: Vec::new(),
                force_latest_calls: 0,
                transfers: Vec::new(),
                pins: Vec::new(),
                events: Vec::new(),
                notifications: Vec::new(),
                audits: Vec::new(),
                next_card: 1,
            }),
        })
    }

    pub(super) fn with_state<R>(&self, apply: impl FnOnce(&mut BackendState) -> R) -> R {
        let mut guard = self.state.lock().expect("backend mutex poisoned");
        apply(&mut guard)
    }

    pub(super) fn update_card(&self, reference: &str, apply: impl FnOnce(&mut CardState)) {
        self.with_state(|state| {
            if let Some(card) = state.cards.get_mut(&card_ref(reference)) {
                apply(card);
            }
        });
    }

    pub(super) fn card(&self, reference: &str) -> Option<CardState> {
        self.with_state(|state| state.cards.get(&card_ref(reference)).cloned())
    }

    /// Makes every call named `call` fail until [`TestBackend::clear_failures`].
    pub(super) fn fail(&self, call: &str, error: GatewayError) {
        self.with_state(|state| {
            state.failures.insert(call.to_string(), error);
        });
    }

    pub(super) fn clear_failures(&self) {
        self.with_state(|state| state.failures.clear());
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.with_state(|state| state.calls.clone())
    }

    pub(super) fn audits(&self) -> Vec<AuditEvent> {
        self.with_state(|state| state.audits.clone())
    }

    pub(super) fn notifications(&self) -> Vec<(PersonaId, Notification)> {
        self.with_state(|state| state.notifications.clone())
    }

    fn record(&self, call: &str, key: Option<&str>) -> Result<(), GatewayError> {
        self.with_state(|state| {
            state.calls.push(call.to_string());
            let keyed = key.map(|key| format!("{call}:{key}"));
            let failure = keyed
                .and_then(|keyed| state.failures.get(&keyed).cloned())
                .or_else(|| state.failures.get(call).cloned());
            match failure {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

#[async_trait]
impl CardGateway for TestBackend {
    async fn get_card(&self, card: &CardReference) -> Result<CardState, GatewayError> {
        self.record("get_card", Some(&card.0))?;
        self.card(&card.0)
            .ok_or_else(|| GatewayError::not_found("CARD_NOT_FOUND", "unknown card"))
    }

    async fn set_status(
        &self,
        card: &CardReference,
        status: CardStatus,
        reason: Option<StatusReason>,
    ) -> Result<(), GatewayError> {
        self.record("set_status", Some(&card.0))?;
        self.with_state(|state| {
            state.status_changes.push((card.clone(), status, reason));
            if let Some(stored) = state.cards.get_mut(card) {
                stored.status = status;
                stored.status_reason = reason;
            }
        });
        Ok(())
    }

    async fn issue_replacement(
        &self,
        order: ReplacementOrder,
    ) -> Result<CardReference, GatewayError> {
        self.record("issue_replacement", None)?;
        let today = self.today;
        Ok(self.with_state(|state| {
            state.orders.push(order.clone());
            match order.plastic_type {
                PlasticType::SameNumber => {
                    if let Some(stored) = state.cards.get_mut(&order.card) {
                        stored.reissue_date = Some(today);
                        stored.embossing_line1 = order.embossed_name.clone();
                    }
                    order.card.clone()
                }
                PlasticType::NewNumber => {
                    let reference = card_ref(&format!("card-new-{}", state.next_card));
                    state.next_card += 1;

                    let mut new_card = issued_card(&reference.0);
                    new_card.masked_number = "************7310".to_string();
                    new_card.activation_status = false;
                    new_card.pin_changed_count = 0;
                    new_card.issue_date = Some(today);
                    new_card.old_card_reference = Some(order.card.clone());
                    new_card.card_control_preference = false;
                    new_card.embossing_line1 = order.embossed_name.clone();
                    new_card.expiry_date = NaiveDate::from_ymd_opt(2031, 3, 31);
                    state.cards.insert(reference.clone(), new_card);

                    if let Some(stored) = state.cards.get_mut(&order.card) {
                        stored.new_card_reference = Some(reference.clone());
                        stored.replaced_date = Some(today);
                    }
                    reference
                }
            }
        }))
    }

    async fn activate(&self, card: &CardReference) -> Result<(), GatewayError> {
        self.record("activate", Some(&card.0))?;
        self.update_card(&card.0, |stored| stored.activation_status = true);
        Ok(())
    }

    async fn transfer_controls(
        &self,
        from: &CardReference,
        to: &CardReference,
    ) -> Result<(), GatewayError> {
        self.record("transfer_controls", None)?;
        self.with_state(|state| state.transfers.push((from.clone(), to.clone())));
        Ok(())
    }
}

#[async_trait]
impl PinGateway for TestBackend {
    async fn set_pin(&self, card: &CardReference, pin_block: &str) -> Result<(), GatewayError> {
        self.record("set_pin", Some(&card.0))?;
        self.with_state(|state| {
            state.pins.push((card.clone(), pin_block.to_string()));
            if let Some(stored) = state.cards.get_mut(card) {
                stored.pin_changed_count += 1;
            }
        });
        Ok(())
    }
}

#[async_trait]
impl EntitlementGateway for TestBackend {
    async fn check_entitlement(
        &self,
        _caller: &CallerContext,
        card: &CardReference,
        _operation: EntitledOperation,
    ) -> Result<EntitledCard, GatewayError> {
        self.record("check_entitlement", Some(&card.0))?;
        Ok(self.with_state(|state| EntitledCard {
            reference: card.clone(),
            ..state.entitled.clone()
        }))
    }

    async fn check_eligibility(
        &self,
        _caller: &CallerContext,
        _action: Eligibility,
        _card: &CardReference,
    ) -> Result<(), GatewayError> {
        self.record("check_eligibility", None)
    }

    async fn register_card(
        &self,
        _caller: &CallerContext,
        card: &CardReference,
    ) -> Result<(), GatewayError> {
        self.record("register_card", None)?;
        self.with_state(|state| state.registered.push(card.clone()));
        Ok(())
    }

    async fn force_latest(&self, _caller: &CallerContext) -> Result<(), GatewayError> {
        self.record("force_latest", None)?;
        self.with_state(|state| state.force_latest_calls += 1);
        Ok(())
    }
}

#[async_trait]
impl PartyGateway for TestBackend {
    async fn get_party(&self, _caller: &CallerContext) -> Result<PartyProfile, GatewayError> {
        self.record("get_party", None)?;
        Ok(self.with_state(|state| state.profile.clone()))
    }

    async fn get_party_graph(&self, _party: &PartyId) -> Result<Vec<PartyRecord>, GatewayError> {
        self.record("get_party_graph", None)?;
        Ok(self.with_state(|state| state.graph.clone()))
    }
}

#[async_trait]
impl AccountGateway for TestBackend {
    async fn link_account(
        &self,
        _old_card: &CardReference,
        _new_card: &CardReference,
        account: &AccountReference,
    ) -> Result<(), GatewayError> {
        self.record("link_account", Some(&account.0))?;
        self.with_state(|state| state.links.push(account.clone()));
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for TestBackend {
    async fn publish_event(&self, event: CardEvent) -> Result<(), GatewayError> {
        self.record("publish_event", None)?;
        self.with_state(|state| state.events.push(event));
        Ok(())
    }
}

#[async_trait]
impl NotificationPublisher for TestBackend {
    async fn publish_notification(
        &self,
        persona: &PersonaId,
        content: Notification,
    ) -> Result<(), GatewayError> {
        self.record("publish_notification", None)?;
        self.with_state(|state| state.notifications.push((persona.clone(), content)));
        Ok(())
    }
}

#[async_trait]
impl AuditPublisher for TestBackend {
    async fn publish_audit(&self, event: AuditEvent) -> Result<(), GatewayError> {
        self.record("publish_audit", None)?;
        self.with_state(|state| state.audits.push(event));
        Ok(())
    }
}

/// Publisher whose calls never complete.
pub(super) struct StalledPublisher;

#[async_trait]
impl EventPublisher for StalledPublisher {
    async fn publish_event(&self, _event: CardEvent) -> Result<(), GatewayError> {
        std::future::pending().await
    }
}

#[async_trait]
impl AuditPublisher for StalledPublisher {
    async fn publish_audit(&self, _event: AuditEvent) -> Result<(), GatewayError> {
        std::future::pending().await
    }
}

/// Service whose event and audit publishers hang forever.
pub(super) fn build_service_with_stalled_publishers(backend: &Arc<TestBackend>) -> CardService {
    let stalled = Arc::new(StalledPublisher);
    let collaborators = Collaborators {
        events: stalled.clone(),
        audit: stalled,
        ..Collaborators::from_backend(backend.clone())
    };
    CardService::new(
        collaborators,
        Arc::new(ReplacementToggles::all_enabled()),
        Arc::new(FixedClock(today())),
    )
}

pub(super) fn build_service(backend: &Arc<TestBackend>) -> CardService {
    build_service_with(backend, ReplacementToggles::all_enabled())
}

pub(super) fn build_service_with(
    backend: &Arc<TestBackend>,
    toggles: ReplacementToggles,
) -> CardService {
    CardService::new(
        Collaborators::from_backend(backend.clone()),
        Arc::new(toggles),
        Arc::new(FixedClock(today())),
    )
}

pub(super) fn unavailable(reason: &str) -> GatewayError {
    GatewayError::unavailable(reason, "downstream unavailable")
}

/// Lets detached tasks spawned by the service run to completion.
pub(super) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
