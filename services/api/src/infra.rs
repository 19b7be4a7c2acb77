use async_trait::async_trait;
use card_core::cards::{
    AccountGateway, AccountRecord, AccountReference, AuditEvent, AuditPublisher, CallerContext,
    CardEvent, CardGateway, CardReference, CardState, CardStatus, Eligibility, EntitledCard,
    EntitledOperation, EntitlementGateway, ErrorKind, EventPublisher, GatewayError, LegalName,
    Notification, NotificationPublisher, PartyGateway, PartyId, PartyProfile, PartyRecord,
    PersonaId, PinGateway, PlasticType, PostalAddress, ReplacementOrder, StatusReason,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub(crate) const DEMO_PARTY: &str = "party-100";
pub(crate) const DEMO_PERSONA: &str = "persona-100";
pub(crate) const DEMO_CARD: &str = "card-100";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct CardStore {
    cards: HashMap<CardReference, CardState>,
    card_accounts: HashMap<CardReference, Vec<AccountReference>>,
    parties: HashMap<PartyId, (PartyProfile, PartyRecord)>,
    events: Vec<CardEvent>,
    notifications: Vec<(PersonaId, Notification)>,
    audits: Vec<AuditEvent>,
    issued: u32,
}

/// Card, party and entitlement systems held in memory for local runs and demos.
#[derive(Clone)]
pub(crate) struct InMemoryCardSystem {
    today: NaiveDate,
    store: Arc<Mutex<CardStore>>,
}

impl InMemoryCardSystem {
    /// One cardholder with an activated card linked to a checking and a savings account.
    pub(crate) fn seeded(today: NaiveDate) -> Self {
        let party_id = PartyId(DEMO_PARTY.to_string());
        let card_ref = CardReference(DEMO_CARD.to_string());
        let accounts = vec![
            AccountReference("acct-checking".to_string()),
            AccountReference("acct-savings".to_string()),
        ];
        let address = PostalAddress {
            line1: "1200 Market Street".to_string(),
            line2: "Apt 4B".to_string(),
            city: "Des Moines".to_string(),
            subdivision: "US-IA".to_string(),
            postal_code: "50309".to_string(),
            country: "US".to_string(),
            ..PostalAddress::default()
        };
        let opened_on = today - chrono::Duration::days(400);

        let record = PartyRecord {
            party_id: party_id.clone(),
            mailing_address: Some(address.clone()),
            residential_address: Some(address.clone()),
            accounts: accounts
                .iter()
                .map(|account| AccountRecord {
                    reference: account.clone(),
                    lookup_key: lookup_key(account),
                    opened_on,
                })
                .collect(),
        };
        let profile = PartyProfile {
            legal_name: LegalName {
                first: "Jordan".to_string(),
                last: "Rivera".to_string(),
            },
            address: Some(address),
        };

        let mut store = CardStore::default();
        store.cards.insert(
            card_ref.clone(),
            CardState {
                reference: card_ref.clone(),
                masked_number: "************1044".to_string(),
                status: CardStatus::Issued,
                status_reason: None,
                activation_status: true,
                pin_changed_count: 1,
                issue_date: Some(opened_on),
                replaced_date: None,
                reissue_date: None,
                new_card_reference: None,
                old_card_reference: None,
                card_control_preference: true,
                merchant_update_preference: true,
                design_code: "CLASSIC".to_string(),
                embossing_line1: "JORDAN RIVERA".to_string(),
                embossing_line2: String::new(),
                expiry_date: NaiveDate::from_ymd_opt(2029, 8, 31),
            },
        );
        store.card_accounts.insert(card_ref, accounts);
        store.parties.insert(party_id, (profile, record));

        Self {
            today,
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, CardStore>, GatewayError> {
        self.store.lock().map_err(|_| {
            GatewayError::new(ErrorKind::Internal, "STORE_POISONED", "card store is unavailable")
        })
    }

    pub(crate) fn audits(&self) -> Result<Vec<AuditEvent>, GatewayError> {
        Ok(self.store()?.audits.clone())
    }

    pub(crate) fn notifications(&self) -> Result<Vec<(PersonaId, Notification)>, GatewayError> {
        Ok(self.store()?.notifications.clone())
    }

    pub(crate) fn events(&self) -> Result<Vec<CardEvent>, GatewayError> {
        Ok(self.store()?.events.clone())
    }
}

fn lookup_key(account: &AccountReference) -> String {
    format!("lk-{}", account.0)
}

fn unknown_card() -> GatewayError {
    GatewayError::not_found("CARD_NOT_FOUND", "card is not on file")
}

#[async_trait]
impl CardGateway for InMemoryCardSystem {
    async fn get_card(&self, card: &CardReference) -> Result<CardState, GatewayError> {
        self.store()?.cards.get(card).cloned().ok_or_else(unknown_card)
    }

    async fn set_status(
        &self,
        card: &CardReference,
        status: CardStatus,
        reason: Option<StatusReason>,
    ) -> Result<(), GatewayError> {
        let mut store = self.store()?;
        let stored = store.cards.get_mut(card).ok_or_else(unknown_card)?;
        stored.status = status;
        stored.status_reason = reason;
        Ok(())
    }

    async fn issue_replacement(
        &self,
        order: ReplacementOrder,
    ) -> Result<CardReference, GatewayError> {
        let today = self.today;
        let mut store = self.store()?;
        let old = store.cards.get(&order.card).cloned().ok_or_else(unknown_card)?;

        if order.plastic_type == PlasticType::SameNumber {
            if let Some(stored) = store.cards.get_mut(&order.card) {
                stored.reissue_date = Some(today);
                stored.embossing_line1 = order.embossed_name;
            }
            return Ok(order.card);
        }

        store.issued += 1;
        let reference = CardReference(format!("{}-r{}", order.card.0, store.issued));
        let new_card = CardState {
            reference: reference.clone(),
            masked_number: format!("************{:04}", 2000 + store.issued),
            status: CardStatus::Issued,
            status_reason: None,
            activation_status: false,
            pin_changed_count: 0,
            issue_date: Some(today),
            replaced_date: None,
            reissue_date: None,
            new_card_reference: None,
            old_card_reference: Some(order.card.clone()),
            card_control_preference: false,
            merchant_update_preference: order.merchant_update_preference,
            design_code: old.design_code,
            embossing_line1: order.embossed_name,
            embossing_line2: String::new(),
            expiry_date: today.checked_add_months(chrono::Months::new(48)),
        };
        store.cards.insert(reference.clone(), new_card);
        if let Some(stored) = store.cards.get_mut(&order.card) {
            stored.new_card_reference = Some(reference.clone());
            stored.replaced_date = Some(today);
        }

        Ok(reference)
    }

    async fn activate(&self, card: &CardReference) -> Result<(), GatewayError> {
        let mut store = self.store()?;
        let stored = store.cards.get_mut(card).ok_or_else(unknown_card)?;
        stored.activation_status = true;
        Ok(())
    }

    async fn transfer_controls(
        &self,
        from: &CardReference,
        to: &CardReference,
    ) -> Result<(), GatewayError> {
        let mut store = self.store()?;
        let stored = store.cards.get_mut(to).ok_or_else(unknown_card)?;
        stored.card_control_preference = true;
        info!(from = %from, to = %to, "card controls transferred");
        Ok(())
    }
}

#[async_trait]
impl PinGateway for InMemoryCardSystem {
    async fn set_pin(&self, card: &CardReference, _pin_block: &str) -> Result<(), GatewayError> {
        let mut store = self.store()?;
        let stored = store.cards.get_mut(card).ok_or_else(unknown_card)?;
        stored.pin_changed_count += 1;
        Ok(())
    }
}

#[async_trait]
impl EntitlementGateway for InMemoryCardSystem {
    async fn check_entitlement(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        _operation: EntitledOperation,
    ) -> Result<EntitledCard, GatewayError> {
        let store = self.store()?;
        let owns_party = store.parties.contains_key(&caller.party_id);
        let root = store
            .cards
            .get(card)
            .and_then(|state| state.old_card_reference.clone())
            .unwrap_or_else(|| card.clone());

        match store.card_accounts.get(&root) {
            Some(accounts) if owns_party => Ok(EntitledCard {
                reference: card.clone(),
                account_refs: accounts.clone(),
                account_lookup_key: accounts.first().map(lookup_key).unwrap_or_default(),
            }),
            _ => Err(GatewayError::permission_denied(
                "NOT_ENTITLED",
                "caller is not entitled to this card",
            )),
        }
    }

    async fn check_eligibility(
        &self,
        _caller: &CallerContext,
        _action: Eligibility,
        _card: &CardReference,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn register_card(
        &self,
        caller: &CallerContext,
        card: &CardReference,
    ) -> Result<(), GatewayError> {
        info!(party = %caller.party_id.0, card = %card, "card registered for entitlements");
        Ok(())
    }

    async fn force_latest(&self, caller: &CallerContext) -> Result<(), GatewayError> {
        info!(party = %caller.party_id.0, "entitlement profile refreshed");
        Ok(())
    }
}

#[async_trait]
impl PartyGateway for InMemoryCardSystem {
    async fn get_party(&self, caller: &CallerContext) -> Result<PartyProfile, GatewayError> {
        self.store()?
            .parties
            .get(&caller.party_id)
            .map(|(profile, _)| profile.clone())
            .ok_or_else(|| GatewayError::not_found("PARTY_NOT_FOUND", "party is not on file"))
    }

    async fn get_party_graph(&self, party: &PartyId) -> Result<Vec<PartyRecord>, GatewayError> {
        Ok(self
            .store()?
            .parties
            .get(party)
            .map(|(_, record)| vec![record.clone()])
            .unwrap_or_default())
    }
}

#[async_trait]
impl AccountGateway for InMemoryCardSystem {
    async fn link_account(
        &self,
        old_card: &CardReference,
        new_card: &CardReference,
        account: &AccountReference,
    ) -> Result<(), GatewayError> {
        info!(old = %old_card, new = %new_card, account = %account.0, "account linked");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for InMemoryCardSystem {
    async fn publish_event(&self, event: CardEvent) -> Result<(), GatewayError> {
        self.store()?.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryCardSystem {
    async fn publish_notification(
        &self,
        persona: &PersonaId,
        content: Notification,
    ) -> Result<(), GatewayError> {
        self.store()?.notifications.push((persona.clone(), content));
        Ok(())
    }
}

#[async_trait]
impl AuditPublisher for InMemoryCardSystem {
    async fn publish_audit(&self, event: AuditEvent) -> Result<(), GatewayError> {
        self.store()?.audits.push(event);
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
