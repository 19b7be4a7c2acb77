//! Contracts of the downstream systems the card core talks to.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::audit::AuditEvent;
use super::domain::{
    AccountReference, CallerContext, CardReference, CardState, CardStatus, Eligibility,
    EntitledCard, EntitledOperation, PartyId, PartyProfile, PartyRecord, PersonaId,
    ReplacementOrder, StatusReason,
};
use super::error::GatewayError;

/// Card inquiry, maintenance and status API.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn get_card(&self, card: &CardReference) -> Result<CardState, GatewayError>;

    async fn set_status(
        &self,
        card: &CardReference,
        status: CardStatus,
        reason: Option<StatusReason>,
    ) -> Result<(), GatewayError>;

    /// Issues the replacement plastic and returns the reference of the new card.
    async fn issue_replacement(&self, order: ReplacementOrder)
        -> Result<CardReference, GatewayError>;

    async fn activate(&self, card: &CardReference) -> Result<(), GatewayError>;

    async fn transfer_controls(
        &self,
        from: &CardReference,
        to: &CardReference,
    ) -> Result<(), GatewayError>;
}

/// PIN management API. The PIN block is already encrypted by the channel.
#[async_trait]
pub trait PinGateway: Send + Sync {
    async fn set_pin(&self, card: &CardReference, pin_block: &str) -> Result<(), GatewayError>;
}

/// Entitlement and authorization API.
#[async_trait]
pub trait EntitlementGateway: Send + Sync {
    async fn check_entitlement(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        operation: EntitledOperation,
    ) -> Result<EntitledCard, GatewayError>;

    async fn check_eligibility(
        &self,
        caller: &CallerContext,
        action: Eligibility,
        card: &CardReference,
    ) -> Result<(), GatewayError>;

    async fn register_card(
        &self,
        caller: &CallerContext,
        card: &CardReference,
    ) -> Result<(), GatewayError>;

    /// Forces the caller's entitlement profile to its latest version.
    async fn force_latest(&self, caller: &CallerContext) -> Result<(), GatewayError>;
}

/// Party and address lookup API.
#[async_trait]
pub trait PartyGateway: Send + Sync {
    async fn get_party(&self, caller: &CallerContext) -> Result<PartyProfile, GatewayError>;

    async fn get_party_graph(&self, party: &PartyId) -> Result<Vec<PartyRecord>, GatewayError>;
}

/// Account maintenance API.
#[async_trait]
pub trait AccountGateway: Send + Sync {
    async fn link_account(
        &self,
        old_card: &CardReference,
        new_card: &CardReference,
        account: &AccountReference,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEvent {
    StatusChanged {
        card: CardReference,
        status: CardStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub card: CardReference,
    pub acting_persona: Option<PersonaId>,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_event(&self, event: CardEvent) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish_notification(
        &self,
        persona: &PersonaId,
        content: Notification,
    ) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait AuditPublisher: Send + Sync {
    async fn publish_audit(&self, event: AuditEvent) -> Result<(), GatewayError>;
}

/// Every collaborator the card core needs, shared across requests.
#[derive(Clone)]
pub struct Collaborators {
    pub cards: Arc<dyn CardGateway>,
    pub pins: Arc<dyn PinGateway>,
    pub entitlements: Arc<dyn EntitlementGateway>,
    pub parties: Arc<dyn PartyGateway>,
    pub accounts: Arc<dyn AccountGateway>,
    pub events: Arc<dyn EventPublisher>,
    pub notifications: Arc<dyn NotificationPublisher>,
    pub audit: Arc<dyn AuditPublisher>,
}

impl Collaborators {
    /// Wires a single backend that implements every contract.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CardGateway
            + PinGateway
            + EntitlementGateway
            + PartyGateway
            + AccountGateway
            + EventPublisher
            + NotificationPublisher
            + AuditPublisher
            + 'static,
    {
        Self {
            cards: backend.clone(),
            pins: backend.clone(),
            entitlements: backend.clone(),
            parties: backend.clone(),
            accounts: backend.clone(),
            events: backend.clone(),
            notifications: backend.clone(),
            audit: backend,
        }
    }

    /// Publishes on a detached task. The caller never waits on it and a
    /// failure is only logged.
    pub fn publish_event_detached(&self, event: CardEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let card = match &event {
                CardEvent::StatusChanged { card, .. } => card.clone(),
            };
            if let Err(err) = events.publish_event(event).await {
                warn!(card = %card, error = %err, "status change event not published");
            }
        });
    }

    pub fn publish_audit_detached(&self, event: AuditEvent) {
        let audit = self.audit.clone();
        tokio::spawn(async move {
            let card = event.card.clone();
            if let Err(err) = audit.publish_audit(event).await {
                warn!(card = %card, error = %err, "audit record not published");
            }
        });
    }

    pub fn notify_detached(&self, persona: PersonaId, content: Notification) {
        let notifications = self.notifications.clone();
        tokio::spawn(async move {
            if let Err(err) = notifications.publish_notification(&persona, content).await {
                warn!(persona = %persona.0, error = %err, "notification not delivered");
            }
        });
    }
}
