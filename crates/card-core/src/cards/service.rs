use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::domain::{
    CallerContext, CardReference, CardState, CardStatus, Eligibility, EntitledOperation,
    PinAction, ReplacementRequest,
};
use super::eligibility::{eligibility, eligible_for_activation, is_visible};
use super::error::CardError;
use super::gateway::{CardEvent, Collaborators};
use super::replacement::{ReplacementOrchestrator, ReplacementOutcome};
use super::settings::{Clock, FeatureFlags};
use super::transition::{reason_for_status, valid_next_state, valid_reason};

/// Card view returned by the read and maintenance operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card: CardReference,
    pub masked_number: String,
    pub status: CardStatus,
    pub activated: bool,
    pub eligible_for_activation: bool,
    pub expiry_date: Option<NaiveDate>,
    pub eligibility: Vec<Eligibility>,
}

impl CardDetails {
    pub fn from_state(card: &CardState, today: NaiveDate) -> Self {
        Self {
            card: card.reference.clone(),
            masked_number: card.masked_number.clone(),
            status: card.status,
            activated: card.activation_status,
            eligible_for_activation: eligible_for_activation(card),
            expiry_date: card.expiry_date,
            eligibility: eligibility(card, today),
        }
    }
}

/// Service coordinating card reads, maintenance and replacement.
pub struct CardService {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    replacement: ReplacementOrchestrator,
}

impl CardService {
    pub fn new(
        collaborators: Collaborators,
        features: Arc<dyn FeatureFlags>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let replacement =
            ReplacementOrchestrator::new(collaborators.clone(), features, clock.clone());
        Self {
            collaborators,
            clock,
            replacement,
        }
    }

    pub async fn details(
        &self,
        caller: &CallerContext,
        card: &CardReference,
    ) -> Result<CardDetails, CardError> {
        const OPERATION: &str = "card details";

        let state = self
            .entitled_card(caller, card, EntitledOperation::ViewCard, OPERATION)
            .await?;
        if !is_visible(state.status) {
            return Err(CardError::CardNotVisible);
        }
        Ok(CardDetails::from_state(&state, self.clock.today()))
    }

    pub async fn activate(
        &self,
        caller: &CallerContext,
        card: &CardReference,
    ) -> Result<CardDetails, CardError> {
        const OPERATION: &str = "card activation";

        let state = self
            .entitled_card(caller, card, EntitledOperation::ActivateCard, OPERATION)
            .await?;
        if !eligible_for_activation(&state) {
            return Err(CardError::NotEligible(Eligibility::CardActivation));
        }

        self.collaborators
            .cards
            .activate(card)
            .await
            .map_err(CardError::downstream(OPERATION, "activation"))?;
        info!(card = %card, "card activated");

        self.refreshed(card, OPERATION).await
    }

    /// Blocks or unblocks a card. Other targets are reached only through
    /// replacement or back-office flows.
    pub async fn change_status(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        target: CardStatus,
    ) -> Result<CardDetails, CardError> {
        const OPERATION: &str = "status change";

        let state = self
            .entitled_card(caller, card, EntitledOperation::ManageStatus, OPERATION)
            .await?;

        let required = match target {
            CardStatus::TemporaryBlock => Eligibility::Block,
            CardStatus::Issued => Eligibility::Unblock,
            _ => {
                return Err(CardError::IllegalTransition {
                    from: state.status,
                    to: target,
                })
            }
        };
        if !eligibility(&state, self.clock.today()).contains(&required) {
            return Err(CardError::NotEligible(required));
        }
        if !valid_next_state(state.status, target) {
            return Err(CardError::IllegalTransition {
                from: state.status,
                to: target,
            });
        }

        let reason = reason_for_status(target);
        debug_assert!(valid_reason(target, reason));
        self.collaborators
            .cards
            .set_status(card, target, reason)
            .await
            .map_err(CardError::downstream(OPERATION, "status update"))?;
        info!(card = %card, from = ?state.status, to = ?target, "card status changed");

        self.collaborators.publish_event_detached(CardEvent::StatusChanged {
            card: card.clone(),
            status: target,
        });

        self.refreshed(card, OPERATION).await
    }

    pub async fn manage_pin(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        action: PinAction,
        pin_block: &str,
    ) -> Result<CardDetails, CardError> {
        const OPERATION: &str = "pin management";

        let state = self
            .entitled_card(caller, card, EntitledOperation::ManagePin, OPERATION)
            .await?;
        let required = action.eligibility();
        if !eligibility(&state, self.clock.today()).contains(&required) {
            return Err(CardError::NotEligible(required));
        }

        self.collaborators
            .pins
            .set_pin(card, pin_block)
            .await
            .map_err(CardError::downstream(OPERATION, "pin update"))?;
        info!(card = %card, action = ?action, "card pin updated");

        self.refreshed(card, OPERATION).await
    }

    pub async fn replace(
        &self,
        caller: &CallerContext,
        request: &ReplacementRequest,
        cancel: &CancellationToken,
    ) -> Result<ReplacementOutcome, CardError> {
        self.replacement.replace(caller, request, cancel).await
    }

    async fn entitled_card(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        operation: EntitledOperation,
        label: &'static str,
    ) -> Result<CardState, CardError> {
        self.collaborators
            .entitlements
            .check_entitlement(caller, card, operation)
            .await
            .map_err(CardError::downstream(label, "entitlement check"))?;

        self.collaborators
            .cards
            .get_card(card)
            .await
            .map_err(CardError::downstream(label, "card fetch"))
    }

    async fn refreshed(
        &self,
        card: &CardReference,
        label: &'static str,
    ) -> Result<CardDetails, CardError> {
        let state = self
            .collaborators
            .cards
            .get_card(card)
            .await
            .map_err(CardError::downstream(label, "card refresh"))?;
        Ok(CardDetails::from_state(&state, self.clock.today()))
    }
}
