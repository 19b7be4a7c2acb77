//! Card replacement workflow.
//!
//! `Validating -> Preamble -> (IdempotentSkip | Issuing) -> LinkingNewCard -> Done`,
//! with `Aborted` reachable from every stage. A card whose state already
//! points at a newer card is treated as a replacement in flight: the workflow
//! resumes from the existing card instead of issuing another one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::address::mailing_address;
use super::audit::{AuditEvent, AuditKind, AuditOutcome, AuditRecord};
use super::domain::{
    find_account, AccountReference, CallerContext, CardReference, CardState, Eligibility,
    EntitledOperation, LegalName, MailingAddress, PartyProfile, PartyRecord, PlasticType,
    PostalAddress, ReplacementOrder, ReplacementReason, ReplacementRequest,
};
use super::eligibility::eligibility;
use super::error::CardError;
use super::gateway::{CardEvent, Collaborators, Notification};
use super::naming::{embossed_name, maintenance_name};
use super::settings::{Clock, FeatureFlags};
use super::task_group::{TaskGroup, TaskOutput};
use super::transition::{reason_for_status, valid_next_state, valid_reason};

const OPERATION: &str = "replacement";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementStage {
    Validating,
    Preamble,
    IdempotentSkip,
    Issuing,
    LinkingNewCard,
    Done,
    Aborted,
}

impl ReplacementStage {
    pub fn label(self) -> &'static str {
        match self {
            ReplacementStage::Validating => "validating",
            ReplacementStage::Preamble => "preamble",
            ReplacementStage::IdempotentSkip => "idempotent_skip",
            ReplacementStage::Issuing => "issuing",
            ReplacementStage::LinkingNewCard => "linking_new_card",
            ReplacementStage::Done => "done",
            ReplacementStage::Aborted => "aborted",
        }
    }
}

/// Working state owned by a single replacement call.
#[derive(Debug, Clone)]
pub struct ReplacementPlan {
    pub reason: ReplacementReason,
    pub stage: ReplacementStage,
    /// Stage that was running when the workflow aborted.
    pub failed_at: Option<ReplacementStage>,
    pub accounts: Vec<AccountReference>,
    pub legal_name: Option<LegalName>,
    pub mailing_address: Option<MailingAddress>,
    pub embossed_name: Option<String>,
    pub old_card: Option<CardState>,
    pub new_card_reference: Option<CardReference>,
    pub refreshed_old_card: Option<CardState>,
    pub new_card: Option<CardState>,
}

impl ReplacementPlan {
    fn new(reason: ReplacementReason) -> Self {
        Self {
            reason,
            stage: ReplacementStage::Validating,
            failed_at: None,
            accounts: Vec::new(),
            legal_name: None,
            mailing_address: None,
            embossed_name: None,
            old_card: None,
            new_card_reference: None,
            refreshed_old_card: None,
            new_card: None,
        }
    }

    fn abort(&mut self) {
        self.failed_at = Some(self.stage);
        self.stage = ReplacementStage::Aborted;
    }

    /// Audit data from whatever the workflow has gathered so far.
    pub fn audit_record(&self) -> AuditRecord {
        let old_card = self.refreshed_old_card.as_ref().or(self.old_card.as_ref());
        let name_on_card = self.embossed_name.clone().or_else(|| {
            self.new_card
                .as_ref()
                .map(|card| card.embossing_line1.clone())
                .filter(|line| !line.is_empty())
        });

        AuditRecord {
            reason: Some(self.reason),
            stage: Some(self.failed_at.unwrap_or(self.stage).label().to_string()),
            old_card_masked: old_card.map(|card| card.masked_number.clone()),
            new_card_masked: self.new_card.as_ref().map(|card| card.masked_number.clone()),
            old_expiry: old_card.and_then(|card| card.expiry_date),
            new_expiry: self.new_card.as_ref().and_then(|card| card.expiry_date),
            new_issue_date: self.new_card.as_ref().and_then(|card| {
                card.reissue_date.or(card.issue_date)
            }),
            name_on_card,
            accounts: self.accounts.clone(),
        }
    }
}

/// Result returned to the caller after a successful replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementOutcome {
    pub new_card: CardReference,
    pub plastic_type: PlasticType,
    pub eligibility: Vec<Eligibility>,
    /// True when an earlier attempt had already issued the card.
    pub resumed: bool,
}

struct Preamble {
    card: CardState,
    profile: PartyProfile,
    graph: Vec<PartyRecord>,
}

/// Coordinates the downstream calls that replace a card.
pub struct ReplacementOrchestrator {
    collaborators: Collaborators,
    features: Arc<dyn FeatureFlags>,
    clock: Arc<dyn Clock>,
}

impl ReplacementOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        features: Arc<dyn FeatureFlags>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collaborators,
            features,
            clock,
        }
    }

    pub async fn replace(
        &self,
        caller: &CallerContext,
        request: &ReplacementRequest,
        cancel: &CancellationToken,
    ) -> Result<ReplacementOutcome, CardError> {
        let mut plan = ReplacementPlan::new(request.reason);
        let result = self.run(caller, request, &mut plan, cancel).await;

        match &result {
            Ok(outcome) => info!(
                card = %request.card,
                new_card = %outcome.new_card,
                reason = %request.reason,
                resumed = outcome.resumed,
                "card replaced"
            ),
            Err(err) => {
                plan.abort();
                warn!(
                    card = %request.card,
                    reason = %request.reason,
                    stage = plan.failed_at.unwrap_or(plan.stage).label(),
                    reason_code = err.reason_code(),
                    error = %err,
                    "card replacement aborted"
                );
            }
        }

        self.publish_audit(caller, request, &plan, &result);
        result
    }

    async fn run(
        &self,
        caller: &CallerContext,
        request: &ReplacementRequest,
        plan: &mut ReplacementPlan,
        cancel: &CancellationToken,
    ) -> Result<ReplacementOutcome, CardError> {
        let reason = request.reason;

        if !self.features.replacement_toggles().allows(reason) {
            return Err(CardError::ReasonDisabled(reason));
        }

        let entitled = self
            .collaborators
            .entitlements
            .check_entitlement(caller, &request.card, EntitledOperation::ReplaceCard)
            .await
            .map_err(CardError::downstream(OPERATION, "entitlement check"))?;
        if entitled.account_refs.is_empty() {
            return Err(CardError::MissingAccounts);
        }
        plan.accounts = entitled.account_refs.clone();

        self.collaborators
            .entitlements
            .check_eligibility(caller, reason.eligibility(), &request.card)
            .await
            .map_err(CardError::downstream(OPERATION, "eligibility check"))?;

        plan.stage = ReplacementStage::Preamble;
        let Preamble {
            card: old_card,
            profile,
            graph,
        } = self.preamble(caller, &request.card, cancel).await?;
        let today = self.clock.today();

        let (party, account) = find_account(&graph, &entitled.account_lookup_key).ok_or_else(|| {
            CardError::UnexpectedPayload("card account is missing from the party graph".to_string())
        })?;
        plan.mailing_address = Some(resolve_mailing_address([
            party.mailing_address.as_ref(),
            party.residential_address.as_ref(),
            profile.address.as_ref(),
        ])?);
        plan.legal_name = Some(profile.legal_name.clone());
        plan.old_card = Some(old_card.clone());

        if account.opened_on_day(today) && reason != ReplacementReason::Damaged {
            return Err(CardError::SameDayReplacement);
        }

        let plastic_type = reason.plastic_type();
        let (new_card_ref, resumed) = match old_card.new_card_reference.clone() {
            Some(existing) => {
                plan.stage = ReplacementStage::IdempotentSkip;
                info!(
                    card = %request.card,
                    new_card = %existing,
                    "replacement already issued, resuming"
                );
                (existing, true)
            }
            None => {
                plan.stage = ReplacementStage::Issuing;
                (self.issue(request, &old_card, plan).await?, false)
            }
        };
        plan.new_card_reference = Some(new_card_ref.clone());

        let incomplete = |source: CardError| CardError::IncompleteReplacement {
            new_card: new_card_ref.clone(),
            source: Box::new(source),
        };

        let (refreshed_old, new_card) = self
            .refetch(&request.card, &new_card_ref, cancel)
            .await
            .map_err(incomplete)?;
        plan.refreshed_old_card = Some(refreshed_old.clone());
        plan.new_card = Some(new_card.clone());

        if plastic_type == PlasticType::NewNumber {
            plan.stage = ReplacementStage::LinkingNewCard;
            self.link_new_card(caller, &old_card, &new_card_ref, &plan.accounts, cancel)
                .await
                .map_err(incomplete)?;
        }

        plan.stage = ReplacementStage::Done;
        self.announce(caller, &refreshed_old, &new_card_ref);

        Ok(ReplacementOutcome {
            new_card: new_card_ref,
            plastic_type,
            eligibility: eligibility(&new_card, today),
            resumed,
        })
    }

    async fn preamble(
        &self,
        caller: &CallerContext,
        card: &CardReference,
        cancel: &CancellationToken,
    ) -> Result<Preamble, CardError> {
        let mut group = TaskGroup::<CardError>::new(cancel);

        let cards = self.collaborators.cards.clone();
        let card = card.clone();
        let card_slot = group.spawn(async move {
            cards
                .get_card(&card)
                .await
                .map_err(CardError::downstream(OPERATION, "card fetch"))
        });

        let parties = self.collaborators.parties.clone();
        let owner = caller.clone();
        let profile_slot = group.spawn(async move {
            parties
                .get_party(&owner)
                .await
                .map_err(CardError::downstream(OPERATION, "party lookup"))
        });

        let parties = self.collaborators.parties.clone();
        let party_id = caller.party_id.clone();
        let graph_slot = group.spawn(async move {
            parties
                .get_party_graph(&party_id)
                .await
                .map_err(CardError::downstream(OPERATION, "party graph lookup"))
        });

        group.wait().await?;

        Ok(Preamble {
            card: take(card_slot)?,
            profile: take(profile_slot)?,
            graph: take(graph_slot)?,
        })
    }

    async fn issue(
        &self,
        request: &ReplacementRequest,
        old_card: &CardState,
        plan: &mut ReplacementPlan,
    ) -> Result<CardReference, CardError> {
        let reason = request.reason;
        let target = reason.target_status();

        // A card already in the target status (e.g. reported lost earlier) needs no status change.
        if old_card.status != target {
            if !valid_next_state(old_card.status, target) {
                return Err(CardError::IllegalTransition {
                    from: old_card.status,
                    to: target,
                });
            }
            let status_reason = reason_for_status(target);
            debug_assert!(valid_reason(target, status_reason));
            self.collaborators
                .cards
                .set_status(&request.card, target, status_reason)
                .await
                .map_err(CardError::downstream(OPERATION, "status change"))?;
        }

        let (name, address) = match (&plan.legal_name, &plan.mailing_address) {
            (Some(name), Some(address)) => (name.clone(), address.clone()),
            _ => {
                return Err(CardError::UnexpectedPayload(
                    "replacement issued before name and address were resolved".to_string(),
                ))
            }
        };
        let (first_name, last_name) = maintenance_name(&name.first, &name.last);
        let embossed = embossed_name(&name.first, &name.last);
        plan.embossed_name = Some(embossed.clone());

        let plastic_type = reason.plastic_type();
        let order = ReplacementOrder {
            card: request.card.clone(),
            plastic_type,
            first_name,
            last_name,
            embossed_name: embossed,
            address,
            card_control_preference: old_card.card_control_preference,
            merchant_update_preference: old_card.merchant_update_preference,
        };

        let issued = self
            .collaborators
            .cards
            .issue_replacement(order)
            .await
            .map_err(CardError::downstream(OPERATION, "replacement issue"))?;

        Ok(match plastic_type {
            PlasticType::SameNumber => request.card.clone(),
            PlasticType::NewNumber => issued,
        })
    }

    async fn refetch(
        &self,
        old_card: &CardReference,
        new_card: &CardReference,
        cancel: &CancellationToken,
    ) -> Result<(CardState, CardState), CardError> {
        let mut group = TaskGroup::<CardError>::new(cancel);
        let old_slot = self.spawn_fetch(&mut group, old_card);
        let new_slot = self.spawn_fetch(&mut group, new_card);
        group.wait().await?;
        Ok((take(old_slot)?, take(new_slot)?))
    }

    fn spawn_fetch(
        &self,
        group: &mut TaskGroup<CardError>,
        card: &CardReference,
    ) -> TaskOutput<CardState> {
        let cards = self.collaborators.cards.clone();
        let card = card.clone();
        group.spawn(async move {
            cards
                .get_card(&card)
                .await
                .map_err(CardError::downstream(OPERATION, "card refresh"))
        })
    }

    async fn link_new_card(
        &self,
        caller: &CallerContext,
        old_card: &CardState,
        new_card: &CardReference,
        accounts: &[AccountReference],
        cancel: &CancellationToken,
    ) -> Result<(), CardError> {
        let mut group = TaskGroup::<CardError>::new(cancel);

        for account in accounts {
            let gateway = self.collaborators.accounts.clone();
            let old = old_card.reference.clone();
            let new = new_card.clone();
            let account = account.clone();
            group.spawn(async move {
                gateway
                    .link_account(&old, &new, &account)
                    .await
                    .map_err(CardError::downstream(OPERATION, "account link"))
            });
        }

        let entitlements = self.collaborators.entitlements.clone();
        let owner = caller.clone();
        let new = new_card.clone();
        group.spawn(async move {
            entitlements
                .register_card(&owner, &new)
                .await
                .map_err(CardError::downstream(OPERATION, "entitlement registration"))
        });

        debug!(card = %new_card, tasks = group.len(), "linking replacement card");
        group.wait().await?;

        // Must follow registration: the refreshed profile has to include the new card.
        self.collaborators
            .entitlements
            .force_latest(caller)
            .await
            .map_err(CardError::downstream(OPERATION, "entitlement refresh"))?;

        if old_card.card_control_preference {
            self.collaborators
                .cards
                .transfer_controls(&old_card.reference, new_card)
                .await
                .map_err(CardError::downstream(OPERATION, "card control transfer"))?;
        }

        Ok(())
    }

    fn announce(&self, caller: &CallerContext, old_card: &CardState, new_card: &CardReference) {
        self.collaborators.publish_event_detached(CardEvent::StatusChanged {
            card: old_card.reference.clone(),
            status: old_card.status,
        });

        if !caller.is_acting_on_behalf() {
            return;
        }

        self.collaborators.notify_detached(
            caller.persona_id.clone(),
            Notification {
                template: "card_replaced".to_string(),
                card: new_card.clone(),
                acting_persona: caller.acting_persona_id.clone(),
            },
        );
    }

    fn publish_audit(
        &self,
        caller: &CallerContext,
        request: &ReplacementRequest,
        plan: &ReplacementPlan,
        result: &Result<ReplacementOutcome, CardError>,
    ) {
        let outcome = match result {
            Ok(outcome) => AuditOutcome::Succeeded {
                new_card: outcome.new_card.clone(),
            },
            Err(err) => AuditOutcome::Failed { error: err.view() },
        };
        let event = AuditEvent {
            kind: AuditKind::CardReplacement,
            persona: caller.persona_id.clone(),
            acting_persona: caller.acting_persona_id.clone(),
            card: request.card.clone(),
            outcome,
            record: plan.audit_record(),
        };

        self.collaborators.publish_audit_detached(event);
    }
}

fn take<T>(slot: TaskOutput<T>) -> Result<T, CardError> {
    slot.take()
        .ok_or_else(|| CardError::UnexpectedPayload("task finished without a value".to_string()))
}

/// First candidate that formats as a domestic mailing address.
fn resolve_mailing_address(
    candidates: [Option<&PostalAddress>; 3],
) -> Result<MailingAddress, CardError> {
    let mut rejected = None;
    for address in candidates.into_iter().flatten() {
        match mailing_address(address) {
            Ok(formatted) => return Ok(formatted),
            Err(err) => {
                rejected.get_or_insert(err);
            }
        }
    }

    Err(rejected
        .map(CardError::from)
        .unwrap_or(CardError::NoMailingAddress))
}
