use crate::infra::{InMemoryCardSystem, DEMO_CARD, DEMO_PARTY, DEMO_PERSONA};
use card_core::cards::{
    AuditEvent, CallerContext, CardDetails, CardError, CardEvent, CardReference, CardService,
    Collaborators, FixedClock, Notification, PartyId, PersonaId, ReplacementOutcome,
    ReplacementReason, ReplacementRequest, ReplacementToggles,
};
use card_core::error::AppError;
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum DemoReason {
    #[default]
    Lost,
    Stolen,
    Damaged,
}

impl From<DemoReason> for ReplacementReason {
    fn from(value: DemoReason) -> Self {
        match value {
            DemoReason::Lost => ReplacementReason::Lost,
            DemoReason::Stolen => ReplacementReason::Stolen,
            DemoReason::Damaged => ReplacementReason::Damaged,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Why the card is being replaced.
    #[arg(long, value_enum, default_value_t = DemoReason::Lost)]
    pub(crate) reason: DemoReason,
    /// Act as a delegate so the cardholder is notified.
    #[arg(long)]
    pub(crate) on_behalf: bool,
    /// Override the business date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    before: CardDetails,
    replacement: ReplacementOutcome,
    retry: ReplacementOutcome,
    events: Vec<CardEvent>,
    notifications: Vec<(PersonaId, Notification)>,
    audits: Vec<AuditEvent>,
}

fn demo_caller(on_behalf: bool) -> CallerContext {
    CallerContext {
        party_id: PartyId(DEMO_PARTY.to_string()),
        persona_id: PersonaId(DEMO_PERSONA.to_string()),
        acting_persona_id: on_behalf.then(|| PersonaId("persona-delegate".to_string())),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        reason,
        on_behalf,
        today,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let backend = Arc::new(InMemoryCardSystem::seeded(today));
    let service = CardService::new(
        Collaborators::from_backend(backend.clone()),
        Arc::new(ReplacementToggles::all_enabled()),
        Arc::new(FixedClock(today)),
    );

    let caller = demo_caller(on_behalf);
    let card = CardReference(DEMO_CARD.to_string());
    let request = ReplacementRequest {
        card: card.clone(),
        reason: reason.into(),
    };
    let cancel = CancellationToken::new();

    println!("Card replacement demo ({today})");
    let before = service.details(&caller, &card).await?;
    println!(
        "- {} {} is {:?}, offering {} actions",
        before.card,
        before.masked_number,
        before.status,
        before.eligibility.len()
    );

    let replacement = service.replace(&caller, &request, &cancel).await?;
    println!(
        "- replaced as {} with {} ({:?})",
        request.reason, replacement.new_card, replacement.plastic_type
    );
    println!("- new card offers {:?}", replacement.eligibility);

    let retry = service.replace(&caller, &request, &cancel).await?;
    println!(
        "- retry returned {} (resumed: {})",
        retry.new_card, retry.resumed
    );

    // Events, audits and the cardholder notification are published on detached tasks.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let summary = DemoSummary {
        before,
        replacement,
        retry,
        events: backend
            .events()
            .map_err(CardError::downstream("demo", "in-memory readback"))?,
        notifications: backend
            .notifications()
            .map_err(CardError::downstream("demo", "in-memory readback"))?,
        audits: backend
            .audits()
            .map_err(CardError::downstream("demo", "in-memory readback"))?,
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(rendered) => println!("\n{rendered}"),
        Err(err) => eprintln!("unable to render demo summary: {err}"),
    }

    Ok(())
}
