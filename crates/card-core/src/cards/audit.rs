use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{AccountReference, CardReference, PersonaId, ReplacementReason};
use super::error::ErrorView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    CardReplacement,
}

/// Service data captured for the audit log. Every field is optional because the
/// record is built from whatever the workflow had gathered when it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub reason: Option<ReplacementReason>,
    pub stage: Option<String>,
    pub old_card_masked: Option<String>,
    pub new_card_masked: Option<String>,
    pub old_expiry: Option<NaiveDate>,
    pub new_expiry: Option<NaiveDate>,
    pub new_issue_date: Option<NaiveDate>,
    pub name_on_card: Option<String>,
    pub accounts: Vec<AccountReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuditOutcome {
    Succeeded { new_card: CardReference },
    Failed { error: ErrorView },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub persona: PersonaId,
    pub acting_persona: Option<PersonaId>,
    pub card: CardReference,
    pub outcome: AuditOutcome,
    pub record: AuditRecord,
}
