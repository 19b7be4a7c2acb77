//! Debit card decision core: eligibility, status rules, name and address
//! formatting, and the replacement workflow that ties them to the downstream
//! card, party, account and entitlement systems.

pub mod address;
pub mod audit;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod gateway;
pub mod naming;
pub mod replacement;
pub mod router;
pub mod service;
pub mod settings;
pub mod task_group;
pub mod transition;

#[cfg(test)]
mod tests;

pub use address::{mailing_address, InvalidAddressError};
pub use audit::{AuditEvent, AuditKind, AuditOutcome, AuditRecord};
pub use domain::{
    AccountRecord, AccountReference, CallerContext, CardReference, CardState, CardStatus,
    Eligibility, EntitledCard, EntitledOperation, LegalName, MailingAddress, PartyId,
    PartyProfile, PartyRecord, PersonaId, PinAction, PlasticType, PostalAddress,
    ReplacementOrder, ReplacementReason, ReplacementRequest, StatusReason,
};
pub use eligibility::{eligibility, eligible_for_activation, is_visible};
pub use error::{CardError, ErrorKind, ErrorView, GatewayError};
pub use gateway::{
    AccountGateway, AuditPublisher, CardEvent, CardGateway, Collaborators, EntitlementGateway,
    EventPublisher, Notification, NotificationPublisher, PartyGateway, PinGateway,
};
pub use naming::{embossed_name, maintenance_name};
pub use replacement::{ReplacementOrchestrator, ReplacementOutcome, ReplacementStage};
pub use router::card_router;
pub use service::{CardDetails, CardService};
pub use settings::{Clock, FeatureFlags, FixedClock, ReplacementToggles, SystemClock};
pub use transition::{allowed_next_states, valid_next_state, valid_reason};
