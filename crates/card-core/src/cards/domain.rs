use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a card in the card-management system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardReference(pub String);

impl fmt::Display for CardReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a deposit account linked to a card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountReference(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonaId(pub String);

/// Lifecycle state of a card as reported by the card-management system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    Issued,
    TemporaryBlock,
    Lost,
    Stolen,
    DelinquentReturn,
    DelinquentRetain,
    Closed,
    UnissuedNdIciCards,
    BlockAtm,
    BlockAtmPosExcludeCnp,
    BlockAtmPosCnpBch,
    BlockAtmPosCnp,
    BlockCnp,
    BlockPosExcludeCnp,
    /// Any status code this service does not recognise.
    #[serde(other)]
    Unspecified,
}

/// Reason code attached to a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusReason {
    WithPinOrAccountRelated,
    WithoutPin,
    Damaged,
    LastPrimeDebitLinkageDeleted,
    Closed,
    Fraud,
}

/// Permitted cardholder action. Discriminants are the stable numeric codes
/// and define the ordering of an eligibility set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eligibility {
    ApplePay = 1,
    GooglePay = 2,
    SamsungPay = 3,
    CardActivation = 4,
    SetPin = 5,
    ChangePin = 6,
    GetDetails = 7,
    Block = 8,
    Unblock = 9,
    CardReplacementLost = 10,
    CardReplacementStolen = 11,
    CardReplacementDamaged = 12,
    CardControls = 13,
    CardOnFile = 14,
    FraudSuspected = 15,
    FraudCardCancelled = 16,
}

impl Eligibility {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Immutable snapshot of a card fetched from the card-management system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardState {
    pub reference: CardReference,
    pub masked_number: String,
    pub status: CardStatus,
    pub status_reason: Option<StatusReason>,
    pub activation_status: bool,
    pub pin_changed_count: u32,
    pub issue_date: Option<NaiveDate>,
    pub replaced_date: Option<NaiveDate>,
    pub reissue_date: Option<NaiveDate>,
    pub new_card_reference: Option<CardReference>,
    pub old_card_reference: Option<CardReference>,
    pub card_control_preference: bool,
    pub merchant_update_preference: bool,
    pub design_code: String,
    pub embossing_line1: String,
    pub embossing_line2: String,
    pub expiry_date: Option<NaiveDate>,
}

/// Why the cardholder wants a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplacementReason {
    Lost,
    Stolen,
    Damaged,
}

impl ReplacementReason {
    pub fn label(self) -> &'static str {
        match self {
            ReplacementReason::Lost => "LOST",
            ReplacementReason::Stolen => "STOLEN",
            ReplacementReason::Damaged => "DAMAGED",
        }
    }

    /// Eligibility flag the caller must hold to request this reason.
    pub fn eligibility(self) -> Eligibility {
        match self {
            ReplacementReason::Lost => Eligibility::CardReplacementLost,
            ReplacementReason::Stolen => Eligibility::CardReplacementStolen,
            ReplacementReason::Damaged => Eligibility::CardReplacementDamaged,
        }
    }

    /// Status the old card moves to before the replacement is issued.
    pub fn target_status(self) -> CardStatus {
        match self {
            ReplacementReason::Lost => CardStatus::Lost,
            ReplacementReason::Stolen => CardStatus::Stolen,
            ReplacementReason::Damaged => CardStatus::DelinquentReturn,
        }
    }

    pub fn plastic_type(self) -> PlasticType {
        match self {
            ReplacementReason::Lost | ReplacementReason::Stolen => PlasticType::NewNumber,
            ReplacementReason::Damaged => PlasticType::SameNumber,
        }
    }
}

impl fmt::Display for ReplacementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the replacement plastic keeps the card number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlasticType {
    SameNumber,
    NewNumber,
}

/// Caller identity extracted by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub party_id: PartyId,
    /// The cardholder persona the request is about.
    pub persona_id: PersonaId,
    /// Set when a delegate acts on behalf of the cardholder.
    pub acting_persona_id: Option<PersonaId>,
}

impl CallerContext {
    pub fn is_acting_on_behalf(&self) -> bool {
        self.acting_persona_id
            .as_ref()
            .is_some_and(|acting| acting != &self.persona_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub card: CardReference,
    pub reason: ReplacementReason,
}

/// Legal name on the party record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalName {
    pub first: String,
    pub last: String,
}

/// Structured postal address as stored on a party record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub city: String,
    pub subdivision: String,
    pub postal_code: String,
    pub country: String,
}

/// Three-line address printed on the replacement mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingAddress {
    pub line1: String,
    pub line2: String,
    pub line3: String,
}

/// Caller's own party record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub legal_name: LegalName,
    pub address: Option<PostalAddress>,
}

/// Account node of the account-and-party graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub reference: AccountReference,
    /// Encoded token used to match the account to an entitled card.
    pub lookup_key: String,
    pub opened_on: NaiveDate,
}

impl AccountRecord {
    pub fn opened_on_day(&self, today: NaiveDate) -> bool {
        self.opened_on == today
    }
}

/// Party node of the account-and-party graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub party_id: PartyId,
    pub mailing_address: Option<PostalAddress>,
    pub residential_address: Option<PostalAddress>,
    pub accounts: Vec<AccountRecord>,
}

/// Finds the party and account whose lookup key matches.
pub fn find_account<'a>(
    graph: &'a [PartyRecord],
    lookup_key: &str,
) -> Option<(&'a PartyRecord, &'a AccountRecord)> {
    graph.iter().find_map(|party| {
        party
            .accounts
            .iter()
            .find(|account| account.lookup_key == lookup_key)
            .map(|account| (party, account))
    })
}

/// Result of an entitlement check for a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitledCard {
    pub reference: CardReference,
    pub account_refs: Vec<AccountReference>,
    /// Encoded token of the card's primary account.
    pub account_lookup_key: String,
}

/// Operation an entitlement check is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitledOperation {
    ViewCard,
    ActivateCard,
    ManageStatus,
    ManagePin,
    ReplaceCard,
}

/// Payload of the card-replacement-issue call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementOrder {
    pub card: CardReference,
    pub plastic_type: PlasticType,
    pub first_name: String,
    pub last_name: String,
    pub embossed_name: String,
    pub address: MailingAddress,
    pub card_control_preference: bool,
    pub merchant_update_preference: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinAction {
    Set,
    Change,
}

impl PinAction {
    pub fn eligibility(self) -> Eligibility {
        match self {
            PinAction::Set => Eligibility::SetPin,
            PinAction::Change => Eligibility::ChangePin,
        }
    }
}
