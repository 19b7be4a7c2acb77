use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::domain::{CardState, CardStatus, Eligibility};

const ISSUED_BASE: [Eligibility; 6] = [
    Eligibility::ApplePay,
    Eligibility::GooglePay,
    Eligibility::SamsungPay,
    Eligibility::CardReplacementDamaged,
    Eligibility::CardControls,
    Eligibility::CardOnFile,
];

const TEMPORARY_BLOCK: [Eligibility; 4] = [
    Eligibility::CardReplacementLost,
    Eligibility::CardReplacementStolen,
    Eligibility::CardReplacementDamaged,
    Eligibility::Unblock,
];

/// Actions the cardholder may currently perform, ascending by code.
///
/// `today` is the current calendar date in the card's reference timezone.
pub fn eligibility(card: &CardState, today: NaiveDate) -> Vec<Eligibility> {
    let mut set = BTreeSet::new();

    match card.status {
        CardStatus::BlockAtm
        | CardStatus::BlockAtmPosExcludeCnp
        | CardStatus::BlockAtmPosCnpBch
        | CardStatus::BlockAtmPosCnp
        | CardStatus::BlockCnp
        | CardStatus::BlockPosExcludeCnp => {
            set.insert(Eligibility::FraudSuspected);
        }
        CardStatus::DelinquentRetain => {
            set.insert(Eligibility::FraudCardCancelled);
        }
        CardStatus::TemporaryBlock => set.extend(TEMPORARY_BLOCK),
        CardStatus::Lost => {
            set.insert(Eligibility::CardReplacementLost);
        }
        CardStatus::Stolen => {
            set.insert(Eligibility::CardReplacementStolen);
        }
        CardStatus::DelinquentReturn => {
            set.insert(Eligibility::CardReplacementDamaged);
        }
        CardStatus::Issued => issued_actions(card, today, &mut set),
        CardStatus::Closed | CardStatus::UnissuedNdIciCards | CardStatus::Unspecified => {}
    }

    set.into_iter().collect()
}

fn issued_actions(card: &CardState, today: NaiveDate, set: &mut BTreeSet<Eligibility>) {
    set.extend(ISSUED_BASE);

    if card.pin_changed_count > 0 {
        set.insert(Eligibility::ChangePin);
    } else {
        set.insert(Eligibility::SetPin);
    }

    if eligible_for_activation(card) {
        set.insert(Eligibility::CardActivation);
    } else {
        set.insert(Eligibility::GetDetails);
        set.insert(Eligibility::Block);
    }

    let issued_today = card.issue_date == Some(today);
    let replaced_today = card.replaced_date == Some(today);
    if !issued_today && !replaced_today {
        set.insert(Eligibility::CardReplacementLost);
        set.insert(Eligibility::CardReplacementStolen);
    }
}

/// Whether the card is shown to the cardholder at all.
pub fn is_visible(status: CardStatus) -> bool {
    match status {
        CardStatus::Issued | CardStatus::TemporaryBlock => true,
        CardStatus::BlockAtm
        | CardStatus::BlockAtmPosExcludeCnp
        | CardStatus::BlockAtmPosCnpBch
        | CardStatus::BlockAtmPosCnp
        | CardStatus::BlockCnp
        | CardStatus::BlockPosExcludeCnp => true,
        CardStatus::Closed
        | CardStatus::DelinquentReturn
        | CardStatus::Lost
        | CardStatus::Stolen
        | CardStatus::UnissuedNdIciCards
        | CardStatus::DelinquentRetain
        | CardStatus::Unspecified => false,
    }
}

pub fn eligible_for_activation(card: &CardState) -> bool {
    is_visible(card.status) && card.status != CardStatus::TemporaryBlock && !card.activation_status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::domain::CardReference;

    const ALL_STATUSES: [CardStatus; 15] = [
        CardStatus::Issued,
        CardStatus::TemporaryBlock,
        CardStatus::Lost,
        CardStatus::Stolen,
        CardStatus::DelinquentReturn,
        CardStatus::DelinquentRetain,
        CardStatus::Closed,
        CardStatus::UnissuedNdIciCards,
        CardStatus::BlockAtm,
        CardStatus::BlockAtmPosExcludeCnp,
        CardStatus::BlockAtmPosCnpBch,
        CardStatus::BlockAtmPosCnp,
        CardStatus::BlockCnp,
        CardStatus::BlockPosExcludeCnp,
        CardStatus::Unspecified,
    ];

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date")
    }

    fn card(status: CardStatus) -> CardState {
        CardState {
            reference: CardReference("card-1".to_string()),
            masked_number: "************1234".to_string(),
            status,
            status_reason: None,
            activation_status: false,
            pin_changed_count: 0,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            replaced_date: None,
            reissue_date: None,
            new_card_reference: None,
            old_card_reference: None,
            card_control_preference: false,
            merchant_update_preference: false,
            design_code: "D01".to_string(),
            embossing_line1: "JOE BLOW".to_string(),
            embossing_line2: String::new(),
            expiry_date: NaiveDate::from_ymd_opt(2029, 1, 31),
        }
    }

    #[test]
    fn output_is_sorted_and_deduplicated_for_every_status() {
        for status in ALL_STATUSES {
            for activated in [false, true] {
                for pin_changes in [0, 3] {
                    let mut state = card(status);
                    state.activation_status = activated;
                    state.pin_changed_count = pin_changes;
                    let first = eligibility(&state, today());
                    let again = eligibility(&state, today());
                    assert_eq!(first, again, "non deterministic for {status:?}");
                    assert!(
                        first.windows(2).all(|pair| pair[0].code() < pair[1].code()),
                        "unsorted or duplicated for {status:?}: {first:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn fresh_issued_card_offers_activation_and_set_pin() {
        let actions = eligibility(&card(CardStatus::Issued), today());
        assert!(actions.contains(&Eligibility::SetPin));
        assert!(actions.contains(&Eligibility::CardActivation));
        assert!(!actions.contains(&Eligibility::ChangePin));
        assert!(!actions.contains(&Eligibility::GetDetails));
        assert!(!actions.contains(&Eligibility::Block));
    }

    #[test]
    fn active_issued_card_offers_details_block_and_change_pin() {
        let mut state = card(CardStatus::Issued);
        state.activation_status = true;
        state.pin_changed_count = 1;
        let actions = eligibility(&state, today());
        for expected in [
            Eligibility::ChangePin,
            Eligibility::GetDetails,
            Eligibility::Block,
            Eligibility::ApplePay,
            Eligibility::CardOnFile,
            Eligibility::CardReplacementLost,
            Eligibility::CardReplacementStolen,
        ] {
            assert!(actions.contains(&expected), "missing {expected:?}");
        }
        assert!(!actions.contains(&Eligibility::SetPin));
        assert!(!actions.contains(&Eligibility::CardActivation));
    }

    #[test]
    fn card_issued_today_cannot_be_reported_lost_or_stolen() {
        let mut state = card(CardStatus::Issued);
        state.issue_date = Some(today());
        let actions = eligibility(&state, today());
        assert!(!actions.contains(&Eligibility::CardReplacementLost));
        assert!(!actions.contains(&Eligibility::CardReplacementStolen));
        assert!(actions.contains(&Eligibility::CardReplacementDamaged));

        let mut replaced = card(CardStatus::Issued);
        replaced.replaced_date = Some(today());
        let actions = eligibility(&replaced, today());
        assert!(!actions.contains(&Eligibility::CardReplacementLost));
    }

    #[test]
    fn status_table_matches_expected_sets() {
        assert_eq!(
            eligibility(&card(CardStatus::TemporaryBlock), today()),
            vec![
                Eligibility::Unblock,
                Eligibility::CardReplacementLost,
                Eligibility::CardReplacementStolen,
                Eligibility::CardReplacementDamaged,
            ]
        );
        assert_eq!(
            eligibility(&card(CardStatus::Lost), today()),
            vec![Eligibility::CardReplacementLost]
        );
        assert_eq!(
            eligibility(&card(CardStatus::Stolen), today()),
            vec![Eligibility::CardReplacementStolen]
        );
        assert_eq!(
            eligibility(&card(CardStatus::DelinquentReturn), today()),
            vec![Eligibility::CardReplacementDamaged]
        );
        assert_eq!(
            eligibility(&card(CardStatus::DelinquentRetain), today()),
            vec![Eligibility::FraudCardCancelled]
        );
        assert_eq!(
            eligibility(&card(CardStatus::BlockCnp), today()),
            vec![Eligibility::FraudSuspected]
        );
    }

    #[test]
    fn closed_unissued_and_unknown_statuses_yield_empty_set() {
        for status in [
            CardStatus::Closed,
            CardStatus::UnissuedNdIciCards,
            CardStatus::Unspecified,
        ] {
            assert!(eligibility(&card(status), today()).is_empty(), "{status:?}");
        }
    }

    #[test]
    fn unknown_status_code_deserializes_to_unspecified() {
        let status: CardStatus = serde_json::from_str("\"PendingShred\"").expect("parses");
        assert_eq!(status, CardStatus::Unspecified);
    }

    #[test]
    fn visibility_predicate() {
        assert!(is_visible(CardStatus::Issued));
        assert!(is_visible(CardStatus::TemporaryBlock));
        assert!(is_visible(CardStatus::BlockAtmPosCnpBch));
        assert!(!is_visible(CardStatus::Lost));
        assert!(!is_visible(CardStatus::Closed));
        assert!(!is_visible(CardStatus::DelinquentRetain));
        assert!(!is_visible(CardStatus::Unspecified));
    }

    #[test]
    fn temporary_block_is_never_eligible_for_activation() {
        let state = card(CardStatus::TemporaryBlock);
        assert!(!eligible_for_activation(&state));
        assert!(eligible_for_activation(&card(CardStatus::Issued)));
        assert!(eligible_for_activation(&card(CardStatus::BlockAtm)));
    }
}
