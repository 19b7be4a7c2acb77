use super::domain::{CardStatus, StatusReason};

/// Statuses a card may move to from `current`. Every status not listed here is terminal.
pub fn allowed_next_states(current: CardStatus) -> &'static [CardStatus] {
    match current {
        CardStatus::Issued => &[
            CardStatus::DelinquentReturn,
            CardStatus::Lost,
            CardStatus::Stolen,
            CardStatus::TemporaryBlock,
        ],
        CardStatus::TemporaryBlock => &[
            CardStatus::DelinquentReturn,
            CardStatus::Lost,
            CardStatus::Stolen,
            CardStatus::Issued,
        ],
        _ => &[],
    }
}

pub fn valid_next_state(current: CardStatus, next: CardStatus) -> bool {
    allowed_next_states(current).contains(&next)
}

/// Reasons a status change into `status` may carry. `None` means the change must
/// be made without a reason; an empty slice means no change into `status` is valid.
fn allowed_reasons(status: CardStatus) -> Option<&'static [StatusReason]> {
    match status {
        CardStatus::Issued | CardStatus::TemporaryBlock => None,
        CardStatus::Lost | CardStatus::Stolen => Some(&[
            StatusReason::WithPinOrAccountRelated,
            StatusReason::WithoutPin,
        ]),
        CardStatus::DelinquentReturn => Some(&[
            StatusReason::WithPinOrAccountRelated,
            StatusReason::WithoutPin,
            StatusReason::Damaged,
            StatusReason::LastPrimeDebitLinkageDeleted,
            StatusReason::Closed,
            StatusReason::Fraud,
        ]),
        _ => Some(&[]),
    }
}

pub fn valid_reason(status: CardStatus, reason: Option<StatusReason>) -> bool {
    match (allowed_reasons(status), reason) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(allowed), Some(reason)) => allowed.contains(&reason),
        (Some(_), None) => false,
    }
}

/// Reason sent with a status change into `status`.
pub fn reason_for_status(status: CardStatus) -> Option<StatusReason> {
    match status {
        CardStatus::DelinquentReturn => Some(StatusReason::Damaged),
        CardStatus::Lost | CardStatus::Stolen => Some(StatusReason::WithPinOrAccountRelated),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    const ALL_REASONS: [StatusReason; 6] = [
        StatusReason::WithPinOrAccountRelated,
        StatusReason::WithoutPin,
        StatusReason::Damaged,
        StatusReason::LastPrimeDebitLinkageDeleted,
        StatusReason::Closed,
        StatusReason::Fraud,
    ];

    #[test]
    fn issued_and_temporary_block_transitions() {
        assert!(valid_next_state(CardStatus::Issued, CardStatus::Lost));
        assert!(valid_next_state(CardStatus::Issued, CardStatus::TemporaryBlock));
        assert!(!valid_next_state(CardStatus::Issued, CardStatus::Issued));
        assert!(!valid_next_state(CardStatus::Issued, CardStatus::Closed));
        assert!(valid_next_state(CardStatus::TemporaryBlock, CardStatus::Issued));
        assert!(valid_next_state(CardStatus::TemporaryBlock, CardStatus::Stolen));
        assert!(!valid_next_state(CardStatus::TemporaryBlock, CardStatus::TemporaryBlock));
    }

    #[test]
    fn terminal_statuses_reject_every_transition() {
        for current in [
            CardStatus::Lost,
            CardStatus::Stolen,
            CardStatus::DelinquentRetain,
            CardStatus::DelinquentReturn,
            CardStatus::Closed,
            CardStatus::BlockCnp,
            CardStatus::Unspecified,
        ] {
            for next in ALL_STATUSES {
                assert!(
                    !valid_next_state(current, next),
                    "{current:?} -> {next:?} should be illegal"
                );
            }
        }
    }

    #[test]
    fn reason_table() {
        assert!(valid_reason(CardStatus::Issued, None));
        assert!(!valid_reason(CardStatus::TemporaryBlock, Some(StatusReason::Fraud)));
        assert!(valid_reason(CardStatus::Lost, Some(StatusReason::WithoutPin)));
        assert!(!valid_reason(CardStatus::Stolen, Some(StatusReason::Damaged)));
        assert!(!valid_reason(CardStatus::Lost, None));
        assert!(valid_reason(
            CardStatus::DelinquentReturn,
            Some(StatusReason::LastPrimeDebitLinkageDeleted)
        ));
        for reason in ALL_REASONS {
            assert!(!valid_reason(CardStatus::Closed, Some(reason)));
            assert!(!valid_reason(CardStatus::DelinquentRetain, Some(reason)));
        }
        assert!(!valid_reason(CardStatus::Closed, None));
    }

    #[test]
    fn reasons_exist_only_for_reachable_statuses() {
        for status in ALL_STATUSES {
            let reachable = ALL_STATUSES
                .iter()
                .any(|current| valid_next_state(*current, status));
            let accepts_something = valid_reason(status, None)
                || ALL_REASONS.iter().any(|reason| valid_reason(status, Some(*reason)));
            assert_eq!(reachable, accepts_something, "{status:?}");
        }
    }

    #[test]
    fn mapped_reason_is_always_valid_for_reachable_statuses() {
        for status in ALL_STATUSES {
            if ALL_STATUSES
                .iter()
                .any(|current| valid_next_state(*current, status))
            {
                assert!(
                    valid_reason(status, reason_for_status(status)),
                    "{status:?} mapped to {:?}",
                    reason_for_status(status)
                );
            }
        }
    }
}
