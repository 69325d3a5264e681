// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tip payment state machine.
//!
//! Transition legality lives here and nowhere else: storage guards its
//! UPDATEs with the current status, but what counts as a legal move is
//! decided by [`PaymentStatus::can_transition`]. The machine is strictly
//! forward-only; the refund-failure rollback in the ledger is a
//! compensating write, not a transition, and is intentionally absent from
//! this table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Payment status of a tip. Stored as TEXT in the `tips` table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Initial state: charge requested, outcome unknown.
    Pending,
    /// The processor confirmed the charge. `succeeded_at` is set.
    Succeeded,
    /// The processor reported failure. Terminal.
    Failed,
    /// A refund has been requested from the processor.
    RefundPending,
    /// The processor confirmed the refund. Terminal.
    Refunded,
}

impl PaymentStatus {
    /// Whether a move from `self` to `to` is in the transition table.
    ///
    /// `PENDING -> SUCCEEDED | FAILED`, `SUCCEEDED -> REFUND_PENDING`,
    /// `REFUND_PENDING -> REFUNDED`. Everything else, including
    /// self-transitions, is illegal.
    pub fn can_transition(self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Pending, Succeeded)
                | (Pending, Failed)
                | (Succeeded, RefundPending)
                | (RefundPending, Refunded)
        )
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    const ALL: [PaymentStatus; 5] = [Pending, Succeeded, Failed, RefundPending, Refunded];

    #[test]
    fn legal_transitions_exactly_match_the_table() {
        let legal = [
            (Pending, Succeeded),
            (Pending, Failed),
            (Succeeded, RefundPending),
            (RefundPending, Refunded),
        ];
        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "{from} -> {to} legality mismatch"
                );
            }
        }
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for from in [Failed, Refunded] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition(to), "{from} -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn no_backward_moves() {
        assert!(!Succeeded.can_transition(Pending));
        assert!(!RefundPending.can_transition(Succeeded));
        assert!(!Refunded.can_transition(RefundPending));
    }

    #[test]
    fn storage_text_is_screaming_snake() {
        assert_eq!(Pending.to_string(), "PENDING");
        assert_eq!(RefundPending.to_string(), "REFUND_PENDING");
    }
}
