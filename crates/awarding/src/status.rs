//! Aggregate statuses derived from line statuses.
//!
//! Quote and RFQ statuses are never set directly by the award workflow; they
//! are recomputed from their lines after every commit or reversal. Both
//! functions are pure so they can be property-tested in isolation.

use crate::model::{QuoteLineStatus, QuoteStatus, RfqStatus};

/// Whether an RFQ line currently carries an active award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDisposition {
    Pending,
    Awarded,
}

impl LineDisposition {
    pub fn from_awarded(awarded: bool) -> Self {
        if awarded {
            LineDisposition::Awarded
        } else {
            LineDisposition::Pending
        }
    }
}

/// Quote status implied by its line statuses.
///
/// A withdrawn quote stays withdrawn. Otherwise one awarded line makes the
/// quote awarded and all-rejected lines make it rejected. When the lines
/// decide nothing the current status is kept, except that an awarded quote
/// with no awarded line left falls back to submitted.
///
/// A `rejected` quote is never revived here; see [`reinstated_quote_status`].
pub fn derive_quote_status<I>(current: QuoteStatus, lines: I) -> QuoteStatus
where
    I: IntoIterator<Item = QuoteLineStatus>,
{
    if current == QuoteStatus::Withdrawn {
        return current;
    }

    let mut any = false;
    let mut all_rejected = true;
    for status in lines {
        any = true;
        match status {
            QuoteLineStatus::Awarded => return QuoteStatus::Awarded,
            QuoteLineStatus::Rejected => {}
            QuoteLineStatus::Pending => all_rejected = false,
        }
    }

    if any && all_rejected {
        QuoteStatus::Rejected
    } else if current == QuoteStatus::Awarded {
        QuoteStatus::Submitted
    } else {
        current
    }
}

/// Whether a quote's lines are all rejected, i.e. the state in which the
/// engine itself marks the quote `rejected`.
pub fn all_lines_rejected<I>(lines: I) -> bool
where
    I: IntoIterator<Item = QuoteLineStatus>,
{
    let mut any = false;
    for status in lines {
        if status != QuoteLineStatus::Rejected {
            return false;
        }
        any = true;
    }
    any
}

/// Status of a quote after a rescission reopened some of its lines.
///
/// `engine_rejected` tells whether the quote's rejection came from its lines
/// (every line was rejected before the rescission). Only such a quote goes
/// back to `submitted`; a quote declined by some other workflow stays
/// `rejected`.
pub fn reinstated_quote_status<I>(
    current: QuoteStatus,
    engine_rejected: bool,
    lines: I,
) -> QuoteStatus
where
    I: IntoIterator<Item = QuoteLineStatus>,
{
    let current = if current == QuoteStatus::Rejected && engine_rejected {
        QuoteStatus::Submitted
    } else {
        current
    };
    derive_quote_status(current, lines)
}

/// RFQ status implied by the award state of its lines.
///
/// Only `open` and `awarded` move: an RFQ with every line awarded becomes
/// `awarded`, and an `awarded` RFQ with a line freed by a rescission reopens.
/// `draft`, `closed` and `cancelled` are owned by other workflows.
pub fn derive_rfq_status<I>(current: RfqStatus, lines: I) -> RfqStatus
where
    I: IntoIterator<Item = LineDisposition>,
{
    match current {
        RfqStatus::Draft | RfqStatus::Closed | RfqStatus::Cancelled => return current,
        RfqStatus::Open | RfqStatus::Awarded => {}
    }

    let mut any = false;
    let mut all_awarded = true;
    for line in lines {
        any = true;
        if line == LineDisposition::Pending {
            all_awarded = false;
        }
    }

    if any && all_awarded {
        RfqStatus::Awarded
    } else if current == RfqStatus::Awarded {
        RfqStatus::Open
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use LineDisposition::{Awarded as A, Pending as P};
    use QuoteLineStatus as L;

    #[test]
    fn one_awarded_line_awards_the_quote() {
        let status = derive_quote_status(
            QuoteStatus::Submitted,
            [L::Rejected, L::Awarded, L::Pending],
        );
        assert_eq!(status, QuoteStatus::Awarded);
    }

    #[test]
    fn all_rejected_lines_reject_the_quote() {
        let status = derive_quote_status(QuoteStatus::Submitted, [L::Rejected, L::Rejected]);
        assert_eq!(status, QuoteStatus::Rejected);
    }

    #[test]
    fn rescinded_win_returns_quote_to_submitted() {
        let status = derive_quote_status(QuoteStatus::Awarded, [L::Pending, L::Rejected]);
        assert_eq!(status, QuoteStatus::Submitted);
    }

    #[test]
    fn pending_lines_keep_a_declined_quote_rejected() {
        let status = derive_quote_status(QuoteStatus::Rejected, [L::Rejected, L::Pending]);
        assert_eq!(status, QuoteStatus::Rejected);
    }

    #[test]
    fn rescission_reinstates_only_engine_rejected_quotes() {
        let lines = [L::Pending, L::Rejected];
        assert_eq!(
            reinstated_quote_status(QuoteStatus::Rejected, true, lines),
            QuoteStatus::Submitted
        );
        assert_eq!(
            reinstated_quote_status(QuoteStatus::Rejected, false, lines),
            QuoteStatus::Rejected
        );
        assert_eq!(
            reinstated_quote_status(QuoteStatus::Awarded, false, lines),
            QuoteStatus::Submitted
        );
    }

    #[test]
    fn all_lines_rejected_needs_at_least_one_line() {
        assert!(all_lines_rejected([L::Rejected, L::Rejected]));
        assert!(!all_lines_rejected([L::Rejected, L::Pending]));
        assert!(!all_lines_rejected(Vec::<L>::new()));
    }

    #[test]
    fn withdrawn_quote_is_untouched() {
        let status = derive_quote_status(QuoteStatus::Withdrawn, [L::Awarded]);
        assert_eq!(status, QuoteStatus::Withdrawn);
    }

    #[test]
    fn quote_without_lines_stays_submitted() {
        assert_eq!(
            derive_quote_status(QuoteStatus::Submitted, Vec::<L>::new()),
            QuoteStatus::Submitted
        );
    }

    #[test]
    fn fully_awarded_rfq_is_awarded() {
        assert_eq!(derive_rfq_status(RfqStatus::Open, [A, A]), RfqStatus::Awarded);
    }

    #[test]
    fn partially_awarded_rfq_stays_open() {
        assert_eq!(derive_rfq_status(RfqStatus::Open, [A, P]), RfqStatus::Open);
    }

    #[test]
    fn rescission_reopens_an_awarded_rfq() {
        assert_eq!(derive_rfq_status(RfqStatus::Awarded, [A, P]), RfqStatus::Open);
    }

    #[test]
    fn terminal_and_draft_statuses_are_not_touched() {
        for status in [RfqStatus::Draft, RfqStatus::Closed, RfqStatus::Cancelled] {
            assert_eq!(derive_rfq_status(status, [A, A]), status);
            assert_eq!(derive_rfq_status(status, [P]), status);
        }
    }

    fn line_status() -> impl Strategy<Value = QuoteLineStatus> {
        prop_oneof![
            Just(QuoteLineStatus::Pending),
            Just(QuoteLineStatus::Awarded),
            Just(QuoteLineStatus::Rejected),
        ]
    }

    fn live_quote_status() -> impl Strategy<Value = QuoteStatus> {
        prop_oneof![
            Just(QuoteStatus::Submitted),
            Just(QuoteStatus::Rejected),
            Just(QuoteStatus::Awarded),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn quote_status_follows_lines_only_when_they_decide(
            current in live_quote_status(),
            lines in prop::collection::vec(line_status(), 0..12),
        ) {
            let derived = derive_quote_status(current, lines.clone());
            let expected = if lines.contains(&QuoteLineStatus::Awarded) {
                QuoteStatus::Awarded
            } else if all_lines_rejected(lines.iter().copied()) {
                QuoteStatus::Rejected
            } else if current == QuoteStatus::Awarded {
                QuoteStatus::Submitted
            } else {
                current
            };
            prop_assert_eq!(derived, expected);
        }

        #[test]
        fn quote_is_awarded_iff_some_line_is(
            lines in prop::collection::vec(line_status(), 0..12),
        ) {
            let awarded = lines.contains(&QuoteLineStatus::Awarded);
            prop_assert_eq!(
                derive_quote_status(QuoteStatus::Submitted, lines) == QuoteStatus::Awarded,
                awarded
            );
        }

        #[test]
        fn rfq_is_awarded_iff_every_line_is(
            start_awarded in any::<bool>(),
            awarded in prop::collection::vec(any::<bool>(), 1..12),
        ) {
            let current = if start_awarded { RfqStatus::Awarded } else { RfqStatus::Open };
            let derived = derive_rfq_status(
                current,
                awarded.iter().copied().map(LineDisposition::from_awarded),
            );
            let expected = if awarded.iter().all(|a| *a) { RfqStatus::Awarded } else { RfqStatus::Open };
            prop_assert_eq!(derived, expected);
        }
    }
}
