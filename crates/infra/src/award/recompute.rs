//! Aggregate status recompute, run at the end of every commit and reversal.

use std::collections::HashSet;

use sourcing_awarding::{
    LineDisposition, Quote, QuoteId, Rfq, RfqLineId, RfqStatus, derive_rfq_status,
    reinstated_quote_status,
};

use crate::store::{AwardTransaction, StoreError};

/// Re-derive and persist the status of each quote in `quote_ids`.
///
/// Quotes in `engine_rejected` were rejected by their own lines before a
/// rescission and may return to `submitted`. Commits pass an empty set.
///
/// Returns the quotes as they stand after the update.
pub(crate) async fn recompute_quotes(
    tx: &mut dyn AwardTransaction,
    quote_ids: &[QuoteId],
    engine_rejected: &HashSet<QuoteId>,
) -> Result<Vec<Quote>, StoreError> {
    let mut ids = quote_ids.to_vec();
    ids.sort();
    ids.dedup();

    let mut quotes = tx.quotes(&ids).await?;
    let lines = tx.quote_lines_for_quotes(&ids).await?;

    for quote in &mut quotes {
        let derived = reinstated_quote_status(
            quote.status,
            engine_rejected.contains(&quote.id),
            lines
                .iter()
                .filter(|l| l.quote_id == quote.id)
                .map(|l| l.status),
        );
        if derived != quote.status {
            tx.set_quote_status(quote.id, derived).await?;
            quote.status = derived;
        }
    }

    Ok(quotes)
}

/// Re-derive and persist the RFQ status from its active awards.
pub(crate) async fn recompute_rfq(
    tx: &mut dyn AwardTransaction,
    rfq: &Rfq,
) -> Result<RfqStatus, StoreError> {
    let lines = tx.rfq_lines(rfq.id).await?;
    let awarded: HashSet<RfqLineId> = tx
        .active_awards_for_rfq(rfq.id)
        .await?
        .into_iter()
        .map(|a| a.rfq_line_id)
        .collect();

    let derived = derive_rfq_status(
        rfq.status,
        lines
            .iter()
            .map(|l| LineDisposition::from_awarded(awarded.contains(&l.id))),
    );
    if derived != rfq.status {
        tx.set_rfq_status(rfq.id, derived).await?;
    }
    Ok(derived)
}
