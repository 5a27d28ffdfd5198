//! End-to-end tests of the award engine over the in-memory store.
//!
//! Tests: AwardService → normalizer → commit/reversal executors → store
//!
//! Verifies:
//! - Awarded lines are exclusive, also under concurrent requests
//! - A rejected batch leaves no trace
//! - Converted awards cannot be rescinded
//! - Winners and losers are notified after commit

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use sourcing_auth::{RecipientPolicy, roles};
    use sourcing_awarding::{
        AwardError, AwardRequestRow, AwardStatus, Quote, QuoteId, QuoteLine, QuoteLineId,
        QuoteLineStatus, QuoteStatus, Rfq, RfqId, RfqLine, RfqLineId, RfqStatus, Supplier,
        SupplierId,
    };
    use sourcing_core::{TenantId, UserId};
    use sourcing_events::{EventBus, EventEnvelope, Subscription};

    use crate::award::AwardService;
    use crate::notify::{
        InMemoryRecipientDirectory, Notification, NotificationFanout, Outbox, RecipientScope,
    };
    use crate::purchase_order::{
        DraftOrderMaterializer, MaterializedOrder, PurchaseOrderMaterializer,
    };
    use crate::store::{AwardTransaction, InMemoryAwardStore, StoreError};

    struct Bid {
        supplier: SupplierId,
        quote: QuoteId,
        lines: Vec<QuoteLineId>,
    }

    struct Fixture {
        store: InMemoryAwardStore,
        service: AwardService,
        tenant: TenantId,
        actor: UserId,
        rfq: RfqId,
        lines: Vec<RfqLineId>,
        bids: Vec<Bid>,
    }

    impl Fixture {
        /// One open RFQ with `quantities.len()` lines and `suppliers` quotes,
        /// each quoting every line.
        async fn new(quantities: &[i64], suppliers: usize) -> Self {
            let materializer = Arc::new(DraftOrderMaterializer::default());
            Self::with_materializer(quantities, suppliers, materializer).await
        }

        async fn with_materializer(
            quantities: &[i64],
            suppliers: usize,
            materializer: Arc<dyn PurchaseOrderMaterializer>,
        ) -> Self {
            let store = InMemoryAwardStore::new();
            let tenant = TenantId::new();
            let rfq = Rfq {
                id: RfqId::new(),
                tenant_id: tenant,
                status: RfqStatus::Open,
                deadline: Some(Utc::now() + Duration::days(7)),
            };
            let lines: Vec<RfqLine> = quantities
                .iter()
                .map(|q| RfqLine {
                    id: RfqLineId::new(),
                    rfq_id: rfq.id,
                    quantity: *q,
                })
                .collect();
            let line_ids: Vec<RfqLineId> = lines.iter().map(|l| l.id).collect();
            store.seed_rfq(rfq.clone(), lines).await;

            let mut bids = Vec::new();
            for n in 0..suppliers {
                let supplier = Supplier {
                    id: SupplierId::new(),
                    tenant_id: tenant,
                    name: format!("Supplier {n}"),
                };
                let quote = Quote {
                    id: QuoteId::new(),
                    tenant_id: tenant,
                    rfq_id: rfq.id,
                    supplier_id: supplier.id,
                    status: QuoteStatus::Submitted,
                    withdrawn_at: None,
                };
                let quote_lines: Vec<QuoteLine> = line_ids
                    .iter()
                    .map(|rfq_line_id| QuoteLine {
                        id: QuoteLineId::new(),
                        quote_id: quote.id,
                        rfq_line_id: *rfq_line_id,
                        status: QuoteLineStatus::Pending,
                    })
                    .collect();
                bids.push(Bid {
                    supplier: supplier.id,
                    quote: quote.id,
                    lines: quote_lines.iter().map(|l| l.id).collect(),
                });
                store.seed_supplier(supplier).await;
                store.seed_quote(quote, quote_lines).await;
            }

            let service = AwardService::new(Arc::new(store.clone()), materializer);
            Self {
                store,
                service,
                tenant,
                actor: UserId::new(),
                rfq: rfq.id,
                lines: line_ids,
                bids,
            }
        }

        fn row(&self, line: usize, bid: usize) -> AwardRequestRow {
            AwardRequestRow {
                rfq_line_id: self.lines[line],
                quote_line_id: self.bids[bid].lines[line],
                awarded_qty: None,
            }
        }

        async fn award(
            &self,
            rows: &[AwardRequestRow],
            create_purchase_orders: bool,
        ) -> Result<crate::CommitReceipt, AwardError> {
            self.service
                .award(self.tenant, self.rfq, rows, self.actor, create_purchase_orders)
                .await
        }

        async fn line_status(&self, line: usize, bid: usize) -> QuoteLineStatus {
            self.store
                .quote_line(self.bids[bid].lines[line])
                .await
                .map(|l| l.status)
                .unwrap()
        }

        async fn quote_status(&self, bid: usize) -> QuoteStatus {
            self.store.quote(self.bids[bid].quote).await.unwrap().status
        }

        async fn rfq_status(&self) -> RfqStatus {
            self.store.rfq(self.rfq).await.unwrap().status
        }

        async fn active_awards_on(&self, line: usize) -> usize {
            self.store
                .awards_on_line(self.lines[line])
                .await
                .iter()
                .filter(|a| a.status == AwardStatus::Awarded)
                .count()
        }
    }

    #[tokio::test]
    async fn awarding_with_purchase_orders_converts_the_winner_and_rejects_the_rest() {
        let fx = Fixture::new(&[10], 2).await;

        let receipt = fx.award(&[fx.row(0, 0)], true).await.unwrap();

        assert_eq!(receipt.awards.len(), 1);
        let award = &receipt.awards[0];
        assert_eq!(award.supplier_id, fx.bids[0].supplier);
        assert_eq!(award.awarded_quantity, 10);
        assert!(award.purchase_order_id.is_some());

        assert_eq!(fx.line_status(0, 0).await, QuoteLineStatus::Awarded);
        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Rejected);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Awarded);
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Rejected);
        assert_eq!(fx.rfq_status().await, RfqStatus::Awarded);

        let orders = fx.store.purchase_orders(fx.tenant, fx.rfq).await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].number, "PO-000001");
        assert_eq!(orders[0].supplier_id, fx.bids[0].supplier);
        assert_eq!(orders[0].lines.len(), 1);
        assert_eq!(orders[0].lines[0].quantity, 10);
        assert_eq!(orders[0].lines[0].award_id, Some(award.id));
        assert_eq!(Some(orders[0].id), award.purchase_order_id);
        assert_eq!(receipt.purchase_orders, orders);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_line_award_it_once() {
        // Two lines so the losing quote stays eligible after the first commit.
        let fx = Fixture::new(&[5, 5], 2).await;
        let first = [fx.row(0, 0)];
        let second = [fx.row(0, 1)];

        let (a, b) = tokio::join!(fx.award(&first, false), fx.award(&second, false));

        let (ok, err) = match (a, b) {
            (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
            other => panic!("expected exactly one success, got {other:?}"),
        };
        assert_eq!(ok.awards.len(), 1);
        assert!(matches!(err, AwardError::AlreadyAwarded { .. }), "{err:?}");
        assert_eq!(fx.active_awards_on(0).await, 1);
    }

    #[tokio::test]
    async fn losing_the_race_on_a_single_line_rfq_reports_already_awarded() {
        let fx = Fixture::new(&[10], 2).await;
        let first = [fx.row(0, 0)];
        let second = [fx.row(0, 1)];

        let (a, b) = tokio::join!(fx.award(&first, true), fx.award(&second, true));

        let (ok, err) = match (a, b) {
            (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
            other => panic!("expected exactly one success, got {other:?}"),
        };
        assert_eq!(
            err,
            AwardError::AlreadyAwarded {
                rfq_line_id: fx.lines[0],
                row: Some(0)
            }
        );
        assert_eq!(ok.purchase_orders.len(), 1);
        assert_eq!(fx.active_awards_on(0).await, 1);
        assert_eq!(fx.store.purchase_orders(fx.tenant, fx.rfq).await.len(), 1);
    }

    #[tokio::test]
    async fn award_then_rescind_restores_pending_and_allows_a_fresh_award() {
        let fx = Fixture::new(&[3, 4], 2).await;
        let receipt = fx.award(&[fx.row(0, 0)], false).await.unwrap();
        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Rejected);

        let rescinded = fx
            .service
            .rescind(fx.tenant, receipt.awards[0].id, fx.actor)
            .await
            .unwrap();

        assert_eq!(rescinded.award.status, AwardStatus::Rescinded);
        assert_eq!(rescinded.rfq_status, RfqStatus::Open);
        assert_eq!(fx.line_status(0, 0).await, QuoteLineStatus::Pending);
        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Pending);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Submitted);
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Submitted);
        assert!(fx.store.awards_on_line(fx.lines[0]).await.is_empty());

        let again = fx.award(&[fx.row(0, 1)], false).await.unwrap();
        assert_eq!(again.awards[0].supplier_id, fx.bids[1].supplier);
        assert_eq!(fx.line_status(0, 0).await, QuoteLineStatus::Rejected);
    }

    #[tokio::test]
    async fn converted_award_cannot_be_rescinded() {
        let fx = Fixture::new(&[10], 2).await;
        let receipt = fx.award(&[fx.row(0, 0)], true).await.unwrap();
        let award = &receipt.awards[0];

        let err = fx
            .service
            .rescind(fx.tenant, award.id, fx.actor)
            .await
            .unwrap_err();

        assert!(matches!(err, AwardError::AlreadyConverted { award_id, .. } if award_id == award.id));
        assert_eq!(fx.active_awards_on(0).await, 1);
        assert_eq!(fx.line_status(0, 0).await, QuoteLineStatus::Awarded);
        assert_eq!(fx.rfq_status().await, RfqStatus::Awarded);
    }

    #[tokio::test]
    async fn one_invalid_row_rejects_the_whole_batch() {
        let fx = Fixture::new(&[2, 2], 2).await;
        let mut bad = fx.row(1, 1);
        bad.awarded_qty = Some(3);

        let err = fx.award(&[fx.row(0, 0), bad], true).await.unwrap_err();

        assert_eq!(
            err,
            AwardError::InvalidQuantity {
                row: 1,
                requested: 3,
                max: 2
            }
        );
        assert_eq!(fx.active_awards_on(0).await, 0);
        assert_eq!(fx.line_status(0, 0).await, QuoteLineStatus::Pending);
        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Pending);
        assert!(fx.store.purchase_orders(fx.tenant, fx.rfq).await.is_empty());
        assert_eq!(fx.rfq_status().await, RfqStatus::Open);
    }

    struct FailAfterDraft;

    #[async_trait]
    impl PurchaseOrderMaterializer for FailAfterDraft {
        async fn create_from_quote_lines(
            &self,
            tx: &mut dyn AwardTransaction,
            rfq: &Rfq,
            supplier: &Supplier,
            quote_line_ids: &[QuoteLineId],
            created_by: UserId,
            now: DateTime<Utc>,
        ) -> Result<MaterializedOrder, StoreError> {
            DraftOrderMaterializer::default()
                .create_from_quote_lines(tx, rfq, supplier, quote_line_ids, created_by, now)
                .await?;
            Err(StoreError::Backend("pricing service unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn materializer_failure_rolls_back_everything() {
        let fx = Fixture::with_materializer(&[1], 2, Arc::new(FailAfterDraft)).await;

        let err = fx.award(&[fx.row(0, 0)], true).await.unwrap_err();

        assert!(matches!(err, AwardError::Storage(_)), "{err:?}");
        assert!(fx.store.purchase_orders(fx.tenant, fx.rfq).await.is_empty());
        assert_eq!(fx.active_awards_on(0).await, 0);
        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Pending);

        // The failed transaction released the store.
        let ok = fx.store.rfq(fx.rfq).await;
        assert_eq!(ok.map(|r| r.status), Some(RfqStatus::Open));
    }

    #[tokio::test]
    async fn losing_lines_are_rejected_even_on_already_rejected_quotes() {
        let fx = Fixture::new(&[1], 3).await;
        let mut declined = fx.store.quote(fx.bids[2].quote).await.unwrap();
        declined.status = QuoteStatus::Rejected;
        fx.store.seed_quote(declined, Vec::new()).await;

        fx.award(&[fx.row(0, 0)], false).await.unwrap();

        assert_eq!(fx.line_status(0, 1).await, QuoteLineStatus::Rejected);
        assert_eq!(fx.line_status(0, 2).await, QuoteLineStatus::Rejected);
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Rejected);
        assert_eq!(fx.quote_status(2).await, QuoteStatus::Rejected);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Awarded);
    }

    #[tokio::test]
    async fn losing_a_line_does_not_revive_a_declined_quote() {
        let fx = Fixture::new(&[1, 1], 3).await;
        let mut declined = fx.store.quote(fx.bids[2].quote).await.unwrap();
        declined.status = QuoteStatus::Rejected;
        fx.store.seed_quote(declined, Vec::new()).await;

        let receipt = fx.award(&[fx.row(0, 0)], false).await.unwrap();
        assert_eq!(fx.quote_status(2).await, QuoteStatus::Rejected);
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Submitted);

        let err = fx.award(&[fx.row(1, 2)], false).await.unwrap_err();
        assert_eq!(
            err,
            AwardError::QuoteNotEligible {
                row: 0,
                quote_id: fx.bids[2].quote,
                status: QuoteStatus::Rejected
            }
        );
        assert_eq!(fx.active_awards_on(1).await, 0);

        fx.service
            .rescind(fx.tenant, receipt.awards[0].id, fx.actor)
            .await
            .unwrap();
        assert_eq!(fx.quote_status(2).await, QuoteStatus::Rejected);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Submitted);
    }

    #[tokio::test]
    async fn rescinding_reinstates_quotes_the_award_rejected() {
        let fx = Fixture::new(&[10], 2).await;
        let receipt = fx.award(&[fx.row(0, 0)], false).await.unwrap();
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Rejected);

        fx.service
            .rescind(fx.tenant, receipt.awards[0].id, fx.actor)
            .await
            .unwrap();

        assert_eq!(fx.quote_status(1).await, QuoteStatus::Submitted);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Submitted);
        assert_eq!(fx.rfq_status().await, RfqStatus::Open);
        fx.award(&[fx.row(0, 1)], false).await.unwrap();
    }

    #[tokio::test]
    async fn quotes_stay_submitted_while_they_have_pending_lines() {
        let fx = Fixture::new(&[1, 1], 3).await;
        fx.award(&[fx.row(0, 0)], false).await.unwrap();
        assert_eq!(fx.quote_status(2).await, QuoteStatus::Submitted);
        assert_eq!(fx.rfq_status().await, RfqStatus::Open);

        fx.award(&[fx.row(1, 1)], false).await.unwrap();

        assert_eq!(fx.quote_status(2).await, QuoteStatus::Rejected);
        assert_eq!(fx.quote_status(0).await, QuoteStatus::Awarded);
        assert_eq!(fx.quote_status(1).await, QuoteStatus::Awarded);
        assert_eq!(fx.rfq_status().await, RfqStatus::Awarded);
    }

    #[tokio::test]
    async fn one_purchase_order_per_winning_supplier() {
        let fx = Fixture::new(&[4, 6, 8], 2).await;
        let mut partial = fx.row(1, 0);
        partial.awarded_qty = Some(5);

        let receipt = fx
            .award(&[fx.row(0, 0), fx.row(2, 1), partial], true)
            .await
            .unwrap();

        assert_eq!(receipt.awards.len(), 3);
        assert_eq!(receipt.purchase_orders.len(), 2);
        let first = &receipt.purchase_orders[0];
        assert_eq!(first.supplier_id, fx.bids[0].supplier);
        let quantities: Vec<i64> = first.lines.iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![4, 5]);
        assert_eq!(first.lines[1].line_no, 2);
        assert_eq!(receipt.purchase_orders[1].supplier_id, fx.bids[1].supplier);

        let listed = fx.service.list_awards(fx.tenant, fx.rfq).await.unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn closed_or_expired_rfqs_refuse_awards() {
        let fx = Fixture::new(&[1], 1).await;
        fx.award(&[fx.row(0, 0)], false).await.unwrap();
        let award = fx.service.list_awards(fx.tenant, fx.rfq).await.unwrap()[0].clone();
        fx.service.rescind(fx.tenant, award.id, fx.actor).await.unwrap();

        let mut rfq = fx.store.rfq(fx.rfq).await.unwrap();
        rfq.status = RfqStatus::Closed;
        fx.store.seed_rfq(rfq.clone(), Vec::new()).await;
        let err = fx.award(&[fx.row(0, 0)], false).await.unwrap_err();
        assert!(matches!(err, AwardError::RfqNotOpenForAward { status: RfqStatus::Closed, .. }));

        rfq.status = RfqStatus::Open;
        rfq.deadline = Some(Utc::now() - Duration::hours(1));
        fx.store.seed_rfq(rfq, Vec::new()).await;
        let err = fx.award(&[fx.row(0, 0)], false).await.unwrap_err();
        assert!(matches!(err, AwardError::DeadlinePassed { .. }));
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_the_rfq_or_its_awards() {
        let fx = Fixture::new(&[1], 1).await;
        let receipt = fx.award(&[fx.row(0, 0)], false).await.unwrap();
        let stranger = TenantId::new();

        let err = fx
            .service
            .award(stranger, fx.rfq, &[fx.row(0, 0)], fx.actor, false)
            .await
            .unwrap_err();
        assert_eq!(err, AwardError::RfqNotFound { rfq_id: fx.rfq });

        let err = fx
            .service
            .rescind(stranger, receipt.awards[0].id, fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AwardError::AwardNotFound { .. }));
        assert!(fx.service.list_awards(stranger, fx.rfq).await.unwrap().is_empty());
    }

    fn notifying(
        fx: Fixture,
        directory: Arc<InMemoryRecipientDirectory>,
    ) -> (Fixture, Subscription<EventEnvelope<Notification>>) {
        let outbox = Arc::new(Outbox::new());
        let sub = outbox.subscribe();
        let fanout = NotificationFanout::new(directory, RecipientPolicy::default(), outbox);
        let service = fx.service.clone().with_notifications(fanout);
        (Fixture { service, ..fx }, sub)
    }

    #[tokio::test]
    async fn winners_and_losers_are_notified_after_commit() {
        let fx = Fixture::new(&[2, 2], 2).await;
        let directory = InMemoryRecipientDirectory::arc();
        let winner_contact = UserId::new();
        let loser_contact = UserId::new();
        let (winner, loser) = (fx.bids[0].supplier, fx.bids[1].supplier);
        directory.grant(winner_contact, RecipientScope::Supplier(winner), roles::SUPPLIER_SALES).unwrap();
        directory.grant(loser_contact, RecipientScope::Supplier(loser), roles::SUPPLIER_ADMIN).unwrap();
        let (fx, sub) = notifying(fx, directory);

        let receipt = fx.award(&[fx.row(0, 0), fx.row(1, 0)], true).await.unwrap();

        let delivered: Vec<Notification> =
            sub.drain().into_iter().map(EventEnvelope::into_payload).collect();
        assert_eq!(delivered.len(), 2);

        let won = &delivered[0];
        assert_eq!(won.event_key, "rfq.lines_awarded");
        assert_eq!(won.recipients, vec![winner_contact]);
        assert_eq!(won.resource_id, *fx.rfq.as_uuid());
        assert_eq!(
            won.metadata["purchase_order_number"],
            receipt.purchase_orders[0].number.as_str()
        );

        let lost = &delivered[1];
        assert_eq!(lost.event_key, "rfq.lines_awarded_to_other");
        assert_eq!(lost.recipients, vec![loser_contact]);
        assert_eq!(lost.metadata["rfq_line_ids"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn failed_awards_notify_nobody() {
        let fx = Fixture::new(&[1], 2).await;
        let directory = InMemoryRecipientDirectory::arc();
        directory.grant(UserId::new(), RecipientScope::Platform, roles::PLATFORM_ADMIN).unwrap();
        let (fx, sub) = notifying(fx, directory);

        fx.award(&[fx.row(0, 0)], false).await.unwrap();
        sub.drain();
        fx.award(&[fx.row(0, 1)], false).await.unwrap_err();

        assert!(sub.drain().is_empty());
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Award { line: usize, bid: usize, convert: bool },
            Rescind { line: usize },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..3usize, 0..3usize, any::<bool>())
                    .prop_map(|(line, bid, convert)| Op::Award { line, bid, convert }),
                (0..3usize).prop_map(|line| Op::Rescind { line }),
            ]
        }

        async fn run(ops: Vec<Op>) {
            let fx = Fixture::new(&[1, 2, 3], 3).await;
            for op in ops {
                match op {
                    Op::Award { line, bid, convert } => {
                        let _ = fx.award(&[fx.row(line, bid)], convert).await;
                    }
                    Op::Rescind { line } => {
                        let awards = fx.service.list_awards(fx.tenant, fx.rfq).await.unwrap();
                        if let Some(a) = awards.iter().find(|a| a.rfq_line_id == fx.lines[line]) {
                            let _ = fx.service.rescind(fx.tenant, a.id, fx.actor).await;
                        }
                    }
                }

                for line in 0..fx.lines.len() {
                    let active = fx.active_awards_on(line).await;
                    assert!(active <= 1, "line {line} has {active} active awards");
                    let awarded = {
                        let mut n = 0;
                        for bid in 0..fx.bids.len() {
                            if fx.line_status(line, bid).await == QuoteLineStatus::Awarded {
                                n += 1;
                            }
                        }
                        n
                    };
                    assert_eq!(awarded, active, "line {line}: quote lines disagree with awards");
                }
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

            #[test]
            fn a_line_never_has_two_active_awards(ops in proptest::collection::vec(op(), 1..12)) {
                tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap()
                    .block_on(run(ops));
            }
        }
    }
}
