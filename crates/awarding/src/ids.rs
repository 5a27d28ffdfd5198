//! Identifiers of the sourcing entities touched by awarding.

use sourcing_core::uuid_newtype;

uuid_newtype!(
    /// Request-for-quote identifier.
    RfqId,
    "RfqId"
);
uuid_newtype!(
    /// One requested part/quantity on an RFQ.
    RfqLineId,
    "RfqLineId"
);
uuid_newtype!(QuoteId, "QuoteId");
uuid_newtype!(QuoteLineId, "QuoteLineId");
uuid_newtype!(SupplierId, "SupplierId");
uuid_newtype!(AwardId, "AwardId");
uuid_newtype!(PurchaseOrderId, "PurchaseOrderId");
uuid_newtype!(PurchaseOrderLineId, "PurchaseOrderLineId");
