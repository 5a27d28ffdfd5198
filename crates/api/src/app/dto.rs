use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sourcing_awarding::{Award, AwardRequestRow, PurchaseOrder, RfqStatus};
use sourcing_infra::CommitReceipt;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAwardsRequest {
    pub rows: Vec<AwardRequestRow>,
    #[serde(default)]
    pub create_purchase_orders: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreateAwardsResponse {
    pub awards: Vec<Award>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub rfq_status: RfqStatus,
}

impl From<CommitReceipt> for CreateAwardsResponse {
    fn from(receipt: CommitReceipt) -> Self {
        Self {
            awards: receipt.awards,
            purchase_orders: receipt.purchase_orders,
            rfq_status: receipt.rfq_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AwardListResponse {
    pub awards: Vec<Award>,
}

// -------------------------
// Path helpers
// -------------------------

pub fn parse_id<T: FromStr>(raw: &str, field: &'static str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {field}"),
        )
    })
}
