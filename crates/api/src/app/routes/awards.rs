use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use sourcing_awarding::{AwardId, RfqId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub async fn create_awards(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(rfq_id): Path<String>,
    Json(body): Json<dto::CreateAwardsRequest>,
) -> axum::response::Response {
    let rfq_id: RfqId = match dto::parse_id(&rfq_id, "rfq_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .awards()
        .award(
            tenant.tenant_id(),
            rfq_id,
            &body.rows,
            principal.user_id(),
            body.create_purchase_orders,
        )
        .await
    {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(dto::CreateAwardsResponse::from(receipt)),
        )
            .into_response(),
        Err(e) => errors::award_error_to_response(e),
    }
}

pub async fn list_awards(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(rfq_id): Path<String>,
) -> axum::response::Response {
    let rfq_id: RfqId = match dto::parse_id(&rfq_id, "rfq_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.awards().list_awards(tenant.tenant_id(), rfq_id).await {
        Ok(awards) => Json(dto::AwardListResponse { awards }).into_response(),
        Err(e) => errors::award_error_to_response(e),
    }
}

pub async fn rescind_award(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(award_id): Path<String>,
) -> axum::response::Response {
    let award_id: AwardId = match dto::parse_id(&award_id, "award_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .awards()
        .rescind(tenant.tenant_id(), award_id, principal.user_id())
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::award_error_to_response(e),
    }
}
