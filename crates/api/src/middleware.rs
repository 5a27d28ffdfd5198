//! Request context from gateway headers.
//!
//! Authentication happens upstream; the gateway forwards the verified identity
//! as `x-tenant-id`, `x-user-id` and an optional comma separated `x-roles`.

use axum::{
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use sourcing_auth::Role;
use sourcing_core::{TenantId, UserId};

use crate::context::{PrincipalContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLES_HEADER: &str = "x-roles";

pub async fn gateway_context(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id: TenantId = parse_header(req.headers(), TENANT_HEADER)?;
    let user_id: UserId = parse_header(req.headers(), USER_HEADER)?;
    let roles = parse_roles(req.headers());

    debug!(tenant_id = %tenant_id, user_id = %user_id, roles = ?roles, "request context");

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut()
        .insert(PrincipalContext::new(user_id, roles));

    Ok(next.run(req).await)
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Result<T, StatusCode> {
    let value = headers.get(name).ok_or(StatusCode::UNAUTHORIZED)?;
    let value = value.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    value.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)
}

fn parse_roles(headers: &HeaderMap) -> Vec<Role> {
    headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| Role::new(r.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
