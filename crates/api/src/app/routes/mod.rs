use axum::{
    Router,
    routing::{delete, get},
};

pub mod awards;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route(
            "/rfqs/:rfq_id/awards",
            get(awards::list_awards).post(awards::create_awards),
        )
        .route("/awards/:award_id", delete(awards::rescind_award))
}
