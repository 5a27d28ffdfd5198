use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use sourcing_awarding::{AwardError, ErrorKind};

pub fn award_error_to_response(err: AwardError) -> axum::response::Response {
    let status = award_error_status(&err);
    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    if let Some(row) = err.row() {
        body["row"] = json!(row);
    }
    (status, axum::Json(body)).into_response()
}

fn award_error_status(err: &AwardError) -> StatusCode {
    match (err, err.kind()) {
        (AwardError::DeadlinePassed { .. }, _) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
        (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        (_, ErrorKind::Fatal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
