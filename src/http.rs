//! HTTP surface: `POST /identify`.
//!
//! Handlers stay thin. The blocking store work runs on `spawn_blocking` with
//! the shared connection locked for the whole transaction, and every error is
//! mapped to a status code and a fixed public message here.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use crate::error::{IdentifyError, INTERNAL_MESSAGE};
use crate::state::AppState;
use crate::types::{ErrorResponse, IdentifyRequest, IdentifyResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/identify", post(identify_contact))
        .with_state(state)
}

async fn identify_contact(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::warn!("Rejected identify body: {}", rejection.body_text());
            return json_error(rejection.status(), &rejection.body_text());
        }
    };

    let db = state.db.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let db = db.lock();
        crate::services::identify::identify(&db, &request)
    })
    .await;

    match outcome {
        Ok(Ok(view)) => (StatusCode::OK, Json(IdentifyResponse { contact: view })).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => {
            log::error!("Error processing identify request: worker panicked: {join_err}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
        }
    }
}

fn error_response(err: &IdentifyError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        log::error!("Error processing identify request: {err}");
    }
    json_error(status, err.public_message())
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
