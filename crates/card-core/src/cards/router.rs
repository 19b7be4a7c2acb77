use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::domain::{
    CallerContext, CardReference, CardStatus, PartyId, PersonaId, PinAction, ReplacementReason,
    ReplacementRequest,
};
use super::error::{CardError, ErrorKind};
use super::service::CardService;

pub const PARTY_HEADER: &str = "x-party-id";
pub const PERSONA_HEADER: &str = "x-persona-id";
pub const ACTING_PERSONA_HEADER: &str = "x-acting-persona-id";

/// Router builder exposing the card endpoints.
pub fn card_router(service: Arc<CardService>) -> Router {
    Router::new()
        .route("/api/v1/cards/:card_id", get(details_handler))
        .route("/api/v1/cards/:card_id/activation", post(activation_handler))
        .route("/api/v1/cards/:card_id/status", post(status_handler))
        .route("/api/v1/cards/:card_id/pin", post(pin_handler))
        .route(
            "/api/v1/cards/:card_id/replacement",
            post(replacement_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChangeBody {
    pub(crate) status: CardStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PinBody {
    pub(crate) action: PinAction,
    pub(crate) pin_block: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplacementBody {
    pub(crate) reason: ReplacementReason,
}

pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        let view = self.view();
        if view.status == ErrorKind::Internal {
            error!(error = %self, reason = %view.reason, "card request failed");
        }
        (status_code(view.status), Json(view)).into_response()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn caller_from_headers(headers: &HeaderMap) -> Result<CallerContext, Response> {
    let (Some(party), Some(persona)) = (
        header_value(headers, PARTY_HEADER),
        header_value(headers, PERSONA_HEADER),
    ) else {
        return Err(bad_request(
            "MISSING_IDENTITY",
            format!("{PARTY_HEADER} and {PERSONA_HEADER} headers are required"),
        ));
    };

    Ok(CallerContext {
        party_id: PartyId(party),
        persona_id: PersonaId(persona),
        acting_persona_id: header_value(headers, ACTING_PERSONA_HEADER).map(PersonaId),
    })
}

/// Unwraps a JSON body, answering malformed payloads in the card error shape.
fn request_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(body)| body)
        .map_err(|rejection| bad_request("MALFORMED_BODY", rejection.body_text()))
}

fn bad_request(reason: &str, message: String) -> Response {
    let payload = json!({
        "status": ErrorKind::InvalidArgument,
        "reason": reason,
        "message": message,
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

pub(crate) async fn details_handler(
    State(service): State<Arc<CardService>>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.details(&caller, &CardReference(card_id)).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn activation_handler(
    State(service): State<Arc<CardService>>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.activate(&caller, &CardReference(card_id)).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn status_handler(
    State(service): State<Arc<CardService>>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<StatusChangeBody>, JsonRejection>,
) -> Response {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let body = match request_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service
        .change_status(&caller, &CardReference(card_id), body.status)
        .await
    {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn pin_handler(
    State(service): State<Arc<CardService>>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<PinBody>, JsonRejection>,
) -> Response {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let body = match request_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service
        .manage_pin(&caller, &CardReference(card_id), body.action, &body.pin_block)
        .await
    {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn replacement_handler(
    State(service): State<Arc<CardService>>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ReplacementBody>, JsonRejection>,
) -> Response {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let body = match request_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let request = ReplacementRequest {
        card: CardReference(card_id),
        reason: body.reason,
    };

    // Dropped with the handler future, which cancels any fan-out still running.
    let cancel = CancellationToken::new();
    let _scope = cancel.clone().drop_guard();
    match service.replace(&caller, &request, &cancel).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}
