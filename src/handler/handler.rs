use super::{GatherWebhook, OutboundCallRequest, StatusWebhook, TransferWebhook, VoiceWebhook};
use crate::app::AppState;
use crate::dialogue::{prompts, CallResponse, TransferStatus};
use crate::twiml::{self, GATHER_PATH, INCOMING_PATH, STATUS_PATH, TRANSFER_STATUS_PATH};
use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(INCOMING_PATH, post(incoming_handler))
        .route(TRANSFER_STATUS_PATH, post(transfer_status_handler))
        .route(GATHER_PATH, post(gather_handler))
        .route(STATUS_PATH, post(status_handler))
        .route("/call", post(outbound_call_handler))
        .route("/call/lists", get(list_calls))
        .route("/health", get(health_handler))
}

fn twiml_response(state: &AppState, response: &CallResponse) -> Response {
    (
        [(header::CONTENT_TYPE, "text/xml")],
        twiml::render(response, &state.twiml),
    )
        .into_response()
}

/// A webhook body that does not parse still gets call markup back: the
/// caller hears an apology and the call ends.
fn rejected(state: &AppState, hook: &str, rejection: FormRejection) -> Response {
    warn!(hook, "malformed webhook body: {}", rejection);
    twiml_response(state, &CallResponse::hangup(prompts::APOLOGY))
}

pub async fn incoming_handler(
    State(state): State<AppState>,
    form: Result<Form<VoiceWebhook>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return rejected(&state, "incoming", rejection),
    };
    let response = state.controller.on_incoming(&form.call_sid).await;
    twiml_response(&state, &response)
}

pub async fn transfer_status_handler(
    State(state): State<AppState>,
    form: Result<Form<TransferWebhook>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return rejected(&state, "transfer_status", rejection),
    };
    let status = form.dial_call_status.unwrap_or(TransferStatus::Failed);
    let response = state
        .controller
        .on_transfer_status(&form.call_sid, status)
        .await;
    twiml_response(&state, &response)
}

pub async fn gather_handler(
    State(state): State<AppState>,
    form: Result<Form<GatherWebhook>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return rejected(&state, "gather", rejection),
    };
    let response = state
        .controller
        .on_speech(&form.call_sid, form.speech_result.as_deref())
        .await;
    twiml_response(&state, &response)
}

pub async fn status_handler(
    State(state): State<AppState>,
    form: Result<Form<StatusWebhook>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!(hook = "status", "malformed webhook body: {}", rejection);
            return StatusCode::NO_CONTENT.into_response();
        }
    };
    if form.is_final() {
        state.controller.on_call_ended(&form.call_sid);
    }
    StatusCode::NO_CONTENT.into_response()
}

pub async fn outbound_call_handler(
    State(state): State<AppState>,
    Json(request): Json<OutboundCallRequest>,
) -> Response {
    let to = request.to.trim();
    if to.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing destination" })),
        )
            .into_response();
    }

    match state
        .telephony
        .place_call(
            to,
            &state.twiml.url(INCOMING_PATH),
            &state.twiml.url(STATUS_PATH),
        )
        .await
    {
        Ok(call_id) => {
            info!(%call_id, to, "outbound call initiated");
            Json(json!({ "call_id": call_id, "status": "initiated" })).into_response()
        }
        Err(e) => {
            error!(to, "failed to place outbound call: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn list_calls(State(state): State<AppState>) -> Response {
    let calls = state.controller.sessions().list();
    Json(json!({
        "calls": calls.iter().map(|call| {
            json!({
                "id": call.call_id,
                "state": call.state,
                "turn_count": call.turn_count,
                "name": call.name,
                "preferred_time": call.preferred_time,
                "booked": call.booked,
                "created_at": call.created_at.to_rfc3339(),
            })
        }).collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn health_handler() -> Response {
    Json(json!({
        "status": "ok",
        "version": crate::version::get_short_version(),
    }))
    .into_response()
}
