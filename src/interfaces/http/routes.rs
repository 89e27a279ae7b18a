use super::error::ApiError;
use super::post_message::render_post_message;
use super::{AppState, OPERATOR_INITIATED_HEADER};
use crate::application::client_action::descriptor;
use crate::application::notifier::{ChallengeCompletion, MethodNotification};
use crate::application::poller::StatusQuery;
use crate::domain::client_action::{ClientAction, ClientActionEnvelope};
use crate::domain::session::TransactionContext;
use crate::error::{ChallengeError, Result};
use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use std::collections::BTreeMap;

const SESSION_DATA_FIELD: &str = "threeDSSessionData";
const COMPLETION_TOKEN_FIELD: &str = "cres";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    pub account_id: String,
    pub payment_instrument_id: String,
    pub transaction_context: TransactionContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollBody {
    #[serde(default)]
    pub payment_session_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub polling_mode: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DescriptionParams {
    payment_session_or_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProxyParams {
    target: String,
    sig: String,
}

fn is_operator_initiated(headers: &HeaderMap) -> bool {
    headers
        .get(OPERATOR_INITIATED_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

fn envelope(action: ClientAction) -> Json<ClientActionEnvelope> {
    Json(ClientActionEnvelope::from(action))
}

/// Iframe callbacks always answer 200 with a `postMessage` page.
fn callback_page(state: &AppState, outcome: Result<ClientAction>) -> Html<String> {
    let action = outcome.unwrap_or_else(|err| {
        tracing::warn!(error = %err, error_code = err.code(), "Callback rejected");
        state.actions.from_error(&err)
    });
    Html(render_post_message(action, &state.post_message_origin))
}

fn malformed_form(rejection: FormRejection) -> ChallengeError {
    ChallengeError::ProtocolMismatch(format!("malformed callback body: {rejection}"))
}

/// POST /paymentSessions
pub(super) async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<CreateSessionBody>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(mut body) = body.map_err(|rejection| {
        ChallengeError::InvalidSession(format!("malformed session request: {rejection}"))
    })?;
    if is_operator_initiated(&headers) {
        body.transaction_context.is_moto = true;
    }
    let session = state
        .orchestrator
        .create_session(
            &body.account_id,
            &body.payment_instrument_id,
            &body.transaction_context,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(descriptor(&session))).into_response())
}

/// GET /paymentSessions/{id}
pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .orchestrator
        .get_session(&id)
        .await?
        .ok_or_else(|| ChallengeError::InvalidSession(format!("unknown session {id}")))?;
    Ok(Json(descriptor(&session)))
}

/// GET /challengeDescriptions?paymentSessionOrData=
pub(super) async fn describe_challenge(
    State(state): State<AppState>,
    Query(params): Query<DescriptionParams>,
) -> std::result::Result<Json<ClientActionEnvelope>, ApiError> {
    let reference = params
        .payment_session_or_data
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ChallengeError::InvalidSession("paymentSessionOrData is required".into()))?;
    let action = state.orchestrator.describe_challenge(&reference).await?;
    Ok(envelope(action))
}

/// POST /paymentSessions/{id}/authenticate
pub(super) async fn method_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: std::result::Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Html<String> {
    let outcome = match form {
        Ok(Form(mut fields)) => {
            let notification = MethodNotification {
                session_data: fields.remove(SESSION_DATA_FIELD),
                fields,
            };
            state.notifier.on_method_notification(&id, notification).await
        }
        Err(rejection) => Err(malformed_form(rejection)),
    };
    callback_page(&state, outcome)
}

/// POST /paymentSessions/{id}/notifyThreeDSChallengeCompleted
pub(super) async fn challenge_completed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: std::result::Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Html<String> {
    let outcome = match form {
        Ok(Form(mut fields)) => {
            let completion = ChallengeCompletion {
                completion_token: fields.remove(COMPLETION_TOKEN_FIELD).unwrap_or_default(),
                session_data: fields.remove(SESSION_DATA_FIELD),
            };
            state.notifier.on_challenge_completed(&id, completion).await
        }
        Err(rejection) => Err(malformed_form(rejection)),
    };
    callback_page(&state, outcome)
}

/// POST /paymentSessions/{id}/browserFlowProxy?target=&sig=
pub(super) async fn browser_flow_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: std::result::Result<Query<ProxyParams>, QueryRejection>,
    form: std::result::Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> std::result::Result<Response, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        ChallengeError::InvalidSession(format!("proxy target and signature are required: {rejection}"))
    })?;
    let Form(fields) = form.map_err(|rejection| {
        ChallengeError::InvalidSession(format!("malformed browser form: {rejection}"))
    })?;
    let page = state
        .orchestrator
        .relay_browser_form(&id, &params.target, &params.sig, &fields)
        .await?;
    Ok(([(header::CONTENT_TYPE, page.content_type)], page.body).into_response())
}

/// POST /RDSSession
pub(super) async fn poll_redirect_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<PollBody>, JsonRejection>,
) -> std::result::Result<Json<ClientActionEnvelope>, ApiError> {
    // An unreadable body carries no correlation id either.
    let Json(body) = body.map_err(|rejection| {
        ChallengeError::InvalidPaymentSession(format!("paymentSessionId is required: {rejection}"))
    })?;
    let action = state
        .poller
        .poll(StatusQuery {
            payment_session_id: body.payment_session_id,
            external_state: body.state,
            polling_mode: body.polling_mode,
        })
        .await?;
    Ok(envelope(action))
}

/// GET /health
pub(super) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
