//! HTTP surface of the gateway.

mod error;
mod post_message;
mod routes;

pub use error::{ApiError, ErrorBody};
pub use post_message::render_post_message;
pub use routes::{CreateSessionBody, PollBody};

use crate::application::notifier::ChallengeCompletionNotifier;
use crate::application::orchestrator::ChallengeSessionOrchestrator;
use crate::application::poller::RedirectStatusPoller;
use crate::application::client_action::ClientActionBuilder;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header flagging an operator-initiated (MOTO) session creation.
pub const OPERATOR_INITIATED_HEADER: &str = "x-operator-initiated";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChallengeSessionOrchestrator>,
    pub notifier: Arc<ChallengeCompletionNotifier>,
    pub poller: Arc<RedirectStatusPoller>,
    pub actions: ClientActionBuilder,
    /// `targetOrigin` of the iframe `postMessage` pages.
    pub post_message_origin: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/paymentSessions", post(routes::create_session))
        .route("/paymentSessions/:id", get(routes::get_session))
        .route("/challengeDescriptions", get(routes::describe_challenge))
        .route(
            "/paymentSessions/:id/authenticate",
            post(routes::method_notification),
        )
        .route(
            "/paymentSessions/:id/notifyThreeDSChallengeCompleted",
            post(routes::challenge_completed),
        )
        .route(
            "/paymentSessions/:id/browserFlowProxy",
            post(routes::browser_flow_proxy),
        )
        .route("/RDSSession", post(routes::poll_redirect_session))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
