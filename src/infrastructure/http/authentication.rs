use super::{Upstream, ensure_success};
use crate::domain::browser_flow::BrowserFlowResult;
use crate::domain::callback::CompletionToken;
use crate::domain::ports::{
    AuthenticationServer, CallbackUrls, ChallengeDecision, ChallengeSessionRequest, PortResult,
    RelayedPage,
};
use crate::domain::session::{ChallengeStatus, ChallengeWindowSize, HandlerVersion, PaymentSession};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateBody<'a> {
    account_id: &'a str,
    payment_instrument_id: &'a str,
    challenge_window_size: ChallengeWindowSize,
    #[serde(flatten)]
    callbacks: &'a CallbackUrls,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MethodNotificationBody<'a> {
    method_data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ChallengeResultBody<'a> {
    #[serde(rename = "threeDSServerTransID")]
    server_transaction_id: &'a str,
    #[serde(rename = "acsTransID", skip_serializing_if = "Option::is_none")]
    acs_transaction_id: Option<&'a str>,
    #[serde(rename = "transStatus", skip_serializing_if = "Option::is_none")]
    trans_status: Option<&'a str>,
    cres: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeResultResponse {
    challenge_status: ChallengeStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectResponse {
    redirect_url: String,
}

/// Authentication server reached over HTTP, one path prefix per handler generation.
#[derive(Clone)]
pub struct HttpAuthenticationServer {
    upstream: Upstream,
}

impl HttpAuthenticationServer {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            upstream: Upstream::new(base_url, http),
        }
    }

    fn session_path<'a>(
        version: HandlerVersion,
        session_id: &'a str,
        action: &'a str,
    ) -> [&'a str; 4] {
        [version.path_segment(), "challengeSessions", session_id, action]
    }
}

#[async_trait]
impl AuthenticationServer for HttpAuthenticationServer {
    async fn create_session(
        &self,
        version: HandlerVersion,
        request: &ChallengeSessionRequest,
    ) -> PortResult<ChallengeDecision> {
        self.upstream
            .post_json(&[version.path_segment(), "challengeSessions"], request)
            .await
    }

    async fn authenticate(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        callbacks: &CallbackUrls,
    ) -> PortResult<BrowserFlowResult> {
        let body = AuthenticateBody {
            account_id: &session.account_id,
            payment_instrument_id: &session.payment_instrument_id,
            challenge_window_size: session.challenge_window_size,
            callbacks,
        };
        let path = Self::session_path(version, &session.id, "authenticate");
        self.upstream.post_json(&path, &body).await
    }

    async fn submit_method_data(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        method_data: &BTreeMap<String, String>,
    ) -> PortResult<BrowserFlowResult> {
        let path = Self::session_path(version, &session.id, "methodNotification");
        self.upstream
            .post_json(&path, &MethodNotificationBody { method_data })
            .await
    }

    async fn challenge_result(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        token: &CompletionToken,
    ) -> PortResult<ChallengeStatus> {
        let body = ChallengeResultBody {
            server_transaction_id: &token.server_transaction_id,
            acs_transaction_id: token.acs_transaction_id.as_deref(),
            trans_status: token.trans_status.as_deref(),
            cres: &token.raw,
        };
        let path = Self::session_path(version, &session.id, "challengeResult");
        let response: ChallengeResultResponse = self.upstream.post_json(&path, &body).await?;
        Ok(response.challenge_status)
    }

    async fn start_redirect(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
    ) -> PortResult<String> {
        let path = Self::session_path(version, &session.id, "redirect");
        let response: RedirectResponse = self
            .upstream
            .post_json(&path, &serde_json::json!({}))
            .await?;
        Ok(response.redirect_url)
    }

    async fn relay_browser_form(
        &self,
        target: &str,
        fields: &BTreeMap<String, String>,
    ) -> PortResult<RelayedPage> {
        let response = self.upstream.http().post(target).form(fields).send().await?;
        let response = ensure_success(response).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("text/html; charset=utf-8")
            .to_string();
        let body = response.text().await?;
        Ok(RelayedPage { content_type, body })
    }
}
