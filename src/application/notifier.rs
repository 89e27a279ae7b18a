use super::orchestrator::{ChallengeSessionOrchestrator, HandlerLookup};
use super::step_builder::BrowserFlowStepBuilder;
use super::upstream::guarded;
use crate::domain::callback::{CompletionToken, verify_session_binding};
use crate::domain::client_action::ClientAction;
use crate::domain::ports::AuthenticationServerRef;
use crate::domain::session::{ChallengeStage, ChallengeStatus, HandlerVersion, PaymentSession, Settlement};
use crate::error::{ChallengeError, Result, UpstreamService};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Form fields posted by the fingerprint iframe.
#[derive(Debug, Clone, Default)]
pub struct MethodNotification {
    pub session_data: Option<String>,
    pub fields: BTreeMap<String, String>,
}

/// Form fields posted by the ACS when the visible challenge ends.
#[derive(Debug, Clone, Default)]
pub struct ChallengeCompletion {
    pub completion_token: String,
    pub session_data: Option<String>,
}

/// Advances sessions when the browser or the ACS calls back.
pub struct ChallengeCompletionNotifier {
    orchestrator: Arc<ChallengeSessionOrchestrator>,
    auth_server: AuthenticationServerRef,
    steps: Arc<BrowserFlowStepBuilder>,
    failure_return_url: Option<String>,
    timeout: Duration,
}

impl ChallengeCompletionNotifier {
    pub fn new(
        orchestrator: Arc<ChallengeSessionOrchestrator>,
        auth_server: AuthenticationServerRef,
        steps: Arc<BrowserFlowStepBuilder>,
        failure_return_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            auth_server,
            steps,
            failure_return_url,
            timeout,
        }
    }

    async fn load(&self, session_id: &str) -> Result<(PaymentSession, HandlerVersion)> {
        let session = self.orchestrator.load_session(session_id).await?;
        let version = self
            .orchestrator
            .resolve_handler_version(HandlerLookup::Session(&session))
            .await?;
        self.orchestrator.toggles().ensure_available(version)?;
        Ok((session, version))
    }

    /// Fingerprint iframe finished: ask for the next step.
    pub async fn on_method_notification(
        &self,
        session_id: &str,
        notification: MethodNotification,
    ) -> Result<ClientAction> {
        verify_session_binding(session_id, notification.session_data.as_deref())?;
        let (mut session, version) = self.load(session_id).await?;

        if session.is_terminal() {
            return self.steps.finish(&session).await;
        }
        if session.stage != ChallengeStage::FingerprintIssued {
            warn!(session_id, stage = ?session.stage, "Unexpected method notification");
            return Err(ChallengeError::ProtocolMismatch(format!(
                "method notification for session {session_id} in stage {:?}",
                session.stage
            )));
        }

        let result = guarded(
            UpstreamService::AuthenticationServer,
            self.timeout,
            self.auth_server
                .submit_method_data(version, &session, &notification.fields),
        )
        .await?;
        session.advance(ChallengeStage::FingerprintResolved);
        info!(session_id, "Fingerprint resolved");

        let action = self.steps.build(&mut session, result).await;
        self.orchestrator.save(&session).await?;
        action
    }

    /// ACS challenge finished: settle the session and report the outcome.
    pub async fn on_challenge_completed(
        &self,
        session_id: &str,
        completion: ChallengeCompletion,
    ) -> Result<ClientAction> {
        verify_session_binding(session_id, completion.session_data.as_deref())?;
        let token = CompletionToken::decode(&completion.completion_token)?;
        let (mut session, version) = self.load(session_id).await?;

        if session.is_terminal() {
            info!(session_id, "Replayed challenge completion");
            return self.conclude(&session).await;
        }
        if session.stage != ChallengeStage::ChallengeIssued {
            return Err(ChallengeError::ProtocolMismatch(format!(
                "challenge completion for session {session_id} in stage {:?}",
                session.stage
            )));
        }
        match &session.server_transaction_id {
            Some(expected) if expected == &token.server_transaction_id => {}
            Some(_) => {
                return Err(ChallengeError::InvalidSession(format!(
                    "completion token for transaction {} does not belong to session {session_id}",
                    token.server_transaction_id
                )));
            }
            None => {
                warn!(session_id, "Challenge issued without a recorded transaction id");
                return Err(ChallengeError::InvalidSession(format!(
                    "no transaction recorded for session {session_id}"
                )));
            }
        }

        let reported = guarded(
            UpstreamService::AuthenticationServer,
            self.timeout,
            self.auth_server.challenge_result(version, &session, &token),
        )
        .await?;
        let status = if reported.is_terminal() {
            reported
        } else {
            warn!(session_id, "Authentication server returned no final status; failing the challenge");
            ChallengeStatus::Failed
        };

        if let Settlement::Applied(status) = session.settle(status) {
            info!(session_id, challenge_status = %status, "Challenge completed");
        }
        self.orchestrator.save(&session).await?;
        self.conclude(&session).await
    }

    async fn conclude(&self, session: &PaymentSession) -> Result<ClientAction> {
        let action = self.steps.finish(session).await?;
        match (&self.failure_return_url, session.challenge_status) {
            (Some(url), ChallengeStatus::Failed) => Ok(self.steps.actions().redirect(url)),
            _ => Ok(action),
        }
    }
}
