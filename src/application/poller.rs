use super::orchestrator::{ChallengeSessionOrchestrator, HandlerLookup};
use super::step_builder::BrowserFlowStepBuilder;
use crate::domain::client_action::ClientAction;
use crate::domain::session::{ChallengeStage, ChallengeStatus, PaymentSession, Settlement};
use crate::error::{ChallengeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_STATUS_CHECK_RESOURCE: &str = "rdsStatusCheck";

/// One status query on the redirect path.
#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub payment_session_id: Option<String>,
    /// State reported by the out-of-band flow, if any.
    pub external_state: Option<String>,
    /// The caller will poll again and wants a non-error answer while pending.
    pub polling_mode: bool,
}

/// Normalised meaning of an external redirect-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExternalState {
    Success,
    Failure,
    Pending,
    Absent,
    Unrecognised,
}

impl ExternalState {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            None => Self::Absent,
            Some(s) if s.is_empty() => Self::Absent,
            Some(s) => match s.as_str() {
                "success" => Self::Success,
                "failure" => Self::Failure,
                "pending" | "inprogress" => Self::Pending,
                _ => Self::Unrecognised,
            },
        }
    }
}

/// Status polling for challenges resolved out-of-band (SMS, redirect 3DS1).
pub struct RedirectStatusPoller {
    orchestrator: Arc<ChallengeSessionOrchestrator>,
    steps: Arc<BrowserFlowStepBuilder>,
    status_check_resource: String,
    status_check_overrides: HashMap<String, String>,
}

impl RedirectStatusPoller {
    pub fn new(
        orchestrator: Arc<ChallengeSessionOrchestrator>,
        steps: Arc<BrowserFlowStepBuilder>,
        status_check_resource: &str,
        status_check_overrides: HashMap<String, String>,
    ) -> Self {
        Self {
            orchestrator,
            steps,
            status_check_resource: status_check_resource.to_string(),
            status_check_overrides,
        }
    }

    fn status_check_resource(&self, session: &PaymentSession) -> &str {
        session
            .instrument_sub_type
            .as_ref()
            .and_then(|sub_type| self.status_check_overrides.get(sub_type))
            .map(String::as_str)
            .unwrap_or(&self.status_check_resource)
    }

    /// Attaches the stored outcome, then shapes it for the poll caller.
    async fn conclude(&self, session: &PaymentSession) -> Result<ClientAction> {
        let action = self.steps.finish(session).await?;
        if session.challenge_status == ChallengeStatus::Failed {
            return Ok(self.steps.actions().failure(
                "ChallengeFailed",
                &format!("challenge for session {} failed", session.id),
            ));
        }
        Ok(action)
    }

    async fn settle(
        &self,
        session: &mut PaymentSession,
        status: ChallengeStatus,
    ) -> Result<ClientAction> {
        if let Settlement::Applied(status) = session.settle(status) {
            info!(session_id = %session.id, challenge_status = %status, "Redirect challenge settled");
        }
        self.orchestrator.save(session).await?;
        self.conclude(session).await
    }

    pub async fn poll(&self, query: StatusQuery) -> Result<ClientAction> {
        let session_id = query
            .payment_session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ChallengeError::InvalidPaymentSession("paymentSessionId is required".to_string())
            })?;

        let mut session = self.orchestrator.load_session(session_id).await?;
        let version = self
            .orchestrator
            .resolve_handler_version(HandlerLookup::Session(&session))
            .await?;
        self.orchestrator.toggles().ensure_available(version)?;

        if !session.challenge_type.is_redirect_style() && !session.is_terminal() {
            return Err(ChallengeError::ProtocolMismatch(format!(
                "session {session_id} is driven by browser callbacks, not status polling"
            )));
        }
        if session.is_terminal() {
            return self.conclude(&session).await;
        }

        let state = ExternalState::parse(query.external_state.as_deref());
        let first_poll = session.stage != ChallengeStage::StatusCheckIssued;

        match state {
            ExternalState::Success => self.settle(&mut session, ChallengeStatus::Succeeded).await,
            ExternalState::Failure => self.settle(&mut session, ChallengeStatus::Failed).await,
            _ if query.polling_mode => Ok(self.steps.actions().session_context(&session)),
            ExternalState::Pending | ExternalState::Absent if first_poll => {
                session.advance(ChallengeStage::StatusCheckIssued);
                self.orchestrator.save(&session).await?;
                let actions = self.steps.actions();
                let step = actions.status_check_step(&session, self.status_check_resource(&session));
                Ok(actions.pidl(vec![step]))
            }
            ExternalState::Pending => Ok(self.steps.actions().merge_session(&session)),
            ExternalState::Absent | ExternalState::Unrecognised => {
                if state == ExternalState::Unrecognised {
                    warn!(
                        session_id,
                        state = query.external_state.as_deref().unwrap_or_default(),
                        "Unrecognised redirect session state, failing the challenge"
                    );
                }
                self.settle(&mut session, ChallengeStatus::Failed).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::client_action::ClientActionBuilder;
    use crate::application::orchestrator::{CallbackRoutes, HandlerToggles};
    use crate::application::testing::{
        RecordingOrders, ScriptedAuthServer, StaticInstruments, context, signer,
    };
    use crate::domain::client_action::StepKind;
    use crate::domain::session::{AttachmentTarget, ChallengeType, TransactionContext};
    use crate::infrastructure::in_memory::InMemorySessionStore;
    use std::time::Duration;

    fn steps(orders: Arc<RecordingOrders>) -> Arc<BrowserFlowStepBuilder> {
        Arc::new(BrowserFlowStepBuilder::new(
            ClientActionBuilder::default(),
            orders,
            Duration::from_secs(1),
        ))
    }

    fn orchestrator(
        challenge_type: ChallengeType,
        steps: Arc<BrowserFlowStepBuilder>,
    ) -> Arc<ChallengeSessionOrchestrator> {
        Arc::new(ChallengeSessionOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(StaticInstruments::default().with("pi-1", Some(challenge_type))),
            Arc::new(ScriptedAuthServer::requiring_challenge()),
            steps,
            signer(),
            HandlerToggles::default(),
            CallbackRoutes::new("https://pay.example"),
            Duration::from_secs(1),
        ))
    }

    async fn setup(challenge_type: ChallengeType) -> (RedirectStatusPoller, PaymentSession) {
        setup_with(challenge_type, context(), Arc::new(RecordingOrders::default())).await
    }

    async fn setup_with(
        challenge_type: ChallengeType,
        ctx: TransactionContext,
        orders: Arc<RecordingOrders>,
    ) -> (RedirectStatusPoller, PaymentSession) {
        let steps = steps(orders);
        let orchestrator = orchestrator(challenge_type, steps.clone());
        let session = orchestrator
            .create_session("acc-1", "pi-1", &ctx)
            .await
            .unwrap();
        let poller = RedirectStatusPoller::new(
            orchestrator,
            steps,
            DEFAULT_STATUS_CHECK_RESOURCE,
            HashMap::new(),
        );
        (poller, session)
    }

    fn query(id: &str, state: Option<&str>, polling_mode: bool) -> StatusQuery {
        StatusQuery {
            payment_session_id: Some(id.to_string()),
            external_state: state.map(str::to_string),
            polling_mode,
        }
    }

    #[test]
    fn test_external_state_parsing() {
        assert_eq!(ExternalState::parse(Some("SUCCESS")), ExternalState::Success);
        assert_eq!(ExternalState::parse(Some("failure")), ExternalState::Failure);
        assert_eq!(ExternalState::parse(Some("InProgress")), ExternalState::Pending);
        assert_eq!(ExternalState::parse(Some(" ")), ExternalState::Absent);
        assert_eq!(ExternalState::parse(None), ExternalState::Absent);
        assert_eq!(ExternalState::parse(Some("exploded")), ExternalState::Unrecognised);
    }

    #[tokio::test]
    async fn test_missing_session_id_rejected() {
        let (poller, _) = setup(ChallengeType::Sms).await;
        let result = poller.poll(StatusQuery::default()).await;
        assert!(matches!(result, Err(ChallengeError::InvalidPaymentSession(_))));
    }

    #[tokio::test]
    async fn test_first_poll_then_success() {
        let (poller, session) = setup(ChallengeType::Sms).await;

        let first = poller.poll(query(&session.id, None, false)).await.unwrap();
        match first {
            ClientAction::Pidl(steps) => {
                assert_eq!(steps[0].kind, StepKind::StatusCheck);
                assert_eq!(steps[0].step_id, DEFAULT_STATUS_CHECK_RESOURCE);
                assert_eq!(steps[0].display_tag, "challenge_rdsStatusCheck");
            }
            other => panic!("unexpected {other:?}"),
        }

        let second = poller
            .poll(query(&session.id, Some("success"), false))
            .await
            .unwrap();
        match second {
            ClientAction::ReturnContext(payload) => {
                assert_eq!(payload["challengeStatus"], "Succeeded")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_polling_mode_returns_unknown() {
        let (poller, session) = setup(ChallengeType::ThreeDs1).await;
        let action = poller.poll(query(&session.id, None, true)).await.unwrap();
        match action {
            ClientAction::ReturnContext(payload) => {
                assert_eq!(payload["challengeStatus"], "Unknown")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrecognised_state_fails() {
        let (poller, session) = setup(ChallengeType::Sms).await;
        let action = poller
            .poll(query(&session.id, Some("weird"), false))
            .await
            .unwrap();
        assert!(matches!(action, ClientAction::Failure(_)));

        // Terminal afterwards, even if success arrives later.
        let again = poller
            .poll(query(&session.id, Some("success"), false))
            .await
            .unwrap();
        assert!(matches!(again, ClientAction::Failure(_)));
    }

    #[tokio::test]
    async fn test_repeat_pending_poll_merges() {
        let (poller, session) = setup(ChallengeType::Sms).await;
        poller.poll(query(&session.id, Some("pending"), false)).await.unwrap();
        let action = poller
            .poll(query(&session.id, Some("pending"), false))
            .await
            .unwrap();
        assert!(matches!(action, ClientAction::MergeData(_)));
    }

    #[tokio::test]
    async fn test_absent_state_after_first_poll_fails() {
        let (poller, session) = setup(ChallengeType::Sms).await;
        poller.poll(query(&session.id, None, false)).await.unwrap();
        let action = poller.poll(query(&session.id, None, false)).await.unwrap();
        assert!(matches!(action, ClientAction::Failure(_)));
    }

    #[tokio::test]
    async fn test_explicit_failure_wins_over_polling_mode() {
        let orders = Arc::new(RecordingOrders::default());
        let mut ctx = context();
        ctx.attachment_target = Some(AttachmentTarget::Order("ord-9".to_string()));
        let (poller, session) = setup_with(ChallengeType::Sms, ctx, orders.clone()).await;

        let action = poller
            .poll(query(&session.id, Some("failure"), true))
            .await
            .unwrap();
        assert!(matches!(action, ClientAction::Failure(_)));
        let calls = orders.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.challenge_status, ChallengeStatus::Failed);
    }

    #[tokio::test]
    async fn test_success_is_attached_to_order() {
        let orders = Arc::new(RecordingOrders::default());
        let mut ctx = context();
        ctx.attachment_target = Some(AttachmentTarget::Order("ord-3".to_string()));
        let (poller, session) = setup_with(ChallengeType::ThreeDs1, ctx, orders.clone()).await;

        let action = poller
            .poll(query(&session.id, Some("success"), false))
            .await
            .unwrap();
        match action {
            ClientAction::ReturnContext(payload) => assert_eq!(payload["orderId"], "ord-3"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(orders.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sub_type_override() {
        let steps = steps(Arc::new(RecordingOrders::default()));
        let orchestrator = orchestrator(ChallengeType::Sms, steps.clone());
        let mut session = orchestrator
            .create_session("acc-1", "pi-1", &context())
            .await
            .unwrap();
        session.instrument_sub_type = Some("upi".to_string());
        orchestrator.save(&session).await.unwrap();

        let poller = RedirectStatusPoller::new(
            orchestrator,
            steps,
            DEFAULT_STATUS_CHECK_RESOURCE,
            HashMap::from([("upi".to_string(), "upiStatusCheck".to_string())]),
        );
        let action = poller.poll(query(&session.id, None, false)).await.unwrap();
        match action {
            ClientAction::Pidl(steps) => {
                assert_eq!(steps[0].step_id, "upiStatusCheck");
                assert_eq!(steps[0].display_tag, "challenge_upiStatusCheck");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_three_ds2_session_is_not_polled() {
        let (poller, session) = setup(ChallengeType::ThreeDs2).await;
        let result = poller.poll(query(&session.id, Some("success"), false)).await;
        assert!(matches!(result, Err(ChallengeError::ProtocolMismatch(_))));
    }
}
