use crate::domain::browser_flow::BrowserForm;
use crate::domain::client_action::{
    ACS_CHALLENGE_STEP_ID, ClientAction, FINGERPRINT_STEP_ID, FailureDetails, PidlStep, StepKind,
};
use crate::domain::session::PaymentSession;
use crate::domain::signature::SessionSigner;
use crate::error::ChallengeError;
use url::form_urlencoded;

/// Same-origin endpoint that relays iframe form posts to the authentication server.
#[derive(Debug, Clone)]
pub struct CspProxy {
    base_url: String,
    signer: SessionSigner,
}

impl CspProxy {
    pub fn new(public_base_url: &str, signer: SessionSigner) -> Self {
        Self {
            base_url: public_base_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    fn proxied(&self, session_id: &str, target: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("target", target)
            .append_pair("sig", &self.signer.sign_proxy_target(session_id, target))
            .finish();
        format!(
            "{}/paymentSessions/{}/browserFlowProxy?{}",
            self.base_url, session_id, query
        )
    }
}

/// Shapes internal state into the closed set of client actions.
#[derive(Debug, Clone, Default)]
pub struct ClientActionBuilder {
    csp_proxy: Option<CspProxy>,
}

impl ClientActionBuilder {
    pub fn new(csp_proxy: Option<CspProxy>) -> Self {
        Self { csp_proxy }
    }

    pub fn csp_proxy_enabled(&self) -> bool {
        self.csp_proxy.is_some()
    }

    /// Form target for an iframe step. This is the only place the CSP proxy
    /// substitution is applied.
    pub fn form_target(&self, session_id: &str, action_url: &str) -> String {
        match &self.csp_proxy {
            Some(proxy) => proxy.proxied(session_id, action_url),
            None => action_url.to_string(),
        }
    }

    fn iframe_step(
        &self,
        step_id: &str,
        kind: StepKind,
        session: &PaymentSession,
        form: BrowserForm,
    ) -> PidlStep {
        let mut step = PidlStep::new(step_id, kind, &session.id);
        step.form_action_url = Some(self.form_target(&session.id, &form.action_url));
        step.form_inputs = form.inputs;
        step.challenge_window_size = Some(session.challenge_window_size.code().to_string());
        step
    }

    pub fn fingerprint_step(&self, session: &PaymentSession, form: BrowserForm) -> PidlStep {
        let mut step = self.iframe_step(FINGERPRINT_STEP_ID, StepKind::HiddenIframe, session, form);
        step.width = Some("0px".to_string());
        step.height = Some("0px".to_string());
        step
    }

    pub fn challenge_step(&self, session: &PaymentSession, form: BrowserForm) -> PidlStep {
        let mut step = self.iframe_step(ACS_CHALLENGE_STEP_ID, StepKind::VisibleIframe, session, form);
        let (width, height) = session.challenge_window_size.dimensions();
        step.width = Some(width.to_string());
        step.height = Some(height.to_string());
        step
    }

    pub fn status_check_step(&self, session: &PaymentSession, resource_id: &str) -> PidlStep {
        PidlStep::new(resource_id, StepKind::StatusCheck, &session.id)
    }

    pub fn pidl(&self, steps: Vec<PidlStep>) -> ClientAction {
        debug_assert!(steps.iter().all(PidlStep::is_challenge_tagged));
        ClientAction::Pidl(steps)
    }

    pub fn return_context(&self, payload: serde_json::Value) -> ClientAction {
        ClientAction::ReturnContext(payload)
    }

    /// `ReturnContext` carrying the session descriptor itself.
    pub fn session_context(&self, session: &PaymentSession) -> ClientAction {
        ClientAction::ReturnContext(descriptor(session))
    }

    pub fn merge_session(&self, session: &PaymentSession) -> ClientAction {
        ClientAction::MergeData(descriptor(session))
    }

    pub fn redirect(&self, url: &str) -> ClientAction {
        ClientAction::Redirect(url.to_string())
    }

    pub fn failure(&self, error_code: &str, message: &str) -> ClientAction {
        ClientAction::Failure(FailureDetails {
            error_code: error_code.to_string(),
            message: message.to_string(),
        })
    }

    pub fn from_error(&self, err: &ChallengeError) -> ClientAction {
        self.failure(err.code(), &err.to_string())
    }
}

/// Serialized session as handed to callers.
pub fn descriptor(session: &PaymentSession) -> serde_json::Value {
    serde_json::to_value(session).unwrap_or_else(|e| {
        tracing::error!(session_id = %session.id, error = %e, "Failed to serialize session");
        serde_json::Value::Null
    })
}
