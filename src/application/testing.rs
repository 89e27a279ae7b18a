//! Scripted collaborators for unit tests of the application layer.

use crate::domain::browser_flow::BrowserFlowResult;
use crate::domain::callback::CompletionToken;
use crate::domain::instrument::InstrumentDetails;
use crate::domain::ports::{
    AuthenticationServer, CallbackUrls, ChallengeDecision, ChallengeResultRecord,
    ChallengeSessionRequest, InstrumentStore, OrderAttachmentClient, PortResult, RelayedPage,
};
use crate::domain::session::{
    AttachmentTarget, ChallengeStatus, ChallengeType, ChallengeWindowSize, HandlerVersion,
    PaymentSession, TransactionContext,
};
use crate::domain::signature::SessionSigner;
use crate::error::UpstreamError;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

pub fn signer() -> SessionSigner {
    SessionSigner::new(&[42u8; 32]).unwrap()
}

pub fn context() -> TransactionContext {
    TransactionContext {
        amount: dec!(25.00),
        currency: "EUR".to_string(),
        country: Some("fr".to_string()),
        partner: Some("storefront".to_string()),
        challenge_window_size: ChallengeWindowSize::Small,
        attachment_target: None,
        is_moto: false,
    }
}

pub fn pending_session(id: &str) -> PaymentSession {
    PaymentSession::new(
        id.to_string(),
        "acc-1",
        "pi-1",
        None,
        ChallengeType::ThreeDs2,
        HandlerVersion::V2,
        &context(),
        ChallengeStatus::Unknown,
    )
}

#[derive(Default)]
pub struct RecordingOrders {
    calls: Mutex<Vec<(AttachmentTarget, ChallengeResultRecord)>>,
    fail: bool,
}

impl RecordingOrders {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(AttachmentTarget, ChallengeResultRecord)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderAttachmentClient for RecordingOrders {
    async fn attach(
        &self,
        target: &AttachmentTarget,
        result: &ChallengeResultRecord,
    ) -> PortResult<serde_json::Value> {
        if self.fail {
            return Err(UpstreamError::Transport("connection refused".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((target.clone(), result.clone()));
        let key = match target {
            AttachmentTarget::Order(_) => "orderId",
            AttachmentTarget::PaymentRequest(_) => "paymentRequestId",
        };
        let id = match target {
            AttachmentTarget::Order(id) | AttachmentTarget::PaymentRequest(id) => id,
        };
        Ok(serde_json::json!({ key: id, "challengeStatus": result.challenge_status }))
    }
}

#[derive(Default)]
pub struct StaticInstruments {
    instruments: HashMap<String, InstrumentDetails>,
}

impl StaticInstruments {
    pub fn with(mut self, id: &str, challenge_type: Option<ChallengeType>) -> Self {
        self.instruments.insert(
            id.to_string(),
            InstrumentDetails {
                id: id.to_string(),
                account_id: "acc-1".to_string(),
                family: Some("credit_card".to_string()),
                sub_type: None,
                challenge_type,
            },
        );
        self
    }
}

#[async_trait]
impl InstrumentStore for StaticInstruments {
    async fn get(
        &self,
        _account_id: &str,
        instrument_id: &str,
    ) -> PortResult<Option<InstrumentDetails>> {
        Ok(self.instruments.get(instrument_id).cloned())
    }
}

/// Authentication server that answers from queues and records every call.
#[derive(Default)]
pub struct ScriptedAuthServer {
    pub decision: Mutex<Option<ChallengeDecision>>,
    pub authenticate: Mutex<VecDeque<BrowserFlowResult>>,
    pub method: Mutex<VecDeque<BrowserFlowResult>>,
    pub final_status: Mutex<Option<ChallengeStatus>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedAuthServer {
    pub fn requiring_challenge() -> Self {
        let server = Self::default();
        *server.decision.lock().unwrap() = Some(ChallengeDecision {
            is_challenge_required: true,
            challenge_status: None,
        });
        server
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str, version: HandlerVersion) {
        self.calls.lock().unwrap().push(format!("{call}:{version}"));
    }

    fn unreachable() -> UpstreamError {
        UpstreamError::Transport("connection refused".into())
    }
}

#[async_trait]
impl AuthenticationServer for ScriptedAuthServer {
    async fn create_session(
        &self,
        version: HandlerVersion,
        _request: &ChallengeSessionRequest,
    ) -> PortResult<ChallengeDecision> {
        self.record("create_session", version);
        self.decision.lock().unwrap().clone().ok_or_else(Self::unreachable)
    }

    async fn authenticate(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _callbacks: &CallbackUrls,
    ) -> PortResult<BrowserFlowResult> {
        self.record("authenticate", version);
        self.authenticate.lock().unwrap().pop_front().ok_or_else(Self::unreachable)
    }

    async fn submit_method_data(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _method_data: &BTreeMap<String, String>,
    ) -> PortResult<BrowserFlowResult> {
        self.record("submit_method_data", version);
        self.method.lock().unwrap().pop_front().ok_or_else(Self::unreachable)
    }

    async fn challenge_result(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _token: &CompletionToken,
    ) -> PortResult<ChallengeStatus> {
        self.record("challenge_result", version);
        self.final_status.lock().unwrap().ok_or_else(Self::unreachable)
    }

    async fn start_redirect(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
    ) -> PortResult<String> {
        self.record("start_redirect", version);
        Ok(format!("https://bank.example/redirect/{}", session.id))
    }

    async fn relay_browser_form(
        &self,
        target: &str,
        _fields: &BTreeMap<String, String>,
    ) -> PortResult<RelayedPage> {
        Ok(RelayedPage {
            content_type: "text/html".to_string(),
            body: format!("<html>{target}</html>"),
        })
    }
}
