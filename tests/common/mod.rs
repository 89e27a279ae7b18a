#![allow(dead_code)]

use async_trait::async_trait;
use challenge_gateway::config::GatewayConfig;
use challenge_gateway::domain::browser_flow::BrowserFlowResult;
use challenge_gateway::domain::callback::CompletionToken;
use challenge_gateway::domain::instrument::InstrumentDetails;
use challenge_gateway::domain::ports::{
    AuthenticationServer, CallbackUrls, ChallengeDecision, ChallengeResultRecord,
    ChallengeSessionRequest, InstrumentStore, OrderAttachmentClient, PortResult, RelayedPage,
};
use challenge_gateway::domain::session::{
    AttachmentTarget, ChallengeStatus, ChallengeType, ChallengeWindowSize, HandlerVersion,
    PaymentSession, TransactionContext,
};
use challenge_gateway::error::UpstreamError;
use challenge_gateway::infrastructure::in_memory::InMemorySessionStore;
use challenge_gateway::interfaces::http::AppState;
use challenge_gateway::server::{self, Adapters};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const SIGNING_KEY: &str = "5f2b9c0e7a1d4e3f8b6a0c9d2e1f4a7b3c8d5e0f1a2b3c4d5e6f708192a3b4c5";
pub const SERVER_TRANSACTION_ID: &str = "3ds-tx-1";

pub fn config() -> GatewayConfig {
    GatewayConfig {
        signing_key: SIGNING_KEY.to_string(),
        public_base_url: "https://pay.example".to_string(),
        ..GatewayConfig::default()
    }
}

pub fn context(window: ChallengeWindowSize) -> TransactionContext {
    TransactionContext {
        amount: dec!(42.50),
        currency: "EUR".to_string(),
        country: Some("de".to_string()),
        partner: Some("webshop".to_string()),
        challenge_window_size: window,
        attachment_target: Some(AttachmentTarget::Order("ord-1".to_string())),
        is_moto: false,
    }
}

/// Authentication server walking the canonical fingerprint, ACS, result flow.
#[derive(Default)]
pub struct ScriptedAuthServer {
    pub decision: Mutex<Option<ChallengeDecision>>,
    pub authenticate: Mutex<VecDeque<BrowserFlowResult>>,
    pub method: Mutex<VecDeque<BrowserFlowResult>>,
    pub final_status: Mutex<Option<ChallengeStatus>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAuthServer {
    pub fn three_ds2_flow(final_status: ChallengeStatus) -> Self {
        let server = Self::default();
        *server.decision.lock().unwrap() = Some(ChallengeDecision {
            is_challenge_required: true,
            challenge_status: None,
        });
        server.authenticate.lock().unwrap().push_back(BrowserFlowResult::fingerprint(
            "https://acs.example/method",
            BTreeMap::from([("threeDSMethodData".to_string(), "bWV0aG9k".to_string())]),
        ));
        server.method.lock().unwrap().push_back(BrowserFlowResult::acs_challenge(
            "https://acs.example/creq",
            BTreeMap::from([("creq".to_string(), "Y3JlcQ".to_string())]),
            SERVER_TRANSACTION_ID,
        ));
        *server.final_status.lock().unwrap() = Some(final_status);
        server
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str, version: HandlerVersion) {
        self.calls.lock().unwrap().push(format!("{call}:{version}"));
    }

    fn down() -> UpstreamError {
        UpstreamError::Transport("connection refused".to_string())
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
        self.decision.lock().unwrap().clone().ok_or_else(Self::down)
    }

    async fn authenticate(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _callbacks: &CallbackUrls,
    ) -> PortResult<BrowserFlowResult> {
        self.record("authenticate", version);
        self.authenticate.lock().unwrap().pop_front().ok_or_else(Self::down)
    }

    async fn submit_method_data(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _method_data: &BTreeMap<String, String>,
    ) -> PortResult<BrowserFlowResult> {
        self.record("submit_method_data", version);
        self.method.lock().unwrap().pop_front().ok_or_else(Self::down)
    }

    async fn challenge_result(
        &self,
        version: HandlerVersion,
        _session: &PaymentSession,
        _token: &CompletionToken,
    ) -> PortResult<ChallengeStatus> {
        self.record("challenge_result", version);
        self.final_status.lock().unwrap().ok_or_else(Self::down)
    }

    async fn start_redirect(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
    ) -> PortResult<String> {
        self.record("start_redirect", version);
        Ok(format!("https://bank.example/otp/{}", session.id))
    }

    async fn relay_browser_form(
        &self,
        target: &str,
        fields: &BTreeMap<String, String>,
    ) -> PortResult<RelayedPage> {
        Ok(RelayedPage {
            content_type: "text/html; charset=utf-8".to_string(),
            body: format!("<p>{target} {}</p>", fields.len()),
        })
    }
}

/// Every instrument belongs to `acc-1`.
#[derive(Default)]
pub struct StaticInstruments {
    instruments: HashMap<String, InstrumentDetails>,
}

impl StaticInstruments {
    pub fn with(mut self, id: &str, sub_type: Option<&str>, challenge_type: Option<ChallengeType>) -> Self {
        self.instruments.insert(
            id.to_string(),
            InstrumentDetails {
                id: id.to_string(),
                account_id: "acc-1".to_string(),
                family: Some("credit_card".to_string()),
                sub_type: sub_type.map(str::to_string),
                challenge_type,
            },
        );
        self
    }

    pub fn standard() -> Self {
        Self::default()
            .with("card-3ds2", Some("visa"), Some(ChallengeType::ThreeDs2))
            .with("card-3ds1", Some("mastercard"), Some(ChallengeType::ThreeDs1))
            .with("upi-sms", Some("upi"), Some(ChallengeType::Sms))
            .with("sepa", None, None)
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

#[derive(Default)]
pub struct RecordingOrders {
    calls: Mutex<Vec<(AttachmentTarget, ChallengeResultRecord)>>,
}

impl RecordingOrders {
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
        self.calls
            .lock()
            .unwrap()
            .push((target.clone(), result.clone()));
        let order_id = match target {
            AttachmentTarget::Order(id) | AttachmentTarget::PaymentRequest(id) => id.clone(),
        };
        Ok(serde_json::json!({
            "orderId": order_id,
            "paymentSessionId": result.payment_session_id,
            "challengeStatus": result.challenge_status,
        }))
    }
}

pub struct Harness {
    pub state: AppState,
    pub sessions: Arc<InMemorySessionStore>,
    pub auth: Arc<ScriptedAuthServer>,
    pub orders: Arc<RecordingOrders>,
}

pub fn harness(config: GatewayConfig, auth: ScriptedAuthServer) -> Harness {
    harness_with_store(config, auth, Arc::new(InMemorySessionStore::new()))
}

pub fn harness_with_store(
    config: GatewayConfig,
    auth: ScriptedAuthServer,
    sessions: Arc<InMemorySessionStore>,
) -> Harness {
    let auth = Arc::new(auth);
    let orders = Arc::new(RecordingOrders::default());
    let adapters = Adapters {
        sessions: sessions.clone(),
        auth_server: auth.clone(),
        instruments: Arc::new(StaticInstruments::standard()),
        orders: orders.clone(),
    };
    let state = server::build_state(&config, adapters).unwrap();
    Harness {
        state,
        sessions,
        auth,
        orders,
    }
}
