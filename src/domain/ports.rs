use super::browser_flow::BrowserFlowResult;
use super::callback::CompletionToken;
use super::instrument::InstrumentDetails;
use super::session::{
    AttachmentTarget, ChallengeStatus, ChallengeType, ChallengeWindowSize, HandlerVersion,
    PaymentSession,
};
use crate::error::UpstreamError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type PortResult<T> = std::result::Result<T, UpstreamError>;

/// Durable keyed storage of session records.
///
/// Atomicity of a single record's read or write is the store's concern.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: PaymentSession) -> PortResult<()>;
    async fn get(&self, session_id: &str) -> PortResult<Option<PaymentSession>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSessionRequest {
    pub payment_session_id: String,
    pub account_id: String,
    pub payment_instrument_id: String,
    pub challenge_type: ChallengeType,
    pub amount: Decimal,
    pub currency: String,
    pub country: Option<String>,
    pub partner: Option<String>,
    pub challenge_window_size: ChallengeWindowSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDecision {
    pub is_challenge_required: bool,
    #[serde(default)]
    pub challenge_status: Option<ChallengeStatus>,
}

/// Where the browser posts once each iframe step finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackUrls {
    pub method_notification_url: String,
    pub challenge_notification_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedPage {
    pub content_type: String,
    pub body: String,
}

/// The 3-D Secure computation.
///
/// Every call names the handler generation whose API it speaks.
#[async_trait]
pub trait AuthenticationServer: Send + Sync {
    async fn create_session(
        &self,
        version: HandlerVersion,
        request: &ChallengeSessionRequest,
    ) -> PortResult<ChallengeDecision>;

    async fn authenticate(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        callbacks: &CallbackUrls,
    ) -> PortResult<BrowserFlowResult>;

    async fn submit_method_data(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        method_data: &BTreeMap<String, String>,
    ) -> PortResult<BrowserFlowResult>;

    async fn challenge_result(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
        token: &CompletionToken,
    ) -> PortResult<ChallengeStatus>;

    async fn start_redirect(
        &self,
        version: HandlerVersion,
        session: &PaymentSession,
    ) -> PortResult<String>;

    /// Forwards a browser form post on behalf of the CSP proxy.
    async fn relay_browser_form(
        &self,
        target: &str,
        fields: &BTreeMap<String, String>,
    ) -> PortResult<RelayedPage>;
}

#[async_trait]
pub trait InstrumentStore: Send + Sync {
    async fn get(
        &self,
        account_id: &str,
        instrument_id: &str,
    ) -> PortResult<Option<InstrumentDetails>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResultRecord {
    pub payment_session_id: String,
    pub account_id: String,
    pub payment_instrument_id: String,
    pub challenge_status: ChallengeStatus,
}

impl From<&PaymentSession> for ChallengeResultRecord {
    fn from(session: &PaymentSession) -> Self {
        Self {
            payment_session_id: session.id.clone(),
            account_id: session.account_id.clone(),
            payment_instrument_id: session.payment_instrument_id.clone(),
            challenge_status: session.challenge_status,
        }
    }
}

/// Records a completed challenge against the entity that owns the order.
#[async_trait]
pub trait OrderAttachmentClient: Send + Sync {
    async fn attach(
        &self,
        target: &AttachmentTarget,
        result: &ChallengeResultRecord,
    ) -> PortResult<serde_json::Value>;
}

pub type SessionStoreRef = Arc<dyn SessionStore>;
pub type AuthenticationServerRef = Arc<dyn AuthenticationServer>;
pub type InstrumentStoreRef = Arc<dyn InstrumentStore>;
pub type OrderAttachmentClientRef = Arc<dyn OrderAttachmentClient>;
