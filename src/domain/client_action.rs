use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix that marks a rendered step as part of a challenge flow.
pub const CHALLENGE_TAG_PREFIX: &str = "challenge_";

pub const FINGERPRINT_STEP_ID: &str = "threeDSFingerprintIFrame";
pub const ACS_CHALLENGE_STEP_ID: &str = "threeDSChallengeIFrame";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    HiddenIframe,
    VisibleIframe,
    StatusCheck,
}

/// One browser-renderable step of a `Pidl` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PidlStep {
    pub step_id: String,
    pub display_tag: String,
    pub kind: StepKind,
    pub payment_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_action_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form_inputs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_window_size: Option<String>,
}

impl PidlStep {
    /// Creates a step tagged as belonging to the challenge flow.
    pub fn new(step_id: &str, kind: StepKind, payment_session_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            display_tag: format!("{CHALLENGE_TAG_PREFIX}{step_id}"),
            kind,
            payment_session_id: payment_session_id.to_string(),
            form_action_url: None,
            form_inputs: BTreeMap::new(),
            width: None,
            height: None,
            challenge_window_size: None,
        }
    }

    pub fn is_challenge_tagged(&self) -> bool {
        self.display_tag == format!("{CHALLENGE_TAG_PREFIX}{}", self.step_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    pub error_code: String,
    pub message: String,
}

/// The single result shape returned to every caller.
///
/// The `type` tag values are a compatibility contract with existing clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "context")]
pub enum ClientAction {
    ReturnContext(serde_json::Value),
    Pidl(Vec<PidlStep>),
    Redirect(String),
    Failure(FailureDetails),
    MergeData(serde_json::Value),
}

impl ClientAction {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ReturnContext(_) => "ReturnContext",
            Self::Pidl(_) => "Pidl",
            Self::Redirect(_) => "Redirect",
            Self::Failure(_) => "Failure",
            Self::MergeData(_) => "MergeData",
        }
    }
}

/// Response document: `{ "clientAction": { "type": ..., "context": ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientActionEnvelope {
    pub client_action: ClientAction,
}

impl From<ClientAction> for ClientActionEnvelope {
    fn from(client_action: ClientAction) -> Self {
        Self { client_action }
    }
}
