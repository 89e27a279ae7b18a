use super::session::ChallengeStatus;
use crate::error::{ChallengeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of the authentication server for one step of the browser flow.
///
/// This is the wire shape. It is never persisted; it is converted into a
/// [`BrowserStep`] before anything acts on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserFlowResult {
    #[serde(default)]
    pub is_fingerprint_required: bool,
    #[serde(default)]
    pub is_acs_challenge_required: bool,
    #[serde(default)]
    pub form_action_url: Option<String>,
    #[serde(default)]
    pub form_inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub resolved_status: Option<ChallengeStatus>,
    #[serde(default, rename = "threeDSServerTransId")]
    pub server_transaction_id: Option<String>,
}

/// Form the browser must post, copied verbatim from the authentication server.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserForm {
    pub action_url: String,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserStep {
    Fingerprint(BrowserForm),
    AcsChallenge {
        form: BrowserForm,
        server_transaction_id: String,
    },
    Terminal(ChallengeStatus),
}

impl BrowserFlowResult {
    pub fn fingerprint(action_url: &str, inputs: BTreeMap<String, String>) -> Self {
        Self {
            is_fingerprint_required: true,
            form_action_url: Some(action_url.to_string()),
            form_inputs: inputs,
            ..Self::default()
        }
    }

    pub fn acs_challenge(
        action_url: &str,
        inputs: BTreeMap<String, String>,
        server_transaction_id: &str,
    ) -> Self {
        Self {
            is_acs_challenge_required: true,
            form_action_url: Some(action_url.to_string()),
            form_inputs: inputs,
            server_transaction_id: Some(server_transaction_id.to_string()),
            ..Self::default()
        }
    }

    pub fn resolved(status: ChallengeStatus) -> Self {
        Self {
            resolved_status: Some(status),
            ..Self::default()
        }
    }

    /// Interprets the flag pair as exactly one step.
    ///
    /// Both flags set, a step without a form target, an ACS step without a
    /// server transaction id, or neither flag set without a terminal status
    /// are protocol violations.
    pub fn into_step(self) -> Result<BrowserStep> {
        let form = |url: Option<String>, inputs| {
            url.filter(|u| !u.is_empty())
                .map(|action_url| BrowserForm { action_url, inputs })
                .ok_or_else(|| {
                    ChallengeError::ProtocolMismatch(
                        "browser step without a form action url".to_string(),
                    )
                })
        };

        match (self.is_fingerprint_required, self.is_acs_challenge_required) {
            (true, true) => Err(ChallengeError::ProtocolMismatch(
                "fingerprint and ACS challenge requested at once".to_string(),
            )),
            (true, false) => Ok(BrowserStep::Fingerprint(form(
                self.form_action_url,
                self.form_inputs,
            )?)),
            (false, true) => Ok(BrowserStep::AcsChallenge {
                form: form(self.form_action_url, self.form_inputs)?,
                server_transaction_id: self
                    .server_transaction_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ChallengeError::ProtocolMismatch(
                            "ACS challenge without a 3DS server transaction id".to_string(),
                        )
                    })?,
            }),
            (false, false) => match self.resolved_status {
                Some(status) if status.is_terminal() => Ok(BrowserStep::Terminal(status)),
                _ => Err(ChallengeError::ProtocolMismatch(
                    "no browser step and no terminal status".to_string(),
                )),
            },
        }
    }
}
