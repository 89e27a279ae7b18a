//! Payloads the browser posts back to the callback endpoints.

use crate::error::{ChallengeError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

fn decode_base64url(raw: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(raw.trim().trim_end_matches('=')).ok()
}

/// Encodes a session id the way it travels in `threeDSSessionData`.
pub fn encode_session_data(session_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(session_id.as_bytes())
}

/// Checks that `threeDSSessionData`, when present, names the session in the
/// callback path.
pub fn verify_session_binding(path_session_id: &str, session_data: Option<&str>) -> Result<()> {
    let Some(raw) = session_data.filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let bound = decode_base64url(raw)
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ChallengeError::InvalidSession("malformed threeDSSessionData".into()))?;
    if bound != path_session_id {
        return Err(ChallengeError::InvalidSession(format!(
            "callback for {path_session_id} carries session data for {bound}"
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeResponseMessage {
    #[serde(rename = "threeDSServerTransID")]
    three_ds_server_trans_id: String,
    #[serde(default, rename = "acsTransID")]
    acs_trans_id: Option<String>,
    #[serde(default)]
    trans_status: Option<String>,
}

/// Decoded `cres` posted by the ACS when the visible challenge completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionToken {
    pub raw: String,
    pub server_transaction_id: String,
    pub acs_transaction_id: Option<String>,
    pub trans_status: Option<String>,
}

impl CompletionToken {
    pub fn decode(raw: &str) -> Result<Self> {
        let malformed = || ChallengeError::ProtocolMismatch("malformed completion token".into());
        let bytes = decode_base64url(raw).ok_or_else(malformed)?;
        let message: ChallengeResponseMessage =
            serde_json::from_slice(&bytes).map_err(|_| malformed())?;
        Ok(Self {
            raw: raw.to_string(),
            server_transaction_id: message.three_ds_server_trans_id,
            acs_transaction_id: message.acs_trans_id,
            trans_status: message.trans_status,
        })
    }

    pub fn encode(server_transaction_id: &str, trans_status: &str) -> String {
        let message = serde_json::json!({
            "threeDSServerTransID": server_transaction_id,
            "acsTransID": format!("acs-{server_transaction_id}"),
            "messageType": "CRes",
            "transStatus": trans_status,
        });
        URL_SAFE_NO_PAD.encode(message.to_string())
    }
}
