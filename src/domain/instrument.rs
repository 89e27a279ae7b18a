use super::session::ChallengeType;
use serde::{Deserialize, Serialize};

/// Instrument metadata needed to decide if and how a challenge applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDetails {
    pub id: String,
    pub account_id: String,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    /// `None` when the instrument never needs strong authentication.
    #[serde(default)]
    pub challenge_type: Option<ChallengeType>,
}
