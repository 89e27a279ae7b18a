use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a strong-authentication challenge.
///
/// `Unknown` is the only non-terminal value. Every other value is terminal and,
/// once stored on a session, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChallengeStatus {
    #[default]
    Unknown,
    Succeeded,
    Failed,
    ByPassed,
    NotApplicable,
}

impl ChallengeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Protocol variant of the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeType {
    /// In-page EMVCo 3-D Secure 2 (fingerprint and ACS iframes).
    #[serde(rename = "ThreeDS2")]
    ThreeDs2,
    /// Legacy redirect-based 3-D Secure 1.
    #[serde(rename = "ThreeDS1")]
    ThreeDs1,
    Sms,
}

impl ChallengeType {
    /// Whether the challenge is resolved out-of-band and tracked by polling.
    pub fn is_redirect_style(self) -> bool {
        matches!(self, Self::ThreeDs1 | Self::Sms)
    }
}

/// EMVCo challenge window size hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChallengeWindowSize {
    #[serde(rename = "01")]
    Compact,
    #[serde(rename = "02")]
    Small,
    #[default]
    #[serde(rename = "03")]
    Medium,
    #[serde(rename = "04")]
    Wide,
    #[serde(rename = "05")]
    FullScreen,
}

impl ChallengeWindowSize {
    /// Iframe width and height in CSS units.
    pub fn dimensions(self) -> (&'static str, &'static str) {
        match self {
            Self::Compact => ("250px", "400px"),
            Self::Small => ("390px", "400px"),
            Self::Medium => ("500px", "600px"),
            Self::Wide => ("600px", "400px"),
            Self::FullScreen => ("100%", "100%"),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Compact => "01",
            Self::Small => "02",
            Self::Medium => "03",
            Self::Wide => "04",
            Self::FullScreen => "05",
        }
    }
}

/// Generation of the protocol handler that owns a session.
///
/// Records written before the version tag existed belong to `V1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandlerVersion {
    #[default]
    V1,
    V2,
}

impl HandlerVersion {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for HandlerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Position of a session in the browser flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeStage {
    #[default]
    Created,
    FingerprintIssued,
    FingerprintResolved,
    ChallengeIssued,
    RedirectIssued,
    StatusCheckIssued,
    Completed,
}

/// Entity that receives the challenge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum AttachmentTarget {
    Order(String),
    PaymentRequest(String),
}

/// Transaction data supplied by the caller when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub challenge_window_size: ChallengeWindowSize,
    #[serde(default)]
    pub attachment_target: Option<AttachmentTarget>,
    /// Mail-order/telephone-order or operator-initiated transaction.
    #[serde(default)]
    pub is_moto: bool,
}

/// Result of applying a status to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied(ChallengeStatus),
    AlreadySettled(ChallengeStatus),
    StillPending,
}

/// The central entity of the challenge flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub id: String,
    pub account_id: String,
    pub payment_instrument_id: String,
    #[serde(default)]
    pub instrument_sub_type: Option<String>,
    pub is_challenge_required: bool,
    pub challenge_type: ChallengeType,
    pub challenge_status: ChallengeStatus,
    pub challenge_window_size: ChallengeWindowSize,
    #[serde(default)]
    pub handler_version: HandlerVersion,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub attachment_target: Option<AttachmentTarget>,
    #[serde(default)]
    pub stage: ChallengeStage,
    /// 3DS server transaction id recorded when the ACS step is issued.
    #[serde(default)]
    pub server_transaction_id: Option<String>,
    #[serde(default)]
    pub signature: String,
}

impl PaymentSession {
    /// Starts a session whose challenge requirement has already been decided.
    ///
    /// A session that needs no challenge is born with a terminal status.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        account_id: &str,
        instrument_id: &str,
        instrument_sub_type: Option<String>,
        challenge_type: ChallengeType,
        handler_version: HandlerVersion,
        context: &TransactionContext,
        initial_status: ChallengeStatus,
    ) -> Self {
        let is_challenge_required = !initial_status.is_terminal();
        Self {
            id,
            account_id: account_id.to_string(),
            payment_instrument_id: instrument_id.to_string(),
            instrument_sub_type,
            is_challenge_required,
            challenge_type,
            challenge_status: initial_status,
            challenge_window_size: context.challenge_window_size,
            handler_version,
            amount: context.amount,
            currency: context.currency.clone(),
            attachment_target: context.attachment_target.clone(),
            stage: if is_challenge_required {
                ChallengeStage::Created
            } else {
                ChallengeStage::Completed
            },
            server_transaction_id: None,
            signature: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.challenge_status.is_terminal()
    }

    /// Moves the session to a terminal status. The first terminal value wins.
    pub fn settle(&mut self, status: ChallengeStatus) -> Settlement {
        if self.challenge_status.is_terminal() {
            return Settlement::AlreadySettled(self.challenge_status);
        }
        if !status.is_terminal() {
            return Settlement::StillPending;
        }
        self.challenge_status = status;
        self.stage = ChallengeStage::Completed;
        Settlement::Applied(status)
    }

    /// Records the next browser stage. Completed sessions stay completed.
    pub fn advance(&mut self, stage: ChallengeStage) {
        if self.stage != ChallengeStage::Completed {
            self.stage = stage;
        }
    }

    /// Fields covered by the signature, in a fixed order.
    pub fn signed_fields(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{}|{}",
            self.id,
            self.account_id,
            self.payment_instrument_id,
            self.challenge_type,
            self.challenge_window_size.code(),
            self.handler_version,
            self.is_challenge_required,
        )
    }
}
