use super::session::PaymentSession;
use crate::error::ConfigError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_KEY_LEN: usize = 32;

/// HMAC-SHA256 signer for data that round-trips through the browser.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
        if key.len() < MIN_KEY_LEN {
            return Err(ConfigError::Invalid(format!(
                "signing key must be at least {MIN_KEY_LEN} bytes"
            )));
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| ConfigError::Invalid(format!("signing key rejected: {e}")))?;
        Ok(Self { mac })
    }

    pub fn from_hex(key: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(key.trim())
            .map_err(|e| ConfigError::Invalid(format!("signing key is not hex: {e}")))?;
        Self::new(&bytes)
    }

    fn digest(&self, parts: &[&str]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part.as_bytes());
        }
        mac
    }

    fn verify(&self, parts: &[&str], signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(expected) => self.digest(parts).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    pub fn sign_session(&self, session: &PaymentSession) -> String {
        hex::encode(
            self.digest(&["session", &session.signed_fields()])
                .finalize()
                .into_bytes(),
        )
    }

    pub fn verify_session(&self, session: &PaymentSession) -> bool {
        self.verify(&["session", &session.signed_fields()], &session.signature)
    }

    pub fn sign_proxy_target(&self, session_id: &str, target: &str) -> String {
        hex::encode(
            self.digest(&["proxy", session_id, target])
                .finalize()
                .into_bytes(),
        )
    }

    pub fn verify_proxy_target(&self, session_id: &str, target: &str, signature: &str) -> bool {
        self.verify(&["proxy", session_id, target], signature)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSigner(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{
        ChallengeStatus, ChallengeType, ChallengeWindowSize, HandlerVersion, TransactionContext,
    };
    use rust_decimal_macros::dec;

    fn signer() -> SessionSigner {
        SessionSigner::new(&[7u8; 32]).unwrap()
    }

    fn session() -> PaymentSession {
        let context = TransactionContext {
            amount: dec!(10),
            currency: "USD".to_string(),
            country: None,
            partner: None,
            challenge_window_size: ChallengeWindowSize::Medium,
            attachment_target: None,
            is_moto: false,
        };
        PaymentSession::new(
            "ps-1".to_string(),
            "acc",
            "pi",
            None,
            ChallengeType::ThreeDs2,
            HandlerVersion::V2,
            &context,
            ChallengeStatus::Unknown,
        )
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(SessionSigner::new(&[1u8; 8]).is_err());
        assert!(SessionSigner::from_hex("zz").is_err());
    }

    #[test]
    fn test_signature_detects_tampering() {
        let signer = signer();
        let mut session = session();
        session.signature = signer.sign_session(&session);
        assert!(signer.verify_session(&session));

        let mut forged = session.clone();
        forged.handler_version = HandlerVersion::V1;
        assert!(!signer.verify_session(&forged));

        let mut forged = session.clone();
        forged.payment_instrument_id = "pi-other".to_string();
        assert!(!signer.verify_session(&forged));
    }

    #[test]
    fn test_signature_ignores_mutable_status() {
        let signer = signer();
        let mut session = session();
        session.signature = signer.sign_session(&session);
        session.settle(ChallengeStatus::Succeeded);
        assert!(signer.verify_session(&session));
    }

    #[test]
    fn test_proxy_target_signature() {
        let signer = signer();
        let sig = signer.sign_proxy_target("ps-1", "https://acs.example/method");
        assert!(signer.verify_proxy_target("ps-1", "https://acs.example/method", &sig));
        assert!(!signer.verify_proxy_target("ps-2", "https://acs.example/method", &sig));
        assert!(!signer.verify_proxy_target("ps-1", "https://evil.example", &sig));
        assert!(!signer.verify_proxy_target("ps-1", "https://acs.example/method", "nothex"));
    }
}
