use super::step_builder::BrowserFlowStepBuilder;
use super::upstream::guarded;
use crate::domain::client_action::ClientAction;
use crate::domain::ports::{
    AuthenticationServerRef, CallbackUrls, ChallengeSessionRequest, InstrumentStoreRef,
    RelayedPage, SessionStoreRef,
};
use crate::domain::session::{
    ChallengeStage, ChallengeStatus, ChallengeType, HandlerVersion, PaymentSession,
    TransactionContext,
};
use crate::domain::signature::SessionSigner;
use crate::error::{ChallengeError, Result, UpstreamService};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Deployment switches for the two handler generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerToggles {
    /// Route fresh sessions to the V2 handler.
    pub prefer_v2: bool,
    /// Whether this deployment still runs the V1 handler.
    pub legacy_enabled: bool,
}

impl Default for HandlerToggles {
    fn default() -> Self {
        Self {
            prefer_v2: false,
            legacy_enabled: true,
        }
    }
}

impl HandlerToggles {
    pub fn version_for_new_session(&self) -> HandlerVersion {
        if self.prefer_v2 || !self.legacy_enabled {
            HandlerVersion::V2
        } else {
            HandlerVersion::V1
        }
    }

    /// Sessions pinned to a handler this deployment does not run fail closed.
    pub fn ensure_available(&self, version: HandlerVersion) -> Result<()> {
        if version == HandlerVersion::V1 && !self.legacy_enabled {
            return Err(ChallengeError::ProtocolMismatch(
                "session belongs to the v1 handler, which is not deployed".to_string(),
            ));
        }
        Ok(())
    }
}

pub enum HandlerLookup<'a> {
    Session(&'a PaymentSession),
    SessionId(&'a str),
}

/// Builds the callback URLs the browser and ACS post back to.
#[derive(Debug, Clone)]
pub struct CallbackRoutes {
    base_url: String,
}

impl CallbackRoutes {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn for_session(&self, session_id: &str) -> CallbackUrls {
        CallbackUrls {
            method_notification_url: format!(
                "{}/paymentSessions/{}/authenticate",
                self.base_url, session_id
            ),
            challenge_notification_url: format!(
                "{}/paymentSessions/{}/notifyThreeDSChallengeCompleted",
                self.base_url, session_id
            ),
        }
    }
}

/// Owns the `PaymentSession` lifecycle and routes sessions to their handler.
pub struct ChallengeSessionOrchestrator {
    sessions: SessionStoreRef,
    instruments: InstrumentStoreRef,
    auth_server: AuthenticationServerRef,
    steps: Arc<BrowserFlowStepBuilder>,
    signer: SessionSigner,
    toggles: HandlerToggles,
    callbacks: CallbackRoutes,
    timeout: Duration,
}

impl ChallengeSessionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: SessionStoreRef,
        instruments: InstrumentStoreRef,
        auth_server: AuthenticationServerRef,
        steps: Arc<BrowserFlowStepBuilder>,
        signer: SessionSigner,
        toggles: HandlerToggles,
        callbacks: CallbackRoutes,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            instruments,
            auth_server,
            steps,
            signer,
            toggles,
            callbacks,
            timeout,
        }
    }

    pub fn toggles(&self) -> HandlerToggles {
        self.toggles
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Creates, signs and persists a session.
    ///
    /// MOTO transactions are bypassed without contacting the authentication
    /// server. An unreachable authentication server fails the request rather
    /// than producing a session with an undecided challenge requirement.
    pub async fn create_session(
        &self,
        account_id: &str,
        instrument_id: &str,
        context: &TransactionContext,
    ) -> Result<PaymentSession> {
        if account_id.trim().is_empty() || instrument_id.trim().is_empty() {
            return Err(ChallengeError::InvalidSession(
                "accountId and paymentInstrumentId are required".to_string(),
            ));
        }

        let instrument = guarded(
            UpstreamService::InstrumentStore,
            self.timeout,
            self.instruments.get(account_id, instrument_id),
        )
        .await?
        .ok_or_else(|| {
            ChallengeError::InvalidSession(format!("unknown payment instrument {instrument_id}"))
        })?;
        if instrument.account_id != account_id {
            warn!(%account_id, %instrument_id, "Instrument owner mismatch");
            return Err(ChallengeError::InvalidSession(format!(
                "payment instrument {instrument_id} does not belong to account {account_id}"
            )));
        }

        let id = Uuid::new_v4().to_string();
        let version = self
            .resolve_handler_version(HandlerLookup::SessionId(&id))
            .await?;
        let challenge_type = instrument.challenge_type.unwrap_or(ChallengeType::ThreeDs2);

        let status = if context.is_moto {
            info!(session_id = %id, "Operator-initiated transaction, bypassing challenge");
            ChallengeStatus::ByPassed
        } else if instrument.challenge_type.is_none() {
            ChallengeStatus::NotApplicable
        } else {
            let request = ChallengeSessionRequest {
                payment_session_id: id.clone(),
                account_id: account_id.to_string(),
                payment_instrument_id: instrument_id.to_string(),
                challenge_type,
                amount: context.amount,
                currency: context.currency.clone(),
                country: context.country.clone(),
                partner: context.partner.clone(),
                challenge_window_size: context.challenge_window_size,
            };
            let decision = guarded(
                UpstreamService::AuthenticationServer,
                self.timeout,
                self.auth_server.create_session(version, &request),
            )
            .await?;
            if decision.is_challenge_required {
                ChallengeStatus::Unknown
            } else {
                decision
                    .challenge_status
                    .filter(|status| status.is_terminal())
                    .unwrap_or(ChallengeStatus::NotApplicable)
            }
        };

        let mut session = PaymentSession::new(
            id,
            account_id,
            instrument_id,
            instrument.sub_type,
            challenge_type,
            version,
            context,
            status,
        );
        session.signature = self.signer.sign_session(&session);
        self.save(&session).await?;

        info!(
            session_id = %session.id,
            handler_version = %session.handler_version,
            challenge_required = session.is_challenge_required,
            challenge_status = %session.challenge_status,
            "Payment session created"
        );
        Ok(session)
    }

    /// Pure lookup.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<PaymentSession>> {
        guarded(
            UpstreamService::SessionStore,
            self.timeout,
            self.sessions.get(session_id),
        )
        .await
    }

    pub async fn load_session(&self, session_id: &str) -> Result<PaymentSession> {
        if session_id.trim().is_empty() {
            return Err(ChallengeError::InvalidSession("empty session id".to_string()));
        }
        self.get_session(session_id)
            .await?
            .ok_or_else(|| ChallengeError::InvalidSession(format!("unknown session {session_id}")))
    }

    pub async fn save(&self, session: &PaymentSession) -> Result<()> {
        guarded(
            UpstreamService::SessionStore,
            self.timeout,
            self.sessions.put(session.clone()),
        )
        .await
    }

    /// Stored version if the session exists, otherwise the toggle decides.
    pub async fn resolve_handler_version(&self, lookup: HandlerLookup<'_>) -> Result<HandlerVersion> {
        let stored = match lookup {
            HandlerLookup::Session(session) => Some(session.handler_version),
            HandlerLookup::SessionId(id) => self.get_session(id).await?.map(|s| s.handler_version),
        };
        Ok(stored.unwrap_or_else(|| self.toggles.version_for_new_session()))
    }

    /// Re-validates a session descriptor that travelled through the browser.
    ///
    /// Returns the stored record; the descriptor's mutable fields are ignored.
    pub async fn verify_descriptor(&self, descriptor: &str) -> Result<PaymentSession> {
        let claimed: PaymentSession = serde_json::from_str(descriptor)
            .map_err(|e| ChallengeError::InvalidSession(format!("malformed session descriptor: {e}")))?;
        if !self.signer.verify_session(&claimed) {
            warn!(session_id = %claimed.id, "Session descriptor signature mismatch");
            return Err(ChallengeError::InvalidSession(format!(
                "session descriptor {} failed signature validation",
                claimed.id
            )));
        }
        let stored = self.load_session(&claimed.id).await?;
        if stored.handler_version != claimed.handler_version {
            return Err(ChallengeError::ProtocolMismatch(format!(
                "descriptor claims handler {} but session {} is pinned to {}",
                claimed.handler_version, stored.id, stored.handler_version
            )));
        }
        if stored.signed_fields() != claimed.signed_fields() {
            return Err(ChallengeError::InvalidSession(format!(
                "session descriptor {} does not match the stored session",
                claimed.id
            )));
        }
        Ok(stored)
    }

    /// Accepts either a bare session id or a signed session descriptor.
    pub async fn resolve_reference(&self, payment_session_or_data: &str) -> Result<PaymentSession> {
        let reference = payment_session_or_data.trim();
        if reference.starts_with('{') {
            self.verify_descriptor(reference).await
        } else {
            self.load_session(reference).await
        }
    }

    /// Produces the next browser step for an existing session.
    pub async fn describe_challenge(&self, payment_session_or_data: &str) -> Result<ClientAction> {
        let mut session = self.resolve_reference(payment_session_or_data).await?;
        let version = self
            .resolve_handler_version(HandlerLookup::Session(&session))
            .await?;
        self.toggles.ensure_available(version)?;

        if session.is_terminal() {
            return self.steps.finish(&session).await;
        }

        if session.challenge_type.is_redirect_style() {
            let url = guarded(
                UpstreamService::AuthenticationServer,
                self.timeout,
                self.auth_server.start_redirect(version, &session),
            )
            .await?;
            // A status-check page already on screen keeps its stage.
            if session.stage != ChallengeStage::StatusCheckIssued {
                session.advance(ChallengeStage::RedirectIssued);
                self.save(&session).await?;
            }
            info!(session_id = %session.id, "Redirecting to out-of-band challenge");
            return Ok(self.steps.actions().redirect(&url));
        }

        let callbacks = self.callbacks.for_session(&session.id);
        let result = guarded(
            UpstreamService::AuthenticationServer,
            self.timeout,
            self.auth_server.authenticate(version, &session, &callbacks),
        )
        .await?;
        let action = self.steps.build(&mut session, result).await;
        self.save(&session).await?;
        action
    }

    /// Relays an iframe form post to a target this gateway signed for the session.
    pub async fn relay_browser_form(
        &self,
        session_id: &str,
        target: &str,
        signature: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<RelayedPage> {
        if !self.signer.verify_proxy_target(session_id, target, signature) {
            warn!(%session_id, %target, "Rejected unsigned browser flow proxy target");
            return Err(ChallengeError::InvalidSession(format!(
                "proxy target is not signed for session {session_id}"
            )));
        }
        let session = self.load_session(session_id).await?;
        self.toggles.ensure_available(session.handler_version)?;
        guarded(
            UpstreamService::AuthenticationServer,
            self.timeout,
            self.auth_server.relay_browser_form(target, fields),
        )
        .await
    }
}
