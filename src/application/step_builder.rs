use super::client_action::ClientActionBuilder;
use super::upstream::guarded;
use crate::domain::browser_flow::{BrowserFlowResult, BrowserStep};
use crate::domain::client_action::ClientAction;
use crate::domain::ports::{ChallengeResultRecord, OrderAttachmentClientRef};
use crate::domain::session::{ChallengeStage, PaymentSession, Settlement};
use crate::error::{ChallengeError, Result, UpstreamService};
use std::time::Duration;
use tracing::{info, warn};

/// Turns one authentication-server response into exactly one client action.
///
/// The builder mutates the session (stage, status, transaction id) but never
/// persists it; callers store the session after every build.
pub struct BrowserFlowStepBuilder {
    actions: ClientActionBuilder,
    orders: OrderAttachmentClientRef,
    timeout: Duration,
}

impl BrowserFlowStepBuilder {
    pub fn new(actions: ClientActionBuilder, orders: OrderAttachmentClientRef, timeout: Duration) -> Self {
        Self {
            actions,
            orders,
            timeout,
        }
    }

    pub fn actions(&self) -> &ClientActionBuilder {
        &self.actions
    }

    pub async fn build(
        &self,
        session: &mut PaymentSession,
        result: BrowserFlowResult,
    ) -> Result<ClientAction> {
        let step = result.into_step()?;
        self.build_step(session, step).await
    }

    pub async fn build_step(
        &self,
        session: &mut PaymentSession,
        step: BrowserStep,
    ) -> Result<ClientAction> {
        match step {
            BrowserStep::Fingerprint(_) | BrowserStep::AcsChallenge { .. } if session.is_terminal() => {
                warn!(
                    session_id = %session.id,
                    challenge_status = %session.challenge_status,
                    "Browser step offered for a settled session; answering with stored outcome"
                );
                self.finish(session).await
            }
            BrowserStep::Fingerprint(form) => {
                session.advance(ChallengeStage::FingerprintIssued);
                info!(session_id = %session.id, "Issuing fingerprint step");
                let step = self.actions.fingerprint_step(session, form);
                Ok(self.actions.pidl(vec![step]))
            }
            BrowserStep::AcsChallenge {
                form,
                server_transaction_id,
            } => {
                if session.stage == ChallengeStage::FingerprintIssued {
                    return Err(ChallengeError::ProtocolMismatch(format!(
                        "ACS challenge offered for {} before its fingerprint step resolved",
                        session.id
                    )));
                }
                session.server_transaction_id = Some(server_transaction_id);
                session.advance(ChallengeStage::ChallengeIssued);
                info!(
                    session_id = %session.id,
                    window = session.challenge_window_size.code(),
                    "Issuing ACS challenge step"
                );
                let step = self.actions.challenge_step(session, form);
                Ok(self.actions.pidl(vec![step]))
            }
            BrowserStep::Terminal(status) => {
                match session.settle(status) {
                    Settlement::Applied(status) => {
                        info!(session_id = %session.id, challenge_status = %status, "Challenge settled");
                    }
                    Settlement::AlreadySettled(stored) if stored != status => {
                        warn!(
                            session_id = %session.id,
                            stored = %stored,
                            reported = %status,
                            "Ignoring conflicting terminal status"
                        );
                    }
                    _ => {}
                }
                self.finish(session).await
            }
        }
    }

    /// Reports a settled session to the order owner.
    ///
    /// Every terminal status, `Failed` included, goes through the same
    /// attachment call so the owner decides the final disposition.
    pub async fn finish(&self, session: &PaymentSession) -> Result<ClientAction> {
        let Some(target) = &session.attachment_target else {
            return Ok(self.actions.session_context(session));
        };
        let record = ChallengeResultRecord::from(session);
        let confirmation = guarded(
            UpstreamService::OrderAttachment,
            self.timeout,
            self.orders.attach(target, &record),
        )
        .await?;
        info!(
            session_id = %session.id,
            challenge_status = %session.challenge_status,
            "Challenge result attached"
        );
        Ok(self.actions.return_context(confirmation))
    }
}
