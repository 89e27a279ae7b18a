use super::Upstream;
use crate::domain::ports::{ChallengeResultRecord, OrderAttachmentClient, PortResult};
use crate::domain::session::AttachmentTarget;
use async_trait::async_trait;

#[derive(Clone)]
pub struct HttpOrderAttachmentClient {
    upstream: Upstream,
}

impl HttpOrderAttachmentClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            upstream: Upstream::new(base_url, http),
        }
    }

    fn path(target: &AttachmentTarget) -> [&str; 3] {
        match target {
            AttachmentTarget::Order(id) => ["orders", id, "challengeResults"],
            AttachmentTarget::PaymentRequest(id) => ["paymentRequests", id, "challengeResults"],
        }
    }
}

#[async_trait]
impl OrderAttachmentClient for HttpOrderAttachmentClient {
    async fn attach(
        &self,
        target: &AttachmentTarget,
        result: &ChallengeResultRecord,
    ) -> PortResult<serde_json::Value> {
        self.upstream.post_json(&Self::path(target), result).await
    }
}
