use super::{Upstream, ensure_success};
use crate::domain::instrument::InstrumentDetails;
use crate::domain::ports::{InstrumentStore, PortResult};
use async_trait::async_trait;
use reqwest::StatusCode;

#[derive(Clone)]
pub struct HttpInstrumentStore {
    upstream: Upstream,
}

impl HttpInstrumentStore {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            upstream: Upstream::new(base_url, http),
        }
    }
}

#[async_trait]
impl InstrumentStore for HttpInstrumentStore {
    async fn get(
        &self,
        account_id: &str,
        instrument_id: &str,
    ) -> PortResult<Option<InstrumentDetails>> {
        let url = self.upstream.url(&[
            "accounts",
            account_id,
            "paymentInstruments",
            instrument_id,
        ])?;
        let response = self.upstream.http().get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<InstrumentDetails>().await?))
    }
}
