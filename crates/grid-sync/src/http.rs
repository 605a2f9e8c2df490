use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use slots::wire::{
    ErrorResponse, MutationRequest, MutationResponse, SetTimezoneResponse, SuccessResponse,
    TimezoneRequest, TimezoneResponse,
};
use slots::{CalendarId, SlotAction, SlotKey, SlotMap, TimezoneOffset};
use std::time::Duration;
use tracing::debug;

use crate::{Result, SlotApi, SyncError};

/// REST client for the slot server's `/api` surface.
#[derive(Debug, Clone)]
pub struct HttpSlotClient {
    base_url: Url,
    client: Client,
}

impl HttpSlotClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncError::Network(format!("invalid server url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Network(format!(
                "{} cannot be used as a server url",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("slotgrid/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/{segments...}` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(SyncError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SlotApi for HttpSlotClient {
    async fn list_all(&self, calendar: &CalendarId) -> Result<SlotMap> {
        let url = self.endpoint(&["slots", calendar.as_str(), "all"]);
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }

    async fn mutate(
        &self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> Result<SlotMap> {
        let url = self.endpoint(&["slots", calendar.as_str()]);
        debug!("POST {} {} {} {}", url, action, key, nickname);
        let response = self
            .client
            .post(url)
            .json(&MutationRequest::new(key, nickname, action))
            .send()
            .await?;
        let body: MutationResponse = Self::read(response).await?;
        Ok(body.slots)
    }

    async fn get_timezone(&self, calendar: &CalendarId) -> Result<Option<TimezoneOffset>> {
        let url = self.endpoint(&["timezone", calendar.as_str()]);
        let response = self.client.get(url).send().await?;
        let body: TimezoneResponse = Self::read(response).await?;
        Ok(body.timezone)
    }

    async fn set_timezone(
        &self,
        calendar: &CalendarId,
        offset: TimezoneOffset,
    ) -> Result<TimezoneOffset> {
        let url = self.endpoint(&["timezone", calendar.as_str()]);
        let response = self
            .client
            .post(url)
            .json(&TimezoneRequest::new(offset))
            .send()
            .await?;
        let body: SetTimezoneResponse = Self::read(response).await?;
        Ok(body.timezone)
    }

    async fn clear_all(&self) -> Result<()> {
        let url = self.endpoint(&["slots"]);
        let response = self.client.delete(url).send().await?;
        let _: SuccessResponse = Self::read(response).await?;
        Ok(())
    }
}
