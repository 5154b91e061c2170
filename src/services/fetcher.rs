// src/services/fetcher.rs

//! Upstream timetable retrieval.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::TimetableKey;
use crate::utils::{http, timetable_url};

/// Source of raw timetable pages.
#[async_trait]
pub trait TimetableFetcher: Send + Sync {
    /// Retrieve the raw schedule page for `key`.
    ///
    /// Non-success responses are errors; no retries happen at this layer.
    async fn fetch_raw(&self, key: TimetableKey) -> Result<Vec<u8>>;
}

/// Fetcher backed by the public schedule site.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TimetableFetcher for HttpFetcher {
    async fn fetch_raw(&self, key: TimetableKey) -> Result<Vec<u8>> {
        let url = timetable_url(&self.base_url, key.group, key.period)?;
        log::debug!("Fetching timetable {} from {}", key, url);
        http::fetch_bytes(&self.client, url.as_str()).await
    }
}
