//! HTTP feed client for the USGS FDSN event service.
//!
//! One GET per poll with the query encoded as URL parameters. Transport
//! failures, timeouts, and non-2xx statuses map to
//! [`FetchError::Network`]; a body that is not a feature collection maps
//! to [`FetchError::Parse`].

use std::time::Duration;

use quakewatch_core::config::FeedConfig;
use quakewatch_core::feed::{FeedClient, FetchError, parse_feed, query_params};
use quakewatch_types::{EarthquakeRecord, FeedQuery};
use tracing::debug;

/// Feed client backed by `reqwest`.
pub struct UsgsFeedClient {
    client: reqwest::Client,
    endpoint_url: String,
    format: String,
}

impl UsgsFeedClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &FeedConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeout(
            &config.endpoint_url,
            &config.format,
            config.request_timeout(),
        )
    }

    fn with_timeout(
        endpoint_url: &str,
        format: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint_url: endpoint_url.to_owned(),
            format: format.to_owned(),
        })
    }
}

impl FeedClient for UsgsFeedClient {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<EarthquakeRecord>, FetchError> {
        let response = self
            .client
            .get(&self.endpoint_url)
            .query(&query_params(query, &self.format))
            .send()
            .await
            .map_err(|e| FetchError::Network {
                detail: format!("feed request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                detail: format!("feed returned {status}"),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Network {
            detail: format!("feed body read failed: {e}"),
        })?;

        let records = parse_feed(&body)?;
        debug!(records = records.len(), "feed fetched");
        Ok(records)
    }
}
