//! Remote data access for cross-project references.
//!
//! [`Fetch`] is the transport seam; [`HttpFetcher`] is the production
//! implementation and tests substitute their own. [`ExternalReferenceCache`]
//! sits on top and memoizes every url for the lifetime of one session.

mod cache;

pub use cache::ExternalReferenceCache;

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::errors::{Result, XrefError};

/// Transport for fetching JSON documents by url.
pub trait Fetch: Send + Sync {
    /// Fetches and decodes the JSON document at `url`.
    ///
    /// Non-success statuses, network failures and timeouts are all errors.
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>>;
}

/// Blocking HTTP client run on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>> {
        let agent = self.agent.clone();
        let owned_url = url.to_string();
        Box::pin(async move {
            let request_url = owned_url.clone();
            let joined = tokio::task::spawn_blocking(move || -> Result<Value> {
                let fetch_error = |e: ureq::Error| XrefError::Fetch {
                    message: e.to_string(),
                    url: request_url.clone(),
                };
                let mut response = agent.get(&request_url).call().map_err(fetch_error)?;
                response
                    .body_mut()
                    .read_json::<Value>()
                    .map_err(fetch_error)
            })
            .await;
            joined.map_err(|e| XrefError::Fetch {
                message: format!("fetch task failed: {}", e),
                url: owned_url,
            })?
        })
    }
}
