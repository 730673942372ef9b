//! Baidu netdisk share probe.
//!
//! Baidu answers a share URL fetched by a mobile browser with a redirect:
//! to the share page when the share exists, to an error page when it does
//! not. An expired share is served directly without a redirect.

use std::time::Duration;

use async_trait::async_trait;
use linkpulse_core::error::AppError;
use linkpulse_core::models::ProbeResult;
use linkpulse_core::traits::Probe;
use reqwest::Client;
use reqwest::header::LOCATION;

use crate::http::{MOBILE_USER_AGENT, build_client, transport_error};

#[derive(Clone)]
pub struct BaiduProbe {
    client: Client,
    timeout: Duration,
}

impl BaiduProbe {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout, MOBILE_USER_AGENT, false)?,
            timeout,
        })
    }

    async fn check(&self, url: &str) -> Result<ProbeResult, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(classify(status.as_u16(), location.as_deref()))
    }
}

/// Map a non-followed response to a verdict.
pub fn classify(status: u16, location: Option<&str>) -> ProbeResult {
    match location {
        Some(loc) if loc.contains("error") => ProbeResult::dead("share not found"),
        Some(_) => ProbeResult::live("share redirect"),
        None if (200..300).contains(&status) => ProbeResult::dead("share expired"),
        None => ProbeResult::inconclusive(format!("HTTP {status}")),
    }
}

#[async_trait]
impl Probe for BaiduProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.check(url).await {
            Ok(result) => result,
            Err(e) => ProbeResult::inconclusive(e.to_string()),
        }
    }
}
