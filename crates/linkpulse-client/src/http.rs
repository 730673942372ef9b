use std::time::Duration;

use linkpulse_core::error::AppError;
use reqwest::Client;
use reqwest::redirect::Policy;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(
    timeout: Duration,
    user_agent: &str,
    follow_redirects: bool,
) -> Result<Client, AppError> {
    let policy = if follow_redirects {
        Policy::limited(5)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(policy)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Classify a transport failure.
pub fn transport_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_clients() {
        assert!(build_client(DEFAULT_PROBE_TIMEOUT, DESKTOP_USER_AGENT, true).is_ok());
        assert!(build_client(Duration::from_millis(500), MOBILE_USER_AGENT, false).is_ok());
    }

    #[tokio::test]
    async fn test_connect_failure_is_network_error() {
        let client = build_client(Duration::from_secs(2), DESKTOP_USER_AGENT, true).unwrap();
        // Port 9 (discard) on localhost is practically never listening.
        let err = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        let app_err = transport_error(err, Duration::from_secs(2));
        assert!(matches!(app_err, AppError::NetworkError(_)));
    }
}
