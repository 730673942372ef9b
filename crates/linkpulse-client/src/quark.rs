//! Quark drive share probe.
//!
//! Two-step share API: a share token is requested for the share id (and
//! passcode, if any), then the share's root listing is fetched with that
//! token to detect shares whose content was removed.

use std::time::Duration;

use async_trait::async_trait;
use linkpulse_core::error::AppError;
use linkpulse_core::models::ProbeResult;
use linkpulse_core::traits::Probe;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{DESKTOP_USER_AGENT, build_client, transport_error};

pub const DEFAULT_QUARK_API_BASE: &str = "https://drive-h.quark.cn";

const CODE_OK: i64 = 0;
const CODE_SHARE_EXPIRED: i64 = 41004;
const CODE_SHARE_REVOKED: &[i64] = &[41006, 41011];

/// Probe for `pan.quark.cn/s/<id>` links.
#[derive(Clone)]
pub struct QuarkProbe {
    client: Client,
    api_base: String,
    timeout: Duration,
    check_listing: bool,
}

impl QuarkProbe {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_api_base(timeout, DEFAULT_QUARK_API_BASE)
    }

    pub fn with_api_base(timeout: Duration, api_base: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout, DESKTOP_USER_AGENT, true)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
            check_listing: true,
        })
    }

    /// Skip the listing request; a valid token is then enough for `live`.
    pub fn without_listing(mut self) -> Self {
        self.check_listing = false;
        self
    }

    async fn check(&self, url: &str) -> Result<ProbeResult, AppError> {
        let Some(share) = parse_share(url) else {
            return Ok(ProbeResult::inconclusive("cannot parse share id"));
        };

        let token = self.request_token(&share).await?;
        let (code, message, stoken) = match token {
            TokenReply::Code {
                code,
                message,
                stoken,
            } => (code, message, stoken),
            TokenReply::Unrecognized(reason) => return Ok(ProbeResult::inconclusive(reason)),
        };

        match code {
            CODE_OK => {}
            CODE_SHARE_EXPIRED => return Ok(ProbeResult::dead("share expired")),
            c if CODE_SHARE_REVOKED.contains(&c) => return Ok(ProbeResult::dead("share revoked")),
            c => {
                let reason = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("share unavailable (code {c})"));
                return Ok(ProbeResult::dead(reason));
            }
        }

        let Some(stoken) = stoken else {
            return Ok(ProbeResult::inconclusive("token response without stoken"));
        };
        if !self.check_listing {
            return Ok(ProbeResult::live("share token issued"));
        }

        match self.listing_size(&share, &stoken).await {
            Ok(Some(0)) => Ok(ProbeResult::dead("content removed")),
            Ok(Some(n)) => Ok(ProbeResult::live(format!("share ok, {n} entries"))),
            Ok(None) => Ok(ProbeResult::live("share ok")),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Listing failed after valid token");
                Ok(ProbeResult::live("share ok, listing unavailable"))
            }
        }
    }

    async fn request_token(&self, share: &ShareRef) -> Result<TokenReply, AppError> {
        let mut endpoint = self.endpoint("/1/clouddrive/share/sharepage/token")?;
        endpoint
            .query_pairs_mut()
            .append_pair("pr", "ucpro")
            .append_pair("fr", "pc");

        let response = self
            .client
            .post(endpoint)
            .json(&TokenRequest {
                pwd_id: &share.pwd_id,
                passcode: &share.passcode,
            })
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        // Error replies come with 4xx statuses but still carry a JSON code.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        let Ok(reply) = serde_json::from_str::<ApiResponse<TokenData>>(&body) else {
            return Ok(TokenReply::Unrecognized(format!(
                "HTTP {}: unexpected token response",
                status.as_u16()
            )));
        };

        match reply.code {
            Some(code) => Ok(TokenReply::Code {
                code,
                message: reply.message,
                stoken: reply.data.and_then(|d| d.stoken),
            }),
            None => Ok(TokenReply::Unrecognized(format!(
                "HTTP {}: no response code",
                status.as_u16()
            ))),
        }
    }

    /// Number of root entries in the share, when the API reports it.
    async fn listing_size(&self, share: &ShareRef, stoken: &str) -> Result<Option<u64>, AppError> {
        let mut endpoint = self.endpoint("/1/clouddrive/share/sharepage/detail")?;
        endpoint
            .query_pairs_mut()
            .append_pair("pr", "ucpro")
            .append_pair("fr", "pc")
            .append_pair("pwd_id", &share.pwd_id)
            .append_pair("stoken", stoken)
            .append_pair("pdir_fid", "0")
            .append_pair("force", "0")
            .append_pair("_page", "1")
            .append_pair("_size", "50")
            .append_pair("_fetch_total", "1");

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!("HTTP {}", status.as_u16())));
        }

        let reply: ApiResponse<DetailData> = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse listing: {e}")))?;

        if reply.code.unwrap_or(CODE_OK) != CODE_OK {
            return Err(AppError::HttpError(format!(
                "listing code {}",
                reply.code.unwrap_or_default()
            )));
        }

        let total = reply.metadata.and_then(|m| m.total);
        let listed = reply.data.map(|d| d.list.len() as u64);
        Ok(total.or(listed))
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| AppError::ConfigError(format!("Invalid Quark API base: {e}")))
    }
}

#[async_trait]
impl Probe for QuarkProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.check(url).await {
            Ok(result) => result,
            Err(e) => ProbeResult::inconclusive(e.to_string()),
        }
    }
}

/// Share id and passcode extracted from a share URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRef {
    pub pwd_id: String,
    pub passcode: String,
}

/// Extract the share id (`/s/<id>`) and an optional `pwd`/`passcode` query value.
pub fn parse_share(url: &str) -> Option<ShareRef> {
    let parsed = Url::parse(url.trim()).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|s| *s == "s")?;
    let pwd_id = segments.next().filter(|s| !s.is_empty())?.to_string();

    let passcode = parsed
        .query_pairs()
        .find(|(k, _)| k == "pwd" || k == "passcode")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();

    Some(ShareRef { pwd_id, passcode })
}

// ---- Quark API types ----

#[derive(Serialize)]
struct TokenRequest<'a> {
    pwd_id: &'a str,
    passcode: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    code: Option<i64>,
    message: Option<String>,
    data: Option<T>,
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct TokenData {
    stoken: Option<String>,
}

#[derive(Deserialize)]
struct DetailData {
    #[serde(default)]
    list: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(rename = "_total")]
    total: Option<u64>,
}

enum TokenReply {
    Code {
        code: i64,
        message: Option<String>,
        stoken: Option<String>,
    },
    Unrecognized(String),
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use linkpulse_core::models::Verdict;
    use serde_json::{Value, json};

    use super::*;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn token_route(status: StatusCode, body: Value) -> Router {
        Router::new().route(
            "/1/clouddrive/share/sharepage/token",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        )
    }

    fn detail_route(router: Router, body: Value) -> Router {
        router.route(
            "/1/clouddrive/share/sharepage/detail",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        )
    }

    fn ok_token() -> Value {
        json!({"status": 200, "code": 0, "message": "ok", "data": {"stoken": "tok"}})
    }

    async fn probe_with(app: Router) -> ProbeResult {
        let base = spawn(app).await;
        let probe = QuarkProbe::with_api_base(Duration::from_secs(5), &base).unwrap();
        probe.probe("https://pan.quark.cn/s/abc123").await
    }

    #[test]
    fn test_parse_share() {
        assert_eq!(
            parse_share("https://pan.quark.cn/s/abc123"),
            Some(ShareRef {
                pwd_id: "abc123".into(),
                passcode: String::new()
            })
        );
        assert_eq!(
            parse_share("https://pan.quark.cn/s/abc123?pwd=x9y8#/list/share").unwrap(),
            ShareRef {
                pwd_id: "abc123".into(),
                passcode: "x9y8".into()
            }
        );
        assert!(parse_share("https://pan.quark.cn/list").is_none());
        assert!(parse_share("https://pan.quark.cn/s/").is_none());
        assert!(parse_share("not a url").is_none());
    }

    #[tokio::test]
    async fn test_live_share_with_entries() {
        let app = detail_route(
            token_route(StatusCode::OK, ok_token()),
            json!({"code": 0, "data": {"list": [{"fid": "1"}, {"fid": "2"}]}, "metadata": {"_total": 2}}),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Live);
        assert_eq!(result.reason, "share ok, 2 entries");
    }

    #[tokio::test]
    async fn test_empty_listing_is_dead() {
        let app = detail_route(
            token_route(StatusCode::OK, ok_token()),
            json!({"code": 0, "data": {"list": []}, "metadata": {"_total": 0}}),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Dead);
        assert_eq!(result.reason, "content removed");
    }

    #[tokio::test]
    async fn test_expired_code_is_dead() {
        let app = token_route(
            StatusCode::BAD_REQUEST,
            json!({"status": 400, "code": 41004, "message": "分享已过期"}),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Dead);
        assert_eq!(result.reason, "share expired");
    }

    #[tokio::test]
    async fn test_revoked_code_is_dead() {
        let app = token_route(
            StatusCode::NOT_FOUND,
            json!({"status": 404, "code": 41006, "message": "分享不存在"}),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Dead);
        assert_eq!(result.reason, "share revoked");
    }

    #[tokio::test]
    async fn test_other_code_is_dead_with_message() {
        let app = token_route(
            StatusCode::BAD_REQUEST,
            json!({"status": 400, "code": 41008, "message": "提取码错误"}),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Dead);
        assert_eq!(result.reason, "提取码错误");
    }

    #[tokio::test]
    async fn test_missing_code_is_inconclusive() {
        let app = token_route(StatusCode::BAD_GATEWAY, json!({"error": "upstream"}));
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert!(result.reason.contains("502"));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_inconclusive() {
        let app = Router::new().route(
            "/1/clouddrive/share/sharepage/token",
            post(|| async { (StatusCode::FORBIDDEN, "<html>blocked</html>") }),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert!(!result.is_unsupported());
    }

    #[tokio::test]
    async fn test_listing_failure_still_live() {
        let app = token_route(StatusCode::OK, ok_token()).route(
            "/1/clouddrive/share/sharepage/detail",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let result = probe_with(app).await;
        assert_eq!(result.verdict, Verdict::Live);
    }

    #[tokio::test]
    async fn test_sends_share_id_and_passcode() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();
        let app = Router::new()
            .route(
                "/1/clouddrive/share/sharepage/token",
                post(move |Json(body): Json<Value>| {
                    let seen = seen_in_handler.clone();
                    async move {
                        *seen.lock().unwrap() = Some(body);
                        Json(json!({"code": 0, "data": {"stoken": "tok"}}))
                    }
                }),
            )
            .route(
                "/1/clouddrive/share/sharepage/detail",
                get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                    let total = if q.get("stoken").map(String::as_str) == Some("tok") { 1 } else { 0 };
                    Json(json!({"code": 0, "data": {"list": []}, "metadata": {"_total": total}}))
                }),
            );
        let base = spawn(app).await;
        let probe = QuarkProbe::with_api_base(Duration::from_secs(5), &base).unwrap();

        let result = probe.probe("https://pan.quark.cn/s/abc123?pwd=k3y").await;

        assert_eq!(result.verdict, Verdict::Live);
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["pwd_id"], "abc123");
        assert_eq!(body["passcode"], "k3y");
    }

    #[tokio::test]
    async fn test_timeout_is_inconclusive() {
        let app = Router::new().route(
            "/1/clouddrive/share/sharepage/token",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"code": 0}))
            }),
        );
        let base = spawn(app).await;
        let probe = QuarkProbe::with_api_base(Duration::from_millis(200), &base).unwrap();

        let result = probe.probe("https://pan.quark.cn/s/abc123").await;

        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert!(result.reason.contains("timed out after 200ms"), "{}", result.reason);
    }

    #[tokio::test]
    async fn test_unparseable_url_is_inconclusive() {
        let probe = QuarkProbe::with_api_base(Duration::from_secs(1), "http://127.0.0.1:9").unwrap();
        let result = probe.probe("https://pan.quark.cn/list#/all").await;
        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert_eq!(result.reason, "cannot parse share id");
    }

    #[tokio::test]
    async fn test_without_listing_trusts_token() {
        let base = spawn(token_route(StatusCode::OK, ok_token())).await;
        let probe = QuarkProbe::with_api_base(Duration::from_secs(5), &base)
            .unwrap()
            .without_listing();
        let result = probe.probe("https://pan.quark.cn/s/abc123").await;
        assert_eq!(result.verdict, Verdict::Live);
        assert_eq!(result.reason, "share token issued");
    }
}
