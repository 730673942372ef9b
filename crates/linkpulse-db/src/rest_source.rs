//! Record source over a PostgREST table API.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use linkpulse_core::error::AppError;
use linkpulse_core::models::{LinkRecord, LinkStatus, RecordPage, RecordUpdate, SourceSpec};
use linkpulse_core::traits::RecordSource;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};
use url::Url;

/// One table exposed by a PostgREST endpoint.
#[derive(Clone)]
pub struct RestSource {
    client: Client,
    endpoint: Url,
    spec: SourceSpec,
}

impl RestSource {
    /// `client` must already carry the auth headers, see [`auth_headers`].
    pub fn new(client: Client, api_base: &Url, spec: SourceSpec) -> Result<Self, AppError> {
        let endpoint = table_endpoint(api_base, &spec.name)?;
        Ok(Self {
            client,
            endpoint,
            spec,
        })
    }

    fn select(&self) -> String {
        let f = &self.spec.fields;
        format!("{},{},{},{}", f.id, f.url, f.status, f.checked)
    }

    fn url_with(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in pairs {
                query.append_pair(k, v);
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::DatabaseError(format!(
            "{} returned HTTP {}: {}",
            self.spec.name,
            status.as_u16(),
            body.trim()
        )))
    }

    fn decode_row(&self, row: &Map<String, Value>) -> Option<LinkRecord> {
        let f = &self.spec.fields;
        let id = match row.get(&f.id)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let url = row.get(&f.url)?.as_str()?.to_string();
        let status = LinkStatus::from_column(row.get(&f.status).and_then(Value::as_str));
        let last_checked = row
            .get(&f.checked)
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        Some(LinkRecord {
            id,
            url,
            source: self.spec.name.clone(),
            status,
            last_checked,
        })
    }
}

impl RecordSource for RestSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn count(&self) -> Result<u64, AppError> {
        let f = &self.spec.fields;
        let url = self.url_with(&[
            ("select", f.id.as_str()),
            (f.url.as_str(), "not.is.null"),
            ("limit", "1"),
        ]);
        let response = self
            .send(self.client.get(url).header("Prefer", "count=exact"))
            .await?;

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range).ok_or_else(|| {
            AppError::DatabaseError(format!(
                "{}: missing total in Content-Range '{range}'",
                self.spec.name
            ))
        })
    }

    async fn page(&self, offset: u64, limit: u64) -> Result<RecordPage, AppError> {
        let f = &self.spec.fields;
        let order = format!("{}.asc.nullsfirst,{}.asc", f.checked, f.id);
        let offset = offset.to_string();
        let limit = limit.to_string();
        let select = self.select();
        let url = self.url_with(&[
            ("select", select.as_str()),
            (f.url.as_str(), "not.is.null"),
            ("order", order.as_str()),
            ("offset", offset.as_str()),
            ("limit", limit.as_str()),
        ]);

        let rows: Vec<Map<String, Value>> = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to decode rows: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(row) {
                Some(record) => records.push(record),
                None => tracing::warn!(source = %self.spec.name, "Skipping undecodable row"),
            }
        }
        Ok(RecordPage {
            records,
            rows: rows.len() as u64,
        })
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<(), AppError> {
        let f = &self.spec.fields;
        let filter = format!("eq.{id}");
        let url = self.url_with(&[(f.id.as_str(), filter.as_str())]);

        let mut body = Map::new();
        if let Some(status) = update.status {
            body.insert(f.status.clone(), Value::from(status.as_str()));
        }
        body.insert(
            f.checked.clone(),
            Value::from(update.last_checked.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let response = self
            .send(
                self.client
                    .patch(url)
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to decode update reply: {e}")))?;
        if rows.is_empty() {
            return Err(AppError::DatabaseError(format!(
                "{}: no record with {} = {id}",
                self.spec.name, f.id
            )));
        }
        Ok(())
    }
}

/// Default headers carrying the service key.
pub fn auth_headers(key: &str) -> Result<HeaderMap, AppError> {
    let invalid = |_: reqwest::header::InvalidHeaderValue| {
        AppError::ConfigError("Store key contains invalid header characters".into())
    };

    let mut headers = HeaderMap::new();
    let mut apikey = HeaderValue::from_str(key).map_err(invalid)?;
    apikey.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?;
    bearer.set_sensitive(true);
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// `https://x.example` becomes `https://x.example/rest/v1/<table>`; a base that
/// already has a path is used as the API root as-is.
pub fn table_endpoint(api_base: &Url, table: &str) -> Result<Url, AppError> {
    let mut root = api_base.clone();
    root.set_query(None);
    root.set_fragment(None);

    let path = root.path().trim_end_matches('/').to_string();
    let path = if path.is_empty() {
        "/rest/v1".to_string()
    } else {
        path
    };
    root.set_path(&format!("{path}/{table}"));

    if root.cannot_be_a_base() {
        return Err(AppError::ConfigError(format!(
            "Store URL '{api_base}' cannot be used as an API base"
        )));
    }
    Ok(root)
}

/// Total from `Content-Range: 0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres `timestamp without time zone` columns come back without an offset.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn request_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::DatabaseError(format!("Store request timed out: {e}"))
    } else if e.is_connect() {
        AppError::NetworkError(format!("Store unreachable: {e}"))
    } else {
        AppError::DatabaseError(e.to_string())
    }
}
