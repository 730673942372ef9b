use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted freshness of a share link.
///
/// `Unchecked` is how a stored `NULL` status is represented; it is never
/// written back by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Valid,
    Expired,
    Unchecked,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Valid => "valid",
            LinkStatus::Expired => "expired",
            LinkStatus::Unchecked => "unchecked",
        }
    }

    /// Decode a nullable status column.
    pub fn from_column(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(LinkStatus::Unchecked)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valid" => Ok(LinkStatus::Valid),
            "expired" => Ok(LinkStatus::Expired),
            "unchecked" => Ok(LinkStatus::Unchecked),
            _ => Err(format!("Unknown link status: {}", s)),
        }
    }
}

/// One share link under management, as read from a record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: String,
    pub url: String,
    /// Name of the source this record was read from.
    pub source: String,
    pub status: LinkStatus,
    pub last_checked: Option<DateTime<Utc>>,
}

impl LinkRecord {
    /// Staleness order: never-checked records first, then oldest check first.
    pub fn staleness_cmp(&self, other: &Self) -> Ordering {
        match (self.last_checked, other.last_checked) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

/// One page read from a record source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<LinkRecord>,
    /// Rows the store returned for the page, including rows that could not be
    /// decoded into `records`. Paging advances by this count.
    pub rows: u64,
}

impl RecordPage {
    /// A page in which every returned row decoded.
    pub fn complete(records: Vec<LinkRecord>) -> Self {
        let rows = records.len() as u64;
        Self { records, rows }
    }
}

/// Tri-state probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Live,
    Dead,
    Inconclusive,
}

impl Verdict {
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Verdict::Inconclusive)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Live => write!(f, "live"),
            Verdict::Dead => write!(f, "dead"),
            Verdict::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Why a probe came back inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InconclusiveKind {
    /// Timeouts, unexpected responses, blocked requests.
    Transient,
    /// The provider is recognised but has no probe implementation.
    Unsupported,
}

/// Verdict plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub verdict: Verdict,
    pub reason: String,
    pub kind: Option<InconclusiveKind>,
}

impl ProbeResult {
    pub fn live(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Live,
            reason: reason.into(),
            kind: None,
        }
    }

    pub fn dead(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Dead,
            reason: reason.into(),
            kind: None,
        }
    }

    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Inconclusive,
            reason: reason.into(),
            kind: Some(InconclusiveKind::Transient),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Inconclusive,
            reason: reason.into(),
            kind: Some(InconclusiveKind::Unsupported),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == Some(InconclusiveKind::Unsupported)
    }
}

/// Field changes written back for one record.
///
/// `status: None` leaves the stored status untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub status: Option<LinkStatus>,
    pub last_checked: DateTime<Utc>,
}

/// Per-record result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Valid,
    Expired,
    /// Inconclusive probe, status kept.
    Preserved,
    /// Provider breaker was open, no probe issued.
    Skipped,
    /// Pipeline failure (store write, unknown source).
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Valid => "valid",
            Outcome::Expired => "expired",
            Outcome::Preserved => "preserved",
            Outcome::Skipped => "skipped",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column names of one record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFields {
    pub id: String,
    pub url: String,
    pub status: String,
    pub checked: String,
}

impl Default for SourceFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            url: "url".to_string(),
            status: "link_status".to_string(),
            checked: "link_checked_at".to_string(),
        }
    }
}

/// A configured record source: table name plus its field mapping.
///
/// Parsed from `table` or `table:url_col,status_col,checked_col`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub fields: SourceFields,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: SourceFields::default(),
        }
    }

    pub fn with_fields(mut self, fields: SourceFields) -> Self {
        self.fields = fields;
        self
    }
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, columns) = match s.split_once(':') {
            Some((name, columns)) => (name.trim(), Some(columns)),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(format!("Source spec '{s}' has an empty table name"));
        }

        let mut spec = SourceSpec::new(name);
        if let Some(columns) = columns {
            let parts: Vec<&str> = columns.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [url, status, checked]
                    if !url.is_empty() && !status.is_empty() && !checked.is_empty() =>
                {
                    spec.fields.url = url.to_string();
                    spec.fields.status = status.to_string();
                    spec.fields.checked = checked.to_string();
                }
                _ => {
                    return Err(format!(
                        "Source spec '{s}' must look like table:url_col,status_col,checked_col"
                    ));
                }
            }
        }
        Ok(spec)
    }
}
