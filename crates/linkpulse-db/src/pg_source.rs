use chrono::{DateTime, Utc};
use linkpulse_core::error::AppError;
use linkpulse_core::models::{LinkRecord, LinkStatus, RecordPage, RecordUpdate, SourceSpec};
use linkpulse_core::traits::RecordSource;
use sqlx::PgPool;

/// Record source over a PostgreSQL table.
///
/// Table and column names come from configuration, so they are validated and
/// quoted once at construction; values are always bound.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
    spec: SourceSpec,
    queries: Queries,
}

#[derive(Clone)]
struct Queries {
    count: String,
    page: String,
    update_status: String,
    update_checked: String,
}

impl PgSource {
    pub fn new(pool: PgPool, spec: SourceSpec) -> Result<Self, AppError> {
        let queries = Queries::build(&spec)?;
        Ok(Self {
            pool,
            spec,
            queries,
        })
    }
}

impl Queries {
    fn build(spec: &SourceSpec) -> Result<Self, AppError> {
        let table = quote_ident(&spec.name)?;
        let id = quote_ident(&spec.fields.id)?;
        let url = quote_ident(&spec.fields.url)?;
        let status = quote_ident(&spec.fields.status)?;
        let checked = quote_ident(&spec.fields.checked)?;

        Ok(Self {
            count: format!("SELECT COUNT(*) FROM {table} WHERE {url} IS NOT NULL"),
            page: format!(
                r#"
                SELECT {id}::text AS id, {url}::text AS url, {status}::text AS status,
                       {checked}::timestamptz AS checked
                FROM {table}
                WHERE {url} IS NOT NULL
                ORDER BY {checked} ASC NULLS FIRST, {id} ASC
                OFFSET $1 LIMIT $2
                "#
            ),
            update_status: format!(
                "UPDATE {table} SET {status} = $1, {checked} = $2 WHERE {id}::text = $3"
            ),
            update_checked: format!("UPDATE {table} SET {checked} = $1 WHERE {id}::text = $2"),
        })
    }
}

impl RecordSource for PgSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(&self.queries.count)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn page(&self, offset: u64, limit: u64) -> Result<RecordPage, AppError> {
        let rows = sqlx::query_as::<_, LinkRow>(&self.queries.page)
            .bind(offset as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(RecordPage::complete(
            rows.into_iter()
                .map(|row| row.into_record(&self.spec.name))
                .collect(),
        ))
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<(), AppError> {
        let result = match update.status {
            Some(status) => {
                sqlx::query(&self.queries.update_status)
                    .bind(status.as_str())
                    .bind(update.last_checked)
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
            None => {
                sqlx::query(&self.queries.update_checked)
                    .bind(update.last_checked)
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(format!(
                "{}: no record with {} = {id}",
                self.spec.name, self.spec.fields.id
            )));
        }
        Ok(())
    }
}

/// Validate a configured identifier and quote it for interpolation.
pub fn quote_ident(name: &str) -> Result<String, AppError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || name.len() > 63 {
        return Err(AppError::ConfigError(format!(
            "Invalid table or column name '{name}'"
        )));
    }
    Ok(format!("\"{name}\""))
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: String,
    url: String,
    status: Option<String>,
    checked: Option<DateTime<Utc>>,
}

impl LinkRow {
    fn into_record(self, source: &str) -> LinkRecord {
        LinkRecord {
            id: self.id,
            url: self.url,
            source: source.to_string(),
            status: LinkStatus::from_column(self.status.as_deref()),
            last_checked: self.checked,
        }
    }
}

#[cfg(test)]
mod tests {
    use linkpulse_core::models::SourceFields;

    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("links").unwrap(), "\"links\"");
        assert_eq!(quote_ident("_share_url2").unwrap(), "\"_share_url2\"");
        let too_long = "x".repeat(64);
        for bad in ["", "2links", "links;drop", "a\"b", "café", too_long.as_str()] {
            assert!(quote_ident(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_queries_use_configured_columns() {
        let spec = SourceSpec::new("resources").with_fields(SourceFields {
            id: "id".into(),
            url: "share_url".into(),
            status: "state".into(),
            checked: "checked_at".into(),
        });
        let queries = Queries::build(&spec).unwrap();

        assert!(queries.page.contains(r#"FROM "resources""#));
        assert!(queries.page.contains(r#"ORDER BY "checked_at" ASC NULLS FIRST"#));
        assert!(queries.update_status.contains(r#"SET "state" = $1, "checked_at" = $2"#));
        assert!(!queries.update_checked.contains("state"));
    }

    #[test]
    fn test_bad_spec_rejected() {
        let spec = SourceSpec::new("links; DELETE FROM links");
        assert!(matches!(
            Queries::build(&spec),
            Err(AppError::ConfigError(_))
        ));
    }
}
