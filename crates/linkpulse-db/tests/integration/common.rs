use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Schema statements, executed one at a time.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS links (
        id BIGSERIAL PRIMARY KEY,
        url TEXT,
        link_status TEXT,
        link_checked_at TIMESTAMPTZ
    )"#,
    r#"CREATE TABLE IF NOT EXISTS resources (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        share_url TEXT NOT NULL,
        state TEXT,
        checked_at TIMESTAMP
    )"#,
];

/// Spins up a PostgreSQL container and returns a connected pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration:
/// dropping it stops the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "linkpulse_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string =
        format!("postgresql://postgres:postgres@{host}:{port}/linkpulse_test");

    // The server restarts once after init; retry until it accepts connections.
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to create schema");
    }

    (pool, container)
}

/// Insert a `links` row and return its id as text.
pub async fn insert_link(
    pool: &PgPool,
    url: Option<&str>,
    status: Option<&str>,
    checked: Option<&str>,
) -> String {
    let (id,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO links (url, link_status, link_checked_at)
        VALUES ($1, $2, $3::timestamptz)
        RETURNING id::text
        "#,
    )
    .bind(url)
    .bind(status)
    .bind(checked)
    .fetch_one(pool)
    .await
    .expect("Failed to insert link");
    id
}
