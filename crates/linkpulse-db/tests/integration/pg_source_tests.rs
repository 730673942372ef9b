use chrono::{TimeZone, Utc};
use linkpulse_core::models::{LinkStatus, RecordUpdate, SourceFields, SourceSpec};
use linkpulse_core::traits::RecordSource;
use linkpulse_db::{PgSource, Store};

use crate::integration::common::{insert_link, setup_test_db};

#[tokio::test]
async fn count_ignores_rows_without_url() {
    let (pool, _container) = setup_test_db().await;
    insert_link(&pool, Some("https://pan.quark.cn/s/a"), None, None).await;
    insert_link(&pool, Some("https://pan.quark.cn/s/b"), Some("valid"), None).await;
    insert_link(&pool, None, None, None).await;

    let source = PgSource::new(pool, SourceSpec::new("links")).unwrap();

    assert_eq!(source.count().await.unwrap(), 2);
}

#[tokio::test]
async fn page_orders_never_checked_first() {
    let (pool, _container) = setup_test_db().await;
    let recent = insert_link(
        &pool,
        Some("https://pan.quark.cn/s/recent"),
        Some("valid"),
        Some("2024-06-01T00:00:00Z"),
    )
    .await;
    let never = insert_link(&pool, Some("https://pan.quark.cn/s/never"), None, None).await;
    let old = insert_link(
        &pool,
        Some("https://pan.baidu.com/s/1old"),
        Some("expired"),
        Some("2023-01-01T00:00:00Z"),
    )
    .await;

    let source = PgSource::new(pool, SourceSpec::new("links")).unwrap();
    let records = source.page(0, 10).await.unwrap().records;

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![never.as_str(), old.as_str(), recent.as_str()]);
    assert_eq!(records[0].status, LinkStatus::Unchecked);
    assert_eq!(records[0].last_checked, None);
    assert_eq!(records[1].status, LinkStatus::Expired);
    assert_eq!(records[2].source, "links");
}

#[tokio::test]
async fn page_respects_offset_and_limit() {
    let (pool, _container) = setup_test_db().await;
    for i in 0..5 {
        let checked = format!("2024-01-0{}T00:00:00Z", i + 1);
        insert_link(
            &pool,
            Some(&format!("https://pan.quark.cn/s/{i}")),
            None,
            Some(&checked),
        )
        .await;
    }

    let source = PgSource::new(pool, SourceSpec::new("links")).unwrap();
    let page = source.page(2, 2).await.unwrap().records;

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].url, "https://pan.quark.cn/s/2");
    assert_eq!(page[1].url, "https://pan.quark.cn/s/3");
}

#[tokio::test]
async fn update_with_status_writes_both_columns() {
    let (pool, _container) = setup_test_db().await;
    let id = insert_link(&pool, Some("https://pan.quark.cn/s/a"), None, None).await;
    let source = PgSource::new(pool.clone(), SourceSpec::new("links")).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

    source
        .update(
            &id,
            &RecordUpdate {
                status: Some(LinkStatus::Expired),
                last_checked: now,
            },
        )
        .await
        .unwrap();

    let record = source.page(0, 1).await.unwrap().records.remove(0);
    assert_eq!(record.status, LinkStatus::Expired);
    assert_eq!(record.last_checked, Some(now));
}

#[tokio::test]
async fn update_without_status_keeps_status() {
    let (pool, _container) = setup_test_db().await;
    let id = insert_link(&pool, Some("https://pan.quark.cn/s/a"), Some("valid"), None).await;
    let source = PgSource::new(pool, SourceSpec::new("links")).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

    source
        .update(
            &id,
            &RecordUpdate {
                status: None,
                last_checked: now,
            },
        )
        .await
        .unwrap();

    let record = source.page(0, 1).await.unwrap().records.remove(0);
    assert_eq!(record.status, LinkStatus::Valid);
    assert_eq!(record.last_checked, Some(now));
}

#[tokio::test]
async fn update_unknown_id_fails() {
    let (pool, _container) = setup_test_db().await;
    let source = PgSource::new(pool, SourceSpec::new("links")).unwrap();

    let result = source
        .update(
            "999999",
            &RecordUpdate {
                status: None,
                last_checked: Utc::now(),
            },
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn custom_columns_through_store() {
    let (pool, _container) = setup_test_db().await;
    sqlx::query("INSERT INTO resources (share_url, state, checked_at) VALUES ($1, NULL, NULL)")
        .bind("https://pan.baidu.com/s/1abc")
        .execute(&pool)
        .await
        .unwrap();

    let store = Store::from_pool(pool);
    let spec = SourceSpec::new("resources").with_fields(SourceFields {
        id: "id".into(),
        url: "share_url".into(),
        status: "state".into(),
        checked: "checked_at".into(),
    });
    let source = store.source(&spec).unwrap();

    let records = source.page(0, 10).await.unwrap().records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://pan.baidu.com/s/1abc");

    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    source
        .update(
            &records[0].id,
            &RecordUpdate {
                status: Some(LinkStatus::Valid),
                last_checked: now,
            },
        )
        .await
        .unwrap();

    let record = source.page(0, 1).await.unwrap().records.remove(0);
    assert_eq!(record.status, LinkStatus::Valid);
    assert!(record.last_checked.is_some());
}
