use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use api_lib::{make_server, query::QueryAdapter, AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use database::{
    entities::{chain, log},
    logs::LogFilter,
};
use sea_orm::{prelude::DateTimeWithTimeZone, DbErr};
use serde_json::Value;
use store_sync::{
    observe_caught_up, progress::ProgressPublisher, AppliedBatch, BlockRange, CaughtUp,
};
use tower::ServiceExt;

fn ts() -> DateTimeWithTimeZone {
    chrono::DateTime::parse_from_rfc3339("2025-03-06T00:00:00Z").unwrap()
}

fn row(block_number: i64, log_index: i64, address: &str) -> log::Model {
    log::Model {
        id: block_number * 100 + log_index,
        chain_id: 1,
        block_number,
        log_index,
        block_hash: None,
        transaction_hash: Some(format!("0x{block_number:064x}")),
        address: address.into(),
        topic0: Some("0xddf252ad".into()),
        topics: serde_json::json!(["0xddf252ad"]),
        data: "0x".into(),
        created_at: ts(),
    }
}

/// In-memory query backend applying the same filter semantics as Postgres.
#[derive(Default)]
struct StubQuery {
    rows: Vec<log::Model>,
    checkpoint: Option<chain::Model>,
    fail: bool,
    filters: Mutex<Vec<LogFilter>>,
}

#[async_trait]
impl QueryAdapter for StubQuery {
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<log::Model>, DbErr> {
        if self.fail {
            return Err(DbErr::Custom("connection refused".into()));
        }
        self.filters.lock().unwrap().push(filter.clone());

        Ok(self
            .rows
            .iter()
            .filter(|r| r.chain_id == filter.chain_id as i64)
            .filter(|r| filter.address.as_ref().is_none_or(|a| *a == r.address))
            .filter(|r| filter.from_block.is_none_or(|b| r.block_number >= b as i64))
            .filter(|r| filter.to_block.is_none_or(|b| r.block_number <= b as i64))
            .filter(|r| {
                filter
                    .after
                    .is_none_or(|(b, i)| (r.block_number, r.log_index) > (b as i64, i as i64))
            })
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn checkpoint(&self, _chain_id: u64) -> Result<Option<chain::Model>, DbErr> {
        if self.fail {
            return Err(DbErr::Custom("connection refused".into()));
        }
        Ok(self.checkpoint.clone())
    }
}

struct Harness {
    router: Router,
    publisher: ProgressPublisher,
    caught_up: CaughtUp,
}

fn harness(query: StubQuery) -> Harness {
    let (publisher, progress) = ProgressPublisher::new(16);
    let caught_up = observe_caught_up(&progress);
    let state = AppState {
        chain_id: 1,
        schema_version: "1".into(),
        query: Arc::new(query),
        progress,
        caught_up: caught_up.clone(),
    };
    Harness {
        router: make_server(state),
        publisher,
        caught_up,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn healthz_is_always_ok() {
    let h = harness(StubQuery::default());
    let (status, body) = get(&h.router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn readyz_flips_once_caught_up() {
    let h = harness(StubQuery::default());

    let (status, body) = get(&h.router, "/readyz").await;
    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body, b"backfilling");

    h.publisher.observe_head(105);
    h.publisher.record_applied(AppliedBatch {
        range: BlockRange::new(101, 105).unwrap(),
        log_count: 0,
    });
    tokio::time::timeout(Duration::from_secs(1), h.caught_up.wait())
        .await
        .unwrap();

    let (status, body) = get(&h.router, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ready");

    // Falling behind again does not revoke readiness.
    h.publisher.observe_head(500);
    let (status, _) = get(&h.router, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logs_are_paginated_by_position() {
    let h = harness(StubQuery {
        rows: vec![row(10, 0, "0xaa"), row(10, 1, "0xaa"), row(12, 0, "0xaa")],
        ..Default::default()
    });

    let (status, page) = get_json(&h.router, "/api/logs?items_count=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["success"], true);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["items"][1]["log_index"], 1);
    let next = &page["next_page_params"];
    assert_eq!(next["block_number"], 10);
    assert_eq!(next["log_index"], 1);
    assert_eq!(next["items_count"], 2);

    let (_, page) = get_json(
        &h.router,
        "/api/logs?items_count=2&block_number=10&log_index=1",
    )
    .await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["block_number"], 12);
    assert_eq!(items[0]["topics"][0], "0xddf252ad");
    assert!(page["next_page_params"].is_null());
}

#[tokio::test]
async fn logs_filters_reach_the_backend() {
    let query = Arc::new(StubQuery {
        rows: vec![row(5, 0, "0xaa"), row(6, 0, "0xbb"), row(7, 0, "0xaa")],
        ..Default::default()
    });
    let (publisher, progress) = ProgressPublisher::new(4);
    let caught_up = observe_caught_up(&progress);
    let router = make_server(AppState {
        chain_id: 1,
        schema_version: "1".into(),
        query: query.clone(),
        progress,
        caught_up,
    });

    let (status, page) =
        get_json(&router, "/api/logs?address=0xaa&from_block=6&to_block=9").await;
    assert_eq!(status, StatusCode::OK);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["block_number"], 7);

    let filters = query.filters.lock().unwrap();
    assert_eq!(filters[0].address.as_deref(), Some("0xaa"));
    assert_eq!(filters[0].limit, 51);
    assert_eq!(filters[0].after, None);
    drop(publisher);
}

#[tokio::test]
async fn items_count_is_clamped() {
    let query = Arc::new(StubQuery::default());
    let (_publisher, progress) = ProgressPublisher::new(4);
    let router = make_server(AppState {
        chain_id: 1,
        schema_version: "1".into(),
        query: query.clone(),
        caught_up: observe_caught_up(&progress),
        progress,
    });

    get(&router, "/api/logs?items_count=0").await;
    get(&router, "/api/logs?items_count=100000").await;

    let limits: Vec<_> = query.filters.lock().unwrap().iter().map(|f| f.limit).collect();
    assert_eq!(limits, vec![2, 501]);
}

#[tokio::test]
async fn inverted_block_range_is_rejected() {
    let h = harness(StubQuery::default());
    let (status, body) = get_json(&h.router, "/api/logs?from_block=9&to_block=3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn oversized_block_filter_is_rejected() {
    let query = Arc::new(StubQuery {
        rows: vec![row(5, 0, "0xaa")],
        ..Default::default()
    });
    let (_publisher, progress) = ProgressPublisher::new(4);
    let router = make_server(AppState {
        chain_id: 1,
        schema_version: "1".into(),
        query: query.clone(),
        caught_up: observe_caught_up(&progress),
        progress,
    });

    for uri in [
        "/api/logs?from_block=9223372036854775808",
        "/api/logs?to_block=18446744073709551615",
        "/api/logs?block_number=9223372036854775808&log_index=0",
    ] {
        let (status, body) = get_json(&router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false);
    }
    assert!(query.filters.lock().unwrap().is_empty());

    let (status, _) = get_json(&router, "/api/logs?from_block=9223372036854775807").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn backend_failure_is_reported() {
    let h = harness(StubQuery {
        fail: true,
        ..Default::default()
    });
    let (status, body) = get_json(&h.router, "/api/logs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["next_page_params"].is_null());
}

#[tokio::test]
async fn status_reports_progress_and_checkpoint() {
    let h = harness(StubQuery {
        checkpoint: Some(chain::Model {
            chain_id: 1,
            schema_version: "1".into(),
            last_updated_block_number: Some(100),
            updated_at: ts(),
        }),
        ..Default::default()
    });
    h.publisher.seed_applied(100);
    h.publisher.observe_head(120);

    let (status, body) = get_json(&h.router, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chain_id"], 1);
    assert_eq!(body["schema_version"], "1");
    assert_eq!(body["checkpoint_block"], 100);
    assert_eq!(body["latest_chain_block"], 120);
    assert_eq!(body["last_applied_block"], 100);
    assert_eq!(body["caught_up"], false);
}
