use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use history_sync::load_config::{AppConfig, ProviderSection, ServerSection, StoreSection};
use history_sync::server::{router, AppState};
use history_sync_core::config::{AccountGroup, SyncConfig};
use history_sync_core::contract::{
    HistoryPayload, MockHistoryProvider, MockMediaFetcher, ProfilePayload, RawDestination,
    RawHistoryRecord,
};
use history_sync_core::error::FetchError;
use history_sync_core::model::Platform;
use history_sync_core::store::MemoryStore;
use history_sync_core::synchronise::SyncDeps;
use serde_json::Value;
use tower::ServiceExt;

fn config() -> AppConfig {
    AppConfig {
        provider: ProviderSection {
            base_url: "http://provider.invalid".into(),
            timeout_secs: 5,
            api_key: "k".into(),
        },
        store: StoreSection {
            data_dir: PathBuf::from("unused"),
        },
        sync: SyncConfig::default(),
        server: ServerSection::default(),
        account_groups: vec![AccountGroup {
            id: "acme".into(),
            profile_key: "PK-ACME".into(),
            platforms: vec![Platform::Instagram],
        }],
    }
}

fn record(id: &str, ref_id: Option<&str>, destination_id: &str) -> RawHistoryRecord {
    RawHistoryRecord {
        id: Some(id.into()),
        ref_id: ref_id.map(str::to_string),
        content: Some(format!("post {id}")),
        created: Some("2024-06-01T12:00:00Z".into()),
        post_ids: vec![RawDestination {
            platform: Some("instagram".into()),
            id: Some(destination_id.into()),
            ..RawDestination::default()
        }],
        ..RawHistoryRecord::default()
    }
}

fn app(provider: MockHistoryProvider, store: Arc<MemoryStore>) -> axum::Router {
    let deps = SyncDeps::with_memory_store(
        Arc::new(provider),
        Arc::new(MockMediaFetcher::new()),
        store,
    );
    router(AppState {
        config: Arc::new(config()),
        deps,
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn history_provider() -> MockHistoryProvider {
    let mut provider = MockHistoryProvider::new();
    provider
        .expect_fetch_history()
        .withf(|req| req.profile_key == "PK-ACME" && req.platform == Platform::Instagram)
        .returning(|_| {
            Ok(HistoryPayload::List(vec![
                record("H1", Some("REF-1"), "ig-100"),
                record("H2", None, "ig-200"),
            ]))
        });
    provider
}

#[tokio::test]
async fn test_health() {
    let app = app(MockHistoryProvider::new(), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_history_lookup_by_destination_id() {
    let app = app(history_provider(), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/history?accountGroupId=acme&platform=instagram&postId=ig-200")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["meta"]["total"], 2);
    assert_eq!(json["matches"].as_array().unwrap().len(), 1);
    assert_eq!(json["matches"][0]["id"], "H2");
    assert!(json.get("history").is_none());
}

#[tokio::test]
async fn test_history_lookup_by_ref_id_with_raw() {
    let app = app(history_provider(), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/history?profileKey=PK-ACME&platform=instagram&refId=REF-1&includeRaw=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["matches"][0]["id"], "H1");
    assert_eq!(json["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_history_requires_identifier_and_known_group() {
    let missing = app(MockHistoryProvider::new(), Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .uri("/api/history?platform=instagram")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let unknown = app(MockHistoryProvider::new(), Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .uri("/api/history?accountGroupId=nope&platform=instagram")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    let json = body_json(unknown).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let mut provider = MockHistoryProvider::new();
    provider.expect_fetch_history().returning(|_| {
        Err(FetchError::Api {
            status: 503,
            message: "maintenance".into(),
        })
    });

    let response = app(provider, Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .uri("/api/history?accountGroupId=acme&platform=instagram")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_sync_imports_group_history() {
    let mut provider = history_provider();
    provider
        .expect_fetch_profile()
        .returning(|_| Ok(ProfilePayload::default()));
    let store = Arc::new(MemoryStore::new());

    let response = app(provider, store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/history/sync")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"accountGroupId":"acme"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["updated"], 2);
    assert_eq!(json["reports"][0]["imported"], 2);
    assert_eq!(store.posts().len(), 2);
    assert_eq!(store.accounts().len(), 1);
}

#[tokio::test]
async fn test_sync_unknown_group_is_not_found() {
    let response = app(MockHistoryProvider::new(), Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/history/sync")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"accountGroupId":"ghost","platforms":["instagram"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_query_is_json_bad_request() {
    let mut provider = MockHistoryProvider::new();
    provider.expect_fetch_history().never();

    let response = app(provider, Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .uri("/api/history?accountGroupId=acme&platform=instagram&limit=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(!json["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_sync_body_is_json_bad_request() {
    let store = Arc::new(MemoryStore::new());
    for body in [r#"{"accountGroupId":"#, r#"{"platforms":["instagram"]}"#] {
        let response = app(MockHistoryProvider::new(), store.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/history/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    let missing_type = app(MockHistoryProvider::new(), store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/history/sync")
                .body(Body::from(r#"{"accountGroupId":"acme"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing_type.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing_type).await["success"], false);
    assert!(store.posts().is_empty());
}
