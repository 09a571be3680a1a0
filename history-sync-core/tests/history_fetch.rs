use chrono::{TimeZone, Utc};
use history_sync_core::contract::{
    HistoryFilter, HistoryPayload, MockHistoryProvider, RawDestination, RawHistoryRecord,
};
use history_sync_core::error::FetchError;
use history_sync_core::history::{fetch_history, validate_filter, validate_record};
use history_sync_core::model::{HistoryStatus, Platform};

fn raw(id: &str, created: &str) -> RawHistoryRecord {
    RawHistoryRecord {
        id: Some(id.into()),
        content: Some(format!("post {id}")),
        created: Some(created.into()),
        ..RawHistoryRecord::default()
    }
}

#[test]
fn test_wrapped_and_bare_payloads_parse_to_the_same_records() {
    let bare: HistoryPayload = serde_json::from_str(
        r#"[{"id":"A1","post":"hello","created":"2024-03-01T10:00:00Z","status":"success"}]"#,
    )
    .unwrap();
    let wrapped: HistoryPayload = serde_json::from_str(
        r#"{"history":[{"id":"A1","post":"hello","created":"2024-03-01T10:00:00Z","status":"success"}]}"#,
    )
    .unwrap();

    assert_eq!(bare.into_records(), wrapped.into_records());
}

#[tokio::test]
async fn test_forwards_filter_and_drops_malformed_records() {
    let mut provider = MockHistoryProvider::new();
    provider
        .expect_fetch_history()
        .withf(|req| {
            req.platform == Platform::Linkedin
                && req.profile_key == "PK-9"
                && req.filter.limit == Some(10)
                && req.filter.status == Some(HistoryStatus::Success)
        })
        .times(1)
        .returning(|_| {
            Ok(HistoryPayload::List(vec![
                raw("ok-1", "2024-03-01T10:00:00Z"),
                RawHistoryRecord {
                    id: None,
                    ..raw("", "2024-03-01T10:00:00Z")
                },
                raw("no-time", "yesterday"),
                raw("ok-2", "2024-03-02 08:30:00"),
            ]))
        });

    let filter = HistoryFilter {
        limit: Some(10),
        last_days: None,
        status: Some(HistoryStatus::Success),
    };
    let posts = fetch_history(&provider, Platform::Linkedin, "PK-9", &filter)
        .await
        .expect("fetch should succeed");

    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["ok-1", "ok-2"]);
    assert_eq!(
        posts[1].created,
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_empty_history_is_distinguishable_from_failure() {
    let mut empty = MockHistoryProvider::new();
    empty
        .expect_fetch_history()
        .returning(|_| Ok(HistoryPayload::Wrapped { history: vec![] }));
    let mut failing = MockHistoryProvider::new();
    failing.expect_fetch_history().returning(|_| {
        Err(FetchError::Api {
            status: 401,
            message: "invalid api key".into(),
        })
    });

    let ok = fetch_history(&empty, Platform::Tiktok, "PK", &HistoryFilter::default()).await;
    let err = fetch_history(&failing, Platform::Tiktok, "PK", &HistoryFilter::default()).await;

    assert!(matches!(ok, Ok(ref v) if v.is_empty()));
    let err = err.expect_err("401 must surface as an error");
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_invalid_filter_never_reaches_the_provider() {
    let mut provider = MockHistoryProvider::new();
    provider.expect_fetch_history().never();

    let filter = HistoryFilter {
        limit: Some(0),
        ..HistoryFilter::default()
    };
    let result = fetch_history(&provider, Platform::Reddit, "PK", &filter).await;

    assert!(matches!(result, Err(FetchError::InvalidFilter(_))));
    assert!(validate_filter(&HistoryFilter {
        last_days: Some(0),
        ..HistoryFilter::default()
    })
    .is_err());
}

#[test]
fn test_validate_record_normalizes_destinations_and_status() {
    let record = RawHistoryRecord {
        id: Some("  H-7 ".into()),
        ref_id: Some(" ".into()),
        content: None,
        created: Some("2024-01-05T12:00:00+02:00".into()),
        status: Some("weird".into()),
        post_ids: vec![
            RawDestination {
                platform: Some("x".into()),
                id: Some("tw-1".into()),
                post_url: Some("https://x.com/a/status/1".into()),
                is_video: None,
            },
            RawDestination {
                platform: Some("myspace".into()),
                ..RawDestination::default()
            },
        ],
        media_urls: vec!["".into(), " https://cdn.example.com/a.jpg ".into()],
    };

    let post = validate_record(record).expect("record is usable");

    assert_eq!(post.id, "H-7");
    assert!(post.ref_id.is_none());
    assert_eq!(post.content, "");
    assert!(post.status.is_none());
    assert_eq!(post.created, Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap());
    assert_eq!(post.post_ids.len(), 1);
    assert_eq!(post.post_ids[0].platform, Platform::Twitter);
    assert!(!post.post_ids[0].is_video);
    assert_eq!(post.media_urls, vec!["https://cdn.example.com/a.jpg".to_string()]);
}

#[test]
fn test_validate_record_rejects_blank_id() {
    let err = validate_record(raw("   ", "2024-01-01T00:00:00Z")).unwrap_err();
    assert!(err.contains("no id"));
}
