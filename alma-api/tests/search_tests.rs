//! Router tests for the institution search surface.

use std::sync::Arc;
use std::time::Duration;

use alma_api::routes::institutions::TIER_HEADER;
use alma_api::{create_api_router, AppState, ErrorCode};
use alma_core::{AlmaConfig, Institution, ResolverConfig};
use alma_resolver::Resolver;
use alma_source::ExternalSourceClient;
use alma_storage::{EphemeralCache, PersistentStore};
use alma_test_utils::{fixtures, generators, MockSourceTransport, RecordingDocumentBackend};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use proptest::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(
    backend: RecordingDocumentBackend,
    transport: MockSourceTransport,
) -> (Router, Arc<MockSourceTransport>) {
    let transport = Arc::new(transport);
    let resolver = Resolver::new(
        fixtures::enabled_resolver_config(),
        Arc::new(EphemeralCache::new(Duration::from_secs(3600))),
        Arc::new(PersistentStore::new(Arc::new(backend))),
        Arc::new(ExternalSourceClient::new(
            transport.clone(),
            &fixtures::enabled_source_config(),
        )),
    );
    (create_api_router(AppState::new(resolver)), transport)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let tier = response
        .headers()
        .get(TIER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, tier, json)
}

#[tokio::test]
async fn test_search_returns_array_from_api_tier() {
    let (app, transport) = app_with(
        RecordingDocumentBackend::new(),
        MockSourceTransport::returning(json!([
            { "name": "Techno India University", "state": "West Bengal" }
        ])),
    )
    .await;

    let (status, tier, body) = get(&app, "/api/institutions/search?q=Techno%20India").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tier.as_deref(), Some("api"));
    assert_eq!(
        body,
        json!([{ "name": "Techno India University", "state": "West Bengal" }])
    );
    assert_eq!(transport.queries(), vec!["Techno India".to_string()]);

    let (status, tier, _) = get(&app, "/api/institutions/search?q=techno%20india").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tier.as_deref(), Some("cache"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_search_serves_store_hits() {
    let (app, transport) = app_with(
        RecordingDocumentBackend::seeded(&[fixtures::st_xaviers()]).await,
        MockSourceTransport::returning(json!([])),
    )
    .await;

    let (status, tier, body) = get(&app, "/api/institutions/search?q=St.%20Xa").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tier.as_deref(), Some("store"));
    let found: Vec<Institution> = serde_json::from_value(body).expect("institutions");
    assert_eq!(found, vec![fixtures::st_xaviers()]);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_empty_result_is_not_found() {
    let (app, _) = app_with(
        RecordingDocumentBackend::new(),
        MockSourceTransport::returning(json!({ "error": "upstream" })),
    )
    .await;

    for uri in [
        "/api/institutions/search?q=Nowhere%20College",
        "/api/institutions/search?q=ab",
    ] {
        let (status, tier, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert!(tier.is_none());
        assert_eq!(body["message"], "No matching institutions");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_unresolved_query_is_not_found(query in generators::arb_query()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let (status, tier, body, calls) = runtime.block_on(async {
            let (app, transport) = app_with(
                RecordingDocumentBackend::new(),
                MockSourceTransport::returning(json!([])),
            )
            .await;
            let uri = format!(
                "/api/institutions/search?q={}",
                query.replace(' ', "%20")
            );
            let (status, tier, body) = get(&app, &uri).await;
            (status, tier, body, transport.calls())
        });

        prop_assert_eq!(status, StatusCode::NOT_FOUND);
        prop_assert!(tier.is_none());
        prop_assert_eq!(body["message"].as_str(), Some("No matching institutions"));
        prop_assert_eq!(calls, 1);
    }
}

#[tokio::test]
async fn test_missing_query_is_bad_request() {
    let (app, transport) = app_with(
        RecordingDocumentBackend::new(),
        MockSourceTransport::returning(json!([])),
    )
    .await;

    let (status, _, body) = get(&app, "/api/institutions/search").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        serde_json::from_value::<ErrorCode>(body["code"].clone()).expect("code"),
        ErrorCode::InvalidInput
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_liveness_reports_cache_stats() {
    let (app, _) = app_with(
        RecordingDocumentBackend::seeded(&[fixtures::techno_india_university()]).await,
        MockSourceTransport::returning(json!([])),
    )
    .await;
    get(&app, "/api/institutions/search?q=Techno").await;
    get(&app, "/api/institutions/search?q=Techno").await;

    let (status, _, body) = get(&app, "/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["fallback_enabled"], true);
    assert_eq!(body["details"]["cache_entries"], 1);
    assert_eq!(body["details"]["cache_hit_rate"], 0.5);
}

#[tokio::test]
async fn test_from_config_opens_lmdb_store() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let mut config = AlmaConfig::default();
    config.resolver = ResolverConfig::new().with_enabled(true);
    config.store.path = dir.path().join("institutions");

    let state = AppState::from_config(&config).expect("state");
    let report = state
        .resolver
        .store()
        .upsert_batch(&[fixtures::techno_india_college()])
        .await;
    assert_eq!(report.committed, 1);

    let app = create_api_router(state);
    let (status, tier, body) = get(&app, "/api/institutions/search?q=Techno%20India%20Coll").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tier.as_deref(), Some("store"));
    assert_eq!(body[0]["name"], "Techno India College of Technology");
}

#[test]
fn test_from_config_rejects_invalid_settings() {
    let mut config = AlmaConfig::default();
    config.source.timeout = Duration::ZERO;

    let err = AppState::from_config(&config).unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigurationError);
}
