//! Integration tests using wiremock to simulate the memory service.

use aionis_client::{
    capability, Client, Credentials, Error, FailureMode, RequestOptions, RetryOverride,
};
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry(RetryOverride::new().base_delay(Duration::from_millis(10)))
        .build()
        .unwrap()
}

fn fast_retries(max_retries: u32) -> RequestOptions {
    RequestOptions::new().with_retry(
        RetryOverride::new()
            .max_retries(max_retries)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5)),
    )
}

async fn only_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

#[tokio::test]
async fn test_successful_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "commit_id": "c-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .write(
            &json!({ "input_text": "hello" }),
            RequestOptions::new().with_request_id("rid-1"),
        )
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "commit_id": "c-1" }));
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.request_id, "rid-1");
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());

    let request = only_request(&mock_server).await;
    assert_eq!(request.headers.get("x-request-id").unwrap(), "rid-1");
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, json!({ "input_text": "hello" }));
}

#[tokio::test]
async fn test_server_request_id_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/find"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "srv-9")
                .set_body_json(json!({ "nodes": [] })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .find(&json!({}), RequestOptions::new().with_request_id("local-1"))
        .await
        .unwrap();

    assert_eq!(response.request_id, "srv-9");
}

#[tokio::test]
async fn test_generated_request_id_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/recall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .recall(&json!({ "query_embedding": [0.1] }), RequestOptions::default())
        .await
        .unwrap();

    let request = only_request(&mock_server).await;
    let sent = request.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(!sent.is_empty());
    assert_eq!(response.request_id, sent);
}

#[tokio::test]
async fn test_4xx_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/recall_text"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "not_found",
            "message": "no such scope"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .recall_text(&json!({ "query_text": "x" }), fast_retries(5))
        .await;

    match result {
        Err(Error::Api(err)) => {
            assert_eq!(err.status.as_u16(), 404);
            assert_eq!(err.code, "not_found");
            assert_eq!(err.message, "no such scope");
            assert!(err.details.is_none());
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_5xx_retried_until_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.write(&json!({}), fast_retries(2)).await;

    match result {
        Err(Error::Api(err)) => {
            assert_eq!(err.status.as_u16(), 500);
            assert_eq!(err.code, "http_500");
            assert_eq!(err.message, "request failed with status 500");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_then_success() {
    let mock_server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(move |_: &Request| {
            let count = attempts_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(429)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client.write(&json!({}), fast_retries(3)).await.unwrap();

    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_keeps_request_id_and_body() {
    let mock_server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    Mock::given(method("POST"))
        .and(path("/v1/memory/events"))
        .respond_with(move |_: &Request| {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(502)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .write_event(&json!({ "session_id": "s1", "input_text": "e" }), fast_retries(1))
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].headers.get("x-request-id"),
        requests[1].headers.get("x-request-id")
    );
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn test_retry_after_header_paces_retry() {
    let mock_server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(move |_: &Request| {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503).insert_header("Retry-After", "1")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let start = Instant::now();
    let response = client.write(&json!({}), fast_retries(2)).await.unwrap();

    assert_eq!(response.attempts, 2);
    assert!(start.elapsed() >= Duration::from_millis(950));
}

#[tokio::test]
async fn test_zero_retries_fails_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.write(&json!({}), fast_retries(0)).await;

    assert!(matches!(result, Err(Error::Api(ref e)) if e.status.as_u16() == 503));
}

#[tokio::test]
async fn test_get_query_encoding_and_no_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/memory/sessions/sess%201/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "events": [] })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .list_session_events(
            " sess 1 ",
            Some(&json!({ "limit": 10, "active": true, "cursor": null })),
            RequestOptions::default(),
        )
        .await
        .unwrap();

    let request = only_request(&mock_server).await;
    assert_eq!(request.url.query(), Some("limit=10&active=true"));
    assert!(request.headers.get("content-type").is_none());
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_blank_identifier_is_rejected_before_sending() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);

    let result = client
        .list_session_events("  ", None::<&Value>, RequestOptions::default())
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = client
        .control_delete_tenant_quota("", RequestOptions::default())
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_capability_unsupported_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/packs/export"))
        .respond_with(
            ResponseTemplate::new(501)
                .insert_header("x-request-id", "srv-cap")
                .set_body_json(json!({
                    "error": "backend_capability_unsupported",
                    "message": "packs_export is not supported by embedded",
                    "details": {
                        "capability": "packs_export",
                        "backend": "embedded",
                        "failure_mode": "hard_fail",
                        "degraded_mode": "feature_disabled",
                        "fallback_applied": false,
                        "hint": "use postgres"
                    }
                })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .pack_export(&json!({ "scope": "default" }), fast_retries(0))
        .await
        .unwrap_err();

    assert!(capability::is_backend_capability_unsupported(&err));
    assert_eq!(err.request_id(), Some("srv-cap"));

    let details = err.as_api().unwrap().capability_details().unwrap();
    assert_eq!(details.capability, capability::PACKS_EXPORT);
    assert_eq!(details.backend.as_deref(), Some("embedded"));
    assert_eq!(details.failure_mode, Some(FailureMode::HardFail));
    assert_eq!(details.fallback_applied, Some(false));
    assert_eq!(details.extra["hint"], "use postgres");
}

#[tokio::test]
async fn test_header_and_credential_precedence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/admin/control/tenants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("x-tenant-id", "default")
        .unwrap()
        .api_key("default-key")
        .auth_bearer("default-token")
        .admin_token("root")
        .build()
        .unwrap();

    let options = RequestOptions::new()
        .with_header("Authorization", "Custom abc")
        .unwrap()
        .with_header("x-tenant-id", "acme")
        .unwrap()
        .with_api_key("");

    client
        .control_upsert_tenant(&json!({ "tenant_id": "acme" }), options)
        .await
        .unwrap();

    let request = only_request(&mock_server).await;
    assert_eq!(request.headers.get("authorization").unwrap(), "Custom abc");
    assert_eq!(request.headers.get("x-tenant-id").unwrap(), "acme");
    assert_eq!(request.headers.get("x-admin-token").unwrap(), "root");
    assert!(request.headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn test_bearer_injection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .auth_bearer("tok-1")
        .api_key("key-1")
        .build()
        .unwrap();

    client.health(RequestOptions::default()).await.unwrap();

    let request = only_request(&mock_server).await;
    assert_eq!(request.headers.get("authorization").unwrap(), "Bearer tok-1");
    assert_eq!(request.headers.get("x-api-key").unwrap(), "key-1");
}

#[tokio::test]
async fn test_builder_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/admin/control/audit-events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "events": [] })))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .credentials(Credentials {
            api_key: Some("key-2".to_string()),
            auth_bearer: Some("  ".to_string()),
            admin_token: Some("root".to_string()),
        })
        .build()
        .unwrap();

    client
        .control_list_audit_events(None::<&Value>, RequestOptions::default())
        .await
        .unwrap();

    let request = only_request(&mock_server).await;
    assert_eq!(request.headers.get("x-api-key").unwrap(), "key-2");
    assert_eq!(request.headers.get("x-admin-token").unwrap(), "root");
    assert!(request.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_network_error_after_retries() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let connections_clone = connections.clone();

    // Accept and immediately hang up, so every attempt fails without a response.
    let server = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            connections_clone.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let client = Client::builder()
        .base_url(format!("http://{}", addr))
        .unwrap()
        .build()
        .unwrap();

    let result = client.write(&json!({}), fast_retries(2)).await;
    server.abort();

    match result {
        Err(Error::Network(err)) => {
            assert!(err
                .message
                .starts_with("network request failed for POST /v1/memory/write: "));
            assert!(!err.timed_out);
            assert!(!err.request_id.is_empty());
        }
        other => panic!("Expected Network error, got {:?}", other),
    }
    assert_eq!(connections.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder()
        .base_url(format!("http://{}", addr))
        .unwrap()
        .build()
        .unwrap();

    let result = client.write(&json!({}), fast_retries(1)).await;

    assert!(matches!(result, Err(Error::Network(ref e)) if !e.timed_out));
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .write(
            &json!({}),
            fast_retries(0).with_timeout(Duration::from_millis(50)),
        )
        .await;

    match result {
        Err(Error::Network(err)) => assert!(err.timed_out),
        other => panic!("Expected Network timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memory/write"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let token = CancellationToken::new();
    let options = RequestOptions::new()
        .with_request_id("rid-cancel")
        .with_retry(
            RetryOverride::new()
                .max_retries(3)
                .base_delay(Duration::from_secs(10))
                .max_delay(Duration::from_secs(10))
                .jitter_ratio(0.0),
        )
        .with_cancel_token(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let start = Instant::now();
    let result = client.write(&json!({}), options).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled { ref request_id }) if request_id == "rid-cancel"));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_already_cancelled_sends_nothing() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);

    let token = CancellationToken::new();
    token.cancel();

    let result = client
        .write(&json!({}), RequestOptions::new().with_cancel_token(token))
        .await;

    assert!(matches!(result, Err(Error::Cancelled { .. })));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_text_and_empty_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/admin/control/audit-events"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain ok"))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/admin/control/tenant-quotas/acme"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let text = client
        .control_list_audit_events(None::<&Value>, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(text.data, Value::String("plain ok".to_string()));

    let empty = client
        .control_delete_tenant_quota("acme", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(empty.status.as_u16(), 204);
    assert_eq!(empty.data, Value::Null);
}

#[tokio::test]
async fn test_non_get_without_payload_sends_empty_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/admin/control/api-keys/key%2F1/revoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "revoked": true })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .control_revoke_api_key("key/1", RequestOptions::default())
        .await
        .unwrap();

    let request = only_request(&mock_server).await;
    assert_eq!(request.body, b"{}");
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
}

#[tokio::test]
async fn test_tenant_quota_put_and_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/admin/control/tenant-quotas/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenant_id": "acme" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/control/tenant-quotas/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "recall_rps": 5 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .control_upsert_tenant_quota("acme", &json!({ "recall_rps": 5 }), RequestOptions::default())
        .await
        .unwrap();
    let quota = client
        .control_get_tenant_quota("acme", RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(quota.data["recall_rps"], 5);
}

#[tokio::test]
async fn test_capability_contract_from_health() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "memory_store_backend": "embedded",
            "memory_store_feature_capabilities": { "packs_export": false },
            "memory_store_capability_contract": {
                "packs_export": { "failure_mode": "hard_fail", "degraded_modes": ["feature_disabled"] },
                "shadow_mirror_v2": {
                    "failure_mode": "soft_degrade",
                    "degraded_modes": ["capability_unsupported", "mirror_failed"]
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let contract = client
        .capability_contract(RequestOptions::default())
        .await
        .unwrap();
    let spec = contract.spec(capability::SHADOW_MIRROR_V2).unwrap();
    assert_eq!(spec.failure_mode, FailureMode::SoftDegrade);
    assert_eq!(spec.degraded_modes, vec!["capability_unsupported", "mirror_failed"]);

    let health = client.health(RequestOptions::default()).await.unwrap();
    assert_eq!(health.capability_enabled(capability::PACKS_EXPORT), Some(false));
}

#[tokio::test]
async fn test_health_tolerates_null_capability_maps() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "memory_store_recall_capabilities": null,
            "memory_store_write_capabilities": { "shadow_mirror_v2": "degraded" },
            "memory_store_feature_capabilities": { "sessions_graph": true },
            "memory_store_capability_contract": {
                "sessions_graph": { "failure_mode": "hard_fail", "degraded_modes": ["feature_disabled"] }
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let health = client.health(RequestOptions::default()).await.unwrap();
    assert!(health.ok);
    assert!(health.memory_store_recall_capabilities.is_empty());
    assert_eq!(health.capability_enabled(capability::SESSIONS_GRAPH), Some(true));
    assert_eq!(health.capability_enabled(capability::SHADOW_MIRROR_V2), None);
    assert!(health
        .memory_store_capability_contract
        .as_ref()
        .unwrap()
        .contains(capability::SESSIONS_GRAPH));

    let contract = client
        .capability_contract(RequestOptions::default())
        .await
        .unwrap();
    assert!(contract.contains(capability::SESSIONS_GRAPH));
}

#[tokio::test]
async fn test_capability_contract_missing_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let contract = client
        .capability_contract(RequestOptions::default())
        .await
        .unwrap();

    assert!(contract.is_empty());
}

#[tokio::test]
async fn test_generic_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/admin/control/tenants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenants": [] })))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/", mock_server.uri()))
        .unwrap()
        .build()
        .unwrap();

    let response = client
        .call(
            Method::GET,
            "/v1/admin/control/tenants",
            Some(&json!({ "limit": 20 })),
            RequestOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "tenants": [] }));
    let request = only_request(&mock_server).await;
    assert_eq!(request.url.query(), Some("limit=20"));
}
