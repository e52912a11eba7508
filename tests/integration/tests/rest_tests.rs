//! OpenAPI Transport Integration Tests
//!
//! Authenticated REST calls against the mock gateway's HTTP side.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use cyan_gateway::{GatewayError, Method, RestTransport};
use integration_tests::{test_transport, MockGateway};
use serde_json::{json, Value};

#[tokio::test]
async fn test_get_sends_bot_authorization() {
    let gateway = MockGateway::start().await.expect("Failed to start gateway");
    let transport = test_transport(&gateway);

    let user = transport.get_json("/users/@me").await.unwrap();
    assert_eq!(user["username"], "cyan-test");
    assert_eq!(user["authorization"], "Bot 102030.integration-token");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let gateway = MockGateway::start().await.expect("Failed to start gateway");
    let transport = test_transport(&gateway);

    let message = transport
        .post_json("/channels/1234/messages", json!({ "content": "hello" }))
        .await
        .unwrap();
    assert_eq!(message["channel_id"], "1234");
    assert_eq!(message["content"], "hello");
}

#[tokio::test]
async fn test_empty_reply_is_null() {
    let gateway = MockGateway::start().await.expect("Failed to start gateway");
    let transport = test_transport(&gateway);

    let reply = transport.delete("/guilds/2020131").await.unwrap();
    assert_eq!(reply, Value::Null);
}

#[tokio::test]
async fn test_error_body_becomes_api_error() {
    let gateway = MockGateway::start().await.expect("Failed to start gateway");
    let transport = test_transport(&gateway);

    match transport.request(Method::GET, "/guilds/2020131", None).await {
        Err(GatewayError::Api {
            status,
            code,
            message,
        }) => {
            assert_eq!(status, 403);
            assert_eq!(code, 11264);
            assert_eq!(message, "no permission");
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_route_uses_status() {
    let gateway = MockGateway::start().await.expect("Failed to start gateway");
    let transport = test_transport(&gateway);

    let err = transport.get_json("/nowhere").await.unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 404, code: 404, .. }));
}
