//! # 凭证池客户端集成测试
//!
//! wiremock 模拟账号管理服务：成功路径、402 权益耗尽映射、
//! 瞬态错误与两种错误体形态。

use nursor_gateway::dispatch::DispatchClient;
use nursor_gateway::error::GatewayError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn acquire_parses_account_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acquire"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"userId": "42"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "account": {
                "id": 775,
                "cursorId": "cur-775",
                "accessToken": "X",
                "clientKey": "K",
                "status": "dispatched",
                "usage": 3
            },
            "reused": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    let outcome = client.acquire(42).await.unwrap();
    assert_eq!(outcome.account.id, 775);
    assert_eq!(outcome.account.access_token, "X");
    assert_eq!(outcome.account.client_key, "K");
    assert_eq!(outcome.account.cursor_id.as_deref(), Some("cur-775"));
    assert!(outcome.reused);
}

#[tokio::test]
async fn acquire_maps_402_to_entitlement_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acquire"))
        .respond_with(
            ResponseTemplate::new(402)
                .set_body_json(serde_json::json!({"error": "quota", "message": "over"})),
        )
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    let err = client.acquire(42).await.unwrap_err();
    assert!(err.is_entitlement_exhausted());
    assert!(err.to_string().contains("quota - over"));
}

#[tokio::test]
async fn acquire_maps_5xx_to_transient_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acquire"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream blew up"))
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    let err = client.acquire(42).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network { .. }));
    assert!(err.to_string().contains("upstream blew up"));
}

#[tokio::test]
async fn increment_usage_posts_account_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/usage/inc"))
        .and(body_json(serde_json::json!({"accountId": 775})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    client.increment_usage(775).await.unwrap();
}

#[tokio::test]
async fn disable_with_check_hits_account_scoped_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/account/775/disable-with-check"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    client.disable_with_check(775).await.unwrap();

    // 非 200 映射为瞬态错误
    let err = client.disable_with_check(999).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network { .. }));
}

#[tokio::test]
async fn fetch_available_returns_ready_accounts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/available"))
        .and(body_json(serde_json::json!({"count": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accounts": [
                {"id": 3, "accessToken": "A", "clientKey": "ka"},
                {"id": 4, "accessToken": "B", "clientKey": "kb"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DispatchClient::new(server.uri()).unwrap();
    let accounts = client.fetch_available(2).await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].id, 3);
    assert_eq!(accounts[1].id, 4);
}
