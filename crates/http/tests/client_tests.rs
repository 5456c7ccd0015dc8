//! Integration tests for the H-Bank HTTP client

use hbank_http::client::{HbankClient, error::ClientError};
use hbank_http::cookies::ID_TOKEN_COOKIE;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_client_builder() {
    let client = HbankClient::builder()
        .base_url("http://localhost:8080/api/")
        .user_agent("hbank-test")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080/api");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = HbankClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_client_builder_rejects_invalid_base_url() {
    let result = HbankClient::new("not a url");
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_login_url_encodes_redirect() {
    let client = HbankClient::new("https://hbank.julianh.de/api").unwrap();
    let url = client.login_url("/group/5?tab=members");

    assert_eq!(url.path(), "/api/auth/login");
    let redirect: Vec<_> = url.query_pairs().collect();
    assert_eq!(redirect.len(), 1);
    assert_eq!(redirect[0].0, "redirect");
    assert_eq!(redirect[0].1, "/group/5?tab=members");
    assert!(url.as_str().contains("redirect=%2Fgroup%2F5%3Ftab%3Dmembers"));
}

#[tokio::test]
async fn test_unauthorized_and_forbidden_are_not_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let client = HbankClient::new(mock_server.uri()).unwrap();

    assert_eq!(client.refresh().await.unwrap().as_u16(), 401);
    assert_eq!(client.logout().await.unwrap().as_u16(), 403);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = HbankClient::new(mock_server.uri()).unwrap();

    match client.refresh().await {
        Err(ClientError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("Expected ServerError, got {other:?}"),
    }
    assert!(matches!(client.logout().await, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn test_refresh_stores_cookies_and_replays_them() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "ID-Token=abc.def; Path=/; SameSite=Strict")
                .append_header("set-cookie", "ID-Token-Signature=sig; Path=/; HttpOnly"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("cookie", "ID-Token=abc.def; ID-Token-Signature=sig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&mock_server)
        .await;

    let client = HbankClient::new(mock_server.uri()).unwrap();
    client.refresh().await.unwrap();

    assert_eq!(client.cookies().visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
    assert_eq!(client.cookies().visible("ID-Token-Signature"), None);

    let status = client.status().await.unwrap();
    assert!(status.base.success);
}

#[tokio::test]
async fn test_fetch_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "config": {
                "captchaEnabled": true,
                "emailEnabled": false,
                "minNameLength": 3,
                "maxNameLength": 32,
                "maxPageSize": 100,
                "idProvider": "https://id.julianh.de"
            }
        })))
        .mount(&mock_server)
        .await;

    let client = HbankClient::new(mock_server.uri()).unwrap();
    let config = client.fetch_config().await.unwrap();

    assert!(config.captcha_enabled);
    assert!(!config.email_enabled);
    assert_eq!(config.min_name_length, 3);
    assert_eq!(config.max_name_length, 32);
    assert_eq!(config.max_page_size, 100);
    assert_eq!(config.id_provider, "https://id.julianh.de");
    assert_eq!(config.max_password_length, 0);
}

#[tokio::test]
async fn test_fetch_config_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "message": "maintenance"})),
        )
        .mount(&mock_server)
        .await;

    let client = HbankClient::new(mock_server.uri()).unwrap();
    match client.fetch_config().await {
        Err(ClientError::MissingConfig(message)) => assert_eq!(message, "maintenance"),
        other => panic!("Expected MissingConfig, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cookie_jar_is_bound_to_base_url_host() {
    let client = HbankClient::new("https://hbank.julianh.de/api").unwrap();
    assert_eq!(client.cookies().host(), "hbank.julianh.de");

    let foreign = std::sync::Arc::new(hbank_http::CookieJar::for_host("evil.example"));
    let result = HbankClient::builder()
        .base_url("https://hbank.julianh.de/api")
        .cookie_jar(foreign)
        .build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}
