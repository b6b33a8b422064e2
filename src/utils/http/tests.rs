use super::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_default_http_client_builds() {
    let _client = default_http_client();
}

async fn get_response(server: &MockServer) -> Response {
    Client::new().get(server.uri()).send().await.unwrap()
}

#[tokio::test]
async fn test_limited_body_under_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let (result, truncated) = limited_body(resp, 1024).await.unwrap();
    assert_eq!(result, b"hello world");
    assert!(!truncated);
}

#[tokio::test]
async fn test_limited_body_rejects_large_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 2048]))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let err = limited_body(resp, 1024).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_limited_text_reads_error_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"bad"}"#))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let text = limited_text(resp, MAX_ERROR_BODY_BYTES).await.unwrap();
    assert_eq!(text, r#"{"error":"bad"}"#);
}
