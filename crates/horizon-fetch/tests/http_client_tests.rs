//! Integration tests for the fetch client.

use std::time::Duration;

use horizon_fetch::{FetchClient, FetchError, FetchOptions, HttpMethod, MultipartForm};
use serde::Deserialize;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Todo {
    id: u32,
    title: String,
}

async fn last_request(server: &MockServer) -> wiremock::Request {
    server
        .received_requests()
        .await
        .expect("Request recording disabled")
        .pop()
        .expect("No request received")
}

#[tokio::test]
async fn test_get_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":1}"#))
        .mount(&mock_server)
        .await;

    let client = FetchClient::new();
    let response = client
        .execute(HttpMethod::Get, format!("{}/ok", mock_server.uri()), None)
        .await
        .expect("Request failed");

    assert_eq!(response.status_code(), 200);
    assert!(!response.is_error());
    assert_eq!(response.error_message(), None);
    assert_eq!(response.text(), r#"{"id":1}"#);
}

#[tokio::test]
async fn test_not_found_without_throw() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let client = FetchClient::new();
    let response = client
        .get(
            format!("{}/missing", mock_server.uri()),
            Some(FetchOptions::new().throw_on_error(false)),
        )
        .await
        .expect("Request should not fail");

    assert_eq!(response.status_code(), 404);
    assert!(response.is_error());
    assert_eq!(response.error_message(), Some("HTTP 404 Not Found"));
    assert_eq!(response.text(), "Not Found");
}

#[tokio::test]
async fn test_not_found_throws_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let url = format!("{}/missing", mock_server.uri());
    let err = FetchClient::new().get(&url, None).await.unwrap_err();

    match err {
        FetchError::Transport {
            status,
            message,
            url: failed_url,
        } => {
            assert_eq!(status, 404);
            assert!(!message.is_empty());
            assert_eq!(failed_url, url);
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_failure() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let client = FetchClient::builder()
        .connect_timeout(Duration::from_secs(2))
        .build()
        .expect("Failed to build client");

    let response = client
        .get(&url, Some(FetchOptions::new().throw_on_error(false)))
        .await
        .expect("Request should not fail");
    assert!(response.is_error());
    assert_eq!(response.status_code(), 0);
    assert!(!response.error_message().unwrap_or_default().is_empty());

    let err = client.get(&url, None).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), Some(0));
}

#[tokio::test]
async fn test_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "title": "x"})),
        )
        .mount(&mock_server)
        .await;

    let todo: Todo = FetchClient::new()
        .get_json(format!("{}/todos/1", mock_server.uri()), None)
        .await
        .expect("Request failed");

    assert_eq!(
        todo,
        Todo {
            id: 1,
            title: "x".to_string()
        }
    );
}

#[tokio::test]
async fn test_get_json_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let err = FetchClient::new()
        .get_json::<Todo>(format!("{}/todos/1", mock_server.uri()), None)
        .await
        .unwrap_err();

    assert!(err.is_decode());
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todos"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 7, "title": "new"})),
        )
        .mount(&mock_server)
        .await;

    let todo: Todo = FetchClient::new()
        .post_json(
            format!("{}/todos", mock_server.uri()),
            r#"{"title":"new"}"#,
            None,
        )
        .await
        .expect("Request failed");
    assert_eq!(todo.id, 7);

    let request = last_request(&mock_server).await;
    assert_eq!(request.body, br#"{"title":"new"}"#);
}

#[tokio::test]
async fn test_caller_content_type_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/todos/1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let options = FetchOptions::new().header("Content-Type", "text/plain");
    FetchClient::new()
        .put(format!("{}/todos/1", mock_server.uri()), "{}", Some(options))
        .await
        .expect("Request failed");

    let request = last_request(&mock_server).await;
    assert_eq!(
        request.headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/plain")
    );
    assert_eq!(request.body, b"{}");
}

#[tokio::test]
async fn test_upload_multipart_beats_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let form = MultipartForm::new()
        .text("name", "avatar")
        .file_bytes("file", vec![1u8, 2, 3, 4], "a.bin", Some("application/octet-stream"));
    let options = FetchOptions::new().json_body(r#"{"ignored":true}"#);

    FetchClient::new()
        .upload(format!("{}/upload", mock_server.uri()), form, Some(options))
        .await
        .expect("Request failed");

    let request = last_request(&mock_server).await;
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("Not a multipart request");

    let body = String::from_utf8_lossy(&request.body).into_owned();
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    assert!(body.contains("name=\"name\"\r\n\r\navatar\r\n"));
    assert!(body.contains("name=\"file\"; filename=\"a.bin\""));
    assert!(!body.contains("ignored"));
    assert!(request.body.windows(4).any(|w| w == [1u8, 2, 3, 4]));
}

#[tokio::test]
async fn test_header_names_are_case_insensitive() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("x-token", "second"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let options = FetchOptions::new()
        .header("X-Token", "first")
        .header("x-token", "second")
        .throw_on_error(false);
    let response = FetchClient::new()
        .get(format!("{}/auth", mock_server.uri()), Some(options))
        .await
        .expect("Request failed");
    assert_eq!(response.status_code(), 200);

    let request = last_request(&mock_server).await;
    assert_eq!(request.headers.get_all("x-token").iter().count(), 1);
}

#[tokio::test]
async fn test_get_and_delete_never_send_body() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/items/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = FetchClient::new();
    let url = format!("{}/items/1", mock_server.uri());
    let options = FetchOptions::new().json_body(r#"{"a":1}"#);

    client
        .get(&url, Some(options.clone()))
        .await
        .expect("GET failed");
    client
        .delete(&url, Some(options))
        .await
        .expect("DELETE failed");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert!(request.body.is_empty());
        assert!(request.headers.get("content-type").is_none());
    }
}

#[tokio::test]
async fn test_body_readable_after_release() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xffu8, 0x00, 0x7f]))
        .mount(&mock_server)
        .await;

    let mut response = FetchClient::new()
        .get(format!("{}/data", mock_server.uri()), None)
        .await
        .expect("Request failed");

    let handle = response.take_handle().expect("Handle missing");
    assert!(handle.outcome().is_some());
    handle.release();

    assert_eq!(&response.raw_bytes()[..], &[0xff, 0x00, 0x7f]);
    assert_eq!(response.text(), "");
    assert!(response.handle().is_none());
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("b")
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&mock_server)
        .await;

    let client = FetchClient::new();
    let lenient = FetchOptions::new().throw_on_error(false);
    let (a, b) = tokio::join!(
        client.get(format!("{}/a", mock_server.uri()), None),
        client.get(format!("{}/b", mock_server.uri()), Some(lenient)),
    );

    let a = a.expect("Request a failed");
    let b = b.expect("Request b failed");
    assert_eq!(a.text(), "a");
    assert!(!a.is_error());
    assert_eq!(b.text(), "b");
    assert_eq!(b.status_code(), 500);
    assert!(b.is_error());
}

#[tokio::test]
async fn test_default_client_free_functions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&mock_server)
        .await;

    let response = horizon_fetch::get(format!("{}/ok", mock_server.uri()), None)
        .await
        .expect("Request failed");
    assert_eq!(response.text(), "fine");
}

#[tokio::test]
async fn test_default_headers_and_method_parsing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/todos/1"))
        .and(header("x-app", "horizon"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = FetchClient::builder()
        .default_header("X-App", "horizon")
        .expect("Invalid header")
        .build()
        .expect("Failed to build client");

    let method: HttpMethod = "patch".parse().expect("Unknown method");
    let response = client
        .execute(
            method,
            format!("{}/todos/1", mock_server.uri()),
            Some(FetchOptions::new().json_body("{}")),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_extension_method_passes_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .respond_with(ResponseTemplate::new(207).set_body_string("<multistatus/>"))
        .mount(&mock_server)
        .await;

    let method: HttpMethod = "PROPFIND".parse().expect("Invalid method");
    let response = FetchClient::new()
        .execute(method, format!("{}/dav/", mock_server.uri()), None)
        .await
        .expect("Request failed");
    assert_eq!(response.status_code(), 207);
    assert_eq!(response.text(), "<multistatus/>");
}
