mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{json_request, read_response, relay_router, sse_body, UpstreamMock, API_KEY, MODEL};
use serde_json::{json, Value};
use tower::ServiceExt;

fn chat_body(mock: &UpstreamMock, stream: bool) -> Value {
    json!({
        "messages": [{"role": "user", "content": "What is ownership?"}],
        "baseUrl": mock.base_url(),
        "apiKey": API_KEY,
        "modelName": MODEL,
        "stream": stream
    })
}

// -- Validation --

#[tokio::test]
async fn missing_configuration_returns_400_without_upstream_call() {
    let mock = UpstreamMock::start().await;
    mock.expect_no_calls().await;

    for field in ["baseUrl", "apiKey", "modelName"] {
        let mut body = chat_body(&mock, true);
        body[field] = json!("");
        let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
        let (status, _, bytes) = read_response(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "field {field}");

        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "MissingConfiguration");
        assert!(json["error"].as_str().unwrap().contains("Missing required configuration"));
    }

    // absent rather than empty
    let body = json!({"messages": [], "apiKey": API_KEY, "modelName": MODEL});
    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    mock.verify().await;
}

#[tokio::test]
async fn null_configuration_is_missing_configuration() {
    let mock = UpstreamMock::start().await;
    mock.expect_no_calls().await;

    for field in ["baseUrl", "apiKey", "modelName"] {
        let mut body = chat_body(&mock, true);
        body[field] = Value::Null;
        let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
        let (status, _, bytes) = read_response(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "field {field}");

        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "MissingConfiguration", "field {field}");
    }

    mock.verify().await;
}

#[tokio::test]
async fn invalid_body_is_rejected() {
    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = relay_router().oneshot(req).await.unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["kind"], "InvalidRequest");
}

// -- Buffered responses --

#[tokio::test]
async fn buffered_response_is_byte_for_byte() {
    let mock = UpstreamMock::start().await;
    let upstream_body =
        "{\"id\":\"chatcmpl-1\",  \"choices\":[{\"message\":{\"role\":\"assistant\",\"content\":\"Ownership means one owner.\"}}],\"z\":1.50}\n";
    mock.mock_chat_completion_raw(upstream_body).await;

    let resp = relay_router()
        .oneshot(json_request("/chat", &chat_body(&mock, false)))
        .await
        .unwrap();
    let (status, headers, bytes) = read_response(resp).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(bytes.as_ref(), upstream_body.as_bytes());
}

#[tokio::test]
async fn upstream_body_is_forwarded_with_model_and_stream_flag() {
    let mock = UpstreamMock::start().await;
    mock.mock_chat_completion("ok").await;

    let mut body = chat_body(&mock, false);
    body["systemPrompt"] = json!("You are a Socratic tutor.");
    body["messages"] = json!([
        {"role": "user", "content": "first"},
        {"role": "assistant", "content": "second"},
        {"role": "user", "content": "third"}
    ]);

    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let received = mock.received_bodies().await;
    assert_eq!(received.len(), 1);
    let sent = &received[0];
    assert_eq!(sent["model"], MODEL);
    assert_eq!(sent["stream"], false);
    assert_eq!(
        sent["messages"],
        json!([
            {"role": "system", "content": "You are a Socratic tutor."},
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "second"},
            {"role": "user", "content": "third"}
        ])
    );
}

#[tokio::test]
async fn trailing_slash_is_stripped_from_base_url() {
    let mock = UpstreamMock::start().await;
    mock.mock_chat_completion("ok").await;

    let mut body = chat_body(&mock, false);
    body["baseUrl"] = json!(format!("{}/", mock.base_url()));

    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    mock.verify().await;
}

#[tokio::test]
async fn invalid_upstream_json_is_an_error() {
    let mock = UpstreamMock::start().await;
    mock.mock_chat_completion_raw("<html>gateway</html>").await;

    let resp = relay_router()
        .oneshot(json_request("/chat", &chat_body(&mock, false)))
        .await
        .unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["kind"], "UpstreamError");
}

// -- Streaming responses --

#[tokio::test]
async fn stream_is_passed_through_unmodified() {
    let mock = UpstreamMock::start().await;
    let upstream_body = sse_body(&["Own", "ership"]);
    mock.mock_sse_body(&upstream_body).await;

    let resp = relay_router()
        .oneshot(json_request("/chat", &chat_body(&mock, true)))
        .await
        .unwrap();
    let (status, headers, bytes) = read_response(resp).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(bytes.as_ref(), upstream_body.as_bytes());

    let received = mock.received_bodies().await;
    assert_eq!(received[0]["stream"], true);
}

#[tokio::test]
async fn stream_defaults_to_true() {
    let mock = UpstreamMock::start().await;
    mock.mock_chat_streaming(&["hi"]).await;

    let mut body = chat_body(&mock, true);
    body.as_object_mut().unwrap().remove("stream");

    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    let (status, headers, _) = read_response(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
}

#[tokio::test]
async fn first_frame_is_forwarded_before_upstream_finishes() {
    use http_body_util::BodyExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Chunked upstream that sends one frame, then stalls before ending the body
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n";
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut request).await.unwrap();

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        let chunk = format!("{:x}\r\n{}\r\n", frame.len(), frame);
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });

    let body = json!({
        "messages": [{"role": "user", "content": "hi"}],
        "baseUrl": format!("http://{addr}"),
        "apiKey": API_KEY,
        "modelName": MODEL,
        "stream": true
    });
    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut body = resp.into_body();
    let early = tokio::time::timeout(std::time::Duration::from_secs(1), async {
        let mut received = Vec::new();
        while received.len() < frame.len() {
            let next = body.frame().await.unwrap().unwrap();
            if let Ok(data) = next.into_data() {
                received.extend_from_slice(&data);
            }
        }
        received
    })
    .await
    .expect("relay held the stream back until the upstream finished");
    assert_eq!(early, frame.as_bytes());
}

// -- Upstream errors --

#[tokio::test]
async fn upstream_status_and_body_are_propagated() {
    let mock = UpstreamMock::start().await;
    let upstream_error = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
    mock.mock_error(401, upstream_error).await;

    let resp = relay_router()
        .oneshot(json_request("/chat", &chat_body(&mock, true)))
        .await
        .unwrap();
    let (status, headers, bytes) = read_response(resp).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers["content-type"], "application/json");
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "LLM API error: 401");
    assert_eq!(json["kind"], "UpstreamError");
    assert_eq!(json["details"], upstream_error);

    // no retry
    mock.verify().await;
}

#[tokio::test]
async fn truncated_upstream_error_body_keeps_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Promises 100 bytes of error body, sends 9, then hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut request).await.unwrap();
        let response = "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"error\":";
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let body = json!({
        "messages": [{"role": "user", "content": "hi"}],
        "baseUrl": format!("http://{addr}"),
        "apiKey": API_KEY,
        "modelName": MODEL
    });
    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    let (status, _, bytes) = read_response(resp).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["kind"], "UpstreamError");
    assert_eq!(json["details"], "");
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let body = json!({
        "messages": [{"role": "user", "content": "hi"}],
        "baseUrl": format!("http://127.0.0.1:{port}"),
        "apiKey": API_KEY,
        "modelName": MODEL
    });
    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["kind"], "NetworkFailure");
}

// -- CORS --

#[tokio::test]
async fn preflight_is_answered_with_cors_headers() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type, authorization")
        .body(Body::empty())
        .unwrap();
    let resp = relay_router().oneshot(req).await.unwrap();
    let (status, headers, bytes) = read_response(resp).await;

    assert!(status.is_success());
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn plain_options_request_succeeds_on_any_path() {
    for uri in ["/chat", "/anything/else"] {
        let req = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = relay_router().oneshot(req).await.unwrap();
        let (status, _, bytes) = read_response(resp).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "uri {uri}");
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let body = json!({"messages": [], "baseUrl": "", "apiKey": "", "modelName": ""});
    let resp = relay_router().oneshot(json_request("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

// -- Connection test --

#[tokio::test]
async fn test_connection_success_reports_model() {
    let mock = UpstreamMock::start().await;
    mock.mock_chat_completion("Hi").await;

    let body = json!({"baseUrl": mock.base_url(), "apiKey": API_KEY, "modelName": MODEL});
    let resp = relay_router()
        .oneshot(json_request("/test-connection", &body))
        .await
        .unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["model"], MODEL);

    let received = mock.received_bodies().await;
    assert_eq!(received[0]["max_tokens"], 5);
    assert_eq!(received[0]["messages"], json!([{"role": "user", "content": "Hi"}]));
}

#[tokio::test]
async fn test_connection_failure_is_reported_in_body() {
    let mock = UpstreamMock::start().await;
    mock.mock_error(401, "bad key").await;

    let body = json!({"baseUrl": mock.base_url(), "apiKey": API_KEY, "modelName": MODEL});
    let resp = relay_router()
        .oneshot(json_request("/test-connection", &body))
        .await
        .unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "API key is invalid or expired");
    assert_eq!(json["details"], "bad key");
}

#[tokio::test]
async fn test_connection_requires_all_fields() {
    let body = json!({"baseUrl": "https://api.example.com/v1", "apiKey": ""});
    let resp = relay_router()
        .oneshot(json_request("/test-connection", &body))
        .await
        .unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Missing required fields");
}

// -- Health --

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = relay_router().oneshot(req).await.unwrap();
    let (status, _, bytes) = read_response(resp).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}
