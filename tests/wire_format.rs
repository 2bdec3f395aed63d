//! Wire-format tests: a one-shot HTTP/1.1 mock stands in for the model API
//! (or for a relay), and each test asserts both the request that went out and
//! how the reply was interpreted. No API key or network access is needed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use solvr::client::RelayClient;
use solvr::config::Config;
use solvr::events::Subject;
use solvr::llm::LlmClient;
use solvr::prompts::system_instruction;
use solvr::relay::{IMAGE_ONLY_FILLER, Relay, SolveRequest, Solver};
use solvr::server::{ServerState, router};
use solvr::RelayError;

#[derive(Debug)]
struct CapturedRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Value,
}

/// Accept exactly one request on a random loopback port, capture it and
/// answer with `status` and a JSON `resp_body`.
async fn mock_server_once(
    status: u16,
    resp_body: impl Into<String> + Send + 'static,
) -> (u16, tokio::sync::oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = tokio::sync::oneshot::channel::<CapturedRequest>();

    tokio::spawn(async move {
        let resp_body: String = resp_body.into();
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.unwrap();
        let mut parts = request_line.trim().splitn(3, ' ');
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("").to_string();

        let mut headers = HashMap::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((k, v)) = trimmed.split_once(": ") {
                let key = k.to_lowercase();
                if key == "content-length" {
                    content_length = v.parse().unwrap_or(0);
                }
                headers.insert(key, v.to_string());
            }
        }

        let mut body_bytes = vec![0u8; content_length];
        reader.read_exact(&mut body_bytes).await.unwrap();
        let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        let _ = tx.send(CapturedRequest {
            method,
            path,
            headers,
            body,
        });

        let http_resp = format!(
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            resp_body.len(),
            resp_body,
        );
        let _ = write_half.write_all(http_resp.as_bytes()).await;
    });

    (port, rx)
}

fn completion(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
}

fn relay_for(port: u16) -> Relay {
    let config = Config {
        openai_api_key: Some("sk-test".into()),
        base_url: format!("http://127.0.0.1:{port}/v1"),
        ..Config::default()
    };
    Relay::new(Arc::new(LlmClient::new(&config).unwrap()), config.temperature)
}

#[tokio::test]
async fn relay_sends_chat_completion_with_subject_instruction() {
    let (port, req_rx) = mock_server_once(200, completion("H₂O")).await;
    let relay = relay_for(port);

    let answer = relay
        .solve(SolveRequest::new(Subject::Chem, "물의 분자식은?", None))
        .await
        .unwrap();
    assert_eq!(answer, "H₂O");

    let req = req_rx.await.unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/v1/chat/completions");
    assert_eq!(req.headers["authorization"], "Bearer sk-test");

    assert_eq!(req.body["model"], "gpt-4o");
    assert!((req.body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

    let messages = req.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], system_instruction(Some(Subject::Chem)));
    assert_eq!(messages[1], json!({ "role": "user", "content": "물의 분자식은?" }));
}

#[tokio::test]
async fn image_question_is_sent_as_content_parts() {
    let (port, req_rx) = mock_server_once(200, completion("그래프는 증가함수")).await;
    let relay = relay_for(port);
    let data_url = "data:image/png;base64,iVBORw0KGgo=";

    relay
        .solve(SolveRequest::new(Subject::Math, "", Some(data_url.to_string())))
        .await
        .unwrap();

    let req = req_rx.await.unwrap();
    assert_eq!(
        req.body["messages"][1]["content"],
        json!([
            { "type": "text", "text": IMAGE_ONLY_FILLER },
            { "type": "image_url", "image_url": { "url": data_url } }
        ])
    );
}

#[tokio::test]
async fn unknown_subject_gets_base_instruction_only() {
    let (port, req_rx) = mock_server_once(200, completion("ok")).await;
    let relay = relay_for(port);

    let request = SolveRequest {
        subject: "physics".to_string(),
        question: Some("F=ma?".to_string()),
        image: None,
    };
    relay.solve(request).await.unwrap();

    let req = req_rx.await.unwrap();
    assert_eq!(req.body["messages"][0]["content"], system_instruction(None));
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let (port, _req_rx) = mock_server_once(401, r#"{"error":{"message":"bad key"}}"#).await;
    let relay = relay_for(port);

    let err = relay
        .solve(SolveRequest::new(Subject::Bio, "q", None))
        .await
        .unwrap_err();
    match err {
        RelayError::Api { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("bad key"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn null_content_is_an_empty_answer() {
    let body = json!({ "choices": [{ "message": { "role": "assistant", "content": null } }] });
    let (port, _req_rx) = mock_server_once(200, body.to_string()).await;

    let answer = relay_for(port)
        .solve(SolveRequest::new(Subject::Math, "q", None))
        .await
        .unwrap();
    assert_eq!(answer, "");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = relay_for(port)
        .solve(SolveRequest::new(Subject::Math, "q", None))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));
}

#[tokio::test]
async fn relay_client_posts_solve_request() {
    let (port, req_rx) = mock_server_once(200, r#"{"answer":"풀이"}"#).await;
    let client = RelayClient::new(&format!("http://127.0.0.1:{port}/"), 5).unwrap();
    assert_eq!(client.endpoint(), format!("http://127.0.0.1:{port}/api/solve"));

    let answer = client
        .solve(SolveRequest::new(Subject::Bio, "세포막?", None))
        .await
        .unwrap();
    assert_eq!(answer, "풀이");

    let req = req_rx.await.unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/solve");
    assert_eq!(req.body["subject"], "bio");
    assert_eq!(req.body["question"], "세포막?");
}

#[tokio::test]
async fn relay_client_surfaces_server_error_message() {
    let (port, _req_rx) = mock_server_once(502, r#"{"error":"upstream down"}"#).await;
    let client = RelayClient::new(&format!("http://127.0.0.1:{port}"), 5).unwrap();

    let err = client
        .solve(SolveRequest::new(Subject::Math, "q", None))
        .await
        .unwrap_err();
    match err {
        RelayError::Api { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_to_server_to_model_end_to_end() {
    let (upstream_port, upstream_rx) = mock_server_once(200, completion(r"답: \(x = 2\)")).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = listener.local_addr().unwrap().port();
    let state = ServerState::new(Arc::new(relay_for(upstream_port)));
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    let client = RelayClient::new(&format!("http://127.0.0.1:{relay_port}"), 5).unwrap();
    let answer = client
        .solve(SolveRequest::new(Subject::Math, "2x = 4", None))
        .await
        .unwrap();
    assert_eq!(answer, r"답: \(x = 2\)");

    let upstream = upstream_rx.await.unwrap();
    assert_eq!(upstream.body["messages"][0]["content"], system_instruction(Some(Subject::Math)));
    assert_eq!(upstream.body["messages"][1]["content"], "2x = 4");
}
