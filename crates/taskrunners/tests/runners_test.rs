use std::sync::{Arc, Mutex};
use taskcore::{DispatchRequest, FailureReason, TaskStatus};
use taskruntime::{RegistryError, RunnerRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn registry() -> RunnerRegistry {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut registry = RunnerRegistry::new();
    taskrunners::register_all(&mut registry);
    registry
}

#[test]
fn test_register_all() {
    let registry = registry();
    assert_eq!(registry.list_runner_types(), vec!["docker", "http", "noop"]);

    let docker = registry.get_metadata("docker").unwrap();
    assert_eq!(docker.category, "docker");
    assert!(docker.arguments.iter().any(|a| a.name == "image" && a.required));
}

#[tokio::test]
async fn test_noop_runner_succeeds_immediately() {
    let runner = registry()
        .create_runner(&DispatchRequest::new("wf", "task", "noop"))
        .unwrap();

    assert_eq!(runner.execute().await.unwrap().status, TaskStatus::Succeeded);
    assert_eq!(runner.get_status("anything").await.unwrap().status, TaskStatus::Succeeded);
}

#[test]
fn test_missing_arguments_fail_creation() {
    let registry = registry();

    let result = registry.create_runner(&DispatchRequest::new("wf", "task", "docker"));
    assert!(matches!(result, Err(RegistryError::CreationFailed { runner_type, .. }) if runner_type == "docker"));

    let request = DispatchRequest::new("wf", "task", "http").with_argument("url", 8080i64);
    assert!(matches!(
        registry.create_runner(&request),
        Err(RegistryError::CreationFailed { .. })
    ));
}

type Requests = Arc<Mutex<Vec<(String, String)>>>;

/// Minimal HTTP/1.1 responder: records request line and body, answers by path.
async fn serve(listener: TcpListener, requests: Requests) {
    loop {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let (head, body) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break (String::new(), String::new());
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let length: usize = head
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                let body = text[split + 4..].to_string();
                if body.len() >= length {
                    break (head, body);
                }
            }
        };

        let request_line = head.lines().next().unwrap_or_default().to_string();
        requests.lock().unwrap().push((request_line.clone(), body));

        let (code, payload) = if request_line.starts_with("POST /tasks") {
            ("202 Accepted", String::new())
        } else if request_line.starts_with("GET /status/done") {
            ("200 OK", r#"{"status":"Succeeded"}"#.to_string())
        } else if request_line.starts_with("GET /status/broken") {
            (
                "200 OK",
                r#"{"status":"Failed","failure_reason":"ExternalServiceError","errors":"disk full"}"#.to_string(),
            )
        } else {
            ("404 Not Found", String::new())
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            code,
            payload.len(),
            payload
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    }
}

#[tokio::test]
async fn test_http_runner_dispatch_and_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests: Requests = Arc::default();
    tokio::spawn(serve(listener, requests.clone()));

    let request = DispatchRequest::new("wf-7", "register", "http")
        .with_argument("url", format!("{}/tasks", base))
        .with_argument("status_url", format!("{}/status/", base));
    let runner = registry().create_runner(&request).unwrap();

    assert_eq!(runner.execute().await.unwrap().status, TaskStatus::Accepted);
    {
        let seen = requests.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let posted: DispatchRequest = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(posted, request);
    }

    assert_eq!(runner.get_status("done").await.unwrap().status, TaskStatus::Succeeded);

    let failed = runner.get_status("broken").await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.failure_reason, FailureReason::ExternalServiceError);
    assert_eq!(failed.errors.as_deref(), Some("disk full"));

    assert!(runner.get_status("unknown").await.is_err());
}

#[tokio::test]
async fn test_http_runner_rejected_dispatch_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, Arc::default()));

    let request = DispatchRequest::new("wf-7", "register", "http").with_argument("url", format!("{}/missing", base));
    let runner = registry().create_runner(&request).unwrap();

    assert!(runner.execute().await.is_err());
}
