// These tests need a local Docker daemon. Run with `cargo test -- --ignored`.

use std::time::Duration;
use taskcore::{DispatchRequest, TaskRunner, TaskStatus};
use taskrunners::DockerRunner;

async fn wait_for_terminal(runner: &DockerRunner) -> TaskStatus {
    for _ in 0..60 {
        let status = runner.get_status("").await.unwrap().status;
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    TaskStatus::Accepted
}

#[tokio::test]
#[ignore]
async fn test_docker_container_succeeds() {
    let request = DispatchRequest::new("wf", "echo", "docker")
        .with_argument("image", "alpine:latest")
        .with_argument("command", "echo Hello from Docker");
    let runner = DockerRunner::from_request(&request).unwrap();

    assert_eq!(runner.execute().await.unwrap().status, TaskStatus::Accepted);
    assert!(runner.container_id().await.is_some());
    assert_eq!(wait_for_terminal(&runner).await, TaskStatus::Succeeded);
}

#[tokio::test]
#[ignore]
async fn test_docker_non_zero_exit_fails() {
    let request = DispatchRequest::new("wf", "fail", "docker")
        .with_argument("image", "alpine:latest")
        .with_argument("command", "false");
    let runner = DockerRunner::from_request(&request).unwrap();

    runner.execute().await.unwrap();
    assert_eq!(wait_for_terminal(&runner).await, TaskStatus::Failed);
}

#[tokio::test]
#[ignore]
async fn test_docker_unknown_container_fails() {
    let request = DispatchRequest::new("wf", "ghost", "docker").with_argument("image", "alpine:latest");
    let runner = DockerRunner::from_request(&request).unwrap();

    let status = runner.get_status("no-such-container-1f2e3d").await.unwrap();
    assert_eq!(status.status, TaskStatus::Failed);
}
