// Drain loop scenarios against a wiremock collector.

use scanbridge_network::{CircuitState, DeliverySender, SenderConfig, SenderHandle};
use scanbridge_storage::{QueueConfig, QueueStore};
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> SenderConfig {
    SenderConfig::default()
        .with_backoff_base(Duration::from_millis(10))
        .with_idle_interval(Duration::from_millis(20))
        .with_request_timeout(Duration::from_secs(2))
        .with_cooldown(Duration::from_millis(800))
}

async fn open_queue() -> (TempDir, QueueStore) {
    let dir = tempfile::tempdir().unwrap();
    let queue = QueueStore::open(QueueConfig::new(dir.path().join("queue.json")))
        .await
        .unwrap();
    (dir, queue)
}

fn start(queue: &QueueStore, config: SenderConfig) -> SenderHandle {
    DeliverySender::new(queue.clone(), config).unwrap().start()
}

async fn wait_until(mut condition: impl AsyncFnMut() -> bool) {
    for _ in 0..250 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 5s");
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_delivers_in_insertion_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scans"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (_dir, queue) = open_queue().await;
    let url = format!("{}/scans", server.uri());
    for n in 0..3 {
        queue.enqueue(&url, &json!({"n": n})).await.unwrap();
    }

    let sender = start(&queue, fast_config());
    wait_until(async || queue.is_empty().await.unwrap()).await;

    assert_eq!(
        request_bodies(&server).await,
        vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 2})]
    );
    let stats = sender.stats();
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.failed_attempts, 0);
    sender.shutdown().await;
}

#[tokio::test]
async fn test_entries_enqueued_while_idle_are_picked_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let (_dir, queue) = open_queue().await;
    let sender = start(&queue, fast_config());

    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.enqueue(&server.uri(), &json!({"late": true})).await.unwrap();

    wait_until(async || queue.is_empty().await.unwrap()).await;
    assert_eq!(request_bodies(&server).await, vec![json!({"late": true})]);
    sender.shutdown().await;
}

#[tokio::test]
async fn test_retry_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (_dir, queue) = open_queue().await;
    queue.enqueue(&server.uri(), &json!({"valid": true})).await.unwrap();

    let sender = start(&queue, fast_config());
    wait_until(async || queue.is_empty().await.unwrap()).await;

    assert_eq!(request_bodies(&server).await.len(), 2);
    let stats = sender.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.failed_attempts, 1);
    assert_eq!(stats.circuit, CircuitState::Closed);
    sender.shutdown().await;
}

#[tokio::test]
async fn test_three_failures_open_circuit_until_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (_dir, queue) = open_queue().await;
    let entry = queue
        .enqueue(&server.uri(), &json!({"simbology": "UPC-A", "valid": true}))
        .await
        .unwrap();

    let sender = start(&queue, fast_config());
    wait_until(async || sender.stats().failed_attempts == 3).await;

    let stats = sender.stats();
    assert_eq!(stats.circuit, CircuitState::Open);
    assert_eq!(stats.delivered, 0);

    // Circuit is open: nothing is attempted and the entry stays queued
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(request_bodies(&server).await.len(), 3);
    assert_eq!(queue.entries().await.unwrap(), vec![entry]);

    // After the cool-down one fresh cycle delivers it
    wait_until(async || queue.is_empty().await.unwrap()).await;
    assert_eq!(request_bodies(&server).await.len(), 4);
    let stats = sender.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.circuit, CircuitState::Closed);
    sender.shutdown().await;
}

#[tokio::test]
async fn test_failing_head_blocks_later_entries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (_dir, queue) = open_queue().await;
    queue
        .enqueue(&format!("{}/broken", server.uri()), &json!(1))
        .await
        .unwrap();
    queue
        .enqueue(&format!("{}/ok", server.uri()), &json!(2))
        .await
        .unwrap();

    let sender = start(&queue, fast_config().with_cooldown(Duration::from_secs(30)));
    wait_until(async || sender.stats().circuit == CircuitState::Open).await;

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() == "/broken"));
    assert_eq!(queue.len().await.unwrap(), 2);

    // Shutdown does not wait out the cool-down
    tokio::time::timeout(Duration::from_secs(2), sender.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_undelivered_entries_survive_sender_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = QueueConfig::new(dir.path().join("queue.json"));
    let queue = QueueStore::open(config.clone()).await.unwrap();
    queue.enqueue(&server.uri(), &json!({"n": 1})).await.unwrap();

    let first = start(&queue, fast_config().with_cooldown(Duration::from_secs(30)));
    wait_until(async || first.stats().circuit == CircuitState::Open).await;
    first.shutdown().await;
    drop(queue);

    // Fresh process: circuit state is gone, the queue is not
    let reopened = QueueStore::open(config).await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);

    let second = start(&reopened, fast_config());
    wait_until(async || reopened.is_empty().await.unwrap()).await;
    assert_eq!(second.stats().delivered, 1);
    second.shutdown().await;
}

#[tokio::test]
async fn test_sender_survives_unreadable_queue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    let document = spool.join("queue.json");
    let queue = QueueStore::open(QueueConfig::new(&document)).await.unwrap();
    queue.enqueue(&server.uri(), &json!({"n": 1})).await.unwrap();

    // A directory where the document should be: removal cannot be persisted
    // and every reload fails until it is gone
    std::fs::remove_dir_all(&spool).unwrap();
    std::fs::create_dir_all(&document).unwrap();

    let sender = start(&queue, fast_config());
    wait_until(async || request_bodies(&server).await.len() == 1).await;
    wait_until(async || queue.peek_front().await.is_err()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::remove_dir(&document).unwrap();
    queue.enqueue(&server.uri(), &json!({"n": 2})).await.unwrap();

    wait_until(async || queue.is_empty().await.unwrap()).await;
    assert_eq!(
        request_bodies(&server).await,
        vec![json!({"n": 1}), json!({"n": 2})]
    );
    assert_eq!(sender.stats().delivered, 2);
    sender.shutdown().await;
}
