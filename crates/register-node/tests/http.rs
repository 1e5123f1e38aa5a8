//! Wire-level coverage of a replica node's HTTP surface: exact JSON field
//! names, error status codes, and the 404/405 boundary behavior.

use register_node::{server, Node};
use serde_json::json;
use std::sync::Arc;

struct TestNode {
    node: Arc<Node>,
    base_url: String,
    client: reqwest::Client,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestNode {
    async fn start(index: usize, total_nodes: usize, num_replicas: usize) -> Self {
        let node = Arc::new(Node::new(index, total_nodes, num_replicas));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let router = server::router(node.clone());
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        TestNode {
            node,
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _shutdown_tx: shutdown_tx,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[tokio::test]
async fn test_write_confirm_read_round_trip() {
    let server = TestNode::start(0, 1, 1).await;

    let response = server
        .client
        .post(server.url("/write"))
        .json(&json!({"Address": "addr1", "Value": "val1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({"ShouldInclude": true}),
    );

    let response = server
        .client
        .put(server.url("/confirm"))
        .json(&json!({"Address": "addr1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .get(server.url("/read?address=addr1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({
            "ValueVersion": {"Value": "val1", "Version": 1},
            "ShouldInclude": true,
        }),
    );
}

#[tokio::test]
async fn test_read_of_missing_address_is_500_plaintext() {
    let server = TestNode::start(0, 1, 1).await;

    let response = server
        .client
        .get(server.url("/read?address=addr1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "address addr1 not found");
}

#[tokio::test]
async fn test_out_of_shard_read_discloses_exclusion() {
    // addr1's replica set under N=3, R=2 is nodes {1, 2}.
    let server = TestNode::start(0, 3, 2).await;

    let response = server
        .client
        .get(server.url("/read?address=addr1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({
            "ValueVersion": {"Value": "", "Version": 0},
            "ShouldInclude": false,
        }),
    );
}

#[tokio::test]
async fn test_forced_update_adopts_value_and_version() {
    let server = TestNode::start(0, 1, 1).await;

    let response = server
        .client
        .put(server.url("/update"))
        .json(&json!({"Address": "addr1", "Value": "val1", "Version": 9}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .get(server.url("/read?address=addr1"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({
            "ValueVersion": {"Value": "val1", "Version": 9},
            "ShouldInclude": true,
        }),
    );
}

#[tokio::test]
async fn test_refused_write_is_500() {
    let server = TestNode::start(0, 1, 1).await;
    server
        .node
        .flags
        .refuse_write
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let response = server
        .client
        .post(server.url("/write"))
        .json(&json!({"Address": "addr1", "Value": "val1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "write refused by test flag");
}

#[tokio::test]
async fn test_unknown_path_and_wrong_method() {
    let server = TestNode::start(0, 1, 1).await;

    let response = server
        .client
        .get(server.url("/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .client
        .get(server.url("/write"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}
