//! Batches against a live in-process service, with one prompt routed to
//! an unreachable address.

use std::time::{Duration, Instant};

use axum::response::Json;
use axum::routing::post;
use axum::Router;
use batch::{BatchRunner, BatchSummary, ImageGenerator};
use mcp::{Client, ToolResponse};
use serde_json::{Value, json};

async fn image_service() -> Client {
    let router = Router::new().route(
        "/mcp/messages",
        post(|Json(body): Json<Value>| async move {
            let prompt = body["params"]["arguments"]["prompt"].as_str().unwrap_or("");
            Json(json!({
                "content": [{
                    "type": "text",
                    "text": format!("Image ID: img-{prompt}. Image URL: http://host/img-{prompt}.png")
                }]
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Client::new(format!("http://{addr}")).unwrap()
}

async fn unreachable() -> Client {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Client::new(format!("http://{addr}")).unwrap()
}

/// Sends `broken` to a dead address and everything else to the service.
struct Routed {
    live: Client,
    dead: Client,
    broken: &'static str,
}

impl ImageGenerator for Routed {
    async fn generate_image(&self, prompt: &str) -> mcp::Result<ToolResponse> {
        if prompt == self.broken {
            self.dead.generate_image(prompt).await
        } else {
            self.live.generate_image(prompt).await
        }
    }
}

#[tokio::test]
async fn transport_failure_mid_batch() {
    let generator = Routed {
        live: image_service().await,
        dead: unreachable().await,
        broken: "p2",
    };
    let delay = Duration::from_millis(50);
    let runner = BatchRunner::new(generator).with_delay(delay);

    let start = Instant::now();
    let items = runner.run(["p1", "p2", "p3"]).await;
    assert!(start.elapsed() >= delay * 2);

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].image_id.as_deref(), Some("img-p1"));
    assert!(items[0].raw_result().is_some());

    assert!(items[1].error().is_some_and(mcp::Error::is_transport));
    assert!(items[1].raw_result().is_none());

    assert_eq!(items[2].image_url.as_deref(), Some("http://host/img-p3.png"));
    assert!(items[2].raw_result().is_some());

    assert_eq!(
        BatchSummary::from_items(&items),
        BatchSummary {
            total: 3,
            succeeded: 2,
            failed: 1
        }
    );
}

#[tokio::test]
async fn client_is_a_generator() {
    let runner = BatchRunner::new(image_service().await).with_delay(Duration::ZERO);
    let items = runner.run(vec!["x".to_string(), String::new()]).await;

    assert_eq!(items[0].image_id.as_deref(), Some("img-x"));
    assert!(matches!(items[1].error(), Some(mcp::Error::EmptyPrompt)));
}
