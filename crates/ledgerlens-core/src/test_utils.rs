//! Test utilities for ledgerlens-core
//!
//! A mock Ollama server that answers `/api/embeddings` with deterministic
//! vectors, for development and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Dimensions of the vectors the mock returns
pub const MOCK_EMBEDDING_DIMS: usize = 8;

/// Mock Ollama server for testing and development.
///
/// Prompts containing `FAIL` get a 500 response.
pub struct MockOllamaServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/embeddings", post(handle_embeddings))
            .with_state(Arc::clone(&requests));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of embedding requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingRequest {
    #[allow(dead_code)]
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

async fn handle_embeddings(
    State(requests): State<Arc<AtomicUsize>>,
    Json(request): Json<EmbeddingRequest>,
) -> Result<Json<EmbeddingResponse>, StatusCode> {
    requests.fetch_add(1, Ordering::SeqCst);
    if request.prompt.contains("FAIL") {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(EmbeddingResponse {
        embedding: mock_embedding(&request.prompt),
    }))
}

/// Deterministic vector for a prompt: byte histogram folded into
/// [`MOCK_EMBEDDING_DIMS`] buckets, with the length in the first slot
pub fn mock_embedding(prompt: &str) -> Vec<f64> {
    let mut v = vec![0.0; MOCK_EMBEDDING_DIMS];
    v[0] = prompt.len() as f64;
    for byte in prompt.bytes() {
        v[1 + (byte as usize) % (MOCK_EMBEDDING_DIMS - 1)] += 1.0;
    }
    v
}
