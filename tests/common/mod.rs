//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use admission_proxy::auth::UserStore;
use admission_proxy::{GatewayConfig, HttpServer, Shutdown};
use axum::{body::Body, http::Request, Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A mock upstream that echoes what it received and counts hits.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    #[allow(dead_code)]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub async fn start_mock_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let app = Router::new().fallback(move |req: Request<Body>| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(serde_json::json!({
            "method": req.method().as_str(),
            "path": req.uri().to_string(),
            "userid": header("userid"),
            "request_id": header("x-request-id"),
        }))
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, hits }
}

/// An upstream that waits `delay` before answering.
#[allow(dead_code)]
pub async fn start_slow_upstream(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "late"
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

/// A running proxy and the handles needed to stop it.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: GatewayConfig, store: Arc<dyn UserStore>) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, store);
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    RunningProxy {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
