//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use radix_router::config::{RouteConfig, ServerConfig};
use radix_router::http::{HttpServer, Router};
use radix_router::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<ServerConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop within 5s")
            .expect("server task panicked");
        assert!(result.is_ok(), "server returned an error: {result:?}");
    }
}

/// Start a server with routes from `config`.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let server = HttpServer::new(config).expect("config builds a router");
    spawn(server).await
}

/// Start a server around a router built in code.
pub async fn start_with_router(router: Router) -> TestServer {
    spawn(HttpServer::with_router(ServerConfig::default(), router)).await
}

async fn spawn(server: HttpServer) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.clone();

    let handle = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    TestServer {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn route(method: &str, path: &str, body: Option<&str>) -> RouteConfig {
    RouteConfig {
        method: method.to_string(),
        path: path.to_string(),
        body: body.map(str::to_string),
        ..RouteConfig::default()
    }
}
