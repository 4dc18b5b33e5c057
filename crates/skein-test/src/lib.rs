//! Test harness shared by the `tests/it` scenario and property suites.
//!
//! Mirrors `durable_test`'s shape: a `spawn_*` helper that stands up a real
//! server and hands back a guard plus a connected client, so scenario tests
//! read like a script of wire calls rather than plumbing.

use std::net::SocketAddr;
use std::sync::Arc;

use skein_core::Config;
use skein_server::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running `skein-server` bound to an ephemeral local port.
///
/// Dropping the guard aborts the server task; there is no graceful-shutdown
/// handshake to wait on since each test gets its own throwaway listener.
pub struct ServerGuard {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerGuard {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn connect(&self) -> anyhow::Result<skein_client::SkeinClient> {
        Ok(skein_client::SkeinClient::connect(self.addr).await?)
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a fresh server with the given `Config` on an ephemeral port.
pub async fn spawn_server(config: Config) -> anyhow::Result<ServerGuard> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let context = Arc::new(Context::new(config));

    let task = tokio::spawn(async move {
        if let Err(err) = skein_server::transport::serve(listener, context).await {
            tracing::warn!(error = %err, "test server exited with an error");
        }
    });

    Ok(ServerGuard { addr, task })
}

#[ctor::ctor]
fn setup_tracing() {
    use tracing_subscriber::prelude::*;

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init();
}
