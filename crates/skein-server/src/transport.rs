//! The reference transport: newline-delimited JSON over TCP.
//!
//! Spec §1 explicitly places "the transport layer that carries requests"
//! out of scope for the core — this module is a *default*, not a contract
//! `skein-core` depends on, shipped so the workspace is runnable end to end
//! and so `skein-test` can drive real scenarios over a real socket. One
//! task per connection; each line is one JSON-encoded [`Request`], each
//! reply is one JSON-encoded [`Reply`] on its own line, in the spirit of
//! `durable_runtime::worker`'s one-task-per-connection shape.

use std::sync::Arc;

use skein_protocol::{ErrorCode, Reply, Request};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::context::Context;
use crate::handler;

/// Serve requests on `listener` until the process is asked to shut down.
///
/// Spawns one task per accepted connection; each connection is served until
/// the peer closes it or a line fails to parse (at which point the
/// connection is dropped — malformed input is a transport-layer bug, not a
/// scheduler error, so there is no taxonomy code for it).
pub async fn serve(listener: TcpListener, context: Arc<Context>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let context = context.clone();
        tracing::debug!(%peer, "accepted connection");

        tokio::spawn(async move {
            if let Err(err) = serve_connection(socket, context).await {
                tracing::warn!(%peer, error = %err, "connection ended with an error");
            }
        });
    }
}

async fn serve_connection(socket: TcpStream, context: Arc<Context>) -> anyhow::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handler::handle(&context, request),
            Err(err) => {
                tracing::warn!(error = %err, "received malformed request");
                Reply::err(ErrorCode::Failure)
            }
        };

        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        write_half.write_all(encoded.as_bytes()).await?;
    }

    Ok(())
}
