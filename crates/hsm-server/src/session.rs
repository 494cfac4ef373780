//! Per-connection session task.
//!
//! One session task per accepted connection reads frames off the socket
//! sequentially — a client's frames are never reordered relative to each
//! other on the wire. Each frame is then handed to the shared worker pool
//! (spec.md §5 "Concurrency model"): a `tokio::spawn`ed task bounded by a
//! semaphore sized to the host's available parallelism, so one slow
//! handler cannot stall frames queued behind it from other connections.
//!
//! The response write path is wrapped in its own [`tokio::sync::Mutex`]
//! (the "send-mutex") so two workers racing to answer frames from the same
//! connection can never interleave their bytes on the wire — the original
//! implementation this simulator is modeled on lacked this lock (spec.md
//! §9 REDESIGN FLAGS).

use std::sync::Arc;

use hsm_core::Hsm;
use hsm_proto::{read_frame, split_frame, ProtocolError};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};

pub(crate) async fn handle_connection(
    socket: TcpStream,
    peer: std::net::SocketAddr,
    hsm: Arc<Hsm>,
    permits: Arc<Semaphore>,
) {
    let (mut read_half, write_half) = socket.into_split();
    let write_half = Arc::new(Mutex::new(write_half));

    loop {
        let frame = match read_frame(&mut read_half).await {
            Ok(frame) => frame,
            Err(ProtocolError::PeerClosed) => {
                tracing::debug!(%peer, "connection closed");
                return;
            }
            Err(err) => {
                tracing::warn!(%peer, error = %err, "framing error, closing connection");
                return;
            }
        };

        let split = match split_frame(&frame) {
            Ok(split) => split,
            Err(err) => {
                tracing::warn!(%peer, error = %err, "framing error, closing connection");
                return;
            }
        };

        let hsm = Arc::clone(&hsm);
        let write_half = Arc::clone(&write_half);
        let permits = Arc::clone(&permits);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire().await else {
                return;
            };
            serve_frame(&hsm, &write_half, split, peer).await;
        });
    }
}

async fn serve_frame(
    hsm: &Hsm,
    write_half: &Arc<Mutex<OwnedWriteHalf>>,
    split: hsm_proto::SplitFrame,
    peer: std::net::SocketAddr,
) {
    match hsm.handle(split.header, split.command_code, split.body) {
        Ok(response) => {
            let mut conn = write_half.lock().await;
            if let Err(err) = response.write(&mut *conn).await {
                tracing::warn!(%peer, error = %err, "write failed");
            }
        }
        Err(err) => {
            tracing::warn!(%peer, error = %err, "dropping frame: no response sent");
        }
    }
}
