//! Per-connection plumbing: one reader loop feeding the gateway, one
//! writer task draining the gateway's broadcasts into the socket.
//!
//! The reader forwards events in arrival order, which is exactly the
//! per-connection FIFO ordering the engine relies on. The writer ends when
//! the gateway drops this connection's outbound sender.

use std::sync::Arc;

use tokio::sync::mpsc;

use diffduel_protocol::{ClientEvent, Codec};
use diffduel_transport::WebSocketConnection;

use crate::gateway::GatewayCommand;
use crate::DiffduelError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    codec: Arc<C>,
    gateway: mpsc::Sender<GatewayCommand>,
) -> Result<(), DiffduelError> {
    let (conn_id, mut sink, mut stream) = conn.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();

    gateway
        .send(GatewayCommand::Connected { conn: conn_id, sender: out_tx })
        .await
        .map_err(|_| DiffduelError::GatewayClosed)?;

    let writer_codec = Arc::clone(&codec);
    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let bytes = match writer_codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sink.send(&bytes).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        match stream.recv().await {
            Ok(Some(data)) => match codec.decode::<ClientEvent>(&data) {
                Ok(event) => {
                    if gateway
                        .send(GatewayCommand::Event { conn: conn_id, event })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        %conn_id,
                        error = %e,
                        "ignoring undecodable event"
                    );
                }
            },
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "receive error");
                break;
            }
        }
    }

    // Disconnect routing (abort/leave/abandon) happens in the gateway.
    let _ = gateway
        .send(GatewayCommand::Disconnected { conn: conn_id })
        .await;
    let _ = writer.await;
    Ok(())
}
