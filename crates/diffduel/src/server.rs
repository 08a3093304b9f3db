//! Server builder and accept loop.
//!
//! This is the entry point for running a Diffduel server. It wires the
//! layers together: transport → per-connection handlers → gateway actor,
//! plus the global ticker that drives game clocks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use diffduel_engine::{GameProvider, HistoryStore};
use diffduel_protocol::JsonCodec;
use diffduel_tick::{TickConfig, TickerHandle};
use diffduel_transport::WebSocketTransport;

use crate::gateway::{Gateway, GatewayCommand};
use crate::handler::handle_connection;
use crate::DiffduelError;

/// Command-channel depth. Ticks are dropped (not queued) when this fills,
/// so the backlog bound also bounds timer burstiness.
const COMMAND_CHANNEL_SIZE: usize = 256;

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(provider, store)
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    tick_period: Duration,
}

impl ServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_period: Duration::from_secs(1),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Overrides the one-second timer tick (tests mostly).
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Binds the transport, spawns the gateway actor and the ticker, and
    /// returns the runnable server.
    pub async fn build<P: GameProvider, H: HistoryStore>(
        self,
        provider: P,
        store: H,
    ) -> Result<Server, DiffduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let gateway =
            Gateway::new(Arc::new(provider), Arc::new(store), tx.clone(), rx);
        let gateway_task = tokio::spawn(gateway.run());
        let ticker = diffduel_tick::spawn(
            TickConfig::with_period(self.tick_period),
            tx.clone(),
            GatewayCommand::Tick,
        );

        Ok(Server { transport, gateway_tx: tx, ticker, gateway_task })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Diffduel server.
pub struct Server {
    transport: WebSocketTransport,
    gateway_tx: mpsc::Sender<GatewayCommand>,
    ticker: TickerHandle,
    gateway_task: tokio::task::JoinHandle<()>,
}

impl Server {
    /// The local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop: each connection gets its own handler task.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), DiffduelError> {
        tracing::info!("Diffduel server running");
        let codec = Arc::new(JsonCodec);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let tx = self.gateway_tx.clone();
                    let codec = Arc::clone(&codec);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, codec, tx).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Cancels the ticker and the gateway. Useful in tests and demos; a
    /// production server just runs until killed.
    pub async fn shutdown(self) {
        let _ = self.ticker.stop().await;
        drop(self.gateway_tx);
        self.gateway_task.abort();
    }
}
