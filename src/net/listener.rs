// TCP listener and server
// Manages incoming client connections

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::connection::Connection;
use super::json_client::JsonClient;

/// TCP server that accepts and manages client connections
pub struct TcpServer {
    addr: SocketAddr,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl TcpServer {
    /// Start a server that feeds every accepted connection into a
    /// JsonClient bound to the coordinator.
    pub async fn start(
        addr: SocketAddr,
        coordinator: Arc<crate::coordinator::Coordinator>,
        motd: String,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                let coordinator = Arc::clone(&coordinator);
                                let motd = motd.clone();
                                tokio::spawn(async move {
                                    let connection = Connection::new(stream, peer_addr);
                                    let mut client = JsonClient::new(connection, motd, coordinator);
                                    if let Err(e) = client.run().await {
                                        error!("Client error from {}: {}", peer_addr, e);
                                    }
                                });
                            }
                            Err(e) => error!("Accept error: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("TCP server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TcpServer {
            addr: local_addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Get the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        // Trigger shutdown on drop
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}
