//! WebSocket listener.

use crate::context::ServerContext;
use crate::error::ServerResult;
use crate::multiplexer::Multiplexer;
use crate::transport::{ChannelTransport, Frame, Transport};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Semaphore};
use tokio_tungstenite::tungstenite::Message;

/// How long the writer may spend on the closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a closing connection waits for its writer to hand back frames.
const WRITER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The pagelog server.
///
/// Each accepted TCP connection is upgraded to a WebSocket and becomes one
/// transport of the shared [`Multiplexer`].
///
/// # Example
///
/// ```rust,ignore
/// use pagelog_core::Stores;
/// use pagelog_server::{PagelogServer, ServerConfig, ServerContext};
///
/// let context = ServerContext::new(ServerConfig::default(), Stores::in_memory());
/// PagelogServer::new(context).run().await?;
/// ```
pub struct PagelogServer {
    context: Arc<ServerContext>,
    multiplexer: Arc<Multiplexer>,
}

impl PagelogServer {
    /// Creates a server over `context`.
    pub fn new(context: ServerContext) -> Self {
        let context = Arc::new(context);
        let multiplexer = Arc::new(Multiplexer::new(Arc::clone(&context)));
        Self {
            context,
            multiplexer,
        }
    }

    /// The session table.
    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.multiplexer
    }

    /// Binds the configured address and serves until an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn run(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.context.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let config = &self.context.config;
        tracing::info!(addr = %listener.local_addr()?, "pagelog server listening");
        let slots = Arc::new(Semaphore::new(config.max_connections));

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
                tracing::warn!(%peer, limit = config.max_connections, "connection limit reached");
                continue;
            };

            let multiplexer = Arc::clone(&self.multiplexer);
            let buffer = config.outbound_buffer;
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, peer, multiplexer, buffer).await {
                    tracing::warn!(%peer, error = %err, "connection error");
                }
                drop(permit);
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    multiplexer: Arc<Multiplexer>,
    buffer: usize,
) -> ServerResult<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (transport, mut outbound) = ChannelTransport::new(buffer);
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let transport_id = transport.id();
    tracing::info!(%peer, transport = %transport_id, "connection opened");

    let writer_mux = Arc::clone(&multiplexer);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut writer = tokio::spawn(async move {
        let mut unsent = Vec::new();
        loop {
            let frame = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                frame = outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            let bytes = frame.len();
            if let Err(err) = ws_sender.send(Message::binary(frame.clone())).await {
                tracing::debug!(transport = %transport_id, error = %err, "write failed");
                unsent.push(frame);
                break;
            }
            tracing::debug!(transport = %transport_id, bytes, "frame written");
            if outbound.take_congestion() {
                writer_mux.on_drain(transport_id);
            }
        }
        unsent.extend(outbound.close_and_drain());
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws_sender.close()).await;
        unsent
    });

    let mut result: ServerResult<()> = Ok(());
    while let Some(message) = ws_receiver.next().await {
        let frame = match message {
            Ok(Message::Binary(data)) => Frame::Binary(data.to_vec()),
            Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                result = Err(err.into());
                break;
            }
        };
        let _ = multiplexer.on_message(&transport, frame);
    }

    let _ = stop_tx.send(());
    let unsent = match tokio::time::timeout(WRITER_STOP_TIMEOUT, &mut writer).await {
        Ok(Ok(unsent)) => unsent,
        Ok(Err(err)) => {
            tracing::warn!(transport = %transport_id, error = %err, "writer task failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(transport = %transport_id, "writer did not stop, abandoning its queue");
            writer.abort();
            Vec::new()
        }
    };
    if !unsent.is_empty() {
        tracing::info!(transport = %transport_id, frames = unsent.len(), "returning unwritten frames");
    }
    multiplexer.on_close(transport_id, unsent);
    tracing::info!(%peer, transport = %transport_id, "connection closed");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use pagelog_core::Stores;

    #[test]
    fn server_shares_context_with_multiplexer() {
        let context = ServerContext::new(ServerConfig::default(), Stores::in_memory());
        let server = PagelogServer::new(context);
        assert_eq!(server.multiplexer().session_count(), 0);
    }
}
