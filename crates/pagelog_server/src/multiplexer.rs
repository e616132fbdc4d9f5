//! Routes frames from many connections to their sessions.

use crate::context::ServerContext;
use crate::session::Session;
use crate::transport::{Frame, SendStatus, Transport, TransportId};
use pagelog_protocol::{ClientMessage, ProtocolErrorKind, ServerMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Registry {
    sessions: HashMap<u64, Arc<Session>>,
    session_by_transport: HashMap<TransportId, u64>,
    /// Last session each open transport carried frames for, kept until close
    /// even after the session moves to another transport.
    last_session: HashMap<TransportId, u64>,
}

/// Session table shared by all connections.
pub struct Multiplexer {
    context: Arc<ServerContext>,
    registry: Mutex<Registry>,
}

impl Multiplexer {
    /// Creates an empty multiplexer.
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self {
            context,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Handles one incoming frame from `transport`.
    ///
    /// Returns the handle of the spawned request task, if one was started.
    pub fn on_message(
        &self,
        transport: &Arc<dyn Transport>,
        frame: Frame,
    ) -> Option<JoinHandle<()>> {
        let bytes = match frame {
            Frame::Binary(bytes) => bytes,
            Frame::Text(_) => {
                tracing::error!(transport = %transport.id(), "text frame rejected");
                reject(transport, ProtocolErrorKind::ExpectingBinaryMessage);
                return None;
            }
        };

        tracing::debug!(transport = %transport.id(), bytes = bytes.len(), "frame received");
        let message = match ClientMessage::decode(&bytes) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(transport = %transport.id(), error = %err, "cannot decode frame");
                reject(transport, ProtocolErrorKind::DecodeMessageError);
                return None;
            }
        };

        let session = self.bind(message.session_id(), transport);
        session.on_client_message(message)
    }

    /// Forgets `transport` and detaches the session bound to it.
    ///
    /// `unsent` holds frames the connection accepted but never wrote, oldest
    /// first. They go back to the session that last used the transport.
    pub fn on_close(&self, transport: TransportId, unsent: Vec<Vec<u8>>) {
        let owner = {
            let mut registry = self.registry.lock();
            if let Some(session_id) = registry.session_by_transport.remove(&transport) {
                if let Some(session) = registry.sessions.get(&session_id) {
                    session.detach(transport);
                }
            }
            registry
                .last_session
                .remove(&transport)
                .and_then(|id| registry.sessions.get(&id).cloned())
        };

        // Protocol errors answer a frame on this connection only.
        let unsent: Vec<Vec<u8>> = unsent
            .into_iter()
            .filter(|frame| {
                !matches!(
                    ServerMessage::decode(frame),
                    Ok(ServerMessage::ProtocolError { .. })
                )
            })
            .collect();

        match owner {
            Some(session) => session.requeue(unsent),
            None if !unsent.is_empty() => tracing::warn!(
                transport = %transport,
                dropped = unsent.len(),
                "unwritten frames without session"
            ),
            None => {}
        }
        tracing::debug!(transport = %transport, "transport closed");
    }

    /// Forwards a drain signal to the session bound to `transport`.
    pub fn on_drain(&self, transport: TransportId) {
        match self.bound_session(transport) {
            Some(session) => session.on_drain(),
            None => tracing::debug!(transport = %transport, "drain without session"),
        }
    }

    /// Number of known sessions, attached or not.
    pub fn session_count(&self) -> usize {
        self.registry.lock().sessions.len()
    }

    /// Looks up a session by id.
    pub fn session(&self, session_id: u64) -> Option<Arc<Session>> {
        self.registry.lock().sessions.get(&session_id).cloned()
    }

    /// The session currently bound to `transport`.
    pub fn bound_session(&self, transport: TransportId) -> Option<Arc<Session>> {
        let registry = self.registry.lock();
        registry
            .session_by_transport
            .get(&transport)
            .and_then(|id| registry.sessions.get(id))
            .cloned()
    }

    fn bind(&self, session_id: u64, transport: &Arc<dyn Transport>) -> Arc<Session> {
        let transport_id = transport.id();
        let mut registry = self.registry.lock();

        let session = Arc::clone(registry.sessions.entry(session_id).or_insert_with(|| {
            tracing::info!(session_id, transport = %transport_id, "session created");
            Arc::new(Session::new(session_id, Arc::clone(&self.context)))
        }));

        if session.bound_transport() != Some(transport_id) {
            let previous_owner = registry.session_by_transport.get(&transport_id).copied();
            if let Some(other) = previous_owner.filter(|id| *id != session_id) {
                if let Some(other) = registry.sessions.get(&other) {
                    other.detach(transport_id);
                }
            }
            if let Some(previous) = session.bound_transport() {
                registry.session_by_transport.remove(&previous);
            }
            registry.session_by_transport.insert(transport_id, session_id);
            registry.last_session.insert(transport_id, session_id);
            session.attach(Arc::clone(transport));
        }

        session
    }
}

fn reject(transport: &Arc<dyn Transport>, error: ProtocolErrorKind) {
    let frame = ServerMessage::ProtocolError { error }.encode();
    let status = transport.send(frame);
    if status != SendStatus::Sent {
        tracing::warn!(transport = %transport.id(), ?status, "protocol error not delivered");
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("sessions", &self.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::transport::{ChannelTransport, MemoryTransport};
    use pagelog_core::Stores;
    use pagelog_protocol::Request;

    fn multiplexer() -> Multiplexer {
        let context = ServerContext::new(ServerConfig::default(), Stores::in_memory());
        Multiplexer::new(Arc::new(context))
    }

    fn create_page(session_id: u64, request_id: u64) -> Frame {
        Frame::Binary(
            ClientMessage::Request {
                session_id,
                request_id,
                request: Request::CreatePage {
                    title: "t".into(),
                },
            }
            .encode(),
        )
    }

    fn memory() -> (Arc<MemoryTransport>, Arc<dyn Transport>) {
        let memory = Arc::new(MemoryTransport::new());
        let transport: Arc<dyn Transport> = memory.clone();
        (memory, transport)
    }

    #[tokio::test]
    async fn text_frame_is_rejected() {
        let mux = multiplexer();
        let (memory, transport) = memory();
        assert!(mux.on_message(&transport, Frame::Text("hi".into())).is_none());
        assert_eq!(
            memory.take_messages(),
            vec![ServerMessage::ProtocolError {
                error: ProtocolErrorKind::ExpectingBinaryMessage
            }]
        );
        assert_eq!(mux.session_count(), 0);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let mux = multiplexer();
        let (memory, transport) = memory();
        assert!(mux
            .on_message(&transport, Frame::Binary(vec![0xff, 0x01]))
            .is_none());
        assert_eq!(
            memory.take_messages(),
            vec![ServerMessage::ProtocolError {
                error: ProtocolErrorKind::DecodeMessageError
            }]
        );
        assert_eq!(mux.session_count(), 0);
    }

    #[tokio::test]
    async fn message_creates_and_binds_session() {
        let mux = multiplexer();
        let (_memory, transport) = memory();
        mux.on_message(&transport, create_page(7, 1))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(mux.session_count(), 1);
        let session = mux.bound_session(transport.id()).unwrap();
        assert_eq!(session.id(), 7);
        assert_eq!(session.bound_transport(), Some(transport.id()));
    }

    #[tokio::test]
    async fn close_detaches_but_keeps_session() {
        let mux = multiplexer();
        let (_memory, transport) = memory();
        mux.on_message(&transport, create_page(7, 1))
            .unwrap()
            .await
            .unwrap();

        mux.on_close(transport.id(), Vec::new());
        assert!(mux.bound_session(transport.id()).is_none());
        let session = mux.session(7).unwrap();
        assert_eq!(session.bound_transport(), None);
    }

    #[tokio::test]
    async fn transport_switching_sessions_detaches_previous() {
        let mux = multiplexer();
        let (_memory, transport) = memory();
        mux.on_message(&transport, create_page(1, 1))
            .unwrap()
            .await
            .unwrap();
        mux.on_message(&transport, create_page(2, 1))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(mux.session(1).unwrap().bound_transport(), None);
        assert_eq!(mux.bound_session(transport.id()).unwrap().id(), 2);
    }

    #[tokio::test]
    async fn session_moving_transports_updates_index() {
        let mux = multiplexer();
        let (_a, first) = memory();
        let (_b, second) = memory();
        mux.on_message(&first, create_page(1, 1))
            .unwrap()
            .await
            .unwrap();
        mux.on_message(&second, create_page(1, 2))
            .unwrap()
            .await
            .unwrap();

        assert!(mux.bound_session(first.id()).is_none());
        assert_eq!(mux.bound_session(second.id()).unwrap().id(), 1);

        // A late close of the old connection must not unbind the new one.
        mux.on_close(first.id(), Vec::new());
        assert_eq!(
            mux.session(1).unwrap().bound_transport(),
            Some(second.id())
        );
    }

    #[tokio::test]
    async fn unwritten_frames_return_to_session_on_close() {
        let mux = multiplexer();
        let (channel, mut outbound) = ChannelTransport::new(8);
        let channel: Arc<dyn Transport> = Arc::new(channel);
        mux.on_message(&channel, create_page(7, 1))
            .unwrap()
            .await
            .unwrap();

        let unsent = outbound.close_and_drain();
        assert_eq!(unsent.len(), 2);
        mux.on_close(channel.id(), unsent);
        assert_eq!(mux.session(7).unwrap().pending_len(), 2);

        let (memory, transport) = memory();
        assert!(mux.on_message(&transport, create_page(7, 1)).is_none());
        let messages = memory.take_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ServerMessage::Acknowledge { message_id: 1, session_id: 7 }));
        assert!(matches!(messages[1], ServerMessage::ResultSuccess { request_id: 1, .. }));
    }

    #[tokio::test]
    async fn late_close_requeues_to_moved_session() {
        let mux = multiplexer();
        let (channel, mut outbound) = ChannelTransport::new(8);
        let channel: Arc<dyn Transport> = Arc::new(channel);
        mux.on_message(&channel, create_page(3, 1))
            .unwrap()
            .await
            .unwrap();
        assert!(mux.on_message(&channel, Frame::Text("x".into())).is_none());

        let (memory, transport) = memory();
        mux.on_message(&transport, create_page(3, 2))
            .unwrap()
            .await
            .unwrap();
        memory.take_frames();

        let unsent = outbound.close_and_drain();
        assert_eq!(unsent.len(), 3);
        mux.on_close(channel.id(), unsent);

        let messages = memory.take_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ServerMessage::Acknowledge { message_id: 1, .. }));
        assert!(matches!(messages[1], ServerMessage::ResultSuccess { request_id: 1, .. }));
        assert_eq!(mux.session(3).unwrap().bound_transport(), Some(transport.id()));
    }

    #[tokio::test]
    async fn drain_without_session_is_ignored() {
        let mux = multiplexer();
        let (_memory, transport) = memory();
        mux.on_drain(transport.id());
        assert_eq!(mux.session_count(), 0);
    }
}
