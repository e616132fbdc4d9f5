//! Logical client sessions.
//!
//! A session outlives its connections. It remembers which request ids it has
//! already seen, and keeps frames that could not be delivered until a
//! transport is bound again or the bound one drains.

use crate::context::ServerContext;
use crate::convert::{from_wire, line_type, object_id, values_from_wire, values_to_wire, wire_id};
use crate::error::{ServerError, ServerResult};
use crate::transport::{SendStatus, Transport, TransportId};
use pagelog_protocol::{ClientMessage, PageItem, PageLineItem, Request, Response, ServerMessage};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fixed-size FIFO of recently seen request ids.
#[derive(Debug)]
struct DedupWindow {
    order: VecDeque<u64>,
    seen: HashSet<u64>,
    capacity: usize,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records `id`. Returns false if it is already in the window.
    fn insert(&mut self, id: u64) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

struct SessionState {
    transport: Option<Arc<dyn Transport>>,
    processed: DedupWindow,
    pending: VecDeque<Vec<u8>>,
}

/// A logical client session.
pub struct Session {
    id: u64,
    context: Arc<ServerContext>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates a detached session.
    pub fn new(id: u64, context: Arc<ServerContext>) -> Self {
        let processed = DedupWindow::new(context.config.dedup_window);
        Self {
            id,
            context,
            state: Mutex::new(SessionState {
                transport: None,
                processed,
                pending: VecDeque::new(),
            }),
        }
    }

    /// Session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The bound transport, if any.
    pub fn bound_transport(&self) -> Option<TransportId> {
        self.state.lock().transport.as_ref().map(|t| t.id())
    }

    /// Frames waiting for delivery.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Binds `transport` unless it is already bound, then flushes pending
    /// frames through it. Returns true if the binding changed.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> bool {
        let mut state = self.state.lock();
        let new_id = transport.id();
        if state.transport.as_ref().map(|t| t.id()) == Some(new_id) {
            return false;
        }
        state.transport = Some(transport);
        tracing::info!(
            session_id = self.id,
            transport = %new_id,
            pending = state.pending.len(),
            "session attached"
        );
        self.flush(&mut state);
        true
    }

    /// Unbinds the transport only if it is `transport`. Processed ids and
    /// pending frames are kept.
    pub fn detach(&self, transport: TransportId) -> bool {
        let mut state = self.state.lock();
        if state.transport.as_ref().map(|t| t.id()) != Some(transport) {
            return false;
        }
        state.transport = None;
        tracing::info!(session_id = self.id, transport = %transport, "session detached");
        true
    }

    /// Puts frames a closed connection never wrote back at the head of the
    /// queue, ahead of anything queued since, then flushes.
    pub fn requeue(&self, frames: Vec<Vec<u8>>) {
        if frames.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        tracing::info!(
            session_id = self.id,
            requeued = frames.len(),
            pending = state.pending.len(),
            "requeueing unwritten frames"
        );
        for frame in frames.into_iter().rev() {
            state.pending.push_front(frame);
        }
        self.trim(&mut state);
        self.flush(&mut state);
    }

    /// Flushes pending frames after the bound transport caught up.
    pub fn on_drain(&self) {
        let mut state = self.state.lock();
        self.flush(&mut state);
    }

    /// Handles a decoded client message.
    ///
    /// A new request is acknowledged immediately and executed on a spawned
    /// task, whose handle is returned. Duplicates and client acknowledgments
    /// return `None`.
    pub fn on_client_message(self: &Arc<Self>, message: ClientMessage) -> Option<JoinHandle<()>> {
        match message {
            ClientMessage::Acknowledge { message_id, .. } => {
                tracing::debug!(session_id = self.id, message_id, "client acknowledged");
                None
            }
            ClientMessage::Request {
                request_id,
                request,
                ..
            } => {
                {
                    let mut state = self.state.lock();
                    if !state.processed.insert(request_id) {
                        tracing::debug!(
                            session_id = self.id,
                            request_id,
                            request = request.name(),
                            "duplicate request ignored"
                        );
                        return None;
                    }
                    let ack = ServerMessage::Acknowledge {
                        message_id: request_id,
                        session_id: self.id,
                    };
                    self.send_locked(&mut state, ack.encode());
                }

                let session = Arc::clone(self);
                Some(tokio::spawn(async move {
                    session.dispatch(request_id, request).await;
                }))
            }
        }
    }

    async fn dispatch(&self, request_id: u64, request: Request) {
        let name = request.name().to_string();
        let reply = match self.execute(request).await {
            Ok(result) => ServerMessage::ResultSuccess { request_id, result },
            Err(err) => {
                tracing::error!(
                    session_id = self.id,
                    request_id,
                    request = %name,
                    error = %err,
                    "request failed"
                );
                ServerMessage::ResultError {
                    request_id,
                    error: err.error_kind(),
                }
            }
        };
        self.send(reply.encode());
    }

    async fn execute(&self, request: Request) -> ServerResult<Response> {
        let pages = self.context.pages();
        let max_page_size = self.context.config.max_page_size;

        match request {
            Request::CreatePage { title } => Ok(Response::CreatePage {
                id: wire_id(pages.create_page(title).await?),
            }),
            Request::SaveValue { value } => Ok(Response::SaveValue {
                id: wire_id(self.context.values().save_value(from_wire(&value)).await?),
            }),
            Request::GetPages { offset, limit } => {
                let listing = pages.get_pages(offset, limit.min(max_page_size)).await?;
                Ok(Response::GetPages {
                    count: listing.count,
                    list: listing
                        .items
                        .into_iter()
                        .map(|page| PageItem {
                            id: wire_id(page.id),
                            title: page.title,
                        })
                        .collect(),
                })
            }
            Request::GetPageLines {
                page_id,
                offset,
                limit,
            } => {
                let listing = pages
                    .get_page_lines(object_id(page_id), offset, limit.min(max_page_size))
                    .await?;
                Ok(Response::GetPageLines {
                    count: listing.count,
                    list: listing
                        .items
                        .iter()
                        .map(|line| PageLineItem {
                            id: wire_id(line.id),
                            values: values_to_wire(&line.line),
                        })
                        .collect(),
                })
            }
            Request::AddPageLine {
                page_id,
                line_type: kind,
                line,
            } => {
                let id = pages
                    .add_page_line(object_id(page_id), line_type(kind), values_from_wire(&line))
                    .await?;
                Ok(Response::AddPageLine { id: wire_id(id) })
            }
            Request::Unsupported { name } => Err(ServerError::CallNotImplemented { name }),
        }
    }

    fn send(&self, frame: Vec<u8>) {
        let mut state = self.state.lock();
        self.send_locked(&mut state, frame);
    }

    fn send_locked(&self, state: &mut SessionState, frame: Vec<u8>) {
        if state.pending.is_empty() {
            if let Some(transport) = &state.transport {
                match transport.send(frame.clone()) {
                    SendStatus::Sent => {
                        tracing::debug!(session_id = self.id, bytes = frame.len(), "frame sent");
                        return;
                    }
                    status => tracing::warn!(
                        session_id = self.id,
                        transport = %transport.id(),
                        ?status,
                        "send refused, queueing frame"
                    ),
                }
            }
        }
        self.enqueue(state, frame);
    }

    fn enqueue(&self, state: &mut SessionState, frame: Vec<u8>) {
        state.pending.push_back(frame);
        self.trim(state);
    }

    fn trim(&self, state: &mut SessionState) {
        while state.pending.len() > self.context.config.max_pending_frames {
            let Some(dropped) = state.pending.pop_front() else {
                break;
            };
            tracing::warn!(
                session_id = self.id,
                bytes = dropped.len(),
                "pending queue full, dropped oldest frame"
            );
        }
    }

    fn flush(&self, state: &mut SessionState) {
        let Some(transport) = state.transport.clone() else {
            return;
        };
        while let Some(frame) = state.pending.front() {
            match transport.send(frame.clone()) {
                SendStatus::Sent => {
                    state.pending.pop_front();
                }
                status => {
                    tracing::warn!(
                        session_id = self.id,
                        transport = %transport.id(),
                        ?status,
                        remaining = state.pending.len(),
                        "flush interrupted"
                    );
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
