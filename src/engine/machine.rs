//! Engine and query state machines, and the request queue.
//!
//! `Core` is the single piece of mutable state behind an engine. Every
//! method runs synchronously under the engine lock and never awaits. Methods
//! that can move the engine back to `Accepting` return a [`Handoff`]: the
//! next queued request, already made active, whose waiter must be given its
//! `Query` once the lock is released.

use std::collections::VecDeque;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::deferred::{deferred, Deferred, Resolver};
use crate::engine::query::Query;
use crate::engine::state::{EngineState, QueryState};
use crate::error::{CloseReason, EngineError};
use crate::protocol::{Request, Response};
use crate::term::Bindings;

/// Answer pending for the active query.
enum Pending {
    /// `next()`: a solution, or `None` once exhausted.
    Solution(Resolver<Option<Bindings>>),
    /// `close()` on an open query: the process acknowledgment.
    Close(Resolver<()>),
}

/// The one query currently bound to the process.
struct ActiveQuery {
    id: u64,
    text: String,
    state: QueryState,
    pending: Option<Pending>,
    /// The caller dropped its handle while an answer was in flight.
    detached: bool,
}

impl ActiveQuery {
    fn set_state(&mut self, next: QueryState) {
        debug_assert!(
            self.state.allows(next),
            "illegal query transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        debug!("Query {} state set to {}", self.id, next);
    }
}

/// A `create_query` parked while the engine was busy.
struct QueuedRequest {
    text: String,
    resolver: Resolver<Query>,
}

/// A dequeued request that now owns the engine.
pub(crate) struct Handoff {
    pub(crate) id: u64,
    pub(crate) text: String,
    pub(crate) resolver: Resolver<Query>,
}

/// Result of asking for a new query.
pub(crate) enum Admission {
    /// The engine was idle; the query with this id is now active.
    Granted(u64),
    /// The engine was busy; resolves once the request reaches the head of the queue.
    Queued(Deferred<Query>),
}

pub(crate) struct Core {
    state: EngineState,
    active: Option<ActiveQuery>,
    queue: VecDeque<QueuedRequest>,
    exit_status: Option<i32>,
    close_reason: Option<CloseReason>,
    next_id: u64,
    /// Lines for the writer task. Dropped on close so the process sees EOF.
    outbox: Option<mpsc::Sender<String>>,
    /// Tells the process supervisor to kill the process.
    kill: Option<oneshot::Sender<()>>,
}

impl Core {
    pub(crate) fn new(outbox: mpsc::Sender<String>, kill: Option<oneshot::Sender<()>>) -> Self {
        Self {
            state: EngineState::Accepting,
            active: None,
            queue: VecDeque::new(),
            exit_status: None,
            close_reason: None,
            next_id: 1,
            outbox: Some(outbox),
            kill,
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        self.state
    }

    pub(crate) fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.clone()
    }

    /// Queued requests whose callers are still waiting.
    pub(crate) fn queued(&self) -> usize {
        self.queue
            .iter()
            .filter(|request| !request.resolver.is_abandoned())
            .count()
    }

    fn set_state(&mut self, next: EngineState) {
        debug_assert!(
            self.state.allows(next),
            "illegal engine transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        debug!("Engine state set to {}", next);
    }

    fn closed_error(&self) -> EngineError {
        EngineError::Closed(self.close_reason.clone().unwrap_or(CloseReason::Requested))
    }

    fn active_mut(&mut self, id: u64) -> Option<&mut ActiveQuery> {
        self.active.as_mut().filter(|active| active.id == id)
    }

    /// State of query `id`. Anything no longer bound to the engine is closed.
    pub(crate) fn query_state(&self, id: u64) -> QueryState {
        if self.state.is_closed() {
            return QueryState::Closed;
        }
        self.active
            .as_ref()
            .filter(|active| active.id == id)
            .map(|active| active.state)
            .unwrap_or(QueryState::Closed)
    }

    // -------------------------------------------------------------------------
    // Queuing
    // -------------------------------------------------------------------------

    /// Bind a new query to the engine, or park the request behind the current one.
    pub(crate) fn admit(&mut self, text: String) -> Result<Admission, EngineError> {
        match self.state {
            EngineState::Closed => Err(self.closed_error()),
            EngineState::Accepting => Ok(Admission::Granted(self.activate(text))),
            EngineState::QueryActive | EngineState::Waiting => {
                self.queue.retain(|request| !request.resolver.is_abandoned());
                let (resolver, deferred) = deferred();
                self.queue.push_back(QueuedRequest { text, resolver });
                debug!("Engine busy, queued query ({} waiting)", self.queue.len());
                Ok(Admission::Queued(deferred))
            }
        }
    }

    fn activate(&mut self, text: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        debug!("Query {} created: {}", id, text);
        self.active = Some(ActiveQuery {
            id,
            text,
            state: QueryState::Fresh,
            pending: None,
            detached: false,
        });
        self.set_state(EngineState::QueryActive);
        id
    }

    /// Move to `Accepting` and immediately hand the engine to the oldest
    /// live queued request, if any.
    fn enter_accepting(&mut self) -> Option<Handoff> {
        self.set_state(EngineState::Accepting);
        while let Some(request) = self.queue.pop_front() {
            if request.resolver.is_abandoned() {
                debug!("Skipping queued query whose caller went away");
                continue;
            }
            let id = self.activate(request.text.clone());
            return Some(Handoff {
                id,
                text: request.text,
                resolver: request.resolver,
            });
        }
        None
    }

    /// Unbind the active query from the engine.
    fn finish_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.set_state(QueryState::Closed);
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    fn send(&mut self, request: &Request) -> Result<(), EngineError> {
        if self.state != EngineState::QueryActive {
            return Err(EngineError::InvalidEngineState(self.state));
        }
        let line = request.encode()?;
        let outbox = self.outbox.as_ref().ok_or_else(|| self.closed_error())?;
        debug!("Sending to process: {}", line);
        outbox.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                EngineError::Io("Process input backlog is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                EngineError::Io("Process input is closed".to_string())
            }
        })?;
        self.set_state(EngineState::Waiting);
        Ok(())
    }

    /// Ask for the first or next solution of query `id`.
    pub(crate) fn next(&mut self, id: u64) -> Result<Deferred<Option<Bindings>>, EngineError> {
        if self.state.is_closed() {
            return Err(self.closed_error());
        }
        let request = match self.active_mut(id) {
            Some(active) if active.state == QueryState::Fresh => Request::query(active.text.clone()),
            Some(active) if active.state == QueryState::Open => Request::next(),
            Some(active) => return Err(EngineError::InvalidQueryState(active.state)),
            None => return Err(EngineError::InvalidQueryState(QueryState::Closed)),
        };
        self.send(&request)?;

        let (resolver, deferred) = deferred();
        if let Some(active) = self.active_mut(id) {
            active.pending = Some(Pending::Solution(resolver));
            active.set_state(QueryState::Waiting);
        }
        Ok(deferred)
    }

    /// Close query `id`.
    ///
    /// A fresh query closes locally; an open one asks the process to drop its
    /// choice point and resolves on acknowledgment. Closing a closed query is
    /// a no-op.
    pub(crate) fn close_query(
        &mut self,
        id: u64,
    ) -> Result<(Deferred<()>, Option<Handoff>), EngineError> {
        match self.query_state(id) {
            QueryState::Closed => Ok((Deferred::resolved(()), None)),
            QueryState::Fresh => {
                self.finish_active();
                let handoff = self.enter_accepting();
                Ok((Deferred::resolved(()), handoff))
            }
            QueryState::Open => {
                self.send(&Request::close())?;
                let (resolver, deferred) = deferred();
                if let Some(active) = self.active_mut(id) {
                    active.pending = Some(Pending::Close(resolver));
                    active.set_state(QueryState::Waiting);
                }
                Ok((deferred, None))
            }
            QueryState::Waiting => Err(EngineError::InvalidQueryState(QueryState::Waiting)),
        }
    }

    /// The handle for query `id` was dropped. Release the engine as soon as
    /// the protocol allows.
    pub(crate) fn abandon(&mut self, id: u64) -> Option<Handoff> {
        match self.query_state(id) {
            QueryState::Closed => None,
            QueryState::Fresh => {
                self.finish_active();
                self.enter_accepting()
            }
            QueryState::Open => {
                debug!("Closing abandoned query {}", id);
                if let Err(e) = self.send(&Request::close()) {
                    warn!("Failed to close abandoned query {}: {}", id, e);
                    return None;
                }
                let (resolver, _) = deferred();
                if let Some(active) = self.active_mut(id) {
                    active.pending = Some(Pending::Close(resolver));
                    active.set_state(QueryState::Waiting);
                }
                None
            }
            QueryState::Waiting => {
                if let Some(active) = self.active_mut(id) {
                    active.detached = true;
                }
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Responses
    // -------------------------------------------------------------------------

    /// Route one line of process output.
    pub(crate) fn handle_line(&mut self, line: &str) -> Option<Handoff> {
        if self.state.is_closed() {
            debug!("Discarding output from closed engine: {}", line);
            return None;
        }
        match Response::decode(line) {
            Ok(response) => self.handle_response(response),
            Err(EngineError::Protocol(message)) => self.protocol_violation(message),
            Err(other) => self.protocol_violation(other.to_string()),
        }
    }

    fn handle_response(&mut self, response: Response) -> Option<Handoff> {
        if self.state != EngineState::Waiting {
            let message = format!("Unexpected response while engine is {}", self.state);
            return self.protocol_violation(message);
        }
        let routed = match self.active.as_mut() {
            Some(active) if active.state == QueryState::Waiting => active
                .pending
                .take()
                .map(|pending| (active.id, active.detached, pending))
                .ok_or_else(|| "Response without a pending request".to_string()),
            Some(active) => Err(format!("Response while query is {}", active.state)),
            None => Err("Response without an active query".to_string()),
        };
        let (id, detached, pending) = match routed {
            Ok(routed) => routed,
            Err(message) => return self.protocol_violation(message),
        };

        match (response, pending) {
            (Response::Success(bindings), Pending::Solution(resolver)) => {
                if let Some(active) = self.active.as_mut() {
                    active.set_state(QueryState::Open);
                }
                self.set_state(EngineState::QueryActive);
                resolver.resolve(Some(bindings));
                if detached {
                    return self.abandon(id);
                }
                None
            }
            (Response::Fail, Pending::Solution(resolver)) => {
                resolver.resolve(None);
                self.finish_active();
                self.enter_accepting()
            }
            (Response::Error(message), Pending::Solution(resolver)) => {
                debug!("Query {} raised: {}", id, message);
                resolver.reject(EngineError::Query(message));
                self.finish_active();
                self.enter_accepting()
            }
            (Response::Error(message), Pending::Close(resolver)) => {
                resolver.reject(EngineError::Query(message));
                self.finish_active();
                self.enter_accepting()
            }
            (_, Pending::Close(resolver)) => {
                resolver.resolve(());
                self.finish_active();
                self.enter_accepting()
            }
        }
    }

    fn protocol_violation(&mut self, message: String) -> Option<Handoff> {
        error!("Protocol violation: {}", message);
        self.force_close(CloseReason::Protocol(message));
        None
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    /// Enter `Closed` from any state, failing every outstanding future.
    ///
    /// The active query's waiter gets `EngineError::Protocol` when the
    /// process broke the protocol and `EngineError::Closed` otherwise; queued
    /// waiters always get `EngineError::Closed` carrying the reason.
    pub(crate) fn force_close(&mut self, reason: CloseReason) {
        if self.state.is_closed() {
            return;
        }
        match &reason {
            CloseReason::Requested => info!("Closing engine"),
            other => warn!("Engine closing: {}", other),
        }

        if let Some(mut active) = self.active.take() {
            if let Some(pending) = active.pending.take() {
                let err = match &reason {
                    CloseReason::Protocol(message) => EngineError::Protocol(message.clone()),
                    other => EngineError::Closed(other.clone()),
                };
                match pending {
                    Pending::Solution(resolver) => resolver.reject(err),
                    Pending::Close(resolver) => resolver.reject(err),
                }
            }
            active.set_state(QueryState::Closed);
        }

        for request in self.queue.drain(..) {
            request.resolver.reject(EngineError::Closed(reason.clone()));
        }

        self.outbox = None;
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        self.close_reason = Some(reason);
        self.set_state(EngineState::Closed);
    }

    /// The process exited.
    pub(crate) fn record_exit(&mut self, code: Option<i32>) {
        if self.exit_status.is_none() {
            self.exit_status = code;
        }
        self.force_close(CloseReason::Exited(code));
    }
}
