//! Caller-facing query handles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::deferred::Deferred;
use crate::engine::state::QueryState;
use crate::engine::Engine;
use crate::error::{CloseReason, EngineError};
use crate::term::Bindings;

/// One query bound to an engine.
///
/// At most one `Query` per engine is live at a time; later requests wait in
/// the engine's queue until this one is closed or runs out of solutions.
///
/// Dropping a `Query` releases the engine: a fresh or open query is closed
/// right away, and one with an answer in flight is closed once the answer
/// arrives.
pub struct Query {
    engine: Engine,
    id: u64,
    text: String,
}

impl Query {
    pub(crate) fn new(engine: Engine, id: u64, text: String) -> Self {
        Self { engine, id, text }
    }

    /// The query text as submitted.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> QueryState {
        self.engine.lock().query_state(self.id)
    }

    /// Ask for the next solution.
    ///
    /// The first call submits the query; later calls ask the process to
    /// backtrack. The returned future resolves to `Some(bindings)` for a
    /// solution, `None` once there are no more, or an error raised by the
    /// query.
    ///
    /// # Errors
    ///
    /// Fails immediately with `EngineError::InvalidQueryState` if an answer
    /// is already pending or the query is closed, and with
    /// `EngineError::Closed` if the engine is closed.
    pub fn next(&self) -> Result<Deferred<Option<Bindings>>, EngineError> {
        self.engine.lock().next(self.id)
    }

    /// Close the query, releasing the engine for the next request.
    ///
    /// # Errors
    ///
    /// Fails with `EngineError::InvalidQueryState` while an answer is pending.
    pub fn close(&self) -> Result<Deferred<()>, EngineError> {
        let (done, handoff) = self.engine.lock().close_query(self.id)?;
        self.engine.deliver(handoff);
        Ok(done)
    }

    /// Collect every remaining solution. The query is closed afterwards.
    pub async fn solutions(&self) -> Result<Vec<Bindings>, EngineError> {
        let mut solutions = Vec::new();
        while let Some(bindings) = self.next()?.await? {
            solutions.push(bindings);
        }
        Ok(solutions)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("text", &self.text)
            .finish()
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        let handoff = self.engine.lock().abandon(self.id);
        self.engine.deliver(handoff);
    }
}

/// A query that is either ready or waiting its turn in the engine queue.
#[must_use = "dropping a PendingQuery gives up its place in the queue"]
#[derive(Debug)]
pub struct PendingQuery {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Ready(Option<Query>),
    Queued(Deferred<Query>),
}

impl PendingQuery {
    pub(crate) fn ready(query: Query) -> Self {
        Self {
            inner: Inner::Ready(Some(query)),
        }
    }

    pub(crate) fn queued(deferred: Deferred<Query>) -> Self {
        Self {
            inner: Inner::Queued(deferred),
        }
    }

    /// Whether the engine was idle and granted the query without queuing.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(_))
    }
}

impl Future for PendingQuery {
    type Output = Result<Query, EngineError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(query) => {
                Poll::Ready(query.take().ok_or(EngineError::Closed(CloseReason::Dropped)))
            }
            Inner::Queued(deferred) => Pin::new(deferred).poll(cx),
        }
    }
}
