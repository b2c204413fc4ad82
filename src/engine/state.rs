//! Engine and query lifecycle states.
//!
//! Both machines have an absorbing `Closed` state. Legal transitions are
//! listed once, in `allows`, and checked on every state change.

use std::fmt;

/// Connection state of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Idle; the next `create_query` is granted immediately.
    Accepting,
    /// A query is live and the process is not working on a request.
    QueryActive,
    /// A request was sent; waiting for the process to answer.
    Waiting,
    /// The process is gone or was stopped.
    Closed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Accepting => "accepting",
            EngineState::QueryActive => "query",
            EngineState::Waiting => "waiting",
            EngineState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, EngineState::Closed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn allows(&self, next: EngineState) -> bool {
        use EngineState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Accepting, QueryActive) => true,
            (QueryActive, Waiting) | (QueryActive, Accepting) => true,
            (Waiting, QueryActive) | (Waiting, Accepting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a [`Query`](crate::Query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    /// Not sent to the process yet.
    Fresh,
    /// A request for this query is in flight.
    Waiting,
    /// A solution was delivered; the process holds a choice point.
    Open,
    /// Exhausted, failed with an error, or closed.
    Closed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Fresh => "fresh",
            QueryState::Waiting => "waiting",
            QueryState::Open => "open",
            QueryState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, QueryState::Closed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn allows(&self, next: QueryState) -> bool {
        use QueryState::*;
        matches!(
            (self, next),
            (Fresh, Waiting)
                | (Fresh, Closed)
                | (Waiting, Open)
                | (Waiting, Closed)
                | (Open, Waiting)
                | (Open, Closed)
        )
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
