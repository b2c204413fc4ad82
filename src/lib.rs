//! swipl-engine Library
//!
//! Drives a long-running SWI-Prolog process over a line-delimited JSON
//! protocol on its standard streams:
//!
//! - `engine` - Engine and query state machines, request queue, process supervision
//! - `protocol` - Line framing and the request/response messages
//! - `term` - Term model, serializer, and wire-term decoding
//! - `deferred` - Single-resolution futures used to deliver answers
//! - `error` - Error types
//!
//! # Usage
//!
//! ```ignore
//! use swipl_engine::{Engine, EngineConfig, Term};
//!
//! let engine = Engine::spawn(&EngineConfig::from_env())?;
//! let goal = Term::compound("member", vec![Term::variable("X")?, Term::list(vec![1.into(), 2.into()])]);
//! let first = engine.call(goal.to_string()).await?;
//! ```

pub mod deferred;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod term;

pub use deferred::Deferred;
pub use engine::{Engine, EngineConfig, EngineState, PendingQuery, Query, QueryState};
pub use error::{CloseReason, EngineError, TermError};
pub use term::{Bindings, DictTag, Term, Variable};
