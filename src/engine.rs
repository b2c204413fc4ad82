//! Connection to one long-running Prolog process.
//!
//! An [`Engine`] owns the process and serializes access to it: one
//! [`Query`] is live at a time, and further requests queue in FIFO order
//! until the engine is free again.
//!
//! # Example
//!
//! ```no_run
//! use swipl_engine::{Engine, EngineConfig};
//!
//! # async fn run() -> Result<(), swipl_engine::EngineError> {
//! let engine = Engine::spawn(&EngineConfig::from_env())?;
//!
//! let query = engine.create_query("member(X, [1,2,3])")?.await?;
//! while let Some(bindings) = query.next()?.await? {
//!     println!("X = {}", bindings["X"]);
//! }
//!
//! engine.close();
//! # Ok(())
//! # }
//! ```

mod config;
mod machine;
mod process;
mod query;
mod state;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub use config::{EngineConfig, PROGRAM_ENV, SCRIPT_ENV};
pub use query::{PendingQuery, Query};
pub use state::{EngineState, QueryState};

use crate::error::{CloseReason, EngineError};
use crate::term::Bindings;
use self::machine::{Admission, Core, Handoff};

/// Capacity of the request channel to the writer task.
const CHANNEL_BOUND: usize = 64;

/// Handle to a Prolog process. Cheap to clone; clones share the process.
///
/// The process is killed when [`close`](Engine::close) is called or when the
/// last `Engine` and `Query` handle is dropped.
#[derive(Clone)]
pub struct Engine {
    core: Arc<Mutex<Core>>,
}

impl Engine {
    /// Launch the process described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Spawn` if the process cannot be started.
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = process::launch(config)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("Process stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("Process stdout not captured".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            process::forward_stderr(stderr);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let engine = Self::attach(stdout, stdin, Some(kill_tx));
        process::spawn_supervisor(child, kill_rx, Arc::downgrade(&engine.core));
        Ok(engine)
    }

    /// Speak the protocol over an arbitrary stream pair: `stdout` carries the
    /// process's responses and `stdin` receives requests.
    ///
    /// The engine closes when `stdout` reaches EOF. Must be called from within
    /// a tokio runtime.
    pub fn from_streams<R, W>(stdout: R, stdin: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::attach(stdout, stdin, None)
    }

    fn attach<R, W>(stdout: R, stdin: W, kill: Option<oneshot::Sender<()>>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_BOUND);
        let core = Arc::new(Mutex::new(Core::new(tx, kill)));
        process::spawn_writer(stdin, rx, Arc::downgrade(&core));
        process::spawn_reader(stdout, Arc::downgrade(&core));
        Self { core }
    }

    pub(crate) fn upgrade(core: &Weak<Mutex<Core>>) -> Option<Self> {
        core.upgrade().map(|core| Self { core })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give a dequeued request its `Query`. Runs with the lock released.
    pub(crate) fn deliver(&self, handoff: Option<Handoff>) {
        if let Some(Handoff { id, text, resolver }) = handoff {
            debug!("Dispatching queued query {}", id);
            resolver.resolve(Query::new(self.clone(), id, text));
        }
    }

    pub(crate) fn handle_line(&self, line: &str) {
        let handoff = self.lock().handle_line(line);
        self.deliver(handoff);
    }

    pub(crate) fn shutdown(&self, reason: CloseReason) {
        self.lock().force_close(reason);
    }

    pub(crate) fn record_exit(&self, code: Option<i32>) {
        self.lock().record_exit(code);
    }

    /// Submit a query.
    ///
    /// If the engine is idle the query is granted at once
    /// ([`PendingQuery::is_ready`]); otherwise it takes the next place in the
    /// queue and resolves once every earlier query has finished.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` if the engine is closed.
    pub fn create_query(&self, text: impl Into<String>) -> Result<PendingQuery, EngineError> {
        let text = text.into();
        let admission = self.lock().admit(text.clone())?;
        Ok(match admission {
            Admission::Granted(id) => PendingQuery::ready(Query::new(self.clone(), id, text)),
            Admission::Queued(deferred) => PendingQuery::queued(deferred),
        })
    }

    /// Run a query for its first solution only, then close it.
    ///
    /// The place in the queue is taken when `call` is invoked, not when the
    /// returned future is first polled.
    pub fn call(
        &self,
        text: impl Into<String>,
    ) -> impl Future<Output = Result<Option<Bindings>, EngineError>> + Send + 'static {
        let pending = self.create_query(text);
        async move {
            let query = pending?.await?;
            let answer = query.next()?.await?;
            query.close()?.await?;
            Ok(answer)
        }
    }

    /// Stop the process and fail every outstanding request.
    ///
    /// Closing a closed engine does nothing.
    pub fn close(&self) {
        self.shutdown(CloseReason::Requested);
    }

    pub fn state(&self) -> EngineState {
        self.lock().state()
    }

    /// Exit code of the process, once it has exited.
    ///
    /// `None` while running, for engines built with
    /// [`from_streams`](Engine::from_streams), and when the process was
    /// terminated by a signal.
    pub fn exit_status(&self) -> Option<i32> {
        self.lock().exit_status()
    }

    /// Why the engine closed, if it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.lock().close_reason()
    }

    /// Number of requests waiting for the engine.
    pub fn queued(&self) -> usize {
        self.lock().queued()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}
