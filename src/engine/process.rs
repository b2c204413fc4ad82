//! Background tasks that connect an engine to its process.
//!
//! Every task holds a `Weak` reference to the engine state. Once the last
//! `Engine` and `Query` handle is gone the tasks wind down, and the
//! supervisor kills the process.

use std::process::Stdio;
use std::sync::{Mutex, Weak};

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::config::EngineConfig;
use crate::engine::machine::Core;
use crate::engine::Engine;
use crate::error::{CloseReason, EngineError};
use crate::protocol::{is_io_error, read_line, write_line};

/// Start the Prolog process with piped standard streams.
pub(crate) fn launch(config: &EngineConfig) -> Result<Child, EngineError> {
    let args = config.args();
    info!("Starting Prolog process: {} {:?}", config.program, args);

    let stderr = if config.forward_stderr {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    Command::new(&config.program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::Spawn(format!("{}: {}", config.program, e)))
}

/// Read process output line by line and route each line to the engine.
pub(crate) fn spawn_reader<R>(stdout: R, core: Weak<Mutex<Core>>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        loop {
            let result = read_line(&mut reader).await;
            let Some(engine) = Engine::upgrade(&core) else {
                debug!("Engine dropped, reader exiting");
                return;
            };

            match result {
                Ok(Some(line)) => {
                    debug!("Received from process: {}", line);
                    engine.handle_line(&line);
                }
                Ok(None) => {
                    debug!("Process output closed");
                    engine.shutdown(CloseReason::OutputClosed);
                    return;
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    let reason = if is_io_error(&e) {
                        CloseReason::Io(message)
                    } else {
                        CloseReason::Protocol(message)
                    };
                    engine.shutdown(reason);
                    return;
                }
            }
        }
    });
}

/// Write queued request lines to the process, in order.
///
/// Ends when the engine drops its sender, which closes the process's stdin.
pub(crate) fn spawn_writer<W>(stdin: W, mut outbox: mpsc::Receiver<String>, core: Weak<Mutex<Core>>)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut writer = stdin;
        while let Some(line) = outbox.recv().await {
            if let Err(e) = write_line(&mut writer, &line).await {
                warn!("Failed to write to process: {:#}", e);
                if let Some(engine) = Engine::upgrade(&core) {
                    engine.shutdown(CloseReason::Io(format!("{:#}", e)));
                }
                return;
            }
        }
        debug!("Process input closed");
    });
}

/// Copy the process's stderr to ours, verbatim.
pub(crate) fn forward_stderr(mut stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut out = tokio::io::stderr();
        if let Err(e) = tokio::io::copy(&mut stderr, &mut out).await {
            debug!("Stopped forwarding process stderr: {}", e);
        }
    });
}

/// Wait for the process to exit, or kill it when asked (or when the engine
/// is dropped), then record the exit status.
pub(crate) fn spawn_supervisor(
    mut child: Child,
    kill: oneshot::Receiver<()>,
    core: Weak<Mutex<Core>>,
) {
    tokio::spawn(async move {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill => None,
        };

        let status = match exited {
            Some(status) => status,
            None => {
                debug!("Stopping Prolog process");
                if let Err(e) = child.start_kill() {
                    debug!("Kill failed (process already gone?): {}", e);
                }
                child.wait().await
            }
        };

        let code = match status {
            Ok(status) => {
                info!("Prolog process exited: {}", status);
                status.code()
            }
            Err(e) => {
                warn!("Failed to wait for Prolog process: {}", e);
                None
            }
        };

        if let Some(engine) = Engine::upgrade(&core) {
            engine.record_exit(code);
        }
    });
}
