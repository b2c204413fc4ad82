//! Line protocol spoken with the Prolog process.
//!
//! The process reads one JSON request per line on stdin and answers with one
//! JSON response per line on stdout. At most one request is outstanding at a
//! time; the engine state machines enforce that, this module only frames and
//! encodes.
//!
//! # Messages
//!
//! ```text
//! host → process   {"query": "<text>"}
//!                  {"action": "next"}
//!                  {"action": "close"}
//!
//! process → host   {"status": "success", "bindings": {"X": <term>, ...}}
//!                  {"status": "fail"}
//!                  {"status": "error", "error": "<message>"}
//! ```

mod framing;
mod message;

pub use framing::{is_io_error, read_line, write_line, MAX_LINE_SIZE};
pub use message::{Action, Request, Response};
