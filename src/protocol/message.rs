//! Typed request and response messages.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::term::{Bindings, Term};

/// What to do with the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Next,
    Close,
}

/// Host to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Request {
    /// `{"query": "<text>"}`
    Query { query: String },
    /// `{"action": "next"}` or `{"action": "close"}`
    Action { action: Action },
}

impl Request {
    pub fn query(text: impl Into<String>) -> Self {
        Request::Query { query: text.into() }
    }

    pub fn next() -> Self {
        Request::Action {
            action: Action::Next,
        }
    }

    pub fn close() -> Self {
        Request::Action {
            action: Action::Close,
        }
    }

    /// Encode as a single JSON line (without the trailing newline).
    pub fn encode(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Protocol(format!("Failed to serialize request: {}", e)))
    }
}

/// Process to host.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// One solution, with its variable bindings.
    Success(Bindings),
    /// No (more) solutions.
    Fail,
    /// The query raised an error.
    Error(String),
}

fn parse_error(detail: impl std::fmt::Display) -> EngineError {
    EngineError::Protocol(format!("Failed to parse response: {}", detail))
}

impl Response {
    /// Decode one line of process output.
    ///
    /// Numbers keep their exact text, so integers beyond 64 bits survive.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Protocol` if the line is not a JSON object, has a
    /// missing or unknown `status`, or carries a binding with no term
    /// representation.
    pub fn decode(line: &str) -> Result<Self, EngineError> {
        let mut object = match serde_json::from_str::<Value>(line).map_err(parse_error)? {
            Value::Object(object) => object,
            other => return Err(parse_error(format!("expected an object, got {}", other))),
        };

        let status = match object.remove("status") {
            Some(Value::String(status)) => status,
            Some(other) => return Err(parse_error(format!("invalid status {}", other))),
            None => return Err(parse_error("missing field `status`")),
        };

        match status.as_str() {
            "success" => {
                let bindings = match object.remove("bindings") {
                    Some(Value::Object(bindings)) => bindings,
                    None | Some(Value::Null) => Map::new(),
                    Some(other) => {
                        return Err(parse_error(format!("bindings must be an object, got {}", other)))
                    }
                };
                let bindings = bindings
                    .into_iter()
                    .map(|(name, value)| {
                        Term::try_from(value)
                            .map(|term| (name.clone(), term))
                            .map_err(|e| {
                                EngineError::Protocol(format!("Binding {}: {}", name, e))
                            })
                    })
                    .collect::<Result<Bindings, _>>()?;
                Ok(Response::Success(bindings))
            }
            "fail" => Ok(Response::Fail),
            "error" => Ok(Response::Error(match object.remove("error") {
                Some(Value::String(message)) => message,
                None | Some(Value::Null) => "Unknown error".to_string(),
                Some(other) => other.to_string(),
            })),
            other => Err(parse_error(format!("unknown status {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_encoding() {
        assert_eq!(
            Request::query("member(X, [1,2])").encode().unwrap(),
            r#"{"query":"member(X, [1,2])"}"#
        );
        assert_eq!(Request::next().encode().unwrap(), r#"{"action":"next"}"#);
        assert_eq!(Request::close().encode().unwrap(), r#"{"action":"close"}"#);
    }

    #[test]
    fn test_request_escapes_query_text() {
        let line = Request::query("writeln('a\nb')").encode().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(line, r#"{"query":"writeln('a\nb')"}"#);
    }

    #[test]
    fn test_decode_success() {
        let resp = Response::decode(r#"{"status":"success","bindings":{"X":1,"Y":"a"}}"#).unwrap();
        let mut expected = Bindings::new();
        expected.insert("X".to_string(), Term::from(1));
        expected.insert("Y".to_string(), Term::atom("a"));
        assert_eq!(resp, Response::Success(expected));
    }

    #[test]
    fn test_decode_success_without_bindings() {
        let resp = Response::decode(r#"{"status":"success"}"#).unwrap();
        assert_eq!(resp, Response::Success(Bindings::new()));
    }

    #[test]
    fn test_decode_fail_and_error() {
        assert_eq!(Response::decode(r#"{"status":"fail"}"#).unwrap(), Response::Fail);
        assert_eq!(
            Response::decode(r#"{"status":"error","error":"Unknown procedure: foo/0"}"#).unwrap(),
            Response::Error("Unknown procedure: foo/0".to_string())
        );
        assert_eq!(
            Response::decode(r#"{"status":"error","error":{"code":1}}"#).unwrap(),
            Response::Error(r#"{"code":1}"#.to_string())
        );
    }

    #[test]
    fn test_decode_keeps_big_integers_exact() {
        let resp = Response::decode(
            r#"{"status":"success","bindings":{"X":1267650600228229401496703205376,"Y":-3}}"#,
        )
        .unwrap();
        let Response::Success(bindings) = resp else {
            panic!("Expected success, got {:?}", resp);
        };
        assert_eq!(bindings["X"].to_string(), "1267650600228229401496703205376");
        assert_eq!(bindings["X"].as_i64(), None);
        assert_eq!(bindings["Y"].as_i64(), Some(-3));
    }

    #[test]
    fn test_decode_rejects_malformed_lines() {
        for line in [
            "Warning: something odd",
            r#"{"status":"maybe"}"#,
            r#"{"bindings":{}}"#,
            r#"[1,2]"#,
            r#"{"status":"success","bindings":[]}"#,
            r#"{"status":"success","bindings":{"X":true}}"#,
        ] {
            let err = Response::decode(line).unwrap_err();
            assert!(
                matches!(err, EngineError::Protocol(_)),
                "Expected protocol error for {}, got {:?}",
                line,
                err
            );
        }
    }
}
