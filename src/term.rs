//! Prolog terms: construction, serialization and wire decoding.
//!
//! [`Term`] is the host-side view of a Prolog value. Its `Display`
//! implementation produces Prolog syntax that is safe to splice into a query
//! string: every atom, functor name and dict key is quoted and escaped, so
//! only [`Variable`]s appear unquoted.
//!
//! ```
//! use swipl_engine::term::{Term, Variable};
//!
//! let goal = Term::compound("member", vec![
//!     Term::Variable(Variable::new("X").unwrap()),
//!     Term::list(vec![1.into(), 2.into(), 3.into(), 4.into()]),
//! ]);
//! assert_eq!(goal.to_string(), "'member'(X,[1,2,3,4])");
//! ```
//!
//! The same type carries solution bindings coming back from the process; see
//! [`TryFrom<serde_json::Value>`](#impl-TryFrom<Value>-for-Term) for the
//! encoding.

mod escape;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Number, Value};

use crate::error::TermError;

pub use escape::{quote, ATOM_QUOTE, STRING_QUOTE};

/// Variable name to term, for one solution.
pub type Bindings = BTreeMap<String, Term>;

/// Functor of a list cell whose tail is not a proper list.
const CONS_FUNCTOR: &str = "[|]";

/// Wire token for the empty list.
const EMPTY_LIST: &str = "[]";

/// A logic variable name, validated against `^[A-Z_][A-Za-z0-9]*$`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(String);

impl Variable {
    /// Validate and wrap a variable name.
    pub fn new(name: impl Into<String>) -> Result<Self, TermError> {
        let name = name.into();
        if is_variable_name(&name) {
            Ok(Variable(name))
        } else {
            Err(TermError::InvalidVariableName(name))
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Tag of a dict: an atom, or a variable for anonymous dicts.
#[derive(Debug, Clone, PartialEq)]
pub enum DictTag {
    Atom(String),
    Variable(Variable),
}

/// A Prolog value.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Serialized single-quoted.
    Atom(String),
    /// Serialized double-quoted.
    String(String),
    Number(Number),
    Variable(Variable),
    List(Vec<Term>),
    Compound { name: String, args: Vec<Term> },
    Dict {
        tag: DictTag,
        content: BTreeMap<String, Term>,
    },
    /// Serializes to the atom `undefined`.
    Undefined,
    /// Serializes to the atom `null`.
    Null,
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Term::String(text.into())
    }

    /// A variable term. Fails if `name` is not a valid variable name.
    pub fn variable(name: impl Into<String>) -> Result<Self, TermError> {
        Variable::new(name).map(Term::Variable)
    }

    pub fn list(items: Vec<Term>) -> Self {
        Term::List(items)
    }

    pub fn compound(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Compound {
            name: name.into(),
            args,
        }
    }

    /// A dict with an atom tag.
    pub fn dict<K, I>(tag: impl Into<String>, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Term)>,
    {
        Term::Dict {
            tag: DictTag::Atom(tag.into()),
            content: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// A finite float. NaN and infinities have no Prolog literal.
    pub fn float(value: f64) -> Result<Self, TermError> {
        Number::from_f64(value)
            .map(Term::Number)
            .ok_or(TermError::InvalidNumber(value))
    }

    /// Text of an atom or string term.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Term::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Term::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }
}

/// Serialize a term to Prolog syntax. Same as `term.to_string()`.
pub fn serialize(term: &Term) -> String {
    term.to_string()
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) => f.write_str(&quote(name, ATOM_QUOTE)),
            Term::String(text) => f.write_str(&quote(text, STRING_QUOTE)),
            Term::Number(n) => write!(f, "{}", n),
            Term::Variable(v) => write!(f, "{}", v),
            Term::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Term::Compound { name, args } => {
                f.write_str(&quote(name, ATOM_QUOTE))?;
                f.write_str("(")?;
                write_joined(f, args)?;
                f.write_str(")")
            }
            Term::Dict { tag, content } => {
                match tag {
                    DictTag::Atom(name) => f.write_str(&quote(name, ATOM_QUOTE))?,
                    DictTag::Variable(v) => write!(f, "{}", v)?,
                }
                f.write_str("{")?;
                for (i, (key, value)) in content.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", quote(key, ATOM_QUOTE), value)?;
                }
                f.write_str("}")
            }
            Term::Undefined => f.write_str("undefined"),
            Term::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Atom(s.to_string())
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Atom(s)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Number(n.into())
    }
}

impl From<i32> for Term {
    fn from(n: i32) -> Self {
        Term::Number(n.into())
    }
}

impl From<u64> for Term {
    fn from(n: u64) -> Self {
        Term::Number(n.into())
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Variable(v)
    }
}

impl From<Vec<Term>> for Term {
    fn from(items: Vec<Term>) -> Self {
        Term::List(items)
    }
}

/// Decode a term from the JSON encoding used in solution bindings.
///
/// | JSON                                  | Term                        |
/// |---------------------------------------|-----------------------------|
/// | `"[]"`                                | empty `List`                |
/// | any other string                      | `Atom`                      |
/// | number                                | `Number`                    |
/// | `null`                                | `Null`                      |
/// | `{"variable": name}`                  | `Variable`                  |
/// | `{"name": f, "args": [..]}`           | `Compound`                  |
/// | `{"head": h, "tail": t}`              | `List` (partial lists: cons compounds) |
/// | `{"tag": t, "content": {..}}`         | `Dict`                      |
///
/// Anything else (booleans, bare arrays, other objects) is
/// [`TermError::InvalidTerm`].
impl TryFrom<Value> for Term {
    type Error = TermError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) if s == EMPTY_LIST => Ok(Term::List(Vec::new())),
            Value::String(s) => Ok(Term::Atom(s)),
            Value::Number(n) => Ok(Term::Number(n)),
            Value::Null => Ok(Term::Null),
            Value::Object(mut map) => {
                if let Some(name) = map.get("variable").and_then(Value::as_str) {
                    return Variable::new(name).map(Term::Variable);
                }
                if map.contains_key("head") && map.contains_key("tail") {
                    let head = map.remove("head").unwrap_or(Value::Null);
                    let tail = map.remove("tail").unwrap_or(Value::Null);
                    return decode_list(head, tail);
                }
                if matches!(map.get("name"), Some(Value::String(_)))
                    && matches!(map.get("args"), Some(Value::Array(_)))
                {
                    if let (Some(Value::String(name)), Some(Value::Array(args))) =
                        (map.remove("name"), map.remove("args"))
                    {
                        let args = args
                            .into_iter()
                            .map(Term::try_from)
                            .collect::<Result<Vec<_>, _>>()?;
                        return Ok(Term::Compound { name, args });
                    }
                }
                if map.contains_key("tag") && matches!(map.get("content"), Some(Value::Object(_))) {
                    let tag = decode_tag(map.remove("tag").unwrap_or(Value::Null))?;
                    let content = match map.remove("content") {
                        Some(Value::Object(content)) => content
                            .into_iter()
                            .map(|(k, v)| Term::try_from(v).map(|t| (k, t)))
                            .collect::<Result<BTreeMap<_, _>, _>>()?,
                        _ => BTreeMap::new(),
                    };
                    return Ok(Term::Dict { tag, content });
                }
                Err(TermError::InvalidTerm(Value::Object(map).to_string()))
            }
            other => Err(TermError::InvalidTerm(other.to_string())),
        }
    }
}

/// Walk a chain of cons cells. Proper lists become `Term::List`; a partial
/// list keeps its cells as `'[|]'` compounds so no information is lost.
fn decode_list(head: Value, tail: Value) -> Result<Term, TermError> {
    let mut items = vec![Term::try_from(head)?];
    let mut rest = tail;
    loop {
        match rest {
            Value::Object(mut map) if map.contains_key("head") && map.contains_key("tail") => {
                let head = map.remove("head").unwrap_or(Value::Null);
                items.push(Term::try_from(head)?);
                rest = map.remove("tail").unwrap_or(Value::Null);
            }
            other => {
                return match Term::try_from(other)? {
                    Term::List(tail_items) => {
                        items.extend(tail_items);
                        Ok(Term::List(items))
                    }
                    tail => Ok(items.into_iter().rev().fold(tail, |acc, item| {
                        Term::compound(CONS_FUNCTOR, vec![item, acc])
                    })),
                };
            }
        }
    }
}

fn decode_tag(tag: Value) -> Result<DictTag, TermError> {
    match Term::try_from(tag)? {
        Term::Atom(name) => Ok(DictTag::Atom(name)),
        Term::Variable(v) => Ok(DictTag::Variable(v)),
        other => Err(TermError::InvalidTerm(format!("dict tag {}", other))),
    }
}
