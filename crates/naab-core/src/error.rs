//! The closed error-kind set from `spec.md` §7, plus stack-trace capture
//! and formatting (§4.9).

use crate::ast::SourceLocation;
use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// One call-stack entry, `{function_name, file, line, column}` per
/// `spec.md` §3. `file`/`line`/`column` are the function's *declaration*
/// site, never the call site, so cross-module traces identify the callee.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub function_name: String,
    pub location: SourceLocation,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} ({}:{})", self.function_name, self.location.file, self.location.line)
    }
}

/// The closed set of error kinds from `spec.md` §7.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("syntax error")]
    Syntax,
    #[error("type error")]
    Type,
    #[error("name error")]
    Name,
    #[error("runtime error")]
    Runtime,
    #[error("null safety error")]
    NullSafety,
    #[error("block not found")]
    BlockNotFound,
    #[error("compile error")]
    Compile,
    #[error("marshal error")]
    Marshal,
    #[error("timeout")]
    Timeout,
    #[error("cycle limit exceeded")]
    CycleLimit,
}

impl ErrorKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Syntax => "SyntaxError",
            Self::Type => "TypeError",
            Self::Name => "NameError",
            Self::Runtime => "RuntimeError",
            Self::NullSafety => "NullSafetyError",
            Self::BlockNotFound => "BlockNotFoundError",
            Self::Compile => "CompileError",
            Self::Marshal => "MarshalError",
            Self::Timeout => "TimeoutError",
            Self::CycleLimit => "CycleLimitError",
        }
    }
}

/// A NAAb error value. Thrown values that are not already errors are
/// wrapped (`payload` holds the thrown value; a thrown string produces a
/// string-kind error whose `message` is that string, per `spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
    pub payload: Option<Value>,
    pub frames: Vec<StackFrame>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            payload: None,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Push a frame as the exception unwinds one more level outward. The
    /// innermost frame (where the throw happened) is pushed first.
    pub fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// `<Kind>: <message>` followed by one `  at <frame>` line per stack
    /// frame, deduplicating identical consecutive frames (`spec.md` §4.9,
    /// §6 "Error shape (user-facing)").
    #[must_use]
    pub fn format_trace(&self) -> String {
        let mut out = format!("{}: {}\n", self.kind.label(), self.message);
        let mut last: Option<&StackFrame> = None;
        for frame in &self.frames {
            if last == Some(frame) {
                continue;
            }
            out.push_str(&format!("  {}\n", frame));
            last = Some(frame);
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn loc() -> SourceLocation {
        SourceLocation::new(Rc::from("main.naab"), crate::token::Position::START)
    }

    fn frame(name: &str) -> StackFrame {
        StackFrame {
            function_name: name.into(),
            location: loc(),
        }
    }

    #[test]
    fn trace_dedups_consecutive_identical_frames() {
        let mut err = Error::new(ErrorKind::Runtime, "boom", loc());
        err.push_frame(frame("f"));
        err.push_frame(frame("f"));
        err.push_frame(frame("g"));
        let trace = err.format_trace();
        assert_eq!(trace.matches("at f").count(), 1);
        assert_eq!(trace.matches("at g").count(), 1);
    }

    #[test]
    fn format_starts_with_kind_and_message() {
        let err = Error::new(ErrorKind::NullSafety, "null into non-nullable", loc());
        assert!(err.format_trace().starts_with("NullSafetyError: null into non-nullable\n"));
    }
}
