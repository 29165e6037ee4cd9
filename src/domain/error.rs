/// Error taxonomy for the indexing engine.
///
/// Classification errors are scoped to a single source file: the run reports
/// them and moves on to the next file. Parse errors come out of the CST
/// producer and are handled the same way.
use thiserror::Error;

/// A source file failed to classify.
///
/// The line number is filled in by the tree walk when the failing layer does
/// not know it (classification works on node identities, not positions).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// A grammar node did not have the child shape its construct requires.
    #[error("malformed {construct} at line {line}")]
    ShapeViolation { construct: &'static str, line: usize },

    /// Two different marks were applied to the same token.
    #[error("conflicting marks on {what} at line {line}")]
    MarkConflict { what: String, line: usize },

    /// A previously registered mark was expected but absent.
    #[error("no mark registered for node at line {line}")]
    MissingMark { line: usize },

    /// Assignment-target state was still live when the file ended.
    #[error("{outstanding} unresolved assignment target(s) at line {line}")]
    UnresolvedPending { outstanding: usize, line: usize },
}

impl IndexError {
    /// Attach a line number to an error raised without one.
    ///
    /// Errors that already carry a real line (anything nonzero) keep it; the
    /// walk calls this with its running line so positionless failures still
    /// point at the right spot in the source.
    pub fn with_line(mut self, lineno: usize) -> Self {
        let slot = match &mut self {
            IndexError::ShapeViolation { line, .. } => line,
            IndexError::MarkConflict { line, .. } => line,
            IndexError::MissingMark { line } => line,
            IndexError::UnresolvedPending { line, .. } => line,
        };
        if *slot == 0 {
            *slot = lineno;
        }
        self
    }
}

/// The source text could not be tokenized or parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message} at line {line}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_line_fills_missing_position() {
        let err = IndexError::ShapeViolation {
            construct: "class definition",
            line: 0,
        };
        assert_eq!(
            err.with_line(7).to_string(),
            "malformed class definition at line 7"
        );
    }

    #[test]
    fn test_with_line_keeps_existing_position() {
        let err = IndexError::MarkConflict {
            what: "foo".into(),
            line: 3,
        };
        assert_eq!(err.with_line(9).to_string(), "conflicting marks on foo at line 3");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unexpected indent", 12);
        assert_eq!(err.to_string(), "unexpected indent at line 12");
    }
}
