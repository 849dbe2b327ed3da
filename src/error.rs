//! Compile-time error taxonomy.
//!
//! Grounded on `atusy-treesitter-ls/src/error.rs`: a `thiserror` enum with
//! one variant per distinct failure, short declarative messages, and a
//! crate-local `Result` alias.

use thiserror::Error;

/// Stable, enumerated compile-time error. Matches `spec.md` §6's
/// `CompileError` taxonomy. The engine never partially compiles: on any of
/// these, [`crate::compile::compile`] returns `Err` and no pattern object
/// is constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("unbalanced bracket expression")]
    UnbalancedBracket,

    #[error("unbalanced parenthesis")]
    UnbalancedParen,

    #[error("unfinished escape sequence")]
    UnfinishedEscape,

    #[error("invalid repetition interval content")]
    InvalidIntervalContent,

    #[error("repetition interval exceeds RE_DUP_MAX ({})", crate::limits::RE_DUP_MAX)]
    IntervalTooLarge,

    #[error("invalid character class name: {name}")]
    InvalidCharacterClass { name: String },

    #[error("invalid back-reference: \\{digit}")]
    InvalidBackReference { digit: u8 },

    #[error("no syntax bits specified")]
    NoSyntaxSpecified,
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Injected warning sink, per `spec.md` §7 / §9 ("preserve the hook").
///
/// The engine emits exactly one kind of warning through this trait: a
/// literal `[:space:]` bracket expression used outside of a `[[:space:]]`
/// POSIX class wrapper. When [`crate::syntax::CompileOptions::posixly_correct`]
/// is set, that same condition is reported as
/// [`CompileError::InvalidCharacterClass`] instead of a warning.
pub trait WarnSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Default [`WarnSink`] that forwards to the `log` facade at `warn!`.
pub struct LogWarnSink;

impl WarnSink for LogWarnSink {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(
            CompileError::UnbalancedBracket.to_string(),
            "unbalanced bracket expression"
        );
        assert_eq!(
            CompileError::InvalidBackReference { digit: 9 }.to_string(),
            "invalid back-reference: \\9"
        );
    }
}
