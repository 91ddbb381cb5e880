//! Fatal error types
//!
//! This module defines the hierarchy of errors that signal a malformed
//! grammar or a violated internal invariant, as opposed to input that
//! simply fails to match a grammar.
//!
//! # Layout
//!
//! The primary type is [`MetalError`], together with the alias
//! [`MetalResult<T>`]. Each variant of `MetalError` wraps a more specific
//! error type grouped by provenance:
//!   * [`ConstructionError`] for grammar objects built from invalid arguments
//!   * [`EvaluationError`] for value expressions that had to yield exactly one
//!     present value and did not
//!   * [`SourceError`] for reads that a byte source cannot honor
//!   * [`InternalError`] for invariants of the parse graph that were broken
//!
//! A grammar mismatch is never reported through these types. Parsing
//! reports mismatches as an unsuccessful [`ParseResult`](crate::ParseResult)
//! and reserves `MetalError` for conditions that no alternative branch of a
//! grammar should be allowed to paper over.

use std::error::Error;
use std::fmt::{Display, Formatter, Result};

/// Enumeration type over all fatal errors raised while constructing
/// grammars, parsing, or evaluating expressions.
#[derive(Debug)]
pub enum MetalError {
    /// Error class for grammar objects constructed with invalid arguments.
    Construction(ConstructionError),
    /// Error class for expressions whose result shape violates the
    /// requirements of the construct evaluating them.
    Evaluation(EvaluationError),
    /// Error class for failed or out-of-bounds reads on a byte source.
    Source(SourceError),
    /// Error class for violated invariants of the engine itself.
    Internal(InternalError),
}

impl Display for MetalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            MetalError::Construction(err) => Display::fmt(err, f),
            MetalError::Evaluation(err) => Display::fmt(err, f),
            MetalError::Source(err) => Display::fmt(err, f),
            MetalError::Internal(err) => Display::fmt(err, f),
        }
    }
}

impl Error for MetalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MetalError::Construction(err) => Some(err),
            MetalError::Evaluation(err) => Some(err),
            MetalError::Source(err) => Some(err),
            MetalError::Internal(err) => Some(err),
        }
    }
}

/// Type alias for Result with an error type of [`MetalError`]
pub type MetalResult<T> = std::result::Result<T, MetalError>;

/// Errors raised by the constructors of grammar objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// A combinator over several tokens received fewer than it requires.
    TooFewTokens {
        kind: &'static str,
        minimum: usize,
        actual: usize,
    },
    /// A name that identifies a value or a token was empty.
    EmptyName { kind: &'static str },
}

impl From<ConstructionError> for MetalError {
    fn from(err: ConstructionError) -> Self {
        Self::Construction(err)
    }
}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ConstructionError::TooFewTokens {
                kind,
                minimum,
                actual,
            } => write!(
                f,
                "{kind} requires at least {minimum} tokens, got {actual}"
            ),
            ConstructionError::EmptyName { kind } => {
                write!(f, "{kind} requires a non-empty name")
            }
        }
    }
}

impl Error for ConstructionError {}

/// Errors raised when an expression result does not have the shape
/// required by the construct evaluating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// Expected exactly one present value, found `count` results
    /// (of which `present` were present).
    NotSingle {
        role: &'static str,
        count: usize,
        present: usize,
    },
    /// A single value was found but it cannot be used as a non-negative
    /// count, index or offset.
    OutOfRange { role: &'static str, value: String },
    /// A data-expression source was asked for a result index that the
    /// expression does not produce.
    MissingResult { index: usize, available: usize },
    /// A data-expression source found an absent value at the requested index.
    AbsentResult { index: usize },
}

impl EvaluationError {
    pub(crate) fn not_single(role: &'static str, count: usize, present: usize) -> Self {
        Self::NotSingle {
            role,
            count,
            present,
        }
    }
}

impl From<EvaluationError> for MetalError {
    fn from(err: EvaluationError) -> Self {
        Self::Evaluation(err)
    }
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            EvaluationError::NotSingle {
                role,
                count,
                present,
            } => write!(
                f,
                "{role} must evaluate to a single non-empty value (got {count} results, {present} present)"
            ),
            EvaluationError::OutOfRange { role, value } => {
                write!(f, "{role} evaluated to unusable value {value}")
            }
            EvaluationError::MissingResult { index, available } => write!(
                f,
                "data expression yields {available} results, cannot select result {index}"
            ),
            EvaluationError::AbsentResult { index } => {
                write!(f, "data expression result {index} is absent")
            }
        }
    }
}

impl Error for EvaluationError {}

/// Errors raised by reads against a [`Source`](crate::data::source::Source).
#[derive(Debug)]
pub enum SourceError {
    /// Requested range lies (partly) outside of what the source can supply.
    Unavailable { offset: u64, length: u64, bound: u64 },
    /// The underlying byte stream failed to produce a range it had reported
    /// as available.
    Stream(std::io::Error),
}

impl From<SourceError> for MetalError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<std::io::Error> for MetalError {
    fn from(err: std::io::Error) -> Self {
        Self::Source(SourceError::Stream(err))
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SourceError::Unavailable {
                offset,
                length,
                bound,
            } => write!(
                f,
                "cannot read {length} bytes at offset {offset} (source holds {bound} bytes)"
            ),
            SourceError::Stream(err) => write!(f, "byte stream read failed: {err}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SourceError::Unavailable { .. } => None,
            SourceError::Stream(err) => Some(err),
        }
    }
}

/// Implementation-internal errors
///
/// These signify a bug in a grammar-independent part of the engine, or a
/// caller driving the low-level graph operations out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// `close_branch` was called on a graph without an open branch.
    CloseWithoutBranch,
    /// `close_branch` was called by a token other than the one that opened
    /// the innermost branch.
    BranchMismatch { expected: String, actual: String },
    /// The lowest offset of a graph without any value was requested.
    NoValueInGraph,
}

impl From<InternalError> for MetalError {
    fn from(err: InternalError) -> Self {
        Self::Internal(err)
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            InternalError::CloseWithoutBranch => write!(f, "no open branch to close"),
            InternalError::BranchMismatch { expected, actual } => write!(
                f,
                "cannot close branch opened by {expected} from {actual}"
            ),
            InternalError::NoValueInGraph => write!(
                f,
                "cannot determine lowest offset of a graph that contains no value"
            ),
        }
    }
}

impl Error for InternalError {}
