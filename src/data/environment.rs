//! Parse state threaded through tokens
//!
//! An [`Environment`] is a snapshot of everything a token needs: the source
//! being read, the current offset, the graph accumulated so far and the
//! callbacks to notify. Every method returns a new environment; a token that
//! fails hands back the environment it was given, which is all that
//! backtracking requires.

use std::sync::Arc;

use crate::data::callback::Callbacks;
use crate::data::graph::{ParseGraph, ParseReference};
use crate::data::slice::Slice;
use crate::data::source::{ByteStream, Source};
use crate::data::value::ParseValue;
use crate::error::MetalResult;
use crate::token::Token;

#[derive(Clone, Debug)]
pub struct Environment {
    pub graph: ParseGraph,
    pub source: Source,
    pub offset: u64,
    pub callbacks: Callbacks,
}

impl Environment {
    /// Starts at offset zero of `source` with an empty graph.
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            graph: ParseGraph::EMPTY,
            source,
            offset: 0,
            callbacks: Callbacks::default(),
        }
    }

    #[must_use]
    pub fn from_stream(stream: Arc<dyn ByteStream>) -> Self {
        Self::new(Source::stream(stream))
    }

    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(Source::constant(bytes))
    }

    #[must_use]
    pub fn with_callbacks(self, callbacks: Callbacks) -> Self {
        Self { callbacks, ..self }
    }

    #[must_use]
    pub fn with_graph(&self, graph: ParseGraph) -> Self {
        Self {
            graph,
            ..self.clone()
        }
    }

    /// Switches to `offset` of another source, keeping the graph.
    #[must_use]
    pub fn with_source(&self, source: Source, offset: u64) -> Self {
        Self {
            source,
            offset,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add(&self, value: ParseValue) -> Self {
        self.with_graph(self.graph.add_value(value))
    }

    #[must_use]
    pub fn add_reference(&self, reference: ParseReference) -> Self {
        self.with_graph(self.graph.add_reference(reference))
    }

    #[must_use]
    pub fn add_branch(&self, token: Token) -> Self {
        self.with_graph(self.graph.add_branch(token))
    }

    pub fn close_branch(&self, token: &Token) -> MetalResult<Self> {
        Ok(self.with_graph(self.graph.close_branch(token)?))
    }

    #[must_use]
    pub fn seek(&self, offset: u64) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Slice of `length` bytes at the current offset, if available.
    pub fn slice(&self, length: u64) -> MetalResult<Option<Slice>> {
        Slice::create(self.source.clone(), self.offset, length)
    }
}

impl PartialEq for Environment {
    /// Callbacks take no part in equality.
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.source == other.source && self.graph == other.graph
    }
}

/// Outcome of parsing a token.
///
/// On failure `environment` is the environment the token was given.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseResult {
    pub succeeded: bool,
    pub environment: Environment,
}

impl ParseResult {
    #[must_use]
    pub fn success(environment: Environment) -> Self {
        Self {
            succeeded: true,
            environment,
        }
    }

    #[must_use]
    pub fn failure(environment: Environment) -> Self {
        Self {
            succeeded: false,
            environment,
        }
    }

    /// The resulting environment, if parsing succeeded.
    #[must_use]
    pub fn into_success(self) -> Option<Environment> {
        self.succeeded.then_some(self.environment)
    }
}
