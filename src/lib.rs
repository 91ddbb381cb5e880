//! Declarative parsing of structured binary data
//!
//! # Overview
//!
//! `metal` parses binary formats described by a grammar rather than by
//! hand-written parsing code. A grammar is a tree of [`Token`]s built from a
//! small set of combinators: definitions of sized fields, sequences, ordered
//! choices, repetitions (unbounded, counted, or conditional), optional parts,
//! pre- and post-conditions, detours to other addresses, parsing over
//! computed data, and references to tokens by name. Sizes, counts,
//! addresses and conditions are [`ValueExpression`]s and [`Expression`]s
//! evaluated against everything parsed so far, so self-describing layouts
//! such as "a length field, then that many bytes" need no imperative code.
//!
//! Parsing produces a [`ParseGraph`]: a persistent trace of every matched
//! value, every sub-structure, and every place where an earlier structure
//! was reused.
//!
//! # Data model
//!
//! Everything the engine produces is immutable and structurally shared:
//!   * a [`Source`] is an address space of bytes, backed by a constant
//!     buffer, a caller-supplied [`ByteStream`], the result of an
//!     expression, or a concatenation of earlier values
//!   * a [`Slice`] is a lazily read range of a source
//!   * a [`Value`] is a slice with an [`Encoding`]; a [`ParseValue`] also
//!     records its scoped name and the token that produced it
//!   * a [`ParseGraph`] is an append-only stack of values, nested graphs and
//!     [`ParseReference`]s
//!   * an [`Environment`] bundles the source, the current offset, the graph
//!     and the [`Callbacks`] to notify
//!
//! Parsing a token never modifies an environment; it returns a new one.
//! When a token fails to match, the result carries the environment it was
//! given, so backtracking amounts to ignoring a result.
//!
//! # Errors
//!
//! Input that does not match a grammar is not an error. It is reported as an
//! unsuccessful [`ParseResult`], and [`Token::parse_environment`] returns
//! `Ok(None)`. A [`MetalError`] signals a defect in the grammar itself, such
//! as a count expression that yields several values where exactly one is
//! required, and is never absorbed by an alternative.
//!
//! # Stack safety
//!
//! Traversals whose depth grows with the input (over lists, graphs and
//! concatenated sources) run on a [`Trampoline`], so large inputs do not
//! exhaust the call stack.
//!
//! # Example
//!
//! ```
//! use metal::{Encoding, Environment, Token, ValueExpression};
//! use metal::data::selection::get_value;
//!
//! let grammar = Token::seq(
//!     "",
//!     vec![
//!         Token::def("length", ValueExpression::con_int(4))?,
//!         Token::def("data", ValueExpression::ref_name("length"))?,
//!     ],
//! )?;
//! let input = Environment::from_bytes(vec![0, 0, 0, 2, 4, 8]);
//! let parsed = grammar
//!     .parse_environment(&input, &Encoding::default())?
//!     .expect("input matches");
//! let data = get_value(&parsed.graph, "data").expect("data was parsed");
//! assert_eq!(&*data.bytes()?, &[4, 8]);
//! # Ok::<(), metal::MetalError>(())
//! ```

pub mod data;
pub mod encoding;
pub mod error;
pub mod expression;
mod internal;
pub mod token;

pub use crate::data::callback::{Callback, Callbacks};
pub use crate::data::environment::{Environment, ParseResult};
pub use crate::data::graph::{ParseGraph, ParseItem, ParseReference};
pub use crate::data::list::PersistentList;
pub use crate::data::slice::Slice;
pub use crate::data::source::{ByteStream, InMemoryByteStream, Source};
pub use crate::data::value::{ParseValue, Value};
pub use crate::encoding::{ByteOrder, Charset, Encoding, Sign};
pub use crate::error::{MetalError, MetalResult};
pub use crate::expression::ops::{BinaryOp, UnaryOp};
pub use crate::expression::value::{Reducer, ValueExpression};
pub use crate::expression::{Comparison, Expression};
pub use crate::internal::Trampoline;
pub use crate::token::{Token, TokenKind};
