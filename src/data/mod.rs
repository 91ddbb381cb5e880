//! Persistent data model
//!
//! Everything here is immutable once constructed and shares structure
//! freely: byte sources and slices, values, the parse graph and the
//! environment threaded through parsing.

pub mod callback;
pub mod environment;
pub mod graph;
pub mod list;
pub mod selection;
pub mod slice;
pub mod source;
pub mod value;
