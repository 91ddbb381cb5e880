//! Low-level logic used throughout this crate
//!
//! This module serves as a general heading for definitions that are
//! designed primarily for library-internal use. Currently this is the
//! [`Trampoline`] type that every traversal over input-sized persistent
//! data is built on.

pub(crate) mod trampoline;

pub use trampoline::Trampoline;
