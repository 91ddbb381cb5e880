//! Observation hooks for token outcomes
//!
//! Callbacks never influence parsing. They are configured per parse by
//! attaching a [`Callbacks`] registry to the initial
//! [`Environment`](crate::Environment), and are invoked for every token
//! that succeeds or fails, including tokens inside alternatives that are
//! later discarded.

use std::fmt::Debug;
use std::sync::Arc;

use crate::data::environment::Environment;
use crate::data::list::PersistentList;
use crate::token::Token;

/// Receiver of token outcomes.
pub trait Callback: Send + Sync {
    /// Called after `token` matched, turning `before` into `after`.
    fn handle_success(&self, token: &Token, before: &Environment, after: &Environment);

    /// Called after `token` failed to match at `before`.
    fn handle_failure(&self, token: &Token, before: &Environment);
}

/// Immutable registry of generic and per-token callbacks.
#[derive(Clone, Default)]
pub struct Callbacks {
    generic: PersistentList<Arc<dyn Callback>>,
    per_token: PersistentList<(Token, Arc<dyn Callback>)>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every token.
    #[must_use]
    pub fn add(&self, callback: Arc<dyn Callback>) -> Self {
        Self {
            generic: self.generic.add(callback),
            per_token: self.per_token.clone(),
        }
    }

    /// Registers `callback` for `token` only.
    #[must_use]
    pub fn add_for(&self, token: Token, callback: Arc<dyn Callback>) -> Self {
        Self {
            generic: self.generic.clone(),
            per_token: self.per_token.add((token, callback)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generic.is_empty() && self.per_token.is_empty()
    }

    fn for_token<'a>(&'a self, token: &'a Token) -> impl Iterator<Item = &'a Arc<dyn Callback>> + 'a {
        self.generic.iter().chain(
            self.per_token
                .iter()
                .filter(move |(registered, _)| registered == token)
                .map(|(_, callback)| callback),
        )
    }

    pub(crate) fn handle_success(&self, token: &Token, before: &Environment, after: &Environment) {
        for callback in self.for_token(token) {
            callback.handle_success(token, before, after);
        }
    }

    pub(crate) fn handle_failure(&self, token: &Token, before: &Environment) {
        for callback in self.for_token(token) {
            callback.handle_failure(token, before);
        }
    }
}

impl Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Callbacks(generic: {}, per token: {})",
            self.generic.len(),
            self.per_token.len()
        )
    }
}
