//! Parsing behavior of each token kind
//!
//! Parsing does not recurse on the call stack. A token that parses a child
//! pushes a [`Frame`] recording where it left off and hands the child back
//! to the loop in [`run`]; once the child's result is known, the frame on
//! top of the stack resumes. Grammars that recurse through references can
//! therefore nest as deeply as their input does.

use std::sync::Arc;

use num_traits::{Signed, ToPrimitive};

use crate::data::environment::{Environment, ParseResult};
use crate::data::graph::{ParseGraph, ParseReference};
use crate::data::selection;
use crate::data::source::Source;
use crate::data::value::ParseValue;
use crate::encoding::Encoding;
use crate::error::MetalResult;
use crate::expression::value::{single_index, ValueExpression, Values};
use crate::expression::Expression;
use crate::token::{make_scope, Token, TokenKind};

/// Token to parse within the scope of its parent.
struct Call {
    token: Token,
    scope: Arc<str>,
    environment: Environment,
    encoding: Encoding,
}

enum Step {
    Enter(Call),
    Return(ParseResult),
}

enum Frame {
    /// Logs the outcome of `token` and notifies callbacks.
    Report { token: Token, entry: Environment },
    Resume(Parent, State),
}

/// Composite token waiting for the result of a child.
///
/// `entry` is the environment the token itself started from, and what it
/// hands back when it fails.
struct Parent {
    token: Token,
    scope: Arc<str>,
    encoding: Encoding,
    entry: Environment,
}

/// Where a composite token continues once its child returns.
enum State {
    /// `next` indexes the child after the one being parsed.
    Seq { next: usize },
    /// Every alternative starts from `branched`.
    Cho { branched: Environment, next: usize },
    /// Rep and While.
    Repeat,
    /// `remaining` children still to parse after the current one.
    RepN { remaining: usize },
    Opt,
    Pre,
    Post,
    Sub,
    /// `pending` holds the data results after the one being parsed.
    Tie { pending: Values, index: usize },
}

/// Parses `token` and everything beneath it.
pub(super) fn run(token: &Token, scope: &str, environment: &Environment, encoding: &Encoding) -> MetalResult<ParseResult> {
    let mut stack = Vec::new();
    let mut step = Step::Enter(Call {
        token: token.clone(),
        scope: Arc::from(scope),
        environment: environment.clone(),
        encoding: *encoding,
    });
    loop {
        step = match step {
            Step::Enter(call) => enter(call, &mut stack)?,
            Step::Return(result) => match stack.pop() {
                None => return Ok(result),
                Some(Frame::Report { token, entry }) => report(&token, &entry, result),
                Some(Frame::Resume(parent, state)) => parent.resume(state, result, &mut stack)?,
            },
        };
    }
}

fn report(token: &Token, entry: &Environment, result: ParseResult) -> Step {
    if result.succeeded {
        log::trace!("{:?} matched at {}..{}", token, entry.offset, result.environment.offset);
        entry.callbacks.handle_success(token, entry, &result.environment);
    } else {
        log::trace!("{:?} failed at {}", token, entry.offset);
        entry.callbacks.handle_failure(token, entry);
    }
    Step::Return(result)
}

/// Starts parsing the token of `call`.
///
/// The token's own encoding, if it has one, replaces the inherited one for
/// itself and everything it parses.
fn enter(call: Call, stack: &mut Vec<Frame>) -> MetalResult<Step> {
    let Call {
        token,
        scope,
        environment,
        encoding,
    } = call;
    let encoding = token.encoding().copied().unwrap_or(encoding);
    stack.push(Frame::Report {
        token: token.clone(),
        entry: environment.clone(),
    });
    let scope = match token.name() {
        "" => scope,
        name => Arc::from(make_scope(&scope, name)),
    };
    let parent = Parent {
        token: token.clone(),
        scope,
        encoding,
        entry: environment,
    };
    match token.kind() {
        TokenKind::Def { size, predicate } => parent.define(size, predicate.as_ref()),
        TokenKind::Seq(_) => {
            let branched = parent.branch();
            parent.sequence(branched, 0, stack)
        }
        TokenKind::Cho(_) => {
            let branched = parent.branch();
            Ok(parent.choose(branched, 0, stack))
        }
        TokenKind::Rep(_) | TokenKind::While { .. } => {
            let branched = parent.branch();
            parent.repeat(branched, stack)
        }
        TokenKind::RepN { count, .. } => {
            let count = single_index(count, &parent.entry.graph, encoding, "repetition count")?;
            let branched = parent.branch();
            parent.count(branched, count, stack)
        }
        TokenKind::Opt(child) => {
            let branched = parent.branch();
            Ok(parent.descend(child.clone(), branched, State::Opt, stack))
        }
        TokenKind::Pre { token: child, predicate } => {
            if !predicate.eval(&parent.entry.graph, &encoding)? {
                return Ok(parent.fail());
            }
            let branched = parent.branch();
            Ok(parent.descend(child.clone(), branched, State::Pre, stack))
        }
        TokenKind::Post { token: child, .. } => {
            let branched = parent.branch();
            Ok(parent.descend(child.clone(), branched, State::Post, stack))
        }
        TokenKind::Sub { token: child, address } => parent.detour(child, address, stack),
        TokenKind::Tie { data, .. } => {
            let results = data.eval(&parent.entry.graph, &encoding)?;
            if results.is_empty() {
                return Ok(parent.fail());
            }
            let branched = parent.branch();
            parent.tie(branched, results, 0, stack)
        }
        TokenKind::Nod { size } => parent.skip(size),
        TokenKind::Ref { reference } => match selection::find_definition(&parent.entry.graph, reference) {
            Some(target) => Ok(Step::Enter(Call {
                token: target,
                scope: parent.scope,
                environment: parent.entry,
                encoding,
            })),
            None => {
                log::trace!("no token named '{reference}' in graph");
                Ok(parent.fail())
            }
        },
    }
}

impl Parent {
    fn resume(self, state: State, result: ParseResult, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        let ParseResult { succeeded, environment } = result;
        match state {
            State::Seq { next } if succeeded => self.sequence(environment, next, stack),
            State::Cho { .. } | State::Opt | State::Pre if succeeded => self.close(&environment),
            State::Cho { branched, next } => Ok(self.choose(branched, next, stack)),
            State::Repeat if succeeded => self.repeat(environment, stack),
            State::Repeat => self.close(&environment),
            State::RepN { remaining } if succeeded => self.count(environment, remaining, stack),
            State::Opt => Ok(Step::Return(ParseResult::success(self.entry))),
            State::Post if succeeded => {
                let closed = environment.close_branch(&self.token)?;
                if let TokenKind::Post { predicate, .. } = self.token.kind() {
                    if !predicate.eval(&closed.graph, &self.encoding)? {
                        return Ok(self.fail());
                    }
                }
                Ok(Step::Return(ParseResult::success(closed)))
            }
            State::Sub if succeeded => {
                let closed = environment.close_branch(&self.token)?;
                Ok(Step::Return(ParseResult::success(closed.seek(self.entry.offset))))
            }
            State::Tie { pending, index } if succeeded => self.tie(environment, pending, index, stack),
            State::Seq { .. } | State::RepN { .. } | State::Pre | State::Post | State::Sub | State::Tie { .. } => {
                Ok(self.fail())
            }
        }
    }

    /// Hands `child` to the parse loop, to resume in `state` afterwards.
    fn descend(self, child: Token, environment: Environment, state: State, stack: &mut Vec<Frame>) -> Step {
        let call = Call {
            token: child,
            scope: self.scope.clone(),
            environment,
            encoding: self.encoding,
        };
        stack.push(Frame::Resume(self, state));
        Step::Enter(call)
    }

    fn child(&self, index: usize) -> Option<Token> {
        match self.token.kind() {
            TokenKind::Seq(tokens) | TokenKind::Cho(tokens) => tokens.get(index).cloned(),
            TokenKind::Rep(token)
            | TokenKind::Opt(token)
            | TokenKind::RepN { token, .. }
            | TokenKind::While { token, .. }
            | TokenKind::Pre { token, .. }
            | TokenKind::Post { token, .. }
            | TokenKind::Sub { token, .. }
            | TokenKind::Tie { token, .. } => (index == 0).then(|| token.clone()),
            TokenKind::Def { .. } | TokenKind::Nod { .. } | TokenKind::Ref { .. } => None,
        }
    }

    fn branch(&self) -> Environment {
        self.entry.add_branch(self.token.clone())
    }

    /// Closes the branch this token opened and reports success.
    fn close(&self, environment: &Environment) -> MetalResult<Step> {
        Ok(Step::Return(ParseResult::success(environment.close_branch(&self.token)?)))
    }

    fn fail(self) -> Step {
        Step::Return(ParseResult::failure(self.entry))
    }

    fn define(self, size: &ValueExpression, predicate: Option<&Expression>) -> MetalResult<Step> {
        let Some(size) = size_of(size, &self.entry, &self.encoding)? else {
            return Ok(self.fail());
        };
        let Some(slice) = self.entry.slice(size)? else {
            return Ok(self.fail());
        };
        let value = ParseValue::new(self.scope.clone(), self.token.clone(), slice, self.encoding);
        let next = self.entry.add(value).seek(self.entry.offset + size);
        if let Some(predicate) = predicate {
            if !predicate.eval(&next.graph, &self.encoding)? {
                return Ok(self.fail());
            }
        }
        Ok(Step::Return(ParseResult::success(next)))
    }

    fn skip(self, size: &ValueExpression) -> MetalResult<Step> {
        let Some(size) = size_of(size, &self.entry, &self.encoding)? else {
            return Ok(self.fail());
        };
        if !self.entry.source.is_available(self.entry.offset, size)? {
            return Ok(self.fail());
        }
        let next = self.entry.seek(self.entry.offset + size);
        Ok(Step::Return(ParseResult::success(next)))
    }

    fn sequence(self, current: Environment, next: usize, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        match self.child(next) {
            Some(child) => Ok(self.descend(child, current, State::Seq { next: next + 1 }, stack)),
            None => self.close(&current),
        }
    }

    fn choose(self, branched: Environment, next: usize, stack: &mut Vec<Frame>) -> Step {
        match self.child(next) {
            Some(child) => {
                let state = State::Cho {
                    branched: branched.clone(),
                    next: next + 1,
                };
                self.descend(child, branched, state, stack)
            }
            None => self.fail(),
        }
    }

    /// Parses the child again unless a While predicate no longer holds.
    fn repeat(self, current: Environment, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        if let TokenKind::While { predicate, .. } = self.token.kind() {
            if !predicate.eval(&current.graph, &self.encoding)? {
                return self.close(&current);
            }
        }
        match self.child(0) {
            Some(child) => Ok(self.descend(child, current, State::Repeat, stack)),
            None => self.close(&current),
        }
    }

    fn count(self, current: Environment, remaining: usize, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        if remaining == 0 {
            return self.close(&current);
        }
        match self.child(0) {
            Some(child) => {
                let state = State::RepN {
                    remaining: remaining - 1,
                };
                Ok(self.descend(child, current, state, stack))
            }
            None => self.close(&current),
        }
    }

    /// Parses the child at an evaluated address, or refers to an earlier
    /// parse of the same Sub there, then returns to where this token began.
    fn detour(self, child: &Token, address: &ValueExpression, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        let address = address
            .eval_single(&self.entry.graph, &self.encoding, "sub address")?
            .as_numeric()?;
        if address.is_negative() {
            return Ok(self.fail());
        }
        let Some(address) = address.to_u64() else {
            return Ok(self.fail());
        };
        let branched = self.branch();
        let parsed_before = selection::find_graph_at_offset(
            &self.entry.graph,
            |graph| is_sub_over(graph, child),
            &self.entry.source,
            address,
        )?;
        if let Some(definition) = parsed_before.as_ref().and_then(ParseGraph::definition) {
            let reference = ParseReference::new(address, self.entry.source.clone(), definition.clone());
            let closed = branched.add_reference(reference).close_branch(&self.token)?;
            return Ok(Step::Return(ParseResult::success(closed.seek(self.entry.offset))));
        }
        Ok(self.descend(child.clone(), branched.seek(address), State::Sub, stack))
    }

    /// Parses the child over the next of the `pending` data results, or
    /// restores the original source once none are left.
    fn tie(self, current: Environment, pending: Values, index: usize, stack: &mut Vec<Frame>) -> MetalResult<Step> {
        let Some((value, rest)) = pending.split() else {
            let closed = current.close_branch(&self.token)?;
            let restored = closed.with_source(self.entry.source.clone(), self.entry.offset);
            return Ok(Step::Return(ParseResult::success(restored)));
        };
        if value.is_none() {
            return Ok(self.fail());
        }
        let (TokenKind::Tie { data, .. }, Some(child)) = (self.token.kind(), self.child(0)) else {
            return Ok(self.fail());
        };
        let source = Source::data_expression(data.clone(), index, self.entry.graph.clone(), self.encoding);
        let state = State::Tie {
            pending: rest.clone(),
            index: index + 1,
        };
        Ok(self.descend(child, current.with_source(source, 0), state, stack))
    }
}

/// Evaluates a size expression. Anything but a single present value that
/// fits a non-negative `u64` is reported as `None`.
fn size_of(expression: &ValueExpression, environment: &Environment, encoding: &Encoding) -> MetalResult<Option<u64>> {
    let values = expression.eval(&environment.graph, encoding)?;
    match (values.len(), values.head()) {
        (1, Some(Some(value))) => value.as_u64(),
        _ => Ok(None),
    }
}

/// Returns `true` if `graph` was produced by a `Sub` over `token`.
fn is_sub_over(graph: &ParseGraph, token: &Token) -> bool {
    matches!(
        graph.definition().map(Token::kind),
        Some(TokenKind::Sub { token: inner, .. }) if inner == token
    )
}
