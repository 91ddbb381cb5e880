//! Value expressions
//!
//! A [`ValueExpression`] computes values from a [`ParseGraph`]. Evaluation
//! yields a [`PersistentList`] of optional values rather than a single
//! value, since a reference may match several earlier fields (every
//! iteration of a repetition, for instance). An absent element means the
//! expression has no value for that position.
//!
//! # List order
//!
//! Lists produced by references hold the most recently parsed match at
//! their head. The logical first element of a list is therefore the one
//! deepest in its tail: [`First`](ValueExpression::First) and
//! [`Nth`](ValueExpression::Nth) count from there, while
//! [`Last`](ValueExpression::Last) returns the head.
//!
//! # Broadcasting
//!
//! Binary operators combine their operand lists element by element,
//! starting at the heads. When one list runs out, the combined list is
//! padded with absent values for every element the longer list has left.
//! With a left operand `[1, 2, 3]` and a right operand `[10]`, `add`
//! produces `[11, absent, absent]`. A combined element is absent when
//! either of its operands is.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::data::graph::ParseGraph;
use crate::data::list::PersistentList;
use crate::data::selection;
use crate::data::value::{ParseValue, Value};
use crate::encoding::Encoding;
use crate::error::{EvaluationError, MetalResult};
use crate::expression::ops::{concatenate_all, BinaryOp, UnaryOp};
use crate::internal::Trampoline;
use crate::token::Token;

/// Result of evaluating a [`ValueExpression`]
pub type Values = PersistentList<Option<Value>>;

/// Combines two constant expressions into a new expression, for folds.
pub type Reducer = fn(ValueExpression, ValueExpression) -> ValueExpression;

/// What a reference expression selects values by.
#[derive(Clone, Debug)]
pub enum Reference {
    /// Values whose scoped name matches
    Name(String),
    /// Values produced by the given token
    Definition(Token),
}

/// Expression computing a list of optional values from a parse graph.
#[derive(Clone, Debug)]
pub enum ValueExpression {
    /// A single constant value; ignores the graph.
    Const(Value),
    /// No values at all.
    Empty,
    /// The most recently parsed value, or a single absent value.
    Current,
    /// Earlier values selected by name or definition, most recent first,
    /// optionally limited to `limit` results.
    Ref {
        reference: Reference,
        limit: Option<Box<ValueExpression>>,
    },
    Unary(UnaryOp, Box<ValueExpression>),
    Binary(BinaryOp, Box<ValueExpression>, Box<ValueExpression>),
    /// Number of values in the operand.
    Count(Box<ValueExpression>),
    /// The logical first value of the operand.
    First(Box<ValueExpression>),
    /// The logical last value of the operand, at its head.
    Last(Box<ValueExpression>),
    Reverse(Box<ValueExpression>),
    /// Splits every value into single-byte values.
    Bytes(Box<ValueExpression>),
    /// Concatenates all values into one.
    CatAll(Box<ValueExpression>),
    /// Selects by logical index, one result per index.
    Nth {
        values: Box<ValueExpression>,
        indices: Box<ValueExpression>,
    },
    /// Left value where present, right value otherwise.
    Elvis(Box<ValueExpression>, Box<ValueExpression>),
    /// Repeats `base` as many times as `count` says.
    Expand {
        base: Box<ValueExpression>,
        count: Box<ValueExpression>,
    },
    FoldLeft {
        values: Box<ValueExpression>,
        reducer: Reducer,
        initial: Option<Box<ValueExpression>>,
    },
    FoldRight {
        values: Box<ValueExpression>,
        reducer: Reducer,
        initial: Option<Box<ValueExpression>>,
    },
}

impl ValueExpression {
    /// Constant integer, encoded compactly. Negative numbers use a signed
    /// encoding so they read back unchanged.
    #[must_use]
    pub fn con_int(value: i64) -> Self {
        let encoding = if value < 0 {
            Encoding::signed()
        } else {
            Encoding::default()
        };
        Self::Const(Value::from_numeric(&BigInt::from(value), encoding))
    }

    #[must_use]
    pub fn con_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Const(Value::from_bytes(bytes.into(), Encoding::default()))
    }

    #[must_use]
    pub fn con_str(s: &str) -> Self {
        Self::Const(Value::from_string(s, Encoding::default()))
    }

    #[must_use]
    pub fn con(value: Value) -> Self {
        Self::Const(value)
    }

    /// All values named `name`, most recent first.
    #[must_use]
    pub fn ref_name(name: impl Into<String>) -> Self {
        Self::Ref {
            reference: Reference::Name(name.into()),
            limit: None,
        }
    }

    /// The `limit` most recent values named `name`.
    #[must_use]
    pub fn ref_name_limit(name: impl Into<String>, limit: ValueExpression) -> Self {
        Self::Ref {
            reference: Reference::Name(name.into()),
            limit: Some(Box::new(limit)),
        }
    }

    /// All values produced by `definition`, most recent first.
    #[must_use]
    pub fn ref_definition(definition: Token) -> Self {
        Self::Ref {
            reference: Reference::Definition(definition),
            limit: None,
        }
    }

    #[must_use]
    pub fn ref_definition_limit(definition: Token, limit: ValueExpression) -> Self {
        Self::Ref {
            reference: Reference::Definition(definition),
            limit: Some(Box::new(limit)),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: ValueExpression) -> Self {
        Self::Unary(op, Box::new(operand))
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: ValueExpression, right: ValueExpression) -> Self {
        Self::Binary(op, Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn add(left: ValueExpression, right: ValueExpression) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    #[must_use]
    pub fn sub(left: ValueExpression, right: ValueExpression) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    #[must_use]
    pub fn mul(left: ValueExpression, right: ValueExpression) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    #[must_use]
    pub fn cat(left: ValueExpression, right: ValueExpression) -> Self {
        Self::binary(BinaryOp::Cat, left, right)
    }

    #[must_use]
    pub fn len(operand: ValueExpression) -> Self {
        Self::unary(UnaryOp::Len, operand)
    }

    #[must_use]
    pub fn nth(values: ValueExpression, indices: ValueExpression) -> Self {
        Self::Nth {
            values: Box::new(values),
            indices: Box::new(indices),
        }
    }

    #[must_use]
    pub fn elvis(left: ValueExpression, right: ValueExpression) -> Self {
        Self::Elvis(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn expand(base: ValueExpression, count: ValueExpression) -> Self {
        Self::Expand {
            base: Box::new(base),
            count: Box::new(count),
        }
    }

    /// Reduces `values` from the logical first element onwards. An empty
    /// list folds to `initial`, or to a single absent value without one.
    #[must_use]
    pub fn fold_left(values: ValueExpression, reducer: Reducer, initial: Option<ValueExpression>) -> Self {
        Self::FoldLeft {
            values: Box::new(values),
            reducer,
            initial: initial.map(Box::new),
        }
    }

    #[must_use]
    pub fn fold_right(values: ValueExpression, reducer: Reducer, initial: Option<ValueExpression>) -> Self {
        Self::FoldRight {
            values: Box::new(values),
            reducer,
            initial: initial.map(Box::new),
        }
    }

    /// Evaluates this expression against `graph`.
    ///
    /// # Errors
    ///
    /// Fails if a part of the expression that must yield exactly one present
    /// value (a reference limit, an expansion count, a fold's initial value
    /// or reduction step) does not, or if reading a value's bytes fails.
    pub fn eval(&self, graph: &ParseGraph, encoding: &Encoding) -> MetalResult<Values> {
        let encoding = *encoding;
        match self {
            ValueExpression::Const(value) => Ok(PersistentList::new().add(Some(value.clone()))),
            ValueExpression::Empty => Ok(PersistentList::new()),
            ValueExpression::Current => {
                Ok(PersistentList::new().add(graph.current().map(Value::from)))
            }
            ValueExpression::Ref { reference, limit } => {
                let limit = match limit {
                    Some(limit) => Some(single_index(limit, graph, encoding, "reference limit")?),
                    None => None,
                };
                let matches = match reference {
                    Reference::Name(name) => selection::get_values(graph, name, limit),
                    Reference::Definition(definition) => {
                        selection::get_values_by_definition(graph, definition, limit)
                    }
                };
                Ok(wrap(matches.reverse(), PersistentList::new()).compute_result())
            }
            ValueExpression::Unary(op, operand) => {
                let operand = operand.eval(graph, &encoding)?;
                map_present(&operand, |value| op.apply(value, encoding))
            }
            ValueExpression::Binary(op, left, right) => {
                let left = left.eval(graph, &encoding)?;
                let right = right.eval(graph, &encoding)?;
                let combine = |l: &Value, r: &Value| op.apply(l, r, encoding);
                broadcast(left, right, PersistentList::new(), &combine).compute_result()
            }
            ValueExpression::Count(operand) => {
                let count = operand.eval(graph, &encoding)?.len();
                Ok(single(Value::from_numeric(&BigInt::from(count), encoding)))
            }
            ValueExpression::First(operand) => {
                let values = operand.eval(graph, &encoding)?;
                Ok(match values.iter().last() {
                    Some(first) => PersistentList::new().add(first.clone()),
                    None => PersistentList::new(),
                })
            }
            ValueExpression::Last(operand) => {
                let values = operand.eval(graph, &encoding)?;
                Ok(match values.head() {
                    Some(last) => PersistentList::new().add(last.clone()),
                    None => PersistentList::new(),
                })
            }
            ValueExpression::Reverse(operand) => Ok(operand.eval(graph, &encoding)?.reverse()),
            ValueExpression::Bytes(operand) => {
                let values = operand.eval(graph, &encoding)?;
                let mut split = Vec::new();
                for value in values.reverse().iter() {
                    match value {
                        Some(value) => split.extend(
                            value
                                .bytes()?
                                .iter()
                                .map(|byte| Some(Value::from_bytes(vec![*byte], value.encoding))),
                        ),
                        None => split.push(None),
                    }
                }
                Ok(PersistentList::create(split))
            }
            ValueExpression::CatAll(operand) => {
                let values = operand.eval(graph, &encoding)?;
                if values.is_empty() {
                    return Ok(values);
                }
                if values.iter().any(Option::is_none) {
                    return Ok(PersistentList::new().add(None));
                }
                Ok(PersistentList::new().add(concatenate_all(&values, encoding)?))
            }
            ValueExpression::Nth { values, indices } => {
                let values = values.eval(graph, &encoding)?;
                let indices = indices.eval(graph, &encoding)?;
                let mut selected = Vec::with_capacity(indices.len());
                for index in indices.iter() {
                    let logical = match index {
                        Some(index) => index.as_u64()?.and_then(|i| usize::try_from(i).ok()),
                        None => None,
                    };
                    let value = logical
                        .filter(|&i| i < values.len())
                        .and_then(|i| values.get(values.len() - 1 - i).cloned())
                        .flatten();
                    selected.push(value);
                }
                Ok(selected.into_iter().collect())
            }
            ValueExpression::Elvis(left, right) => {
                let left = left.eval(graph, &encoding)?;
                let right = right.eval(graph, &encoding)?;
                let (mut left, mut right) = (left.iter(), right.iter());
                let mut combined = Vec::new();
                loop {
                    match (left.next(), right.next()) {
                        (None, None) => break,
                        (Some(Some(l)), _) => combined.push(Some(l.clone())),
                        (Some(None), r) => combined.push(r.cloned().flatten()),
                        (None, Some(r)) => combined.push(r.clone()),
                    }
                }
                Ok(combined.into_iter().collect())
            }
            ValueExpression::Expand { base, count } => {
                let base = base.eval(graph, &encoding)?;
                let count = single_index(count, graph, encoding, "expansion count")?;
                Ok((0..count).fold(PersistentList::new(), |expanded, _| expanded.add_all(&base)))
            }
            ValueExpression::FoldLeft {
                values,
                reducer,
                initial,
            } => fold(values, *reducer, initial.as_deref(), graph, encoding, true),
            ValueExpression::FoldRight {
                values,
                reducer,
                initial,
            } => fold(values, *reducer, initial.as_deref(), graph, encoding, false),
        }
    }

    /// Evaluates to exactly one present value.
    ///
    /// # Errors
    ///
    /// Fails with [`EvaluationError::NotSingle`] if there are zero, several
    /// or only absent results.
    pub fn eval_single(&self, graph: &ParseGraph, encoding: &Encoding, role: &'static str) -> MetalResult<Value> {
        let values = self.eval(graph, encoding)?;
        match (values.len(), values.head()) {
            (1, Some(Some(value))) => Ok(value.clone()),
            (count, _) => {
                let present = values.iter().filter(|value| value.is_some()).count();
                log::debug!("{role} evaluated to {count} results, {present} present");
                Err(EvaluationError::not_single(role, count, present).into())
            }
        }
    }
}

fn single(value: Value) -> Values {
    PersistentList::new().add(Some(value))
}

/// Evaluates to a single present non-negative integer that fits `usize`.
pub(crate) fn single_index(
    expression: &ValueExpression,
    graph: &ParseGraph,
    encoding: Encoding,
    role: &'static str,
) -> MetalResult<usize> {
    let number = expression.eval_single(graph, &encoding, role)?.as_numeric()?;
    if number.is_negative() {
        log::debug!("{role} is negative: {number}");
        return Err(EvaluationError::OutOfRange {
            role,
            value: number.to_string(),
        }
        .into());
    }
    number.to_usize().ok_or_else(|| {
        EvaluationError::OutOfRange {
            role,
            value: number.to_string(),
        }
        .into()
    })
}

/// Reverses `input` onto `output`, wrapping every match as a present value.
fn wrap<'a>(input: PersistentList<ParseValue>, output: Values) -> Trampoline<'a, Values> {
    match input.split() {
        None => Trampoline::complete(output),
        Some((head, tail)) => {
            let output = output.add(Some(Value::from(head.clone())));
            let tail = tail.clone();
            Trampoline::intermediate(move || wrap(tail, output))
        }
    }
}

fn map_present<F>(values: &Values, op: F) -> MetalResult<Values>
where
    F: Fn(&Value) -> MetalResult<Option<Value>>,
{
    let mut mapped = Vec::with_capacity(values.len());
    for value in values.iter() {
        mapped.push(match value {
            Some(value) => op(value)?,
            None => None,
        });
    }
    Ok(mapped.into_iter().collect())
}

type Combine<'a> = dyn Fn(&Value, &Value) -> MetalResult<Option<Value>> + 'a;

/// Combines both lists pairwise from their heads into `result`, then pads
/// with one absent value per leftover element and reverses.
fn broadcast<'a>(
    left: Values,
    right: Values,
    result: Values,
    combine: &'a Combine<'a>,
) -> Trampoline<'a, MetalResult<Values>> {
    let (Some((l, left_tail)), Some((r, right_tail))) = (left.split(), right.split()) else {
        let padding = left.len().abs_diff(right.len());
        return Trampoline::complete(Ok(pad(result, padding).compute_result().reverse()));
    };
    let combined = match (l, r) {
        (Some(l), Some(r)) => match combine(l, r) {
            Ok(value) => value,
            Err(err) => return Trampoline::complete(Err(err)),
        },
        _ => None,
    };
    let result = result.add(combined);
    let (left_tail, right_tail) = (left_tail.clone(), right_tail.clone());
    Trampoline::intermediate(move || broadcast(left_tail, right_tail, result, combine))
}

fn pad<'a>(list: Values, count: usize) -> Trampoline<'a, Values> {
    if count == 0 {
        return Trampoline::complete(list);
    }
    let list = list.add(None);
    Trampoline::intermediate(move || pad(list, count - 1))
}

fn fold(
    values: &ValueExpression,
    reducer: Reducer,
    initial: Option<&ValueExpression>,
    graph: &ParseGraph,
    encoding: Encoding,
    left: bool,
) -> MetalResult<Values> {
    let initial = match initial {
        Some(initial) => {
            let initial = initial.eval(graph, &encoding)?;
            if initial.len() > 1 {
                log::debug!("fold initial evaluated to {} results", initial.len());
                return Err(EvaluationError::not_single(
                    "fold initial",
                    initial.len(),
                    initial.iter().filter(|value| value.is_some()).count(),
                )
                .into());
            }
            initial
        }
        None => PersistentList::new(),
    };
    let values = values.eval(graph, &encoding)?;
    if values.is_empty() {
        if initial.is_empty() {
            return Ok(PersistentList::new().add(None));
        }
        return Ok(initial);
    }
    if values.iter().chain(initial.iter()).any(Option::is_none) {
        return Ok(PersistentList::new().add(None));
    }
    // fold left starts at the logical first element, the deepest in the tail
    let ordered = if left { values.reverse() } else { values };
    let mut present = ordered.iter().flatten();
    let mut acc = match initial.head().cloned().flatten() {
        Some(initial) => initial,
        None => match present.next() {
            Some(first) => first.clone(),
            None => return Ok(initial),
        },
    };
    for next in present {
        let (a, b) = if left {
            (acc, next.clone())
        } else {
            (next.clone(), acc)
        };
        let reduced = reducer(ValueExpression::Const(a), ValueExpression::Const(b));
        acc = reduced.eval_single(graph, &encoding, "fold reduction")?;
    }
    Ok(single(acc))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::slice::Slice;
    use crate::data::source::Source;

    fn nums(values: &Values) -> Vec<Option<i64>> {
        values
            .iter()
            .map(|value| {
                value
                    .as_ref()
                    .map(|value| value.as_numeric().unwrap().to_i64().unwrap())
            })
            .collect()
    }

    /// Graph with one value named `name` per byte, parsed in order.
    fn graph_of(name: &str, bytes: &[u8]) -> ParseGraph {
        let token = Token::def(name, ValueExpression::con_int(1)).unwrap();
        let source = Source::constant(bytes.to_vec());
        (0..bytes.len() as u64).fold(ParseGraph::EMPTY, |graph, offset| {
            let slice = Slice::create(source.clone(), offset, 1).unwrap().unwrap();
            graph.add_value(ParseValue::new(name, token.clone(), slice, Encoding::default()))
        })
    }

    fn eval(expression: &ValueExpression, graph: &ParseGraph) -> Values {
        expression.eval(graph, &Encoding::default()).unwrap()
    }

    fn add_reducer(left: ValueExpression, right: ValueExpression) -> ValueExpression {
        ValueExpression::add(left, right)
    }

    fn sub_reducer(left: ValueExpression, right: ValueExpression) -> ValueExpression {
        ValueExpression::sub(left, right)
    }

    #[test]
    fn references_are_most_recent_first() {
        let graph = graph_of("a", &[1, 2, 3]);
        assert_eq!(
            nums(&eval(&ValueExpression::ref_name("a"), &graph)),
            vec![Some(3), Some(2), Some(1)]
        );
        let limited = ValueExpression::ref_name_limit("a", ValueExpression::con_int(2));
        assert_eq!(nums(&eval(&limited, &graph)), vec![Some(3), Some(2)]);
        assert!(eval(&ValueExpression::ref_name("b"), &graph).is_empty());
    }

    #[test]
    fn reference_limit_must_be_single() {
        let graph = graph_of("a", &[1, 2]);
        let limit = ValueExpression::ref_name_limit("a", ValueExpression::ref_name("a"));
        assert!(matches!(
            limit.eval(&graph, &Encoding::default()),
            Err(crate::MetalError::Evaluation(EvaluationError::NotSingle { count: 2, .. }))
        ));
        let negative = ValueExpression::ref_name_limit("a", ValueExpression::con_int(-1));
        assert!(matches!(
            negative.eval(&graph, &Encoding::default()),
            Err(crate::MetalError::Evaluation(EvaluationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn broadcast_pads_with_absent_values() {
        let graph = graph_of("a", &[3, 2, 1]);
        // head of the reference is the most recent value, 1
        let expression = ValueExpression::add(
            ValueExpression::ref_name("a"),
            ValueExpression::con_int(10),
        );
        assert_eq!(nums(&eval(&expression, &graph)), vec![Some(11), None, None]);
        let swapped = ValueExpression::add(
            ValueExpression::con_int(10),
            ValueExpression::ref_name("a"),
        );
        assert_eq!(nums(&eval(&swapped, &graph)), vec![Some(11), None, None]);
    }

    #[test]
    fn absent_operands_propagate() {
        let graph = ParseGraph::EMPTY;
        let expression = ValueExpression::add(ValueExpression::Current, ValueExpression::con_int(1));
        assert_eq!(nums(&eval(&expression, &graph)), vec![None]);
        let div = ValueExpression::binary(
            BinaryOp::Div,
            ValueExpression::con_int(1),
            ValueExpression::con_int(0),
        );
        assert_eq!(nums(&eval(&div, &graph)), vec![None]);
    }

    #[test]
    fn list_operations() {
        let graph = graph_of("a", &[1, 2, 3]);
        let a = || Box::new(ValueExpression::ref_name("a"));
        assert_eq!(nums(&eval(&ValueExpression::Count(a()), &graph)), vec![Some(3)]);
        assert_eq!(nums(&eval(&ValueExpression::First(a()), &graph)), vec![Some(1)]);
        assert_eq!(nums(&eval(&ValueExpression::Last(a()), &graph)), vec![Some(3)]);
        assert_eq!(
            nums(&eval(&ValueExpression::Reverse(a()), &graph)),
            vec![Some(1), Some(2), Some(3)]
        );
        assert!(eval(&ValueExpression::First(Box::new(ValueExpression::Empty)), &graph).is_empty());
        assert_eq!(
            nums(&eval(&ValueExpression::Count(Box::new(ValueExpression::Empty)), &graph)),
            vec![Some(0)]
        );
    }

    #[test]
    fn nth_counts_from_logical_first() {
        let graph = graph_of("a", &[7, 8, 9]);
        let nth = |index| ValueExpression::nth(ValueExpression::ref_name("a"), ValueExpression::con_int(index));
        assert_eq!(nums(&eval(&nth(0), &graph)), vec![Some(7)]);
        assert_eq!(nums(&eval(&nth(2), &graph)), vec![Some(9)]);
        assert_eq!(nums(&eval(&nth(3), &graph)), vec![None]);
        assert_eq!(nums(&eval(&nth(-1), &graph)), vec![None]);
    }

    #[test]
    fn nth_keeps_index_order() {
        // logical values 0, 2, 1; the indices list is [1, 2, 0] from its head
        let graph = graph_of("a", &[0, 2, 1]);
        let nth = ValueExpression::nth(ValueExpression::ref_name("a"), ValueExpression::ref_name("a"));
        assert_eq!(nums(&eval(&nth, &graph)), vec![Some(2), Some(1), Some(0)]);
    }

    #[test]
    fn elvis_prefers_left() {
        let graph = graph_of("a", &[1, 2]);
        let left = ValueExpression::add(ValueExpression::ref_name("a"), ValueExpression::con_int(10));
        let elvis = ValueExpression::elvis(left, ValueExpression::ref_name("a"));
        assert_eq!(nums(&eval(&elvis, &graph)), vec![Some(12), Some(1)]);
        let longer = ValueExpression::elvis(ValueExpression::con_int(5), ValueExpression::ref_name("a"));
        assert_eq!(nums(&eval(&longer, &graph)), vec![Some(5), Some(1)]);
    }

    #[test]
    fn expand_repeats() {
        let graph = graph_of("a", &[1, 2]);
        let expand = ValueExpression::expand(ValueExpression::ref_name("a"), ValueExpression::con_int(2));
        assert_eq!(
            nums(&eval(&expand, &graph)),
            vec![Some(2), Some(1), Some(2), Some(1)]
        );
        let bad = ValueExpression::expand(ValueExpression::con_int(1), ValueExpression::ref_name("a"));
        assert!(bad.eval(&graph, &Encoding::default()).is_err());
    }

    #[test]
    fn bytes_and_concatenation() {
        let graph = ParseGraph::EMPTY;
        let joined = ValueExpression::cat(
            ValueExpression::con_bytes(vec![1, 2]),
            ValueExpression::con_bytes(vec![3]),
        );
        let split = eval(&ValueExpression::Bytes(Box::new(joined.clone())), &graph);
        // logical order 1, 2, 3: the head holds the last byte
        assert_eq!(nums(&split), vec![Some(3), Some(2), Some(1)]);
        let rejoined = eval(&ValueExpression::CatAll(Box::new(ValueExpression::Bytes(Box::new(joined)))), &graph);
        let rejoined = rejoined.head().cloned().flatten().unwrap();
        assert_eq!(&*rejoined.bytes().unwrap(), &[1, 2, 3]);
        let empty = eval(&ValueExpression::CatAll(Box::new(ValueExpression::Empty)), &graph);
        assert!(empty.is_empty());
    }

    #[test]
    fn folds() {
        let graph = graph_of("a", &[10, 3, 2]);
        let left = ValueExpression::fold_left(ValueExpression::ref_name("a"), sub_reducer, None);
        // (10 - 3) - 2
        assert_eq!(nums(&eval(&left, &graph)), vec![Some(5)]);
        let right = ValueExpression::fold_right(ValueExpression::ref_name("a"), sub_reducer, None);
        // 10 - (3 - 2), reduced from the head as next - acc
        assert_eq!(nums(&eval(&right, &graph)), vec![Some(9)]);
        let seeded = ValueExpression::fold_left(
            ValueExpression::ref_name("a"),
            add_reducer,
            Some(ValueExpression::con_int(100)),
        );
        assert_eq!(nums(&eval(&seeded, &graph)), vec![Some(115)]);
        let single = ValueExpression::fold_left(ValueExpression::ref_name_limit("a", ValueExpression::con_int(1)), add_reducer, None);
        assert_eq!(nums(&eval(&single, &graph)), vec![Some(2)]);
        let empty = ValueExpression::fold_left(ValueExpression::ref_name("b"), add_reducer, None);
        assert_eq!(nums(&eval(&empty, &graph)), vec![None]);
        let counted = ValueExpression::Count(Box::new(empty));
        assert_eq!(nums(&eval(&counted, &graph)), vec![Some(1)]);
        let empty_seeded = ValueExpression::fold_right(
            ValueExpression::ref_name("b"),
            add_reducer,
            Some(ValueExpression::con_int(7)),
        );
        assert_eq!(nums(&eval(&empty_seeded, &graph)), vec![Some(7)]);
        let absent = ValueExpression::fold_left(ValueExpression::Current, add_reducer, None);
        assert_eq!(nums(&eval(&absent, &ParseGraph::EMPTY)), vec![None]);
    }

    #[test]
    fn constants_ignore_graph() {
        let one = ValueExpression::con_int(1);
        assert_eq!(nums(&eval(&one, &ParseGraph::EMPTY)), vec![Some(1)]);
        assert_eq!(nums(&eval(&one, &graph_of("a", &[5]))), vec![Some(1)]);
        assert_eq!(nums(&eval(&ValueExpression::con_int(-3), &ParseGraph::EMPTY)), vec![Some(-3)]);
    }
}
