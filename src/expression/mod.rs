//! Expressions over the parse graph
//!
//! Two families of expressions exist. [`ValueExpression`]s compute lists of
//! optional values and are used for sizes, counts, addresses and derived
//! data. [`Expression`]s compute a single boolean and are used as
//! predicates by tokens.
//!
//! A comparison checks a list of current values against a list of
//! predicate values pairwise. The current values default to the most
//! recently parsed value. A comparison holds only if both lists are
//! non-empty and of equal length, every pair is present, and every pair
//! satisfies the comparison.

pub mod ops;
pub mod value;

use std::cmp::Ordering;

use crate::data::graph::ParseGraph;
use crate::data::value::Value;
use crate::encoding::Encoding;
use crate::error::MetalResult;
use value::ValueExpression;

/// Relation checked by a comparison expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Equal bytes
    Eq,
    /// Equal numeric interpretations
    EqNum,
    /// Equal string interpretations
    EqStr,
    GtNum,
    LtNum,
    GtEqNum,
    LtEqNum,
}

impl Comparison {
    fn holds(self, current: &Value, predicate: &Value) -> MetalResult<bool> {
        Ok(match self {
            Comparison::Eq => current.bytes()? == predicate.bytes()?,
            Comparison::EqStr => current.as_string()? == predicate.as_string()?,
            Comparison::EqNum
            | Comparison::GtNum
            | Comparison::LtNum
            | Comparison::GtEqNum
            | Comparison::LtEqNum => {
                let ordering = current.as_numeric()?.cmp(&predicate.as_numeric()?);
                match self {
                    Comparison::EqNum => ordering == Ordering::Equal,
                    Comparison::GtNum => ordering == Ordering::Greater,
                    Comparison::LtNum => ordering == Ordering::Less,
                    Comparison::GtEqNum => ordering != Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        })
    }
}

/// Boolean expression.
#[derive(Clone, Debug)]
pub enum Expression {
    True,
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Compare {
        comparison: Comparison,
        /// Defaults to the most recently parsed value when `None`
        current: Option<ValueExpression>,
        predicate: ValueExpression,
    },
}

impl Expression {
    #[must_use]
    pub fn not(operand: Expression) -> Self {
        Self::Not(Box::new(operand))
    }

    #[must_use]
    pub fn and(left: Expression, right: Expression) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Expression, right: Expression) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// Compares the most recently parsed value against `predicate`.
    #[must_use]
    pub fn compare(comparison: Comparison, predicate: ValueExpression) -> Self {
        Self::Compare {
            comparison,
            current: None,
            predicate,
        }
    }

    /// Compares `current` against `predicate`.
    #[must_use]
    pub fn compare_with(comparison: Comparison, current: ValueExpression, predicate: ValueExpression) -> Self {
        Self::Compare {
            comparison,
            current: Some(current),
            predicate,
        }
    }

    #[must_use]
    pub fn eq(predicate: ValueExpression) -> Self {
        Self::compare(Comparison::Eq, predicate)
    }

    #[must_use]
    pub fn eq_num(predicate: ValueExpression) -> Self {
        Self::compare(Comparison::EqNum, predicate)
    }

    #[must_use]
    pub fn eq_str(predicate: ValueExpression) -> Self {
        Self::compare(Comparison::EqStr, predicate)
    }

    #[must_use]
    pub fn gt_num(predicate: ValueExpression) -> Self {
        Self::compare(Comparison::GtNum, predicate)
    }

    #[must_use]
    pub fn lt_num(predicate: ValueExpression) -> Self {
        Self::compare(Comparison::LtNum, predicate)
    }

    /// Evaluates this expression against `graph`.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from evaluating the value expressions
    /// involved.
    pub fn eval(&self, graph: &ParseGraph, encoding: &Encoding) -> MetalResult<bool> {
        match self {
            Expression::True => Ok(true),
            Expression::Not(operand) => Ok(!operand.eval(graph, encoding)?),
            Expression::And(left, right) => Ok(left.eval(graph, encoding)? && right.eval(graph, encoding)?),
            Expression::Or(left, right) => Ok(left.eval(graph, encoding)? || right.eval(graph, encoding)?),
            Expression::Compare {
                comparison,
                current,
                predicate,
            } => {
                let current = current
                    .as_ref()
                    .unwrap_or(&ValueExpression::Current)
                    .eval(graph, encoding)?;
                if current.is_empty() {
                    return Ok(false);
                }
                let predicate = predicate.eval(graph, encoding)?;
                if current.len() != predicate.len() {
                    return Ok(false);
                }
                for pair in current.iter().zip(predicate.iter()) {
                    let (Some(current), Some(predicate)) = pair else {
                        return Ok(false);
                    };
                    if !comparison.holds(current, predicate)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::slice::Slice;
    use crate::data::value::ParseValue;
    use crate::token::Token;

    fn graph_with(bytes: &[u8]) -> ParseGraph {
        let token = Token::def("v", ValueExpression::con_int(bytes.len() as i64)).unwrap();
        let value = ParseValue::new("v", token, Slice::from_bytes(bytes.to_vec()), Encoding::default());
        ParseGraph::EMPTY.add_value(value)
    }

    fn eval(expression: &Expression, graph: &ParseGraph) -> bool {
        expression.eval(graph, &Encoding::default()).unwrap()
    }

    #[test]
    fn logic() {
        let graph = ParseGraph::EMPTY;
        let t = Expression::True;
        let f = Expression::not(Expression::True);
        assert!(eval(&t, &graph));
        assert!(!eval(&f, &graph));
        assert!(!eval(&Expression::and(t.clone(), f.clone()), &graph));
        assert!(eval(&Expression::or(f, t), &graph));
    }

    #[test]
    fn comparisons_against_current_value() {
        let graph = graph_with(&[0x00, 0x05]);
        assert!(eval(&Expression::eq_num(ValueExpression::con_int(5)), &graph));
        assert!(!eval(&Expression::eq(ValueExpression::con_int(5)), &graph));
        assert!(eval(&Expression::eq(ValueExpression::con_bytes(vec![0, 5])), &graph));
        assert!(eval(&Expression::gt_num(ValueExpression::con_int(4)), &graph));
        assert!(!eval(&Expression::gt_num(ValueExpression::con_int(5)), &graph));
        assert!(eval(&Expression::lt_num(ValueExpression::con_int(6)), &graph));
        assert!(eval(
            &Expression::compare(Comparison::GtEqNum, ValueExpression::con_int(5)),
            &graph
        ));
        assert!(eval(
            &Expression::compare(Comparison::LtEqNum, ValueExpression::con_int(5)),
            &graph
        ));
    }

    #[test]
    fn strings() {
        let graph = graph_with(b"abc");
        assert!(eval(&Expression::eq_str(ValueExpression::con_str("abc")), &graph));
        assert!(!eval(&Expression::eq_str(ValueExpression::con_str("abd")), &graph));
    }

    #[test]
    fn shape_mismatches_are_false() {
        let graph = graph_with(&[1]);
        assert!(!eval(&Expression::eq_num(ValueExpression::con_int(1)), &ParseGraph::EMPTY));
        assert!(!eval(&Expression::eq_num(ValueExpression::Empty), &graph));
        let two = ValueExpression::expand(ValueExpression::con_int(1), ValueExpression::con_int(2));
        assert!(!eval(&Expression::eq_num(two.clone()), &graph));
        assert!(eval(
            &Expression::compare_with(Comparison::EqNum, two.clone(), two),
            &graph
        ));
        let absent = ValueExpression::binary(
            crate::expression::ops::BinaryOp::Div,
            ValueExpression::con_int(1),
            ValueExpression::con_int(0),
        );
        assert!(!eval(&Expression::eq_num(absent), &graph));
    }
}
