//! Persistent trace of parse results
//!
//! A [`ParseGraph`] is an append-only stack of [`ParseItem`]s: matched
//! values, nested graphs produced by composite tokens, and references to
//! structures parsed earlier. Adding an item returns a new graph that shares
//! the old one as its tail; the old graph is never modified.
//!
//! # Branches
//!
//! Composite tokens bracket their children with
//! [`add_branch`](ParseGraph::add_branch) and
//! [`close_branch`](ParseGraph::close_branch). An open branch is a nested
//! graph at the head of its parent that still receives new items; all
//! additions descend into the innermost open branch. Closing it freezes the
//! nested graph. Discarding a speculative branch needs no undo step: the
//! caller simply keeps the graph it had before the branch was opened.

use std::fmt::Debug;
use std::sync::Arc;

#[cfg(feature = "serde_impls")]
use serde::Serialize;

use crate::data::list::PersistentList;
use crate::data::source::Source;
use crate::data::value::ParseValue;
use crate::error::{InternalError, MetalResult};
use crate::token::Token;

/// Element of a [`ParseGraph`].
#[derive(Clone, PartialEq, Eq)]
pub enum ParseItem {
    Value(ParseValue),
    Graph(ParseGraph),
    Reference(ParseReference),
}

impl ParseItem {
    /// Token that produced this item, if any.
    #[must_use]
    pub fn definition(&self) -> Option<&Token> {
        match self {
            ParseItem::Value(value) => Some(value.definition()),
            ParseItem::Graph(graph) => graph.definition(),
            ParseItem::Reference(reference) => Some(&reference.definition),
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&ParseValue> {
        match self {
            ParseItem::Value(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_graph(&self) -> Option<&ParseGraph> {
        match self {
            ParseItem::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&ParseReference> {
        match self {
            ParseItem::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

impl Debug for ParseItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseItem::Value(value) => Debug::fmt(value, f),
            ParseItem::Graph(graph) => Debug::fmt(graph, f),
            ParseItem::Reference(reference) => Debug::fmt(reference, f),
        }
    }
}

/// Marks that the structure defined by `definition` and anchored at
/// `location` of `source` was parsed before and is reused here.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseReference {
    pub location: u64,
    pub source: Source,
    pub definition: Token,
}

impl ParseReference {
    #[must_use]
    pub fn new(location: u64, source: Source, definition: Token) -> Self {
        Self {
            location,
            source,
            definition,
        }
    }

    /// Looks up the graph this reference points to within `root`.
    ///
    /// Returns `Ok(None)` if `root` holds no such graph.
    pub fn resolve(&self, root: &ParseGraph) -> MetalResult<Option<ParseGraph>> {
        crate::data::selection::find_graph_at_offset(
            root,
            |graph| graph.definition() == Some(&self.definition),
            &self.source,
            self.location,
        )
    }
}

impl Debug for ParseReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pref({:?}@{})", self.definition, self.location)
    }
}

struct GraphNode {
    head: ParseItem,
    tail: ParseGraph,
    size: usize,
}

/// Immutable, structurally shared parse trace.
///
/// While branches are open the graph is held inside out: the items of the
/// innermost open branch, and the list of enclosing levels as they were
/// when each opened its branch. Adding an item, opening a branch and
/// closing one touch only the innermost level.
#[derive(Clone)]
pub struct ParseGraph {
    /// Items of the innermost open level, most recent first
    node: Option<Arc<GraphNode>>,
    /// Token that opened the innermost open level
    innermost: Option<Token>,
    /// Levels holding an open branch, innermost first, each without it
    enclosing: PersistentList<ParseGraph>,
    /// Number of `enclosing` levels that are part of this graph
    depth: usize,
    /// Token that produced the outermost level
    definition: Option<Token>,
}

impl ParseGraph {
    /// The empty root graph, which has no definition
    pub const EMPTY: ParseGraph = ParseGraph {
        node: None,
        innermost: None,
        enclosing: PersistentList::new(),
        depth: 0,
        definition: None,
    };

    fn level(node: Option<Arc<GraphNode>>, definition: Option<Token>) -> Self {
        Self {
            node,
            innermost: definition.clone(),
            enclosing: PersistentList::new(),
            depth: 0,
            definition,
        }
    }

    fn level_size(&self) -> usize {
        self.node.as_ref().map_or(0, |node| node.size)
    }

    /// The innermost open level on its own, without anything it is nested in.
    pub(crate) fn frontier(&self) -> ParseGraph {
        Self::level(self.node.clone(), self.innermost.clone())
    }

    /// Token that opened the innermost open level.
    pub(crate) fn innermost(&self) -> Option<&Token> {
        self.innermost.as_ref()
    }

    /// Enclosing open levels, innermost first. Only the first
    /// [`open_depth`](Self::open_depth) of them belong to this graph.
    pub(crate) fn enclosing(&self) -> &PersistentList<ParseGraph> {
        &self.enclosing
    }

    pub(crate) fn open_depth(&self) -> usize {
        self.depth
    }

    /// Most recent item of the innermost open level.
    pub(crate) fn newest(&self) -> Option<&ParseItem> {
        self.node.as_ref().map(|node| &node.head)
    }

    /// The innermost open level without its most recent item.
    pub(crate) fn older(&self) -> ParseGraph {
        match &self.node {
            Some(node) => node.tail.clone(),
            None => self.frontier(),
        }
    }

    /// The open branch `depth` levels above the innermost one, seen as a
    /// graph of its own that was produced by `definition`.
    pub(crate) fn view(&self, depth: usize, definition: Option<Token>) -> ParseGraph {
        Self {
            node: self.node.clone(),
            innermost: self.innermost.clone(),
            enclosing: if depth == 0 {
                PersistentList::new()
            } else {
                self.enclosing.clone()
            },
            depth,
            definition,
        }
    }

    /// The outermost level as stored when it opened its branch.
    fn outermost(&self) -> ParseGraph {
        match self.depth.checked_sub(1) {
            Some(index) => self.enclosing.get(index).cloned().unwrap_or_default(),
            None => self.clone(),
        }
    }

    /// The open branch at the head of the outermost level.
    fn open_head(&self) -> Option<ParseGraph> {
        let depth = self.depth.checked_sub(1)?;
        let definition = match depth.checked_sub(1) {
            Some(index) => self.enclosing.get(index).and_then(|level| level.innermost.clone()),
            None => self.innermost.clone(),
        };
        Some(self.view(depth, definition))
    }

    fn push(&self, head: ParseItem) -> Self {
        let tail = self.frontier();
        let size = tail.level_size() + 1;
        Self {
            node: Some(Arc::new(GraphNode { head, tail, size })),
            innermost: self.innermost.clone(),
            enclosing: self.enclosing.clone(),
            depth: self.depth,
            definition: self.definition.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depth == 0 && self.node.is_none()
    }

    /// Number of items at the outermost level, not counting nested ones.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.depth {
            0 => self.level_size(),
            _ => self.outermost().level_size() + 1,
        }
    }

    /// Most recent item at the outermost level.
    #[must_use]
    pub fn head(&self) -> Option<ParseItem> {
        match self.open_head() {
            Some(open) => Some(ParseItem::Graph(open)),
            None => self.newest().cloned(),
        }
    }

    /// The graph without its most recent item.
    #[must_use]
    pub fn tail(&self) -> ParseGraph {
        match self.depth {
            0 => self.older(),
            _ => self.outermost(),
        }
    }

    /// Token whose parse produced this graph; `None` for the root.
    #[must_use]
    pub fn definition(&self) -> Option<&Token> {
        self.definition.as_ref()
    }

    /// Returns `true` if this graph has an open branch at its head.
    #[must_use]
    pub fn is_branched(&self) -> bool {
        self.depth > 0
    }

    /// Iterates over the items at the outermost level, most recent first.
    pub fn items(&self) -> Items {
        let (open, stored) = match self.open_head() {
            Some(open) => (Some(ParseItem::Graph(open)), self.outermost()),
            None => (None, self.clone()),
        };
        Items {
            open,
            cur: stored.node.clone(),
        }
    }

    /// Adds a value to the innermost open branch.
    #[must_use]
    pub fn add_value(&self, value: ParseValue) -> Self {
        self.push(ParseItem::Value(value))
    }

    /// Adds a reference to the innermost open branch.
    #[must_use]
    pub fn add_reference(&self, reference: ParseReference) -> Self {
        self.push(ParseItem::Reference(reference))
    }

    /// Opens a new, empty branch defined by `definition` inside the
    /// innermost open branch.
    #[must_use]
    pub fn add_branch(&self, definition: Token) -> Self {
        Self {
            node: None,
            innermost: Some(definition),
            enclosing: self.enclosing.add(self.frontier()),
            depth: self.depth + 1,
            definition: self.definition.clone(),
        }
    }

    /// Closes the innermost open branch.
    ///
    /// # Errors
    ///
    /// Fails if no branch is open, or if the innermost open branch was
    /// opened by a token other than `definition`.
    pub fn close_branch(&self, definition: &Token) -> MetalResult<Self> {
        let Some((parent, outer)) = self.enclosing.split().filter(|_| self.depth > 0) else {
            return Err(InternalError::CloseWithoutBranch.into());
        };
        if self.innermost.as_ref() != Some(definition) {
            log::trace!("closing {definition:?} while {:?} is open", self.innermost);
            return Err(InternalError::BranchMismatch {
                expected: format!("{definition:?}"),
                actual: format!("{:?}", self.innermost),
            }
            .into());
        }
        let depth = self.depth - 1;
        let reopened = Self {
            node: parent.node.clone(),
            innermost: parent.innermost.clone(),
            enclosing: if depth == 0 {
                PersistentList::new()
            } else {
                outer.clone()
            },
            depth,
            definition: self.definition.clone(),
        };
        Ok(reopened.push(ParseItem::Graph(self.frontier())))
    }

    /// Most recently added value, searching nested graphs before older items.
    #[must_use]
    pub fn current(&self) -> Option<ParseValue> {
        crate::data::selection::get_all_values(self, |_| true, Some(1))
            .head()
            .cloned()
    }

    /// Returns `true` if this graph or any nested graph holds a value.
    #[must_use]
    pub fn contains_value(&self) -> bool {
        self.current().is_some()
    }

    /// All values in this graph and its nested graphs, most recent first.
    #[must_use]
    pub fn values(&self) -> PersistentList<ParseValue> {
        crate::data::selection::get_all_values(self, |_| true, None)
    }

    /// All nested graphs at any depth, most recent first.
    #[must_use]
    pub fn graphs(&self) -> PersistentList<ParseGraph> {
        crate::data::selection::get_all_graphs(self)
    }

    /// All references at any depth, most recent first.
    #[must_use]
    pub fn references(&self) -> PersistentList<ParseReference> {
        crate::data::selection::get_all_references(self)
    }

    /// The value with the lowest offset in this graph or any nested graph.
    /// Among equal offsets, the earliest added value wins.
    ///
    /// # Errors
    ///
    /// Fails if the graph holds no value at all.
    pub fn lowest_offset_value(&self) -> MetalResult<ParseValue> {
        self.values()
            .iter()
            .fold(None, |lowest: Option<&ParseValue>, value| match lowest {
                Some(lowest) if lowest.offset() < value.offset() => Some(lowest),
                _ => Some(value),
            })
            .cloned()
            .ok_or_else(|| InternalError::NoValueInGraph.into())
    }
}

impl Default for ParseGraph {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Drop for ParseGraph {
    // Nested graphs and long tails are unlinked through an explicit
    // work-list instead of recursive drop glue.
    fn drop(&mut self) {
        let mut pending: Vec<Arc<GraphNode>> = self.node.take().into_iter().collect();
        while let Some(node) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(node) {
                pending.extend(node.tail.node.take());
                if let ParseItem::Graph(inner) = &mut node.head {
                    pending.extend(inner.node.take());
                }
            }
        }
    }
}

impl PartialEq for ParseGraph {
    fn eq(&self, other: &Self) -> bool {
        let mut pending: Vec<(ParseGraph, ParseGraph)> = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = pending.pop() {
            if left.depth != right.depth || left.definition != right.definition {
                return false;
            }
            if left.depth > 0 {
                pending.push((left.frontier(), right.frontier()));
                let levels = left.enclosing.iter().zip(right.enclosing.iter()).take(left.depth);
                pending.extend(levels.map(|(a, b)| (a.clone(), b.clone())));
                continue;
            }
            if left.level_size() != right.level_size() {
                return false;
            }
            match (&left.node, &right.node) {
                (None, None) => {}
                (Some(a), Some(b)) if Arc::ptr_eq(a, b) => {}
                (Some(a), Some(b)) => {
                    match (&a.head, &b.head) {
                        (ParseItem::Graph(x), ParseItem::Graph(y)) => {
                            pending.push((x.clone(), y.clone()));
                        }
                        (ParseItem::Value(x), ParseItem::Value(y)) if x == y => {}
                        (ParseItem::Reference(x), ParseItem::Reference(y)) if x == y => {}
                        _ => return false,
                    }
                    pending.push((a.tail.clone(), b.tail.clone()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for ParseGraph {}

impl Debug for ParseGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("pgraph(")?;
        if let Some(definition) = &self.definition {
            write!(f, "{definition:?}:")?;
        }
        let items: Vec<ParseItem> = self.items().collect();
        f.debug_list().entries(items.iter().rev()).finish()?;
        f.write_str(")")
    }
}

/// Iterator over the items at the outermost level of a [`ParseGraph`].
pub struct Items {
    open: Option<ParseItem>,
    cur: Option<Arc<GraphNode>>,
}

impl Iterator for Items {
    type Item = ParseItem;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(open) = self.open.take() {
            return Some(open);
        }
        let node = self.cur.take()?;
        self.cur = node.tail.node.clone();
        Some(node.head.clone())
    }
}

#[cfg(feature = "serde_impls")]
impl Serialize for ParseItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParseItem::Value(value) => serializer.serialize_newtype_variant("ParseItem", 0, "Value", value),
            ParseItem::Graph(graph) => serializer.serialize_newtype_variant("ParseItem", 1, "Graph", graph),
            ParseItem::Reference(reference) => {
                serializer.serialize_newtype_variant("ParseItem", 2, "Reference", reference)
            }
        }
    }
}

#[cfg(feature = "serde_impls")]
impl Serialize for ParseReference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ParseReference", 2)?;
        state.serialize_field("location", &self.location)?;
        state.serialize_field("definition", self.definition.name())?;
        state.end()
    }
}

#[cfg(feature = "serde_impls")]
impl Serialize for ParseGraph {
    /// Serializes the items at this level in the order they were added.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let items: Vec<ParseItem> = self.items().collect();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter().rev() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::slice::Slice;
    use crate::encoding::Encoding;
    use crate::expression::value::ValueExpression;

    fn def(name: &str) -> Token {
        Token::def(name, ValueExpression::con_int(1)).unwrap()
    }

    fn pval(token: &Token, offset: u64) -> ParseValue {
        let source = Source::constant(vec![0u8; 16]);
        let slice = Slice::create(source, offset, 1).unwrap().unwrap();
        ParseValue::new(token.name(), token.clone(), slice, Encoding::default())
    }

    #[test]
    fn add_never_alters_original() {
        let a = def("a");
        let g = ParseGraph::EMPTY.add_value(pval(&a, 0));
        let g1 = g.add_value(pval(&a, 1));
        let g2 = g.add_value(pval(&a, 2));
        assert_eq!(g.size(), 1);
        assert_eq!(g1.size(), 2);
        assert_eq!(g2.size(), 2);
        assert_eq!(g1.tail(), g);
        assert_eq!(g1.current().unwrap().offset(), 1);
        assert_eq!(g2.current().unwrap().offset(), 2);
    }

    #[test]
    fn branches_nest_and_close() {
        let outer = def("outer");
        let inner = def("inner");
        let value = def("v");
        let g = ParseGraph::EMPTY
            .add_branch(outer.clone())
            .add_value(pval(&value, 0))
            .add_branch(inner.clone())
            .add_value(pval(&value, 1));
        assert!(g.is_branched());
        assert_eq!(g.size(), 1);
        assert!(matches!(
            g.close_branch(&outer),
            Err(crate::MetalError::Internal(InternalError::BranchMismatch { .. }))
        ));
        let g = g.close_branch(&inner).unwrap();
        let g = g.add_value(pval(&value, 2)).close_branch(&outer).unwrap();
        assert!(!g.is_branched());
        let Some(ParseItem::Graph(outer_graph)) = g.head() else {
            panic!("expected the closed outer branch at the head");
        };
        assert_eq!(outer_graph.definition(), Some(&outer));
        assert_eq!(outer_graph.size(), 3);
        assert_eq!(g.values().len(), 3);
        assert_eq!(g.graphs().len(), 2);
        assert!(matches!(
            g.close_branch(&outer),
            Err(crate::MetalError::Internal(InternalError::CloseWithoutBranch))
        ));
    }

    #[test]
    fn current_descends_into_nested_graphs() {
        let t = def("t");
        let g = ParseGraph::EMPTY
            .add_value(pval(&t, 3))
            .add_branch(t.clone());
        assert_eq!(g.current().unwrap().offset(), 3);
        let g = g.add_value(pval(&t, 5));
        assert_eq!(g.current().unwrap().offset(), 5);
        assert!(g.contains_value());
        assert!(!ParseGraph::EMPTY.add_branch(t).contains_value());
    }

    #[test]
    fn lowest_offset() {
        let t = def("t");
        let g = ParseGraph::EMPTY
            .add_value(pval(&t, 7))
            .add_value(pval(&t, 2))
            .add_value(pval(&t, 4));
        assert_eq!(g.lowest_offset_value().unwrap().offset(), 2);
        assert!(matches!(
            ParseGraph::EMPTY.lowest_offset_value(),
            Err(crate::MetalError::Internal(InternalError::NoValueInGraph))
        ));
    }

    #[test]
    fn structural_equality() {
        let t = def("t");
        let a = ParseGraph::EMPTY.add_branch(t.clone()).add_value(pval(&t, 1));
        let b = ParseGraph::EMPTY.add_branch(t.clone()).add_value(pval(&t, 1));
        assert_eq!(a, b);
        assert_ne!(a, b.close_branch(&t).unwrap());
        assert_ne!(a, ParseGraph::EMPTY.add_branch(def("t")).add_value(pval(&t, 1)));
    }

    #[test]
    fn open_branches_are_items_of_their_parent() {
        let outer = def("outer");
        let inner = def("inner");
        let g = ParseGraph::EMPTY
            .add_value(pval(&outer, 0))
            .add_branch(outer.clone())
            .add_value(pval(&outer, 1))
            .add_branch(inner.clone())
            .add_value(pval(&inner, 2));
        assert_eq!(g.size(), 2);
        assert_eq!(g.tail(), ParseGraph::EMPTY.add_value(pval(&outer, 0)));
        let Some(ParseItem::Graph(open)) = g.head() else {
            panic!("expected the open outer branch at the head");
        };
        assert_eq!(open.definition(), Some(&outer));
        assert!(open.is_branched());
        assert_eq!(open.values().len(), 2);
        let closed = g.close_branch(&inner).unwrap().close_branch(&outer).unwrap();
        let Some(ParseItem::Graph(closed_outer)) = closed.head() else {
            panic!("expected the closed outer branch at the head");
        };
        assert_eq!(closed_outer.values().len(), 2);
        assert_eq!(closed.items().count(), 2);
    }

    #[test]
    fn deep_nesting_opens_and_closes() {
        let t = def("t");
        let depth = 100_000;
        let mut g = ParseGraph::EMPTY;
        for offset in 0..depth {
            g = g.add_branch(t.clone()).add_value(pval(&t, offset % 16));
        }
        assert_eq!(g.current().unwrap().offset(), (depth - 1) % 16);
        for _ in 0..depth {
            g = g.close_branch(&t).unwrap();
        }
        assert!(!g.is_branched());
        assert_eq!(g.size(), 1);
        assert_eq!(g.values().len(), depth as usize);
    }

    #[test]
    fn deep_graphs_drop_and_compare() {
        let t = def("t");
        let mut a = ParseGraph::EMPTY;
        let mut b = ParseGraph::EMPTY;
        for _ in 0..100_000 {
            a = a.add_value(pval(&t, 0));
            b = b.add_value(pval(&t, 0));
        }
        assert_eq!(a, b);
        assert_eq!(a.values().len(), 100_000);
    }
}
