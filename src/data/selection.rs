//! Queries over a [`ParseGraph`]
//!
//! Graphs are not indexed; every query is a full traversal of the
//! persistent structure. Traversals keep an explicit work-list of graphs
//! still to visit and run on a [`Trampoline`], so arbitrarily long or deeply
//! nested graphs are handled in constant stack space.
//!
//! Items are visited most recent first, and a nested graph is visited
//! before the items that precede it in its parent. A branch that is still
//! open is visited after its own items, which are the most recent of all.
//! Results are returned in that order: the head of a returned list is the
//! most recently added match.

use crate::data::graph::{ParseGraph, ParseItem, ParseReference};
use crate::data::list::PersistentList;
use crate::data::source::Source;
use crate::data::value::ParseValue;
use crate::error::MetalResult;
use crate::internal::Trampoline;
use crate::token::Token;

type Visitor<'a, T> = dyn Fn(&ParseItem) -> Option<T> + 'a;

/// Work left in a traversal.
#[derive(Clone)]
enum Pending {
    /// The remaining items of a level with no open branch
    Items(ParseGraph),
    /// The open branches of `graph`, from `depth` levels above its
    /// innermost one outwards; `levels` holds the levels not yet visited
    Open {
        graph: ParseGraph,
        depth: usize,
        definition: Option<Token>,
        levels: PersistentList<ParseGraph>,
    },
}

/// Schedules the items of `graph`, innermost open level first. Each open
/// branch is visited as a graph item once its own items are done.
fn schedule(pending: PersistentList<Pending>, graph: &ParseGraph) -> PersistentList<Pending> {
    if !graph.is_branched() {
        return pending.add(Pending::Items(graph.clone()));
    }
    pending
        .add(Pending::Open {
            graph: graph.clone(),
            depth: 0,
            definition: graph.innermost().cloned(),
            levels: graph.enclosing().clone(),
        })
        .add(Pending::Items(graph.frontier()))
}

fn walk<'a, T: Clone + 'a>(
    pending: PersistentList<Pending>,
    found: PersistentList<T>,
    visit: &'a Visitor<'a, T>,
    limit: Option<usize>,
) -> Trampoline<'a, PersistentList<T>> {
    if limit.map_or(false, |limit| found.len() >= limit) {
        return Trampoline::complete(found.reverse());
    }
    let Some((task, rest)) = pending.split() else {
        return Trampoline::complete(found.reverse());
    };
    let mut next = rest.clone();
    let found = match task {
        Pending::Items(graph) => {
            let Some(head) = graph.newest() else {
                return Trampoline::intermediate(move || walk(next, found, visit, limit));
            };
            next = next.add(Pending::Items(graph.older()));
            if let ParseItem::Graph(inner) = head {
                next = schedule(next, inner);
            }
            match visit(head) {
                Some(item) => found.add(item),
                None => found,
            }
        }
        Pending::Open {
            graph,
            depth,
            definition,
            levels,
        } => {
            if let Some((level, outer)) = levels.split() {
                if depth + 1 < graph.open_depth() {
                    next = next.add(Pending::Open {
                        graph: graph.clone(),
                        depth: depth + 1,
                        definition: level.definition().cloned(),
                        levels: outer.clone(),
                    });
                }
                next = next.add(Pending::Items(level.clone()));
            }
            match visit(&ParseItem::Graph(graph.view(*depth, definition.clone()))) {
                Some(item) => found.add(item),
                None => found,
            }
        }
    };
    Trampoline::intermediate(move || walk(next, found, visit, limit))
}

fn select<T: Clone>(
    graph: &ParseGraph,
    visit: &Visitor<'_, T>,
    limit: Option<usize>,
) -> PersistentList<T> {
    walk(
        schedule(PersistentList::new(), graph),
        PersistentList::new(),
        visit,
        limit,
    )
    .compute_result()
}

/// Returns the values satisfying `predicate`, most recent first, stopping
/// after `limit` matches if a limit is given.
pub fn get_all_values<P>(graph: &ParseGraph, predicate: P, limit: Option<usize>) -> PersistentList<ParseValue>
where
    P: Fn(&ParseValue) -> bool,
{
    select(
        graph,
        &|item: &ParseItem| item.as_value().filter(|value| predicate(value)).cloned(),
        limit,
    )
}

/// Values whose scoped name matches `name`.
pub fn get_values(graph: &ParseGraph, name: &str, limit: Option<usize>) -> PersistentList<ParseValue> {
    get_all_values(graph, |value| value.matches(name), limit)
}

/// Values produced by `definition`.
pub fn get_values_by_definition(
    graph: &ParseGraph,
    definition: &Token,
    limit: Option<usize>,
) -> PersistentList<ParseValue> {
    get_all_values(graph, |value| value.definition() == definition, limit)
}

/// The most recently added value matching `name`.
#[must_use]
pub fn get_value(graph: &ParseGraph, name: &str) -> Option<ParseValue> {
    get_values(graph, name, Some(1)).head().cloned()
}

/// Every nested graph at any depth, excluding `graph` itself.
pub fn get_all_graphs(graph: &ParseGraph) -> PersistentList<ParseGraph> {
    select(graph, &|item: &ParseItem| item.as_graph().cloned(), None)
}

pub fn get_all_references(graph: &ParseGraph) -> PersistentList<ParseReference> {
    select(graph, &|item: &ParseItem| item.as_reference().cloned(), None)
}

/// Finds the most recently added item produced by a token called `name`
/// and returns that token.
#[must_use]
pub fn find_definition(graph: &ParseGraph, name: &str) -> Option<Token> {
    select(
        graph,
        &|item: &ParseItem| item.definition().filter(|token| token.name() == name).cloned(),
        Some(1),
    )
    .head()
    .cloned()
}

/// Finds a nested graph satisfying `predicate` whose lowest-offset value
/// lies at `offset` of `source`.
///
/// Candidates are checked from the oldest to the most recent, and the first
/// match is returned. Graphs without any value never match.
pub fn find_graph_at_offset<P>(
    root: &ParseGraph,
    predicate: P,
    source: &Source,
    offset: u64,
) -> MetalResult<Option<ParseGraph>>
where
    P: Fn(&ParseGraph) -> bool,
{
    for graph in get_all_graphs(root).reverse().iter() {
        if !predicate(graph) || !graph.contains_value() {
            continue;
        }
        let lowest = graph.lowest_offset_value()?;
        if lowest.offset() == offset && lowest.slice.source == *source {
            return Ok(Some(graph.clone()));
        }
    }
    Ok(None)
}
