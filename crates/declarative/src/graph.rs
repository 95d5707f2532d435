//! Dependency graph builder
//!
//! Turns a [`Catalog`] into a [`Graph`]: every `require`/`before`/`notify`/
//! `subscribe` reference and every explicit relationship is resolved once
//! into a concrete edge list, the graph is checked for cycles, and a
//! deterministic topological order is computed.
//!
//! ## Ordering
//!
//! Edges point from prerequisite to dependent. Among resources that are
//! ready at the same time, the one declared first in the catalog goes first,
//! so the order never depends on hashing or thread timing.
//!
//! ## Cycles
//!
//! Cycles are found by depth-first traversal with three-color marking; the
//! error names every resource on the cycle in edge order.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::types::{RelationshipKind, ResourceRef};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Kind of a resolved edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Ordering only
    Require,
    /// Ordering plus refresh of the target when the source changed
    Notify,
}

/// A resolved edge between two resources, by catalog index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
}

/// A validated, acyclic resource graph
#[derive(Debug, Clone)]
pub struct Graph {
    resources: Vec<Resource>,
    edges: Vec<Edge>,
    prerequisites: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    notifiers: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl Graph {
    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, index: usize) -> &Resource {
        &self.resources[index]
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All edges, sorted by (source, target)
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Topological order as catalog indices
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Resources in topological order
    pub fn ordered(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().map(|&i| &self.resources[i])
    }

    /// Resources that must be terminal before `index` may start
    pub fn prerequisites(&self, index: usize) -> &[usize] {
        &self.prerequisites[index]
    }

    /// Resources that wait on `index`
    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Resources whose change requests a refresh of `index`
    pub fn notifiers(&self, index: usize) -> &[usize] {
        &self.notifiers[index]
    }
}

/// Build the dependency graph for a catalog
pub fn build_graph(catalog: &Catalog) -> Result<Graph> {
    let count = catalog.len();
    let mut resolved: BTreeMap<(usize, usize), EdgeKind> = BTreeMap::new();

    let lookup = |from: &Resource, reference: &ResourceRef| {
        catalog
            .resolve(reference)
            .ok_or_else(|| Error::UnresolvedReference {
                from: from.to_string(),
                reference: reference.to_string(),
            })
    };

    let mut add_edge = |source: usize, target: usize, kind: EdgeKind| {
        let entry = resolved.entry((source, target)).or_insert(kind);
        // a notify edge subsumes a plain ordering edge between the same pair
        if kind == EdgeKind::Notify {
            *entry = EdgeKind::Notify;
        }
    };

    for (index, resource) in catalog.resources().iter().enumerate() {
        for reference in &resource.require {
            add_edge(lookup(resource, reference)?, index, EdgeKind::Require);
        }
        for reference in &resource.before {
            add_edge(index, lookup(resource, reference)?, EdgeKind::Require);
        }
        for reference in &resource.notify {
            add_edge(index, lookup(resource, reference)?, EdgeKind::Notify);
        }
        for reference in &resource.subscribe {
            add_edge(lookup(resource, reference)?, index, EdgeKind::Notify);
        }
    }

    for relationship in catalog.relationships() {
        let resolve = |reference: &ResourceRef| {
            catalog
                .resolve(reference)
                .ok_or_else(|| Error::UnresolvedReference {
                    from: format!(
                        "relationship {} -> {}",
                        relationship.source, relationship.target
                    ),
                    reference: reference.to_string(),
                })
        };
        let source = resolve(&relationship.source)?;
        let target = resolve(&relationship.target)?;
        match relationship.kind {
            RelationshipKind::Require => add_edge(source, target, EdgeKind::Require),
            RelationshipKind::Notify => add_edge(source, target, EdgeKind::Notify),
            RelationshipKind::Subscribe => add_edge(target, source, EdgeKind::Notify),
        }
    }

    let edges: Vec<Edge> = resolved
        .into_iter()
        .map(|((source, target), kind)| Edge {
            source,
            target,
            kind,
        })
        .collect();

    let mut prerequisites = vec![Vec::new(); count];
    let mut dependents = vec![Vec::new(); count];
    let mut notifiers = vec![Vec::new(); count];
    for edge in &edges {
        prerequisites[edge.target].push(edge.source);
        dependents[edge.source].push(edge.target);
        if edge.kind == EdgeKind::Notify {
            notifiers[edge.target].push(edge.source);
        }
    }
    for list in prerequisites
        .iter_mut()
        .chain(dependents.iter_mut())
        .chain(notifiers.iter_mut())
    {
        list.sort_unstable();
    }

    if let Some(cycle) = find_cycle(&dependents) {
        let path = cycle
            .into_iter()
            .map(|i| catalog.resources()[i].to_string())
            .collect();
        return Err(Error::Cycle { path });
    }

    let order = topological_order(&prerequisites, &dependents);
    log::debug!(
        "built graph for '{}': {} resources, {} edges",
        catalog.name,
        count,
        edges.len()
    );

    Ok(Graph {
        resources: catalog.resources().to_vec(),
        edges,
        prerequisites,
        dependents,
        notifiers,
        order,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Find one cycle, returned as the node path with the first node repeated
fn find_cycle(dependents: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::White; dependents.len()];
    let mut stack = Vec::new();

    for start in 0..dependents.len() {
        if marks[start] == Mark::White
            && let Some(cycle) = visit(start, dependents, &mut marks, &mut stack)
        {
            return Some(cycle);
        }
    }
    None
}

fn visit(
    node: usize,
    dependents: &[Vec<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks[node] = Mark::Gray;
    stack.push(node);

    for &next in &dependents[node] {
        match marks[next] {
            Mark::Gray => {
                let from = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = stack[from..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::White => {
                if let Some(cycle) = visit(next, dependents, marks, stack) {
                    return Some(cycle);
                }
            }
            Mark::Black => {}
        }
    }

    stack.pop();
    marks[node] = Mark::Black;
    None
}

/// Kahn's algorithm with declaration order as the tie breaker
fn topological_order(prerequisites: &[Vec<usize>], dependents: &[Vec<usize>]) -> Vec<usize> {
    let mut pending: Vec<usize> = prerequisites.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(prerequisites.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &dependents[node] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}
