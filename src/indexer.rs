//! Automatic index selection. Given the set of distinct column masks a
//! relation is searched on, choose the minimum number of sort orders that
//! together can serve every observed search.
//!
//! # Theory
//!
//! Order the observed masks by subset inclusion: mask `A` precedes mask `B`
//! iff `A` is a proper subset of `B`. A single index realizes a *chain* in
//! this order — a sequence of masks each extending the last by the columns
//! it adds, completed by the relation's remaining columns in any order.
//! By Dilworth's theorem, the minimum number of chains needed to cover a
//! finite poset equals the size of its largest antichain, and a minimum
//! chain decomposition is recoverable from a maximum matching in the
//! poset's comparability bipartite graph (two copies of the elements, an
//! edge wherever one strictly precedes the other). This module builds that
//! bipartite graph and finds a maximum matching with Kuhn's augmenting-path
//! algorithm — a single-threaded Hopcroft–Karp predecessor, adequate since
//! the number of distinct masks observed per relation in practice is small
//! (tens, occasionally low hundreds).

use crate::relation::{SearchMask, SortOrder};
use datalog_ir::{Operation, Statement, Visitor};
use std::collections::{HashMap, HashSet};

/// Chooses one [`SortOrder`] per chain of a minimum chain decomposition of
/// `masks` under subset inclusion, each completed to a full permutation of
/// `arity` columns. Always returns at least one order (the identity order,
/// when no masks were observed).
pub fn choose_orders(arity: usize, masks: &[SearchMask]) -> Vec<SortOrder> {
    let distinct = dedupe_nonempty(masks);
    if distinct.is_empty() {
        return vec![SortOrder::identity(arity)];
    }

    let n = distinct.len();
    let mut graph: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j && is_proper_subset(&distinct[i].columns, &distinct[j].columns) {
                graph[i].push(j);
            }
        }
    }

    let mut match_of_right: Vec<Option<usize>> = vec![None; n];
    for left in 0..n {
        let mut visited = vec![false; n];
        try_augment(left, &graph, &mut visited, &mut match_of_right);
    }

    let mut successor: Vec<Option<usize>> = vec![None; n];
    for (right, left) in match_of_right.iter().enumerate() {
        if let Some(left) = left {
            successor[*left] = Some(right);
        }
    }

    let pointed_to: HashSet<usize> = successor.iter().filter_map(|s| *s).collect();
    let chain_starts: Vec<usize> = (0..n).filter(|i| !pointed_to.contains(i)).collect();

    chain_starts
        .into_iter()
        .map(|start| build_order_for_chain(start, &successor, &distinct, arity))
        .collect()
}

fn dedupe_nonempty(masks: &[SearchMask]) -> Vec<SearchMask> {
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut out = Vec::new();
    for mask in masks {
        if mask.is_empty() {
            continue;
        }
        let key: Vec<usize> = mask.columns.iter().copied().collect();
        if seen.insert(key) {
            out.push(mask.clone());
        }
    }
    out
}

fn is_proper_subset(a: &std::collections::BTreeSet<usize>, b: &std::collections::BTreeSet<usize>) -> bool {
    a.len() < b.len() && a.is_subset(b)
}

fn try_augment(
    left: usize,
    graph: &[Vec<usize>],
    visited: &mut [bool],
    match_of_right: &mut [Option<usize>],
) -> bool {
    for &right in &graph[left] {
        if visited[right] {
            continue;
        }
        visited[right] = true;
        let can_take = match match_of_right[right] {
            None => true,
            Some(prev) => try_augment(prev, graph, visited, match_of_right),
        };
        if can_take {
            match_of_right[right] = Some(left);
            return true;
        }
    }
    false
}

fn build_order_for_chain(
    start: usize,
    successor: &[Option<usize>],
    masks: &[SearchMask],
    arity: usize,
) -> SortOrder {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(idx) = cursor {
        for &col in &masks[idx].columns {
            if seen.insert(col) {
                columns.push(col);
            }
        }
        cursor = successor[idx];
    }
    for col in 0..arity {
        if seen.insert(col) {
            columns.push(col);
        }
    }
    SortOrder(columns)
}

/// Walks a translated RAM [`Statement`] tree and collects, per relation
/// storage name (including any `#delta`/`#new` shadow suffix — each shadow
/// is a distinct [`crate::relation::Relation`] with its own indices), every
/// distinct [`SearchMask`] a `SCAN` in the program binds against it.
///
/// Feeding the result of this per relation to [`choose_orders`] and
/// realizing the chosen orders via [`crate::relation::Relation::ensure_index`]
/// is the "run once after RAM generation, before execution" path a compiled
/// back end needs (§4.D); the interpreter does not require this — it calls
/// `equal_range` directly, which builds a compatible index on demand (§4.C)
/// — but running it anyway lets execution start with every scan's index
/// already realized instead of paying for it on the first matching round.
pub fn collect_masks(statement: &Statement) -> HashMap<String, Vec<SearchMask>> {
    struct MaskCollector {
        masks: HashMap<String, HashSet<Vec<usize>>>,
    }

    impl Visitor for MaskCollector {
        fn pre_operation(&mut self, op: &Operation) {
            if let Operation::Scan { relation, pattern, .. } = op {
                let bound: Vec<usize> = pattern
                    .iter()
                    .enumerate()
                    .filter_map(|(c, v)| v.is_some().then_some(c))
                    .collect();
                if bound.is_empty() {
                    return;
                }
                self.masks.entry(relation.clone()).or_default().insert(bound);
            }
        }
    }

    let mut collector = MaskCollector { masks: HashMap::new() };
    collector.visit_statement(statement);
    collector
        .masks
        .into_iter()
        .map(|(relation, masks)| {
            let masks = masks.into_iter().map(SearchMask::new).collect();
            (relation, masks)
        })
        .collect()
}

/// Realizes, for every relation [`collect_masks`] found a scan pattern
/// against, the sort orders [`choose_orders`] selects for it — so every
/// scan in `statement` finds a compatible index already built before
/// [`crate::interpreter::Interpreter::run`] executes it.
pub fn precompute_indices(statement: &Statement, env: &crate::catalog::Environment) -> crate::error::EngineResult<()> {
    for (relation, masks) in collect_masks(statement) {
        let rel = env.resolve(&relation)?;
        for order in choose_orders(rel.arity(), &masks) {
            rel.ensure_index(order);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_observed_masks_yields_identity_order() {
        let orders = choose_orders(3, &[]);
        assert_eq!(orders, vec![SortOrder::identity(3)]);
    }

    #[test]
    fn a_chain_of_nested_masks_collapses_into_one_order() {
        // {0} < {0,1} < {0,1,2}: a pure chain needs exactly one index.
        let masks = vec![
            SearchMask::new([0]),
            SearchMask::new([0, 1]),
            SearchMask::new([0, 1, 2]),
        ];
        let orders = choose_orders(3, &masks);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].0[..3], [0, 1, 2]);
    }

    #[test]
    fn an_antichain_needs_one_index_per_mask() {
        // {0} and {1} are incomparable: no single total order's prefix set
        // can equal both {0} and {1}, so two chains (two indices) are needed.
        let masks = vec![SearchMask::new([0]), SearchMask::new([1])];
        let orders = choose_orders(2, &masks);
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn every_order_is_a_full_permutation() {
        let masks = vec![SearchMask::new([2]), SearchMask::new([0, 2])];
        let orders = choose_orders(4, &masks);
        for order in orders {
            let mut cols = order.0.clone();
            cols.sort_unstable();
            assert_eq!(cols, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn every_order_realizes_a_prefix_compatible_with_its_source_masks() {
        let masks = vec![SearchMask::new([1]), SearchMask::new([1, 3])];
        let orders = choose_orders(4, &masks);
        assert!(orders
            .iter()
            .any(|order| order.is_compatible_with(&SearchMask::new([1]))
                && order.is_compatible_with(&SearchMask::new([1, 3]))));
    }
}
