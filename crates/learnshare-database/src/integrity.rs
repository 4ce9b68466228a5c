//! Full-scan integrity check of a closure index.

use std::collections::{BTreeMap, BTreeSet};

use learnshare_core::types::CategoryId;
use learnshare_entity::category::{ClosureEdge, IntegrityReport, IntegrityViolation};

/// Check `edges` against the set of live categories.
///
/// Verifies that every live category has its self-edge, that levels are
/// consistent, that every category has at most one parent, that ancestor
/// levels have no gaps and that the rows equal the transitive closure of
/// the level-1 rows.
pub fn check(live: &BTreeSet<CategoryId>, edges: &[ClosureEdge]) -> IntegrityReport {
    let mut violations = Vec::new();
    let mut ancestors: BTreeMap<CategoryId, Vec<(CategoryId, i32)>> = BTreeMap::new();
    let mut parents: BTreeMap<CategoryId, Vec<CategoryId>> = BTreeMap::new();
    let mut has_self: BTreeSet<CategoryId> = BTreeSet::new();

    for edge in edges {
        let same = edge.ancestor_id == edge.descendant_id;
        if same != (edge.level == 0) || edge.level < 0 {
            violations.push(IntegrityViolation::BadReflexiveEdge {
                ancestor_id: edge.ancestor_id,
                descendant_id: edge.descendant_id,
                level: edge.level,
            });
            continue;
        }
        if !live.contains(&edge.ancestor_id) || !live.contains(&edge.descendant_id) {
            violations.push(IntegrityViolation::DanglingEdge {
                ancestor_id: edge.ancestor_id,
                descendant_id: edge.descendant_id,
            });
            continue;
        }
        if same {
            has_self.insert(edge.ancestor_id);
            continue;
        }
        if edge.level == 1 {
            parents
                .entry(edge.descendant_id)
                .or_default()
                .push(edge.ancestor_id);
        }
        ancestors
            .entry(edge.descendant_id)
            .or_default()
            .push((edge.ancestor_id, edge.level));
    }

    for id in live {
        if !has_self.contains(id) {
            violations.push(IntegrityViolation::MissingSelfEdge { category_id: *id });
        }
    }

    for (id, found) in &parents {
        if found.len() > 1 {
            violations.push(IntegrityViolation::MultipleParents {
                category_id: *id,
                parents: found.clone(),
            });
        }
    }

    for id in live {
        let mut actual = ancestors.get(id).cloned().unwrap_or_default();
        actual.sort_by_key(|(a, level)| (*level, *a));

        let levels: Vec<i32> = actual.iter().map(|(_, level)| *level).collect();
        let contiguous = levels.iter().enumerate().all(|(i, l)| *l == i as i32 + 1);
        if !contiguous {
            violations.push(IntegrityViolation::LevelGap {
                category_id: *id,
                levels,
            });
        }

        let expected = parent_chain(*id, &parents);
        if expected != actual {
            violations.push(IntegrityViolation::NotTransitive {
                category_id: *id,
                expected,
                actual,
            });
        }
    }

    IntegrityReport {
        live_categories: live.len() as u64,
        edges: edges.len() as u64,
        violations,
    }
}

/// Ancestors of `id` reached by following first parents, nearest first.
///
/// On a cycle the first repeated node is included, so the chain can never
/// match a well-formed ancestor list.
fn parent_chain(
    id: CategoryId,
    parents: &BTreeMap<CategoryId, Vec<CategoryId>>,
) -> Vec<(CategoryId, i32)> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::from([id]);
    let mut current = id;
    while let Some(parent) = parents.get(&current).and_then(|p| p.first()).copied() {
        chain.push((parent, chain.len() as i32 + 1));
        // A repeated node means the parent links form a cycle.
        if !seen.insert(parent) {
            break;
        }
        current = parent;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(ids: &[i64]) -> BTreeSet<CategoryId> {
        ids.iter().map(|i| CategoryId(*i)).collect()
    }

    fn edges(rows: &[(i64, i64, i32)]) -> Vec<ClosureEdge> {
        rows.iter().copied().map(ClosureEdge::from).collect()
    }

    #[test]
    fn test_chain_is_consistent() {
        let report = check(
            &live(&[1, 2, 3]),
            &edges(&[(1, 1, 0), (2, 2, 0), (3, 3, 0), (1, 2, 1), (2, 3, 1), (1, 3, 2)]),
        );
        assert!(report.is_consistent(), "{}", report.summary());
        assert_eq!(report.live_categories, 3);
        assert_eq!(report.edges, 6);
    }

    #[test]
    fn test_missing_self_edge() {
        let report = check(&live(&[1, 2]), &edges(&[(1, 1, 0), (1, 2, 1)]));
        assert!(report.violations.contains(&IntegrityViolation::MissingSelfEdge {
            category_id: CategoryId(2)
        }));
    }

    #[test]
    fn test_missing_transitive_row() {
        let report = check(
            &live(&[1, 2, 3]),
            &edges(&[(1, 1, 0), (2, 2, 0), (3, 3, 0), (1, 2, 1), (2, 3, 1)]),
        );
        assert!(report.violations.iter().any(|v| matches!(
            v,
            IntegrityViolation::NotTransitive { category_id, .. } if *category_id == CategoryId(3)
        )));
    }

    #[test]
    fn test_level_gap_and_bad_levels() {
        let report = check(
            &live(&[1, 2]),
            &edges(&[(1, 1, 0), (2, 2, 0), (1, 2, 2), (2, 1, 0)]),
        );
        assert!(report.violations.iter().any(|v| matches!(
            v,
            IntegrityViolation::LevelGap { levels, .. } if levels == &vec![2]
        )));
        assert!(report.violations.iter().any(|v| matches!(
            v,
            IntegrityViolation::BadReflexiveEdge { level: 0, .. }
        )));
    }

    #[test]
    fn test_dangling_and_multiple_parents() {
        let report = check(
            &live(&[1, 2, 3]),
            &edges(&[(1, 1, 0), (2, 2, 0), (3, 3, 0), (1, 3, 1), (2, 3, 1), (9, 3, 2)]),
        );
        assert!(report.violations.iter().any(|v| matches!(
            v,
            IntegrityViolation::MultipleParents { category_id, .. } if *category_id == CategoryId(3)
        )));
        assert!(report.violations.contains(&IntegrityViolation::DanglingEdge {
            ancestor_id: CategoryId(9),
            descendant_id: CategoryId(3),
        }));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let report = check(
            &live(&[1, 2]),
            &edges(&[(1, 1, 0), (2, 2, 0), (1, 2, 1), (2, 1, 1)]),
        );
        assert!(!report.is_consistent());
    }
}
