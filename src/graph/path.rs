//! Forward path search over one relationship kind.
//!
//! `find_path` expands the frontier with a single recursive query and keeps
//! the historical result shape: rows that are the target plus every row on
//! the max-depth frontier, with no cycle pruning. `shortest_path` is the
//! early-exit breadth-first variant that tracks visited nodes.

use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::params;
use serde::Serialize;

use super::{node_from_row, PdcaGraph, PdcaNode, NODE_COLUMNS, NODE_COLUMN_COUNT};
use crate::error::Result;

/// One row of a recursive path search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStep {
    #[serde(flatten)]
    pub node: PdcaNode,
    /// Hops from the start node
    pub depth: u32,
    /// Route taken, e.g. `a -> b -> c`
    pub trail: String,
}

const FIND_PATH_SQL: &str = "\
WITH RECURSIVE pdca_path(id, depth, trail) AS (
    -- Base: start node
    SELECT p.id, 0, p.id
    FROM pdcas p
    WHERE p.id = ?1

    UNION ALL

    -- Recursive: follow edges of the requested kind to existing nodes.
    -- Pinned to the source index; the kind index matches nearly every edge.
    SELECT pr.to_pdca_id, pp.depth + 1, pp.trail || ' -> ' || pr.to_pdca_id
    FROM pdca_path pp
    JOIN pdca_relationships pr INDEXED BY idx_pdca_relationships_from ON pr.from_pdca_id = pp.id
    JOIN pdcas p ON p.id = pr.to_pdca_id
    WHERE pp.depth < ?2 AND pr.relationship_type = ?3
)
SELECT {cols}, pp.depth, pp.trail
FROM pdca_path pp
JOIN pdcas p ON p.id = pp.id
WHERE pp.id = ?4 OR pp.depth = ?2
ORDER BY pp.depth, pp.trail";

const SUCCESSOR_IDS_SQL: &str = "\
SELECT pr.to_pdca_id
FROM pdca_relationships pr INDEXED BY idx_pdca_relationships_from
JOIN pdcas p ON p.id = pr.to_pdca_id
WHERE pr.from_pdca_id = ?1 AND pr.relationship_type = ?2
ORDER BY pr.created_at DESC, pr.id DESC";

impl PdcaGraph {
    /// Breadth-first expansion from `start_id` along `kind` edges, up to
    /// `max_depth` hops.
    ///
    /// Returns, ordered by depth, every row whose node is `end_id` plus every
    /// row at exactly `max_depth` hops. The result is only a real path when
    /// `end_id` appears in it. Cycles are not pruned, so a node reached again
    /// at a deeper level yields another row. With `max_depth == 0` the result
    /// is just the start node.
    pub fn find_path(&self, start_id: &str, end_id: &str, kind: &str, max_depth: u32) -> Result<Vec<PathStep>> {
        let sql = FIND_PATH_SQL.replace("{cols}", NODE_COLUMNS);
        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![start_id, i64::from(max_depth), kind, end_id],
            |row| {
                Ok(PathStep {
                    node: node_from_row(row, 0)?,
                    depth: row.get(NODE_COLUMN_COUNT)?,
                    trail: row.get(NODE_COLUMN_COUNT + 1)?,
                })
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        log::debug!(
            "Found path of length {} from {} to {}",
            results.len(),
            start_id,
            end_id
        );
        Ok(results)
    }

    /// Shortest chain of nodes from `start_id` to `end_id` over `kind` edges,
    /// at most `max_depth` hops long. Stops at the first time `end_id` is
    /// reached and never revisits a node.
    pub fn shortest_path(
        &self,
        start_id: &str,
        end_id: &str,
        kind: &str,
        max_depth: u32,
    ) -> Result<Option<Vec<PdcaNode>>> {
        let Some(start) = self.get_node(start_id)? else {
            return Ok(None);
        };
        if start_id == end_id {
            return Ok(Some(vec![start]));
        }

        let mut parents: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start_id.to_string());
        queue.push_back((start_id.to_string(), 0u32));

        let mut found = false;
        'search: while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.successor_ids(&current, kind)? {
                if seen.insert(next.clone()) {
                    parents.insert(next.clone(), current.clone());
                    if next == end_id {
                        found = true;
                        break 'search;
                    }
                    queue.push_back((next, depth + 1));
                }
            }
        }

        if !found {
            log::debug!("No path from {} to {} within {} hops", start_id, end_id, max_depth);
            return Ok(None);
        }

        let mut chain_ids = vec![end_id.to_string()];
        let mut cursor = end_id;
        while let Some(parent) = parents.get(cursor) {
            chain_ids.push(parent.clone());
            cursor = parent;
        }
        chain_ids.reverse();

        let mut chain = Vec::with_capacity(chain_ids.len());
        for id in &chain_ids {
            match self.get_node(id)? {
                Some(node) => chain.push(node),
                None => return Ok(None),
            }
        }

        log::debug!("Shortest path {} -> {} has {} hops", start_id, end_id, chain.len() - 1);
        Ok(Some(chain))
    }

    /// Targets of `kind` edges out of `node_id` that exist as nodes
    fn successor_ids(&self, node_id: &str, kind: &str) -> Result<Vec<String>> {
        let mut stmt = self.store.conn().prepare_cached(SUCCESSOR_IDS_SQL)?;
        let ids = stmt
            .query_map(params![node_id, kind], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::{FIND_PATH_SQL, SUCCESSOR_IDS_SQL};
    use crate::graph::test_support::{graph_with, query_plan};
    use crate::graph::{PathStep, DEFAULT_KIND, NODE_COLUMNS};

    fn rows(steps: &[PathStep]) -> Vec<(&str, u32)> {
        steps.iter().map(|s| (s.node.id.as_str(), s.depth)).collect()
    }

    #[test]
    fn test_find_path_reaches_target() {
        let graph = graph_with(&[("a", 100), ("b", 200), ("c", 300)], &[("a", "b"), ("b", "c")]);
        let path = graph.find_path("a", "c", DEFAULT_KIND, 10).unwrap();

        assert!(path.iter().any(|s| s.node.id == "c"));
        let target = path.iter().find(|s| s.node.id == "c").unwrap();
        assert_eq!(target.depth, 2);
        assert_eq!(target.trail, "a -> b -> c");
    }

    #[test]
    fn test_find_path_includes_max_depth_frontier() {
        // Documented shape: target rows plus the whole frontier at max_depth
        let graph = graph_with(
            &[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("x", 5)],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "x")],
        );
        let path = graph.find_path("a", "b", DEFAULT_KIND, 2).unwrap();
        assert_eq!(rows(&path), vec![("b", 1), ("c", 2)]);
    }

    #[test]
    fn test_find_path_unreachable_target_returns_frontier() {
        let graph = graph_with(&[("a", 1), ("b", 2), ("c", 3), ("z", 9)], &[("a", "b"), ("b", "c")]);
        let path = graph.find_path("a", "z", DEFAULT_KIND, 1).unwrap();
        assert_eq!(rows(&path), vec![("b", 1)]);

        // Frontier empty at max depth: nothing at all
        let path = graph.find_path("a", "z", DEFAULT_KIND, 5).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_find_path_zero_depth_is_start_node() {
        let graph = graph_with(&[("a", 1), ("b", 2)], &[("a", "b")]);
        let path = graph.find_path("a", "b", DEFAULT_KIND, 0).unwrap();
        assert_eq!(rows(&path), vec![("a", 0)]);
        assert_eq!(path[0].trail, "a");
    }

    #[test]
    fn test_find_path_cycle_duplicates_rows() {
        let graph = graph_with(&[("a", 1), ("b", 2)], &[("a", "b"), ("b", "a")]);
        let path = graph.find_path("a", "b", DEFAULT_KIND, 4).unwrap();
        // b at depth 1 and 3, a again on the depth-4 frontier
        assert_eq!(rows(&path), vec![("b", 1), ("b", 3), ("a", 4)]);
        assert_eq!(path[1].trail, "a -> b -> a -> b");
    }

    #[test]
    fn test_find_path_respects_kind() {
        let mut graph = graph_with(&[("a", 1), ("b", 2), ("c", 3)], &[("a", "b")]);
        graph.upsert_edge("b", "c", "REFINES", 1.0, None).unwrap();
        let path = graph.find_path("a", "c", DEFAULT_KIND, 10).unwrap();
        assert!(path.iter().all(|s| s.node.id != "c"));
    }

    #[test]
    fn test_find_path_unknown_start() {
        let graph = graph_with(&[("a", 1)], &[]);
        assert!(graph.find_path("ghost", "a", DEFAULT_KIND, 3).unwrap().is_empty());
    }

    #[test]
    fn test_shortest_path_early_exit() {
        let graph = graph_with(
            &[("a", 1), ("b", 2), ("c", 3), ("d", 4)],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "c")],
        );
        let chain = graph.shortest_path("a", "d", DEFAULT_KIND, 10).unwrap().unwrap();
        let ids: Vec<_> = chain.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_shortest_path_depth_limit_and_cycles() {
        let graph = graph_with(
            &[("a", 1), ("b", 2), ("c", 3)],
            &[("a", "b"), ("b", "a"), ("b", "c")],
        );
        assert!(graph.shortest_path("a", "c", DEFAULT_KIND, 1).unwrap().is_none());
        let chain = graph.shortest_path("a", "c", DEFAULT_KIND, 2).unwrap().unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_shortest_path_trivial_and_missing() {
        let graph = graph_with(&[("a", 1), ("b", 2)], &[]);
        let chain = graph.shortest_path("a", "a", DEFAULT_KIND, 0).unwrap().unwrap();
        assert_eq!(chain.len(), 1);
        assert!(graph.shortest_path("a", "b", DEFAULT_KIND, 5).unwrap().is_none());
        assert!(graph.shortest_path("ghost", "a", DEFAULT_KIND, 5).unwrap().is_none());
    }

    #[test]
    fn test_path_expansion_searches_by_source() {
        let graph = graph_with(&[("a", 100), ("b", 200), ("c", 300)], &[("a", "b"), ("b", "c")]);
        let find_path = FIND_PATH_SQL.replace("{cols}", NODE_COLUMNS);
        for plan in [
            query_plan(&graph, &find_path, &[&"a", &3i64, &DEFAULT_KIND, &"c"]),
            query_plan(&graph, SUCCESSOR_IDS_SQL, &[&"a", &DEFAULT_KIND]),
        ] {
            assert!(
                plan.iter().any(|line| line.contains("idx_pdca_relationships_from")),
                "expected source index in plan {:?}",
                plan
            );
            assert!(
                !plan.iter().any(|line| line.contains("idx_pdca_relationships_type")),
                "kind index chosen in plan {:?}",
                plan
            );
        }
    }
}
