//! Whole-graph statistics. Every facet is a full scan, recomputed per call.

use std::collections::BTreeMap;

use rusqlite::params;
use serde::Serialize;

use super::{PdcaGraph, DEFAULT_TOP_CONNECTED};
use crate::error::Result;

/// A node and its total degree (in + out, all kinds)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectedNode {
    pub id: String,
    pub connection_count: u64,
}

/// Aggregate view of the stored graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: u64,
    pub edge_count: u64,
    /// Edge count per relationship kind
    pub relationship_types: BTreeMap<String, u64>,
    /// Highest-degree nodes, ties broken by id
    pub most_connected: Vec<ConnectedNode>,
    /// Directed density: edges / (nodes * (nodes - 1)), 0 below two nodes
    pub density: f64,
}

/// Directed-graph density over ordered node pairs
pub fn density(node_count: u64, edge_count: u64) -> f64 {
    if node_count > 1 {
        edge_count as f64 / (node_count as f64 * (node_count - 1) as f64)
    } else {
        0.0
    }
}

impl PdcaGraph {
    /// Statistics with the default top-10 most-connected list
    pub fn get_graph_stats(&self) -> Result<GraphStats> {
        self.get_graph_stats_top(DEFAULT_TOP_CONNECTED)
    }

    /// Statistics listing the `top` highest-degree nodes
    pub fn get_graph_stats_top(&self, top: usize) -> Result<GraphStats> {
        let conn = self.store.conn();

        let node_count: i64 = conn.query_row("SELECT COUNT(*) FROM pdcas", [], |row| row.get(0))?;
        let edge_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pdca_relationships", [], |row| row.get(0))?;

        let mut relationship_types = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT relationship_type, COUNT(*) FROM pdca_relationships GROUP BY relationship_type",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                relationship_types.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64);
            }
        }

        // Source-side and target-side counts are unioned, then summed per node
        let mut stmt = conn.prepare(
            r#"
            SELECT pdca_id, SUM(connection_count) AS degree
            FROM (
                SELECT from_pdca_id AS pdca_id, COUNT(*) AS connection_count
                FROM pdca_relationships
                GROUP BY from_pdca_id
                UNION ALL
                SELECT to_pdca_id AS pdca_id, COUNT(*) AS connection_count
                FROM pdca_relationships
                GROUP BY to_pdca_id
            )
            GROUP BY pdca_id
            ORDER BY degree DESC, pdca_id ASC
            LIMIT ?1
            "#,
        )?;
        let limit = i64::try_from(top).unwrap_or(i64::MAX);
        let most_connected = stmt
            .query_map(params![limit], |row| {
                Ok(ConnectedNode {
                    id: row.get(0)?,
                    connection_count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let node_count = node_count as u64;
        let edge_count = edge_count as u64;
        let stats = GraphStats {
            node_count,
            edge_count,
            relationship_types,
            most_connected,
            density: density(node_count, edge_count),
        };

        log::debug!(
            "Graph stats: {} nodes, {} edges, density {:.3}",
            stats.node_count,
            stats.edge_count,
            stats.density
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::graph_with;

    #[test]
    fn test_density_formula() {
        assert!((density(3, 2) - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(density(0, 0), 0.0);
        assert_eq!(density(1, 5), 0.0);
    }

    #[test]
    fn test_empty_store() {
        let graph = graph_with(&[], &[]);
        let stats = graph.get_graph_stats().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert_eq!(stats.density, 0.0);
        assert!(stats.relationship_types.is_empty());
        assert!(stats.most_connected.is_empty());
    }

    #[test]
    fn test_chain_stats() {
        let mut graph = graph_with(&[("a", 100), ("b", 200), ("c", 300)], &[("a", "b"), ("b", "c")]);
        let stats = graph.get_graph_stats().unwrap();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert!((stats.density - 0.3333333333).abs() < 1e-6);
        assert_eq!(stats.relationship_types.get("PRECEDES"), Some(&2));
        assert_eq!(
            stats.most_connected[0],
            ConnectedNode { id: "b".to_string(), connection_count: 2 }
        );
        // a and c tie at degree 1; id breaks the tie
        assert_eq!(stats.most_connected[1].id, "a");
        assert_eq!(stats.most_connected[2].id, "c");

        graph.upsert_edge("a", "c", "REFINES", 1.0, None).unwrap();
        let stats = graph.get_graph_stats().unwrap();
        assert_eq!(stats.relationship_types.get("REFINES"), Some(&1));
        assert_eq!(stats.edge_count, 3);
        assert_eq!(stats.most_connected.len(), 3);
        assert!(stats.most_connected.iter().all(|n| n.connection_count == 2));
    }

    #[test]
    fn test_top_limit() {
        let graph = graph_with(
            &[("hub", 0), ("a", 1), ("b", 2), ("c", 3)],
            &[("hub", "a"), ("hub", "b"), ("hub", "c")],
        );
        let stats = graph.get_graph_stats_top(1).unwrap();
        assert_eq!(stats.most_connected.len(), 1);
        assert_eq!(stats.most_connected[0].id, "hub");
        assert_eq!(stats.most_connected[0].connection_count, 3);
    }

    #[test]
    fn test_dangling_edges_count_toward_degree() {
        let mut graph = graph_with(&[("a", 1)], &[]);
        graph.link("a", "ghost").unwrap();
        let stats = graph.get_graph_stats().unwrap();
        assert_eq!(stats.node_count, 1);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.density, 0.0);
        assert_eq!(stats.most_connected.len(), 2);
    }
}
