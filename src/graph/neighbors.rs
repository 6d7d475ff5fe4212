//! Single-hop reads: node lookup, predecessors/successors and breadcrumbs.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{
    node_from_row, parse_created_at, parse_metadata, Neighbor, PdcaGraph, PdcaNode, Relationship,
    DEFAULT_KIND, NODE_COLUMNS, NODE_COLUMN_COUNT,
};
use crate::error::Result;

/// Which end of the edge the queried node sits on
#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Edges pointing into the node; return their sources
    Incoming,
    /// Edges pointing out of the node; return their targets
    Outgoing,
}

/// Immediate neighborhood of one node, prepared for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breadcrumb {
    pub current: Option<PdcaNode>,
    /// At most `max_depth` entries, newest edge first
    pub predecessors: Vec<Neighbor>,
    /// At most `max_depth` entries, newest edge first
    pub successors: Vec<Neighbor>,
    /// Untruncated number of predecessors
    pub predecessor_count: usize,
    /// Untruncated number of successors
    pub successor_count: usize,
}

/// A node id proposed by an upstream similarity ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub score: f64,
}

impl RankedCandidate {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self { id: id.into(), score }
    }
}

/// Breadcrumb for one ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeededBreadcrumb {
    pub candidate: RankedCandidate,
    pub breadcrumb: Breadcrumb,
}

/// Neighbor join for one direction.
///
/// The edge index on the filtered end is forced: left to itself the planner
/// prefers the kind index, which covers almost every edge.
fn neighbors_sql(direction: Direction) -> String {
    let (join_col, filter_col, index) = match direction {
        Direction::Incoming => ("from_pdca_id", "to_pdca_id", "idx_pdca_relationships_to"),
        Direction::Outgoing => ("to_pdca_id", "from_pdca_id", "idx_pdca_relationships_from"),
    };
    // created_at has millisecond resolution; id breaks ties in insertion order
    format!(
        "SELECT {cols}, pr.weight, pr.metadata, pr.created_at \
         FROM pdcas p \
         JOIN pdca_relationships pr INDEXED BY {index} ON p.id = pr.{join_col} \
         WHERE pr.{filter_col} = ?1 AND pr.relationship_type = ?2 \
         ORDER BY pr.created_at DESC, pr.id DESC",
        cols = NODE_COLUMNS,
    )
}

impl PdcaGraph {
    /// Look up a node by id
    pub fn get_node(&self, id: &str) -> Result<Option<PdcaNode>> {
        let sql = format!("SELECT {} FROM pdcas p WHERE p.id = ?1", NODE_COLUMNS);
        let node = self
            .store
            .conn()
            .prepare_cached(&sql)?
            .query_row(params![id], |row| node_from_row(row, 0))
            .optional()?;
        Ok(node)
    }

    /// Look up the edge stored under (from, to, kind)
    pub fn get_relationship(&self, from_id: &str, to_id: &str, kind: &str) -> Result<Option<Relationship>> {
        let rel = self
            .store
            .conn()
            .prepare_cached(
                "SELECT id, from_pdca_id, to_pdca_id, relationship_type, weight, metadata, created_at \
                 FROM pdca_relationships \
                 WHERE from_pdca_id = ?1 AND to_pdca_id = ?2 AND relationship_type = ?3",
            )?
            .query_row(params![from_id, to_id, kind], |row| {
                Ok(Relationship {
                    id: row.get(0)?,
                    from_id: row.get(1)?,
                    to_id: row.get(2)?,
                    kind: row.get(3)?,
                    weight: row.get(4)?,
                    metadata: parse_metadata(row, 5)?,
                    created_at: parse_created_at(row, 6)?,
                })
            })
            .optional()?;
        Ok(rel)
    }

    /// Nodes with a `kind` edge pointing into `node_id`, newest edge first
    pub fn get_predecessors(&self, node_id: &str, kind: &str) -> Result<Vec<Neighbor>> {
        let result = self.neighbors(node_id, kind, Direction::Incoming)?;
        log::debug!("Found {} predecessors for {}", result.len(), node_id);
        Ok(result)
    }

    /// Nodes a `kind` edge out of `node_id` points to, newest edge first
    pub fn get_successors(&self, node_id: &str, kind: &str) -> Result<Vec<Neighbor>> {
        let result = self.neighbors(node_id, kind, Direction::Outgoing)?;
        log::debug!("Found {} successors for {}", result.len(), node_id);
        Ok(result)
    }

    fn neighbors(&self, node_id: &str, kind: &str, direction: Direction) -> Result<Vec<Neighbor>> {
        let sql = neighbors_sql(direction);
        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let rows = stmt.query_map(params![node_id, kind], |row| {
            Ok(Neighbor {
                node: node_from_row(row, 0)?,
                weight: row.get(NODE_COLUMN_COUNT)?,
                metadata: parse_metadata(row, NODE_COLUMN_COUNT + 1)?,
                relationship_created: parse_created_at(row, NODE_COLUMN_COUNT + 2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Breadcrumb over default-kind edges
    pub fn get_breadcrumb(&self, node_id: &str, max_depth: usize) -> Result<Breadcrumb> {
        self.get_breadcrumb_for_kind(node_id, DEFAULT_KIND, max_depth)
    }

    /// Current node plus up to `max_depth` predecessors and successors.
    /// The counts always reflect the full neighbor sets.
    pub fn get_breadcrumb_for_kind(&self, node_id: &str, kind: &str, max_depth: usize) -> Result<Breadcrumb> {
        let mut predecessors = self.get_predecessors(node_id, kind)?;
        let mut successors = self.get_successors(node_id, kind)?;
        let current = self.get_node(node_id)?;

        let predecessor_count = predecessors.len();
        let successor_count = successors.len();
        predecessors.truncate(max_depth);
        successors.truncate(max_depth);

        Ok(Breadcrumb {
            current,
            predecessors,
            successors,
            predecessor_count,
            successor_count,
        })
    }

    /// One breadcrumb per upstream candidate, in the order given
    pub fn seed_breadcrumbs(
        &self,
        candidates: &[RankedCandidate],
        max_depth: usize,
    ) -> Result<Vec<SeededBreadcrumb>> {
        candidates
            .iter()
            .map(|candidate| {
                Ok(SeededBreadcrumb {
                    candidate: candidate.clone(),
                    breadcrumb: self.get_breadcrumb(&candidate.id, max_depth)?,
                })
            })
            .collect()
    }
}
