//! Outcome classification and the lenient facade.
//!
//! [`PdcaGraph`] reports failures as `Err`. [`LenientGraph`] wraps it for
//! callers that want the historical contract instead: writes answer `bool`,
//! reads answer an empty value, and every failure is logged and swallowed.
//! Under that contract "nothing there" and "something went wrong" look the
//! same; use [`QueryOutcome`] when the difference matters.
//!
//! Input checks are not relaxed: a blank id, agent name, role or kind, or a
//! non-finite weight or quality score, is logged and answered with `false`
//! instead of being stored.

use std::path::Path;

use crate::config::StoreConfig;
use crate::error::{GraphError, Result};
use crate::graph::{
    Breadcrumb, EdgeMetadata, GraphStats, Neighbor, PathStep, PdcaGraph, PdcaNode,
};

/// Result of a read, with empty results told apart from failures
#[derive(Debug)]
pub enum QueryOutcome<T> {
    Found(T),
    Empty,
    Failed(GraphError),
}

/// Values that can be empty without being an error
pub trait Emptiness {
    fn is_empty_result(&self) -> bool;
}

impl<T> Emptiness for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}

impl Emptiness for Breadcrumb {
    fn is_empty_result(&self) -> bool {
        self.current.is_none() && self.predecessor_count == 0 && self.successor_count == 0
    }
}

impl<T: Emptiness> From<Result<T>> for QueryOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) if value.is_empty_result() => QueryOutcome::Empty,
            Ok(value) => QueryOutcome::Found(value),
            Err(e) => QueryOutcome::Failed(e),
        }
    }
}

impl<T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    /// The found value, or `None` for both empty and failed outcomes
    pub fn found(self) -> Option<T> {
        match self {
            QueryOutcome::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Default> QueryOutcome<T> {
    /// Collapse back into a plain result; empty becomes `T::default()`
    pub fn into_result(self) -> Result<T> {
        match self {
            QueryOutcome::Found(value) => Ok(value),
            QueryOutcome::Empty => Ok(T::default()),
            QueryOutcome::Failed(e) => Err(e),
        }
    }
}

fn swallow<T: Default>(operation: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        log::error!("Error {}: {}", operation, e);
        T::default()
    })
}

/// Facade with the log-and-swallow error contract.
///
/// Writes the strict engine rejects as invalid input also fail here.
pub struct LenientGraph {
    graph: PdcaGraph,
}

impl LenientGraph {
    pub fn new(graph: PdcaGraph) -> Self {
        Self { graph }
    }

    /// Opening still reports errors: there is no engine to fall back on
    pub fn open<P: AsRef<Path>>(db_path: P, config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(PdcaGraph::open(db_path, config)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(PdcaGraph::open_in_memory()?))
    }

    /// Borrow the strict engine
    pub fn inner(&self) -> &PdcaGraph {
        &self.graph
    }

    pub fn into_inner(self) -> PdcaGraph {
        self.graph
    }

    pub fn add_pdca_node(&mut self, node: &PdcaNode) -> bool {
        match self.graph.upsert_node(node) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error adding PDCA node: {}", e);
                false
            }
        }
    }

    pub fn add_relationship(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: &str,
        weight: f64,
        metadata: Option<&EdgeMetadata>,
    ) -> bool {
        match self.graph.upsert_edge(from_id, to_id, kind, weight, metadata) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error adding relationship: {}", e);
                false
            }
        }
    }

    pub fn get_predecessors(&self, node_id: &str, kind: &str) -> Vec<Neighbor> {
        swallow("getting predecessors", self.graph.get_predecessors(node_id, kind))
    }

    pub fn get_successors(&self, node_id: &str, kind: &str) -> Vec<Neighbor> {
        swallow("getting successors", self.graph.get_successors(node_id, kind))
    }

    pub fn find_path(&self, start_id: &str, end_id: &str, kind: &str, max_depth: u32) -> Vec<PathStep> {
        swallow("finding path", self.graph.find_path(start_id, end_id, kind, max_depth))
    }

    /// A failure yields an empty breadcrumb (no current node, zero counts)
    pub fn get_breadcrumb_navigation(&self, node_id: &str, max_depth: usize) -> Breadcrumb {
        swallow(
            "getting breadcrumb navigation",
            self.graph.get_breadcrumb(node_id, max_depth),
        )
    }

    /// A failure yields zeroed statistics
    pub fn get_graph_stats(&self) -> GraphStats {
        swallow("getting graph stats", self.graph.get_graph_stats())
    }

    /// Release the connection; a close failure is logged
    pub fn close(self) {
        if let Err(e) = self.graph.close() {
            log::warn!("Error closing database connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::node;
    use crate::graph::DEFAULT_KIND;

    fn drop_edges_table(lenient: &LenientGraph) {
        lenient
            .inner()
            .store()
            .conn()
            .execute_batch("DROP TABLE pdca_relationships;")
            .unwrap();
    }

    #[test]
    fn test_outcome_classification() {
        let found = QueryOutcome::from(Ok::<_, GraphError>(vec![1]));
        assert!(found.is_found());
        assert_eq!(found.found(), Some(vec![1]));
        let empty = QueryOutcome::from(Ok::<Vec<i32>, GraphError>(vec![]));
        assert!(empty.is_empty());
        let failed = QueryOutcome::<Option<i32>>::from(Err(GraphError::InvalidInput("x".to_string())));
        assert!(failed.is_failed());
        assert!(failed.into_result().is_err());
    }

    #[test]
    fn test_outcome_distinguishes_missing_from_failure() {
        let mut lenient = LenientGraph::open_in_memory().unwrap();
        assert!(lenient.add_pdca_node(&node("a", 1)));

        let missing = QueryOutcome::from(lenient.inner().get_predecessors("nonexistent", DEFAULT_KIND));
        assert!(missing.is_empty());

        drop_edges_table(&lenient);
        let broken = QueryOutcome::from(lenient.inner().get_predecessors("a", DEFAULT_KIND));
        assert!(broken.is_failed());
    }

    #[test]
    fn test_lenient_writes_report_bool() {
        let mut lenient = LenientGraph::open_in_memory().unwrap();
        assert!(lenient.add_pdca_node(&node("a", 1)));
        assert!(!lenient.add_pdca_node(&node("", 1)));
        assert!(lenient.add_relationship("a", "b", DEFAULT_KIND, 1.0, None));

        drop_edges_table(&lenient);
        assert!(!lenient.add_relationship("a", "b", DEFAULT_KIND, 1.0, None));
    }

    #[test]
    fn test_lenient_reads_swallow_failures() {
        let mut lenient = LenientGraph::open_in_memory().unwrap();
        assert!(lenient.add_pdca_node(&node("a", 1)));
        assert!(lenient.add_pdca_node(&node("b", 2)));
        assert!(lenient.add_relationship("a", "b", DEFAULT_KIND, 1.0, None));
        assert_eq!(lenient.get_successors("a", DEFAULT_KIND).len(), 1);
        assert_eq!(lenient.get_graph_stats().edge_count, 1);

        drop_edges_table(&lenient);
        assert!(lenient.get_successors("a", DEFAULT_KIND).is_empty());
        assert!(lenient.get_predecessors("b", DEFAULT_KIND).is_empty());
        assert!(lenient.find_path("a", "b", DEFAULT_KIND, 3).is_empty());
        let crumb = lenient.get_breadcrumb_navigation("a", 5);
        assert!(crumb.current.is_none());
        assert_eq!(crumb.successor_count, 0);
        let stats = lenient.get_graph_stats();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.density, 0.0);
        lenient.close();
    }

    #[test]
    fn test_lenient_writes_reject_blank_fields() {
        let mut lenient = LenientGraph::open_in_memory().unwrap();
        let mut nameless = node("a", 1);
        nameless.agent_name = "  ".to_string();
        assert!(!lenient.add_pdca_node(&nameless));
        let mut roleless = node("a", 1);
        roleless.agent_role = String::new();
        assert!(!lenient.add_pdca_node(&roleless));
        assert!(!lenient.add_relationship("a", "b", "", 1.0, None));
        assert!(!lenient.add_relationship("a", "b", DEFAULT_KIND, f64::NAN, None));

        assert!(lenient.inner().get_node("a").unwrap().is_none());
        assert_eq!(lenient.get_graph_stats().edge_count, 0);
    }
}
