//! Node and edge writes. Each call runs in its own committed transaction.

use rusqlite::params;

use super::{EdgeMetadata, PdcaGraph, PdcaNode, DATE_FORMAT, DEFAULT_KIND, DEFAULT_WEIGHT};
use crate::error::{GraphError, Result};

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidInput(format!("{} must be set", what)));
    }
    Ok(())
}

impl PdcaGraph {
    /// Insert a node or overwrite every attribute of the node with the same id
    pub fn upsert_node(&mut self, node: &PdcaNode) -> Result<()> {
        require(&node.id, "node id")?;
        require(&node.agent_name, "agent name")?;
        require(&node.agent_role, "agent role")?;
        if node.quality_score.is_some_and(|s| !s.is_finite()) {
            return Err(GraphError::InvalidInput(format!(
                "quality score of {} must be finite",
                node.id
            )));
        }

        let tx = self.store.conn_mut().transaction()?;
        // Edges reference pdcas(id), so update in place rather than delete-and-insert
        tx.execute(
            r#"
            INSERT INTO pdcas (
                id, agent_name, agent_role, date, timestamp,
                session_id, branch, sprint, cmm_level, task_type,
                objective, quality_score, verification_status, file_path
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                agent_name = excluded.agent_name,
                agent_role = excluded.agent_role,
                date = excluded.date,
                timestamp = excluded.timestamp,
                session_id = excluded.session_id,
                branch = excluded.branch,
                sprint = excluded.sprint,
                cmm_level = excluded.cmm_level,
                task_type = excluded.task_type,
                objective = excluded.objective,
                quality_score = excluded.quality_score,
                verification_status = excluded.verification_status,
                file_path = excluded.file_path,
                created_at = excluded.created_at
            "#,
            params![
                node.id,
                node.agent_name,
                node.agent_role,
                node.date.format(DATE_FORMAT).to_string(),
                node.timestamp,
                node.session_id,
                node.branch,
                node.sprint,
                node.cmm_level,
                node.task_type,
                node.objective,
                node.quality_score,
                node.verification_status,
                node.file_path,
            ],
        )?;
        tx.commit()?;

        log::debug!("Upserted PDCA node: {}", node.id);
        Ok(())
    }

    /// Insert an edge or overwrite weight and metadata of the existing
    /// (from, to, kind) edge. The endpoints need not exist yet.
    ///
    /// `None` metadata is stored as SQL NULL; an empty bundle is stored as `{}`.
    pub fn upsert_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: &str,
        weight: f64,
        metadata: Option<&EdgeMetadata>,
    ) -> Result<()> {
        require(from_id, "source node id")?;
        require(to_id, "target node id")?;
        require(kind, "relationship kind")?;
        if !weight.is_finite() {
            return Err(GraphError::InvalidInput(format!(
                "weight of {} -> {} must be finite",
                from_id, to_id
            )));
        }

        let metadata_json = metadata.map(EdgeMetadata::to_json).transpose()?;

        let tx = self.store.conn_mut().transaction()?;
        // REPLACE re-inserts the row, so a rewritten edge counts as the newest
        tx.execute(
            r#"
            INSERT OR REPLACE INTO pdca_relationships (
                from_pdca_id, to_pdca_id, relationship_type, weight, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![from_id, to_id, kind, weight, metadata_json],
        )?;
        tx.commit()?;

        log::debug!("Upserted relationship: {} -[{}]-> {}", from_id, kind, to_id);
        Ok(())
    }

    /// Upsert a default-kind, default-weight edge without metadata
    pub fn link(&mut self, from_id: &str, to_id: &str) -> Result<()> {
        self.upsert_edge(from_id, to_id, DEFAULT_KIND, DEFAULT_WEIGHT, None)
    }
}
