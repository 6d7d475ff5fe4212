//! PDCA relationship graph: typed entities and the query engine.
//!
//! Nodes live in `pdcas`, directed typed edges in `pdca_relationships`.
//! [`PdcaGraph`] holds the store handle and re-reads the tables on every
//! call; there is no in-memory copy of the graph to keep consistent.

mod neighbors;
mod path;
mod stats;
mod temporal;
mod upsert;

pub use neighbors::{Breadcrumb, RankedCandidate, SeededBreadcrumb};
pub use path::PathStep;
pub use stats::{ConnectedNode, GraphStats};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::StoreConfig;
use crate::db::Store;
use crate::error::Result;

/// Relationship kind used when the caller does not name one
pub const DEFAULT_KIND: &str = "PRECEDES";
/// Edge weight used when the caller does not supply one
pub const DEFAULT_WEIGHT: f64 = 1.0;
/// Default hop limit for path search
pub const DEFAULT_PATH_DEPTH: u32 = 10;
/// Default number of neighbors shown per side in a breadcrumb
pub const DEFAULT_BREADCRUMB_DEPTH: usize = 5;
/// Default length of the most-connected list in statistics
pub const DEFAULT_TOP_CONNECTED: usize = 10;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Node columns in the order [`node_from_row`] reads them, qualified by alias `p`.
pub(crate) const NODE_COLUMNS: &str = "p.id, p.agent_name, p.agent_role, p.date, p.timestamp, \
     p.session_id, p.branch, p.sprint, p.cmm_level, p.task_type, p.objective, \
     p.quality_score, p.verification_status, p.file_path, p.created_at";
pub(crate) const NODE_COLUMN_COUNT: usize = 15;

/// A PDCA record: one recorded unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdcaNode {
    /// Globally unique key, conventionally `timestamp-agent.role`
    pub id: String,
    pub agent_name: String,
    pub agent_role: String,
    pub date: NaiveDate,
    /// Seconds since epoch, used for ordering
    pub timestamp: i64,
    pub session_id: Option<String>,
    pub branch: Option<String>,
    pub sprint: Option<String>,
    pub cmm_level: Option<i64>,
    pub task_type: Option<String>,
    pub objective: Option<String>,
    pub quality_score: Option<f64>,
    pub verification_status: Option<String>,
    pub file_path: Option<String>,
    /// Assigned by the store; ignored on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

impl PdcaNode {
    /// Create a node with the required attributes and no optional fields
    pub fn new(
        id: impl Into<String>,
        agent_name: impl Into<String>,
        agent_role: impl Into<String>,
        date: NaiveDate,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            agent_name: agent_name.into(),
            agent_role: agent_role.into(),
            date,
            timestamp,
            session_id: None,
            branch: None,
            sprint: None,
            cmm_level: None,
            task_type: None,
            objective: None,
            quality_score: None,
            verification_status: None,
            file_path: None,
            created_at: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_sprint(mut self, sprint: impl Into<String>) -> Self {
        self.sprint = Some(sprint.into());
        self
    }

    pub fn with_cmm_level(mut self, level: i64) -> Self {
        self.cmm_level = Some(level);
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    pub fn with_verification_status(mut self, status: impl Into<String>) -> Self {
        self.verification_status = Some(status.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// Key/value bundle attached to an edge, stored as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeMetadata(BTreeMap<String, serde_json::Value>);

impl EdgeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Encode for the `metadata` column
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Decode a `metadata` column value
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }
}

/// A node reached over one edge, with that edge's attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    #[serde(flatten)]
    pub node: PdcaNode,
    pub weight: f64,
    pub metadata: Option<EdgeMetadata>,
    pub relationship_created: NaiveDateTime,
}

/// A stored edge row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub id: i64,
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
    pub weight: f64,
    pub metadata: Option<EdgeMetadata>,
    pub created_at: NaiveDateTime,
}

/// Graph query engine over a single store connection
pub struct PdcaGraph {
    store: Store,
}

impl PdcaGraph {
    /// Wrap an already opened store
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Open the store at `db_path` and build an engine on it
    pub fn open<P: AsRef<Path>>(db_path: P, config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(Store::open(db_path, config)?))
    }

    /// Engine over a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Store::open_in_memory()?))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Release the store connection
    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

fn conversion_error(
    idx: usize,
    ty: rusqlite::types::Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

pub(crate) fn parse_created_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, CREATED_AT_FORMAT)
        .map_err(|e| conversion_error(idx, rusqlite::types::Type::Text, e))
}

pub(crate) fn parse_metadata(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<EdgeMetadata>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t).map_err(|e| conversion_error(idx, rusqlite::types::Type::Text, e))
    })
    .transpose()
}

/// Read a node starting at column `offset` (see [`NODE_COLUMNS`])
pub(crate) fn node_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<PdcaNode> {
    let date_text: String = row.get(offset + 3)?;
    let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT)
        .map_err(|e| conversion_error(offset + 3, rusqlite::types::Type::Text, e))?;

    Ok(PdcaNode {
        id: row.get(offset)?,
        agent_name: row.get(offset + 1)?,
        agent_role: row.get(offset + 2)?,
        date,
        timestamp: row.get(offset + 4)?,
        session_id: row.get(offset + 5)?,
        branch: row.get(offset + 6)?,
        sprint: row.get(offset + 7)?,
        cmm_level: row.get(offset + 8)?,
        task_type: row.get(offset + 9)?,
        objective: row.get(offset + 10)?,
        quality_score: row.get(offset + 11)?,
        verification_status: row.get(offset + 12)?,
        file_path: row.get(offset + 13)?,
        created_at: Some(parse_created_at(row, offset + 14)?),
    })
}
