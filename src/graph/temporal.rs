//! Timeline reads over node attributes, served by the date, agent and
//! timestamp indexes.

use chrono::NaiveDate;
use rusqlite::ToSql;

use super::{node_from_row, PdcaGraph, PdcaNode, DATE_FORMAT, NODE_COLUMNS};
use crate::error::Result;

impl PdcaGraph {
    /// Nodes recorded on `date`, oldest first
    pub fn nodes_on_date(&self, date: NaiveDate) -> Result<Vec<PdcaNode>> {
        let date = date.format(DATE_FORMAT).to_string();
        self.query_nodes("p.date = ?1", &[&date])
    }

    /// Nodes recorded by `agent_name`, oldest first
    pub fn nodes_by_agent(&self, agent_name: &str) -> Result<Vec<PdcaNode>> {
        self.query_nodes("p.agent_name = ?1", &[&agent_name])
    }

    /// Nodes with a timestamp strictly after `after` (all nodes for `None`),
    /// oldest first
    pub fn timeline(&self, after: Option<i64>) -> Result<Vec<PdcaNode>> {
        match after {
            Some(ts) => self.query_nodes("p.timestamp > ?1", &[&ts]),
            None => self.query_nodes("1 = 1", &[]),
        }
    }

    fn query_nodes(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<PdcaNode>> {
        let sql = format!(
            "SELECT {} FROM pdcas p WHERE {} ORDER BY p.timestamp, p.id",
            NODE_COLUMNS, filter
        );
        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let nodes = stmt
            .query_map(args, |row| node_from_row(row, 0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        log::debug!("Timeline query [{}] matched {} nodes", filter, nodes.len());
        Ok(nodes)
    }
}
