pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod compat;

pub use config::Config;
pub use error::{GraphError, Result};
pub use db::Store;
pub use graph::{
    Breadcrumb, EdgeMetadata, GraphStats, Neighbor, PathStep, PdcaGraph, PdcaNode,
    RankedCandidate, Relationship,
};
pub use compat::{LenientGraph, QueryOutcome};
