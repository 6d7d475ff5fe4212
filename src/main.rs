use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pdca_graph::graph::{PdcaGraph, PdcaNode, DEFAULT_WEIGHT};
use pdca_graph::{Config, EdgeMetadata};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "pdca-graph")]
#[command(about = "Record and query the PDCA relationship graph")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and schema if missing
    Init,

    /// Insert or overwrite a PDCA node
    AddNode {
        #[arg(long)]
        id: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        role: String,
        /// Calendar date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Seconds since epoch
        #[arg(long)]
        timestamp: i64,
        #[arg(long)]
        objective: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        sprint: Option<String>,
        #[arg(long)]
        cmm_level: Option<i64>,
        #[arg(long)]
        task_type: Option<String>,
        #[arg(long)]
        quality_score: Option<f64>,
        #[arg(long)]
        verification_status: Option<String>,
        #[arg(long)]
        file_path: Option<String>,
    },

    /// Insert or overwrite a relationship
    AddEdge {
        from: String,
        to: String,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long, default_value_t = DEFAULT_WEIGHT)]
        weight: f64,
        /// Metadata entry KEY=VALUE; VALUE is parsed as JSON, else kept as text
        #[arg(short, long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, serde_json::Value)>,
    },

    /// Nodes with an edge into ID
    Predecessors {
        id: String,
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Nodes an edge out of ID points to
    Successors {
        id: String,
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Node with its immediate predecessors and successors
    Breadcrumb {
        id: String,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Search forward from START towards END
    Path {
        start: String,
        end: String,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        max_depth: Option<u32>,
        /// Early-exit shortest path instead of the frontier search
        #[arg(long)]
        shortest: bool,
    },

    /// Nodes ordered by timestamp
    Timeline {
        /// Only nodes strictly after this timestamp
        #[arg(long)]
        after: Option<i64>,
        #[arg(long, conflicts_with_all = ["agent", "after"])]
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "after")]
        agent: Option<String>,
    },

    /// Graph statistics
    Stats {
        #[arg(short, long)]
        top: Option<usize>,
    },
}

fn parse_meta(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {}", raw))?;
    if key.is_empty() {
        return Err(format!("empty metadata key in {}", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn config_source(config: &Config) -> String {
    match &config.source {
        Some(path) => format!("Configuration loaded from {}", path.display()),
        None => "No config file found, using built-in defaults".to_string(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    // Config loading runs before the logger exists and cannot log itself
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.store.log_level),
    )
    .init();
    log::info!("{}", config_source(&config));
    log::info!("Database path: {}", config.db_path().display());

    let mut graph = PdcaGraph::open(config.db_path(), &config.store)
        .with_context(|| format!("Failed to open graph store {}", config.db_path().display()))?;

    let outcome = run(&mut graph, &config, args.command);
    // Release the connection on every path, then surface the command's result
    graph.close().context("Failed to close graph store")?;
    outcome
}

fn run(graph: &mut PdcaGraph, config: &Config, command: Command) -> Result<()> {
    let kind_or_default = |kind: Option<String>| kind.unwrap_or_else(|| config.query.default_kind.clone());

    match command {
        Command::Init => {
            log::info!("Graph store ready at {}", config.db_path().display());
        }
        Command::AddNode {
            id,
            agent,
            role,
            date,
            timestamp,
            objective,
            session_id,
            branch,
            sprint,
            cmm_level,
            task_type,
            quality_score,
            verification_status,
            file_path,
        } => {
            let node = PdcaNode {
                objective,
                session_id,
                branch,
                sprint,
                cmm_level,
                task_type,
                quality_score,
                verification_status,
                file_path,
                ..PdcaNode::new(id, agent, role, date, timestamp)
            };
            graph.upsert_node(&node)?;
            log::info!("Recorded node {}", node.id);
        }
        Command::AddEdge { from, to, kind, weight, meta } => {
            let kind = kind_or_default(kind);
            let metadata = if meta.is_empty() {
                None
            } else {
                let mut bundle = EdgeMetadata::new();
                for (key, value) in meta {
                    bundle.insert(key, value);
                }
                Some(bundle)
            };
            graph.upsert_edge(&from, &to, &kind, weight, metadata.as_ref())?;
            log::info!("Recorded relationship {} -[{}]-> {}", from, kind, to);
        }
        Command::Predecessors { id, kind } => {
            print_json(&graph.get_predecessors(&id, &kind_or_default(kind))?)?;
        }
        Command::Successors { id, kind } => {
            print_json(&graph.get_successors(&id, &kind_or_default(kind))?)?;
        }
        Command::Breadcrumb { id, kind, depth } => {
            let depth = depth.unwrap_or(config.query.breadcrumb_depth);
            print_json(&graph.get_breadcrumb_for_kind(&id, &kind_or_default(kind), depth)?)?;
        }
        Command::Path { start, end, kind, max_depth, shortest } => {
            let kind = kind_or_default(kind);
            let max_depth = max_depth.unwrap_or(config.query.path_max_depth);
            if shortest {
                match graph.shortest_path(&start, &end, &kind, max_depth)? {
                    Some(chain) => print_json(&chain)?,
                    None => log::warn!("No path from {} to {} within {} hops", start, end, max_depth),
                }
            } else {
                let steps = graph.find_path(&start, &end, &kind, max_depth)?;
                if !steps.iter().any(|s| s.node.id == end) {
                    log::warn!("{} not reached; rows are the depth-{} frontier", end, max_depth);
                }
                print_json(&steps)?;
            }
        }
        Command::Timeline { after, date, agent } => {
            let nodes = match (date, agent) {
                (Some(date), _) => graph.nodes_on_date(date)?,
                (None, Some(agent)) => graph.nodes_by_agent(&agent)?,
                (None, None) => graph.timeline(after)?,
            };
            print_json(&nodes)?;
        }
        Command::Stats { top } => {
            let top = top.unwrap_or(config.query.top_connected);
            print_json(&graph.get_graph_stats_top(top)?)?;
        }
    }

    Ok(())
}
