use rusqlite::{params, Connection};
use crate::error::{GraphError, Result};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Schema history, applied in version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_pdca_graph",
        sql: r#"
            CREATE TABLE IF NOT EXISTS pdcas (
                id TEXT PRIMARY KEY,
                agent_name TEXT NOT NULL,
                agent_role TEXT NOT NULL,
                date TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                session_id TEXT,
                branch TEXT,
                sprint TEXT,
                cmm_level INTEGER,
                task_type TEXT,
                objective TEXT,
                quality_score REAL,
                verification_status TEXT,
                file_path TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE IF NOT EXISTS pdca_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_pdca_id TEXT NOT NULL,
                to_pdca_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL DEFAULT 'PRECEDES',
                weight REAL NOT NULL DEFAULT 1.0,
                metadata TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                FOREIGN KEY (from_pdca_id) REFERENCES pdcas(id),
                FOREIGN KEY (to_pdca_id) REFERENCES pdcas(id),
                UNIQUE (from_pdca_id, to_pdca_id, relationship_type)
            );

            CREATE INDEX IF NOT EXISTS idx_pdca_relationships_from
                ON pdca_relationships(from_pdca_id);
            CREATE INDEX IF NOT EXISTS idx_pdca_relationships_to
                ON pdca_relationships(to_pdca_id);
            CREATE INDEX IF NOT EXISTS idx_pdca_relationships_type
                ON pdca_relationships(relationship_type);
            CREATE INDEX IF NOT EXISTS idx_pdcas_date ON pdcas(date);
            CREATE INDEX IF NOT EXISTS idx_pdcas_agent ON pdcas(agent_name);
        "#,
    },
    Migration {
        version: 2,
        name: "002_pdcas_timestamp_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_pdcas_timestamp ON pdcas(timestamp);",
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(GraphError::Database)?;
    Ok(names)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;

        tx.execute_batch(migration.sql).map_err(|e| {
            GraphError::Migration(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;

        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    Ok(())
}
