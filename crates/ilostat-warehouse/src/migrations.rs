use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_dataset_catalog",
        sql: r#"
CREATE TABLE IF NOT EXISTS dataset_catalog (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    source_dataflow TEXT NOT NULL,
    row_count BIGINT NOT NULL,
    published_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_dataset_catalog_source_index",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_dataset_catalog_source ON dataset_catalog(source_dataflow);
"#,
    },
];

/// Applies every migration not yet recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<usize, ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let seen: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if seen > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [migration.version],
        )?;
        applied += 1;
    }

    Ok(applied)
}
