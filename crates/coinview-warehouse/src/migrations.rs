use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_assets",
        sql: r#"
CREATE TABLE IF NOT EXISTS assets (
    asset_id TEXT UNIQUE,
    name TEXT,
    type_is_crypto INTEGER NOT NULL DEFAULT 0,
    data_quote_start TEXT,
    data_quote_end TEXT,
    data_orderbook_start TEXT,
    data_orderbook_end TEXT,
    data_trade_start TEXT,
    data_trade_end TEXT,
    data_symbols_count BIGINT,
    volume_1hrs_usd DOUBLE,
    volume_1day_usd DOUBLE,
    volume_1mth_usd DOUBLE,
    price_usd DOUBLE,
    is_favorite BOOLEAN NOT NULL DEFAULT FALSE,
    last_fetched TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_user_preferences",
        sql: r#"
CREATE TABLE IF NOT EXISTS user_preferences (
    id INTEGER PRIMARY KEY,
    search_text TEXT NOT NULL DEFAULT '',
    favorites_only BOOLEAN NOT NULL DEFAULT FALSE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [migration.version],
        )?;
        tracing::debug!(version = migration.version, "applied warehouse migration");
    }

    Ok(())
}
