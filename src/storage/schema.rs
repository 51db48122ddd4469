// Tables for suites, jobs, series, extras and stats.
// Keyed rows use six NOT NULL key columns; an absent DataSource segment is stored as ''.

use sqlx::SqlitePool;

pub(super) const SCHEMA_VERSION: i64 = 1;

const KEY_COLUMNS: &str = "suite_id TEXT NOT NULL, job_id TEXT NOT NULL, node_id TEXT NOT NULL, \
                           dev TEXT NOT NULL, sensor TEXT NOT NULL, tag TEXT NOT NULL";

const KEY_PRIMARY: &str = "PRIMARY KEY (suite_id, job_id, node_id, dev, sensor, tag)";

pub(super) async fn init_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (key, value) VALUES ('results', $1)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suites (
            storage_id TEXT PRIMARY KEY,
            test_type TEXT NOT NULL,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_suites_test_type ON suites(test_type)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            suite_id TEXT NOT NULL,
            job_id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (suite_id, job_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS series ({KEY_COLUMNS},
            name TEXT NOT NULL,
            units TEXT NOT NULL,
            time_units TEXT NOT NULL,
            second_axis_size INTEGER NOT NULL,
            times BLOB NOT NULL,
            data BLOB NOT NULL,
            raw BLOB,
            {KEY_PRIMARY})"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS extras ({KEY_COLUMNS}, data BLOB NOT NULL, {KEY_PRIMARY})"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS stats ({KEY_COLUMNS},
            kind TEXT NOT NULL,
            data TEXT NOT NULL,
            {KEY_PRIMARY})"
    ))
    .execute(pool)
    .await?;

    Ok(())
}
