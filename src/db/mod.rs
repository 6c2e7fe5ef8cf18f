use chrono::Utc;
use eyre::{eyre, Result, WrapErr};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod models;

pub use models::*;

/// SQL SELECT columns for the bridge_events table
const EVENT_SELECT: &str = r#"id, chain, event_kind, tx_hash, sender, recipient, token, amount,
    event_nonce, block_number, observed_at, processed, claimed_at"#;

/// Create a database connection pool
///
/// The file (and its parent directory) is created when missing. Every write
/// is committed with `synchronous = FULL`, so a returned call is durable.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .wrap_err_with(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5));

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .wrap_err("Failed to connect to database")
}

/// Where a `bridge_events` table in the pre-migration layout is moved to
const LEGACY_EVENTS_TABLE: &str = "bridge_events_legacy";

/// Run pending migrations (uses the migration files in migrations/)
///
/// Every migration uses `IF NOT EXISTS`, so this is safe to run against an
/// existing database file. A `bridge_events` table in the legacy layout
/// (`event`, `transactionHash`, `timestamp`) is renamed to
/// `bridge_events_legacy` first and its rows are copied into the new table
/// with their ids kept.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let columns = table_columns(pool, "bridge_events").await?;
    let has = |name: &str| columns.iter().any(|c| c == name);
    if has("transactionHash") && !has("tx_hash") {
        warn!(
            legacy_table = LEGACY_EVENTS_TABLE,
            "Found bridge_events in the legacy layout, moving it aside"
        );
        sqlx::query(&format!(
            "ALTER TABLE bridge_events RENAME TO {}",
            LEGACY_EVENTS_TABLE
        ))
        .execute(pool)
        .await
        .wrap_err("Failed to rename legacy bridge_events table")?;
    }

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;

    import_legacy_events(pool).await
}

async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await
        .wrap_err_with(|| format!("Failed to read columns of {}", table))
}

/// Copy rows from the legacy table. Rows already present are left alone,
/// so an interrupted upgrade finishes on the next start.
async fn import_legacy_events(pool: &SqlitePool) -> Result<()> {
    let columns = table_columns(pool, LEGACY_EVENTS_TABLE).await?;
    if columns.is_empty() {
        return Ok(());
    }
    let has = |name: &str| columns.iter().any(|c| c == name);

    // Older files were created before the processed column existed
    let processed = if has("processed") {
        "COALESCE(processed, 0) != 0"
    } else {
        "0"
    };
    let observed_at = if has("timestamp") {
        "strftime('%Y-%m-%dT%H:%M:%SZ', timestamp)"
    } else {
        "NULL"
    };

    let query = format!(
        r#"
        INSERT OR IGNORE INTO bridge_events (id, chain, event_kind, tx_hash, sender,
            recipient, amount, observed_at, processed)
        SELECT id, COALESCE(chain, 'unknown'), event, transactionHash, sender, recipient,
            amount, COALESCE({observed_at}, strftime('%Y-%m-%dT%H:%M:%SZ', 'now')), {processed}
        FROM {table}
        WHERE event IN ('Deposit', 'Distribution') AND transactionHash IS NOT NULL
        ORDER BY id
        "#,
        observed_at = observed_at,
        processed = processed,
        table = LEGACY_EVENTS_TABLE,
    );

    let result = sqlx::query(&query)
        .execute(pool)
        .await
        .wrap_err("Failed to import legacy bridge events")?;

    if result.rows_affected() > 0 {
        info!(
            imported = result.rows_affected(),
            legacy_table = LEGACY_EVENTS_TABLE,
            "Imported legacy bridge events"
        );
    }
    Ok(())
}

/// Insert an event unless its transaction hash is already stored.
///
/// Returns `true` when a new row was created. A duplicate hash is expected
/// steady-state behaviour (every scan re-reads its window) and is not an error.
pub async fn insert_event_if_absent(pool: &SqlitePool, event: &NewBridgeEvent) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO bridge_events (chain, event_kind, tx_hash, sender, recipient, token,
            amount, event_nonce, block_number, observed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (tx_hash) DO NOTHING
        "#,
    )
    .bind(&event.chain)
    .bind(event.event_kind.as_str())
    .bind(&event.tx_hash)
    .bind(&event.sender)
    .bind(&event.recipient)
    .bind(&event.token)
    .bind(&event.amount)
    .bind(&event.event_nonce)
    .bind(event.block_number)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| {
        error!(
            error = %e,
            chain = %event.chain,
            tx_hash = %event.tx_hash,
            "Database error inserting bridge event"
        );
        e
    })
    .wrap_err_with(|| format!("Failed to insert bridge event {}", event.tx_hash))?;

    let inserted = result.rows_affected() == 1;
    if !inserted {
        debug!(
            chain = %event.chain,
            event_kind = %event.event_kind,
            tx_hash = %event.tx_hash,
            "Event already stored"
        );
    }
    Ok(inserted)
}

/// Get unprocessed deposits, oldest first
///
/// Rows currently claimed by a relay attempt are included; the claim step
/// decides whether they can be relayed.
pub async fn get_unprocessed_deposits(pool: &SqlitePool) -> Result<Vec<BridgeEvent>> {
    let query = format!(
        "SELECT {} FROM bridge_events WHERE event_kind = 'Deposit' AND processed = 0 ORDER BY id ASC",
        EVENT_SELECT
    );
    let rows = sqlx::query_as::<_, BridgeEvent>(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!("SQL error getting unprocessed deposits: {:?}", e);
            e
        })
        .wrap_err("Failed to get unprocessed deposits")?;

    Ok(rows)
}

/// Mark the deposit with this transaction hash as processed.
///
/// Idempotent: returns `false` when the row is absent or already processed.
pub async fn mark_processed(pool: &SqlitePool, tx_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE bridge_events SET processed = 1, claimed_at = NULL
           WHERE tx_hash = ? AND processed = 0"#,
    )
    .bind(tx_hash)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to mark event {} as processed", tx_hash))?;

    Ok(result.rows_affected() == 1)
}

/// Atomically claim an unprocessed deposit for relaying.
///
/// Succeeds when the row is unclaimed, or when its previous claim is older
/// than `lease` (the worker holding it crashed or hung). Returns `true` iff
/// this caller now owns the claim.
pub async fn claim_deposit(pool: &SqlitePool, id: i64, lease: Duration) -> Result<bool> {
    let now = Utc::now().timestamp();
    let lease_secs = i64::try_from(lease.as_secs()).unwrap_or(i64::MAX);
    let stale_before = now.saturating_sub(lease_secs);

    let result = sqlx::query(
        r#"UPDATE bridge_events SET claimed_at = ?
           WHERE id = ? AND event_kind = 'Deposit' AND processed = 0
             AND (claimed_at IS NULL OR claimed_at <= ?)"#,
    )
    .bind(now)
    .bind(id)
    .bind(stale_before)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to claim deposit {}", id))?;

    Ok(result.rows_affected() == 1)
}

/// Release a claim after a failed relay attempt so the next cycle retries it
pub async fn release_claim(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(r#"UPDATE bridge_events SET claimed_at = NULL WHERE id = ? AND processed = 0"#)
        .bind(id)
        .execute(pool)
        .await
        .wrap_err_with(|| format!("Failed to release claim on deposit {}", id))?;

    Ok(())
}

/// Get an event by transaction hash
pub async fn get_event_by_tx_hash(pool: &SqlitePool, tx_hash: &str) -> Result<Option<BridgeEvent>> {
    let query = format!("SELECT {} FROM bridge_events WHERE tx_hash = ?", EVENT_SELECT);
    let row = sqlx::query_as::<_, BridgeEvent>(&query)
        .bind(tx_hash)
        .fetch_optional(pool)
        .await
        .wrap_err("Failed to get event by tx_hash")?;

    Ok(row)
}

/// Get the last fully scanned block for a chain
pub async fn get_last_scanned_block(pool: &SqlitePool, chain: &str) -> Result<Option<u64>> {
    let row: Option<(i64,)> =
        sqlx::query_as(r#"SELECT last_scanned_block FROM chain_checkpoints WHERE chain = ?"#)
            .bind(chain)
            .fetch_optional(pool)
            .await
            .wrap_err("Failed to get last scanned block")?;

    row.map(|r| {
        u64::try_from(r.0).map_err(|_| eyre!("Negative checkpoint {} for chain {}", r.0, chain))
    })
    .transpose()
}

/// Advance the checkpoint for a chain. Never moves it backwards.
pub async fn update_last_scanned_block(pool: &SqlitePool, chain: &str, block: u64) -> Result<()> {
    let block = i64::try_from(block).wrap_err("Block number exceeds i64 range")?;

    sqlx::query(
        r#"
        INSERT INTO chain_checkpoints (chain, last_scanned_block, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (chain) DO UPDATE SET
            last_scanned_block = MAX(chain_checkpoints.last_scanned_block, excluded.last_scanned_block),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(chain)
    .bind(block)
    .bind(Utc::now())
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to update last scanned block for chain {}", chain))?;

    Ok(())
}

/// Get all chain checkpoints
pub async fn get_checkpoints(pool: &SqlitePool) -> Result<Vec<ChainCheckpoint>> {
    let rows = sqlx::query_as::<_, ChainCheckpoint>(
        r#"SELECT chain, last_scanned_block, updated_at FROM chain_checkpoints ORDER BY chain"#,
    )
    .fetch_all(pool)
    .await
    .wrap_err("Failed to get chain checkpoints")?;

    Ok(rows)
}

/// Count unprocessed deposits
pub async fn count_unprocessed_deposits(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"SELECT COUNT(*) FROM bridge_events WHERE event_kind = 'Deposit' AND processed = 0"#,
    )
    .fetch_one(pool)
    .await
    .wrap_err("Failed to count unprocessed deposits")?;

    Ok(row.0)
}

/// Count all stored events
pub async fn count_events(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM bridge_events"#)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to count events")?;

    Ok(row.0)
}
