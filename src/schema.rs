//! Database schema management for `tankflow`.
//!
//! Ensures the two hosted tables exist before serving requests: the
//! `milk_reception` movement ledger and the `milk_tank_offloads` audit
//! table. Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

// Ledger ids are decoded as i64 (`RawMovementRow.id`); the Postgres driver
// will not widen INT4, so the column must be BIGSERIAL.
const MILK_RECEPTION_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS milk_reception (
        id            BIGSERIAL PRIMARY KEY,
        tank_number   TEXT             NOT NULL,
        milk_volume   DOUBLE PRECISION NOT NULL,
        supplier_name TEXT             NOT NULL,
        quality_score TEXT,
        temperature   DOUBLE PRECISION,
        destination   TEXT,
        created_at    TIMESTAMPTZ      NOT NULL DEFAULT now()
    );
"#;

const MILK_TANK_OFFLOADS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS milk_tank_offloads (
        id               BIGSERIAL PRIMARY KEY,
        batch_id         TEXT             NOT NULL,
        storage_tank     TEXT             NOT NULL,
        volume_offloaded DOUBLE PRECISION NOT NULL,
        temperature      DOUBLE PRECISION,
        quality_check    TEXT,
        destination      TEXT,
        notes            TEXT,
        created_at       TIMESTAMPTZ      NOT NULL DEFAULT now()
    );
"#;

/// Create or update the database schema (idempotent).
///
/// Safe to call on every startup; no-op if objects already exist.
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // The movement ledger: signed volume deltas per tank.
    sqlx::query(MILK_RECEPTION_DDL).execute(&mut *tx).await?;

    // Audit rows for offloads; each carries a generated batch id.
    sqlx::query(MILK_TANK_OFFLOADS_DDL).execute(&mut *tx).await?;

    // Basic indexes for the per-tank scans and ordered fetches.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_milk_reception_tank_number
            ON milk_reception (tank_number);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_milk_reception_created_at
            ON milk_reception (created_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_ledger_id_column_is_eight_bytes() {
        // ---
        // `RawMovementRow.id` is i64; an INT4 id column would make every
        // ledger fetch fail to decode.
        assert!(MILK_RECEPTION_DDL.contains("id            BIGSERIAL"));
        assert!(MILK_TANK_OFFLOADS_DDL.contains("id               BIGSERIAL"));
    }
}
