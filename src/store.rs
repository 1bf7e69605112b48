//! Record-store access for the movement ledger and offload audit table.
//!
//! [`MovementStore`] is the seam between the core and the hosted tables:
//! `milk_reception` (the ledger) and `milk_tank_offloads` (audit rows that
//! answer with a generated batch id). [`PgMovementStore`] is the production
//! implementation; [`MemoryMovementStore`] backs tests and database-less
//! runs.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{MovementRecord, NewMovement, NewOffload, RawMovementRow, Tank};

// ---

#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Fetch the full ledger, ordered by creation time.
    async fn fetch_movements(&self) -> Result<Vec<MovementRecord>, StoreError>;

    /// Append a signed movement to the ledger.
    async fn insert_movement(&self, movement: NewMovement) -> Result<(), StoreError>;

    /// Record an offload audit row; returns the generated batch id.
    async fn insert_offload(&self, offload: NewOffload) -> Result<String, StoreError>;
}

/// Batch ids look like `TKA-20260830-1f2e3d4c`.
fn generate_batch_id(tank: &Tank) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        tank.short_code(),
        Utc::now().format("%Y%m%d"),
        &suffix[..8]
    )
}

// ---

/// PostgreSQL-backed store.
pub struct PgMovementStore {
    pool: PgPool,
}

impl PgMovementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovementStore for PgMovementStore {
    async fn fetch_movements(&self) -> Result<Vec<MovementRecord>, StoreError> {
        // ---
        let rows: Vec<RawMovementRow> = sqlx::query_as(
            r#"
            SELECT id, tank_number, milk_volume, supplier_name, quality_score,
                   temperature, destination, created_at
            FROM milk_reception
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match MovementRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(bad) => warn!("skipping malformed ledger row: {bad}"),
            }
        }
        Ok(records)
    }

    async fn insert_movement(&self, movement: NewMovement) -> Result<(), StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO milk_reception (
                tank_number, milk_volume, supplier_name,
                quality_score, temperature, destination
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(movement.tank.label())
        .bind(movement.volume_liters)
        .bind(&movement.supplier_name)
        .bind(&movement.quality_grade)
        .bind(movement.temperature_c)
        .bind(&movement.destination)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_offload(&self, offload: NewOffload) -> Result<String, StoreError> {
        // ---
        let batch_id = generate_batch_id(&offload.storage_tank);

        sqlx::query(
            r#"
            INSERT INTO milk_tank_offloads (
                batch_id, storage_tank, volume_offloaded,
                temperature, quality_check, destination, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&batch_id)
        .bind(offload.storage_tank.label())
        .bind(offload.volume_offloaded)
        .bind(offload.temperature_c)
        .bind(&offload.quality_check)
        .bind(&offload.destination)
        .bind(&offload.notes)
        .execute(&self.pool)
        .await?;

        Ok(batch_id)
    }
}

// ---

/// In-memory store used by tests and database-less local runs.
///
/// Fetch failures can be injected once via [`MemoryMovementStore::fail_next_fetch`]
/// to exercise the stale-snapshot path.
#[derive(Default)]
pub struct MemoryMovementStore {
    movements: Mutex<Vec<MovementRecord>>,
    offloads: Mutex<Vec<(String, NewOffload)>>,
    next_id: AtomicI64,
    fail_fetch: AtomicBool,
    fail_movement_insert: AtomicBool,
    fail_offload_insert: AtomicBool,
}

impl MemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, bypassing id and timestamp assignment.
    pub fn seed(&self, record: MovementRecord) {
        self.movements
            .lock()
            .expect("movement lock poisoned")
            .push(record);
    }

    /// Make the next `fetch_movements` call fail.
    pub fn fail_next_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    /// Make the next `insert_movement` call fail.
    pub fn fail_next_movement_insert(&self) {
        self.fail_movement_insert.store(true, Ordering::SeqCst);
    }

    /// Make the next `insert_offload` call fail.
    pub fn fail_next_offload_insert(&self) {
        self.fail_offload_insert.store(true, Ordering::SeqCst);
    }

    /// Batch ids of every audit row recorded so far.
    pub fn recorded_batch_ids(&self) -> Vec<String> {
        self.offloads
            .lock()
            .expect("offload lock poisoned")
            .iter()
            .map(|(batch_id, _)| batch_id.clone())
            .collect()
    }

    /// Number of ledger movements currently held.
    pub fn movement_count(&self) -> usize {
        self.movements.lock().expect("movement lock poisoned").len()
    }
}

#[async_trait]
impl MovementStore for MemoryMovementStore {
    async fn fetch_movements(&self) -> Result<Vec<MovementRecord>, StoreError> {
        // ---
        if self.fail_fetch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        let mut records = self.movements.lock().expect("movement lock poisoned").clone();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    async fn insert_movement(&self, movement: NewMovement) -> Result<(), StoreError> {
        // ---
        if self.fail_movement_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected movement insert failure".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.movements
            .lock()
            .expect("movement lock poisoned")
            .push(MovementRecord {
                id: format!("mem-{id}"),
                tank: movement.tank,
                volume_liters: movement.volume_liters,
                supplier_name: movement.supplier_name,
                quality_grade: movement.quality_grade,
                temperature_c: movement.temperature_c,
                destination: movement.destination,
                recorded_at: Utc::now(),
            });
        Ok(())
    }

    async fn insert_offload(&self, offload: NewOffload) -> Result<String, StoreError> {
        // ---
        if self.fail_offload_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected offload insert failure".to_string(),
            ));
        }
        let batch_id = generate_batch_id(&offload.storage_tank);
        self.offloads
            .lock()
            .expect("offload lock poisoned")
            .push((batch_id.clone(), offload));
        Ok(batch_id)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_batch_id_shape() {
        // ---
        let id = generate_batch_id(&Tank::StorageA);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TKA");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        // ---
        let store = MemoryMovementStore::new();
        store
            .insert_movement(NewMovement {
                tank: Tank::DirectProcessing,
                volume_liters: 500.0,
                supplier_name: "Nshwere Co-op".to_string(),
                quality_grade: Some("Grade A".to_string()),
                temperature_c: Some(4.0),
                destination: None,
            })
            .await
            .unwrap();

        let records = store.fetch_movements().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tank, Tank::DirectProcessing);
        assert_eq!(records[0].volume_liters, 500.0);
    }

    #[tokio::test]
    async fn test_injected_fetch_failure_is_one_shot() {
        // ---
        let store = MemoryMovementStore::new();
        store.fail_next_fetch();
        assert!(store.fetch_movements().await.is_err());
        assert!(store.fetch_movements().await.is_ok());
    }
}
