//! Offload validation and submission.
//!
//! Before a negative movement is written, the requested volume is checked
//! against the chosen tank's available volume in the current snapshot. For
//! the physical tanks a shortfall answer names the other tank when it could
//! take the request instead; the Direct-Processing pseudo-tank gets no
//! alternative.
//!
//! Known gaps, deliberately left open: validation reads a snapshot that can
//! be stale by the time the write lands (no optimistic locking or
//! server-side constraint exists), and the ledger insert plus the audit
//! insert are two independent writes with no compensating rollback when the
//! second fails. Both are surfaced, not repaired, here.

use std::sync::Arc;

use tracing::{info, warn};

use crate::balance;
use crate::error::{OffloadError, TankSuggestion};
use crate::ledger::Ledger;
use crate::models::{MovementRecord, NewMovement, NewOffload, Tank};

// ---

/// Transient per-session offload form state.
#[derive(Debug, Clone, Default)]
pub struct OffloadForm {
    pub storage_tank: Option<Tank>,
    /// Entered as a positive magnitude; negated at submission.
    pub milk_volume: Option<f64>,
    pub temperature_c: Option<f64>,
    pub quality_check: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub supplier_name: String,
}

impl OffloadForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a successful submission hands back to the caller.
#[derive(Debug, Clone)]
pub struct OffloadReceipt {
    pub batch_id: String,
    pub tank: Tank,
    pub volume_liters: f64,
}

// ---

pub struct OffloadCoordinator {
    ledger: Arc<Ledger>,
}

impl OffloadCoordinator {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Bind the form to a tank: set the auto supplier name and prefill
    /// temperature, quality and destination from the tank's most recent
    /// positive movement in the current snapshot.
    pub fn select_tank(&self, form: &mut OffloadForm, tank: Tank) {
        let snapshot = self.ledger.snapshot();

        form.supplier_name = format!("Offload from {tank}");
        if let Some(latest) = snapshot
            .iter()
            .filter(|r| r.tank == tank && r.is_reception())
            .max_by_key(|r| r.recorded_at)
        {
            form.temperature_c = latest.temperature_c;
            form.quality_check = latest.quality_grade.clone();
            form.destination = latest.destination.clone();
        }
        form.storage_tank = Some(tank);
    }

    /// Check that `requested` liters can leave `tank` given the snapshot.
    pub fn validate(
        records: &[MovementRecord],
        tank: &Tank,
        requested: f64,
    ) -> Result<(), OffloadError> {
        let available = balance::available_volume(records, tank);

        if requested <= available {
            return Ok(());
        }

        // The pseudo-tank never gets an alternative suggestion.
        if *tank == Tank::DirectProcessing {
            return Err(OffloadError::InsufficientDirectProcessing {
                available,
                requested,
            });
        }

        let other = match tank {
            Tank::StorageA => Some(Tank::StorageB),
            Tank::StorageB => Some(Tank::StorageA),
            _ => None,
        };

        if let Some(other) = other {
            let other_available = balance::available_volume(records, &other);
            if other_available >= requested {
                return Err(OffloadError::InsufficientVolume {
                    tank: tank.clone(),
                    available,
                    requested,
                    alternative: Some(TankSuggestion {
                        tank: other,
                        available_liters: other_available,
                    }),
                });
            }
            return Err(OffloadError::AllTanksShort {
                requested,
                shortfalls: vec![
                    TankSuggestion {
                        tank: tank.clone(),
                        available_liters: available,
                    },
                    TankSuggestion {
                        tank: other,
                        available_liters: other_available,
                    },
                ],
            });
        }

        Err(OffloadError::InsufficientVolume {
            tank: tank.clone(),
            available,
            requested,
            alternative: None,
        })
    }

    /// Validate and submit the offload: a negative ledger movement, then
    /// the audit row that yields the batch id. On success the ledger is
    /// refetched (so the alert engine and balances observe the change) and
    /// the form is cleared.
    pub async fn submit(&self, form: &mut OffloadForm) -> Result<OffloadReceipt, OffloadError> {
        let tank = form.storage_tank.clone().ok_or(OffloadError::NoTankSelected)?;
        let requested = match form.milk_volume {
            Some(v) if v > 0.0 && v.is_finite() => v,
            _ => return Err(OffloadError::NonPositiveVolume),
        };

        let snapshot = self.ledger.snapshot();
        Self::validate(&snapshot, &tank, requested)?;

        let supplier_name = if form.supplier_name.trim().is_empty() {
            format!("Offload from {tank}")
        } else {
            form.supplier_name.clone()
        };

        self.ledger
            .store()
            .insert_movement(NewMovement {
                tank: tank.clone(),
                volume_liters: -requested,
                supplier_name,
                quality_grade: form.quality_check.clone(),
                temperature_c: form.temperature_c,
                destination: form.destination.clone(),
            })
            .await
            .map_err(OffloadError::LedgerWrite)?;

        let batch_id = self
            .ledger
            .store()
            .insert_offload(NewOffload {
                storage_tank: tank.clone(),
                volume_offloaded: requested,
                temperature_c: form.temperature_c,
                quality_check: form.quality_check.clone(),
                destination: form.destination.clone(),
                notes: form.notes.clone(),
            })
            .await
            .map_err(OffloadError::AuditWrite)?;

        if let Err(err) = self.ledger.refetch().await {
            warn!("ledger refetch after offload failed, serving stale snapshot: {err}");
        }
        form.reset();

        info!(%tank, volume_liters = requested, %batch_id, "offload recorded");
        Ok(OffloadReceipt {
            batch_id,
            tank,
            volume_liters: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryMovementStore;
    use chrono::{Duration, TimeZone, Utc};

    fn record(tank: Tank, volume: f64, minutes: i64) -> MovementRecord {
        // ---
        MovementRecord {
            id: format!("{}-{minutes}", tank.short_code()),
            tank,
            volume_liters: volume,
            supplier_name: "Kyampisi Dairy".to_string(),
            quality_grade: Some("Grade A".to_string()),
            temperature_c: Some(4.5),
            destination: Some("Processing line".to_string()),
            recorded_at: Utc.with_ymd_and_hms(2026, 5, 11, 6, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    async fn seeded(records: Vec<MovementRecord>) -> (Arc<MemoryMovementStore>, Arc<Ledger>) {
        // ---
        let store = Arc::new(MemoryMovementStore::new());
        for r in records {
            store.seed(r);
        }
        let ledger = Ledger::new(store.clone());
        ledger.refetch().await.unwrap();
        (store, ledger)
    }

    #[test]
    fn test_validate_blocks_over_offload_and_names_alternative() {
        // ---
        let records = vec![
            record(Tank::StorageA, 100.0, 0),
            record(Tank::StorageB, 400.0, 5),
        ];

        let err = OffloadCoordinator::validate(&records, &Tank::StorageA, 150.0).unwrap_err();
        match err {
            OffloadError::InsufficientVolume {
                tank,
                available,
                requested,
                alternative,
            } => {
                assert_eq!(tank, Tank::StorageA);
                assert_eq!(available, 100.0);
                assert_eq!(requested, 150.0);
                let alt = alternative.unwrap();
                assert_eq!(alt.tank, Tank::StorageB);
                assert_eq!(alt.available_liters, 400.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_reports_both_shortfalls() {
        // ---
        let records = vec![
            record(Tank::StorageA, 100.0, 0),
            record(Tank::StorageB, 80.0, 5),
        ];

        let err = OffloadCoordinator::validate(&records, &Tank::StorageA, 150.0).unwrap_err();
        match err {
            OffloadError::AllTanksShort {
                requested,
                shortfalls,
            } => {
                assert_eq!(requested, 150.0);
                assert_eq!(shortfalls.len(), 2);
                assert_eq!(shortfalls[0].tank, Tank::StorageA);
                assert_eq!(shortfalls[1].tank, Tank::StorageB);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_direct_processing_has_no_alternative() {
        // ---
        let records = vec![
            record(Tank::DirectProcessing, 200.0, 0),
            record(Tank::DirectProcessing, -50.0, 10),
            record(Tank::StorageA, 1000.0, 5),
        ];

        let err =
            OffloadCoordinator::validate(&records, &Tank::DirectProcessing, 200.0).unwrap_err();
        match err {
            OffloadError::InsufficientDirectProcessing {
                available,
                requested,
            } => {
                assert_eq!(available, 150.0);
                assert_eq!(requested, 200.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.suggested_alternative().is_none());
    }

    #[test]
    fn test_validate_passes_with_enough_volume() {
        // ---
        let records = vec![record(Tank::StorageA, 300.0, 0)];
        assert!(OffloadCoordinator::validate(&records, &Tank::StorageA, 300.0).is_ok());
    }

    #[tokio::test]
    async fn test_select_tank_prefills_from_latest_reception() {
        // ---
        let mut older = record(Tank::StorageA, 200.0, 0);
        older.temperature_c = Some(3.0);
        let newer = record(Tank::StorageA, 150.0, 30);
        let offload = record(Tank::StorageA, -50.0, 45);

        let (_, ledger) = seeded(vec![older, newer, offload]).await;
        let coordinator = OffloadCoordinator::new(ledger);

        let mut form = OffloadForm::new();
        coordinator.select_tank(&mut form, Tank::StorageA);

        assert_eq!(form.storage_tank, Some(Tank::StorageA));
        assert_eq!(form.supplier_name, "Offload from Tank A");
        // Prefilled from the newest positive record, not the offload.
        assert_eq!(form.temperature_c, Some(4.5));
        assert_eq!(form.quality_check, Some("Grade A".to_string()));
    }

    #[tokio::test]
    async fn test_submit_writes_ledger_and_audit_then_resets() {
        // ---
        let (store, ledger) = seeded(vec![record(Tank::StorageA, 500.0, 0)]).await;
        let coordinator = OffloadCoordinator::new(ledger.clone());

        let mut form = OffloadForm::new();
        coordinator.select_tank(&mut form, Tank::StorageA);
        form.milk_volume = Some(200.0);
        form.notes = Some("evening dispatch".to_string());

        let receipt = coordinator.submit(&mut form).await.unwrap();
        assert!(receipt.batch_id.starts_with("TKA-"));
        assert_eq!(receipt.volume_liters, 200.0);

        // Negative movement landed and the refetched snapshot reflects it.
        assert_eq!(store.movement_count(), 2);
        assert_eq!(
            balance::available_volume(&ledger.snapshot(), &Tank::StorageA),
            300.0
        );
        assert_eq!(store.recorded_batch_ids().len(), 1);

        // Form cleared on success.
        assert_eq!(form.storage_tank, None);
        assert_eq!(form.milk_volume, None);
        assert!(form.supplier_name.is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_before_any_write() {
        // ---
        let (store, ledger) = seeded(vec![record(Tank::StorageA, 100.0, 0)]).await;
        let coordinator = OffloadCoordinator::new(ledger);

        let mut form = OffloadForm::new();
        coordinator.select_tank(&mut form, Tank::StorageA);
        form.milk_volume = Some(150.0);

        let err = coordinator.submit(&mut form).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.movement_count(), 1);
        assert!(store.recorded_batch_ids().is_empty());
        // Form keeps its state so the user can correct and resubmit.
        assert_eq!(form.milk_volume, Some(150.0));
    }

    #[tokio::test]
    async fn test_submit_rejects_non_positive_volume() {
        // ---
        let (_, ledger) = seeded(vec![record(Tank::StorageA, 100.0, 0)]).await;
        let coordinator = OffloadCoordinator::new(ledger);

        let mut form = OffloadForm::new();
        coordinator.select_tank(&mut form, Tank::StorageA);
        form.milk_volume = Some(0.0);

        assert!(matches!(
            coordinator.submit(&mut form).await.unwrap_err(),
            OffloadError::NonPositiveVolume
        ));
    }

    #[tokio::test]
    async fn test_audit_failure_after_ledger_write_is_surfaced() {
        // ---
        let (store, ledger) = seeded(vec![record(Tank::StorageA, 500.0, 0)]).await;
        let coordinator = OffloadCoordinator::new(ledger);

        let mut form = OffloadForm::new();
        coordinator.select_tank(&mut form, Tank::StorageA);
        form.milk_volume = Some(100.0);

        store.fail_next_offload_insert();
        let err = coordinator.submit(&mut form).await.unwrap_err();

        assert!(matches!(err, OffloadError::AuditWrite(_)));
        // The ledger movement stays: the dual-write gap is surfaced, not
        // rolled back.
        assert_eq!(store.movement_count(), 2);
        assert!(store.recorded_batch_ids().is_empty());
    }
}
