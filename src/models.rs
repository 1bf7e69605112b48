//! Data models for the milk movement ledger.
//!
//! The ledger (`milk_reception`) is a journal of signed volume deltas per
//! tank: positive rows are receptions, negative rows are offloads. Rows are
//! fetched in their raw, loosely-typed shape ([`RawMovementRow`]) and pass
//! through a fallible conversion into [`MovementRecord`] so that malformed
//! rows are flagged at the read boundary instead of defaulting silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Canonical label of the first physical storage tank.
pub const TANK_A_LABEL: &str = "Tank A";
/// Canonical label of the second physical storage tank.
pub const TANK_B_LABEL: &str = "Tank B";
/// Label of the transient holding state for milk routed straight to processing.
pub const DIRECT_PROCESSING_LABEL: &str = "Direct-Processing";

/// A destination milk can be booked against in the ledger.
///
/// `DirectProcessing` is a pseudo-tank: milk parked there is awaiting
/// processing and is watched by the alert engine. Unrecognized labels are
/// preserved verbatim in `Other` so foreign rows keep round-tripping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Tank {
    StorageA,
    StorageB,
    DirectProcessing,
    Other(String),
}

impl Tank {
    /// The label stored in the `tank_number` column.
    pub fn label(&self) -> &str {
        match self {
            Tank::StorageA => TANK_A_LABEL,
            Tank::StorageB => TANK_B_LABEL,
            Tank::DirectProcessing => DIRECT_PROCESSING_LABEL,
            Tank::Other(label) => label,
        }
    }

    /// Short code used as a batch-id prefix.
    pub fn short_code(&self) -> &str {
        match self {
            Tank::StorageA => "TKA",
            Tank::StorageB => "TKB",
            Tank::DirectProcessing => "DPU",
            Tank::Other(_) => "TNK",
        }
    }

    /// The two physical storage tanks, in evaluation order.
    pub fn storage_tanks() -> [Tank; 2] {
        [Tank::StorageA, Tank::StorageB]
    }
}

impl std::fmt::Display for Tank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Tank {
    fn from(label: String) -> Self {
        match label.as_str() {
            TANK_A_LABEL => Tank::StorageA,
            TANK_B_LABEL => Tank::StorageB,
            DIRECT_PROCESSING_LABEL => Tank::DirectProcessing,
            _ => Tank::Other(label),
        }
    }
}

impl From<Tank> for String {
    fn from(tank: Tank) -> Self {
        tank.label().to_string()
    }
}

// ---

/// A validated signed volume movement from the `milk_reception` ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementRecord {
    pub id: String,
    pub tank: Tank,
    /// Signed liters: positive = received into the tank, negative = offloaded.
    pub volume_liters: f64,
    pub supplier_name: String,
    pub quality_grade: Option<String>,
    pub temperature_c: Option<f64>,
    pub destination: Option<String>,
    /// Authoritative ordering key for attribution and alert timing.
    pub recorded_at: DateTime<Utc>,
}

impl MovementRecord {
    /// Whether this movement added milk to its tank.
    pub fn is_reception(&self) -> bool {
        self.volume_liters > 0.0
    }
}

/// Ledger row as fetched, before validation.
#[derive(Debug, sqlx::FromRow)]
pub struct RawMovementRow {
    pub id: i64,
    pub tank_number: Option<String>,
    pub milk_volume: Option<f64>,
    pub supplier_name: Option<String>,
    pub quality_score: Option<String>,
    pub temperature: Option<f64>,
    pub destination: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A ledger row the read boundary refused to admit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub id: i64,
    pub reason: &'static str,
}

impl std::fmt::Display for MalformedRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row id={}: {}", self.id, self.reason)
    }
}

impl TryFrom<RawMovementRow> for MovementRecord {
    type Error = MalformedRow;

    fn try_from(row: RawMovementRow) -> Result<Self, Self::Error> {
        let reject = |reason| MalformedRow { id: row.id, reason };

        let tank_label = match row.tank_number.as_deref() {
            Some(label) if !label.trim().is_empty() => label.to_string(),
            _ => return Err(reject("missing or empty tank label")),
        };
        let volume = match row.milk_volume {
            Some(v) if v.is_finite() => v,
            Some(_) => return Err(reject("non-finite milk volume")),
            None => return Err(reject("missing milk volume")),
        };
        let supplier = match row.supplier_name {
            Some(ref s) if !s.trim().is_empty() => s.clone(),
            _ => return Err(reject("missing supplier name")),
        };
        let recorded_at = row.created_at.ok_or_else(|| reject("missing creation timestamp"))?;

        Ok(MovementRecord {
            id: row.id.to_string(),
            tank: Tank::from(tank_label),
            volume_liters: volume,
            supplier_name: supplier,
            quality_grade: row.quality_score,
            temperature_c: row.temperature,
            destination: row.destination,
            recorded_at,
        })
    }
}

// ---

/// A new signed movement to append to the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovement {
    pub tank: Tank,
    pub volume_liters: f64,
    pub supplier_name: String,
    pub quality_grade: Option<String>,
    pub temperature_c: Option<f64>,
    pub destination: Option<String>,
}

/// Audit row for `milk_tank_offloads`; the store answers with a batch id.
#[derive(Debug, Clone)]
pub struct NewOffload {
    pub storage_tank: Tank,
    pub volume_offloaded: f64,
    pub temperature_c: Option<f64>,
    pub quality_check: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn raw_row() -> RawMovementRow {
        // ---
        RawMovementRow {
            id: 7,
            tank_number: Some(TANK_A_LABEL.to_string()),
            milk_volume: Some(250.0),
            supplier_name: Some("Kashari Farm".to_string()),
            quality_score: Some("Grade A".to_string()),
            temperature: Some(4.2),
            destination: None,
            created_at: Some(Utc.with_ymd_and_hms(2026, 5, 11, 8, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_tank_labels_round_trip() {
        // ---
        for tank in [Tank::StorageA, Tank::StorageB, Tank::DirectProcessing] {
            let label = tank.label().to_string();
            assert_eq!(Tank::from(label), tank);
        }

        let odd = Tank::from("Overflow Pit".to_string());
        assert_eq!(odd, Tank::Other("Overflow Pit".to_string()));
        assert_eq!(odd.label(), "Overflow Pit");
    }

    #[test]
    fn test_valid_row_is_admitted() {
        // ---
        let record = MovementRecord::try_from(raw_row()).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.tank, Tank::StorageA);
        assert_eq!(record.volume_liters, 250.0);
        assert!(record.is_reception());
        assert_eq!(record.supplier_name, "Kashari Farm");
    }

    #[test]
    fn test_missing_volume_is_rejected() {
        // ---
        let mut row = raw_row();
        row.milk_volume = None;
        let err = MovementRecord::try_from(row).unwrap_err();
        assert_eq!(err.reason, "missing milk volume");
    }

    #[test]
    fn test_non_finite_volume_is_rejected() {
        // ---
        let mut row = raw_row();
        row.milk_volume = Some(f64::NAN);
        let err = MovementRecord::try_from(row).unwrap_err();
        assert_eq!(err.reason, "non-finite milk volume");
    }

    #[test]
    fn test_blank_tank_label_is_rejected() {
        // ---
        let mut row = raw_row();
        row.tank_number = Some("   ".to_string());
        assert!(MovementRecord::try_from(row).is_err());
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        // ---
        let mut row = raw_row();
        row.created_at = None;
        let err = MovementRecord::try_from(row).unwrap_err();
        assert_eq!(err.reason, "missing creation timestamp");
    }

    #[test]
    fn test_missing_supplier_is_rejected() {
        // ---
        let mut row = raw_row();
        row.supplier_name = None;
        let err = MovementRecord::try_from(row).unwrap_err();
        assert_eq!(err.reason, "missing supplier name");
    }
}
