//! Tank balance calculator.
//!
//! Pure functions over a ledger snapshot. `available_volume` is the plain
//! signed sum with no clamping: a negative result is the caller's signal
//! that the ledger is inconsistent, not something to paper over here.

use crate::models::{MovementRecord, Tank};

// ---

/// Rated capacity of Tank A in liters.
pub const TANK_A_CAPACITY_LITERS: f64 = 5000.0;
/// Rated capacity of Tank B in liters.
pub const TANK_B_CAPACITY_LITERS: f64 = 3000.0;

/// Rated capacity for a tank, if it has one. The Direct-Processing
/// pseudo-tank and free-text tanks have no rated capacity.
pub fn tank_capacity(tank: &Tank) -> Option<f64> {
    match tank {
        Tank::StorageA => Some(TANK_A_CAPACITY_LITERS),
        Tank::StorageB => Some(TANK_B_CAPACITY_LITERS),
        Tank::DirectProcessing | Tank::Other(_) => None,
    }
}

/// Current available volume in a tank: the signed sum of every ledger
/// entry booked against it. Not clamped at zero.
pub fn available_volume(records: &[MovementRecord], tank: &Tank) -> f64 {
    records
        .iter()
        .filter(|r| &r.tank == tank)
        .map(|r| r.volume_liters)
        .sum()
}

/// Spare capacity in a tank, clamped at zero. `None` for tanks without a
/// rated capacity.
pub fn capacity_remaining(records: &[MovementRecord], tank: &Tank) -> Option<f64> {
    let capacity = tank_capacity(tank)?;
    Some((capacity - available_volume(records, tank)).max(0.0))
}

/// Pick a storage tank able to absorb `volume_liters`, preferring the one
/// with more headroom. Returns `None` when no tank can take the full
/// volume. Ties resolve to the first tank evaluated.
pub fn suggest_transfer_target(records: &[MovementRecord], volume_liters: f64) -> Option<Tank> {
    if !(volume_liters > 0.0) {
        return None;
    }

    let mut best: Option<(Tank, f64)> = None;
    for tank in Tank::storage_tanks() {
        let Some(headroom) = capacity_remaining(records, &tank) else {
            continue;
        };
        if headroom < volume_liters {
            continue;
        }
        match &best {
            Some((_, current)) if headroom <= *current => {}
            _ => best = Some((tank, headroom)),
        }
    }
    best.map(|(tank, _)| tank)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, Utc};

    fn movement(tank: Tank, volume: f64, minutes_ago: i64) -> MovementRecord {
        // ---
        MovementRecord {
            id: format!("{}-{}", tank.short_code(), minutes_ago),
            tank,
            volume_liters: volume,
            supplier_name: "Test Supplier".to_string(),
            quality_grade: None,
            temperature_c: None,
            destination: None,
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_available_volume_is_signed_sum() {
        // ---
        let records = vec![
            movement(Tank::StorageA, 800.0, 60),
            movement(Tank::StorageA, -300.0, 40),
            movement(Tank::StorageB, 500.0, 30),
            movement(Tank::StorageA, 200.0, 10),
        ];

        assert_eq!(available_volume(&records, &Tank::StorageA), 700.0);
        assert_eq!(available_volume(&records, &Tank::StorageB), 500.0);
        assert_eq!(available_volume(&records, &Tank::DirectProcessing), 0.0);
    }

    #[test]
    fn test_sum_is_order_independent() {
        // ---
        let mut records = vec![
            movement(Tank::StorageA, 100.0, 50),
            movement(Tank::StorageA, -40.0, 40),
            movement(Tank::StorageA, 25.0, 30),
            movement(Tank::StorageA, -10.0, 20),
        ];
        let forward = available_volume(&records, &Tank::StorageA);
        records.reverse();
        let backward = available_volume(&records, &Tank::StorageA);

        assert_eq!(forward, backward);
        assert_eq!(forward, 75.0);
    }

    #[test]
    fn test_negative_sum_is_not_clamped() {
        // ---
        let records = vec![movement(Tank::StorageB, -120.0, 5)];
        assert_eq!(available_volume(&records, &Tank::StorageB), -120.0);
    }

    #[test]
    fn test_capacity_remaining_clamps_at_zero() {
        // ---
        let records = vec![movement(Tank::StorageB, TANK_B_CAPACITY_LITERS + 500.0, 5)];
        assert_eq!(capacity_remaining(&records, &Tank::StorageB), Some(0.0));
        assert_eq!(capacity_remaining(&[], &Tank::StorageA), Some(TANK_A_CAPACITY_LITERS));
        assert_eq!(capacity_remaining(&[], &Tank::DirectProcessing), None);
    }

    #[test]
    fn test_suggest_prefers_larger_headroom() {
        // ---
        // A: 5000 rated, 4000 held -> 1000 headroom. B: 3000 rated, 500 held -> 2500.
        let records = vec![
            movement(Tank::StorageA, 4000.0, 60),
            movement(Tank::StorageB, 500.0, 30),
        ];

        assert_eq!(suggest_transfer_target(&records, 800.0), Some(Tank::StorageB));
        // Only A can take 2600.
        let records = vec![movement(Tank::StorageB, 500.0, 30)];
        assert_eq!(suggest_transfer_target(&records, 2600.0), Some(Tank::StorageA));
    }

    #[test]
    fn test_suggest_none_when_nothing_fits() {
        // ---
        let records = vec![
            movement(Tank::StorageA, 4900.0, 60),
            movement(Tank::StorageB, 2950.0, 30),
        ];
        assert_eq!(suggest_transfer_target(&records, 500.0), None);
    }

    #[test]
    fn test_suggest_tie_takes_first_evaluated() {
        // ---
        // Equal headroom of 1000 on both tanks.
        let records = vec![
            movement(Tank::StorageA, 4000.0, 60),
            movement(Tank::StorageB, 2000.0, 30),
        ];
        assert_eq!(suggest_transfer_target(&records, 900.0), Some(Tank::StorageA));
    }

    #[test]
    fn test_suggest_rejects_non_positive_volume() {
        // ---
        assert_eq!(suggest_transfer_target(&[], 0.0), None);
        assert_eq!(suggest_transfer_target(&[], -5.0), None);
    }
}
