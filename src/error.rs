//! Error types for the tank volume service.
//!
//! Validation failures carry structured data (tank, available volume,
//! requested volume, suggested alternative) so the HTTP layer can render
//! them without parsing message strings.

use serde::Serialize;
use thiserror::Error;

use crate::models::{Tank, DIRECT_PROCESSING_LABEL};

// ---

/// Errors from the external record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// A storage tank named in a shortfall report or as a suggested alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankSuggestion {
    pub tank: Tank,
    pub available_liters: f64,
}

/// Why an offload submission was refused or failed.
#[derive(Error, Debug)]
pub enum OffloadError {
    #[error("offload volume must be a positive number of liters")]
    NonPositiveVolume,

    #[error("no storage tank selected")]
    NoTankSelected,

    #[error(
        "insufficient volume in {DIRECT_PROCESSING_LABEL}: \
         {available:.1}L available, {requested:.1}L requested"
    )]
    InsufficientDirectProcessing { available: f64, requested: f64 },

    #[error("insufficient volume in {tank}: {available:.1}L available, {requested:.1}L requested")]
    InsufficientVolume {
        tank: Tank,
        available: f64,
        requested: f64,
        /// The other storage tank, when it could absorb the request instead.
        alternative: Option<TankSuggestion>,
    },

    #[error("no storage tank holds the requested {requested:.1}L")]
    AllTanksShort {
        requested: f64,
        shortfalls: Vec<TankSuggestion>,
    },

    #[error("ledger write failed: {0}")]
    LedgerWrite(#[source] StoreError),

    /// The ledger movement was recorded but the companion audit row was not.
    /// The store is left inconsistent; there is no compensating rollback.
    #[error("offload audit write failed after the ledger movement was recorded: {0}")]
    AuditWrite(#[source] StoreError),
}

impl OffloadError {
    /// True for client-side rejections that happened before any write.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OffloadError::NonPositiveVolume
                | OffloadError::NoTankSelected
                | OffloadError::InsufficientDirectProcessing { .. }
                | OffloadError::InsufficientVolume { .. }
                | OffloadError::AllTanksShort { .. }
        )
    }

    /// The suggested alternative tank, when the validation produced one.
    pub fn suggested_alternative(&self) -> Option<&TankSuggestion> {
        match self {
            OffloadError::InsufficientVolume { alternative, .. } => alternative.as_ref(),
            _ => None,
        }
    }
}
