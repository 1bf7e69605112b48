//! Core library for the `tankflow` milk movement service.
//!
//! The pieces, bottom-up:
//! - [`models`] – the ledger record types and the parse boundary
//! - [`store`] – the record-store seam (`milk_reception`, `milk_tank_offloads`)
//! - [`ledger`] – the cached, watchable snapshot of the movement journal
//! - [`balance`] – pure tank-volume and capacity arithmetic
//! - [`alerts`] – the timer-driven direct-processing alert engine
//! - [`offload`] – offload form handling, validation and dual-write submission
//! - [`routes`] – the thin axum surface exposed to UI collaborators

pub mod alerts;
pub mod balance;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod offload;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use models::{MovementRecord, Tank};
