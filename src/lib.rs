//! MedDispenser firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dispense;
pub mod error;
pub mod fsm;
pub mod ingest;
pub mod persistence;
pub mod pins;
pub mod safety;
pub mod schedule;
pub mod scheduler;
pub mod wizard;

// The adapters and drivers carry cfg-gated simulation backends, so they
// build on host as well.
pub mod adapters;
pub mod drivers;
