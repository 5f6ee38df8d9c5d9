//! Turf-ground booking engine: slot availability, pricing and payment
//! reconciliation for a set of overlapping resources.
//!
//! Three physical grounds where the combined ground shares turf with the two
//! individual ones, so a paid reservation on either side removes the other
//! from sale. All state is in-process, guarded per resource, and durably
//! logged to a write-ahead log that is replayed on boot.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod limits;
pub mod model;
pub mod observability;
pub mod pricing;
pub mod reaper;
pub mod wal;
