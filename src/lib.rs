//! Driving school marketplace service.
//!
//! The interesting machinery lives in [`workflows::enrollment`]: the
//! enrollment approval state machine, the three-stage curriculum sequencer,
//! and the document completeness gate that feeds both. Everything else is
//! service plumbing (configuration, telemetry, HTTP error mapping).

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
