//! Headless driver for the omnidirectional robot simulator.
//!
//! Loads [`settings`], builds a [`simulation::Simulation`] around the
//! controllers from `omni-control`, ticks it on a fixed-rate loop in
//! [`runner`], publishes every tick on a [`bus::Topic`] and keeps the
//! [`telemetry::RunLog`] for CSV export.

pub mod bus;
pub mod runner;
pub mod settings;
pub mod simulation;
pub mod telemetry;
