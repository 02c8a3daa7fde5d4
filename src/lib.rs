#![doc = include_str!("../docs/rustdoc.md")]

/// Symbol-to-instance binding with teardown-before-rebind.
pub mod binder;
/// Command-line argument definitions.
pub mod cli;
/// Transport traits, WebSocket connector and the channel driver task.
pub mod client;
/// Inbound frame decoding.
pub mod codec;
/// Runtime configuration model.
pub mod config;
/// Error types used across the crate.
pub mod error;
/// Event bus messages between the driver and UI.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Connection lifecycle state machine.
pub mod machine;
/// Metrics and health status structures.
pub mod monitoring;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Radar channel data models.
pub mod types;
/// UI controller and console commands.
pub mod ui;
/// Consumer-facing snapshot of a subscription.
pub mod view;

/// Primary crate error type.
pub use error::RadarError;
