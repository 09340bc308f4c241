//! Core types and service wiring for the curbside pickup schedule poller.

/// Polling coordinator that serializes refreshes and publishes snapshots.
pub mod coordinator;
/// Projection of schedules onto display sensors.
pub mod display;
/// Config flow and config store collaborator.
pub mod flow;
/// Domain models and identifiers.
pub mod model;
/// Traits describing the validator and poller ports.
pub mod ports;
/// Registry of running address instances.
pub mod registry;
/// Repeating-task abstraction.
pub mod scheduler;

pub use coordinator::*;
pub use display::*;
pub use flow::*;
pub use model::*;
pub use ports::*;
pub use registry::*;
pub use scheduler::*;
