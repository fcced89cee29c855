//! Insightflow capability units, reasoning gateway and pipeline executor.
//!
//! This crate provides the six capability units (schema analysis through
//! reporting), the reasoning gateway that bounds every call to the reasoning
//! capability with a timeout and a retry limit, the checkpoint stores, and
//! the `PipelineExecutor` that drives the run state machine.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Units sequence calls between business logic in the
//! [`pipeline`] crate, the lineage [`catalog`], and infrastructure traits
//! (reasoning provider, analytics engine). Domain rules live in `pipeline`.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`unit`] | `CapabilityUnit` trait and `StageContext` |
//! | [`gateway`] | `ReasoningGateway` |
//! | [`units`] | The six stage implementations |
//! | [`executor`] | `PipelineExecutor`, `RunOutcome` |
//! | [`checkpoint`] | In-memory and JSON-file checkpoint stores |

pub mod checkpoint;
pub mod executor;
pub mod gateway;
pub mod unit;
pub mod units;

pub use checkpoint::{JsonFileCheckpointStore, MemoryCheckpointStore};
pub use executor::{PipelineExecutor, RunOutcome};
pub use gateway::{GatewayStats, ReasoningGateway};
pub use unit::{CapabilityUnit, StageContext};
