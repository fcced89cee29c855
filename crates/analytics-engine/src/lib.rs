//! Insightflow graph analytics engine client.
//!
//! Implements [`pipeline::AnalyticsEngine`] over the engine's HTTP job API:
//! submit a template as a job, poll until it reaches a terminal state, and
//! collect the result rows returned with the final status.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Wire formats, polling cadence and HTTP status mapping
//! live here. The [`pipeline`] crate sees only [`pipeline::AnalyticsEngine`].
//!
//! ## Protocol
//!
//! | Request | Response |
//! |---------|----------|
//! | `POST {base_url}/v1/jobs` with a [`wire::JobRequest`] | `{"id": ...}` |
//! | `GET {base_url}/v1/jobs/{id}` | [`wire::JobStatus`] |
//!
//! A job is terminal once its status is `completed` or `failed`. Rows are
//! only read from a `completed` status.

pub mod client;
pub mod config;
pub mod wire;

pub use client::{EngineClientError, HttpAnalyticsEngine};
pub use config::EngineConfig;
