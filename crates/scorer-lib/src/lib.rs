//! Scoring library for the node-scoring scheduler extender
//!
//! This crate provides:
//! - Extender wire models for the filter and prioritize callbacks
//! - A Prometheus-backed metrics client with per-dimension partial failure
//! - The pure node scoring engine and its tunable policy
//! - Health checks and observability

pub mod dimension;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod scoring;
pub mod service;

pub use dimension::{Category, MetricDimension};
pub use error::{ExtenderError, PolicyError, QueryError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExtenderMetrics, StructuredLogger};
pub use scoring::{score_node, ScoreBreakdown, ScoringPolicy};
pub use service::ScoringService;
