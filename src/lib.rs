//! Observability Operator: Kubernetes operator for cluster observability workloads
//!
//! This crate installs and health-checks a metrics proxy, cluster and node
//! metric collectors and a logging agent, driven by a single
//! `ObservabilityStack` custom resource, and reports their health as metrics.

pub mod config;
pub mod controller;
pub mod crd;
pub mod desired_state;
pub mod error;
pub mod render;
pub mod reporting;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
