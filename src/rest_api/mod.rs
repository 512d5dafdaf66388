//! REST API module
//!
//! Liveness, readiness and Prometheus metrics for the operator process.

mod dto;
mod handlers;
mod server;

pub use server::{router, run_server};
