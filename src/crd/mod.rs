//! Custom Resource Definitions for the observability operator
//!
//! This module defines the ObservabilityStack CRD and its supporting types.

mod observability_stack;
pub mod quantity;
pub mod types;

#[cfg(test)]
mod tests;

pub use observability_stack::{
    format_validation_errors, ObservabilityStack, ObservabilityStackSpec,
    ObservabilityStackStatus, SpecValidationError,
};
pub use quantity::{parse_quantity, QuantityError, QuantityValue};
pub use types::*;
