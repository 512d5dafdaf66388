//! Metric reporting pipeline
//!
//! Health results become [`Metric`] points, stamped with the cluster name
//! and shipped through a [`Connection`] to the metrics proxy.

pub mod connection;
pub mod http_sender;
pub mod metric;
pub mod status;
pub mod version;

pub use connection::{normalize_address, Connection, Sender, SenderFactory};
pub use http_sender::HttpSender;
pub use metric::{common, format_line, Metric, MAX_TAG_LENGTH};
pub use status::status_metrics;
pub use version::encode_version;
