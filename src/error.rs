//! Error types for the observability operator

use thiserror::Error;

/// Errors produced while rendering, applying, validating and reporting
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Finalizer bookkeeping failed around an apply or cleanup
    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    /// A manifest template could not be rendered
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// A rendered document is not a valid cluster object
    #[error("Failed to decode manifest: {0}")]
    DecodeError(String),

    /// The API server does not serve the object's kind
    #[error("No REST mapping for {kind} ({api_version}): {message}")]
    MappingError {
        api_version: String,
        kind: String,
        message: String,
    },

    /// The desired-state specification is invalid
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A referenced credential secret is missing or malformed
    #[error("Secret error: {0}")]
    SecretError(String),

    /// Operator configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A version string could not be encoded as a metric value
    #[error("Invalid version: {0}")]
    VersionError(String),

    /// Metric transport failure
    #[error("Metric transport error: {0}")]
    TransportError(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<kube::runtime::finalizer::Error<Error>> for Error {
    fn from(err: kube::runtime::finalizer::Error<Error>) -> Self {
        Error::FinalizerError(Box::new(err))
    }
}

impl Error {
    /// Whether the error is worth a quick retry
    ///
    /// Transient API and transport failures are retriable; invalid input
    /// (validation, templates, decoding, unknown kinds) will fail the same
    /// way until the spec or the cluster changes.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_)
            | Error::HttpError(_)
            | Error::TransportError(_)
            | Error::SecretError(_)
            | Error::FinalizerError(_) => true,
            Error::TemplateError(_)
            | Error::DecodeError(_)
            | Error::MappingError { .. }
            | Error::ValidationError(_)
            | Error::ConfigError(_)
            | Error::VersionError(_)
            | Error::SerializationError(_) => false,
        }
    }

    /// Short category label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::FinalizerError(_) => "finalizer",
            Error::TemplateError(_) => "template",
            Error::DecodeError(_) => "decode",
            Error::MappingError { .. } => "mapping",
            Error::ValidationError(_) => "validation",
            Error::SecretError(_) => "secret",
            Error::ConfigError(_) => "config",
            Error::VersionError(_) => "version",
            Error::TransportError(_) | Error::HttpError(_) => "transport",
            Error::SerializationError(_) => "serialization",
        }
    }
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
