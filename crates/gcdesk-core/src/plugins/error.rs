//! Error taxonomy of the plug-in loader.
//!
//! None of these errors ever reach the caller of the manager's public
//! operations; each one is converted into descriptor state or a log line
//! where it happens.

use std::path::PathBuf;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Loader error types.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Directory enumeration failed.
    #[error("Unable to scan plug-in directory: {0}")]
    Scan(#[source] std::io::Error),

    /// An isolation context could not be established for a bundle.
    #[error("Unable to create isolation context for plug-in: {0}")]
    Open(String),

    /// The bundle's service declarations are malformed.
    #[error("Invalid service configuration: {0}")]
    ServiceConfiguration(String),

    /// A plug-in candidate could not be constructed.
    #[error("Unable to instantiate plug-in: {0}")]
    PluginInstantiation(String),

    /// A declared service could not be constructed.
    #[error("Unable to instantiate {type_name}: {reason}")]
    Instantiation { type_name: String, reason: String },

    /// A plug-in's initialization hook failed.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The host refused an aggregation.
    #[error("Aggregation rejected by host: {0}")]
    Registration(String),

    /// Releasing an isolation context failed.
    #[error("Failed to release bundle {path}: {reason}")]
    Release { path: PathBuf, reason: String },
}

impl LoaderError {
    /// Create an instantiation error.
    pub fn instantiation(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Instantiation {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}
