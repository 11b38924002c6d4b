//! Plug-in error types.

/// Error reported by plug-in code to the host.
///
/// The host records the `Display` output verbatim in the plug-in's
/// descriptor, so messages should read well on their own.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Generic failure with a human-readable message.
    #[error("{0}")]
    Failed(String),

    /// The plug-in's own configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A resource the plug-in needs is missing.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl PluginError {
    /// Shorthand for [`PluginError::Failed`].
    pub fn msg(message: impl Into<String>) -> Self {
        PluginError::Failed(message.into())
    }
}

/// Plug-in result type
pub type PluginResult<T> = Result<T, PluginError>;
