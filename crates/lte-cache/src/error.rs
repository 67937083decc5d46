//! Error types for resource pooling

/// Boxed construction failure from a pool factory
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resource pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Factory failed to build a new instance
    #[error("failed to construct pooled resource: {0}")]
    Construction(#[source] BoxError),
}
