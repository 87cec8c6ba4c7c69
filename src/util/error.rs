//! Error types for BVH construction.

use thiserror::Error;

/// Main error type for build operations.
///
/// Traversal and the cost model cannot fail; only builders return errors.
/// Broken internal invariants (an unfilled child slot, an empty leaf) are
/// bugs and panic instead of surfacing here.
#[derive(Error, Debug)]
pub enum Error {
    /// The primitive slice handed to a builder was empty
    #[error("Cannot build a BVH over an empty primitive set")]
    EmptyScene,

    /// A tuning parameter is out of its accepted range
    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    /// The rayon pool for a parallel phase could not be created
    #[error("Failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A builder worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, Error>;
