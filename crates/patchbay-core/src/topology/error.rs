//! Typed failures returned by topology operations.
//!
//! Only recoverable conditions live here. Contract violations (releasing an
//! aliased range, unlinking a channel that still holds a span) panic with a
//! descriptive message instead.

use thiserror::Error;

use super::layout::{AggregateMode, Ownership, Role};

/// Errors returned by [`AudioUnit`](crate::AudioUnit) mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The mode/ownership combination has no meaning.
    #[error("aggregate mode {mode} cannot be combined with {ownership} buffer ownership")]
    InvalidFlags {
        /// Requested aggregation mode.
        mode: AggregateMode,
        /// Requested ownership.
        ownership: Ownership,
    },

    /// Requested width exceeds the unit's limits.
    #[error("parallel path count {requested} exceeds limit {limit}")]
    TooManyParallelPaths {
        /// Requested width.
        requested: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Requested depth exceeds the unit's limits.
    #[error("{role} pad count {requested} exceeds limit {limit}")]
    TooManyPads {
        /// Role being resized.
        role: Role,
        /// Requested depth.
        requested: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Storage for new channels or ranges could not be reserved.
    ///
    /// The topology is unchanged when this is returned.
    #[error("failed to reserve storage for {requested} {what}")]
    AllocationFailed {
        /// What was being allocated ("channels" or "ranges").
        what: &'static str,
        /// Number of entries requested.
        requested: usize,
    },

    /// A mutation was requested from inside a read closure on the same thread.
    #[error("topology mutation attempted while the topology is borrowed for reading")]
    ReentrantMutation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = TopologyError::InvalidFlags {
            mode: AggregateMode::Async,
            ownership: Ownership::Both,
        };
        assert_eq!(
            err.to_string(),
            "aggregate mode async cannot be combined with both buffer ownership"
        );

        let err = TopologyError::TooManyPads {
            role: Role::Input,
            requested: 9,
            limit: 8,
        };
        assert_eq!(err.to_string(), "input pad count 9 exceeds limit 8");

        let err = TopologyError::AllocationFailed {
            what: "ranges",
            requested: 4,
        };
        assert!(err.to_string().contains("4 ranges"));
    }
}
