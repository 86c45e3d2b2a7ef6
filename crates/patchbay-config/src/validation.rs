//! Unit description and resize script validation.
//!
//! Validation runs on plain configuration data before a unit is built or a
//! script is replayed, so every problem in a file is reported at once instead
//! of one topology error at a time.
//!
//! # Example
//!
//! ```rust
//! use patchbay_config::{UnitConfig, validate_unit};
//!
//! let config = UnitConfig::new("stereo").with_shape(2, 1, 1);
//! validate_unit(&config).expect("stereo unit is valid");
//! ```

use patchbay_core::{AggregateMode, Ownership, Role, TopologyFlags, TopologyLimits};
use thiserror::Error;

use crate::script::{ResizeScript, ResizeStep};
use crate::unit_config::UnitConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Aggregation mode and ownership cannot be combined.
    #[error("aggregate mode '{aggregate}' cannot be combined with '{ownership}' ownership")]
    InvalidFlags {
        /// Requested aggregation mode.
        aggregate: AggregateMode,
        /// Requested ownership.
        ownership: Ownership,
    },

    /// Parallel path count above the configured limit.
    #[error("parallel_paths {requested} exceeds max_parallel_paths {limit}")]
    ParallelPathsOverLimit {
        /// Requested count.
        requested: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Pad count above the configured limit.
    #[error("{role} pads {requested} exceeds max_pads {limit}")]
    PadsOverLimit {
        /// Role being sized.
        role: Role,
        /// Requested count.
        requested: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Sample rate of zero.
    #[error("samplerate must be greater than zero")]
    ZeroSamplerate,

    /// Buffer size of zero.
    #[error("buffer_size must be greater than zero")]
    ZeroBufferSize,

    /// A script step failed validation.
    #[error("step {index}: {error}")]
    Step {
        /// Zero-based step index.
        index: usize,
        /// What is wrong with the step.
        error: Box<ValidationError>,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a unit description.
pub fn validate_unit(config: &UnitConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    check_flags(config.aggregate, config.ownership, &mut errors);
    check_width(config.parallel_paths, &config.limits, &mut errors);
    check_pads(Role::Output, config.output_pads, &config.limits, &mut errors);
    check_pads(Role::Input, config.input_pads, &config.limits, &mut errors);
    check_format(config.format.samplerate, config.format.buffer_size, &mut errors);
    collect(errors)
}

/// Validates every step of `script` against the limits of `unit`.
///
/// Steps are checked in isolation; a step that is valid here can still be
/// refused at runtime if an earlier step changed the unit.
pub fn validate_script(script: &ResizeScript, unit: &UnitConfig) -> ValidationResult<()> {
    let errors = script
        .steps
        .iter()
        .enumerate()
        .filter_map(|(index, step)| {
            validate_step(step, &unit.limits)
                .err()
                .map(|error| ValidationError::Step {
                    index,
                    error: Box::new(error),
                })
        })
        .collect();
    collect(errors)
}

/// Validates a single step against `limits`.
pub fn validate_step(step: &ResizeStep, limits: &TopologyLimits) -> ValidationResult<()> {
    let mut errors = Vec::new();
    match *step {
        ResizeStep::ParallelPaths { count } => check_width(count, limits, &mut errors),
        ResizeStep::Pads { role, count } => check_pads(role, count, limits, &mut errors),
        ResizeStep::Flags {
            aggregate,
            ownership,
        } => check_flags(aggregate, ownership, &mut errors),
        ResizeStep::Format {
            samplerate,
            buffer_size,
        } => check_format(samplerate, buffer_size, &mut errors),
    }
    collect(errors)
}

fn check_flags(aggregate: AggregateMode, ownership: Ownership, errors: &mut Vec<ValidationError>) {
    if TopologyFlags::new(aggregate, ownership).is_err() {
        errors.push(ValidationError::InvalidFlags {
            aggregate,
            ownership,
        });
    }
}

fn check_width(requested: usize, limits: &TopologyLimits, errors: &mut Vec<ValidationError>) {
    if requested > limits.max_parallel_paths {
        errors.push(ValidationError::ParallelPathsOverLimit {
            requested,
            limit: limits.max_parallel_paths,
        });
    }
}

fn check_pads(
    role: Role,
    requested: usize,
    limits: &TopologyLimits,
    errors: &mut Vec<ValidationError>,
) {
    if requested > limits.max_pads {
        errors.push(ValidationError::PadsOverLimit {
            role,
            requested,
            limit: limits.max_pads,
        });
    }
}

fn check_format(samplerate: u32, buffer_size: u32, errors: &mut Vec<ValidationError>) {
    if samplerate == 0 {
        errors.push(ValidationError::ZeroSamplerate);
    }
    if buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
