//! Notifications fired after a unit's topology changed.
//!
//! Listeners run on the thread that performed the mutation, after the
//! topology is fully spliced and while the unit lock is still held. They may
//! read the unit (the lock is re-entrant) and see exactly the state the event
//! describes. Requests that change nothing fire no event.

use std::sync::Arc;

use crate::topology::{BufferFormat, ResizeReport, Role, TopologyFlags, UnitId};

/// A completed topology mutation.
///
/// # Example
///
/// ```
/// use patchbay_core::ResizeEvent;
///
/// fn handle(event: &ResizeEvent) {
///     match event {
///         ResizeEvent::ParallelPaths { old, new, .. } => {
///             eprintln!("width {old} -> {new}");
///         }
///         ResizeEvent::Pads { role, old, new, .. } => {
///             eprintln!("{role} pads {old} -> {new}");
///         }
///         ResizeEvent::Flags { old, new, .. } => {
///             eprintln!("flags {old} -> {new}");
///         }
///         ResizeEvent::Format { new, .. } => {
///             eprintln!("format {} Hz", new.samplerate);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeEvent {
    /// The parallel path count changed.
    ParallelPaths {
        /// Unit that changed.
        unit: UnitId,
        /// Previous width.
        old: usize,
        /// New width.
        new: usize,
        /// Work performed.
        report: ResizeReport,
    },

    /// One role's pad count changed.
    Pads {
        /// Unit that changed.
        unit: UnitId,
        /// Role resized.
        role: Role,
        /// Previous depth.
        old: usize,
        /// New depth.
        new: usize,
        /// Work performed.
        report: ResizeReport,
    },

    /// Aggregation mode or ownership changed.
    Flags {
        /// Unit that changed.
        unit: UnitId,
        /// Previous flags.
        old: TopologyFlags,
        /// New flags.
        new: TopologyFlags,
        /// Work performed.
        report: ResizeReport,
    },

    /// The buffer format stamped on every range changed.
    Format {
        /// Unit that changed.
        unit: UnitId,
        /// Previous format.
        old: BufferFormat,
        /// New format.
        new: BufferFormat,
    },
}

impl ResizeEvent {
    /// Unit the event belongs to.
    pub fn unit(&self) -> UnitId {
        match self {
            Self::ParallelPaths { unit, .. }
            | Self::Pads { unit, .. }
            | Self::Flags { unit, .. }
            | Self::Format { unit, .. } => *unit,
        }
    }

    /// Structural work performed, if the event carries any.
    pub fn report(&self) -> Option<&ResizeReport> {
        match self {
            Self::ParallelPaths { report, .. }
            | Self::Pads { report, .. }
            | Self::Flags { report, .. } => Some(report),
            Self::Format { .. } => None,
        }
    }
}

/// Callback invoked for every [`ResizeEvent`].
pub type ResizeListener = Arc<dyn Fn(&ResizeEvent) + Send + Sync>;

/// Creates a [`ResizeListener`] from a closure.
///
/// ```
/// use patchbay_core::resize_listener;
///
/// let listener = resize_listener(|event| eprintln!("{event:?}"));
/// ```
pub fn resize_listener<F>(f: F) -> ResizeListener
where
    F: Fn(&ResizeEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Registration handle returned by [`AudioUnit::on_resize`](crate::AudioUnit::on_resize).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
