//! The audio unit and its concurrency guard.
//!
//! Every unit carries one re-entrant mutex around its [`Topology`]. Resize
//! operations hold it for their full duration, so structural changes are never
//! partially visible. The render thread takes the same lock only long enough
//! to copy spans into a [`RenderSnapshot`], and never across a buffer compute.
//!
//! The lock is re-entrant so resize listeners (fired while it is still held)
//! can read the unit or resize it again. A mutation requested from inside a
//! [`AudioUnit::read`] closure is refused with
//! [`TopologyError::ReentrantMutation`] instead of deadlocking.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

use crate::event::{ListenerId, ResizeEvent, ResizeListener};
use crate::topology::{
    BufferFormat, InvariantViolation, RenderSnapshot, ResizeReport, Role, Topology,
    TopologyError, TopologyFlags, TopologyLimits, TopologySnapshot, UnitId,
};

struct Shared {
    id: UnitId,
    topology: ReentrantMutex<RefCell<Topology>>,
    listeners: Mutex<Vec<(ListenerId, ResizeListener)>>,
    next_listener: AtomicU64,
}

/// A processing node owning an output and an input channel matrix.
///
/// `AudioUnit` is a cheap handle: clones refer to the same unit and can be
/// moved to other threads.
#[derive(Clone)]
pub struct AudioUnit {
    shared: Arc<Shared>,
}

impl AudioUnit {
    /// Starts building a unit. Every count defaults to zero.
    pub fn builder() -> AudioUnitBuilder {
        AudioUnitBuilder::default()
    }

    /// Process-unique identifier of this unit.
    pub fn id(&self) -> UnitId {
        self.shared.id
    }

    // --- Mutations ---

    /// Sets the number of parallel paths of both roles.
    pub fn set_parallel_path_count(&self, count: usize) -> Result<ResizeReport, TopologyError> {
        let guard = self.shared.topology.lock();
        let (old, report) = {
            let mut topology = guard
                .try_borrow_mut()
                .map_err(|_| TopologyError::ReentrantMutation)?;
            let old = topology.parallel_path_count();
            let report = topology.set_parallel_path_count(count)?;
            debug_verify(&topology, "set_parallel_path_count");
            (old, report)
        };
        if old != count {
            self.emit(&ResizeEvent::ParallelPaths {
                unit: self.id(),
                old,
                new: count,
                report,
            });
        }
        Ok(report)
    }

    /// Sets the pad count of `role`.
    pub fn set_pad_count(&self, role: Role, count: usize) -> Result<ResizeReport, TopologyError> {
        let guard = self.shared.topology.lock();
        let (old, report) = {
            let mut topology = guard
                .try_borrow_mut()
                .map_err(|_| TopologyError::ReentrantMutation)?;
            let old = topology.pad_count(role);
            let report = topology.set_pad_count(role, count)?;
            debug_verify(&topology, "set_pad_count");
            (old, report)
        };
        if old != count {
            self.emit(&ResizeEvent::Pads {
                unit: self.id(),
                role,
                old,
                new: count,
                report,
            });
        }
        Ok(report)
    }

    /// Changes aggregation mode and buffer ownership.
    pub fn set_flags(&self, flags: TopologyFlags) -> Result<ResizeReport, TopologyError> {
        let guard = self.shared.topology.lock();
        let (old, report) = {
            let mut topology = guard
                .try_borrow_mut()
                .map_err(|_| TopologyError::ReentrantMutation)?;
            let old = topology.flags();
            let report = topology.set_flags(flags)?;
            debug_verify(&topology, "set_flags");
            (old, report)
        };
        if old != flags {
            self.emit(&ResizeEvent::Flags {
                unit: self.id(),
                old,
                new: flags,
                report,
            });
        }
        Ok(report)
    }

    /// Stamps a new buffer format on every range.
    pub fn set_format(&self, format: BufferFormat) -> Result<(), TopologyError> {
        let guard = self.shared.topology.lock();
        let (old, changed) = {
            let mut topology = guard
                .try_borrow_mut()
                .map_err(|_| TopologyError::ReentrantMutation)?;
            let old = topology.format();
            let changed = topology.set_format(format);
            debug_verify(&topology, "set_format");
            (old, changed)
        };
        if changed {
            self.emit(&ResizeEvent::Format {
                unit: self.id(),
                old,
                new: format,
            });
        }
        Ok(())
    }

    // --- Reads ---

    /// Runs `f` against the topology while holding the unit lock.
    pub fn read<R>(&self, f: impl FnOnce(&Topology) -> R) -> R {
        let guard = self.shared.topology.lock();
        let topology = guard.borrow();
        f(&*topology)
    }

    /// Like [`read`](Self::read) but returns `None` instead of waiting if another
    /// thread holds the lock.
    pub fn try_read<R>(&self, f: impl FnOnce(&Topology) -> R) -> Option<R> {
        let guard = self.shared.topology.try_lock()?;
        let topology = guard.try_borrow().ok()?;
        Some(f(&*topology))
    }

    /// Refreshes `snapshot` from the current topology, waiting for the lock.
    ///
    /// Returns false if the snapshot was already current.
    pub fn snapshot_spans(&self, snapshot: &mut RenderSnapshot) -> bool {
        self.read(|topology| snapshot.refresh_from(topology))
    }

    /// Refreshes `snapshot` without waiting.
    ///
    /// Returns `None` if a resize holds the lock; the caller keeps rendering
    /// from its previous snapshot. Otherwise returns whether anything changed.
    pub fn try_snapshot_spans(&self, snapshot: &mut RenderSnapshot) -> Option<bool> {
        self.try_read(|topology| snapshot.refresh_from(topology))
    }

    /// Captures the current layout as plain data.
    pub fn topology_snapshot(&self) -> TopologySnapshot {
        self.read(Topology::snapshot)
    }

    /// Checks every structural invariant.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.read(Topology::verify)
    }

    /// Current parallel path count.
    pub fn parallel_path_count(&self) -> usize {
        self.read(Topology::parallel_path_count)
    }

    /// Current pad count of `role`.
    pub fn pad_count(&self, role: Role) -> usize {
        self.read(|t| t.pad_count(role))
    }

    /// Current flags.
    pub fn flags(&self) -> TopologyFlags {
        self.read(Topology::flags)
    }

    /// Current buffer format.
    pub fn format(&self) -> BufferFormat {
        self.read(Topology::format)
    }

    /// Resize limits.
    pub fn limits(&self) -> TopologyLimits {
        self.read(Topology::limits)
    }

    /// Current topology revision.
    pub fn revision(&self) -> u64 {
        self.read(Topology::revision)
    }

    // --- Listeners ---

    /// Registers a callback fired after every mutation that changed something.
    pub fn on_resize<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ResizeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Unregisters a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    fn emit(&self, event: &ResizeEvent) {
        #[cfg(feature = "tracing")]
        tracing::trace!("unit_event: {event:?}");

        // Listeners may register or remove listeners, so call them on a copy.
        let listeners: Vec<ResizeListener> = self
            .shared
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for AudioUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read(|t| format!("{t:?}")) {
            Some(topology) => f
                .debug_struct("AudioUnit")
                .field("id", &self.id())
                .field("topology", &format_args!("{topology}"))
                .finish(),
            None => f
                .debug_struct("AudioUnit")
                .field("id", &self.id())
                .finish_non_exhaustive(),
        }
    }
}

fn debug_verify(topology: &Topology, op: &str) {
    if !cfg!(debug_assertions) {
        return;
    }
    if let Err(violation) = topology.verify() {
        panic!("topology invariant broken after {op}: {violation}");
    }
}

/// Builder for [`AudioUnit`].
#[derive(Debug, Clone, Default)]
pub struct AudioUnitBuilder {
    parallel_paths: usize,
    output_pads: usize,
    input_pads: usize,
    flags: TopologyFlags,
    format: BufferFormat,
    limits: TopologyLimits,
}

impl AudioUnitBuilder {
    /// Number of parallel paths (e.g. 2 for stereo).
    pub fn parallel_paths(mut self, count: usize) -> Self {
        self.parallel_paths = count;
        self
    }

    /// Output pad count.
    pub fn output_pads(mut self, count: usize) -> Self {
        self.output_pads = count;
        self
    }

    /// Input pad count.
    pub fn input_pads(mut self, count: usize) -> Self {
        self.input_pads = count;
        self
    }

    /// Pad count of `role`.
    pub fn pads(self, role: Role, count: usize) -> Self {
        match role {
            Role::Output => self.output_pads(count),
            Role::Input => self.input_pads(count),
        }
    }

    /// Aggregation mode and ownership.
    pub fn flags(mut self, flags: TopologyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Buffer format for every range.
    pub fn format(mut self, format: BufferFormat) -> Self {
        self.format = format;
        self
    }

    /// Resize limits, also applied to the initial counts.
    pub fn limits(mut self, limits: TopologyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Allocates the unit: input pads first, then output pads, then every
    /// channel and range in one first-allocation pass.
    pub fn build(self) -> Result<AudioUnit, TopologyError> {
        let id = UnitId::next();
        let mut topology = Topology::new(id, self.flags, self.format, self.limits);
        topology.set_pad_count(Role::Input, self.input_pads)?;
        topology.set_pad_count(Role::Output, self.output_pads)?;
        topology.set_parallel_path_count(self.parallel_paths)?;
        debug_verify(&topology, "build");

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "unit_build: {id} {} paths, {} out / {} in pads, {}",
            self.parallel_paths,
            self.output_pads,
            self.input_pads,
            self.flags
        );

        Ok(AudioUnit {
            shared: Arc::new(Shared {
                id,
                topology: ReentrantMutex::new(RefCell::new(topology)),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        })
    }
}
