//! Patchbay Core - channel matrix and buffer-chain topology for real-time audio units
//!
//! This crate models an audio processing unit as two resizable channel
//! matrices (output and input) bound to shared buffer-chain storage, and keeps
//! that binding consistent while a render thread reads it.
//!
//! # Core Abstractions
//!
//! ## Units and Topology
//!
//! - [`AudioUnit`] - Handle owning a unit's topology behind a re-entrant lock
//! - [`Topology`] - Read-only view: navigation, spans, range queries, verification
//! - [`TopologyFlags`] - Validated [`AggregateMode`] x [`Ownership`] combination
//!
//! ## Handles
//!
//! - [`ChannelId`], [`RangeId`] - Generation-checked, unit-scoped handles
//! - [`Span`] - Inclusive run of ranges a channel reads and writes through
//!
//! ## Render Path
//!
//! - [`RenderSnapshot`] - Reusable per-tick copy of every channel's ranges
//!
//! ## Persistence and Events
//!
//! - [`TopologySnapshot`] - Plain-data layout with [`restore`](TopologySnapshot::restore)
//! - [`ResizeEvent`] - Fired after every mutation that changed something
//!
//! # Features
//!
//! - `tracing`: emit `tracing` events for every resize
//! - `serde`: `Serialize`/`Deserialize` for enums, formats, limits, and snapshots
//!
//! # Example
//!
//! ```rust
//! use patchbay_core::{AudioUnit, RenderSnapshot, Role, TopologyFlags};
//!
//! let unit = AudioUnit::builder()
//!     .parallel_paths(2)
//!     .output_pads(1)
//!     .input_pads(1)
//!     .flags(TopologyFlags::sync())
//!     .build()
//!     .unwrap();
//!
//! // Render thread: refresh once per tick, then compute without the lock.
//! let mut snapshot = RenderSnapshot::new();
//! unit.snapshot_spans(&mut snapshot);
//! for entry in snapshot.entries(Role::Output) {
//!     assert_eq!(snapshot.ranges(entry).len(), 1);
//! }
//! ```

pub mod event;
pub mod topology;
mod unit;

pub use event::{ListenerId, ResizeEvent, ResizeListener, resize_listener};
pub use topology::{
    AggregateMode, Aliasing, BufferFormat, ChannelId, ChannelRecord, ChannelView,
    DEFAULT_BUFFER_SIZE, DEFAULT_MAX_PADS, DEFAULT_MAX_PARALLEL_PATHS, DEFAULT_SAMPLERATE,
    InvariantViolation, Ownership, RangeId, RangeView, RenderEntry, RenderSnapshot, ResizeReport,
    Role, Span, SpanRanges, Topology, TopologyError, TopologyFlags, TopologyLimits,
    TopologySnapshot, UnitId,
};
pub use unit::{AudioUnit, AudioUnitBuilder};
