//! Channel matrix and buffer-chain topology of one audio unit.
//!
//! An [`AudioUnit`](crate::AudioUnit) owns two role matrices (output and
//! input). Each matrix is `pads x parallel_path_count` channels; each channel
//! reads and writes audio through a span of buffer-chain ranges. One role owns
//! its ranges and the other aliases them, either one-to-one ([`AggregateMode::Sync`])
//! or as a fan-in bus across every input pad ([`AggregateMode::Async`]).
//!
//! # Architecture
//!
//! - Arena storage: channels and ranges live in per-unit slot arenas
//!   and are addressed by generation-checked [`ChannelId`] / [`RangeId`]
//!   handles. A handle to a released entry, or from another unit, resolves to
//!   `None`.
//! - Channel node model: line-order and pad-column intrusive lists per role.
//! - Buffer-chain manager: owned ranges chained per pad column in pad order,
//!   alias spans with per-range alias counts.
//! - Resize engine: width, depth, and flag changes as fixed step sequences
//!   that reserve storage first and never leave a half-spliced graph.
//! - Verifier: [`Topology::verify`] checks every structural invariant; debug
//!   builds run it after each mutation.
//!
//! The render thread never holds a `&Topology` across a compute. It copies
//! the spans it needs into a [`RenderSnapshot`] while holding the unit lock
//! briefly, then works from the copy.
//!
//! # Example
//!
//! ```rust
//! use patchbay_core::{AudioUnit, Role, TopologyFlags};
//!
//! let unit = AudioUnit::builder()
//!     .parallel_paths(2)
//!     .output_pads(1)
//!     .input_pads(4)
//!     .flags(TopologyFlags::fan_in())
//!     .build()
//!     .unwrap();
//!
//! unit.set_pad_count(Role::Input, 6).unwrap();
//! unit.read(|topology| {
//!     let output = topology.first(Role::Output).unwrap();
//!     let span = topology.span(output).unwrap();
//!     assert_eq!(topology.span_ranges(span).count(), 6);
//! });
//! ```

mod arena;
mod chain;
mod channel;
mod error;
mod layout;
mod render;
mod resize;
mod snapshot;
mod verify;

pub use arena::{ChannelId, RangeId, UnitId};
pub use chain::{RangeView, Span, SpanRanges};
pub use channel::ChannelView;
pub use error::TopologyError;
pub use layout::{
    AggregateMode, Aliasing, BufferFormat, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_PADS,
    DEFAULT_MAX_PARALLEL_PATHS, DEFAULT_SAMPLERATE, Ownership, Role, TopologyFlags,
    TopologyLimits,
};
pub use render::{RenderEntry, RenderSnapshot};
pub use resize::ResizeReport;
pub use snapshot::{ChannelRecord, TopologySnapshot};
pub use verify::InvariantViolation;

use chain::BufferChain;
use channel::ChannelGraph;

/// Both role matrices of a unit plus the buffer chain they share.
///
/// Obtained through [`AudioUnit::read`](crate::AudioUnit::read); every method
/// here is a read-only query. Queries taking a handle return `None` for stale
/// or foreign handles.
pub struct Topology {
    unit: UnitId,
    width: usize,
    flags: TopologyFlags,
    format: BufferFormat,
    limits: TopologyLimits,
    revision: u64,
    channels: ChannelGraph,
    chain: BufferChain,
}

impl Topology {
    pub(crate) fn new(
        unit: UnitId,
        flags: TopologyFlags,
        format: BufferFormat,
        limits: TopologyLimits,
    ) -> Self {
        Self {
            unit,
            width: 0,
            flags,
            format,
            limits,
            revision: 0,
            channels: ChannelGraph::new(unit),
            chain: BufferChain::new(unit),
        }
    }

    /// Unit this topology belongs to.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Number of parallel paths (columns) shared by both roles.
    pub fn parallel_path_count(&self) -> usize {
        self.width
    }

    /// Number of pads (rows) of `role`.
    pub fn pad_count(&self, role: Role) -> usize {
        self.channels.pads(role)
    }

    /// Current aggregation mode and ownership.
    pub fn flags(&self) -> TopologyFlags {
        self.flags
    }

    /// Format stamped on every range.
    pub fn format(&self) -> BufferFormat {
        self.format
    }

    /// Limits resize requests are checked against.
    pub fn limits(&self) -> TopologyLimits {
        self.limits
    }

    /// Incremented by every mutation that changed something.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of channels of `role`.
    pub fn channel_count(&self, role: Role) -> usize {
        self.channels.len(role)
    }

    /// Number of live buffer-chain ranges.
    pub fn range_count(&self) -> usize {
        self.chain.len()
    }

    // --- Channel navigation ---

    /// Channel addressing and span, or `None` for a stale handle.
    pub fn channel(&self, id: ChannelId) -> Option<ChannelView> {
        self.channels.view(id)
    }

    /// Channels of `role` in line order.
    pub fn channels(&self, role: Role) -> impl Iterator<Item = ChannelView> + '_ {
        self.channels
            .line(role)
            .filter_map(|id| self.channels.view(id))
    }

    /// First channel of `role` in line order.
    pub fn first(&self, role: Role) -> Option<ChannelId> {
        self.channels.first(role)
    }

    /// Last channel of `role` in line order.
    pub fn last(&self, role: Role) -> Option<ChannelId> {
        self.channels.last(role)
    }

    /// Next channel in line order.
    pub fn next(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels.get(id)?.next
    }

    /// Previous channel in line order.
    pub fn prev(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels.get(id)?.prev
    }

    /// Channel one pad below in the same column.
    pub fn next_pad(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels.get(id)?.next_pad
    }

    /// Channel one pad above in the same column.
    pub fn prev_pad(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels.get(id)?.prev_pad
    }

    /// Channel at line index `line` of `role`.
    pub fn nth(&self, role: Role, line: usize) -> Option<ChannelId> {
        self.channels.nth(role, line)
    }

    /// Channel of `role` at `(pad, path)`.
    pub fn channel_at(&self, role: Role, pad: usize, path: usize) -> Option<ChannelId> {
        if path >= self.width || pad >= self.channels.pads(role) {
            return None;
        }
        self.channels.locate(role, pad, path)
    }

    /// Pad-0 channel of `id`'s column.
    pub fn pad_first(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels
            .contains(id)
            .then(|| self.channels.pad_first(id))
    }

    /// Last-pad channel of `id`'s column.
    pub fn pad_last(&self, id: ChannelId) -> Option<ChannelId> {
        self.channels
            .contains(id)
            .then(|| self.channels.pad_last(id))
    }

    /// Channel `n` pads below `id`.
    pub fn pad_nth(&self, id: ChannelId, n: usize) -> Option<ChannelId> {
        if !self.channels.contains(id) {
            return None;
        }
        self.channels.pad_nth(id, n)
    }

    /// First channel of `role` in line order that holds a span.
    pub fn first_with_buffers(&self, role: Role) -> Option<ChannelId> {
        self.channels
            .line(role)
            .find(|&id| self.channels[id].span.is_some())
    }

    /// Last channel of `role` in line order that holds a span.
    pub fn last_with_buffers(&self, role: Role) -> Option<ChannelId> {
        self.channels
            .line_rev(role)
            .find(|&id| self.channels[id].span.is_some())
    }

    /// Next channel after `id` in line order that holds a span.
    pub fn next_with_buffers(&self, id: ChannelId) -> Option<ChannelId> {
        let start = self.channels.get(id)?.next;
        std::iter::successors(start, |&c| self.channels[c].next)
            .find(|&c| self.channels[c].span.is_some())
    }

    /// Previous channel before `id` in line order that holds a span.
    pub fn prev_with_buffers(&self, id: ChannelId) -> Option<ChannelId> {
        let start = self.channels.get(id)?.prev;
        std::iter::successors(start, |&c| self.channels[c].prev)
            .find(|&c| self.channels[c].span.is_some())
    }

    // --- Buffer-chain queries ---

    /// Span `id` reads and writes through.
    pub fn span(&self, id: ChannelId) -> Option<Span> {
        self.channels.get(id)?.span
    }

    /// Span covering every pad of `role`'s column at `path`, if `role` owns buffers.
    pub fn column_span(&self, role: Role, path: usize) -> Option<Span> {
        self.chain.column_span(&self.channels, role, path)
    }

    /// Ranges of `span` in chain order.
    pub fn span_ranges(&self, span: Span) -> SpanRanges<'_> {
        self.chain.span_ranges(span)
    }

    /// Range links and format, or `None` for a released handle.
    pub fn range(&self, id: RangeId) -> Option<RangeView> {
        self.chain.view(id)
    }

    /// Zero-based position of `range` inside `span`.
    pub fn range_position(&self, span: Span, range: RangeId) -> Option<usize> {
        self.chain.position(span, range)
    }

    /// First channel owning a range of `span` after `prev_owner`'s ranges.
    ///
    /// Iterating with the previous result walks each contributor of a fan-in
    /// span once, in pad order.
    pub fn find_next_owner(&self, span: Span, prev_owner: Option<ChannelId>) -> Option<ChannelId> {
        self.chain.find_next_owner(span, prev_owner)
    }

    /// Channel that allocated `range`.
    pub fn range_owner(&self, range: RangeId) -> Option<ChannelId> {
        self.chain.get(range).map(|r| r.owner)
    }

    /// Returns true if any alias span still covers `range`.
    pub fn has_aliasers(&self, range: RangeId) -> bool {
        self.chain.has_aliasers(range)
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("unit", &self.unit)
            .field("parallel_paths", &self.width)
            .field("output_pads", &self.pad_count(Role::Output))
            .field("input_pads", &self.pad_count(Role::Input))
            .field("flags", &self.flags)
            .field("ranges", &self.range_count())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}
