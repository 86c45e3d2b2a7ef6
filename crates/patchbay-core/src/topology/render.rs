//! Render-thread copy of the channel-to-range lookup.
//!
//! A [`RenderSnapshot`] is owned by the render thread and refreshed at the top
//! of each tick while the unit lock is held. After the refresh the lock is
//! released and the tick runs against the copy. Storage is cleared and reused,
//! so once the snapshot has grown to the unit's size a refresh allocates
//! nothing. Unchanged topologies are detected through the revision counter and
//! skipped entirely.

use super::Topology;
use super::arena::{ChannelId, RangeId, UnitId};
use super::layout::{BufferFormat, Role};

/// One channel of a [`RenderSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderEntry {
    /// Channel handle.
    pub channel: ChannelId,
    /// Role of the channel.
    pub role: Role,
    /// Row index.
    pub pad: usize,
    /// Column index.
    pub path: usize,
    start: usize,
    end: usize,
}

impl RenderEntry {
    /// Number of ranges in the channel's span (0 if it has none).
    pub fn span_len(&self) -> usize {
        self.end - self.start
    }
}

/// Reusable per-tick copy of every channel's span.
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    unit: Option<UnitId>,
    revision: u64,
    format: BufferFormat,
    parallel_paths: usize,
    outputs: usize,
    entries: Vec<RenderEntry>,
    ranges: Vec<RangeId>,
}

impl RenderSnapshot {
    /// Creates an empty snapshot. The first refresh always copies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot with room for `channels` entries and `ranges` range handles.
    pub fn with_capacity(channels: usize, ranges: usize) -> Self {
        Self {
            entries: Vec::with_capacity(channels),
            ranges: Vec::with_capacity(ranges),
            ..Self::default()
        }
    }

    /// Unit the snapshot was last refreshed from.
    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    /// Topology revision the snapshot reflects.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Buffer format at the time of the snapshot.
    pub fn format(&self) -> BufferFormat {
        self.format
    }

    /// Parallel path count at the time of the snapshot.
    pub fn parallel_path_count(&self) -> usize {
        self.parallel_paths
    }

    /// Entries of `role` in line order.
    pub fn entries(&self, role: Role) -> &[RenderEntry] {
        match role {
            Role::Output => &self.entries[..self.outputs],
            Role::Input => &self.entries[self.outputs..],
        }
    }

    /// Entry at line index `line` of `role`.
    pub fn entry(&self, role: Role, line: usize) -> Option<&RenderEntry> {
        self.entries(role).get(line)
    }

    /// Ranges of `entry`'s span in chain order.
    pub fn ranges(&self, entry: &RenderEntry) -> &[RangeId] {
        &self.ranges[entry.start..entry.end]
    }

    /// Ranges of `channel`'s span, or `None` if the channel is not in the snapshot.
    pub fn ranges_of(&self, channel: ChannelId) -> Option<&[RangeId]> {
        self.entries
            .iter()
            .find(|e| e.channel == channel)
            .map(|e| self.ranges(e))
    }

    /// Copies every span from `topology`. Returns false if nothing changed
    /// since the last refresh.
    pub(crate) fn refresh_from(&mut self, topology: &Topology) -> bool {
        if self.unit == Some(topology.unit) && self.revision == topology.revision {
            return false;
        }
        self.entries.clear();
        self.ranges.clear();
        self.unit = Some(topology.unit);
        self.revision = topology.revision;
        self.format = topology.format;
        self.parallel_paths = topology.width;

        for role in Role::ALL {
            for id in topology.channels.line(role) {
                let node = &topology.channels[id];
                let start = self.ranges.len();
                if let Some(span) = node.span {
                    self.ranges.extend(topology.chain.span_ranges(span));
                }
                self.entries.push(RenderEntry {
                    channel: id,
                    role,
                    pad: node.pad,
                    path: node.path,
                    start,
                    end: self.ranges.len(),
                });
            }
            if role == Role::Output {
                self.outputs = self.entries.len();
            }
        }
        true
    }
}
