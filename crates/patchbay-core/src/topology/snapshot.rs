//! Plain-data description of a topology for persistence and inspection.

use super::Topology;
use super::error::TopologyError;
use super::layout::{AggregateMode, BufferFormat, Ownership, Role, TopologyFlags, TopologyLimits};
use crate::AudioUnit;

/// Shape and per-channel layout of one unit, free of handles.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologySnapshot {
    /// Parallel path count.
    pub parallel_paths: usize,
    /// Output pad count.
    pub output_pads: usize,
    /// Input pad count.
    pub input_pads: usize,
    /// Aggregation mode.
    pub aggregate: AggregateMode,
    /// Buffer ownership.
    pub ownership: Ownership,
    /// Buffer format.
    pub format: BufferFormat,
    /// Resize limits.
    pub limits: TopologyLimits,
    /// Total live ranges.
    pub ranges: usize,
    /// Every channel, outputs first, each role in line order.
    pub channels: Vec<ChannelRecord>,
}

/// One channel of a [`TopologySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelRecord {
    /// Matrix the channel belongs to.
    pub role: Role,
    /// Row index.
    pub pad: usize,
    /// Column index.
    pub path: usize,
    /// Line index.
    pub line: usize,
    /// Ranges covered by the channel's span.
    pub span_len: usize,
    /// True if the channel owns its range.
    pub owns_buffers: bool,
}

impl Topology {
    /// Captures the topology as plain data.
    pub fn snapshot(&self) -> TopologySnapshot {
        let channels = Role::ALL
            .into_iter()
            .flat_map(|role| self.channels(role))
            .map(|view| ChannelRecord {
                role: view.role,
                pad: view.pad,
                path: view.path,
                line: view.line,
                span_len: view
                    .span
                    .map_or(0, |span| self.span_ranges(span).count()),
                owns_buffers: view.owns_buffers,
            })
            .collect();

        TopologySnapshot {
            parallel_paths: self.width,
            output_pads: self.pad_count(Role::Output),
            input_pads: self.pad_count(Role::Input),
            aggregate: self.flags.mode(),
            ownership: self.flags.ownership(),
            format: self.format,
            limits: self.limits,
            ranges: self.range_count(),
            channels,
        }
    }
}

impl TopologySnapshot {
    /// Pad count of `role`.
    pub fn pad_count(&self, role: Role) -> usize {
        match role {
            Role::Output => self.output_pads,
            Role::Input => self.input_pads,
        }
    }

    /// Validated flags described by the snapshot.
    pub fn flags(&self) -> Result<TopologyFlags, TopologyError> {
        TopologyFlags::new(self.aggregate, self.ownership)
    }

    /// Builds a new unit with the same shape, flags, format, and limits.
    ///
    /// Channel and range handles differ from the captured unit; the per-channel
    /// records of the new unit's snapshot are equal.
    pub fn restore(&self) -> Result<AudioUnit, TopologyError> {
        AudioUnit::builder()
            .flags(self.flags()?)
            .format(self.format)
            .limits(self.limits)
            .parallel_paths(self.parallel_paths)
            .output_pads(self.output_pads)
            .input_pads(self.input_pads)
            .build()
    }
}
