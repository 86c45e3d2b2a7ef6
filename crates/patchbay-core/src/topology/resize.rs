//! Topology resize engine.
//!
//! Width and depth changes run as fixed step sequences:
//!
//! 1. **check**: no-op requests return immediately; limits are validated and
//!    storage for every new channel and range is reserved, so a failure leaves
//!    the topology untouched;
//! 2. **grow or shrink**: channels are created (owning role first) or removed
//!    (aliasing role first, pad-descending) one fully linked unit at a time;
//! 3. **relink**: line indices are recomputed and owned column chains are
//!    re-checked;
//! 4. **realias**: every alias span is recomputed from the current state of
//!    the owning role.
//!
//! Aliases into a range are always severed before the range is released.

use super::Topology;
use super::arena::ChannelId;
use super::error::TopologyError;
use super::layout::{Aliasing, BufferFormat, Role, TopologyFlags};

/// Counts of the structural work one mutation performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResizeReport {
    /// Channels created.
    pub created_channels: usize,
    /// Channels destroyed.
    pub destroyed_channels: usize,
    /// Buffer-chain ranges allocated.
    pub allocated_ranges: usize,
    /// Buffer-chain ranges released.
    pub released_ranges: usize,
    /// Surviving channels whose alias span was assigned, changed, or cleared.
    pub realiased_channels: usize,
}

impl ResizeReport {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Topology {
    /// Changes the number of parallel paths of both roles.
    pub(crate) fn set_parallel_path_count(
        &mut self,
        width: usize,
    ) -> Result<ResizeReport, TopologyError> {
        let old = self.width;
        if width == old {
            return Ok(ResizeReport::default());
        }
        if width > self.limits.max_parallel_paths {
            return Err(TopologyError::TooManyParallelPaths {
                requested: width,
                limit: self.limits.max_parallel_paths,
            });
        }

        let mut report = ResizeReport::default();
        if width > old {
            let delta = width - old;
            let mut channels = 0usize;
            let mut ranges = 0usize;
            for role in Role::ALL {
                let added = self.channels.pads(role).saturating_mul(delta);
                channels = channels.saturating_add(added);
                if self.flags.owns_buffers(role) {
                    ranges = ranges.saturating_add(added);
                }
            }
            self.channels.reserve(channels)?;
            self.chain.reserve(ranges)?;

            for role in self.owning_first() {
                self.grow_width(role, old, width, &mut report);
            }
        } else {
            let [first, second] = self.owning_first();
            for role in [second, first] {
                self.shrink_width(role, width, &mut report);
            }
        }

        for role in Role::ALL {
            self.channels.reindex_line(role, width);
        }
        self.width = width;
        report.realiased_channels += self.refresh_aliases();
        self.revision += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "topology_resize: {} parallel paths {old} -> {width} ({report:?})",
            self.unit
        );
        Ok(report)
    }

    /// Changes the pad count of one role.
    pub(crate) fn set_pad_count(
        &mut self,
        role: Role,
        pads: usize,
    ) -> Result<ResizeReport, TopologyError> {
        let old = self.channels.pads(role);
        if pads == old {
            return Ok(ResizeReport::default());
        }
        if pads > self.limits.max_pads {
            return Err(TopologyError::TooManyPads {
                role,
                requested: pads,
                limit: self.limits.max_pads,
            });
        }

        let mut report = ResizeReport::default();
        let owns = self.flags.owns_buffers(role);
        let mut severed = Vec::new();
        if pads > old {
            let added = (pads - old).saturating_mul(self.width);
            self.channels.reserve(added)?;
            if owns {
                self.chain.reserve(added)?;
            }
            self.grow_pads(role, old, pads, &mut report);
        } else {
            severed = self.sever_aliases_into(role, pads);
            self.shrink_pads(role, pads, &mut report);
        }

        self.channels.set_pads(role, pads);
        if owns {
            self.chain.rechain_after_resize(&self.channels, role);
        }
        report.realiased_channels += self.refresh_aliases() + self.left_unaliased(&severed);
        self.revision += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "topology_resize: {} {role} pads {old} -> {pads} ({report:?})",
            self.unit
        );
        Ok(report)
    }

    /// Switches aggregation mode and ownership at runtime.
    ///
    /// Every alias is severed, ranges of roles that stop owning are released,
    /// roles that start owning allocate and chain fresh ranges, then aliases
    /// are recomputed under the new rule.
    pub(crate) fn set_flags(
        &mut self,
        flags: TopologyFlags,
    ) -> Result<ResizeReport, TopologyError> {
        let old = self.flags;
        if flags == old {
            return Ok(ResizeReport::default());
        }

        let starting: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|&role| flags.owns_buffers(role) && !old.owns_buffers(role))
            .collect();
        let needed = starting.iter().map(|&role| self.channels.len(role)).sum();
        self.chain.reserve(needed)?;

        let mut report = ResizeReport::default();
        let aliased: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, node)| node.owned.is_none() && node.span.is_some())
            .map(|(id, _)| id)
            .collect();
        let mut severed = Vec::with_capacity(aliased.len());
        for node in aliased {
            if self.chain.sever_alias(&mut self.channels, node) {
                severed.push(node);
            }
        }

        for role in Role::ALL {
            if old.owns_buffers(role) && !flags.owns_buffers(role) {
                let nodes: Vec<ChannelId> = self.channels.line(role).collect();
                for node in nodes {
                    if self.chain.detach_owned(&mut self.channels, node) {
                        report.released_ranges += 1;
                    }
                }
            }
        }

        self.flags = flags;
        for role in starting {
            let nodes: Vec<ChannelId> = self.channels.line(role).collect();
            for node in nodes {
                let above = self.channels[node].prev_pad;
                self.chain
                    .attach_owned(&mut self.channels, node, above, self.format);
                report.allocated_ranges += 1;
            }
            self.chain.rechain_after_resize(&self.channels, role);
        }

        report.realiased_channels += self.refresh_aliases() + self.left_unaliased(&severed);
        self.revision += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!("topology_flags: {} {old} -> {flags} ({report:?})", self.unit);
        Ok(report)
    }

    /// Stamps a new buffer format on every range. Returns false if unchanged.
    pub(crate) fn set_format(&mut self, format: BufferFormat) -> bool {
        if format == self.format {
            return false;
        }
        self.format = format;
        let _touched = self.chain.set_format(format);
        self.revision += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "topology_format: {} {} Hz / {} frames on {_touched} ranges",
            self.unit,
            format.samplerate,
            format.buffer_size
        );
        true
    }

    /// Roles ordered so owners come before aliasers.
    fn owning_first(&self) -> [Role; 2] {
        match self.flags.aliasing().source_role() {
            Some(source) => [source, source.other()],
            None => Role::ALL,
        }
    }

    /// Inserts paths `old..width` into every pad row of `role`.
    fn grow_width(&mut self, role: Role, old: usize, width: usize, report: &mut ResizeReport) {
        let pads = self.channels.pads(role);
        if pads == 0 {
            return;
        }
        let owns = self.flags.owns_buffers(role);

        // Row tails before the splice; with no existing paths every row appends at the line tail.
        let row_tails: Vec<Option<ChannelId>> = if old == 0 {
            vec![None; pads]
        } else {
            self.channels
                .line(role)
                .filter(|&id| self.channels[id].path == old - 1)
                .map(Some)
                .collect()
        };
        let mut column_tail: Vec<Option<ChannelId>> = vec![None; width - old];

        for (pad, row_tail) in row_tails.into_iter().enumerate() {
            let mut pred = if old == 0 {
                self.channels.last(role)
            } else {
                row_tail
            };
            for path in old..width {
                let succ = match pred {
                    Some(p) => self.channels[p].next,
                    None => self.channels.first(role),
                };
                let node = self.channels.create_node(role, pad, path, width);
                self.channels.splice_into_line(node, pred, succ);
                let above = column_tail[path - old];
                self.channels.splice_into_pad_column(node, above, None);
                if owns {
                    self.chain
                        .attach_owned(&mut self.channels, node, above, self.format);
                    report.allocated_ranges += 1;
                }
                column_tail[path - old] = Some(node);
                pred = Some(node);
                report.created_channels += 1;
            }
        }
    }

    /// Removes every channel of `role` at `path >= width`, last pad first.
    fn shrink_width(&mut self, role: Role, width: usize, report: &mut ResizeReport) {
        let doomed: Vec<ChannelId> = self
            .channels
            .line_rev(role)
            .filter(|&id| self.channels[id].path >= width)
            .collect();
        for node in doomed {
            self.remove_channel(node, report);
        }
    }

    /// Appends pad rows `old..pads` to `role`.
    fn grow_pads(&mut self, role: Role, old: usize, pads: usize, report: &mut ResizeReport) {
        let width = self.width;
        // No columns means no channels; only the pad count changes.
        if width == 0 {
            return;
        }
        let owns = self.flags.owns_buffers(role);
        let mut column_tail = if old == 0 {
            vec![None; width]
        } else {
            self.channels.last_row(role, width)
        };

        for pad in old..pads {
            for path in 0..width {
                let node = self.channels.create_node(role, pad, path, width);
                let tail = self.channels.last(role);
                self.channels.splice_into_line(node, tail, None);
                self.channels
                    .splice_into_pad_column(node, column_tail[path], None);
                if owns {
                    self.chain.attach_owned(
                        &mut self.channels,
                        node,
                        column_tail[path],
                        self.format,
                    );
                    report.allocated_ranges += 1;
                }
                column_tail[path] = Some(node);
                report.created_channels += 1;
            }
        }
    }

    /// Removes line-tail channels of `role` until only `pads` rows remain.
    fn shrink_pads(&mut self, role: Role, pads: usize, report: &mut ResizeReport) {
        let keep = pads * self.width;
        while self.channels.len(role) > keep {
            let Some(tail) = self.channels.last(role) else {
                break;
            };
            self.remove_channel(tail, report);
        }
    }

    /// Severs the aliases that point into rows of `role` about to be removed.
    fn sever_aliases_into(&mut self, role: Role, pads: usize) -> Vec<ChannelId> {
        let aliasing = self.flags.aliasing();
        if aliasing.source_role() != Some(role) {
            return Vec::new();
        }
        let affected: Vec<ChannelId> = match aliasing {
            Aliasing::OneToOne { source } => self
                .channels
                .line(source.other())
                .filter(|&id| self.channels[id].pad >= pads)
                .collect(),
            Aliasing::FanIn => self.channels.line(Role::Output).collect(),
            Aliasing::Independent => Vec::new(),
        };
        affected
            .into_iter()
            .filter(|&node| self.chain.sever_alias(&mut self.channels, node))
            .collect()
    }

    /// Severs or releases the channel's span, unlinks it, and frees it.
    fn remove_channel(&mut self, node: ChannelId, report: &mut ResizeReport) {
        if self.chain.detach_owned(&mut self.channels, node) {
            report.released_ranges += 1;
        } else {
            self.chain.sever_alias(&mut self.channels, node);
        }
        self.channels.unlink(node);
        self.channels.destroy(node);
        report.destroyed_channels += 1;
    }

    /// Recomputes every alias span from the owning role. Returns the number changed.
    pub(crate) fn refresh_aliases(&mut self) -> usize {
        match self.flags.aliasing() {
            Aliasing::Independent => 0,
            Aliasing::OneToOne { source } => {
                // Both roles share one width, so the n-th alias and n-th source
                // channels sit at the same (pad, path).
                let pairs: Vec<(ChannelId, Option<ChannelId>)> = {
                    let mut sources = self.channels.line(source);
                    self.channels
                        .line(source.other())
                        .map(|alias| (alias, sources.next()))
                        .collect()
                };
                pairs
                    .into_iter()
                    .filter(|&(alias, source)| match source {
                        Some(source) => self.chain.alias_sync(&mut self.channels, alias, source),
                        None => self.chain.sever_alias(&mut self.channels, alias),
                    })
                    .count()
            }
            Aliasing::FanIn => {
                let outputs: Vec<(ChannelId, usize)> = self
                    .channels
                    .line(Role::Output)
                    .map(|id| (id, self.channels[id].path))
                    .collect();
                outputs
                    .into_iter()
                    .filter(|&(output, path)| {
                        self.chain.alias_async(&mut self.channels, output, path)
                    })
                    .count()
            }
        }
    }

    /// Severed channels that still exist but no longer hold an alias.
    fn left_unaliased(&self, severed: &[ChannelId]) -> usize {
        severed
            .iter()
            .filter(|&&id| {
                self.channels
                    .get(id)
                    .is_some_and(|node| node.span.is_none() || node.owned.is_some())
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::layout::{AggregateMode, Ownership, TopologyLimits};

    fn topology(flags: TopologyFlags, width: usize, outputs: usize, inputs: usize) -> Topology {
        let mut topo = Topology::new(
            crate::topology::arena::UnitId::next(),
            flags,
            BufferFormat::default(),
            TopologyLimits::default(),
        );
        topo.set_pad_count(Role::Input, inputs).unwrap();
        topo.set_pad_count(Role::Output, outputs).unwrap();
        topo.set_parallel_path_count(width).unwrap();
        topo.verify().unwrap();
        topo
    }

    #[test]
    fn first_allocation_builds_full_matrix() {
        let topo = topology(TopologyFlags::sync(), 2, 3, 3);
        assert_eq!(topo.channel_count(Role::Output), 6);
        assert_eq!(topo.channel_count(Role::Input), 6);
        assert_eq!(topo.range_count(), 6);
    }

    #[test]
    fn width_grow_reports_work() {
        let mut topo = topology(TopologyFlags::sync(), 1, 2, 2);
        let report = topo.set_parallel_path_count(3).unwrap();
        assert_eq!(report.created_channels, 8);
        assert_eq!(report.allocated_ranges, 4);
        assert_eq!(report.realiased_channels, 4);
        topo.verify().unwrap();
    }

    #[test]
    fn same_width_is_a_no_op() {
        let mut topo = topology(TopologyFlags::fan_in(), 2, 1, 4);
        let revision = topo.revision();
        assert!(topo.set_parallel_path_count(2).unwrap().is_empty());
        assert_eq!(topo.revision(), revision);
    }

    #[test]
    fn shrink_to_zero_width_keeps_pad_counts() {
        let mut topo = topology(TopologyFlags::fan_in(), 2, 1, 4);
        let report = topo.set_parallel_path_count(0).unwrap();
        assert_eq!(report.destroyed_channels, 10);
        assert_eq!(report.released_ranges, 8);
        assert_eq!(topo.range_count(), 0);
        assert_eq!(topo.pad_count(Role::Input), 4);
        topo.verify().unwrap();

        topo.set_parallel_path_count(2).unwrap();
        assert_eq!(topo.channel_count(Role::Input), 8);
        topo.verify().unwrap();
    }

    #[test]
    fn pad_grow_without_paths_creates_nothing() {
        let mut topo = Topology::new(
            crate::topology::arena::UnitId::next(),
            TopologyFlags::fan_in(),
            BufferFormat::default(),
            TopologyLimits {
                max_parallel_paths: usize::MAX,
                max_pads: usize::MAX,
            },
        );
        let report = topo.set_pad_count(Role::Input, usize::MAX).unwrap();
        assert!(report.is_empty());
        assert_eq!(topo.pad_count(Role::Input), usize::MAX);
        assert_eq!(topo.channel_count(Role::Input), 0);
        topo.verify().unwrap();
    }

    #[test]
    fn fan_in_input_shrink_realiases_outputs() {
        let mut topo = topology(TopologyFlags::fan_in(), 2, 1, 4);
        let report = topo.set_pad_count(Role::Input, 2).unwrap();
        assert_eq!(report.released_ranges, 4);
        assert_eq!(report.realiased_channels, 2);
        topo.verify().unwrap();

        let report = topo.set_pad_count(Role::Input, 0).unwrap();
        assert_eq!(report.realiased_channels, 2);
        assert!(topo.channels(Role::Output).all(|c| c.span.is_none()));
        topo.verify().unwrap();
    }

    #[test]
    fn limits_reject_before_mutation() {
        let mut topo = topology(TopologyFlags::sync(), 2, 1, 1);
        let err = topo.set_parallel_path_count(1000).unwrap_err();
        assert!(matches!(err, TopologyError::TooManyParallelPaths { requested: 1000, .. }));
        let err = topo.set_pad_count(Role::Output, 5000).unwrap_err();
        assert!(matches!(err, TopologyError::TooManyPads { role: Role::Output, .. }));
        assert_eq!(topo.parallel_path_count(), 2);
        topo.verify().unwrap();
    }

    #[test]
    fn flag_switch_moves_ownership() {
        let mut topo = topology(TopologyFlags::sync(), 2, 2, 2);
        let mirrored = TopologyFlags::new(AggregateMode::Sync, Ownership::Output).unwrap();

        let report = topo.set_flags(mirrored).unwrap();
        assert_eq!(report.released_ranges, 4);
        assert_eq!(report.allocated_ranges, 4);
        assert!(topo.channels(Role::Output).all(|c| c.owns_buffers));
        assert!(topo.channels(Role::Input).all(|c| !c.owns_buffers && c.span.is_some()));
        topo.verify().unwrap();

        let report = topo.set_flags(TopologyFlags::independent()).unwrap();
        assert_eq!(report.allocated_ranges, 4);
        assert_eq!(report.released_ranges, 0);
        assert_eq!(topo.range_count(), 8);
        topo.verify().unwrap();

        topo.set_flags(TopologyFlags::fan_in()).unwrap();
        assert_eq!(topo.range_count(), 4);
        topo.verify().unwrap();
    }

    #[test]
    fn format_propagates_once() {
        let mut topo = topology(TopologyFlags::independent(), 1, 1, 1);
        let format = BufferFormat {
            samplerate: 96_000,
            buffer_size: 128,
        };
        assert!(topo.set_format(format));
        assert!(!topo.set_format(format));
        let first = topo.first(Role::Input).unwrap();
        let range = topo.span(first).unwrap().first;
        assert_eq!(topo.range(range).unwrap().format, format);
    }
}
