//! Structural invariant checks.
//!
//! [`Topology::verify`] walks the whole topology and reports the first broken
//! invariant. It is O(channels x pads) and meant for tests, debug builds, and
//! the `check` command of the CLI, not for the render path.

use std::collections::HashMap;

use thiserror::Error;

use super::Topology;
use super::arena::{ChannelId, RangeId};
use super::chain::Span;
use super::layout::{Aliasing, Role};

/// First invariant found broken by [`Topology::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The line list does not hold exactly `pads x width` channels.
    #[error("{role} line holds {found} channels, expected {expected}")]
    ChannelCount {
        /// Role checked.
        role: Role,
        /// `pads * parallel_path_count`.
        expected: usize,
        /// Channels reached by walking the line list.
        found: usize,
    },

    /// A channel sits at the wrong position, or its line index is stale.
    #[error("{channel} has line {found}, expected {expected}")]
    LineIndex {
        /// Offending channel.
        channel: ChannelId,
        /// Line index implied by its position.
        expected: usize,
        /// Stored line index.
        found: usize,
    },

    /// `next`/`prev` or the role's first/last do not agree.
    #[error("{role} line list is inconsistent at {channel}")]
    BrokenLine {
        /// Role checked.
        role: Role,
        /// Channel where the mismatch was found.
        channel: ChannelId,
    },

    /// `next_pad`/`prev_pad` do not connect the column in pad order.
    #[error("pad column is inconsistent at {0}")]
    BrokenColumn(ChannelId),

    /// Channels exist in storage that are on no line list.
    #[error("{0} channel(s) are allocated but unreachable")]
    LeakedChannels(usize),

    /// A channel of an owning role lacks its range, or a non-owning channel has one.
    #[error("{0} does not match its role's buffer ownership")]
    Ownership(ChannelId),

    /// A span does not walk from `first` to `last` over live ranges.
    #[error("span of {0} is not a live contiguous chain")]
    BrokenSpan(ChannelId),

    /// An aliasing channel's span differs from what its aliasing rule implies.
    #[error("{channel} aliases {found:?}, expected {expected:?}")]
    Alias {
        /// Aliasing channel.
        channel: ChannelId,
        /// Span implied by the source role.
        expected: Option<Span>,
        /// Stored span.
        found: Option<Span>,
    },

    /// A range's alias count disagrees with the spans covering it.
    #[error("{range} records {found} aliasers, {expected} spans cover it")]
    AliasCount {
        /// Range checked.
        range: RangeId,
        /// Spans actually covering it.
        expected: u32,
        /// Stored count.
        found: u32,
    },

    /// A range still carries a buffer format other than the unit's.
    #[error("{0} carries a stale buffer format")]
    StaleFormat(RangeId),

    /// Owned ranges of a column are not chained in pad order.
    #[error("owned chain is out of pad order at {0}")]
    ChainOrder(RangeId),

    /// A range has no live owner pointing back at it.
    #[error("{0} is allocated but not owned by a live channel")]
    LeakedRange(RangeId),
}

impl Topology {
    /// Checks every structural invariant.
    ///
    /// - each role's line list holds `pads x width` channels in row-major
    ///   order with `line == pad * width + path`;
    /// - pad columns link each channel to the one directly below it;
    /// - every owning channel holds exactly its own range, and owned ranges of
    ///   a column are chained in pad order;
    /// - every span walks over live ranges from `first` to `last`;
    /// - aliases match the aliasing rule for the current state;
    /// - alias counts match the spans covering each range;
    /// - every range carries the unit's buffer format;
    /// - no channel or range is leaked.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        for role in Role::ALL {
            self.verify_line(role)?;
            self.verify_columns(role)?;
        }
        let reachable = self.channels.len(Role::Output) + self.channels.len(Role::Input);
        if self.channels.total() != reachable {
            return Err(InvariantViolation::LeakedChannels(
                self.channels.total() - reachable,
            ));
        }
        self.verify_ownership()?;
        self.verify_spans()?;
        self.verify_aliases()?;
        for role in Role::ALL {
            if self.flags.owns_buffers(role) {
                self.verify_chain_order(role)?;
            }
        }
        Ok(())
    }

    fn verify_line(&self, role: Role) -> Result<(), InvariantViolation> {
        let width = self.width;
        let expected = self.channels.pads(role) * width;
        let mut prev: Option<ChannelId> = None;
        let mut found = 0;

        for id in self.channels.line(role).take(expected + 1) {
            let node = &self.channels[id];
            if node.role != role || node.prev != prev {
                return Err(InvariantViolation::BrokenLine { role, channel: id });
            }
            if width == 0 || found >= expected {
                found += 1;
                break;
            }
            let (pad, path) = (found / width, found % width);
            if node.pad != pad || node.path != path || node.line != found {
                return Err(InvariantViolation::LineIndex {
                    channel: id,
                    expected: found,
                    found: node.line,
                });
            }
            prev = Some(id);
            found += 1;
        }

        if found != expected || self.channels.len(role) != expected {
            return Err(InvariantViolation::ChannelCount {
                role,
                expected,
                found,
            });
        }
        if self.channels.last(role) != prev {
            let channel = self.channels.last(role).or(prev);
            return match channel {
                Some(channel) => Err(InvariantViolation::BrokenLine { role, channel }),
                None => Ok(()),
            };
        }
        Ok(())
    }

    fn verify_columns(&self, role: Role) -> Result<(), InvariantViolation> {
        let pads = self.channels.pads(role);
        for id in self.channels.line(role) {
            let node = &self.channels[id];
            let below_ok = match node.next_pad {
                Some(below) => self.channels.get(below).is_some_and(|b| {
                    b.role == role
                        && b.pad == node.pad + 1
                        && b.path == node.path
                        && b.prev_pad == Some(id)
                }),
                None => node.pad + 1 == pads,
            };
            let above_ok = match node.prev_pad {
                Some(above) => self
                    .channels
                    .get(above)
                    .is_some_and(|a| a.pad + 1 == node.pad && a.next_pad == Some(id)),
                None => node.pad == 0,
            };
            if !below_ok || !above_ok {
                return Err(InvariantViolation::BrokenColumn(id));
            }
        }
        Ok(())
    }

    fn verify_ownership(&self) -> Result<(), InvariantViolation> {
        let mut owned = 0;
        for role in Role::ALL {
            let owns = self.flags.owns_buffers(role);
            for id in self.channels.line(role) {
                let node = &self.channels[id];
                match node.owned {
                    Some(range) if owns => {
                        let backlinked = self.chain.get(range).is_some_and(|r| r.owner == id);
                        if !backlinked || node.span != Some(Span::single(range)) {
                            return Err(InvariantViolation::Ownership(id));
                        }
                        owned += 1;
                    }
                    None if !owns => {}
                    _ => return Err(InvariantViolation::Ownership(id)),
                }
            }
        }
        if self.chain.len() != owned {
            let leaked = self.chain.iter().find(|&(range, r)| {
                self.channels.get(r.owner).is_none_or(|n| n.owned != Some(range))
            });
            if let Some((range, _)) = leaked {
                return Err(InvariantViolation::LeakedRange(range));
            }
        }
        Ok(())
    }

    /// Walks every span and checks alias counts against the walks.
    fn verify_spans(&self) -> Result<(), InvariantViolation> {
        let limit = self.chain.len();
        let mut covering: HashMap<RangeId, u32> = HashMap::new();

        for (id, node) in self.channels.iter() {
            let Some(span) = node.span else { continue };
            let mut steps = 0;
            let mut cursor = Some(span.first);
            let mut reached = false;
            while let Some(range) = cursor {
                let Some(r) = self.chain.get(range) else { break };
                steps += 1;
                if node.owned.is_none() {
                    *covering.entry(range).or_default() += 1;
                }
                if range == span.last {
                    reached = true;
                    break;
                }
                if steps > limit {
                    break;
                }
                cursor = r.next;
            }
            if !reached {
                return Err(InvariantViolation::BrokenSpan(id));
            }
        }

        for (range, r) in self.chain.iter() {
            let expected = covering.get(&range).copied().unwrap_or(0);
            if r.aliasers != expected {
                return Err(InvariantViolation::AliasCount {
                    range,
                    expected,
                    found: r.aliasers,
                });
            }
            if r.format != self.format {
                return Err(InvariantViolation::StaleFormat(range));
            }
        }
        Ok(())
    }

    fn verify_aliases(&self) -> Result<(), InvariantViolation> {
        let Some(alias_role) = self.flags.aliasing().alias_role() else {
            return Ok(());
        };
        let mut sources = match self.flags.aliasing() {
            Aliasing::OneToOne { source } => Some(self.channels.line(source)),
            _ => None,
        };
        for id in self.channels.line(alias_role) {
            let node = &self.channels[id];
            let expected = match sources.as_mut() {
                Some(sources) => sources.next().and_then(|s| self.channels[s].span),
                None => self.chain.column_span(&self.channels, Role::Input, node.path),
            };
            if node.span != expected {
                return Err(InvariantViolation::Alias {
                    channel: id,
                    expected,
                    found: node.span,
                });
            }
        }
        Ok(())
    }

    fn verify_chain_order(&self, role: Role) -> Result<(), InvariantViolation> {
        for head in self
            .channels
            .line(role)
            .take_while(|&id| self.channels[id].pad == 0)
        {
            let mut prev: Option<RangeId> = None;
            for node in self.channels.column_from(Some(head)) {
                let Some(range) = self.channels[node].owned else {
                    continue;
                };
                let r = &self.chain[range];
                let linked_back = prev.is_none_or(|p| self.chain[p].next == Some(range));
                if r.prev != prev || !linked_back {
                    return Err(InvariantViolation::ChainOrder(range));
                }
                prev = Some(range);
            }
            if let Some(tail) = prev {
                if self.chain[tail].next.is_some() {
                    return Err(InvariantViolation::ChainOrder(tail));
                }
            }
        }
        Ok(())
    }
}
