//! Buffer-chain manager: owned ranges, aliases, and chain splicing.
//!
//! Every owning channel allocates exactly one [`BufferRange`]. Ranges owned by
//! one role are linked into one doubly linked chain per pad column, in pad
//! order, so the ranges of a whole column form a contiguous run. A channel's
//! [`Span`] is an inclusive `first..=last` walk over that chain:
//!
//! ```text
//! input column 0:  [r(0,0)] <-> [r(1,0)] <-> [r(2,0)] <-> [r(3,0)]
//!                     ^                                      ^
//! async output 0:   first ---------------------------------- last
//! ```
//!
//! Channels of the aliasing role hold span copies only. Each range counts the
//! aliasing spans that cover it, which makes "has aliasers" an O(1) query and
//! lets [`BufferChain::release_owned`] refuse to free a range that is still
//! referenced.

use std::ops::{Index, IndexMut};

use super::arena::{Arena, ChannelId, RangeId, UnitId};
use super::channel::ChannelGraph;
use super::error::TopologyError;
use super::layout::{BufferFormat, Role};

/// Inclusive span of buffer-chain ranges, walked through range `next` links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    /// First range of the walk.
    pub first: RangeId,
    /// Last range of the walk (inclusive).
    pub last: RangeId,
}

impl Span {
    /// A span covering exactly one range.
    #[inline]
    pub fn single(range: RangeId) -> Self {
        Self {
            first: range,
            last: range,
        }
    }

    /// Returns true if the span covers exactly one range.
    #[inline]
    pub fn is_single(self) -> bool {
        self.first == self.last
    }
}

/// One buffer holder on the chain.
#[derive(Debug, Clone)]
pub(crate) struct BufferRange {
    pub owner: ChannelId,
    pub next: Option<RangeId>,
    pub prev: Option<RangeId>,
    pub format: BufferFormat,
    /// Number of aliasing spans covering this range.
    pub aliasers: u32,
}

/// Read-only copy of a range's links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeView {
    /// Handle of the range.
    pub id: RangeId,
    /// Channel that allocated the range.
    pub owner: ChannelId,
    /// Next range on the chain.
    pub next: Option<RangeId>,
    /// Previous range on the chain.
    pub prev: Option<RangeId>,
    /// Sample format of the buffers held by this range.
    pub format: BufferFormat,
    /// Number of aliasing spans covering this range.
    pub aliasers: u32,
}

/// All buffer-chain ranges of one unit.
pub(crate) struct BufferChain {
    ranges: Arena<RangeId, BufferRange>,
}

impl BufferChain {
    pub fn new(unit: UnitId) -> Self {
        Self {
            ranges: Arena::new(unit),
        }
    }

    pub fn reserve(&mut self, additional: usize) -> Result<(), TopologyError> {
        self.ranges
            .try_reserve(additional)
            .map_err(|_| TopologyError::AllocationFailed {
                what: "ranges",
                requested: additional,
            })
    }

    #[inline]
    pub fn get(&self, id: RangeId) -> Option<&BufferRange> {
        self.ranges.get(id)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RangeId, &BufferRange)> + '_ {
        self.ranges.iter()
    }

    pub fn view(&self, id: RangeId) -> Option<RangeView> {
        self.get(id).map(|r| RangeView {
            id,
            owner: r.owner,
            next: r.next,
            prev: r.prev,
            format: r.format,
            aliasers: r.aliasers,
        })
    }

    /// Creates an unlinked range owned by `owner`.
    pub fn allocate_range(&mut self, owner: ChannelId, format: BufferFormat) -> RangeId {
        self.ranges.insert(BufferRange {
            owner,
            next: None,
            prev: None,
            format,
            aliasers: 0,
        })
    }

    /// Links `new` directly after `tail`.
    pub fn append_owned(&mut self, tail: RangeId, new: RangeId) {
        debug_assert!(
            self[new].next.is_none() && self[new].prev.is_none(),
            "{new} is already on a chain"
        );
        let after = self[tail].next;
        self[tail].next = Some(new);
        {
            let r = &mut self[new];
            r.prev = Some(tail);
            r.next = after;
        }
        if let Some(after) = after {
            self[after].prev = Some(new);
        }
    }

    /// Allocates `node`'s own range and links it after its column predecessor's range.
    pub fn attach_owned(
        &mut self,
        channels: &mut ChannelGraph,
        node: ChannelId,
        column_pred: Option<ChannelId>,
        format: BufferFormat,
    ) -> RangeId {
        let range = self.allocate_range(node, format);
        if let Some(tail) = column_pred.and_then(|p| channels[p].owned) {
            self.append_owned(tail, range);
        }
        let n = &mut channels[node];
        debug_assert!(n.span.is_none(), "{node} already holds a span");
        n.owned = Some(range);
        n.span = Some(Span::single(range));
        range
    }

    /// Unlinks `range` from its chain, relinking its neighbors, then frees it.
    ///
    /// # Panics
    ///
    /// Panics if any aliasing span still covers the range, or if the range was
    /// already released.
    pub fn release_owned(&mut self, range: RangeId) -> BufferRange {
        let r = &self[range];
        assert!(
            r.aliasers == 0,
            "releasing {range} while {} alias span(s) still cover it",
            r.aliasers
        );
        let (next, prev) = (r.next, r.prev);
        if let Some(p) = prev {
            self[p].next = next;
        }
        if let Some(n) = next {
            self[n].prev = prev;
        }
        let mut removed = self
            .ranges
            .remove(range)
            .unwrap_or_else(|| panic!("releasing stale range {range}"));
        removed.next = None;
        removed.prev = None;
        removed
    }

    /// Releases the range `node` owns, if any.
    pub fn detach_owned(&mut self, channels: &mut ChannelGraph, node: ChannelId) -> bool {
        let Some(range) = channels[node].owned else {
            return false;
        };
        self.release_owned(range);
        let n = &mut channels[node];
        n.owned = None;
        n.span = None;
        true
    }

    /// Replaces the alias span of `node`, keeping alias counts in step.
    ///
    /// Returns false if the span was already equal.
    pub fn assign_alias(
        &mut self,
        channels: &mut ChannelGraph,
        node: ChannelId,
        span: Option<Span>,
    ) -> bool {
        let current = channels[node].span;
        if current == span {
            return false;
        }
        assert!(
            channels[node].owned.is_none(),
            "{node} owns its range and cannot hold an alias"
        );
        if let Some(old) = current {
            self.count_aliasers(old, false);
        }
        if let Some(new) = span {
            self.count_aliasers(new, true);
        }
        channels[node].span = span;
        true
    }

    /// Points `alias` at the single range `source` owns.
    ///
    /// # Panics
    ///
    /// Panics if the source span covers more than one range.
    pub fn alias_sync(
        &mut self,
        channels: &mut ChannelGraph,
        alias: ChannelId,
        source: ChannelId,
    ) -> bool {
        let span = channels[source].span;
        if let Some(span) = span {
            assert!(
                span.is_single(),
                "sync alias source {source} spans more than one range"
            );
        }
        self.assign_alias(channels, alias, span)
    }

    /// Points output channel `output` at the whole input column at `path`.
    pub fn alias_async(
        &mut self,
        channels: &mut ChannelGraph,
        output: ChannelId,
        path: usize,
    ) -> bool {
        let span = self.column_span(channels, Role::Input, path);
        self.assign_alias(channels, output, span)
    }

    /// Clears the alias span of `node`.
    pub fn sever_alias(&mut self, channels: &mut ChannelGraph, node: ChannelId) -> bool {
        self.assign_alias(channels, node, None)
    }

    /// Span from the pad-0 range to the last pad's range of `role`'s column at `path`.
    pub fn column_span(&self, channels: &ChannelGraph, role: Role, path: usize) -> Option<Span> {
        let head = channels.column_head(role, path)?;
        let first = channels[head].owned?;
        let last = channels[channels.pad_last(head)].owned?;
        Some(Span { first, last })
    }

    /// Re-links every owned range of `role` so each column chain runs in pad order.
    ///
    /// Returns the number of links that had to be corrected.
    pub fn rechain_after_resize(&mut self, channels: &ChannelGraph, role: Role) -> usize {
        let mut fixes = 0;
        for head in channels.line(role).take_while(|&id| channels[id].pad == 0) {
            let mut prev: Option<RangeId> = None;
            for node in channels.column_from(Some(head)) {
                let Some(range) = channels[node].owned else {
                    continue;
                };
                if self[range].prev != prev {
                    self[range].prev = prev;
                    fixes += 1;
                }
                if let Some(p) = prev {
                    if self[p].next != Some(range) {
                        self[p].next = Some(range);
                        fixes += 1;
                    }
                }
                prev = Some(range);
            }
            if let Some(tail) = prev {
                if self[tail].next.take().is_some() {
                    fixes += 1;
                }
            }
        }
        fixes
    }

    /// Walks `span` from `first` to `last`.
    pub fn span_ranges(&self, span: Span) -> SpanRanges<'_> {
        SpanRanges {
            chain: self,
            cursor: Some(span.first),
            last: span.last,
        }
    }

    /// Zero-based position of `range` within `span`.
    pub fn position(&self, span: Span, range: RangeId) -> Option<usize> {
        self.span_ranges(span).position(|r| r == range)
    }

    /// First owner along `span` after the ranges of `prev_owner`.
    ///
    /// With `None`, returns the owner of the span's first range.
    pub fn find_next_owner(&self, span: Span, prev_owner: Option<ChannelId>) -> Option<ChannelId> {
        let mut passed = prev_owner.is_none();
        for id in self.span_ranges(span) {
            let owner = self[id].owner;
            if Some(owner) == prev_owner {
                passed = true;
            } else if passed {
                return Some(owner);
            }
        }
        None
    }

    pub fn has_aliasers(&self, range: RangeId) -> bool {
        self.get(range).is_some_and(|r| r.aliasers > 0)
    }

    /// Stamps `format` on every range. Returns the number of ranges touched.
    pub fn set_format(&mut self, format: BufferFormat) -> usize {
        let mut touched = 0;
        for range in self.ranges.values_mut() {
            range.format = format;
            touched += 1;
        }
        touched
    }

    fn count_aliasers(&mut self, span: Span, add: bool) {
        let mut id = span.first;
        loop {
            let r = &mut self[id];
            if add {
                r.aliasers += 1;
            } else {
                r.aliasers = r
                    .aliasers
                    .checked_sub(1)
                    .unwrap_or_else(|| panic!("alias count underflow on {id}"));
            }
            if id == span.last {
                return;
            }
            id = r.next.unwrap_or_else(|| {
                panic!(
                    "span {}..={} is not a contiguous chain",
                    span.first, span.last
                )
            });
        }
    }
}

impl Index<RangeId> for BufferChain {
    type Output = BufferRange;

    #[inline]
    fn index(&self, id: RangeId) -> &BufferRange {
        self.ranges
            .get(id)
            .unwrap_or_else(|| panic!("range {id} was already released"))
    }
}

impl IndexMut<RangeId> for BufferChain {
    #[inline]
    fn index_mut(&mut self, id: RangeId) -> &mut BufferRange {
        self.ranges
            .get_mut(id)
            .unwrap_or_else(|| panic!("range {id} was already released"))
    }
}

/// Iterator over the ranges of a [`Span`], in chain order.
///
/// Stops early at a released range or a broken link.
pub struct SpanRanges<'a> {
    chain: &'a BufferChain,
    cursor: Option<RangeId>,
    last: RangeId,
}

impl Iterator for SpanRanges<'_> {
    type Item = RangeId;

    fn next(&mut self) -> Option<RangeId> {
        let id = self.cursor.take()?;
        let range = self.chain.get(id)?;
        if id != self.last {
            self.cursor = range.next;
        }
        Some(id)
    }
}
