//! Channel node model: the addressable leaves of a role's matrix.
//!
//! Each role keeps its channels on two intrusive lists:
//!
//! - the **line** list (`next`/`prev`), ordered by `line = pad * width + path`;
//! - one **pad column** list per path (`next_pad`/`prev_pad`), ordered by pad.
//!
//! Nodes live in a per-unit [`Arena`]; links are [`ChannelId`] handles rather
//! than pointers. Linking operations are O(1) and trust their arguments, so the
//! resize engine is the only caller. Destroying a node that still holds a
//! buffer span is a contract violation and panics.

use std::ops::{Index, IndexMut};

use super::arena::{Arena, ChannelId, RangeId, UnitId};
use super::chain::Span;
use super::error::TopologyError;
use super::layout::Role;

/// Internal state of one channel.
#[derive(Debug, Clone)]
pub(crate) struct ChannelNode {
    pub role: Role,
    pub pad: usize,
    pub path: usize,
    pub line: usize,
    pub next: Option<ChannelId>,
    pub prev: Option<ChannelId>,
    pub next_pad: Option<ChannelId>,
    pub prev_pad: Option<ChannelId>,
    /// Inclusive range span the channel's data flows through. Equals the
    /// owned range for owning channels, an alias otherwise.
    pub span: Option<Span>,
    /// Range this channel allocated, if its role owns buffers.
    pub owned: Option<RangeId>,
}

impl ChannelNode {
    fn is_isolated(&self) -> bool {
        self.next.is_none()
            && self.prev.is_none()
            && self.next_pad.is_none()
            && self.prev_pad.is_none()
    }
}

/// Read-only copy of a channel's addressing and span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelView {
    /// Handle of the channel.
    pub id: ChannelId,
    /// Matrix the channel belongs to.
    pub role: Role,
    /// Row index.
    pub pad: usize,
    /// Column index.
    pub path: usize,
    /// `pad * parallel_path_count + path`.
    pub line: usize,
    /// Buffer-chain span, owned or aliased.
    pub span: Option<Span>,
    /// True if the span is the channel's own range.
    pub owns_buffers: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct RoleList {
    first: Option<ChannelId>,
    last: Option<ChannelId>,
    pads: usize,
    len: usize,
}

/// Both role matrices of one unit.
pub(crate) struct ChannelGraph {
    nodes: Arena<ChannelId, ChannelNode>,
    roles: [RoleList; 2],
}

#[inline]
fn slot(role: Role) -> usize {
    match role {
        Role::Output => 0,
        Role::Input => 1,
    }
}

impl ChannelGraph {
    pub fn new(unit: UnitId) -> Self {
        Self {
            nodes: Arena::new(unit),
            roles: [RoleList::default(); 2],
        }
    }

    pub fn reserve(&mut self, additional: usize) -> Result<(), TopologyError> {
        self.nodes
            .try_reserve(additional)
            .map_err(|_| TopologyError::AllocationFailed {
                what: "channels",
                requested: additional,
            })
    }

    #[inline]
    pub fn get(&self, id: ChannelId) -> Option<&ChannelNode> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn contains(&self, id: ChannelId) -> bool {
        self.nodes.contains(id)
    }

    pub fn total(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &ChannelNode)> + '_ {
        self.nodes.iter()
    }

    #[inline]
    pub fn first(&self, role: Role) -> Option<ChannelId> {
        self.roles[slot(role)].first
    }

    #[inline]
    pub fn last(&self, role: Role) -> Option<ChannelId> {
        self.roles[slot(role)].last
    }

    /// Number of linked channels of `role`.
    #[inline]
    pub fn len(&self, role: Role) -> usize {
        self.roles[slot(role)].len
    }

    #[inline]
    pub fn pads(&self, role: Role) -> usize {
        self.roles[slot(role)].pads
    }

    pub fn set_pads(&mut self, role: Role, pads: usize) {
        self.roles[slot(role)].pads = pads;
    }

    /// Allocates an unlinked node at `(pad, path)` with its line index computed for `width`.
    pub fn create_node(&mut self, role: Role, pad: usize, path: usize, width: usize) -> ChannelId {
        self.nodes.insert(ChannelNode {
            role,
            pad,
            path,
            line: pad * width + path,
            next: None,
            prev: None,
            next_pad: None,
            prev_pad: None,
            span: None,
            owned: None,
        })
    }

    /// Links `node` between `pred` and `succ` on its role's line list.
    ///
    /// `pred.next` must equal `succ`. A `None` predecessor makes the node the
    /// line head; a `None` successor makes it the line tail.
    pub fn splice_into_line(
        &mut self,
        node: ChannelId,
        pred: Option<ChannelId>,
        succ: Option<ChannelId>,
    ) {
        let role = self[node].role;
        debug_assert!(
            pred.map_or(self.first(role), |p| self[p].next) == succ,
            "line splice of {node} between non-adjacent channels"
        );
        {
            let n = &mut self[node];
            n.prev = pred;
            n.next = succ;
        }
        match pred {
            Some(p) => self[p].next = Some(node),
            None => self.roles[slot(role)].first = Some(node),
        }
        match succ {
            Some(s) => self[s].prev = Some(node),
            None => self.roles[slot(role)].last = Some(node),
        }
        self.roles[slot(role)].len += 1;
    }

    /// Links `node` between `pred` and `succ` on its pad column.
    pub fn splice_into_pad_column(
        &mut self,
        node: ChannelId,
        pred: Option<ChannelId>,
        succ: Option<ChannelId>,
    ) {
        debug_assert!(
            pred.is_none_or(|p| self[p].next_pad == succ),
            "column splice of {node} between non-adjacent channels"
        );
        {
            let n = &mut self[node];
            n.prev_pad = pred;
            n.next_pad = succ;
        }
        if let Some(p) = pred {
            self[p].next_pad = Some(node);
        }
        if let Some(s) = succ {
            self[s].prev_pad = Some(node);
        }
    }

    /// Removes `node` from both lists and returns it isolated.
    ///
    /// # Panics
    ///
    /// Panics if the node still holds a buffer span or an owned range.
    pub fn unlink(&mut self, node: ChannelId) -> ChannelId {
        let n = &self[node];
        assert!(
            n.span.is_none() && n.owned.is_none(),
            "unlinking {node} while it still references buffer ranges"
        );
        let (role, next, prev, next_pad, prev_pad) =
            (n.role, n.next, n.prev, n.next_pad, n.prev_pad);

        match prev {
            Some(p) => self[p].next = next,
            None => self.roles[slot(role)].first = next,
        }
        match next {
            Some(s) => self[s].prev = prev,
            None => self.roles[slot(role)].last = prev,
        }
        if let Some(p) = prev_pad {
            self[p].next_pad = next_pad;
        }
        if let Some(s) = next_pad {
            self[s].prev_pad = prev_pad;
        }

        let n = &mut self[node];
        n.next = None;
        n.prev = None;
        n.next_pad = None;
        n.prev_pad = None;
        self.roles[slot(role)].len -= 1;
        node
    }

    /// Frees an isolated node.
    pub fn destroy(&mut self, node: ChannelId) -> ChannelNode {
        let removed = self
            .nodes
            .remove(node)
            .unwrap_or_else(|| panic!("destroying stale channel {node}"));
        assert!(removed.is_isolated(), "destroying {node} while still linked");
        removed
    }

    /// Recomputes every line index of `role` for `width`.
    pub fn reindex_line(&mut self, role: Role, width: usize) {
        let mut cursor = self.first(role);
        while let Some(id) = cursor {
            let n = &mut self[id];
            n.line = n.pad * width + n.path;
            cursor = n.next;
        }
    }

    /// Walks the line list of `role` in line order.
    pub fn line(&self, role: Role) -> Line<'_> {
        Line {
            graph: self,
            cursor: self.first(role),
        }
    }

    /// Walks `role`'s line list backwards.
    pub fn line_rev(&self, role: Role) -> impl Iterator<Item = ChannelId> + '_ {
        std::iter::successors(self.last(role), |&id| self[id].prev)
    }

    /// Walks a pad column downwards starting at `start`.
    pub fn column_from(&self, start: Option<ChannelId>) -> impl Iterator<Item = ChannelId> + '_ {
        std::iter::successors(start, |&id| self[id].next_pad)
    }

    /// Returns the `n`-th channel of `role` in line order.
    pub fn nth(&self, role: Role, n: usize) -> Option<ChannelId> {
        self.line(role).nth(n)
    }

    /// Returns the pad-0 channel at `path`.
    pub fn column_head(&self, role: Role, path: usize) -> Option<ChannelId> {
        self.line(role)
            .take_while(|&id| self[id].pad == 0)
            .nth(path)
    }

    /// Finds the channel at `(pad, path)` by walking row 0 then the column.
    pub fn locate(&self, role: Role, pad: usize, path: usize) -> Option<ChannelId> {
        self.column_from(self.column_head(role, path)).nth(pad)
    }

    pub fn pad_first(&self, node: ChannelId) -> ChannelId {
        std::iter::successors(Some(node), |&id| self[id].prev_pad)
            .last()
            .unwrap_or(node)
    }

    pub fn pad_last(&self, node: ChannelId) -> ChannelId {
        self.column_from(Some(node)).last().unwrap_or(node)
    }

    /// Channel `n` pads below `node` in its column.
    pub fn pad_nth(&self, node: ChannelId, n: usize) -> Option<ChannelId> {
        self.column_from(Some(node)).nth(n)
    }

    /// The channels of the last pad row, indexed by path (`width` entries).
    pub fn last_row(&self, role: Role, width: usize) -> Vec<Option<ChannelId>> {
        let mut row = vec![None; width];
        for id in self.line_rev(role).take(width) {
            let path = self[id].path;
            if path < width {
                row[path] = Some(id);
            }
        }
        row
    }

    pub fn view(&self, id: ChannelId) -> Option<ChannelView> {
        self.get(id).map(|n| ChannelView {
            id,
            role: n.role,
            pad: n.pad,
            path: n.path,
            line: n.line,
            span: n.span,
            owns_buffers: n.owned.is_some(),
        })
    }
}

impl Index<ChannelId> for ChannelGraph {
    type Output = ChannelNode;

    #[inline]
    fn index(&self, id: ChannelId) -> &ChannelNode {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("stale channel handle {id}"))
    }
}

impl IndexMut<ChannelId> for ChannelGraph {
    #[inline]
    fn index_mut(&mut self, id: ChannelId) -> &mut ChannelNode {
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|| panic!("stale channel handle {id}"))
    }
}

/// Line-order iterator over one role.
pub(crate) struct Line<'a> {
    graph: &'a ChannelGraph,
    cursor: Option<ChannelId>,
}

impl Iterator for Line<'_> {
    type Item = ChannelId;

    #[inline]
    fn next(&mut self) -> Option<ChannelId> {
        let id = self.cursor?;
        self.cursor = self.graph[id].next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `pads x width` matrix for `role` the way the resize engine does.
    fn matrix(graph: &mut ChannelGraph, role: Role, pads: usize, width: usize) {
        let mut column_tail = vec![None; width];
        for pad in 0..pads {
            for path in 0..width {
                let node = graph.create_node(role, pad, path, width);
                let tail = graph.last(role);
                graph.splice_into_line(node, tail, None);
                graph.splice_into_pad_column(node, column_tail[path], None);
                column_tail[path] = Some(node);
            }
        }
        graph.set_pads(role, pads);
    }

    #[test]
    fn line_and_column_order() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Input, 3, 2);

        let lines: Vec<usize> = graph.line(Role::Input).map(|id| graph[id].line).collect();
        assert_eq!(lines, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(graph.len(Role::Input), 6);
        assert_eq!(graph.len(Role::Output), 0);

        let head = graph.column_head(Role::Input, 1).unwrap();
        let pads: Vec<usize> = graph.column_from(Some(head)).map(|id| graph[id].pad).collect();
        assert_eq!(pads, vec![0, 1, 2]);
        assert_eq!(graph[graph.pad_last(head)].pad, 2);
    }

    #[test]
    fn locate_and_navigation() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Output, 4, 3);

        let node = graph.locate(Role::Output, 2, 1).unwrap();
        assert_eq!((graph[node].pad, graph[node].path, graph[node].line), (2, 1, 7));
        assert_eq!(graph.nth(Role::Output, 7), Some(node));
        assert_eq!(graph.pad_first(node), graph.column_head(Role::Output, 1).unwrap());
        assert_eq!(graph.pad_nth(graph.pad_first(node), 2), Some(node));
        assert!(graph.locate(Role::Output, 4, 0).is_none());
        assert!(graph.locate(Role::Output, 0, 3).is_none());
    }

    #[test]
    fn unlink_keeps_neighbors_consistent() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Input, 3, 2);

        let middle = graph.locate(Role::Input, 1, 0).unwrap();
        let above = graph.locate(Role::Input, 0, 0).unwrap();
        let below = graph.locate(Role::Input, 2, 0).unwrap();
        graph.unlink(middle);
        graph.destroy(middle);

        assert_eq!(graph[above].next_pad, Some(below));
        assert_eq!(graph[below].prev_pad, Some(above));
        assert_eq!(graph.len(Role::Input), 5);
        assert!(!graph.contains(middle));
        assert_eq!(graph.line(Role::Input).count(), 5);
    }

    #[test]
    fn unlink_head_and_tail_updates_role_ends() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Output, 1, 2);
        let first = graph.first(Role::Output).unwrap();
        let last = graph.last(Role::Output).unwrap();

        graph.unlink(first);
        assert_eq!(graph.first(Role::Output), Some(last));
        graph.unlink(last);
        assert_eq!(graph.first(Role::Output), None);
        assert_eq!(graph.last(Role::Output), None);
    }

    #[test]
    #[should_panic(expected = "still references buffer ranges")]
    fn unlink_with_span_panics() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Input, 1, 1);
        let node = graph.first(Role::Input).unwrap();

        let mut ranges: Arena<RangeId, ()> = Arena::new(UnitId::next());
        let range = ranges.insert(());
        graph[node].span = Some(Span::single(range));
        graph.unlink(node);
    }

    #[test]
    fn reindex_after_width_change() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Input, 2, 2);
        graph.reindex_line(Role::Input, 5);
        let lines: Vec<usize> = graph.line(Role::Input).map(|id| graph[id].line).collect();
        assert_eq!(lines, vec![0, 1, 5, 6]);
    }

    #[test]
    fn last_row_by_path() {
        let mut graph = ChannelGraph::new(UnitId::next());
        matrix(&mut graph, Role::Input, 2, 3);
        let row = graph.last_row(Role::Input, 3);
        assert!(row.iter().all(|id| id.is_some_and(|id| graph[id].pad == 1)));
        assert_eq!(graph.last_row(Role::Output, 3), vec![None, None, None]);
    }
}
