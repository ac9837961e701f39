use std::{collections::HashMap, ops::Range};

use serde::Serialize;
use serde_json::Value;
use shared::domain::{ScopeId, APPEND, PREPEND};
use slotmap::{new_key_type, SlotMap};

use crate::{error::ProcessError, materializer::RenderedWidget};

new_key_type! {
    /// Handle into the node arena. Stable across insertions and removals.
    pub struct NodeKey;
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Scope(ScopeId),
    Widget(RenderedWidget),
}

#[derive(Debug)]
pub struct Node {
    content: NodeContent,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl Node {
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn scope_id(&self) -> Option<&ScopeId> {
        match &self.content {
            NodeContent::Scope(id) => Some(id),
            NodeContent::Widget(_) => None,
        }
    }
}

/// Serializable view of a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum SnapshotNode {
    Scope {
        id: String,
        children: Vec<SnapshotNode>,
    },
    Widget {
        kind: String,
        content: Value,
    },
}

/// Map a wire `position` onto an insertion index among `len` existing children.
///
/// `0` and `-1` always resolve (prepend, append). Any other non-negative value
/// inserts before the child at that index; any other negative value inserts
/// after the child at that index counted from the end. `None` when the
/// referenced child does not exist.
pub fn resolve_slot(len: usize, position: i64) -> Option<usize> {
    match position {
        PREPEND => Some(0),
        APPEND => Some(len),
        p if p > 0 => usize::try_from(p).ok().filter(|index| *index < len),
        p => {
            let back = usize::try_from(p.unsigned_abs()).ok()?;
            len.checked_sub(back).map(|index| index + 1)
        }
    }
}

pub struct ScopeStore {
    arena: SlotMap<NodeKey, Node>,
    ids: HashMap<ScopeId, NodeKey>,
    root: NodeKey,
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStore {
    /// A tree holding only the empty root scope.
    pub fn new() -> Self {
        let mut arena = SlotMap::with_key();
        let root_id = ScopeId::root();
        let root = arena.insert(Node {
            content: NodeContent::Scope(root_id.clone()),
            parent: None,
            children: Vec::new(),
        });
        let mut ids = HashMap::new();
        ids.insert(root_id, root);
        Self { arena, ids, root }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// True while the root scope holds nothing.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn find(&self, id: &ScopeId) -> Option<NodeKey> {
        self.ids.get(id).copied()
    }

    pub fn contains(&self, id: &ScopeId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.arena.get(key)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.arena
            .get(key)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or lives somewhere beneath it.
    pub fn is_within(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.arena.get(key).and_then(|n| n.parent);
        }
        false
    }

    /// Insert `content` under the scope `parent` following the position policy
    /// of [`resolve_slot`].
    pub fn insert_at(
        &mut self,
        parent: &ScopeId,
        content: NodeContent,
        position: i64,
    ) -> Result<NodeKey, ProcessError> {
        let parent_key = self.locate(parent)?;
        if let NodeContent::Scope(id) = &content {
            if self.ids.contains_key(id) {
                return Err(ProcessError::DuplicateScope(id.clone()));
            }
        }

        let len = self.children(parent_key).len();
        let slot = resolve_slot(len, position).ok_or_else(|| ProcessError::PositionOutOfRange {
            parent: parent.clone(),
            position,
            len,
        })?;

        let scope_id = match &content {
            NodeContent::Scope(id) => Some(id.clone()),
            NodeContent::Widget(_) => None,
        };
        let key = self.arena.insert(Node {
            content,
            parent: Some(parent_key),
            children: Vec::new(),
        });
        if let Some(id) = scope_id {
            self.ids.insert(id, key);
        }
        if let Some(parent_node) = self.arena.get_mut(parent_key) {
            parent_node.children.insert(slot, key);
        }
        Ok(key)
    }

    /// Create an empty scope `id` under `parent`.
    pub fn create_scope(
        &mut self,
        parent: &ScopeId,
        id: ScopeId,
        position: i64,
    ) -> Result<NodeKey, ProcessError> {
        self.insert_at(parent, NodeContent::Scope(id), position)
    }

    /// Delete scope `id` with everything beneath it. Returns the number of
    /// nodes released.
    pub fn remove_subtree(&mut self, id: &ScopeId) -> Result<usize, ProcessError> {
        let key = self.locate(id)?;
        let Some(parent) = self.arena.get(key).and_then(|node| node.parent) else {
            return Err(ProcessError::RootScope(id.clone()));
        };
        if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children.retain(|child| *child != key);
        }
        Ok(self.release(key))
    }

    /// Drop every child of scope `id`, keeping the scope itself.
    pub fn clear_contents(&mut self, id: &ScopeId) -> Result<usize, ProcessError> {
        let key = self.locate(id)?;
        let len = self.children(key).len();
        Ok(self.drop_children(key, 0..len))
    }

    /// Drop every sibling that precedes scope `id`.
    pub fn remove_siblings_before(&mut self, id: &ScopeId) -> Result<usize, ProcessError> {
        let key = self.locate(id)?;
        let Some((parent, index)) = self.sibling_index(key) else {
            return Ok(0);
        };
        Ok(self.drop_children(parent, 0..index))
    }

    /// Drop scope `id` together with every sibling that follows it.
    pub fn remove_siblings_after(&mut self, id: &ScopeId) -> Result<usize, ProcessError> {
        let key = self.locate(id)?;
        let Some((parent, index)) = self.sibling_index(key) else {
            return Err(ProcessError::RootScope(id.clone()));
        };
        let len = self.children(parent).len();
        Ok(self.drop_children(parent, index..len))
    }

    /// Drop the siblings strictly between `start` and `end`.
    ///
    /// `end` must appear after `start` under the same parent. The whole scan
    /// completes before anything is touched, so an unreachable `end` leaves the
    /// tree unchanged.
    pub fn remove_range(&mut self, start: &ScopeId, end: &ScopeId) -> Result<usize, ProcessError> {
        let start_key = self.locate(start)?;
        let end_key = self.locate(end)?;
        let not_valid = || ProcessError::RangeNotValid {
            start: start.clone(),
            end: end.clone(),
        };

        let (parent, start_index) = self.sibling_index(start_key).ok_or_else(not_valid)?;
        let end_index = self.children(parent)[start_index + 1..]
            .iter()
            .position(|key| *key == end_key)
            .map(|offset| start_index + 1 + offset)
            .ok_or_else(not_valid)?;

        Ok(self.drop_children(parent, start_index + 1..end_index))
    }

    pub fn snapshot(&self) -> SnapshotNode {
        self.snapshot_node(self.root)
    }

    /// Snapshot of the subtree rooted at scope `id`.
    pub fn snapshot_of(&self, id: &ScopeId) -> Option<SnapshotNode> {
        self.find(id).map(|key| self.snapshot_node(key))
    }

    fn snapshot_node(&self, key: NodeKey) -> SnapshotNode {
        let Some(node) = self.arena.get(key) else {
            return SnapshotNode::Scope {
                id: String::new(),
                children: Vec::new(),
            };
        };
        match &node.content {
            NodeContent::Scope(id) => SnapshotNode::Scope {
                id: id.to_string(),
                children: node
                    .children
                    .iter()
                    .map(|child| self.snapshot_node(*child))
                    .collect(),
            },
            NodeContent::Widget(widget) => SnapshotNode::Widget {
                kind: widget.kind.clone(),
                content: widget.content.clone(),
            },
        }
    }

    fn locate(&self, id: &ScopeId) -> Result<NodeKey, ProcessError> {
        self.find(id)
            .ok_or_else(|| ProcessError::ScopeNotFound(id.clone()))
    }

    fn sibling_index(&self, key: NodeKey) -> Option<(NodeKey, usize)> {
        let parent = self.arena.get(key)?.parent?;
        let index = self.children(parent).iter().position(|child| *child == key)?;
        Some((parent, index))
    }

    fn drop_children(&mut self, parent: NodeKey, range: Range<usize>) -> usize {
        if range.is_empty() {
            return 0;
        }
        let detached: Vec<NodeKey> = match self.arena.get_mut(parent) {
            Some(node) => node.children.drain(range).collect(),
            None => return 0,
        };
        detached.into_iter().map(|key| self.release(key)).sum()
    }

    /// Free `key` and its descendants from the arena and the id index. The
    /// caller has already unlinked `key` from its parent.
    fn release(&mut self, key: NodeKey) -> usize {
        let mut released = 0;
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            let Some(node) = self.arena.remove(current) else {
                continue;
            };
            if let NodeContent::Scope(id) = &node.content {
                self.ids.remove(id);
            }
            pending.extend(node.children);
            released += 1;
        }
        released
    }
}

#[cfg(test)]
#[path = "tests/scope_store_tests.rs"]
mod tests;
