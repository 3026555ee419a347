//! Ordered forest of table-of-contents entries.
//!
//! Nodes live in an arena owned by [`TocTree`].  Ownership flows strictly from
//! the top-level sequence down through each node's `children` list; the
//! `parent` link is a plain [`NodeId`] used for upward walks and cycle checks
//! and is only ever written by the mutation methods on the tree.
//!
//! Identifiers carry a generation counter, so an id that outlives its node
//! (after [`TocTree::remove`] or [`TocTree::clear`]) is detected as stale
//! instead of silently addressing whichever node reused the slot.

use std::fmt;

use log::{debug, warn};

/// Handle to a node stored in a [`TocTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One entry in the table of contents.
///
/// An entry with an empty `url` is an organizational heading: it appears in the
/// outline but produces no page of its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocNode {
    url: String,
    display_text: String,
    is_expanded: bool,
    is_editing: bool,
}

impl TocNode {
    /// Creates an entry that links to `url`.
    pub fn new(display_text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_text: display_text.into(),
            is_expanded: true,
            is_editing: false,
        }
    }

    /// Creates an entry without content, used to group other entries.
    pub fn heading(display_text: impl Into<String>) -> Self {
        Self::new(display_text, String::new())
    }

    /// Returns the URL the entry points to. Empty for headings.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the label shown for the entry.
    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// Returns whether the entry is shown expanded.
    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    /// Returns whether the entry is currently being edited.
    pub fn is_editing(&self) -> bool {
        self.is_editing
    }

    /// Returns whether the entry renders a page of its own.
    pub fn has_content(&self) -> bool {
        !self.url.is_empty()
    }

    /// Sets the expanded flag and returns the updated entry.
    pub fn with_expanded(mut self, is_expanded: bool) -> Self {
        self.is_expanded = is_expanded;
        self
    }
}

/// Errors reported by tree mutations. A failed mutation leaves the tree untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// The referenced node is not (or no longer) part of the tree.
    InvalidReference(NodeId),
    /// Moving `node` under `target` would make the node its own ancestor.
    Cycle {
        /// Node being moved.
        node: NodeId,
        /// Requested new parent, equal to or below `node`.
        target: NodeId,
    },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidReference(id) => write!(f, "Node {id} is not part of the tree"),
            Self::Cycle { node, target } => write!(
                f,
                "Cannot move node {node} under {target}: the target lies inside the moved subtree"
            ),
        }
    }
}

impl std::error::Error for TreeError {}

/// Change notifications emitted after a mutation has been fully applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEvent {
    /// A node was inserted.
    Added {
        node: NodeId,
        parent: Option<NodeId>,
    },
    /// A node and its subtree were removed from `parent` at `index`.
    Removed {
        node: NodeId,
        parent: Option<NodeId>,
        index: usize,
    },
    /// A node changed containers.
    Moved {
        node: NodeId,
        from: Option<NodeId>,
        to: Option<NodeId>,
    },
    /// A node's fields changed.
    Edited { node: NodeId },
    /// Every node was removed.
    Cleared,
}

type Listener = Box<dyn FnMut(&TreeEvent) + Send>;

#[derive(Clone, Debug)]
struct Entry {
    node: TocNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Ordered forest of [`TocNode`] values.
#[derive(Default)]
pub struct TocTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    len: usize,
    dirty: bool,
    listener: Option<Listener>,
}

impl Clone for TocTree {
    /// Clones the structure. The change listener stays with the original.
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
            roots: self.roots.clone(),
            len: self.len,
            dirty: self.dirty,
            listener: None,
        }
    }
}

impl fmt::Debug for TocTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TocTree")
            .field("roots", &self.roots)
            .field("len", &self.len)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl TocTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback invoked after every applied mutation.
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&TreeEvent) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Removes the change callback, if any.
    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether the tree changed since it was last marked clean.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Resets the dirty flag, typically after saving or generating.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Returns the top-level nodes in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Returns `true` when `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Returns the node behind `id`.
    pub fn get(&self, id: NodeId) -> Option<&TocNode> {
        self.entry(id).map(|entry| &entry.node)
    }

    /// Returns the parent of `id`, or `None` for roots and stale ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).and_then(|entry| entry.parent)
    }

    /// Returns the ordered children of `id`. Stale ids have no children.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    /// Position of `id` within its container.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let entry = self.entry(id)?;
        self.container(entry.parent)
            .iter()
            .position(|sibling| *sibling == id)
    }

    /// Number of ancestors above `id`; roots have depth zero.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.entry(id)?.parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        Some(depth)
    }

    /// Resolves a path of sibling indices, starting at the top level.
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut current = *self.roots.get(*first)?;
        for index in rest {
            current = *self.children(current).get(*index)?;
        }
        Some(current)
    }

    /// Returns the sibling-index path leading to `id`.
    pub fn path_of(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(self.index_in_parent(node)?);
            current = self.parent(node);
        }
        path.reverse();
        Some(path)
    }

    /// Appends `node` to the top-level sequence.
    pub fn add_root(&mut self, node: TocNode) -> NodeId {
        let id = self.allocate(node, None);
        self.roots.push(id);
        debug!("added root node {id}");
        self.touch(TreeEvent::Added {
            node: id,
            parent: None,
        });
        id
    }

    /// Appends `node` to the children of `parent` and expands the parent.
    pub fn add_child(&mut self, parent: NodeId, node: TocNode) -> Result<NodeId, TreeError> {
        if !self.contains(parent) {
            warn!("rejected child insertion under stale node {parent}");
            return Err(TreeError::InvalidReference(parent));
        }

        let id = self.allocate(node, Some(parent));
        if let Some(entry) = self.entry_mut(parent) {
            entry.children.push(id);
            entry.node.is_expanded = true;
        }
        debug!("added node {id} under {parent}");
        self.touch(TreeEvent::Added {
            node: id,
            parent: Some(parent),
        });
        Ok(id)
    }

    /// Removes `id` together with its whole subtree.
    ///
    /// Returns the removed node, or `None` when `id` was already gone.
    pub fn remove(&mut self, id: NodeId) -> Option<TocNode> {
        let parent = self.entry(id)?.parent;
        let index = self.detach(id)?;

        let mut pending = vec![id];
        let mut removed = None;
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.release(current) {
                pending.extend(entry.children);
                if current == id {
                    removed = Some(entry.node);
                }
            }
        }

        debug!("removed node {id} from index {index}");
        self.touch(TreeEvent::Removed {
            node: id,
            parent,
            index,
        });
        removed
    }

    /// Removes every node. Outstanding ids become stale.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.roots.clear();
        self.len = 0;
        self.touch(TreeEvent::Cleared);
    }

    /// Returns `true` when `target` is `source` or lies below it.
    pub fn is_descendant(&self, source: NodeId, target: NodeId) -> bool {
        let mut current = Some(target);
        while let Some(node) = current {
            if node == source {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Reports whether [`TocTree::reparent`] would accept moving `source` under `target`.
    ///
    /// `None` stands for the top level, which is always a legal destination.
    pub fn can_reparent(&self, source: NodeId, target: Option<NodeId>) -> bool {
        if !self.contains(source) {
            return false;
        }
        match target {
            None => true,
            Some(target) => self.contains(target) && !self.is_descendant(source, target),
        }
    }

    /// Moves `id` to a new container.
    ///
    /// With `new_parent == None` the node is inserted into the top-level
    /// sequence at `insert_index`, clamped to the sequence length. Otherwise
    /// it is appended to the new parent's children and the parent is expanded.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        insert_index: usize,
    ) -> Result<(), TreeError> {
        if !self.contains(id) {
            return Err(TreeError::InvalidReference(id));
        }
        if let Some(target) = new_parent {
            if !self.contains(target) {
                return Err(TreeError::InvalidReference(target));
            }
            if self.is_descendant(id, target) {
                warn!("rejected move of {id} under its own descendant {target}");
                return Err(TreeError::Cycle { node: id, target });
            }
        }

        let from = self.parent(id);
        if self.detach(id).is_none() {
            return Err(TreeError::InvalidReference(id));
        }

        match new_parent {
            None => {
                let index = insert_index.min(self.roots.len());
                self.roots.insert(index, id);
                if let Some(entry) = self.entry_mut(id) {
                    entry.parent = None;
                }
            }
            Some(target) => {
                if let Some(entry) = self.entry_mut(target) {
                    entry.children.push(id);
                    entry.node.is_expanded = true;
                }
                if let Some(entry) = self.entry_mut(id) {
                    entry.parent = Some(target);
                }
            }
        }

        debug!("moved node {id} from {from:?} to {new_parent:?}");
        self.touch(TreeEvent::Moved {
            node: id,
            from,
            to: new_parent,
        });
        Ok(())
    }

    /// Iterates over every node in pre-order.
    ///
    /// A node is yielded before its children, children follow sibling order,
    /// and each subtree is finished before the next sibling starts. Every call
    /// starts a fresh traversal.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Puts `id` into edit mode.
    pub fn start_edit(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.edit(id, false, |node| node.is_editing = true)
    }

    /// Leaves edit mode and records the change.
    pub fn end_edit(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.edit(id, true, |node| node.is_editing = false)
    }

    /// Replaces the label of `id`.
    pub fn set_display_text(
        &mut self,
        id: NodeId,
        display_text: impl Into<String>,
    ) -> Result<(), TreeError> {
        let display_text = display_text.into();
        self.edit(id, true, move |node| node.display_text = display_text)
    }

    /// Replaces the URL of `id`. An empty URL turns the entry into a heading.
    pub fn set_url(&mut self, id: NodeId, url: impl Into<String>) -> Result<(), TreeError> {
        let url = url.into();
        self.edit(id, true, move |node| node.url = url)
    }

    /// Expands or collapses `id`.
    pub fn set_expanded(&mut self, id: NodeId, is_expanded: bool) -> Result<(), TreeError> {
        self.edit(id, false, |node| node.is_expanded = is_expanded)
    }

    fn edit<F>(&mut self, id: NodeId, marks_dirty: bool, apply: F) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TocNode),
    {
        let entry = self.entry_mut(id).ok_or(TreeError::InvalidReference(id))?;
        apply(&mut entry.node);
        if marks_dirty {
            self.dirty = true;
        }
        self.notify(TreeEvent::Edited { node: id });
        Ok(())
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        let slot = self.slots.get(id.slot())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn container(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            None => &self.roots,
            Some(parent) => self.children(parent),
        }
    }

    fn allocate(&mut self, node: TocNode, parent: Option<NodeId>) -> NodeId {
        let entry = Entry {
            node,
            parent,
            children: Vec::new(),
        };
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Entry> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(entry)
    }

    /// Unlinks `id` from its container and returns the index it occupied.
    fn detach(&mut self, id: NodeId) -> Option<usize> {
        let parent = self.entry(id)?.parent;
        let siblings = match parent {
            None => &mut self.roots,
            Some(parent) => &mut self.entry_mut(parent)?.children,
        };
        let index = siblings.iter().position(|sibling| *sibling == id)?;
        siblings.remove(index);
        Some(index)
    }

    fn touch(&mut self, event: TreeEvent) {
        self.dirty = true;
        self.notify(event);
    }

    fn notify(&mut self, event: TreeEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }
}

/// Pre-order iterator returned by [`TocTree::flatten`].
#[derive(Clone, Debug)]
pub struct Flatten<'a> {
    tree: &'a TocTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = (NodeId, &'a TocNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(entry) = self.tree.entry(id) else {
                continue;
            };
            self.stack.extend(entry.children.iter().rev().copied());
            return Some((id, &entry.node));
        }
        None
    }
}
