//! Song tree for parsed ChordPro.
//!
//! The tree lives in an arena owned by [`Songbook`]. Nodes refer to each
//! other by [`NodeId`]; the parent link is a plain id, so the only owning edge
//! is the arena itself. Ids are handed out in creation order, are never
//! reused, and stay valid for the lifetime of the songbook (removed nodes are
//! detached, not freed). A fresh songbook starts again from id 0.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::error::ChordProError;

/// Stable identity of a node inside one [`Songbook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in the song tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub line: usize,
    pub col: usize,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Songbook(BookMeta),
    Song(SongMeta),
    Verse(Block),
    Chorus(Block),
    /// Stands in for a previously declared chorus. Resolved when a view walks
    /// the tree, never at parse time.
    ChorusReference {
        name: Option<String>,
    },
    Line,
    Text(String),
    Chord(String),
}

/// Payload-free discriminant of [`NodeKind`], used for kind lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Songbook,
    Song,
    Verse,
    Chorus,
    ChorusReference,
    Line,
    Text,
    Chord,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Songbook(_) => NodeType::Songbook,
            Self::Song(_) => NodeType::Song,
            Self::Verse(_) => NodeType::Verse,
            Self::Chorus(_) => NodeType::Chorus,
            Self::ChorusReference { .. } => NodeType::ChorusReference,
            Self::Line => NodeType::Line,
            Self::Text(_) => NodeType::Text,
            Self::Chord(_) => NodeType::Chord,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn chord(value: impl Into<String>) -> Self {
        Self::Chord(value.into())
    }
}

impl NodeType {
    /// Whether a node of type `child` may sit directly under `self`.
    pub fn accepts(self, child: NodeType) -> bool {
        matches!(
            (self, child),
            (Self::Songbook, Self::Song)
                | (
                    Self::Song,
                    Self::Verse | Self::Chorus | Self::ChorusReference
                )
                | (Self::Verse | Self::Chorus, Self::Line | Self::ChorusReference)
                | (Self::Line, Self::Text | Self::Chord)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMeta {
    pub title: String,
    pub subtitle: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongMeta {
    pub title: String,
    pub artist: String,
    pub filename: Option<String>,
    /// Chorus name → most recently declared chorus of that name.
    pub chorus_index: HashMap<String, NodeId>,
    /// Most recently opened chorus.
    pub last_chorus: Option<NodeId>,
}

/// Verse or chorus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    /// Opened by the parser without a directive (blank-line stanza).
    pub generated: bool,
    /// The author wrote the name; otherwise it is an ordinal or the default
    /// chorus label.
    pub declared: bool,
}

impl Block {
    pub fn declared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated: false,
            declared: true,
        }
    }

    pub fn ordinal(n: usize, generated: bool) -> Self {
        Self {
            name: n.to_string(),
            generated,
            declared: false,
        }
    }

    pub fn default_chorus(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated: false,
            declared: false,
        }
    }

    /// Display label: `1.` for numbered verses, `Name:` otherwise.
    pub fn label(&self, node_type: NodeType) -> String {
        if node_type == NodeType::Verse && !self.declared {
            format!("{}.", self.name)
        } else {
            format!("{}:", self.name)
        }
    }
}

/// Root of a parsed song collection and owner of every node.
#[derive(Debug, Clone, PartialEq)]
pub struct Songbook {
    nodes: Vec<Node>,
}

impl Default for Songbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Songbook {
    pub fn new() -> Self {
        Self::with_meta(BookMeta::default())
    }

    pub fn with_title(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self::with_meta(BookMeta {
            title: title.into(),
            subtitle: subtitle.into(),
            filename: None,
        })
    }

    pub fn with_meta(meta: BookMeta) -> Self {
        let mut book = Self { nodes: Vec::new() };
        book.create(NodeKind::Songbook(meta), 0, 0);
        book
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn meta(&self) -> Result<&BookMeta, ChordProError> {
        let NodeKind::Songbook(meta) = &self.node(self.root())?.kind else {
            return Err(ChordProError::internal("root is not a songbook"));
        };
        Ok(meta)
    }

    pub fn meta_mut(&mut self) -> Result<&mut BookMeta, ChordProError> {
        let root = self.root();
        let NodeKind::Songbook(meta) = &mut self.node_mut(root)?.kind else {
            return Err(ChordProError::internal("root is not a songbook"));
        };
        Ok(meta)
    }

    pub fn songs(&self) -> &[NodeId] {
        &self.nodes[0].children
    }

    /// Number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the book holds no songs.
    pub fn is_empty(&self) -> bool {
        self.songs().is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    pub fn song(&self, id: NodeId) -> Option<&SongMeta> {
        match self.kind(id)? {
            NodeKind::Song(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn song_mut(&mut self, id: NodeId) -> Option<&mut SongMeta> {
        match &mut self.nodes.get_mut(id.slot())?.kind {
            NodeKind::Song(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        match self.kind(id)? {
            NodeKind::Verse(block) | NodeKind::Chorus(block) => Some(block),
            _ => None,
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, ChordProError> {
        self.get(id)
            .ok_or_else(|| ChordProError::internal(format!("no node with id {id}")))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ChordProError> {
        self.nodes
            .get_mut(id.slot())
            .ok_or_else(|| ChordProError::internal(format!("no node with id {id}")))
    }

    // --- construction -----------------------------------------------------

    /// Create a detached node. It joins the tree through [`append_child`],
    /// [`insert_after`] or [`insert_before`].
    ///
    /// [`append_child`]: Self::append_child
    /// [`insert_after`]: Self::insert_after
    /// [`insert_before`]: Self::insert_before
    pub fn create(&mut self, kind: NodeKind, line: usize, col: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            line,
            col,
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`. A chorus entering a song
    /// this way is picked up by the song's chorus index.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ChordProError> {
        self.attach(parent, child)?;
        self.after_structure_change(parent, child)
    }

    /// [`append_child`](Self::append_child) without the chorus index upkeep.
    /// The parser registers its choruses itself as it opens them.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), ChordProError> {
        self.check_link(parent, child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Insert `node` as the next sibling of `anchor`. Returns the id holding
    /// the inserted content, which differs from `node` when a text leaf was
    /// merged into a neighbouring text leaf.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<NodeId, ChordProError> {
        self.insert_at_offset(anchor, node, 1)
    }

    /// Insert `node` as the previous sibling of `anchor`.
    pub fn insert_before(
        &mut self,
        anchor: NodeId,
        node: NodeId,
    ) -> Result<NodeId, ChordProError> {
        self.insert_at_offset(anchor, node, 0)
    }

    fn insert_at_offset(
        &mut self,
        anchor: NodeId,
        node: NodeId,
        offset: usize,
    ) -> Result<NodeId, ChordProError> {
        let parent = self
            .node(anchor)?
            .parent
            .ok_or_else(|| ChordProError::internal(format!("{anchor} has no parent")))?;
        self.check_link(parent, node)?;
        let index = self.child_index(parent, anchor)? + offset;
        self.node_mut(parent)?.children.insert(index, node);
        self.node_mut(node)?.parent = Some(parent);

        let survivor = self.merge_text_around(parent, index)?;
        self.after_structure_change(parent, node)?;
        Ok(survivor)
    }

    fn check_link(&self, parent: NodeId, child: NodeId) -> Result<(), ChordProError> {
        let parent_type = self.node(parent)?.node_type();
        let child_node = self.node(child)?;
        if child == self.root() {
            return Err(ChordProError::internal("the songbook root cannot be a child"));
        }
        if child_node.parent.is_some() {
            return Err(ChordProError::internal(format!(
                "{child} already has a parent"
            )));
        }
        if !parent_type.accepts(child_node.node_type()) {
            return Err(ChordProError::internal(format!(
                "{:?} cannot contain {:?}",
                parent_type,
                child_node.node_type()
            )));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(ChordProError::internal(format!(
                    "{child} cannot become its own descendant"
                )));
            }
            cursor = self.node(id)?.parent;
        }
        Ok(())
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize, ChordProError> {
        self.node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| ChordProError::internal(format!("{child} is not a child of {parent}")))
    }

    // --- navigation -------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&c| c == id)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    /// Nearest node of the given type, starting with `id` itself.
    pub fn ancestor_of(&self, id: NodeId, node_type: NodeType) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.get(current)?;
            if node.node_type() == node_type {
                return Some(current);
            }
            cursor = node.parent;
        }
        None
    }

    pub fn song_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestor_of(id, NodeType::Song)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the node is reachable from the songbook root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.is_ancestor(self.root(), id)
    }

    /// All nodes below `id` in document (pre-)order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    // --- editing ----------------------------------------------------------

    /// Detach a node and its subtree. Text leaves that become neighbours are
    /// merged, and a line or block emptied by the removal is removed too.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ChordProError> {
        // Pruning may take a chorus with it even when `id` is not one.
        let song = self.song_of(id);
        self.remove_and_prune(id)?;
        match song {
            Some(song) => self.refresh_chorus_index(song),
            None => Ok(()),
        }
    }

    fn remove_and_prune(&mut self, id: NodeId) -> Result<(), ChordProError> {
        let Some((parent, index)) = self.detach(id)? else {
            return Ok(());
        };
        if index > 0 {
            self.merge_text_around(parent, index - 1)?;
        }
        let parent_node = self.node(parent)?;
        let prunable = matches!(
            parent_node.node_type(),
            NodeType::Line | NodeType::Verse | NodeType::Chorus
        );
        if prunable && parent_node.children.is_empty() {
            self.remove_and_prune(parent)?;
        }
        Ok(())
    }

    /// Unlink a node from its parent without any merging or pruning. Returns
    /// the former parent and the index the node occupied.
    pub(crate) fn detach(
        &mut self,
        id: NodeId,
    ) -> Result<Option<(NodeId, usize)>, ChordProError> {
        if id == self.root() {
            return Err(ChordProError::internal("the songbook root cannot be removed"));
        }
        let Some(parent) = self.node(id)?.parent else {
            return Ok(None);
        };
        let index = self.child_index(parent, id)?;
        self.node_mut(parent)?.children.remove(index);
        self.node_mut(id)?.parent = None;
        Ok(Some((parent, index)))
    }

    /// Replace the content of a text or chord leaf. An emptied leaf is
    /// removed from the tree, merging the text on either side of it.
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), ChordProError> {
        let value = value.into();
        let empty = value.is_empty();
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(text) | NodeKind::Chord(text) => *text = value,
            other => {
                return Err(ChordProError::internal(format!(
                    "{:?} has no text content",
                    other.node_type()
                )))
            }
        }
        if empty && self.parent(id).is_some() {
            self.remove(id)?;
        }
        Ok(())
    }

    /// Coalesce runs of consecutive text leaves in a line.
    pub fn merge_adjacent_text(&mut self, line: NodeId) -> Result<(), ChordProError> {
        let mut index = 0;
        while index < self.children(line).len() {
            self.merge_text_around(line, index)?;
            index += 1;
        }
        Ok(())
    }

    /// Turn a text leaf into a chord leaf carrying the same content.
    pub fn text_to_chord(&mut self, id: NodeId) -> Result<(), ChordProError> {
        let node = self.node_mut(id)?;
        let NodeKind::Text(text) = &mut node.kind else {
            return Err(ChordProError::internal(format!("{id} is not a text leaf")));
        };
        let content = std::mem::take(text).trim().to_string();
        node.kind = NodeKind::Chord(content);
        Ok(())
    }

    /// Merge the text leaf at `index` with text neighbours on either side.
    /// Returns the id of the leaf that now holds the content at `index`.
    fn merge_text_around(&mut self, parent: NodeId, index: usize) -> Result<NodeId, ChordProError> {
        let children = self.node(parent)?.children.clone();
        let Some(&current) = children.get(index) else {
            return Err(ChordProError::internal(format!(
                "{parent} has no child at {index}"
            )));
        };
        if !matches!(self.node(current)?.kind, NodeKind::Text(_)) {
            return Ok(current);
        }

        let mut survivor = current;
        if let Some(&prev) = index.checked_sub(1).and_then(|i| children.get(i)) {
            if self.absorb_text(prev, current)? {
                survivor = prev;
            }
        }
        if let Some(&next) = children.get(index + 1) {
            self.absorb_text(survivor, next)?;
        }
        Ok(survivor)
    }

    /// Append the text of `right` to `left` and detach `right`, if both are
    /// text leaves.
    fn absorb_text(&mut self, left: NodeId, right: NodeId) -> Result<bool, ChordProError> {
        let NodeKind::Text(right_text) = &self.node(right)?.kind else {
            return Ok(false);
        };
        let right_text = right_text.clone();
        let NodeKind::Text(left_text) = &mut self.node_mut(left)?.kind else {
            return Ok(false);
        };
        left_text.push_str(&right_text);
        self.detach(right)?;
        Ok(true)
    }

    fn subtree_has(&self, id: NodeId, node_type: NodeType) -> bool {
        self.get(id).is_some_and(|n| n.node_type() == node_type)
            || self
                .descendants(id)
                .into_iter()
                .any(|d| self.get(d).is_some_and(|n| n.node_type() == node_type))
    }

    fn after_structure_change(&mut self, parent: NodeId, inserted: NodeId) -> Result<(), ChordProError> {
        if self.subtree_has(inserted, NodeType::Chorus) {
            self.refresh_song_of(parent)?;
        }
        Ok(())
    }

    fn refresh_song_of(&mut self, id: NodeId) -> Result<(), ChordProError> {
        match self.song_of(id) {
            Some(song) => self.refresh_chorus_index(song),
            None => Ok(()),
        }
    }

    // --- choruses ---------------------------------------------------------

    /// Record a newly opened chorus on its song.
    pub(crate) fn register_chorus(&mut self, song: NodeId, chorus: NodeId) -> Result<(), ChordProError> {
        let name = self
            .block(chorus)
            .map(|b| b.name.clone())
            .ok_or_else(|| ChordProError::internal(format!("{chorus} is not a chorus")))?;
        let meta = self
            .song_mut(song)
            .ok_or_else(|| ChordProError::internal(format!("{song} is not a song")))?;
        meta.chorus_index.insert(name, chorus);
        meta.last_chorus = Some(chorus);
        Ok(())
    }

    /// Rebuild a song's chorus index from its current contents.
    pub fn refresh_chorus_index(&mut self, song: NodeId) -> Result<(), ChordProError> {
        let choruses: Vec<(String, NodeId)> = self
            .descendants(song)
            .into_iter()
            .filter_map(|id| match self.kind(id) {
                Some(NodeKind::Chorus(block)) => Some((block.name.clone(), id)),
                _ => None,
            })
            .collect();
        let meta = self
            .song_mut(song)
            .ok_or_else(|| ChordProError::internal(format!("{song} is not a song")))?;
        meta.chorus_index.clear();
        meta.last_chorus = None;
        for (name, id) in choruses {
            meta.chorus_index.insert(name, id);
            meta.last_chorus = Some(id);
        }
        Ok(())
    }

    /// Chorus currently registered under `name` in a song.
    pub fn chorus_named(&self, song: NodeId, name: &str) -> Option<NodeId> {
        self.song(song)?.chorus_index.get(name).copied()
    }

    /// Resolve a chorus reference to the chorus it stands for: the latest
    /// chorus of that name declared before it in the same song, or the latest
    /// chorus of any name when the reference is unnamed.
    pub fn resolve_reference(&self, reference: NodeId) -> Result<NodeId, ChordProError> {
        let node = self.node(reference)?;
        let NodeKind::ChorusReference { name } = &node.kind else {
            return Err(ChordProError::internal(format!(
                "{reference} is not a chorus reference"
            )));
        };
        let song = self.song_of(reference).ok_or_else(|| {
            ChordProError::internal(format!("{reference} does not belong to a song"))
        })?;

        let mut found = None;
        for id in self.descendants(song) {
            if id == reference {
                break;
            }
            let Some(NodeKind::Chorus(block)) = self.kind(id) else {
                continue;
            };
            if self.is_ancestor(id, reference) {
                continue;
            }
            if name.as_deref().map_or(true, |n| n == block.name) {
                found = Some(id);
            }
        }

        found.ok_or_else(|| {
            let message = match name {
                Some(n) => format!("chorus '{n}' is not declared before its reference"),
                None => "chorus reference before any chorus was declared".to_string(),
            };
            ChordProError::semantics(message, node.line, node.col)
        })
    }

    /// Every chorus reference in the book that fails to resolve.
    pub fn unresolved_references(&self) -> Vec<ChordProError> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| matches!(self.kind(id), Some(NodeKind::ChorusReference { .. })))
            .filter_map(|id| self.resolve_reference(id).err())
            .collect()
    }
}
