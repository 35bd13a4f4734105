//! Arena-indexed catalog tree carrying remote data plus derived flags.
//!
//! Each slot keeps the node's remote-derived data alongside two derived
//! flags: `present` (computed from the filesystem) and `selected` (the
//! user's checkbox). Flags are recomputed in place, so refreshing visibility
//! after a download never rebuilds the tree.

use std::path::{Path, PathBuf};

use crate::node::{ContentNode, Folder, Leaf, LeafKind, NodeKind, ResolvedLink};
use crate::presence::{is_satisfied, sanitize_filename};

/// Index of a node inside a [`CatalogTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Aggregate checkbox state of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
    PartiallyChecked,
}

#[derive(Debug, Clone)]
enum Entry {
    Folder { name: String },
    Leaf { kind: LeafKind, leaf: Leaf },
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Directory this node lives in (ancestors' sanitized names joined onto the base).
    dir: PathBuf,
    selected: bool,
    present: bool,
}

/// The displayed catalog: one subtree per course, rooted at a download directory.
#[derive(Debug, Clone)]
pub struct CatalogTree {
    base: PathBuf,
    slots: Vec<Slot>,
    roots: Vec<NodeId>,
}

impl CatalogTree {
    /// Builds a tree from course folders and computes leaf presence under `base`.
    #[must_use]
    pub fn from_courses(base: impl Into<PathBuf>, courses: Vec<Folder>) -> Self {
        let mut tree = Self {
            base: base.into(),
            slots: Vec::new(),
            roots: Vec::new(),
        };
        for course in courses {
            let dir = tree.base.clone();
            let id = tree.insert_folder(course, None, dir);
            tree.roots.push(id);
        }
        tree.refresh_presence();
        tree
    }

    fn push(&mut self, entry: Entry, parent: Option<NodeId>, dir: PathBuf) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            entry,
            parent,
            children: Vec::new(),
            dir,
            selected: false,
            present: false,
        });
        if let Some(parent) = parent {
            self.slots[parent.0].children.push(id);
        }
        id
    }

    fn insert_folder(&mut self, folder: Folder, parent: Option<NodeId>, dir: PathBuf) -> NodeId {
        let child_dir = dir.join(sanitize_filename(&folder.name));
        let id = self.push(Entry::Folder { name: folder.name }, parent, dir);
        for child in folder.children {
            match child {
                ContentNode::Folder(sub) => {
                    self.insert_folder(sub, Some(id), child_dir.clone());
                }
                ContentNode::File(leaf) => {
                    let entry = Entry::Leaf {
                        kind: LeafKind::File,
                        leaf,
                    };
                    self.push(entry, Some(id), child_dir.clone());
                }
                ContentNode::RecordedLecture(leaf) => {
                    let entry = Entry::Leaf {
                        kind: LeafKind::RecordedLecture,
                        leaf,
                    };
                    self.push(entry, Some(id), child_dir.clone());
                }
            }
        }
        id
    }

    /// Rebuilds the pure data model (for persistence or the next merge).
    #[must_use]
    pub fn to_courses(&self) -> Vec<Folder> {
        self.roots.iter().map(|&id| self.folder_at(id)).collect()
    }

    fn folder_at(&self, id: NodeId) -> Folder {
        let children = self.slots[id.0]
            .children
            .iter()
            .map(|&child| match &self.slots[child.0].entry {
                Entry::Folder { .. } => ContentNode::Folder(self.folder_at(child)),
                Entry::Leaf { kind, leaf } => ContentNode::leaf(*kind, leaf.clone()),
            })
            .collect();
        Folder::new(self.name(id), children)
    }

    /// Recomputes `present` for every leaf from the filesystem.
    pub fn refresh_presence(&mut self) {
        for slot in &mut self.slots {
            slot.present = match &slot.entry {
                Entry::Folder { .. } => false,
                Entry::Leaf { kind, leaf } => {
                    let filename = leaf.expected_filename(*kind);
                    is_satisfied(&slot.dir, &leaf.name, filename.as_deref())
                }
            };
        }
    }

    /// Download directory the tree is rooted at.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Course-level folders in order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of a node in remote order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    /// Display name of a node.
    #[must_use]
    pub fn name(&self, id: NodeId) -> &str {
        match &self.slots[id.0].entry {
            Entry::Folder { name } => name,
            Entry::Leaf { leaf, .. } => &leaf.name,
        }
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        match &self.slots[id.0].entry {
            Entry::Folder { .. } => NodeKind::Folder,
            Entry::Leaf { kind, .. } => (*kind).into(),
        }
    }

    /// Leaf payload and kind, or `None` for folders.
    #[must_use]
    pub fn leaf(&self, id: NodeId) -> Option<(LeafKind, &Leaf)> {
        match &self.slots[id.0].entry {
            Entry::Folder { .. } => None,
            Entry::Leaf { kind, leaf } => Some((*kind, leaf)),
        }
    }

    /// Directory a node lives in.
    #[must_use]
    pub fn dir(&self, id: NodeId) -> &Path {
        &self.slots[id.0].dir
    }

    /// Whether a leaf is already downloaded or ignored. Always false for folders.
    #[must_use]
    pub fn is_present(&self, id: NodeId) -> bool {
        self.slots[id.0].present
    }

    /// Whether a leaf is selectable in this pass.
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        !self.slots[id.0].present
    }

    /// Checkbox state of a leaf. Folders report their aggregate via [`Self::check_state`].
    #[must_use]
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.slots[id.0].selected
    }

    /// Checks or unchecks a node; folders apply it to every descendant leaf.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.0];
            match slot.entry {
                Entry::Folder { .. } => stack.extend(slot.children.iter().copied()),
                Entry::Leaf { .. } => slot.selected = selected,
            }
        }
    }

    /// Tri-state checkbox for display, aggregated over visible leaves.
    ///
    /// A folder without visible leaves reports `Unchecked`.
    #[must_use]
    pub fn check_state(&self, id: NodeId) -> CheckState {
        if self.leaf(id).is_some() {
            return if self.is_selected(id) {
                CheckState::Checked
            } else {
                CheckState::Unchecked
            };
        }
        let (mut checked, mut unchecked) = (0usize, 0usize);
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        while let Some(current) = stack.pop() {
            if self.leaf(current).is_some() {
                if self.is_present(current) {
                    continue;
                }
                if self.is_selected(current) {
                    checked += 1;
                } else {
                    unchecked += 1;
                }
            } else {
                stack.extend(self.children(current).iter().copied());
            }
        }
        match (checked, unchecked) {
            (0, _) => CheckState::Unchecked,
            (_, 0) => CheckState::Checked,
            _ => CheckState::PartiallyChecked,
        }
    }

    /// All node ids in depth-first pre-order.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.slots.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Number of leaves that are not yet present on disk.
    #[must_use]
    pub fn visible_leaf_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.entry, Entry::Leaf { .. }) && !s.present)
            .count()
    }

    /// Total number of leaves in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.entry, Entry::Leaf { .. }))
            .count()
    }

    /// Finds a node by its slash-separated display-name path, starting at a course.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = *self.roots.iter().find(|&&id| self.name(id) == first)?;
        for segment in segments {
            current = *self
                .children(current)
                .iter()
                .find(|&&id| self.name(id) == segment)?;
        }
        Some(current)
    }

    /// Records a resolved link on a leaf. Folders are left untouched.
    pub fn set_resolved(&mut self, id: NodeId, resolved: ResolvedLink) {
        if let Entry::Leaf { leaf, .. } = &mut self.slots[id.0].entry {
            leaf.resolved = Some(resolved);
        }
    }
}
