//! Reconciles a freshly fetched hierarchy with the previously cached one.
//!
//! The fetched hierarchy decides which items exist. The cached one only
//! contributes resolved links, matched by `(name, type)` within the same
//! parent. Remote listings never carry resolved links, so without this step
//! every sync would pay one resolution round trip per item.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::node::{ContentNode, Folder, Leaf, NodeKind};
use crate::tree::CatalogTree;

/// Merges `fresh` over `previous` and computes visibility under `base`.
///
/// Courses are matched by name (first match wins). Previous courses absent
/// from `fresh` are dropped.
#[must_use]
pub fn merge(previous: &[Folder], fresh: Vec<Folder>, base: impl Into<PathBuf>) -> CatalogTree {
    let courses = merge_courses(previous, fresh);
    let tree = CatalogTree::from_courses(base, courses);
    log::info!(
        "Merged {} course(s): {} item(s), {} already present",
        tree.roots().len(),
        tree.leaf_count(),
        tree.leaf_count() - tree.visible_leaf_count()
    );
    tree
}

/// Merges course lists without touching the filesystem.
#[must_use]
pub fn merge_courses(previous: &[Folder], fresh: Vec<Folder>) -> Vec<Folder> {
    let mut by_name: HashMap<&str, &Folder> = HashMap::with_capacity(previous.len());
    for course in previous {
        by_name.entry(course.name.as_str()).or_insert(course);
    }

    fresh
        .into_iter()
        .map(|course| match by_name.get(course.name.as_str()) {
            Some(&old) => merge_folder(old, course),
            None => course,
        })
        .collect()
}

fn merge_folder(previous: &Folder, mut fresh: Folder) -> Folder {
    let mut by_identity: HashMap<(&str, NodeKind), &ContentNode> =
        HashMap::with_capacity(previous.children.len());
    for child in &previous.children {
        by_identity.entry((child.name(), child.kind())).or_insert(child);
    }

    fresh.children = fresh
        .children
        .into_iter()
        .map(|child| {
            let Some(&old) = by_identity.get(&(child.name(), child.kind())) else {
                return child;
            };
            match (old, child) {
                (ContentNode::Folder(old), ContentNode::Folder(new)) => {
                    ContentNode::Folder(merge_folder(old, new))
                }
                (ContentNode::File(old), ContentNode::File(new)) => {
                    ContentNode::File(carry_resolved(old, new))
                }
                (ContentNode::RecordedLecture(old), ContentNode::RecordedLecture(new)) => {
                    ContentNode::RecordedLecture(carry_resolved(old, new))
                }
                // Identity includes the kind, so kinds always agree here.
                (_, child) => child,
            }
        })
        .collect();
    fresh
}

fn carry_resolved(previous: &Leaf, mut fresh: Leaf) -> Leaf {
    if fresh.resolved.is_none() {
        fresh.resolved.clone_from(&previous.resolved);
    }
    fresh
}
