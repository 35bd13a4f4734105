//! Turns checkbox state into an ordered list of download jobs.

use crate::download::DownloadJob;
use crate::node::LeafKind;
use crate::tree::{CatalogTree, CheckState, NodeId};

/// Collects checked, visible leaves in depth-first pre-order.
///
/// Present leaves and unchecked subtrees are skipped. Folders contribute
/// their children, never themselves. Filenames are not resolved here.
#[must_use]
pub fn extract(tree: &CatalogTree) -> Vec<DownloadJob> {
    let mut jobs = Vec::new();
    for &root in tree.roots() {
        visit(tree, root, &mut jobs);
    }
    jobs
}

fn visit(tree: &CatalogTree, id: NodeId, jobs: &mut Vec<DownloadJob>) {
    if tree.is_present(id) {
        return;
    }
    match tree.leaf(id) {
        Some((kind, leaf)) => {
            if tree.is_selected(id) {
                jobs.push(DownloadJob {
                    node: id,
                    destination: tree.dir(id).to_path_buf(),
                    kind,
                    leaf: leaf.clone(),
                });
            }
        }
        None => {
            if tree.check_state(id) == CheckState::Unchecked {
                return;
            }
            for &child in tree.children(id) {
                visit(tree, child, jobs);
            }
        }
    }
}

/// Checks every leaf.
pub fn select_all(tree: &mut CatalogTree) {
    for root in tree.roots().to_vec() {
        tree.set_selected(root, true);
    }
}

/// Unchecks every leaf.
pub fn deselect_all(tree: &mut CatalogTree) {
    for root in tree.roots().to_vec() {
        tree.set_selected(root, false);
    }
}

/// Checks every leaf of the given kind, leaving other leaves as they are.
///
/// Anything named `*.mp4` counts as a recorded lecture regardless of its
/// declared type, since courses often upload lecture videos as plain files.
pub fn select_kind(tree: &mut CatalogTree, wanted: LeafKind) {
    let matching: Vec<NodeId> = tree
        .preorder()
        .into_iter()
        .filter(|&id| {
            tree.leaf(id).is_some_and(|(kind, leaf)| {
                let is_video = leaf.name.ends_with(".mp4");
                match wanted {
                    LeafKind::File => kind == LeafKind::File && !is_video,
                    LeafKind::RecordedLecture => kind == LeafKind::RecordedLecture || is_video,
                }
            })
        })
        .collect();
    for id in matching {
        tree.set_selected(id, true);
    }
}

/// Checks the node at a slash-separated display-name path.
///
/// Returns `false` if no such node exists.
pub fn select_path(tree: &mut CatalogTree, path: &str) -> bool {
    match tree.find(path) {
        Some(id) => {
            tree.set_selected(id, true);
            true
        }
        None => false,
    }
}
