//! Content node model: the remote course hierarchy plus cached download state.
//!
//! The persisted document and the fetched hierarchy share one JSON shape:
//! folders are `{name, type: "folder", children, mapping?}` and leaves are
//! `{name, type: "file" | "recorded_lecture", predownload_link,
//! download_link?, filename?}`. Decoding goes through [`RawNode`] so that an
//! unknown `type` fails loudly instead of being dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Type tag of a [`ContentNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Folder,
    File,
    RecordedLecture,
}

impl NodeKind {
    /// The `type` string used in documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
            Self::RecordedLecture => "recorded_lecture",
        }
    }
}

/// Type of a downloadable leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    File,
    RecordedLecture,
}

impl From<LeafKind> for NodeKind {
    fn from(kind: LeafKind) -> Self {
        match kind {
            LeafKind::File => Self::File,
            LeafKind::RecordedLecture => Self::RecordedLecture,
        }
    }
}

/// A transfer URL together with the on-disk filename it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub filename: String,
}

/// A downloadable item: a file or a recorded lecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Display name, not filesystem-sanitized.
    pub name: String,
    /// Opaque token from the remote listing.
    pub predownload_link: String,
    /// Set once the orchestrator has resolved this leaf; carried across syncs.
    pub resolved: Option<ResolvedLink>,
}

impl Leaf {
    /// Creates an unresolved leaf.
    #[must_use]
    pub fn new(name: impl Into<String>, predownload_link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predownload_link: predownload_link.into(),
            resolved: None,
        }
    }

    /// Attaches a resolved link.
    #[must_use]
    pub fn with_resolved(mut self, url: impl Into<String>, filename: impl Into<String>) -> Self {
        self.resolved = Some(ResolvedLink {
            url: url.into(),
            filename: filename.into(),
        });
        self
    }

    /// Filename the leaf will occupy on disk, if it can be known yet.
    ///
    /// Recorded lectures are always saved as `name.mp4`, so their filename is
    /// known before resolution. Files only know theirs once resolved.
    #[must_use]
    pub fn expected_filename(&self, kind: LeafKind) -> Option<String> {
        match (&self.resolved, kind) {
            (Some(resolved), _) => Some(resolved.filename.clone()),
            (None, LeafKind::RecordedLecture) => Some(lecture_filename(&self.name)),
            (None, LeafKind::File) => None,
        }
    }
}

/// Filename used for a recorded lecture's video.
#[must_use]
pub fn lecture_filename(name: &str) -> String {
    format!("{name}.mp4")
}

/// A folder and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub children: Vec<ContentNode>,
}

impl Folder {
    /// Creates a folder with the given children.
    #[must_use]
    pub fn new(name: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// Counts the leaves in this folder's subtree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                ContentNode::Folder(folder) => folder.leaf_count(),
                ContentNode::File(_) | ContentNode::RecordedLecture(_) => 1,
            })
            .sum()
    }
}

/// A node of the course-content hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum ContentNode {
    Folder(Folder),
    File(Leaf),
    RecordedLecture(Leaf),
}

impl ContentNode {
    /// Display name of the node.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::File(leaf) | Self::RecordedLecture(leaf) => &leaf.name,
        }
    }

    /// Type tag of the node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Folder(_) => NodeKind::Folder,
            Self::File(_) => NodeKind::File,
            Self::RecordedLecture(_) => NodeKind::RecordedLecture,
        }
    }

    /// The leaf payload and its kind, if this node is a leaf.
    #[must_use]
    pub const fn as_leaf(&self) -> Option<(LeafKind, &Leaf)> {
        match self {
            Self::Folder(_) => None,
            Self::File(leaf) => Some((LeafKind::File, leaf)),
            Self::RecordedLecture(leaf) => Some((LeafKind::RecordedLecture, leaf)),
        }
    }

    /// Builds a leaf node of the given kind.
    #[must_use]
    pub const fn leaf(kind: LeafKind, leaf: Leaf) -> Self {
        match kind {
            LeafKind::File => Self::File(leaf),
            LeafKind::RecordedLecture => Self::RecordedLecture(leaf),
        }
    }
}

impl From<Folder> for ContentNode {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

/// Wire shape shared by every node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<ContentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapping: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    predownload_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

impl TryFrom<RawNode> for ContentNode {
    type Error = Error;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let kind = match raw.kind.as_str() {
            "folder" => {
                return Ok(Self::Folder(Folder {
                    name: raw.name,
                    children: raw.children.unwrap_or_default(),
                }));
            }
            "file" => LeafKind::File,
            "recorded_lecture" => LeafKind::RecordedLecture,
            _ => {
                return Err(Error::UnknownNodeType {
                    name: raw.name,
                    kind: raw.kind,
                });
            }
        };

        let Some(predownload_link) = raw.predownload_link else {
            return Err(Error::MalformedNode {
                name: raw.name,
                reason: "missing predownload_link".to_string(),
            });
        };

        // Only a complete pair counts as resolved.
        let resolved = match (raw.download_link, raw.filename) {
            (Some(url), Some(filename)) => Some(ResolvedLink { url, filename }),
            _ => None,
        };

        Ok(Self::leaf(
            kind,
            Leaf {
                name: raw.name,
                predownload_link,
                resolved,
            },
        ))
    }
}

impl From<ContentNode> for RawNode {
    fn from(node: ContentNode) -> Self {
        match node {
            ContentNode::Folder(folder) => {
                let mut mapping = BTreeMap::new();
                for (index, child) in folder.children.iter().enumerate() {
                    mapping.entry(child.name().to_string()).or_insert(index);
                }
                Self {
                    name: folder.name,
                    kind: NodeKind::Folder.as_str().to_string(),
                    children: Some(folder.children),
                    mapping: Some(mapping),
                    predownload_link: None,
                    download_link: None,
                    filename: None,
                }
            }
            ContentNode::File(leaf) => raw_leaf(NodeKind::File, leaf),
            ContentNode::RecordedLecture(leaf) => raw_leaf(NodeKind::RecordedLecture, leaf),
        }
    }
}

fn raw_leaf(kind: NodeKind, leaf: Leaf) -> RawNode {
    let (download_link, filename) = leaf
        .resolved
        .map_or((None, None), |r| (Some(r.url), Some(r.filename)));
    RawNode {
        name: leaf.name,
        kind: kind.as_str().to_string(),
        children: None,
        mapping: None,
        predownload_link: Some(leaf.predownload_link),
        download_link,
        filename,
    }
}

/// Decodes a list of course folders from a JSON document.
///
/// # Errors
///
/// Returns an error if the document is not valid JSON, contains an unknown
/// node type, or has a course entry that is not a folder.
pub fn courses_from_json(json: &str) -> crate::Result<Vec<Folder>> {
    let nodes: Vec<ContentNode> = serde_json::from_str(json)?;
    nodes
        .into_iter()
        .map(|node| match node {
            ContentNode::Folder(folder) => Ok(folder),
            other => Err(Error::MalformedNode {
                name: other.name().to_string(),
                reason: "course entries must be folders".to_string(),
            }),
        })
        .collect()
}

/// Encodes a list of course folders as a pretty-printed JSON document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn courses_to_json(courses: &[Folder]) -> crate::Result<String> {
    let nodes: Vec<ContentNode> = courses.iter().cloned().map(ContentNode::Folder).collect();
    Ok(serde_json::to_string_pretty(&nodes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"[
        {
            "name": "CE3007",
            "type": "folder",
            "children": [
                {
                    "name": "Week1",
                    "type": "folder",
                    "children": [
                        {"name": "notes.pdf", "type": "file", "predownload_link": "ref1"},
                        {
                            "name": "Lecture 1",
                            "type": "recorded_lecture",
                            "predownload_link": "ref2",
                            "download_link": "https://cdn/lec1",
                            "filename": "Lecture 1.mp4"
                        }
                    ]
                }
            ]
        }
    ]"#;

    #[test]
    fn decodes_nested_document() {
        let courses = courses_from_json(DOCUMENT).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "CE3007");
        assert_eq!(courses[0].leaf_count(), 2);

        let ContentNode::Folder(week) = &courses[0].children[0] else {
            panic!("expected folder");
        };
        assert_eq!(week.children[0], ContentNode::File(Leaf::new("notes.pdf", "ref1")));
        assert_eq!(
            week.children[1],
            ContentNode::RecordedLecture(
                Leaf::new("Lecture 1", "ref2").with_resolved("https://cdn/lec1", "Lecture 1.mp4")
            )
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"[{"name": "C", "type": "folder", "children": [
            {"name": "Quiz", "type": "quiz"}
        ]}]"#;
        let err = courses_from_json(json).unwrap_err();
        assert!(err.to_string().contains("quiz"), "{err}");
    }

    #[test]
    fn leaf_without_reference_is_rejected() {
        let json = r#"[{"name": "C", "type": "folder", "children": [
            {"name": "a.pdf", "type": "file"}
        ]}]"#;
        assert!(courses_from_json(json).is_err());
    }

    #[test]
    fn top_level_leaf_is_rejected() {
        let json = r#"[{"name": "a.pdf", "type": "file", "predownload_link": "r"}]"#;
        assert!(matches!(
            courses_from_json(json),
            Err(Error::MalformedNode { .. })
        ));
    }

    #[test]
    fn half_resolved_leaf_stays_unresolved() {
        let json = r#"[{"name": "C", "type": "folder", "children": [
            {"name": "a.pdf", "type": "file", "predownload_link": "r", "download_link": "u"}
        ]}]"#;
        let courses = courses_from_json(json).unwrap();
        assert_eq!(courses[0].children[0], ContentNode::File(Leaf::new("a.pdf", "r")));
    }

    #[test]
    fn encoding_preserves_shape_and_writes_mapping() {
        let courses = courses_from_json(DOCUMENT).unwrap();
        let json = courses_to_json(&courses).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["type"], "folder");
        assert_eq!(value[0]["mapping"]["Week1"], 0);
        let lecture = &value[0]["children"][0]["children"][1];
        assert_eq!(lecture["type"], "recorded_lecture");
        assert_eq!(lecture["download_link"], "https://cdn/lec1");

        assert_eq!(courses_from_json(&json).unwrap(), courses);
    }

    #[test]
    fn lecture_filename_known_before_resolution() {
        let leaf = Leaf::new("Lecture 3", "ref");
        assert_eq!(
            leaf.expected_filename(LeafKind::RecordedLecture).as_deref(),
            Some("Lecture 3.mp4")
        );
        assert_eq!(leaf.expected_filename(LeafKind::File), None);
    }
}
