//! JSON persistence for [`TocTree`].
//!
//! Trees are stored as a nested array of records:
//!
//! ```json
//! [{ "url": "", "displayText": "Part", "isExpanded": true, "children": [] }]
//! ```
//!
//! The transient edit flag is never written.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, TocNode, TocTree};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    #[serde(default)]
    url: String,
    display_text: String,
    #[serde(default = "expanded_by_default")]
    is_expanded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeRecord>,
}

fn expanded_by_default() -> bool {
    true
}

/// Errors raised while saving or loading a tree.
#[derive(Debug)]
pub enum PersistError {
    /// Reading or writing the file failed.
    Io(io::Error),
    /// The JSON was malformed or did not describe a tree.
    Json(serde_json::Error),
}

impl From<io::Error> for PersistError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Failed to access tree file: {err}"),
            Self::Json(err) => write!(f, "Invalid tree JSON: {err}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

fn record_of(tree: &TocTree, id: NodeId) -> Option<NodeRecord> {
    let node = tree.get(id)?;
    Some(NodeRecord {
        url: node.url().to_owned(),
        display_text: node.display_text().to_owned(),
        is_expanded: node.is_expanded(),
        children: tree
            .children(id)
            .iter()
            .filter_map(|child| record_of(tree, *child))
            .collect(),
    })
}

fn insert_record(tree: &mut TocTree, parent: Option<NodeId>, record: NodeRecord) {
    let node = TocNode::new(record.display_text, record.url).with_expanded(record.is_expanded);
    let id = match parent {
        None => tree.add_root(node),
        Some(parent) => match tree.add_child(parent, node) {
            Ok(id) => id,
            Err(_) => return,
        },
    };
    for child in record.children {
        insert_record(tree, Some(id), child);
    }
    // `add_child` expands the parent; restore the stored flag.
    if !record.is_expanded {
        let _ = tree.set_expanded(id, false);
    }
}

/// Serializes `tree` as pretty-printed JSON.
pub fn to_json(tree: &TocTree) -> Result<String, PersistError> {
    let records: Vec<NodeRecord> = tree
        .roots()
        .iter()
        .filter_map(|id| record_of(tree, *id))
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Parses a tree from JSON. The returned tree is not dirty.
pub fn from_json(json: &str) -> Result<TocTree, PersistError> {
    let records: Vec<NodeRecord> = serde_json::from_str(json)?;
    let mut tree = TocTree::new();
    for record in records {
        insert_record(&mut tree, None, record);
    }
    tree.mark_clean();
    Ok(tree)
}

/// Writes `tree` to `path` and marks it clean.
pub fn save(tree: &mut TocTree, path: impl AsRef<Path>) -> Result<(), PersistError> {
    fs::write(path, to_json(tree)?)?;
    tree.mark_clean();
    Ok(())
}

/// Reads a tree from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<TocTree, PersistError> {
    from_json(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::{from_json, load, save, to_json, PersistError};
    use crate::tree::{TocNode, TocTree};

    #[test]
    fn round_trips_shape_and_flags() {
        let mut tree = TocTree::new();
        let part = tree.add_root(TocNode::heading("Part"));
        tree.add_child(part, TocNode::new("Page", "https://example.com"))
            .unwrap();
        tree.set_expanded(part, false).unwrap();
        tree.start_edit(part).unwrap();

        let restored = from_json(&to_json(&tree).unwrap()).unwrap();
        let nodes: Vec<_> = restored
            .flatten()
            .map(|(id, node)| (restored.depth(id).unwrap(), node.clone()))
            .collect();
        assert_eq!(
            nodes,
            [
                (0, TocNode::heading("Part").with_expanded(false)),
                (1, TocNode::new("Page", "https://example.com")),
            ]
        );
        assert!(!restored.is_dirty());
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let tree = from_json(r#"[{ "displayText": "Only" }]"#).unwrap();
        let (_, node) = tree.flatten().next().unwrap();
        assert_eq!(node.url(), "");
        assert!(node.is_expanded());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = from_json(r#"{ "not": "a list" }"#).unwrap_err();
        assert!(matches!(err, PersistError::Json(_)));
    }

    #[test]
    fn save_then_load_from_disk() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("toc.json");

        let mut tree = TocTree::new();
        tree.add_root(TocNode::new("Home", "https://example.com"));
        save(&mut tree, &path).unwrap();
        assert!(!tree.is_dirty());

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
