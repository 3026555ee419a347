//! Construction of the nested outline embedded in generated documents.
//!
//! The outline mirrors the shape of a [`TocTree`].  Entries for content nodes
//! are bound to the destination handle returned by the document assembler when
//! the node's page was submitted; headings become entries without an action.

use std::collections::HashMap;
use std::fmt;

use crate::tree::{NodeId, TocTree};

/// A single outline entry together with its nested children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry<H> {
    title: String,
    destination: Option<H>,
    children: Vec<OutlineEntry<H>>,
}

impl<H> OutlineEntry<H> {
    /// Creates an entry without a destination.
    pub fn folder(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            destination: None,
            children: Vec::new(),
        }
    }

    /// Creates an entry that jumps to `destination`.
    pub fn linked(title: impl Into<String>, destination: H) -> Self {
        Self {
            title: title.into(),
            destination: Some(destination),
            children: Vec::new(),
        }
    }

    /// Returns the entry title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the destination, or `None` for folders.
    pub fn destination(&self) -> Option<&H> {
        self.destination.as_ref()
    }

    /// Returns the nested entries.
    pub fn children(&self) -> &[OutlineEntry<H>] {
        &self.children
    }

    /// Appends a child and returns the updated entry.
    pub fn with_child(mut self, child: OutlineEntry<H>) -> Self {
        self.children.push(child);
        self
    }
}

/// Ordered list of top-level outline entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outline<H> {
    roots: Vec<OutlineEntry<H>>,
}

impl<H> Default for Outline<H> {
    fn default() -> Self {
        Self { roots: Vec::new() }
    }
}

impl<H> Outline<H> {
    /// Creates an outline from top-level entries.
    pub fn new(roots: Vec<OutlineEntry<H>>) -> Self {
        Self { roots }
    }

    /// Returns the top-level entries.
    pub fn roots(&self) -> &[OutlineEntry<H>] {
        &self.roots
    }

    /// Total number of entries at every level.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` when the outline has no entries.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Walks every entry in pre-order, yielding its depth alongside.
    pub fn iter(&self) -> OutlineIter<'_, H> {
        OutlineIter {
            stack: self.roots.iter().rev().map(|entry| (0, entry)).collect(),
        }
    }

    /// Rebinds every destination through `map`, keeping the shape intact.
    pub fn map_destinations<T, F>(self, mut map: F) -> Outline<T>
    where
        F: FnMut(H) -> T,
    {
        fn convert<H, T>(entry: OutlineEntry<H>, map: &mut impl FnMut(H) -> T) -> OutlineEntry<T> {
            OutlineEntry {
                title: entry.title,
                destination: entry.destination.map(&mut *map),
                children: entry
                    .children
                    .into_iter()
                    .map(|child| convert(child, &mut *map))
                    .collect(),
            }
        }

        Outline {
            roots: self
                .roots
                .into_iter()
                .map(|entry| convert(entry, &mut map))
                .collect(),
        }
    }
}

/// Pre-order iterator over `(depth, entry)` pairs.
#[derive(Clone, Debug)]
pub struct OutlineIter<'a, H> {
    stack: Vec<(usize, &'a OutlineEntry<H>)>,
}

impl<'a, H> Iterator for OutlineIter<'a, H> {
    type Item = (usize, &'a OutlineEntry<H>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, entry) = self.stack.pop()?;
        self.stack
            .extend(entry.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, entry))
    }
}

/// Raised when the handle map does not cover every content node.
///
/// This is a contract violation by the caller rather than a user error: every
/// content node must have been submitted before the outline is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutlineError {
    /// A content node has no destination handle.
    InvariantViolation {
        /// Node lacking a handle.
        node: NodeId,
        /// Title of the node, for diagnostics.
        title: String,
    },
}

impl fmt::Display for OutlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvariantViolation { node, title } => write!(
                f,
                "Content node {node} ('{title}') has no destination handle"
            ),
        }
    }
}

impl std::error::Error for OutlineError {}

/// Builds an outline isomorphic to `tree`.
///
/// Content nodes must have an entry in `handles`; headings may not and any
/// handle supplied for a heading is ignored.
pub fn build_outline<H: Clone>(
    tree: &TocTree,
    handles: &HashMap<NodeId, H>,
) -> Result<Outline<H>, OutlineError> {
    let roots = build_level(tree, tree.roots(), handles)?;
    Ok(Outline { roots })
}

fn build_level<H: Clone>(
    tree: &TocTree,
    ids: &[NodeId],
    handles: &HashMap<NodeId, H>,
) -> Result<Vec<OutlineEntry<H>>, OutlineError> {
    let mut entries = Vec::with_capacity(ids.len());

    for &id in ids {
        let Some(node) = tree.get(id) else {
            continue;
        };

        let mut entry = if node.has_content() {
            let handle = handles
                .get(&id)
                .cloned()
                .ok_or_else(|| OutlineError::InvariantViolation {
                    node: id,
                    title: node.display_text().to_owned(),
                })?;
            OutlineEntry::linked(node.display_text(), handle)
        } else {
            OutlineEntry::folder(node.display_text())
        };

        let children = tree.children(id);
        if !children.is_empty() {
            entry.children = build_level(tree, children, handles)?;
        }
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{build_outline, OutlineEntry, OutlineError};
    use crate::tree::{TocNode, TocTree};

    #[test]
    fn mirrors_tree_and_binds_handles() {
        let mut tree = TocTree::new();
        let a = tree.add_root(TocNode::heading("A"));
        let b = tree.add_child(a, TocNode::new("B", "u1")).unwrap();
        let c = tree.add_child(a, TocNode::heading("C")).unwrap();
        let d = tree.add_child(c, TocNode::new("D", "u2")).unwrap();

        let handles = HashMap::from([(b, "hB"), (d, "hD")]);
        let outline = build_outline(&tree, &handles).unwrap();

        let expected = OutlineEntry::folder("A")
            .with_child(OutlineEntry::linked("B", "hB"))
            .with_child(OutlineEntry::folder("C").with_child(OutlineEntry::linked("D", "hD")));
        assert_eq!(outline.roots(), [expected]);
        assert_eq!(outline.len(), 4);
    }

    #[test]
    fn missing_handle_fails_fast() {
        let mut tree = TocTree::new();
        let page = tree.add_root(TocNode::new("Page", "https://example.com"));

        let err = build_outline::<u32>(&tree, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            OutlineError::InvariantViolation {
                node: page,
                title: "Page".into()
            }
        );
    }

    #[test]
    fn handles_for_headings_are_ignored() {
        let mut tree = TocTree::new();
        let heading = tree.add_root(TocNode::heading("Heading"));

        let outline = build_outline(&tree, &HashMap::from([(heading, 7)])).unwrap();
        assert_eq!(outline.roots()[0].destination(), None);
    }

    #[test]
    fn iter_reports_depths() {
        let outline = super::Outline::new(vec![
            OutlineEntry::folder("one").with_child(OutlineEntry::linked("two", 2)),
            OutlineEntry::linked("three", 3),
        ]);
        let walked: Vec<_> = outline
            .iter()
            .map(|(depth, entry)| (depth, entry.title().to_owned()))
            .collect();
        assert_eq!(
            walked,
            [
                (0, String::from("one")),
                (1, String::from("two")),
                (0, String::from("three"))
            ]
        );
    }
}
