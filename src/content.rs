//! Page contents and the link summary derived from a [`TocTree`].

use crate::tree::{NodeId, TocNode, TocTree};

/// One page submitted to a document assembler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    display_text: String,
    url: String,
}

impl ContentItem {
    /// Creates a content item for the given label and URL.
    pub fn new(display_text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            display_text: display_text.into(),
            url: url.into(),
        }
    }

    /// Returns the content item for `node`, or `None` for headings.
    pub fn from_node(node: &TocNode) -> Option<Self> {
        node.has_content()
            .then(|| Self::new(node.display_text(), node.url()))
    }

    /// Returns the label of the originating entry.
    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// Returns the URL of the originating entry.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the text rendered on the page.
    pub fn body(&self) -> String {
        format!(
            "Content page for '{}'.\n\nURL: {}",
            self.display_text, self.url
        )
    }
}

/// Collects the content items of `tree` in page order, keyed by their node.
pub fn content_items(tree: &TocTree) -> Vec<(NodeId, ContentItem)> {
    tree.flatten()
        .filter_map(|(id, node)| ContentItem::from_node(node).map(|item| (id, item)))
        .collect()
}

/// Where the summary table goes relative to the content pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryPlacement {
    /// Before the first content page.
    #[default]
    Start,
    /// After the last content page.
    End,
}

/// A `(description, url)` row of the summary table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SummaryRow {
    description: String,
    url: String,
}

impl SummaryRow {
    /// Creates a row.
    pub fn new(description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            url: url.into(),
        }
    }

    /// Returns the description column.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the URL column.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Distinct links of a tree, listed in page order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Builds the table from every node with a non-blank URL.
    ///
    /// Rows repeating an earlier `(description, url)` pair are skipped. Returns
    /// `None` when the tree has no links at all.
    pub fn from_tree(tree: &TocTree) -> Option<Self> {
        let mut rows: Vec<SummaryRow> = Vec::new();
        for (_, node) in tree.flatten() {
            if node.url().trim().is_empty() {
                continue;
            }
            let row = SummaryRow::new(node.display_text(), node.url());
            if !rows.contains(&row) {
                rows.push(row);
            }
        }

        (!rows.is_empty()).then_some(Self { rows })
    }

    /// Returns the rows in order.
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
