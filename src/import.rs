//! Reading bookmarks from existing documents.
//!
//! Imported bookmarks only carry titles and nesting: destinations are not
//! resolved back into URLs, so every imported entry becomes a heading.

use std::collections::HashSet;
use std::fmt;

use lopdf::{Dictionary, Document, Object, ObjectId};
use log::{debug, warn};

use crate::tree::{NodeId, TocNode, TocTree};

const MAX_DEPTH: usize = 64;
const MAX_SIBLINGS: usize = 10_000;

/// A read-only bookmark as found in a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportedBookmark {
    title: String,
    children: Vec<ImportedBookmark>,
}

impl ImportedBookmark {
    /// Creates a bookmark without children.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Returns the bookmark title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the nested bookmarks in order.
    pub fn children(&self) -> &[ImportedBookmark] {
        &self.children
    }

    /// Appends a nested bookmark and returns the updated value.
    pub fn with_child(mut self, child: ImportedBookmark) -> Self {
        self.children.push(child);
        self
    }
}

/// Errors raised while reading bookmarks.
#[derive(Debug)]
pub enum ImportError {
    /// The bytes are not a readable PDF.
    Parse(lopdf::Error),
    /// The trailer has no `/Root` catalog.
    MissingCatalog,
    /// The catalog is not a dictionary.
    InvalidCatalog,
}

impl From<lopdf::Error> for ImportError {
    fn from(err: lopdf::Error) -> Self {
        Self::Parse(err)
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Failed to parse PDF bytes: {err}"),
            Self::MissingCatalog => write!(f, "PDF catalog entry is missing"),
            Self::InvalidCatalog => write!(f, "PDF catalog entry is not a dictionary"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::MissingCatalog | Self::InvalidCatalog => None,
        }
    }
}

/// Anything able to list the bookmarks of a rendered document.
pub trait BookmarkSource {
    /// Returns the top-level bookmarks of `pdf` with their nested children.
    fn read_bookmarks(&self, pdf: &[u8]) -> Result<Vec<ImportedBookmark>, ImportError>;
}

/// [`BookmarkSource`] walking the `/Outlines` tree with `lopdf`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfBookmarkReader;

impl BookmarkSource for LopdfBookmarkReader {
    fn read_bookmarks(&self, pdf: &[u8]) -> Result<Vec<ImportedBookmark>, ImportError> {
        let document = Document::load_mem(pdf)?;
        read_document_bookmarks(&document)
    }
}

/// Reads the outline of an already parsed document.
pub fn read_document_bookmarks(document: &Document) -> Result<Vec<ImportedBookmark>, ImportError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| ImportError::MissingCatalog)?;
    let catalog = document
        .get_object(catalog_id)
        .map_err(|_| ImportError::MissingCatalog)?
        .as_dict()
        .map_err(|_| ImportError::InvalidCatalog)?;

    let Some(outlines) = resolve_dict(document, catalog, b"Outlines") else {
        debug!("document has no outline");
        return Ok(Vec::new());
    };
    let Ok(first) = outlines.get(b"First").and_then(Object::as_reference) else {
        return Ok(Vec::new());
    };

    let mut visited = HashSet::new();
    Ok(read_siblings(document, first, 0, &mut visited))
}

fn resolve_dict<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match dict.get(key).ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(inner) => Some(inner),
        _ => None,
    }
}

fn read_siblings(
    document: &Document,
    first: ObjectId,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
) -> Vec<ImportedBookmark> {
    let mut bookmarks = Vec::new();
    if depth >= MAX_DEPTH {
        warn!("outline nesting exceeds {MAX_DEPTH} levels; ignoring deeper entries");
        return bookmarks;
    }

    let mut current = Some(first);
    while let Some(id) = current {
        if !visited.insert(id) || bookmarks.len() >= MAX_SIBLINGS {
            warn!("outline item {id:?} revisited or sibling limit reached; stopping");
            break;
        }
        let Ok(item) = document.get_object(id).and_then(Object::as_dict) else {
            break;
        };

        let title = item
            .get(b"Title")
            .ok()
            .and_then(|title| decode_text(document, title))
            .unwrap_or_default();
        let mut bookmark = ImportedBookmark::new(title);

        if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
            bookmark.children = read_siblings(document, child, depth + 1, visited);
        }
        bookmarks.push(bookmark);

        current = item.get(b"Next").and_then(Object::as_reference).ok();
    }

    bookmarks
}

/// Decodes a PDF text string: UTF-16BE with a byte order mark, otherwise
/// UTF-8, falling back to PDFDocEncoding. Unpaired surrogates and a dangling
/// odd byte become U+FFFD.
fn decode_text(document: &Document, object: &Object) -> Option<String> {
    let object = match object {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    match object {
        Object::String(bytes, _) => Some(decode_string_bytes(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn decode_string_bytes(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE_u8, 0xFF]) {
        let pairs = utf16.chunks_exact(2);
        let dangling = !pairs.remainder().is_empty();
        let units: Vec<u16> = pairs
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let mut text = String::from_utf16_lossy(&units);
        if dangling {
            text.push(char::REPLACEMENT_CHARACTER);
        }
        return text;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&byte| pdf_doc_char(byte)).collect(),
    }
}

/// Maps one PDFDocEncoding byte to its character. Outside 0x18-0x1F and
/// 0x80-0xAD the encoding agrees with Latin-1.
fn pdf_doc_char(byte: u8) -> char {
    const LOW: [char; 8] = [
        '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}',
        '\u{02DC}',
    ];
    const HIGH: [char; 32] = [
        '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}',
        '\u{2044}', '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}',
        '\u{201D}', '\u{2018}', '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}',
        '\u{0141}', '\u{0152}', '\u{0160}', '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}',
        '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
    ];
    match byte {
        0x18..=0x1F => LOW[usize::from(byte - 0x18)],
        0x80..=0x9F => HIGH[usize::from(byte - 0x80)],
        0xA0 => '\u{20AC}',
        // 0xAD is undefined in PDFDocEncoding.
        0xAD => char::REPLACEMENT_CHARACTER,
        other => char::from(other),
    }
}

impl TocTree {
    /// Builds a fresh tree mirroring `bookmarks`, with every URL left empty.
    pub fn from_bookmarks(bookmarks: &[ImportedBookmark]) -> Self {
        fn insert(tree: &mut TocTree, parent: NodeId, bookmark: &ImportedBookmark) {
            if let Ok(id) = tree.add_child(parent, TocNode::heading(bookmark.title())) {
                for child in bookmark.children() {
                    insert(tree, id, child);
                }
            }
        }

        let mut tree = TocTree::new();
        for bookmark in bookmarks {
            let root = tree.add_root(TocNode::heading(bookmark.title()));
            for child in bookmark.children() {
                insert(&mut tree, root, child);
            }
        }
        tree.mark_clean();
        tree
    }
}

#[cfg(test)]
mod tests {
    use lopdf::{Document, Object, StringFormat};

    use super::{decode_text, BookmarkSource, ImportError, ImportedBookmark, LopdfBookmarkReader};
    use crate::bookmarks::{apply_outline, tests::blank_pdf};
    use crate::outline::{Outline, OutlineEntry};
    use crate::tree::TocTree;

    #[test]
    fn reads_back_written_outline() {
        let outline = Outline::new(vec![
            OutlineEntry::folder("Rozdział 1")
                .with_child(OutlineEntry::linked("Intro", 1))
                .with_child(OutlineEntry::folder("Details").with_child(OutlineEntry::linked("Deep", 2))),
            OutlineEntry::linked("Appendix", 2),
        ]);
        let bytes = apply_outline(&blank_pdf(2), &outline).unwrap();

        let bookmarks = LopdfBookmarkReader.read_bookmarks(&bytes).unwrap();
        let expected = vec![
            ImportedBookmark::new("Rozdział 1")
                .with_child(ImportedBookmark::new("Intro"))
                .with_child(ImportedBookmark::new("Details").with_child(ImportedBookmark::new("Deep"))),
            ImportedBookmark::new("Appendix"),
        ];
        assert_eq!(bookmarks, expected);
    }

    #[test]
    fn document_without_outline_has_no_bookmarks() {
        let bookmarks = LopdfBookmarkReader.read_bookmarks(&blank_pdf(1)).unwrap();
        assert!(bookmarks.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = LopdfBookmarkReader
            .read_bookmarks(b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn converts_into_clean_tree_of_headings() {
        let bookmarks = vec![
            ImportedBookmark::new("A").with_child(ImportedBookmark::new("B")),
            ImportedBookmark::new("C"),
        ];
        let tree = TocTree::from_bookmarks(&bookmarks);

        let walked: Vec<_> = tree
            .flatten()
            .map(|(id, node)| (tree.depth(id).unwrap(), node.display_text().to_owned()))
            .collect();
        assert_eq!(
            walked,
            [
                (0, String::from("A")),
                (1, String::from("B")),
                (0, String::from("C"))
            ]
        );
        assert!(tree.flatten().all(|(_, node)| !node.has_content()));
        assert!(!tree.is_dirty());
    }

    #[test]
    fn non_utf8_titles_use_pdf_doc_encoding() {
        let title = Object::String(vec![b'A', 0x84, b'B', 0x92], StringFormat::Literal);
        assert_eq!(
            decode_text(&Document::new(), &title).as_deref(),
            Some("A\u{2014}B\u{2122}")
        );

        let bullet = Object::String(vec![0x80, b' ', 0xA0, 0xE9, 0xFF], StringFormat::Literal);
        assert_eq!(
            decode_text(&Document::new(), &bullet).as_deref(),
            Some("\u{2022} \u{20AC}\u{E9}\u{FF}")
        );
    }

    #[test]
    fn odd_length_utf16_marks_the_dangling_byte() {
        let title = Object::String(vec![0xFE, 0xFF, 0x00, 0x41, 0x00], StringFormat::Hexadecimal);
        assert_eq!(
            decode_text(&Document::new(), &title).as_deref(),
            Some("A\u{FFFD}")
        );
    }
}
