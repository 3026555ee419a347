//! Outline embedding built on top of `lopdf`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::outline::{Outline, OutlineEntry};

/// Errors that can occur while embedding an outline into a rendered PDF document.
#[derive(Debug)]
pub enum BookmarkError {
    /// The PDF bytes could not be parsed by `lopdf`.
    Parse(lopdf::Error),
    /// A required catalog entry was missing from the document trailer.
    MissingCatalog,
    /// The catalog object was not a dictionary, preventing outline injection.
    InvalidCatalog,
    /// An outline entry pointed at a page the document does not have.
    MissingPage {
        /// Title of the offending entry.
        title: String,
        /// The requested (1-indexed) page number that could not be resolved.
        page_number: usize,
    },
}

impl From<lopdf::Error> for BookmarkError {
    fn from(err: lopdf::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<std::io::Error> for BookmarkError {
    fn from(err: std::io::Error) -> Self {
        Self::Parse(err.into())
    }
}

impl std::fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Failed to parse PDF bytes: {err}"),
            Self::MissingCatalog => write!(f, "PDF catalog entry is missing"),
            Self::InvalidCatalog => write!(f, "PDF catalog entry is not a dictionary"),
            Self::MissingPage { title, page_number } => write!(
                f,
                "Outline entry '{title}' refers to missing page {page_number}"
            ),
        }
    }
}

impl std::error::Error for BookmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::MissingCatalog | Self::InvalidCatalog | Self::MissingPage { .. } => None,
        }
    }
}

/// Writes `outline` into the `/Outlines` tree of the given PDF.
///
/// Destinations are 1-indexed page numbers; each linked entry receives a
/// `/Dest [page /Fit]` entry, folders get no action. Every entry is written
/// open, so `/Count` holds the number of descendants. An empty outline leaves
/// the bytes untouched.
pub fn apply_outline(pdf_bytes: &[u8], outline: &Outline<usize>) -> Result<Vec<u8>, BookmarkError> {
    if outline.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();

    let outlines_id = document.new_object_id();
    let level = write_level(&mut document, outlines_id, outline.roots(), &pages)?;
    insert_outlines_root(outlines_id, &mut document, &level)?;

    let mut buffer = Vec::new();
    document.save_to(&mut buffer).map_err(BookmarkError::from)?;
    Ok(buffer)
}

/// Object ids and open-descendant count of one sibling list.
struct WrittenLevel {
    first: ObjectId,
    last: ObjectId,
    count: i64,
}

fn write_level(
    document: &mut Document,
    parent_id: ObjectId,
    entries: &[OutlineEntry<usize>],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<WrittenLevel, BookmarkError> {
    let ids: Vec<ObjectId> = entries.iter().map(|_| document.new_object_id()).collect();
    let mut count = 0;

    for (index, entry) in entries.iter().enumerate() {
        let mut dictionary = Dictionary::new();
        dictionary.set("Title", text_string(entry.title()));
        dictionary.set("Parent", Object::Reference(parent_id));

        if let Some(&page_number) = entry.destination() {
            let page_ref = u32::try_from(page_number)
                .ok()
                .and_then(|number| pages.get(&number).copied())
                .ok_or_else(|| BookmarkError::MissingPage {
                    title: entry.title().to_owned(),
                    page_number,
                })?;
            dictionary.set(
                "Dest",
                Object::Array(vec![
                    Object::Reference(page_ref),
                    Object::Name("Fit".into()),
                ]),
            );
        }

        if index > 0 {
            dictionary.set("Prev", Object::Reference(ids[index - 1]));
        }
        if index + 1 < ids.len() {
            dictionary.set("Next", Object::Reference(ids[index + 1]));
        }

        count += 1;
        if !entry.children().is_empty() {
            let children = write_level(document, ids[index], entry.children(), pages)?;
            dictionary.set("First", Object::Reference(children.first));
            dictionary.set("Last", Object::Reference(children.last));
            dictionary.set("Count", Object::Integer(children.count));
            count += children.count;
        }

        document
            .objects
            .insert(ids[index], Object::Dictionary(dictionary));
    }

    Ok(WrittenLevel {
        first: ids[0],
        last: ids[ids.len() - 1],
        count,
    })
}

/// Encodes `text` as a PDF text string, using UTF-16BE when it is not plain ASCII.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn insert_outlines_root(
    outlines_id: ObjectId,
    document: &mut Document,
    level: &WrittenLevel,
) -> Result<(), BookmarkError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::MissingCatalog)?;

    let mut dictionary = Dictionary::new();
    dictionary.set("Type", Object::Name("Outlines".into()));
    dictionary.set("Count", Object::Integer(level.count));
    dictionary.set("First", Object::Reference(level.first));
    dictionary.set("Last", Object::Reference(level.last));

    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .ok_or(BookmarkError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| BookmarkError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));
    catalog.set("PageMode", Object::Name("UseOutlines".into()));

    document
        .objects
        .insert(outlines_id, Object::Dictionary(dictionary));

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    use super::{apply_outline, text_string, BookmarkError};
    use crate::outline::{Outline, OutlineEntry};

    /// Builds a minimal document with `page_count` blank pages.
    pub(crate) fn blank_pdf(page_count: usize) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let content = Content {
            operations: vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
        };
        let mut kids = Vec::new();
        for _ in 0..page_count {
            let content_id = document.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn writes_nested_outline_with_counts() {
        let outline = Outline::new(vec![
            OutlineEntry::folder("Part").with_child(OutlineEntry::linked("Intro", 1)),
            OutlineEntry::linked("Appendix", 2),
        ]);
        let bytes = apply_outline(&blank_pdf(2), &outline).unwrap();

        let document = Document::load_mem(&bytes).unwrap();
        let catalog_id = document.trailer.get(b"Root").unwrap().as_reference().unwrap();
        let catalog = document.get_dictionary(catalog_id).unwrap();
        let outlines_id = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
        let outlines = document.get_dictionary(outlines_id).unwrap();
        assert_eq!(outlines.get(b"Count").unwrap().as_i64().unwrap(), 3);

        let part_id = outlines.get(b"First").unwrap().as_reference().unwrap();
        let part = document.get_dictionary(part_id).unwrap();
        assert!(part.get(b"Dest").is_err());
        assert_eq!(part.get(b"Count").unwrap().as_i64().unwrap(), 1);

        let intro_id = part.get(b"First").unwrap().as_reference().unwrap();
        let intro = document.get_dictionary(intro_id).unwrap();
        assert!(intro.get(b"Dest").is_ok());
        assert_eq!(
            intro.get(b"Parent").unwrap().as_reference().unwrap(),
            part_id
        );
    }

    #[test]
    fn rejects_destinations_past_the_last_page() {
        let outline = Outline::new(vec![OutlineEntry::linked("Missing", 5)]);
        let err = apply_outline(&blank_pdf(1), &outline).unwrap_err();
        assert!(matches!(
            err,
            BookmarkError::MissingPage { page_number: 5, .. }
        ));
    }

    #[test]
    fn empty_outline_keeps_bytes() {
        let bytes = blank_pdf(1);
        assert_eq!(apply_outline(&bytes, &Outline::default()).unwrap(), bytes);
    }

    #[test]
    fn non_ascii_titles_use_utf16() {
        match text_string("Zażółć") {
            Object::String(bytes, _) => assert_eq!(&bytes[..2], &[0xFE, 0xFF]),
            other => panic!("unexpected object {other:?}"),
        }
    }
}
