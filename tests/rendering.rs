use lopdf::{Document, Object, ObjectId};
use sha2::{Digest, Sha256};
use toc_composer::fonts;
use toc_composer::import::{BookmarkSource, ImportedBookmark, LopdfBookmarkReader};
use toc_composer::{
    GenerateOptions, Generation, Generator, GenpdfAssembler, SummaryPlacement, TocNode, TocTree,
};

const SKIP_NOTE: &str =
    "bundled fonts missing. Set TOC_COMPOSER_FONTS_DIR or copy assets/fonts next to the binary.";

fn sample_tree() -> TocTree {
    let mut tree = TocTree::new();
    let a = tree.add_root(TocNode::heading("A"));
    tree.add_child(a, TocNode::new("B", "https://example.com/b"))
        .unwrap();
    let c = tree.add_child(a, TocNode::heading("C")).unwrap();
    tree.add_child(c, TocNode::new("D", "https://example.com/d"))
        .unwrap();
    tree
}

fn render(options: &GenerateOptions) -> Option<Vec<u8>> {
    if !fonts::default_fonts_available() {
        return None;
    }

    let generation = Generator::new()
        .generate(
            &sample_tree(),
            GenpdfAssembler::new().with_title("Sample"),
            options,
        )
        .expect("render sample pdf");
    match generation {
        Generation::Completed(document) => Some(document.into_bytes()),
        Generation::Skipped => panic!("fresh generator skipped the request"),
    }
}

fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if data[index..].starts_with(tag) {
                let mut cursor = index + tag.len();
                while cursor < data.len() && data[cursor] != terminator {
                    if terminator == b')'
                        || !matches!(data[cursor], b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t')
                    {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            } else {
                index += 1;
            }
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while let Some(start_pos) = data[offset..]
            .windows(start.len())
            .position(|window| window == start)
        {
            let start_index = offset + start_pos + start.len();
            let Some(end_pos) = data[start_index..]
                .windows(end.len())
                .position(|window| window == end)
            else {
                break;
            };
            for byte in &mut data[start_index..start_index + end_pos] {
                if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                    *byte = b'0';
                }
            }
            offset = start_index + end_pos + end.len();
        }
    }

    let mut normalized = bytes.to_vec();
    for tag in [
        &b"/CreationDate("[..],
        &b"/ModDate("[..],
        &b"/Producer("[..],
    ] {
        scrub_segment(&mut normalized, tag, b')');
    }
    scrub_segment(&mut normalized, b"/ID[", b']');
    for element in [
        "xmp:CreateDate",
        "xmp:ModifyDate",
        "xmp:MetadataDate",
        "xmpMM:DocumentID",
        "xmpMM:InstanceID",
        "xmpMM:VersionID",
    ] {
        let start = format!("<{element}>");
        let end = format!("</{element}>");
        scrub_xml(&mut normalized, start.as_bytes(), end.as_bytes());
    }
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

/// Maps each outline title to the 1-indexed page its `/Dest` points at.
fn outline_destinations(bytes: &[u8]) -> Vec<(String, Option<u32>)> {
    fn walk(
        document: &Document,
        first: ObjectId,
        pages: &[(ObjectId, u32)],
        out: &mut Vec<(String, Option<u32>)>,
    ) {
        let mut current = Some(first);
        while let Some(id) = current {
            let item = document.get_dictionary(id).unwrap();
            let title = match item.get(b"Title").unwrap() {
                Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
                other => panic!("unexpected title {other:?}"),
            };
            let page = item
                .get(b"Dest")
                .ok()
                .and_then(|dest| dest.as_array().ok())
                .and_then(|dest| dest.first())
                .and_then(|target| target.as_reference().ok())
                .and_then(|target| {
                    pages
                        .iter()
                        .find(|(page_id, _)| *page_id == target)
                        .map(|(_, number)| *number)
                });
            out.push((title, page));
            if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
                walk(document, child, pages, out);
            }
            current = item.get(b"Next").and_then(Object::as_reference).ok();
        }
    }

    let document = Document::load_mem(bytes).unwrap();
    let pages: Vec<(ObjectId, u32)> = document
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .unwrap();
    let outlines_id = document
        .get_dictionary(catalog_id)
        .unwrap()
        .get(b"Outlines")
        .and_then(Object::as_reference)
        .unwrap();
    let first = document
        .get_dictionary(outlines_id)
        .unwrap()
        .get(b"First")
        .and_then(Object::as_reference)
        .unwrap();

    let mut out = Vec::new();
    walk(&document, first, &pages, &mut out);
    out
}

#[test]
fn renders_non_empty_output() {
    let Some(bytes) = render(&GenerateOptions::default()) else {
        eprintln!("Skipping renders_non_empty_output: {SKIP_NOTE}");
        return;
    };
    assert!(bytes.starts_with(b"%PDF"), "output should be a PDF");
}

#[test]
fn rendering_is_deterministic() {
    let (Some(bytes_a), Some(bytes_b)) = (
        render(&GenerateOptions::default()),
        render(&GenerateOptions::default()),
    ) else {
        eprintln!("Skipping rendering_is_deterministic: {SKIP_NOTE}");
        return;
    };

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF renders must be deterministic after metadata normalization"
    );
}

#[test]
fn outline_links_content_pages_after_summary() {
    let Some(bytes) = render(&GenerateOptions::default()) else {
        eprintln!("Skipping outline_links_content_pages_after_summary: {SKIP_NOTE}");
        return;
    };

    assert_eq!(
        outline_destinations(&bytes),
        [
            ("A".to_owned(), None),
            ("B".to_owned(), Some(2)),
            ("C".to_owned(), None),
            ("D".to_owned(), Some(3)),
        ]
    );
}

#[test]
fn summary_at_end_keeps_content_first() {
    let options = GenerateOptions::new().with_summary_placement(SummaryPlacement::End);
    let Some(bytes) = render(&options) else {
        eprintln!("Skipping summary_at_end_keeps_content_first: {SKIP_NOTE}");
        return;
    };

    let destinations = outline_destinations(&bytes);
    assert_eq!(destinations[1], ("B".to_owned(), Some(1)));
    assert_eq!(destinations[3], ("D".to_owned(), Some(2)));
    assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 3);
}

#[test]
fn without_outline_nothing_is_embedded() {
    let options = GenerateOptions::new().with_outline(false);
    let Some(bytes) = render(&options) else {
        eprintln!("Skipping without_outline_nothing_is_embedded: {SKIP_NOTE}");
        return;
    };

    assert!(LopdfBookmarkReader.read_bookmarks(&bytes).unwrap().is_empty());
}

#[test]
fn imported_bookmarks_mirror_the_tree() {
    let Some(bytes) = render(&GenerateOptions::default()) else {
        eprintln!("Skipping imported_bookmarks_mirror_the_tree: {SKIP_NOTE}");
        return;
    };

    let bookmarks = LopdfBookmarkReader.read_bookmarks(&bytes).unwrap();
    assert_eq!(
        bookmarks,
        [ImportedBookmark::new("A")
            .with_child(ImportedBookmark::new("B"))
            .with_child(ImportedBookmark::new("C").with_child(ImportedBookmark::new("D")))]
    );

    let imported = TocTree::from_bookmarks(&bookmarks);
    let titles: Vec<_> = imported
        .flatten()
        .map(|(_, node)| node.display_text().to_owned())
        .collect();
    assert_eq!(titles, ["A", "B", "C", "D"]);
}

#[test]
fn paper_size_reaches_every_page() {
    if !fonts::default_fonts_available() {
        eprintln!("Skipping paper_size_reaches_every_page: {SKIP_NOTE}");
        return;
    }

    let assembler = GenpdfAssembler::new()
        .with_paper_size(genpdf::PaperSize::Letter)
        .with_font_size(10);
    let generation = Generator::new()
        .generate(&sample_tree(), assembler, &GenerateOptions::default())
        .expect("render letter pdf");
    let Generation::Completed(document) = generation else {
        panic!("fresh generator skipped the request");
    };

    let pdf = Document::load_mem(document.bytes()).unwrap();
    for (_, page_id) in pdf.get_pages() {
        let media_box = pdf
            .get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .unwrap();
        let width = media_box[2].as_float().unwrap();
        // US Letter is 612pt wide, A4 only 595pt.
        assert!((width - 612.0).abs() < 1.0, "unexpected page width {width}");
    }
}
