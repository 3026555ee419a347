//! Local [`DocumentAssembler`] that lays pages out with `genpdf` and embeds the
//! outline with `lopdf`.
//!
//! Each submitted page starts on a fresh page. A zero-sized marker element is
//! placed in front of every submission; when `genpdf` lays it out, the marker
//! records the current page number from the shared [`PageCounter`]. Once the
//! document is rendered those numbers resolve the outline's handles into
//! `/Dest` targets.

use std::cell::Cell;
use std::rc::Rc;

use genpdf::elements::{Break, FrameCellDecorator, PageBreak, Paragraph, TableLayout};
use genpdf::error::Error;
use genpdf::style::{Style, StyledString};
use genpdf::{render, Element, RenderResult, Size};
use log::debug;

use crate::assembly::{AssemblyError, DocumentAssembler};
use crate::bookmarks;
use crate::builder::{DocumentBuilder, PageCounter};
use crate::content::{ContentItem, SummaryPlacement, SummaryTable};
use crate::outline::Outline;

const SUMMARY_TITLE: &str = "Links";
const HEADING_FONT_SIZE: u8 = 16;
const MARGIN_MM: i32 = 18;
const FOOTER_HEIGHT_MM: i32 = 8;

/// Destination handle issued by [`GenpdfAssembler`]: the submission index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageHandle(usize);

impl PageHandle {
    /// Returns the zero-based submission index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Renders submitted pages into a PDF without any remote service.
#[derive(Clone, Debug, Default)]
pub struct GenpdfAssembler {
    title: Option<String>,
    paper_size: Option<Size>,
    font_size: Option<u8>,
    pages: Vec<ContentItem>,
    summary: Option<(SummaryTable, SummaryPlacement)>,
    outline: Option<Outline<PageHandle>>,
}

impl GenpdfAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the paper size of every page. Defaults to A4.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the body font size in points.
    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Number of content pages submitted so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_pages(&self) -> Result<(Vec<u8>, Vec<usize>), AssemblyError> {
        let mut builder = DocumentBuilder::new()
            .with_margins(MARGIN_MM)
            .with_footer(FOOTER_HEIGHT_MM, |page| {
                Paragraph::new(format!("{page}")).aligned(genpdf::Alignment::Center)
            });
        if let Some(title) = &self.title {
            builder = builder.with_title(title.clone());
        }
        if let Some(paper_size) = self.paper_size {
            builder = builder.with_paper_size(paper_size);
        }
        if let Some(font_size) = self.font_size {
            builder = builder.with_font_size(font_size);
        }
        let (document, counter) = builder
            .build()
            .map_err(|err| AssemblyError::new("fonts", err.to_string()))?;
        self.lay_out(document, counter)
            .map_err(|err| AssemblyError::new("render", err.to_string()))
    }

    fn lay_out(
        &self,
        mut document: genpdf::Document,
        counter: PageCounter,
    ) -> Result<(Vec<u8>, Vec<usize>), Error> {
        let mut needs_break = false;
        if let Some((table, SummaryPlacement::Start)) = &self.summary {
            push_summary(&mut document, table)?;
            needs_break = true;
        }

        let mut slots = Vec::with_capacity(self.pages.len());
        for item in &self.pages {
            if needs_break {
                document.push(PageBreak::new());
            }
            needs_break = true;

            let (marker, slot) = PageMarker::new(counter.clone());
            document.push(marker);
            slots.push(slot);
            push_page(&mut document, item);
        }

        if let Some((table, SummaryPlacement::End)) = &self.summary {
            if needs_break {
                document.push(PageBreak::new());
            }
            push_summary(&mut document, table)?;
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes)?;

        let page_numbers = slots.iter().map(|slot| slot.get()).collect();
        Ok((bytes, page_numbers))
    }
}

impl DocumentAssembler for GenpdfAssembler {
    type Handle = PageHandle;

    fn add_page(&mut self, item: &ContentItem) -> PageHandle {
        self.pages.push(item.clone());
        PageHandle(self.pages.len() - 1)
    }

    fn add_summary_table(&mut self, table: &SummaryTable, placement: SummaryPlacement) {
        self.summary = Some((table.clone(), placement));
    }

    fn set_outline(&mut self, outline: Outline<PageHandle>) {
        self.outline = Some(outline);
    }

    fn process(self) -> Result<Vec<u8>, AssemblyError> {
        let (bytes, page_numbers) = self.render_pages()?;
        debug!(
            "rendered {} content pages into {} bytes",
            page_numbers.len(),
            bytes.len()
        );

        let Some(outline) = self.outline else {
            return Ok(bytes);
        };

        let mut unresolved = None;
        let outline = outline.map_destinations(|handle| {
            let page = page_numbers.get(handle.0).copied().unwrap_or(0);
            if page == 0 && unresolved.is_none() {
                unresolved = Some(handle);
            }
            page
        });
        if let Some(handle) = unresolved {
            return Err(AssemblyError::new(
                "outline",
                format!("Handle {} does not match a rendered page", handle.0),
            ));
        }

        bookmarks::apply_outline(&bytes, &outline)
            .map_err(|err| AssemblyError::new("outline", err.to_string()))
    }
}

fn push_page(document: &mut genpdf::Document, item: &ContentItem) {
    document.push(
        Paragraph::new(StyledString::new(
            item.display_text().to_owned(),
            Style::new().bold().with_font_size(HEADING_FONT_SIZE),
        ))
        .padded(genpdf::Margins::trbl(0, 0, 4, 0)),
    );
    for line in item.body().lines() {
        if line.is_empty() {
            document.push(Break::new(1));
        } else {
            document.push(Paragraph::new(line.to_owned()));
        }
    }
}

fn push_summary(document: &mut genpdf::Document, table: &SummaryTable) -> Result<(), Error> {
    document.push(
        Paragraph::new(StyledString::new(
            SUMMARY_TITLE,
            Style::new().bold().with_font_size(HEADING_FONT_SIZE),
        ))
        .padded(genpdf::Margins::trbl(0, 0, 4, 0)),
    );

    let mut layout = TableLayout::new(vec![2, 3]);
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header = Style::new().bold();
    layout
        .row()
        .element(Paragraph::new(StyledString::new("Description", header)).padded(1))
        .element(Paragraph::new(StyledString::new("URL", header)).padded(1))
        .push()?;
    for row in table.rows() {
        layout
            .row()
            .element(Paragraph::new(row.description().to_owned()).padded(1))
            .element(Paragraph::new(row.url().to_owned()).padded(1))
            .push()?;
    }

    document.push(layout);
    Ok(())
}

/// Zero-sized element capturing the page it is laid out on.
struct PageMarker {
    counter: PageCounter,
    slot: Rc<Cell<usize>>,
}

impl PageMarker {
    fn new(counter: PageCounter) -> (Self, Rc<Cell<usize>>) {
        let slot = Rc::new(Cell::new(0));
        let marker = Self {
            counter,
            slot: Rc::clone(&slot),
        };
        (marker, slot)
    }
}

impl Element for PageMarker {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        _area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        self.slot.set(self.counter.current());
        Ok(RenderResult::default())
    }
}
