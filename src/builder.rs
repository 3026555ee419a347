//! Document construction helpers for the local renderer.

use std::cell::Cell;
use std::rc::Rc;

use crate::fonts;
use genpdf::error::{Error, ErrorKind};
use genpdf::style;
use genpdf::{self, Element, Margins, Mm, PageDecorator, Position, Size};

/// Shared view of the number of the page currently being laid out.
///
/// The page decorator advances the counter whenever `genpdf` starts a new
/// page; elements rendered afterwards observe the new value.
#[derive(Clone, Debug, Default)]
pub struct PageCounter(Rc<Cell<usize>>);

impl PageCounter {
    /// Returns the 1-indexed page number, or zero before the first page starts.
    pub fn current(&self) -> usize {
        self.0.get()
    }

    fn advance(&self) -> usize {
        let page = self.0.get() + 1;
        self.0.set(page);
        page
    }
}

/// Builder for `genpdf::Document` instances pre-configured with the crate defaults.
#[derive(Default)]
pub struct DocumentBuilder {
    title: Option<String>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    font_size: Option<u8>,
    footer: Option<FooterSpec>,
}

type ElementFactory = dyn Fn(usize) -> Box<dyn Element>;

impl DocumentBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the paper size used for newly created documents.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Sets the default font size in points.
    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Builds a fully configured `genpdf::Document` together with its page counter.
    pub fn build(self) -> Result<(genpdf::Document, PageCounter), Error> {
        let font_family = fonts::default_font_family()?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(title) = self.title {
            document.set_title(title);
        }

        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }

        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }

        let counter = PageCounter::default();
        let decorator = ConfiguredPageDecorator::new(counter.clone(), self.margins, self.footer);
        document.set_page_decorator(decorator);

        Ok((document, counter))
    }
}

/// Definition of a footer rendered through the page decorator.
struct FooterSpec {
    height: Mm,
    factory: Box<ElementFactory>,
}

impl FooterSpec {
    fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    counter: PageCounter,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl ConfiguredPageDecorator {
    fn new(counter: PageCounter, margins: Option<Margins>, footer: Option<FooterSpec>) -> Self {
        Self {
            counter,
            margins,
            footer,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        let page = self.counter.advance();

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentBuilder, PageCounter};
    use genpdf::{Mm, PaperSize, Size};

    #[test]
    fn builder_records_layout_options() {
        let builder = DocumentBuilder::new()
            .with_title("Links")
            .with_paper_size(PaperSize::Letter)
            .with_font_size(9)
            .with_margins(12);

        assert_eq!(builder.title.as_deref(), Some("Links"));
        assert_eq!(builder.paper_size, Some(Size::from(PaperSize::Letter)));
        assert_eq!(builder.font_size, Some(9));
        assert_eq!(builder.margins.map(|margins| margins.top), Some(Mm::from(12)));
    }

    #[test]
    fn counter_is_shared_between_clones() {
        let counter = PageCounter::default();
        let observer = counter.clone();
        assert_eq!(observer.current(), 0);
        counter.advance();
        counter.advance();
        assert_eq!(observer.current(), 2);
    }
}
