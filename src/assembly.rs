//! Interface to the service that lays out pages and produces the final document.

use std::fmt;

use crate::content::{ContentItem, SummaryPlacement, SummaryTable};
use crate::outline::Outline;

/// Failure reported by a document assembler.
///
/// Mirrors the error shape of remote document services: a short machine
/// readable identifier plus a human readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyError {
    id: String,
    message: String,
}

impl AssemblyError {
    /// Creates an error with the given identifier and message.
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Returns the error identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.message)
    }
}

impl std::error::Error for AssemblyError {}

/// Collects pages, an optional summary table and an outline, then renders them.
///
/// Pages are rendered in submission order. The handle returned by
/// [`DocumentAssembler::add_page`] for the `i`-th submission designates the
/// first page of that submission and is what outline entries bind to.
pub trait DocumentAssembler {
    /// Opaque jump target for one submitted page.
    type Handle: Clone;

    /// Appends a content page and returns its destination handle.
    fn add_page(&mut self, item: &ContentItem) -> Self::Handle;

    /// Adds the link summary before or after the content pages.
    fn add_summary_table(&mut self, table: &SummaryTable, placement: SummaryPlacement);

    /// Sets the outline embedded into the document.
    fn set_outline(&mut self, outline: Outline<Self::Handle>);

    /// Renders the document and returns its bytes.
    fn process(self) -> Result<Vec<u8>, AssemblyError>;
}
