//! Core entry point for the toc_composer crate.
//!
//! Author a bookmark tree with [`tree::TocTree`], then turn it into a PDF whose
//! outline mirrors the tree with [`generate::Generator`]. Rendering goes through
//! the [`assembly::DocumentAssembler`] trait; [`render::GenpdfAssembler`] is the
//! local implementation.

pub mod assembly;
pub mod bookmarks;
pub mod builder;
pub mod content;
pub mod fonts;
pub mod generate;
pub mod import;
pub mod outline;
pub mod persist;
pub mod render;
pub mod tree;

pub use assembly::{AssemblyError, DocumentAssembler};
pub use content::{ContentItem, SummaryPlacement, SummaryTable};
pub use generate::{GenerateError, GenerateOptions, Generation, Generator};
pub use import::{BookmarkSource, ImportedBookmark, LopdfBookmarkReader};
pub use outline::{build_outline, Outline, OutlineEntry, OutlineError};
pub use render::GenpdfAssembler;
pub use tree::{NodeId, TocNode, TocTree, TreeError, TreeEvent};
