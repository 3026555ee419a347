//! The "generate document" workflow.
//!
//! Only one generation may run per [`Generator`] at a time. A request made
//! while another one is outstanding returns [`Generation::Skipped`] without
//! touching the assembler. There is no cancellation: a run ends either with a
//! document or with an error, and the gate is released in both cases.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::assembly::{AssemblyError, DocumentAssembler};
use crate::content::{content_items, SummaryPlacement, SummaryTable};
use crate::outline::{build_outline, OutlineError};
use crate::tree::TocTree;

/// Switches controlling what goes into a generated document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerateOptions {
    summary_table: bool,
    summary_placement: SummaryPlacement,
    add_outline: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            summary_table: true,
            summary_placement: SummaryPlacement::Start,
            add_outline: true,
        }
    }
}

impl GenerateOptions {
    /// Creates the default options: summary table first, outline included.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the link summary table is added.
    pub fn summary_table(&self) -> bool {
        self.summary_table
    }

    /// Returns where the summary table is placed.
    pub fn summary_placement(&self) -> SummaryPlacement {
        self.summary_placement
    }

    /// Returns whether the outline is embedded.
    pub fn add_outline(&self) -> bool {
        self.add_outline
    }

    /// Enables or disables the summary table.
    pub fn with_summary_table(mut self, summary_table: bool) -> Self {
        self.summary_table = summary_table;
        self
    }

    /// Places the summary table before or after the content pages.
    pub fn with_summary_placement(mut self, placement: SummaryPlacement) -> Self {
        self.summary_placement = placement;
        self
    }

    /// Enables or disables the embedded outline.
    pub fn with_outline(mut self, add_outline: bool) -> Self {
        self.add_outline = add_outline;
        self
    }
}

/// A successfully rendered document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedDocument {
    bytes: Vec<u8>,
    content_pages: usize,
}

impl GeneratedDocument {
    /// Returns the document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the document and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of content pages submitted to the assembler.
    pub fn content_pages(&self) -> usize {
        self.content_pages
    }
}

/// Outcome of a generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Generation {
    /// The document was rendered.
    Completed(GeneratedDocument),
    /// Another generation was already running; nothing happened.
    Skipped,
}

/// Errors that abort a generation run. The tree is never modified.
#[derive(Debug)]
pub enum GenerateError {
    /// The tree has no entries.
    EmptyTree,
    /// A content node was not submitted before the outline was built.
    Outline(OutlineError),
    /// The document assembler reported a failure.
    Remote(AssemblyError),
    /// The background worker ended without producing a result.
    WorkerPanicked,
}

impl From<OutlineError> for GenerateError {
    fn from(err: OutlineError) -> Self {
        Self::Outline(err)
    }
}

impl From<AssemblyError> for GenerateError {
    fn from(err: AssemblyError) -> Self {
        Self::Remote(err)
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTree => write!(f, "The table of contents is empty"),
            Self::Outline(err) => write!(f, "Outline construction failed: {err}"),
            Self::Remote(err) => write!(f, "Document generation failed: {err}"),
            Self::WorkerPanicked => write!(f, "Generation worker stopped unexpectedly"),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Outline(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::EmptyTree | Self::WorkerPanicked => None,
        }
    }
}

/// Runs generation workflows, one at a time.
///
/// Clones share the same gate.
#[derive(Clone, Debug, Default)]
pub struct Generator {
    in_progress: Arc<AtomicBool>,
}

/// Holds the gate for the lifetime of one run.
struct GateGuard(Arc<AtomicBool>);

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Generator {
    /// Creates a generator with an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a generation is running.
    pub fn is_generating(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<GateGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard(Arc::clone(&self.in_progress)))
    }

    /// Renders `tree` through `assembler` on the calling thread.
    pub fn generate<A: DocumentAssembler>(
        &self,
        tree: &TocTree,
        assembler: A,
        options: &GenerateOptions,
    ) -> Result<Generation, GenerateError> {
        if tree.is_empty() {
            return Err(GenerateError::EmptyTree);
        }
        let Some(_guard) = self.try_begin() else {
            debug!("generation already running; request skipped");
            return Ok(Generation::Skipped);
        };

        run(tree, assembler, options).map(Generation::Completed)
    }

    /// Like [`Generator::generate`], then clears the tree's dirty flag once a
    /// document was produced. A skipped or failed run leaves the flag alone.
    pub fn generate_and_mark_clean<A: DocumentAssembler>(
        &self,
        tree: &mut TocTree,
        assembler: A,
        options: &GenerateOptions,
    ) -> Result<Generation, GenerateError> {
        let generation = self.generate(tree, assembler, options)?;
        if let Generation::Completed(_) = generation {
            tree.mark_clean();
        }
        Ok(generation)
    }

    /// Renders a snapshot of a tree on a worker thread.
    ///
    /// The snapshot's dirty flag is not reported back; callers that track
    /// unsaved changes clear their own tree after [`PendingGeneration::wait`].
    ///
    /// Returns `Ok(None)` when another generation holds the gate. The caller
    /// keeps editing its own tree while the worker runs.
    pub fn spawn<A>(
        &self,
        tree: TocTree,
        assembler: A,
        options: GenerateOptions,
    ) -> Result<Option<PendingGeneration>, GenerateError>
    where
        A: DocumentAssembler + Send + 'static,
    {
        if tree.is_empty() {
            return Err(GenerateError::EmptyTree);
        }
        let Some(guard) = self.try_begin() else {
            debug!("generation already running; request skipped");
            return Ok(None);
        };

        let handle = thread::spawn(move || {
            let _guard = guard;
            run(&tree, assembler, &options)
        });
        Ok(Some(PendingGeneration { handle }))
    }
}

/// A generation running on a worker thread.
#[derive(Debug)]
pub struct PendingGeneration {
    handle: JoinHandle<Result<GeneratedDocument, GenerateError>>,
}

impl PendingGeneration {
    /// Returns `true` once the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker finishes and returns its result.
    pub fn wait(self) -> Result<GeneratedDocument, GenerateError> {
        self.handle
            .join()
            .unwrap_or(Err(GenerateError::WorkerPanicked))
    }
}

fn run<A: DocumentAssembler>(
    tree: &TocTree,
    mut assembler: A,
    options: &GenerateOptions,
) -> Result<GeneratedDocument, GenerateError> {
    let items = content_items(tree);
    debug!("submitting {} content pages", items.len());

    let mut handles = HashMap::with_capacity(items.len());
    for (id, item) in &items {
        handles.insert(*id, assembler.add_page(item));
    }

    if options.summary_table {
        if let Some(table) = SummaryTable::from_tree(tree) {
            debug!(
                "adding summary table with {} rows at {:?}",
                table.len(),
                options.summary_placement
            );
            assembler.add_summary_table(&table, options.summary_placement);
        }
    }

    if options.add_outline {
        let outline = build_outline(tree, &handles)?;
        assembler.set_outline(outline);
    }

    match assembler.process() {
        Ok(bytes) => {
            info!(
                "generated document with {} content pages ({} bytes)",
                items.len(),
                bytes.len()
            );
            Ok(GeneratedDocument {
                bytes,
                content_pages: items.len(),
            })
        }
        Err(err) => {
            warn!("document assembly failed: {err}");
            Err(GenerateError::Remote(err))
        }
    }
}
