use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use toc_composer::import::{BookmarkSource, LopdfBookmarkReader};
use toc_composer::{
    persist, GenerateOptions, Generation, Generator, GenpdfAssembler, NodeId, SummaryPlacement,
    TocNode, TocTree,
};

/// Edits table-of-contents trees stored as JSON and renders them to PDF.
///
/// Nodes are addressed by dot-separated zero-based sibling indices, so `0.2`
/// is the third child of the first top-level entry. Rendering needs the
/// Liberation Sans font files; point `TOC_COMPOSER_FONTS_DIR` at them.
#[derive(Parser)]
#[command(author, version, about = "Table-of-contents editor and PDF generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tree with node paths.
    Show {
        /// Tree file.
        tree: PathBuf,
    },

    /// Append a new entry, creating the file when it does not exist.
    Add {
        /// Tree file.
        tree: PathBuf,
        /// Label of the new entry.
        #[arg(long)]
        text: String,
        /// URL of the new entry; omit for a heading.
        #[arg(long, default_value = "")]
        url: String,
        /// Path of the parent entry; omit to add at the top level.
        #[arg(long)]
        parent: Option<NodePath>,
    },

    /// Change the label or URL of an entry.
    Edit {
        /// Tree file.
        tree: PathBuf,
        /// Path of the entry.
        node: NodePath,
        /// New label.
        #[arg(long)]
        text: Option<String>,
        /// New URL; pass an empty string to turn the entry into a heading.
        #[arg(long)]
        url: Option<String>,
    },

    /// Remove an entry together with everything below it.
    Remove {
        /// Tree file.
        tree: PathBuf,
        /// Path of the entry.
        node: NodePath,
    },

    /// Move an entry under another one or back to the top level.
    #[command(name = "move", aliases = ["mv"])]
    Move {
        /// Tree file.
        tree: PathBuf,
        /// Path of the entry to move.
        node: NodePath,
        /// Path of the new parent; omit to move to the top level.
        #[arg(long)]
        under: Option<NodePath>,
        /// Top-level insert position, clamped to the number of entries.
        #[arg(long, default_value_t = usize::MAX)]
        index: usize,
    },

    /// Render the tree to a bookmarked PDF.
    Generate {
        /// Tree file.
        tree: PathBuf,
        /// Output PDF.
        #[arg(short, long, default_value = "toc.pdf")]
        output: PathBuf,
        /// Document title stored in the PDF metadata.
        #[arg(long)]
        title: Option<String>,
        /// Paper size of every page.
        #[arg(long, value_enum, default_value_t = Paper::A4)]
        paper: Paper,
        /// Body font size in points.
        #[arg(long)]
        font_size: Option<u8>,
        /// Put the link table after the content pages.
        #[arg(long)]
        summary_at_end: bool,
        /// Leave out the link table.
        #[arg(long)]
        no_summary: bool,
        /// Leave out the outline.
        #[arg(long)]
        no_outline: bool,
    },

    /// Build a tree from the bookmarks of an existing PDF.
    Import {
        /// Input PDF.
        pdf: PathBuf,
        /// Tree file to write.
        #[arg(short, long, default_value = "toc.json")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Show { tree } => {
            let tree = persist::load(&tree)?;
            print_tree(&tree);
        }
        Commands::Add {
            tree: path,
            text,
            url,
            parent,
        } => {
            let mut tree = load_or_new(&path)?;
            let node = TocNode::new(text, url);
            let id = match parent {
                None => tree.add_root(node),
                Some(parent) => {
                    let parent = resolve(&tree, &parent)?;
                    tree.add_child(parent, node)?
                }
            };
            persist::save(&mut tree, &path)?;
            println!("Added {}", format_path(&tree, id));
        }
        Commands::Edit {
            tree: path,
            node,
            text,
            url,
        } => {
            let mut tree = persist::load(&path)?;
            let id = resolve(&tree, &node)?;
            tree.start_edit(id)?;
            if let Some(text) = text {
                tree.set_display_text(id, text)?;
            }
            if let Some(url) = url {
                tree.set_url(id, url)?;
            }
            tree.end_edit(id)?;
            persist::save(&mut tree, &path)?;
        }
        Commands::Remove { tree: path, node } => {
            let mut tree = persist::load(&path)?;
            let id = resolve(&tree, &node)?;
            if let Some(removed) = tree.remove(id) {
                println!("Removed '{}'", removed.display_text());
            }
            persist::save(&mut tree, &path)?;
        }
        Commands::Move {
            tree: path,
            node,
            under,
            index,
        } => {
            let mut tree = persist::load(&path)?;
            let id = resolve(&tree, &node)?;
            let target = under.map(|under| resolve(&tree, &under)).transpose()?;
            tree.reparent(id, target, index)?;
            persist::save(&mut tree, &path)?;
            println!("Moved to {}", format_path(&tree, id));
        }
        Commands::Generate {
            tree: path,
            output,
            title,
            paper,
            font_size,
            summary_at_end,
            no_summary,
            no_outline,
        } => {
            let tree = persist::load(&path)?;
            let placement = if summary_at_end {
                SummaryPlacement::End
            } else {
                SummaryPlacement::Start
            };
            let options = GenerateOptions::new()
                .with_summary_table(!no_summary)
                .with_summary_placement(placement)
                .with_outline(!no_outline);
            let mut assembler = GenpdfAssembler::new().with_paper_size(paper.size());
            if let Some(title) = title {
                assembler = assembler.with_title(title);
            }
            if let Some(font_size) = font_size {
                assembler = assembler.with_font_size(font_size);
            }

            match Generator::new().generate(&tree, assembler, &options)? {
                Generation::Completed(document) => {
                    std::fs::write(&output, document.bytes())?;
                    info!("wrote {}", output.display());
                    println!(
                        "Generated {} ({} bytes, {} content pages)",
                        output.display(),
                        document.bytes().len(),
                        document.content_pages()
                    );
                }
                Generation::Skipped => println!("A generation is already running"),
            }
        }
        Commands::Import { pdf, output } => {
            let bytes = std::fs::read(&pdf)?;
            let bookmarks = LopdfBookmarkReader.read_bookmarks(&bytes)?;
            let mut tree = TocTree::from_bookmarks(&bookmarks);
            persist::save(&mut tree, &output)?;
            println!(
                "Imported {} bookmarks from {} into {}",
                tree.len(),
                pdf.display(),
                output.display()
            );
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Paper {
    A4,
    Letter,
    Legal,
}

impl Paper {
    fn size(self) -> genpdf::Size {
        match self {
            Self::A4 => genpdf::PaperSize::A4.into(),
            Self::Letter => genpdf::PaperSize::Letter.into(),
            Self::Legal => genpdf::PaperSize::Legal.into(),
        }
    }
}

/// Dot-separated sibling indices, e.g. `0.2.1`.
#[derive(Clone, Debug)]
struct NodePath(Vec<usize>);

impl FromStr for NodePath {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .split('.')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|err| format!("invalid path segment '{part}': {err}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NodePath)
    }
}

fn load_or_new(path: &Path) -> Result<TocTree, Box<dyn Error>> {
    if path.exists() {
        Ok(persist::load(path)?)
    } else {
        Ok(TocTree::new())
    }
}

fn resolve(tree: &TocTree, path: &NodePath) -> Result<NodeId, Box<dyn Error>> {
    tree.node_at_path(&path.0).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no entry at path {}", join_path(&path.0)),
        )
        .into()
    })
}

fn join_path(path: &[usize]) -> String {
    path.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

fn format_path(tree: &TocTree, id: NodeId) -> String {
    tree.path_of(id)
        .map(|path| join_path(&path))
        .unwrap_or_else(|| "?".to_owned())
}

fn print_tree(tree: &TocTree) {
    if tree.is_empty() {
        println!("(empty)");
        return;
    }
    for (id, node) in tree.flatten() {
        let indent = "  ".repeat(tree.depth(id).unwrap_or(0));
        let path = format_path(tree, id);
        if node.has_content() {
            println!("{indent}{path}  {}  <{}>", node.display_text(), node.url());
        } else {
            println!("{indent}{path}  {}", node.display_text());
        }
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
