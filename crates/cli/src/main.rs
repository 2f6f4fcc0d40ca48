use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use editor::{ArchivedNode, DragPayload, DropTarget, EditingSession, EditorConfig, NullRenderer};
use jobs::DecoderRegistry;
use project::{LazySource, ProjectLibrary, ProjectNodeId, ProjectTree};
use scenes::{FormatTag, SceneList};

#[derive(Parser)]
#[command(name = "structure-editor")]
#[command(about = "Structure Editor CLI - Headless project tree operations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Editor settings (JSON); defaults to the app data dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import structure files as projects and print the resulting tree
    Import {
        /// Files to import
        files: Vec<PathBuf>,

        /// Put the imports in a group with this name
        #[arg(short, long)]
        group: Option<String>,

        /// Seconds to wait for background decodes
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Summarize a native scene-list file
    Inspect {
        file: PathBuf,

        /// Write the summary to a JSON file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the bundled project library
    Library {
        /// Library database path
        #[arg(long)]
        db: Option<PathBuf>,

        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Write the default settings file
    InitConfig,
}

#[derive(Subcommand)]
enum LibraryAction {
    /// Print the library as a tree
    List,
    /// Add files as projects
    Add {
        files: Vec<PathBuf>,

        /// Parent group id
        #[arg(long)]
        parent: Option<String>,
    },
    /// Add an empty group
    AddGroup {
        name: String,

        #[arg(long)]
        parent: Option<String>,
    },
    /// Remove an entry and everything below it
    Remove { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let config_path = cli.config.unwrap_or_else(EditorConfig::default_path);
    let config = EditorConfig::load(&config_path)?;

    match cli.command {
        Commands::Import {
            files,
            group,
            timeout,
        } => import_command(config, files, group, timeout),
        Commands::Inspect { file, output } => inspect_command(file, output),
        Commands::Library { db, action } => {
            let db = db.unwrap_or_else(|| project::app_data_dir().join("library.db"));
            library_command(config, &db, action)
        }
        Commands::InitConfig => {
            config.save(&config_path)?;
            info!("Settings written to {:?}", config_path);
            Ok(())
        }
    }
}

fn read_archive(file: &Path) -> Result<Option<ArchivedNode>> {
    let Some(format) = FormatTag::from_path(file) else {
        warn!("Unrecognized file type: {:?}", file);
        return Ok(None);
    };
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    Ok(Some(ArchivedNode::project(name, format, bytes)))
}

fn import_command(
    config: EditorConfig,
    files: Vec<PathBuf>,
    group: Option<String>,
    timeout: u64,
) -> Result<()> {
    info!("Importing {} files", files.len());

    let mut archives = Vec::new();
    for file in &files {
        if !file.exists() {
            warn!("File does not exist: {:?}", file);
            continue;
        }
        if let Some(archive) = read_archive(file)? {
            archives.push(archive);
        }
    }
    if archives.is_empty() {
        return Err(anyhow!("nothing to import"));
    }

    let mut session = EditingSession::threaded(config, NullRenderer)?;
    let root = session.tree().root();
    let archives = match group {
        Some(name) => vec![ArchivedNode::group(name, archives)],
        None => archives,
    };
    let target = DropTarget::Node {
        parent: root,
        index: 0,
    };
    if !session.accept_drop(DragPayload::external(archives), target, false) {
        return Err(anyhow!("import was refused"));
    }

    let landed = session.wait_for_completions(Duration::from_secs(timeout));
    let pending = session.pending_decodes();
    if pending > 0 {
        warn!("{} imports still decoding after {}s", pending, timeout);
    }
    info!("Import completed ({} decoded)", landed);

    print_tree(session.tree(), root, 0);
    for entry in session.log().errors() {
        eprintln!("{}", entry);
    }
    Ok(())
}

fn print_tree(tree: &ProjectTree, id: ProjectNodeId, depth: usize) {
    for child in tree.children(id) {
        let Some(node) = tree.node(*child) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        match (node.status(), node.scene_list()) {
            (None, _) => println!("{}{}/", indent, node.display_name),
            (_, Some(list)) => println!(
                "{}{} ({} scenes, {} movies)",
                indent,
                node.display_name,
                list.scenes.len(),
                list.movie_count()
            ),
            (Some(status), None) => {
                let reason = node
                    .lazy()
                    .and_then(|l| l.error_reason())
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default();
                println!("{}{} [{:?}{}]", indent, node.display_name, status, reason);
            }
        }
        print_tree(tree, *child, depth + 1);
    }
}

fn summarize(list: &SceneList) -> serde_json::Value {
    let scenes: Vec<serde_json::Value> = list
        .scenes
        .iter()
        .map(|scene| {
            let movies: Vec<serde_json::Value> = scene
                .movies
                .iter()
                .map(|movie| {
                    serde_json::json!({
                        "name": movie.display_name,
                        "frames": movie.frames.len(),
                        "atoms": movie.total_atom_count(),
                        "visible": movie.is_visible(),
                    })
                })
                .collect();
            serde_json::json!({ "name": scene.display_name, "movies": movies })
        })
        .collect();
    let bounding_box = list.selected_bounding_box().map(|b| {
        serde_json::json!({ "min": b.min, "max": b.max, "center": b.center() })
    });
    serde_json::json!({
        "name": list.display_name,
        "scenes": scenes,
        "longest_movie": list.maximum_number_of_frames(),
        "selected_bounding_box": bounding_box,
    })
}

fn inspect_command(file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    info!("Inspecting: {:?}", file);
    let format = FormatTag::from_path(&file).unwrap_or(FormatTag::Native);
    let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let name = file.display().to_string();
    let list = DecoderRegistry::with_native().decode(&name, &LazySource::new(format, bytes))?;

    let summary = serde_json::json!({
        "file": file,
        "format": format.as_str(),
        "project": summarize(&list),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if let Some(output_path) = output {
        std::fs::write(&output_path, serde_json::to_string_pretty(&summary)?)?;
        info!("Summary written to: {:?}", output_path);
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn library_command(config: EditorConfig, db: &Path, action: LibraryAction) -> Result<()> {
    let library = ProjectLibrary::open_or_create(db)?;
    match action {
        LibraryAction::List => {
            let mut session = EditingSession::new(
                config,
                jobs::OperationGate::inline(),
                NullRenderer,
            );
            let group = session.load_library(&library, "Library")?;
            println!("Library/");
            print_tree(session.tree(), group, 1);
        }
        LibraryAction::Add { files, parent } => {
            for file in &files {
                let Some(format) = FormatTag::from_path(file) else {
                    warn!("Unrecognized file type: {:?}", file);
                    continue;
                };
                let bytes =
                    std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
                let name = file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("untitled");
                let id = library.add_project(parent.as_deref(), name, format, &bytes)?;
                println!("{}\t{}", id, name);
            }
        }
        LibraryAction::AddGroup { name, parent } => {
            let id = library.add_group(parent.as_deref(), &name)?;
            println!("{}\t{}", id, name);
        }
        LibraryAction::Remove { id } => {
            library.remove_entry(&id)?;
            info!("Removed {}", id);
        }
    }
    Ok(())
}
