mod output;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use gut_core::{
    Commit, Error as CoreError, Hash, Object, ObjectStore, ObjectType, Repository, Tree,
};
use output::{
    CatFileOutput, CommitTreeOutput, HashObjectOutput, InitOutput, LsTreeOutput, OutputWriter,
    RevParseOutput, TreeEntryInfo,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Gut - a content-addressed object store
#[derive(Parser)]
#[command(name = "gut")]
#[command(about = "Content-addressed object store with git-compatible loose objects", long_about = None)]
#[command(version)]
struct Cli {
    /// Where to start looking for the repository (defaults to GUT_ROOT env var or .)
    #[arg(short = 'C', long, global = true)]
    root: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init {
        /// Work tree to initialize (defaults to the root)
        path: Option<PathBuf>,
    },

    /// Compute the address of a file, optionally storing it
    HashObject {
        /// Object type of the file's content
        #[arg(short = 't', long = "type", default_value = "blob")]
        object_type: String,

        /// Write the object into the store
        #[arg(short, long)]
        write: bool,

        /// File to read
        file: PathBuf,
    },

    /// Print the payload of an object
    CatFile {
        /// Expected object type
        object_type: String,

        /// Address or unique prefix
        object: String,
    },

    /// List the entries of a tree (or of a commit's tree)
    LsTree {
        /// Recurse into subtrees
        #[arg(short)]
        recursive: bool,

        /// Address or unique prefix
        tree: String,
    },

    /// Expand a prefix to a full address
    RevParse {
        /// Address or unique prefix
        prefix: String,
    },

    /// Create a commit object for a tree
    CommitTree {
        /// Tree address or unique prefix
        tree: String,

        /// Parent commit (repeatable)
        #[arg(short, long = "parent")]
        parents: Vec<String>,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = OutputWriter::new(cli.json);

    // Determine search root: CLI arg > GUT_ROOT env var > current directory
    let root = cli
        .root
        .clone()
        .or_else(|| std::env::var("GUT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Commands::Init { path } => cmd_init(&output, path.as_deref().unwrap_or(&root)),
        Commands::HashObject {
            object_type,
            write,
            file,
        } => cmd_hash_object(&output, &root, &object_type, write, &file),
        Commands::CatFile {
            object_type,
            object,
        } => cmd_cat_file(&output, &root, &object_type, &object),
        Commands::LsTree { recursive, tree } => cmd_ls_tree(&output, &root, &tree, recursive),
        Commands::RevParse { prefix } => cmd_rev_parse(&output, &root, &prefix),
        Commands::CommitTree {
            tree,
            parents,
            message,
        } => cmd_commit_tree(&output, &root, &tree, &parents, &message),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = result_code(&err);
            output.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_env("GUT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("gut={level},gut_core={level}")));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 2 for lookups that found nothing or too much, 3 for corrupt data, 1 otherwise
/// (including a healthy object of the wrong type).
fn result_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::ObjectNotFound { .. } | CoreError::AmbiguousAddress { .. }) => 2,
        Some(CoreError::MalformedObject { .. } | CoreError::UnknownObjectType { .. }) => 3,
        _ => 1,
    }
}

fn open_store(root: &Path) -> Result<(Repository, ObjectStore)> {
    let repo = Repository::find(root)
        .with_context(|| format!("Failed to find repository from {}", root.display()))?;
    let store = repo.objects().context("Failed to open object store")?;
    Ok((repo, store))
}

fn resolve(store: &ObjectStore, name: &str) -> Result<Hash> {
    store
        .resolve_prefix(name)
        .with_context(|| format!("Failed to resolve {}", name))
}

fn parse_type(name: &str) -> Result<ObjectType> {
    name.parse()
        .with_context(|| format!("Invalid object type: {}", name))
}

fn cmd_init(output: &OutputWriter, path: &Path) -> Result<()> {
    let repo = Repository::init(path)
        .with_context(|| format!("Failed to initialize repository at {}", path.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: repo.metadata_dir().display().to_string(),
        algorithm: repo.algorithm().as_str().to_string(),
    };

    output.write(&data, || {
        format!(
            "Initialized empty repository in {}\n",
            repo.metadata_dir().display()
        )
    })
}

fn cmd_hash_object(
    output: &OutputWriter,
    root: &Path,
    type_name: &str,
    write: bool,
    file: &Path,
) -> Result<()> {
    let object_type = parse_type(type_name)?;
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    // Parse so that a malformed tree or commit is rejected before hashing.
    let object = Object::parse(object_type, &data)
        .with_context(|| format!("{} is not a valid {}", file.display(), object_type))?;

    let hash = if write {
        let (_repo, store) = open_store(root)?;
        store
            .write_object(&object)
            .with_context(|| format!("Failed to write {}", file.display()))?
    } else {
        object.hash()
    };

    let out = HashObjectOutput {
        success: true,
        result_code: 0,
        hash,
        object_type,
        written: write,
    };

    output.write(&out, || format!("{}\n", hash))
}

fn cmd_cat_file(output: &OutputWriter, root: &Path, type_name: &str, name: &str) -> Result<()> {
    let expected = parse_type(type_name)?;
    let (_repo, store) = open_store(root)?;
    let hash = resolve(&store, name)?;

    let (object_type, payload) = store
        .read_raw(&hash)
        .with_context(|| format!("Failed to read object {}", hash))?;

    if object_type != expected {
        return Err(CoreError::type_mismatch(hash, expected, object_type).into());
    }

    let out = CatFileOutput {
        success: true,
        result_code: 0,
        hash,
        object_type,
        size: payload.len(),
        content: String::from_utf8_lossy(&payload).into_owned(),
    };

    output.write_bytes(&out, &payload)
}

fn cmd_ls_tree(output: &OutputWriter, root: &Path, name: &str, recursive: bool) -> Result<()> {
    let (_repo, store) = open_store(root)?;
    let hash = resolve(&store, name)?;

    // A commit lists its tree.
    let tree_hash = match store.read_object(&hash)? {
        Object::Commit(commit) => commit.tree().context("Commit has no valid tree")?,
        Object::Tree(_) => hash,
        other => {
            return Err(
                CoreError::type_mismatch(hash, ObjectType::Tree, other.object_type()).into(),
            );
        }
    };

    let mut entries = Vec::new();
    collect_entries(&store, &tree_hash, "", recursive, &mut entries)?;

    let out = LsTreeOutput {
        success: true,
        result_code: 0,
        tree: tree_hash,
        entries,
    };

    output.write(&out, || {
        out.entries
            .iter()
            .map(|e| format!("{} {} {}\t{}\n", e.mode, e.entry_type, e.hash, e.path))
            .collect()
    })
}

fn collect_entries(
    store: &ObjectStore,
    hash: &Hash,
    prefix: &str,
    recursive: bool,
    out: &mut Vec<TreeEntryInfo>,
) -> Result<()> {
    let object = store
        .read_typed(hash, ObjectType::Tree)
        .with_context(|| format!("Failed to read tree {}", hash))?;
    let tree: &Tree = object
        .as_tree()
        .context("read_typed returned a non-tree object")?;

    for entry in tree.entries() {
        let name = String::from_utf8_lossy(entry.name());
        let path = if prefix.is_empty() {
            name.into_owned()
        } else {
            format!("{}/{}", prefix, name)
        };

        if recursive && entry.is_tree() {
            collect_entries(store, &entry.hash(), &path, recursive, out)?;
        } else {
            out.push(TreeEntryInfo {
                mode: entry.mode().to_string(),
                entry_type: entry.entry_type().as_str().to_string(),
                hash: entry.hash(),
                path,
            });
        }
    }

    Ok(())
}

fn cmd_rev_parse(output: &OutputWriter, root: &Path, prefix: &str) -> Result<()> {
    let (_repo, store) = open_store(root)?;
    let hash = resolve(&store, prefix)?;

    let out = RevParseOutput {
        success: true,
        result_code: 0,
        prefix: prefix.to_string(),
        hash,
    };

    output.write(&out, || format!("{}\n", hash))
}

fn cmd_commit_tree(
    output: &OutputWriter,
    root: &Path,
    tree_name: &str,
    parent_names: &[String],
    message: &str,
) -> Result<()> {
    let (repo, store) = open_store(root)?;

    let tree = resolve(&store, tree_name)?;
    store
        .read_typed(&tree, ObjectType::Tree)
        .with_context(|| format!("{} is not a tree", tree_name))?;

    let mut parents = Vec::with_capacity(parent_names.len());
    for name in parent_names {
        let parent = resolve(&store, name)?;
        store
            .read_typed(&parent, ObjectType::Commit)
            .with_context(|| format!("{} is not a commit", name))?;
        parents.push(parent);
    }

    let identity = repo
        .config()
        .identity()
        .context("Set user.name and user.email in the repository config")?;
    let now = Local::now();
    let signature = format!("{} {} {}", identity, now.timestamp(), now.format("%z"));

    let mut message = message.to_string();
    if !message.ends_with('\n') {
        message.push('\n');
    }

    let commit = Commit::builder(tree)
        .parents(parents.iter().copied())
        .author(signature.clone())
        .committer(signature)
        .message(message)
        .build();

    let hash = store
        .write_object(&commit.into())
        .context("Failed to write commit")?;

    let out = CommitTreeOutput {
        success: true,
        result_code: 0,
        hash,
        tree,
        parents,
    };

    output.write(&out, || format!("{}\n", hash))
}
