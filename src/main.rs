use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use repotree::archive::{ArchiveBuilder, ArchiveReport};
use repotree::local::LocalBatch;
use repotree::model::{ClientConfig, Origin, RemoteConfig, RepoPath, RepoRef};
use repotree::remote::HttpRemoteStore;
use repotree::resolver::{ContentCache, ContentResolver};
use repotree::store::ConfigStore;
use repotree::sync::SyncCoordinator;

#[derive(Parser)]
#[command(name = "repotree")]
#[command(about = "Browse, upload and export repository content", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Act as this owner instead of the configured one
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .repotree config directory
    Init {
        /// Re-initialize if .repotree already exists
        #[arg(long)]
        force: bool,
        /// Path to initialize (defaults to current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Configure or show the remote
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Show a repository's uploaded tree
    Ls {
        repo: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one uploaded file
    Cat { repo: String, path: String },

    /// Stage a local directory and save it as the repository's content
    Push {
        repo: String,
        dir: PathBuf,
        /// Glob of relative paths to skip (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Write the repository tree as a tar archive (not a zip file)
    Export {
        repo: String,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Archive a local directory instead of the remote tree
        #[arg(long)]
        from: Option<PathBuf>,
        /// Concurrent fetches (defaults to config)
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Set the remote
    Set {
        #[arg(long)]
        url: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 3)]
        retries: usize,
    },
    /// Show the remote
    Show {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { force, path } = &cli.command {
        let root = match path {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("get current dir")?,
        };
        ConfigStore::init(&root, *force)?;
        println!("Initialized repotree config at {}", root.display());
        return Ok(());
    }

    let store = ConfigStore::discover(&std::env::current_dir().context("get current dir")?)?;
    let cfg = store.read_config()?;

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Remote { command } => match command {
            RemoteCommands::Show { json } => {
                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&cfg.remote)
                            .context("serialize remote json")?
                    );
                } else if let Some(remote) = cfg.remote {
                    println!("url: {}", remote.base_url);
                    println!("owner: {}", remote.owner_id);
                    println!("retries: {}", remote.retries);
                } else {
                    println!("No remote configured");
                }
            }
            RemoteCommands::Set {
                url,
                owner,
                retries,
            } => {
                let mut cfg = cfg;
                cfg.remote = Some(RemoteConfig {
                    base_url: url,
                    owner_id: owner,
                    retries,
                });
                store.write_config(&cfg)?;
                println!("Remote configured");
            }
        },

        Commands::Ls { repo, json } => {
            let session = Session::open(&cfg, cli.owner, repo)?;
            let tree = session.coordinator.load_remote()?;
            if json {
                let paths: Vec<String> = tree.leaf_paths().iter().map(|p| p.to_string()).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&paths).context("serialize listing")?
                );
            } else if tree.is_empty() {
                println!("No uploaded files");
            } else {
                print!("{}", tree.render());
            }
        }

        Commands::Cat { repo, path } => {
            let session = Session::open(&cfg, cli.owner, repo)?;
            let path = RepoPath::parse(&path)?;
            let tree = session.coordinator.load_remote()?;
            let leaf = tree
                .leaf(&path)
                .with_context(|| format!("no file at {}", path))?;
            let bytes = session.coordinator.resolver().resolve(leaf)?;
            std::io::stdout()
                .write_all(&bytes)
                .context("write to stdout")?;
        }

        Commands::Push { repo, dir, exclude } => {
            let session = Session::open(&cfg, cli.owner, repo)?;
            let batch = LocalBatch::from_dir(&dir, &exclude)
                .with_context(|| format!("stage {}", dir.display()))?;
            let staged = session.coordinator.stage_local(batch)?;
            let stats = staged.stats();
            println!("Staged {} files in {} directories", stats.files, stats.dirs);
            let remote = session.coordinator.save().context("save")?;
            println!(
                "Saved {}; remote now has {} files",
                session.coordinator.repo(),
                remote.stats().files
            );
        }

        Commands::Export {
            repo,
            out,
            from,
            workers,
        } => {
            let session = Session::open(&cfg, cli.owner, repo)?;
            let tree = match &from {
                Some(dir) => session.coordinator.stage_local(
                    LocalBatch::from_dir(dir, &[])
                        .with_context(|| format!("stage {}", dir.display()))?,
                )?,
                None => session.coordinator.load_remote()?,
            };
            let workers = workers.unwrap_or(cfg.archive.workers);
            export_archive(&session.coordinator.resolver(), &tree, &out, workers)?;
            if tree.origin() == Origin::Local {
                println!("Exported local directory to {}", out.display());
            } else {
                println!("Exported {} to {}", session.coordinator.repo(), out.display());
            }
        }
    }

    Ok(())
}

struct Session {
    coordinator: SyncCoordinator,
}

impl Session {
    fn open(cfg: &ClientConfig, owner: Option<String>, repo_id: String) -> Result<Self> {
        let remote = cfg
            .remote
            .clone()
            .context("no remote configured (run `repotree remote set --url ... --owner ...`)")?;
        let owner_id = owner.unwrap_or_else(|| remote.owner_id.clone());
        let store = HttpRemoteStore::new(remote).context("build remote client")?;
        let coordinator = SyncCoordinator::new(RepoRef::new(owner_id, repo_id), Arc::new(store))
            .with_cache(ContentCache::new());
        Ok(Self { coordinator })
    }
}

fn export_archive(
    resolver: &ContentResolver,
    tree: &repotree::model::RepositoryTree,
    out: &Path,
    workers: usize,
) -> Result<()> {
    let tmp = out.with_extension("partial");
    let file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    let report = match write_archive(resolver, tree, workers, file) {
        Ok(report) => report,
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            return Err(err.context(format!("write {}", tmp.display())));
        }
    };
    fs::rename(&tmp, out)
        .with_context(|| format!("rename {} -> {}", tmp.display(), out.display()))?;

    for failure in &report.failures {
        eprintln!("warning: {} could not be fetched: {}", failure.path, failure.reason);
    }
    println!(
        "{} directories, {} files, {} placeholders",
        report.dirs,
        report.files,
        report.failures.len()
    );
    Ok(())
}

fn write_archive(
    resolver: &ContentResolver,
    tree: &repotree::model::RepositoryTree,
    workers: usize,
    file: fs::File,
) -> Result<ArchiveReport> {
    let sink = std::io::BufWriter::new(file);
    let (sink, report) = ArchiveBuilder::new(resolver.clone())
        .workers(workers)
        .write_to(tree, sink)
        .context("build archive")?;
    sink.into_inner()
        .map_err(|e| e.into_error())
        .context("flush archive")?;
    Ok(report)
}
