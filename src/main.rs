//! scm-git - Git blame and changed-lines for static analysis
//!
//! # Usage
//! ```bash
//! scm-git backend                              # Which backend was selected
//! scm-git blame src/lib.rs src/main.rs         # Per-line attribution
//! scm-git changed-files --target main          # Files changed since the fork point
//! scm-git changed-lines --target main src/a.rs # Changed line numbers per file
//! scm-git revision                             # HEAD commit id
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scm_git::models::{FileBlame, InputFile};
use scm_git::{CollectedBlame, GitContext, GitScmProvider, ScmConfig, ScmError, WarningCollector};

/// Git blame and changed-lines detection for static analysis
#[derive(Parser)]
#[command(name = "scm-git")]
#[command(about = "Line-level Git blame and merge-base changed lines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Git executable to use; forces the native backend [env: SCM_GIT_EXECUTABLE]
    #[arg(long, global = true)]
    git_executable: Option<PathBuf>,

    /// Project directory inside the work tree
    #[arg(short = 'C', long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Number of parallel blame workers (defaults to the CPU count)
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the selected backend
    Backend,
    /// Blame files line by line
    Blame {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List files added or modified since the merge base with a branch
    ChangedFiles {
        /// Target branch name
        #[arg(short, long)]
        target: String,
    },
    /// List changed line numbers since the merge base with a branch
    ChangedLines {
        /// Target branch name
        #[arg(short, long)]
        target: String,
        /// Files to inspect (defaults to every changed file)
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Print the HEAD commit id
    Revision {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Print a path relative to the work tree root
    RelativePath {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Report whether paths are ignored by Git
    Ignored {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

fn absolute(dir: &Path, path: &Path) -> PathBuf {
    let joined = dir.join(path);
    std::fs::canonicalize(&joined).unwrap_or(joined)
}

fn run(provider: &GitScmProvider, dir: &Path, command: Commands) -> anyhow::Result<Value> {
    match command {
        Commands::Backend => Ok(json!({ "backend": provider.backend() })),
        Commands::Blame { files } => {
            let inputs = files
                .iter()
                .map(|f| {
                    let path = absolute(dir, f);
                    InputFile::from_path(&path).with_context(|| format!("Failed to read {}", path.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let output = CollectedBlame::new();
            provider.blame(dir, inputs, &output)?;
            let mut results: Vec<FileBlame> = output
                .into_results()
                .into_iter()
                .map(|(path, lines)| FileBlame { path, lines })
                .collect();
            results.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(serde_json::to_value(results)?)
        }
        Commands::ChangedFiles { target } => {
            let changed = provider.branch_changed_files(&target, dir)?;
            Ok(serde_json::to_value(changed)?)
        }
        Commands::ChangedLines { target, files } => {
            let files: Vec<PathBuf> = if files.is_empty() {
                match provider.branch_changed_files(&target, dir)? {
                    Some(changed) => changed.into_iter().collect(),
                    None => return Ok(Value::Null),
                }
            } else {
                files.iter().map(|f| absolute(dir, f)).collect()
            };
            let changed = provider.branch_changed_lines(&target, dir, &files)?;
            Ok(serde_json::to_value(changed)?)
        }
        Commands::Revision { path } => {
            let path = path.map(|p| absolute(dir, &p)).unwrap_or_else(|| dir.to_path_buf());
            Ok(json!({ "revision": provider.revision_id(&path)? }))
        }
        Commands::RelativePath { path } => {
            let path = absolute(dir, &path);
            Ok(json!({ "path": provider.relative_path_from_scm_root(&path)? }))
        }
        Commands::Ignored { paths } => {
            let ignore = provider.ignore_command(dir)?;
            let results: BTreeMap<String, bool> = paths
                .iter()
                .map(|p| {
                    let path = absolute(dir, p);
                    (path.display().to_string(), ignore.is_ignored(&path))
                })
                .collect();
            Ok(serde_json::to_value(results)?)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let dir = std::fs::canonicalize(&cli.dir).unwrap_or_else(|_| cli.dir.clone());
    let mut config = ScmConfig::from_env();
    if let Some(executable) = cli.git_executable {
        config.git_executable = Some(executable);
    }

    let ctx = match GitContext::detect(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(2);
        }
    };

    let warnings = Arc::new(WarningCollector::new());
    let mut provider = GitScmProvider::new(Arc::new(ctx), warnings.clone());
    if let Some(workers) = cli.workers {
        provider = provider.with_blame_workers(workers);
    }

    let result = run(&provider, &dir, cli.command);

    for warning in warnings.messages() {
        eprintln!("  Warning: {}", warning);
    }

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ {:#}", e);
            let configuration = e
                .downcast_ref::<ScmError>()
                .is_some_and(ScmError::is_configuration);
            std::process::exit(if configuration { 2 } else { 1 });
        }
    }
}
