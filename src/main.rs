use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use swarm::core::{Swarm, Task, TaskId, TaskStatus};
use swarm::{swlog, Config, Error, JsonSwarmStore, Result, SwarmManager, SwarmStore};

/// Swarm - coordinate parallel workers through per-task branches
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    SWARM_DEBUG=1   Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Repository to operate on (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub repo: Option<PathBuf>,

    /// Enable debug logging (writes to ~/.swarm/swarm.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Record a new swarm starting at a base revision
    Init {
        swarm_id: String,

        /// Revision the integration branch starts from
        #[arg(long)]
        base: String,

        /// Branch the swarm lands on
        #[arg(long, default_value = "main")]
        target: String,

        /// Integration branch name (default: swarm/<id>)
        #[arg(long)]
        integration: Option<String>,
    },

    /// Add a task to a swarm
    AddTask {
        swarm_id: String,
        task_id: String,

        /// Task that must close first (repeatable)
        #[arg(long = "after")]
        after: Vec<String>,

        /// Worker assigned to the task
        #[arg(long)]
        worker: Option<String>,

        /// Task title (defaults to the id)
        #[arg(long)]
        title: Option<String>,
    },

    /// Mark a task closed
    Close { swarm_id: String, task_id: String },

    /// Show progress, the ready front and blocked tasks
    Status { swarm_id: String },

    /// Show tasks grouped by dependency depth
    Waves { swarm_id: String },

    /// Create the integration branch from the base commit
    CreateBranch { swarm_id: String },

    /// Merge a worker branch into the integration branch
    Merge {
        swarm_id: String,
        worker_branch: String,
    },

    /// Land the integration branch on the target branch and push
    Land { swarm_id: String },

    /// Abort an in-progress merge
    Abort,

    /// Delete the swarm's branches locally and on the remote
    Cleanup { swarm_id: String },

    /// Print the branch name for a worker's task
    WorkerBranch {
        swarm_id: String,
        worker: String,
        task_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    swarm::log::init(cli.debug);

    if let Err(e) = run(cli) {
        swarm::swlog_error!("{}", e);
        eprintln!("error: {}", e);
        if let Some(git) = e.git_error() {
            if !git.stdout.is_empty() {
                eprintln!("{}", git.stdout);
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let repo = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config = Config::load(&repo)?;
    let store = JsonSwarmStore::for_repo(&repo, &config.store_dir);
    swlog!("command: {:?} repo={}", cli.command, repo.display());

    match cli.command {
        Command::Init {
            swarm_id,
            base,
            target,
            integration,
        } => {
            let base_commit = resolve_commit(&repo, &base)?;
            let mut swarm = Swarm::new(&swarm_id, &base_commit).with_target(&target);
            if let Some(name) = integration {
                swarm = swarm.with_integration(&name);
            }
            if store.path_for(&swarm_id).exists() {
                return Err(Error::Validation(format!("swarm {} already exists", swarm_id)));
            }
            store.save_swarm(&swarm)?;
            println!("{} at {} -> {}", swarm.integration, short(&base_commit), target);
        }
        Command::AddTask {
            swarm_id,
            task_id,
            after,
            worker,
            title,
        } => {
            let mut swarm = store.load_swarm(&swarm_id)?;
            let mut task = Task::new(task_id.as_str(), title.as_deref().unwrap_or(&task_id));
            for dep in after {
                task = task.depends_on(dep);
            }
            if let Some(worker) = worker {
                task.assign(&swarm_id, &worker);
            }
            if let Some(branch) = task.branch() {
                println!("{}", branch);
            }
            swarm = swarm.with_task(task);
            store.save_swarm(&swarm)?;
        }
        Command::Close { swarm_id, task_id } => {
            store.set_task_status(&swarm_id, &TaskId::new(task_id), TaskStatus::Closed)?;
        }
        Command::Status { swarm_id } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            print!("{}", manager.status(&swarm_id)?);
        }
        Command::Waves { swarm_id } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            for (i, wave) in manager.waves(&swarm_id)?.iter().enumerate() {
                let ids: Vec<&str> = wave.iter().map(|t| t.id.as_str()).collect();
                println!("Wave {}: {}", i + 1, ids.join(", "));
            }
        }
        Command::CreateBranch { swarm_id } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            manager.create_integration_branch(&swarm_id)?;
            println!("{}", manager.get_integration_branch(&swarm_id)?);
        }
        Command::Merge {
            swarm_id,
            worker_branch,
        } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            match manager.merge_to_integration(&swarm_id, &worker_branch) {
                Ok(()) => println!("merged {}", worker_branch),
                Err(Error::Git(e)) => {
                    let files = manager.conflicting_files().unwrap_or_default();
                    if !files.is_empty() {
                        println!("CONFLICT merging {}:", worker_branch);
                        for file in files {
                            println!("  {}", file);
                        }
                        println!("Resolve and commit, or run `swarm abort`.");
                    }
                    return Err(Error::Git(e));
                }
                Err(e) => return Err(e),
            }
        }
        Command::Land { swarm_id } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            manager.land_to_main(&swarm_id)?;
            println!("landed {}", swarm_id);
        }
        Command::Abort => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            manager.abort_merge()?;
        }
        Command::Cleanup { swarm_id } => {
            let manager = SwarmManager::open(&repo, store, &config)?;
            let report = manager.cleanup_report(&swarm_id)?;
            for step in report.ignored() {
                println!("warning: {} {} failed (ignored)", step.action, step.branch);
            }
            report.into_result()?;
        }
        Command::WorkerBranch {
            swarm_id,
            worker,
            task_id,
        } => {
            println!(
                "{}",
                swarm::core::worker_branch_name(&swarm_id, &worker, &task_id)
            );
        }
    }
    Ok(())
}

/// Resolve a revision to a full commit id.
fn resolve_commit(repo: &Path, rev: &str) -> Result<String> {
    let repository = git2::Repository::open(repo)?;
    let commit = repository.revparse_single(rev)?.peel_to_commit()?;
    Ok(commit.id().to_string())
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
