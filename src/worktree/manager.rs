//! WorktreeManager handles git worktree operations for stage isolation.

use std::path::{Path, PathBuf};

use crate::config::{GitConfig, ProjectConfig};
use crate::domain::Stage;
use crate::error::{OrchestratorError, Result};
use crate::exec;
use crate::worktree::LAUNCH_SCRIPT;

/// Repository root and project name, resolved once at construction and
/// immutable for the orchestrator's lifetime.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Root of the main git repository
    pub repo_root: PathBuf,
    /// Project name from `.workflow-config.json` or the directory name
    pub project_name: String,
}

impl ProjectContext {
    /// Resolve the repository root from a starting directory.
    ///
    /// Not being inside a git repository is fatal and surfaced
    /// immediately.
    pub async fn discover(start_dir: &Path, timeout_ms: u64) -> Result<Self> {
        let out = exec::run(
            "git",
            &["rev-parse", "--show-toplevel"],
            Some(start_dir),
            timeout_ms,
        )
        .await?;

        if !out.success {
            return Err(OrchestratorError::NotARepository(start_dir.display().to_string()));
        }

        let repo_root = PathBuf::from(out.stdout.trim());
        let project_name = ProjectConfig::load(&repo_root).project_name;

        Ok(Self { repo_root, project_name })
    }

    /// The worktrees root: a sibling directory `{project}-worktrees`
    pub fn worktrees_root(&self) -> PathBuf {
        let dir_name = format!("{}-worktrees", self.project_name);
        match self.repo_root.parent() {
            Some(parent) => parent.join(dir_name),
            None => self.repo_root.join(dir_name),
        }
    }
}

/// One entry from `git worktree list --porcelain`
#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
}

/// Category of one pending change in a worktree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Untracked,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Untracked => "untracked",
        }
    }
}

/// One line of `git status --porcelain`, categorized
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub kind: ChangeKind,
    pub path: String,
}

/// Manages git worktrees, one per workflow stage.
#[derive(Debug)]
pub struct WorktreeManager {
    context: ProjectContext,
    worktrees_root: PathBuf,
    command_timeout_ms: u64,
    status_timeout_ms: u64,
}

impl WorktreeManager {
    pub fn new(context: ProjectContext, git: &GitConfig) -> Self {
        let worktrees_root = context.worktrees_root();
        Self {
            context,
            worktrees_root,
            command_timeout_ms: git.command_timeout_ms,
            status_timeout_ms: git.status_timeout_ms,
        }
    }

    /// Get the worktree path for a stage.
    pub fn path(&self, stage: Stage) -> PathBuf {
        self.worktrees_root.join(stage.as_str())
    }

    /// Check if a stage's worktree exists on disk.
    pub fn exists(&self, stage: Stage) -> bool {
        self.path(stage).exists()
    }

    /// The project name this manager was constructed for.
    pub fn project_name(&self) -> &str {
        &self.context.project_name
    }

    /// The main repository root.
    pub fn repo_root(&self) -> &Path {
        &self.context.repo_root
    }

    /// The directory all stage worktrees live under.
    pub fn worktrees_root(&self) -> &Path {
        &self.worktrees_root
    }

    async fn git(&self, args: &[&str], cwd: &Path) -> Result<exec::ExecOutput> {
        exec::run("git", args, Some(cwd), self.command_timeout_ms).await
    }

    /// Create (or recreate) the worktree for a stage on branch
    /// `{stage}/{name}`.
    ///
    /// Idempotent: an existing worktree at the target path is removed
    /// first, via `git worktree remove --force` with a forced filesystem
    /// delete as fallback. A branch-exists failure retries by attaching
    /// the existing branch. Creation is verified against the worktree
    /// list before returning.
    pub async fn create(&self, stage: Stage, name: &str) -> Result<WorktreeEntry> {
        let path = self.path(stage);
        let branch = stage.branch_name(name);

        std::fs::create_dir_all(&self.worktrees_root)
            .map_err(|e| OrchestratorError::Worktree(format!("Failed to create worktrees root: {}", e)))?;

        if path.exists() {
            self.remove_existing(&path).await?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| OrchestratorError::Worktree(format!("Invalid worktree path: {}", path.display())))?;

        let out = self
            .git(&["worktree", "add", path_str, "-b", &branch], &self.context.repo_root)
            .await?;

        if !out.success {
            if out.stderr.contains("already exists") {
                // Branch collision: attach the existing branch instead
                tracing::info!(branch = %branch, "Branch exists, attaching worktree to it");
                let retry = self
                    .git(&["worktree", "add", path_str, &branch], &self.context.repo_root)
                    .await?;
                if !retry.success {
                    return Err(OrchestratorError::Worktree(format!(
                        "Failed to attach worktree to branch {}: {}",
                        branch,
                        retry.stderr.trim()
                    )));
                }
            } else {
                return Err(OrchestratorError::Worktree(format!(
                    "Failed to create worktree: {}",
                    out.stderr.trim()
                )));
            }
        }

        self.write_launch_script(&path, stage, name, &branch)?;

        // Re-query the worktree list; a missing entry is a creation
        // failure for this stage.
        let entry = self
            .list()
            .await?
            .into_iter()
            .find(|e| e.path == path)
            .ok_or_else(|| {
                OrchestratorError::Worktree(format!(
                    "Worktree {} not present in list after creation",
                    path.display()
                ))
            })?;

        tracing::info!(stage = %stage, branch = %branch, path = %path.display(), "Created worktree");
        Ok(entry)
    }

    async fn remove_existing(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        let out = self
            .git(&["worktree", "remove", "--force", &path_str], &self.context.repo_root)
            .await?;

        if !out.success {
            tracing::warn!(
                path = %path.display(),
                error = %out.stderr.trim(),
                "git worktree remove failed, falling back to filesystem delete"
            );
            std::fs::remove_dir_all(path)
                .map_err(|e| OrchestratorError::Worktree(format!("Failed to delete stale worktree: {}", e)))?;
            // Clear the stale registration so the add below can reuse the path
            let _ = self.git(&["worktree", "prune"], &self.context.repo_root).await;
        }
        Ok(())
    }

    fn write_launch_script(&self, path: &Path, stage: Stage, name: &str, branch: &str) -> Result<()> {
        let sq = |s: &str| s.replace('\'', r#"'\''"#);
        let script = format!(
            "#!/bin/sh\n\
             # Launch helper for the {stage} worktree.\n\
             WORKTREE_TYPE='{stage}'\n\
             FEATURE_NAME='{name}'\n\
             BRANCH='{branch}'\n\
             export WORKTREE_TYPE FEATURE_NAME BRANCH\n\
             cd \"$(dirname \"$0\")\" || exit 1\n\
             exec \"${{@:-$SHELL}}\"\n",
            stage = stage,
            name = sq(name),
            branch = sq(branch),
        );

        let script_path = path.join(LAUNCH_SCRIPT);
        std::fs::write(&script_path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(())
    }

    /// Parsed `git worktree list --porcelain` inventory.
    pub async fn list(&self) -> Result<Vec<WorktreeEntry>> {
        let out = self
            .git(&["worktree", "list", "--porcelain"], &self.context.repo_root)
            .await?;
        let stdout = out.into_stdout(|e| OrchestratorError::Git(format!("worktree list failed: {}", e)))?;
        Ok(parse_worktree_list(&stdout))
    }

    /// Stage worktrees only (entries under the worktrees root).
    pub async fn stage_entries(&self) -> Result<Vec<WorktreeEntry>> {
        let entries = self.list().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.path.starts_with(&self.worktrees_root))
            .collect())
    }

    /// Human-readable `git worktree list` output for status reports.
    pub async fn raw_listing(&self) -> Result<String> {
        let out = self.git(&["worktree", "list"], &self.context.repo_root).await?;
        out.into_stdout(|e| OrchestratorError::Git(format!("worktree list failed: {}", e)))
    }

    /// Remove every stage worktree and the worktrees root itself.
    ///
    /// Tolerant of partial or missing state: a no-op when nothing exists.
    pub async fn remove_all(&self) -> Result<()> {
        for stage in Stage::ALL {
            let path = self.path(stage);
            if path.exists() {
                let path_str = path.to_string_lossy();
                let out = self
                    .git(&["worktree", "remove", "--force", &path_str], &self.context.repo_root)
                    .await?;
                if !out.success {
                    tracing::warn!(
                        stage = %stage,
                        error = %out.stderr.trim(),
                        "Failed to remove worktree, continuing"
                    );
                }
            }
        }

        if self.worktrees_root.exists() {
            std::fs::remove_dir_all(&self.worktrees_root)?;
        }
        let _ = self.git(&["worktree", "prune"], &self.context.repo_root).await;
        Ok(())
    }

    /// Categorized pending changes for a stage's worktree.
    pub async fn pending_changes(&self, stage: Stage) -> Result<Vec<PendingChange>> {
        let path = self.path(stage);
        if !path.exists() {
            return Err(OrchestratorError::WorktreeNotFound(stage.to_string()));
        }

        let out = exec::run("git", &["status", "--porcelain"], Some(&path), self.status_timeout_ms).await?;
        let stdout = out.into_stdout(|e| OrchestratorError::Git(format!("status failed: {}", e)))?;
        Ok(parse_status_porcelain(&stdout))
    }

    /// Current branch checked out in a stage's worktree.
    pub async fn current_branch(&self, stage: Stage) -> Result<String> {
        let path = self.path(stage);
        if !path.exists() {
            return Err(OrchestratorError::WorktreeNotFound(stage.to_string()));
        }

        let out = self.git(&["rev-parse", "--abbrev-ref", "HEAD"], &path).await?;
        let stdout = out.into_stdout(|e| OrchestratorError::Git(format!("rev-parse failed: {}", e)))?;
        Ok(stdout.trim().to_string())
    }

    /// One-line commit subjects in a stage's worktree since a git
    /// approxidate (e.g. "1 hour ago").
    pub async fn recent_commits(&self, stage: Stage, since: &str) -> Result<Vec<String>> {
        let path = self.path(stage);
        if !path.exists() {
            return Err(OrchestratorError::WorktreeNotFound(stage.to_string()));
        }

        let out = exec::run(
            "git",
            &["log", "--oneline", "--since", since],
            Some(&path),
            self.status_timeout_ms,
        )
        .await?;
        let stdout = out.into_stdout(|e| OrchestratorError::Git(format!("log failed: {}", e)))?;
        Ok(stdout.lines().map(|l| l.to_string()).collect())
    }

    /// Best-effort merge of a branch into a stage's worktree before a
    /// chained agent starts there. Failure is logged, never an error:
    /// the stage still runs against whatever it has.
    pub async fn sync_from_branch(&self, stage: Stage, branch: &str) -> Result<()> {
        let path = self.path(stage);
        if !path.exists() {
            return Err(OrchestratorError::WorktreeNotFound(stage.to_string()));
        }

        let out = self.git(&["merge", "--no-edit", branch], &path).await?;
        if !out.success {
            tracing::warn!(
                stage = %stage,
                branch = %branch,
                error = %out.stderr.trim(),
                "Best-effort sync failed"
            );
            // Leave the worktree usable if the merge stopped half-way
            let _ = self.git(&["merge", "--abort"], &path).await;
        }
        Ok(())
    }

    /// Merge a stage worktree's current branch into `target_branch` in
    /// the main repository. Conflicts surface as an error carrying git's
    /// output; nothing is auto-resolved.
    pub async fn integrate(&self, stage: Stage, target_branch: &str) -> Result<String> {
        let branch = self.current_branch(stage).await?;

        let checkout = self.git(&["checkout", target_branch], &self.context.repo_root).await?;
        if !checkout.success {
            return Err(OrchestratorError::Git(format!(
                "Failed to checkout {}: {}",
                target_branch,
                checkout.stderr.trim()
            )));
        }

        let merge = self
            .git(&["merge", "--no-edit", &branch], &self.context.repo_root)
            .await?;
        if !merge.success {
            return Err(OrchestratorError::Git(format!(
                "Merge of {} into {} failed: {}{}",
                branch,
                target_branch,
                merge.stdout.trim(),
                merge.stderr.trim()
            )));
        }

        tracing::info!(branch = %branch, target = %target_branch, "Integrated changes");
        Ok(format!("Merged {} into {}", branch, target_branch))
    }
}

fn parse_worktree_list(porcelain: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut head = String::new();
    let mut branch: Option<String> = None;

    for line in porcelain.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if let Some(p) = path.take() {
                entries.push(WorktreeEntry {
                    path: p,
                    head: std::mem::take(&mut head),
                    branch: branch.take(),
                });
            }
        } else if let Some(p) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(p));
        } else if let Some(h) = line.strip_prefix("HEAD ") {
            head = h.to_string();
        } else if let Some(b) = line.strip_prefix("branch ") {
            branch = Some(b.trim_start_matches("refs/heads/").to_string());
        }
    }

    entries
}

fn parse_status_porcelain(output: &str) -> Vec<PendingChange> {
    let mut changes = Vec::new();
    for line in output.lines() {
        if line.len() < 3 {
            continue;
        }
        let code = &line[..2];
        let path = line[3..].to_string();
        let kind = if code == "??" {
            ChangeKind::Untracked
        } else if code.contains('A') {
            ChangeKind::Added
        } else if code.contains('D') {
            ChangeKind::Deleted
        } else {
            ChangeKind::Modified
        };
        changes.push(PendingChange { kind, path });
    }
    changes
}
