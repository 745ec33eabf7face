use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::io::command::{CommandError, CommandOutput, run_command};
use crate::model::patch::PatchInfo;

/// Error type for git operations
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {args} failed: {source}")]
    Command { args: String, source: CommandError },
    #[error("unexpected output from git {args}: {output}")]
    Output { args: String, output: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata of a single commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub author: String,
    pub email: String,
    /// RFC 2822 author date
    pub date: String,
    pub subject: String,
    pub body: String,
}

/// The repository operations patch-queue workflows need
pub trait GitRepository {
    /// Commits reachable from `head` but not `base`, oldest first
    fn commits_between(&self, base: &str, head: &str) -> Result<Vec<String>, GitError>;
    /// Content of an object, e.g. `HEAD:hello.spec`
    fn show(&self, object: &str) -> Result<String, GitError>;
    /// Commit the content of `dir` as a tree and return the commit id
    fn commit_dir(&self, dir: &Path, message: &str, parent: Option<&str>) -> Result<String, GitError>;
    fn create_tag(&self, name: &str, message: &str, commit: &str) -> Result<(), GitError>;
    /// A commit rendered as a mail-formatted patch
    fn format_patch(&self, commit: &str) -> Result<String, GitError>;
    fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError>;
    /// Apply a patch to the work tree and index and commit it with the
    /// patch's metadata. Returns the new commit id.
    fn apply_patch(&self, patch: &Path, strip: Option<u32>, info: &PatchInfo) -> Result<String, GitError>;
}

/// [`GitRepository`] backed by the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    pub dir: PathBuf,
    env: Vec<(String, String)>,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        GitCli {
            dir: dir.into(),
            env: Vec::new(),
        }
    }

    /// Extra environment passed to every git invocation
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    fn git(&self, args: &[&str], extra_env: &[(&str, &str)]) -> Result<CommandOutput, GitError> {
        self.git_in(&self.dir, args, extra_env)
    }

    fn git_in(&self, cwd: &Path, args: &[&str], extra_env: &[(&str, &str)]) -> Result<CommandOutput, GitError> {
        let mut env: Vec<(&str, &str)> = self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        env.extend_from_slice(extra_env);
        run_command("git", args, Some(cwd), &env).map_err(|source| GitError::Command {
            args: args.join(" "),
            source,
        })
    }

    fn git_line(&self, args: &[&str], extra_env: &[(&str, &str)]) -> Result<String, GitError> {
        let out = self.git(args, extra_env)?;
        let line = out.stdout.trim();
        if line.is_empty() {
            return Err(GitError::Output {
                args: args.join(" "),
                output: out.stdout,
            });
        }
        Ok(line.to_string())
    }
}

impl GitRepository for GitCli {
    fn commits_between(&self, base: &str, head: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{}..{}", base, head);
        let out = self.git(&["rev-list", "--reverse", &range], &[])?;
        Ok(out.stdout.lines().map(str::to_string).collect())
    }

    fn show(&self, object: &str) -> Result<String, GitError> {
        Ok(self.git(&["show", object], &[])?.stdout)
    }

    fn commit_dir(&self, dir: &Path, message: &str, parent: Option<&str>) -> Result<String, GitError> {
        let git_dir = self.git_line(&["rev-parse", "--absolute-git-dir"], &[])?;
        let index_dir = TempDir::new()?;
        let index_path = index_dir.path().join("index").to_string_lossy().into_owned();
        let work_tree = dir.to_string_lossy().into_owned();
        let env = [("GIT_INDEX_FILE", index_path.as_str())];

        self.git_in(
            dir,
            &["--git-dir", &git_dir, "--work-tree", &work_tree, "add", "-A", "."],
            &env,
        )?;
        let tree = self.git_line(&["write-tree"], &env)?;
        let mut args = vec!["commit-tree", tree.as_str(), "-m", message];
        if let Some(parent) = parent {
            args.extend(["-p", parent]);
        }
        self.git_line(&args, &[])
    }

    fn create_tag(&self, name: &str, message: &str, commit: &str) -> Result<(), GitError> {
        self.git(&["tag", "-a", name, "-m", message, commit], &[])?;
        Ok(())
    }

    fn format_patch(&self, commit: &str) -> Result<String, GitError> {
        let out = self.git(
            &["format-patch", "-1", "--stdout", "--no-signature", "--keep-subject", commit],
            &[],
        )?;
        Ok(out.stdout)
    }

    fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError> {
        let args = ["show", "-s", "--format=%H%x00%an%x00%ae%x00%aD%x00%s%x00%b", commit];
        let out = self.git(&args, &[])?;
        let mut parts = out.stdout.splitn(6, '\0');
        let mut next = || parts.next().unwrap_or("").to_string();
        let info = CommitInfo {
            id: next(),
            author: next(),
            email: next(),
            date: next(),
            subject: next(),
            body: next().trim().to_string(),
        };
        if info.id.is_empty() {
            return Err(GitError::Output {
                args: args.join(" "),
                output: out.stdout,
            });
        }
        Ok(info)
    }

    fn apply_patch(&self, patch: &Path, strip: Option<u32>, info: &PatchInfo) -> Result<String, GitError> {
        let strip_arg = format!("-p{}", strip.unwrap_or(1));
        let patch_arg = std::path::absolute(patch)?.to_string_lossy().into_owned();
        self.git(&["apply", "--index", &strip_arg, &patch_arg], &[])?;

        let mut message = info.subject.clone();
        if !info.long_desc.is_empty() {
            message.push_str("\n\n");
            message.push_str(&info.long_desc);
        }
        let mut env = Vec::new();
        if let Some(author) = &info.author {
            env.push(("GIT_AUTHOR_NAME", author.as_str()));
        }
        if let Some(email) = &info.email {
            env.push(("GIT_AUTHOR_EMAIL", email.as_str()));
        }
        if let Some(date) = &info.date {
            env.push(("GIT_AUTHOR_DATE", date.as_str()));
        }
        self.git(&["commit", "--quiet", "--no-verify", "-m", &message], &env)?;
        self.git_line(&["rev-parse", "HEAD"], &[])
    }
}
