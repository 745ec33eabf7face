use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::io::git::{GitError, GitRepository};
use crate::io::package_io::{self, SpecIoError};
use crate::model::patch::{PatchError, PatchSeries};
use crate::model::spec::{SpecError, SpecFile};
use crate::ops::patch_ops::collect_patch_info;
use crate::ops::spec_ops::{PatchCommands, update_patch_series};
use crate::parse::mail_header::MailInfo;

/// `Gbp: Ignore`, `Gbp-Rpm: If <cond>` and friends in a commit message
static GBP_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^gbp(?:[-_]rpm)?:\s*(\S+)(?:\s+(.*?))?\s*$").unwrap());

const MAX_SLUG_LEN: usize = 52;

/// Error type for patch-queue workflows
#[derive(Debug, thiserror::Error)]
pub enum PqError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    SpecIo(#[from] SpecIoError),
    #[error("could not remove old patch {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("patch {0} has no metadata")]
    MissingInfo(PathBuf),
}

/// Patches written by [`export_patches`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedPatches {
    /// File names in application order
    pub names: Vec<String>,
    /// Conditional commands taken from the commit messages
    pub commands: PatchCommands,
}

/// Split a commit message into gbp commands and the remaining text
fn extract_commands(message: &str) -> (IndexMap<String, String>, String) {
    let mut commands = IndexMap::new();
    let mut rest = Vec::new();
    for line in message.lines() {
        match GBP_COMMAND.captures(line) {
            Some(caps) => {
                let cmd = caps[1].to_lowercase();
                let args = caps.get(2).map_or("", |m| m.as_str()).to_string();
                tracing::debug!("found gbp command '{}' with args '{}'", cmd, args);
                commands.insert(cmd, args);
            }
            None => rest.push(line),
        }
    }
    (commands, rest.join("\n"))
}

/// Remove gbp command lines from the message part of a formatted patch
fn strip_command_lines(patch: &str) -> String {
    let mut out = String::with_capacity(patch.len());
    let mut in_message = true;
    for line in patch.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if bare == "---" || bare.starts_with("diff ") {
            in_message = false;
        }
        if in_message && GBP_COMMAND.is_match(bare) {
            continue;
        }
        out.push_str(line);
    }
    out
}

/// File name stem for a patch, the way `git format-patch` builds one
fn patch_slug(subject: &str) -> String {
    let mut slug = String::new();
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_matches(['-', '.']).to_string();
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches(['-', '.']);
    if slug.is_empty() {
        "patch".to_string()
    } else {
        slug.to_string()
    }
}

/// Write every commit in `base..head` as a patch file in `out_dir`.
///
/// Commits marked `Gbp: Ignore` are skipped. `Gbp-Rpm: If` and
/// `Gbp-Rpm: IfArch` lines are dropped from the written patch and returned
/// as commands for [`update_patch_series`].
pub fn export_patches(
    repo: &dyn GitRepository,
    base: &str,
    head: &str,
    out_dir: &Path,
) -> Result<ExportedPatches, PqError> {
    let mut exported = ExportedPatches::default();
    for commit in repo.commits_between(base, head)? {
        let info = repo.commit_info(&commit)?;
        let (commands, _) = extract_commands(&info.body);
        if commands.contains_key("ignore") {
            tracing::info!("ignoring commit {} ({})", commit, info.subject);
            continue;
        }

        let name = format!("{:04}-{}.patch", exported.names.len() + 1, patch_slug(&info.subject));
        let text = strip_command_lines(&repo.format_patch(&commit)?);
        package_io::write_text(&out_dir.join(&name), &text)?;
        tracing::debug!("exported {} as {}", commit, name);

        let conditions: IndexMap<String, String> = commands
            .into_iter()
            .filter(|(cmd, _)| matches!(cmd.as_str(), "if" | "ifarch"))
            .collect();
        if !conditions.is_empty() {
            exported.commands.insert(name.clone(), conditions);
        }
        exported.names.push(name);
    }
    Ok(exported)
}

/// Replace the patches of a spec file with the commits in `base..head`.
///
/// Files of the old, non-ignored patches are deleted from the spec
/// directory before the new ones are written. Returns the new patch names.
pub fn export_to_spec(
    repo: &dyn GitRepository,
    spec: &mut SpecFile,
    base: &str,
    head: &str,
) -> Result<Vec<String>, PqError> {
    let old = spec.patchseries(true, false)?;
    for patch in old.iter() {
        match fs::remove_file(&patch.path) {
            Ok(()) => tracing::debug!("removed old patch {}", patch.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PqError::Remove {
                    path: patch.path.clone(),
                    source,
                });
            }
        }
    }

    let exported = export_patches(repo, base, head, &spec.spec_dir)?;
    update_patch_series(spec, &exported.names, &exported.commands)?;
    Ok(exported.names)
}

/// Apply a patch series as one commit per patch.
///
/// Metadata of the whole series is collected before anything is applied,
/// so a broken patch file leaves the repository untouched. Returns the new
/// commit ids.
pub fn import_series(
    repo: &dyn GitRepository,
    series: &mut PatchSeries,
    mailinfo: &dyn MailInfo,
) -> Result<Vec<String>, PqError> {
    collect_patch_info(series, mailinfo)?;
    let mut commits = Vec::with_capacity(series.len());
    for patch in series.iter() {
        let Some(info) = patch.parsed_info() else {
            return Err(PqError::MissingInfo(patch.path.clone()));
        };
        tracing::info!("applying {}", patch.file_name());
        commits.push(repo.apply_patch(&patch.path, patch.strip, info)?);
    }
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::git::CommitInfo;
    use crate::model::patch::{Patch, PatchInfo};
    use crate::parse::mail_header::MailparseInfo;
    use crate::parse::spec_parser::parse_spec;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRepo {
        commits: Vec<CommitInfo>,
        applied: RefCell<Vec<(PathBuf, Option<u32>, PatchInfo)>>,
    }

    impl FakeRepo {
        fn with_commit(mut self, subject: &str, body: &str) -> Self {
            self.commits.push(CommitInfo {
                id: format!("c{}", self.commits.len() + 1),
                author: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                date: "Tue, 2 Jan 2024 10:00:00 +0100".to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            self
        }

        fn find(&self, commit: &str) -> Result<&CommitInfo, GitError> {
            self.commits
                .iter()
                .find(|c| c.id == commit)
                .ok_or_else(|| GitError::Output {
                    args: format!("show {}", commit),
                    output: String::new(),
                })
        }
    }

    impl GitRepository for FakeRepo {
        fn commits_between(&self, _base: &str, _head: &str) -> Result<Vec<String>, GitError> {
            Ok(self.commits.iter().map(|c| c.id.clone()).collect())
        }

        fn show(&self, object: &str) -> Result<String, GitError> {
            Err(GitError::Output {
                args: format!("show {}", object),
                output: String::new(),
            })
        }

        fn commit_dir(&self, _dir: &Path, _message: &str, _parent: Option<&str>) -> Result<String, GitError> {
            Ok("tree-commit".to_string())
        }

        fn create_tag(&self, _name: &str, _message: &str, _commit: &str) -> Result<(), GitError> {
            Ok(())
        }

        fn format_patch(&self, commit: &str) -> Result<String, GitError> {
            let c = self.find(commit)?;
            let mut message = c.subject.clone();
            if !c.body.is_empty() {
                message.push_str("\n\n");
                message.push_str(&c.body);
            }
            Ok(format!(
                "From {} Mon Sep 17 00:00:00 2001\nFrom: {} <{}>\nDate: {}\nSubject: [PATCH] {}\n---\n a.c | 1 +\n\ndiff --git a/a.c b/a.c\n",
                c.id, c.author, c.email, c.date, message
            ))
        }

        fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError> {
            self.find(commit).cloned()
        }

        fn apply_patch(&self, patch: &Path, strip: Option<u32>, info: &PatchInfo) -> Result<String, GitError> {
            let mut applied = self.applied.borrow_mut();
            applied.push((patch.to_path_buf(), strip, info.clone()));
            Ok(format!("applied{}", applied.len()))
        }
    }

    #[test]
    fn test_extract_commands() {
        let (commands, rest) = extract_commands("Some text\nGbp-Rpm: IfArch x86_64\ngbp: ignore\nmore");
        assert_eq!(rest, "Some text\nmore");
        assert_eq!(commands.get("ifarch").map(String::as_str), Some("x86_64"));
        assert_eq!(commands.get("ignore").map(String::as_str), Some(""));
    }

    #[test]
    fn test_patch_slug() {
        assert_eq!(patch_slug("Fix the build: use -O2"), "Fix-the-build-use-O2");
        assert_eq!(patch_slug("  [rpm] spec.in update.  "), "rpm-spec.in-update");
        assert_eq!(patch_slug("???"), "patch");
        assert_eq!(patch_slug(&"a".repeat(80)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_strip_command_lines_keeps_diff() {
        let patch = "Subject: x\n\nGbp-Rpm: If 0%{?fedora}\nbody\n---\n+Gbp: Ignore\n";
        assert_eq!(strip_command_lines(patch), "Subject: x\n\nbody\n---\n+Gbp: Ignore\n");
    }

    #[test]
    fn test_export_patches() {
        let tmp = TempDir::new().unwrap();
        let repo = FakeRepo::default()
            .with_commit("Fix the build", "")
            .with_commit("Local hack", "Gbp: Ignore")
            .with_commit("Only on x86", "Needed for SSE.\nGbp-Rpm: IfArch x86_64");

        let exported = export_patches(&repo, "base", "HEAD", tmp.path()).unwrap();
        assert_eq!(exported.names, vec!["0001-Fix-the-build.patch", "0002-Only-on-x86.patch"]);
        assert_eq!(exported.commands.len(), 1);
        assert_eq!(
            exported.commands["0002-Only-on-x86.patch"].get("ifarch").map(String::as_str),
            Some("x86_64")
        );

        let written = fs::read_to_string(tmp.path().join("0002-Only-on-x86.patch")).unwrap();
        assert!(written.contains("Needed for SSE."));
        assert!(!written.contains("Gbp-Rpm"));
        assert!(!tmp.path().join("0002-Local-hack.patch").exists());
    }

    #[test]
    fn test_export_to_spec() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("old.patch"), "old").unwrap();
        fs::write(tmp.path().join("keep.patch"), "kept").unwrap();
        let mut spec = parse_spec(
            "Name: hello\n\
             # gbp-ignore-patches: 0\n\
             Patch0: keep.patch\n\
             Patch1: old.patch\n\
             \n\
             %prep\n\
             %setup -q\n\
             %patch0 -p1\n\
             %patch1 -p1\n",
        );
        spec.spec_dir = tmp.path().to_path_buf();
        let repo = FakeRepo::default()
            .with_commit("New fix", "")
            .with_commit("Fedora only", "Gbp-Rpm: If 0%{?fedora}");

        let names = export_to_spec(&repo, &mut spec, "base", "HEAD").unwrap();
        assert_eq!(names, vec!["0001-New-fix.patch", "0002-Fedora-only.patch"]);
        assert!(!tmp.path().join("old.patch").exists());
        assert!(tmp.path().join("keep.patch").exists());
        assert_snapshot!(spec.to_string(), @r"
        Name: hello
        # gbp-ignore-patches: 0
        Patch0: keep.patch
        # Patches auto-generated by git-buildpackage:
        Patch1:     0001-New-fix.patch
        Patch2:     0002-Fedora-only.patch

        %prep
        %setup -q
        %patch0 -p1
        # 0001-New-fix.patch
        %patch1 -p1
        # 0002-Fedora-only.patch
        %if 0%{?fedora}
        %patch2 -p1
        %endif
        ");
    }

    #[test]
    fn test_import_series() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("0001-first.patch");
        fs::write(
            &first,
            "From: Jane Doe <jane@example.com>\nSubject: [PATCH] First change\n\nWhy it matters.\n---\ndiff --git a/a b/a\n",
        )
        .unwrap();
        let second = tmp.path().join("second.patch");
        fs::write(&second, "--- a/b\n+++ b/b\n").unwrap();

        let mut series = PatchSeries::new();
        series.push(Patch::new(&first, None, Some(1)));
        series.push(Patch::new(&second, None, Some(0)));
        let repo = FakeRepo::default();

        let commits = import_series(&repo, &mut series, &MailparseInfo).unwrap();
        assert_eq!(commits, vec!["applied1", "applied2"]);

        let applied = repo.applied.borrow();
        assert_eq!(applied[0].0, first);
        assert_eq!(applied[0].1, Some(1));
        assert_eq!(applied[0].2.subject, "First change");
        assert_eq!(applied[0].2.long_desc, "Why it matters.");
        assert_eq!(applied[0].2.author.as_deref(), Some("Jane Doe"));
        assert_eq!(applied[1].2.subject, "second");
        assert_eq!(applied[1].1, Some(0));
    }

    #[test]
    fn test_import_aborts_before_applying() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.patch");
        fs::write(&good, "--- a/b\n+++ b/b\n").unwrap();
        let mut series = PatchSeries::new();
        series.push(Patch::new(&good, None, None));
        series.push(Patch::new(tmp.path().join("missing.patch"), None, None));
        let repo = FakeRepo::default();

        let err = import_series(&repo, &mut series, &MailparseInfo).unwrap_err();
        assert!(matches!(err, PqError::Patch(PatchError::Batch { .. })));
        assert!(repo.applied.borrow().is_empty());
    }
}
