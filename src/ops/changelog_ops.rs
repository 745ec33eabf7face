use crate::io::git::{GitError, GitRepository};
use crate::model::changelog::{Changelog, ChangelogEntry, ChangelogHeader, ChangelogSection};
use crate::model::spec::{SpecError, SpecFile};
use crate::ops::spec_ops::set_section;
use crate::parse::changelog_parser::{ChangelogError, ChangelogPolicy, parse_changelog};
use crate::parse::changelog_serializer::serialize_changelog;

/// Error type for changelog updates
#[derive(Debug, thiserror::Error)]
pub enum ChangelogUpdateError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Changelog(#[from] ChangelogError),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// One entry per commit subject in `base..head`, newest first
pub fn entries_from_commits(
    repo: &dyn GitRepository,
    base: &str,
    head: &str,
    bullet: &str,
) -> Result<Vec<ChangelogEntry>, GitError> {
    let mut entries = Vec::new();
    for commit in repo.commits_between(base, head)?.iter().rev() {
        let info = repo.commit_info(commit)?;
        entries.push(ChangelogEntry::new(None, &format!("{} {}", bullet, info.subject)));
    }
    Ok(entries)
}

/// Prepend a section holding `entries`
pub fn add_release(
    changelog: &mut Changelog,
    header: ChangelogHeader,
    entries: Vec<ChangelogEntry>,
) -> &mut ChangelogSection {
    let section = changelog.add_section(header);
    for entry in entries {
        section.append_entry(entry);
    }
    section
}

/// Prepend a release to changelog text. Older sections are kept verbatim.
pub fn add_release_to_text(
    text: &str,
    policy: &ChangelogPolicy,
    header: ChangelogHeader,
    entries: Vec<ChangelogEntry>,
) -> Result<String, ChangelogError> {
    let mut changelog = parse_changelog(text.trim_start(), policy)?;
    add_release(&mut changelog, header, entries);
    serialize_changelog(&changelog, policy)
}

/// Prepend a release to the `%changelog` section of a spec file, creating
/// the section if there is none.
pub fn update_spec_changelog(
    spec: &mut SpecFile,
    policy: &ChangelogPolicy,
    header: ChangelogHeader,
    entries: Vec<ChangelogEntry>,
) -> Result<(), ChangelogUpdateError> {
    let current = spec.get_section("changelog").unwrap_or_default();
    let text = add_release_to_text(&current, policy, header, entries)?;
    set_section(spec, "changelog", text.trim_end())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::git::CommitInfo;
    use crate::model::patch::PatchInfo;
    use crate::parse::spec_parser::parse_spec;
    use chrono::{FixedOffset, TimeZone};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    struct History(Vec<&'static str>);

    impl GitRepository for History {
        fn commits_between(&self, _base: &str, _head: &str) -> Result<Vec<String>, GitError> {
            Ok((0..self.0.len()).map(|i| i.to_string()).collect())
        }

        fn show(&self, _object: &str) -> Result<String, GitError> {
            Ok(String::new())
        }

        fn commit_dir(&self, _dir: &Path, _message: &str, _parent: Option<&str>) -> Result<String, GitError> {
            Ok(String::new())
        }

        fn create_tag(&self, _name: &str, _message: &str, _commit: &str) -> Result<(), GitError> {
            Ok(())
        }

        fn format_patch(&self, _commit: &str) -> Result<String, GitError> {
            Ok(String::new())
        }

        fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError> {
            let index: usize = commit.parse().map_err(|_| GitError::Output {
                args: commit.to_string(),
                output: String::new(),
            })?;
            Ok(CommitInfo {
                id: commit.to_string(),
                subject: self.0[index].to_string(),
                ..CommitInfo::default()
            })
        }

        fn apply_patch(&self, _patch: &Path, _strip: Option<u32>, _info: &PatchInfo) -> Result<String, GitError> {
            Ok(String::new())
        }
    }

    fn header(revision: &str) -> ChangelogHeader {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
            .unwrap();
        ChangelogHeader::new(time)
            .with_field("name", "Jane Doe")
            .with_field("email", "jane@example.com")
            .with_field("revision", revision)
    }

    #[test]
    fn test_entries_newest_first() {
        let repo = History(vec!["Oldest change", "Newest change"]);
        let entries = entries_from_commits(&repo, "v1", "HEAD", "-").unwrap();
        let texts: Vec<String> = entries.iter().map(ChangelogEntry::text).collect();
        assert_eq!(texts, vec!["- Newest change", "- Oldest change"]);
    }

    #[test]
    fn test_add_release_prepends() {
        let mut changelog = Changelog::new();
        add_release(&mut changelog, header("1.0-1"), vec![]);
        let section = add_release(
            &mut changelog,
            header("1.0-2"),
            vec![ChangelogEntry::new(None, "- Update")],
        );
        assert_eq!(section.entries.len(), 1);
        assert_eq!(changelog.sections.len(), 2);
        assert_eq!(changelog.sections[0].header.field("revision"), Some("1.0-2"));
    }

    #[test]
    fn test_update_existing_spec_changelog() {
        let mut spec = parse_spec(
            "Name: hello\n\
             \n\
             %changelog\n\
             * Mon Jan 01 2024 Jane Doe <jane@example.com> - 1.0-1\n\
             - Initial  package\n",
        );
        update_spec_changelog(
            &mut spec,
            ChangelogPolicy::rpm(),
            header("1.0-2"),
            vec![ChangelogEntry::new(None, "- Update")],
        )
        .unwrap();
        assert_snapshot!(spec.to_string(), @r"
        Name: hello

        %changelog
        * Mon Jan 15 2024 Jane Doe <jane@example.com> 1.0-2
        - Update

        * Mon Jan 01 2024 Jane Doe <jane@example.com> - 1.0-1
        - Initial  package
        ");
    }

    #[test]
    fn test_creates_missing_changelog_section() {
        let mut spec = parse_spec("Name: hello\n\n%files\n/usr/bin/hello");
        update_spec_changelog(
            &mut spec,
            ChangelogPolicy::rpm(),
            header("1.0-1"),
            vec![ChangelogEntry::new(None, "- First")],
        )
        .unwrap();
        assert_eq!(
            spec.to_string(),
            "Name: hello\n\n%files\n/usr/bin/hello\n%changelog\n\
             * Mon Jan 15 2024 Jane Doe <jane@example.com> 1.0-1\n- First\n"
        );
        assert_eq!(spec.directives("changelog").len(), 1);
    }

    #[test]
    fn test_debian_text_release() {
        let existing = "hello (1.0-1) unstable; urgency=low\n\n  * Initial release.\n\n -- Jane Doe <jane@example.com>  Mon, 01 Jan 2024 09:30:00 +0000\n";
        let header = header("1.0-2")
            .with_field("package", "hello")
            .with_field("distribution", "unstable")
            .with_field("urgency", "medium");
        let text = add_release_to_text(
            existing,
            ChangelogPolicy::debian(),
            header,
            vec![ChangelogEntry::new(None, "  * New upstream release.")],
        )
        .unwrap();
        assert_eq!(
            text,
            format!(
                "hello (1.0-2) unstable; urgency=medium\n\n  * New upstream release.\n\n \
                 -- Jane Doe <jane@example.com>  Mon, 15 Jan 2024 12:00:00 +0000\n\n{}",
                existing
            )
        );
    }
}
