use indexmap::IndexMap;

use crate::model::changelog::{Changelog, ChangelogSection};
use crate::parse::changelog_parser::{ChangelogError, ChangelogPolicy};
use crate::util::locale::with_c_time_locale;

/// Serialize a changelog, newest section first
pub fn serialize_changelog(
    changelog: &Changelog,
    policy: &ChangelogPolicy,
) -> Result<String, ChangelogError> {
    let mut out = String::new();
    for section in &changelog.sections {
        out.push_str(&serialize_section(section, policy)?);
    }
    Ok(out)
}

/// Serialize one section. An unmodified parsed section is emitted verbatim.
///
/// An author marker holds for every later entry of the section, so an entry
/// without an author may not follow an attributed one.
pub fn serialize_section(
    section: &ChangelogSection,
    policy: &ChangelogPolicy,
) -> Result<String, ChangelogError> {
    if !section.dirty
        && let Some(source) = &section.source_text
    {
        return Ok(source.clone());
    }

    let time = with_c_time_locale(|| section.header.time.format(policy.header_time_format).to_string());
    let fields = &section.header.fields;

    let mut out = String::new();
    out.push_str(render(policy.header_format, fields, &time)?.trim_end());
    out.push('\n');
    if policy.pad_body {
        out.push('\n');
    }

    let mut author: Option<&str> = None;
    for entry in &section.entries {
        match entry.author.as_deref() {
            Some(name) if author != Some(name) => {
                let mut name_fields = IndexMap::new();
                name_fields.insert("name".to_string(), name.to_string());
                out.push_str(&render(policy.body_name_format, &name_fields, &time)?);
                out.push('\n');
                author = Some(name);
            }
            None if author.is_some() => {
                let first = entry.lines.first().map(|l| l.trim()).unwrap_or_default();
                return Err(ChangelogError::UnattributedEntry(first.to_string()));
            }
            _ => {}
        }
        for line in &entry.lines {
            out.push_str(line);
            out.push('\n');
        }
    }

    if let Some(trailer) = policy.trailer_format {
        if policy.pad_body {
            out.push('\n');
        }
        out.push_str(render(trailer, fields, &time)?.trim_end());
        out.push('\n');
    }
    out.push('\n');
    Ok(out)
}

/// Expand `{field}` placeholders; `{time}` is the preformatted timestamp
fn render(
    template: &str,
    fields: &IndexMap<String, String>,
    time: &str,
) -> Result<String, ChangelogError> {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ChangelogError::MissingField(after.to_string()))?;
        let key = &after[..end];
        let value = match key {
            "time" => time,
            _ => fields
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| ChangelogError::MissingField(key.to_string()))?,
        };
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::changelog::{ChangelogEntry, ChangelogHeader};
    use crate::parse::changelog_parser::{parse_changelog, parse_section};
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    fn rpm_header(revision: &str) -> ChangelogHeader {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .unwrap();
        ChangelogHeader::new(time)
            .with_field("name", "Jane Doe")
            .with_field("email", "jane@example.com")
            .with_field("revision", revision)
    }

    #[test]
    fn test_unmodified_text_is_verbatim() {
        let text = "* Mon Jan 01 2024  Jane Doe <jane@example.com> 1.0-1\n-   odd   spacing\n\n\n";
        let changelog = parse_changelog(text, ChangelogPolicy::rpm()).unwrap();
        assert_eq!(serialize_changelog(&changelog, ChangelogPolicy::rpm()).unwrap(), text);
    }

    #[test]
    fn test_new_rpm_section() {
        let mut changelog = Changelog::new();
        let section = changelog.add_section(rpm_header("1.0-1"));
        section.append_entry(ChangelogEntry::new(None, "- First release"));
        section.append_entry(ChangelogEntry::new(Some("Bob".into()), "- Tests"));
        assert_eq!(
            serialize_changelog(&changelog, ChangelogPolicy::rpm()).unwrap(),
            "* Mon Jan 15 2024 Jane Doe <jane@example.com> 1.0-1\n- First release\n[Bob]\n- Tests\n\n"
        );
    }

    #[test]
    fn test_author_marker_holds_for_later_entries() {
        let mut changelog = Changelog::new();
        let section = changelog.add_section(rpm_header("1.0-1"));
        section.append_entry(ChangelogEntry::new(None, "- First release"));
        section.append_entry(ChangelogEntry::new(Some("Bob".into()), "- Tests"));
        section.append_entry(ChangelogEntry::new(Some("Bob".into()), "- Docs"));
        let text = serialize_changelog(&changelog, ChangelogPolicy::rpm()).unwrap();
        assert_eq!(
            text,
            "* Mon Jan 15 2024 Jane Doe <jane@example.com> 1.0-1\n- First release\n[Bob]\n- Tests\n- Docs\n\n"
        );
        let reparsed = parse_section(&text, ChangelogPolicy::rpm()).unwrap();
        assert_eq!(reparsed.entries, changelog.sections[0].entries);
    }

    #[test]
    fn test_unattributed_entry_after_author_is_rejected() {
        let mut changelog = Changelog::new();
        let section = changelog.add_section(rpm_header("1.0-1"));
        section.append_entry(ChangelogEntry::new(None, "- First release"));
        section.append_entry(ChangelogEntry::new(Some("Bob".into()), "- Tests"));
        section.append_entry(ChangelogEntry::new(None, "- Docs"));
        assert_eq!(
            serialize_changelog(&changelog, ChangelogPolicy::rpm()),
            Err(ChangelogError::UnattributedEntry("- Docs".to_string()))
        );
    }

    #[test]
    fn test_empty_revision_is_trimmed() {
        let mut changelog = Changelog::new();
        changelog.add_section(rpm_header(""));
        assert_eq!(
            serialize_changelog(&changelog, ChangelogPolicy::rpm()).unwrap(),
            "* Mon Jan 15 2024 Jane Doe <jane@example.com>\n\n"
        );
    }

    #[test]
    fn test_missing_field() {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .unwrap();
        let section = ChangelogSection::new(ChangelogHeader::new(time).with_field("name", "Jane"));
        assert_eq!(
            serialize_section(&section, ChangelogPolicy::rpm()),
            Err(ChangelogError::MissingField("email".to_string()))
        );
    }

    #[test]
    fn test_reparse_of_serialized_section_is_equal() {
        let raw = "* Tue Jan 02 2024 Jane Doe <jane@example.com> - 2.0-1\n- One\n  two\n[Bob]\n- Three\n";
        let first = parse_section(raw, ChangelogPolicy::rpm()).unwrap();
        let mut dirty = first.clone();
        dirty.mark_dirty();
        let text = serialize_section(&dirty, ChangelogPolicy::rpm()).unwrap();
        let second = parse_section(&text, ChangelogPolicy::rpm()).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_debian_section_layout() {
        let time = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 10, 0, 0)
            .unwrap();
        let header = ChangelogHeader::new(time)
            .with_field("package", "hello")
            .with_field("revision", "2.10-2")
            .with_field("distribution", "unstable")
            .with_field("urgency", "medium")
            .with_field("name", "Jane Doe")
            .with_field("email", "jane@example.com");
        let mut changelog = Changelog::new();
        changelog
            .add_section(header)
            .append_entry(ChangelogEntry::new(None, "  * Fix the build."));
        let text = serialize_changelog(&changelog, ChangelogPolicy::debian()).unwrap();
        assert_eq!(
            text,
            "hello (2.10-2) unstable; urgency=medium\n\n  * Fix the build.\n\n \
             -- Jane Doe <jane@example.com>  Tue, 02 Jan 2024 10:00:00 +0100\n\n"
        );
        let reparsed = parse_changelog(&text, ChangelogPolicy::debian()).unwrap();
        assert_eq!(reparsed.sections[0], changelog.sections[0]);
    }
}
