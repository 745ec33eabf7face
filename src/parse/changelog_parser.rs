use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use regex::Regex;

use crate::model::changelog::{Changelog, ChangelogEntry, ChangelogHeader, ChangelogSection};
use crate::util::locale::with_c_time_locale;

/// Error type for changelog parsing and formatting
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChangelogError {
    #[error("first line in changelog is invalid: {0}")]
    InvalidFirstLine(String),
    #[error("unable to parse changelog header: {0}")]
    InvalidHeader(String),
    #[error("invalid changelog timestamp '{0}'")]
    InvalidTime(String),
    #[error("no value for '{{{0}}}' in changelog template")]
    MissingField(String),
    #[error("unknown changelog policy '{0}'")]
    UnknownPolicy(String),
    #[error("changelog entry '{0}' has no author but follows an attributed entry")]
    UnattributedEntry(String),
}

/// Grammar and output format of one changelog flavour.
///
/// `section_split` must provide `header` and `body` groups and may provide
/// `trailer`. `header_split` and `trailer_split` capture `time` plus any
/// other named fields; a `name` capture is split further by
/// `header_name_split` when present. Templates use `{field}` placeholders,
/// with `{time}` rendered through `header_time_format`.
#[derive(Debug, Clone)]
pub struct ChangelogPolicy {
    pub name: &'static str,
    pub section_start: Regex,
    pub section_split: Regex,
    pub header_split: Regex,
    pub trailer_split: Option<Regex>,
    pub header_name_split: Option<Regex>,
    pub body_name: Regex,
    pub entry_bullet: &'static str,
    pub header_format: &'static str,
    pub trailer_format: Option<&'static str>,
    pub header_time_format: &'static str,
    pub body_name_format: &'static str,
    /// Blank lines between header, entries and trailer
    pub pad_body: bool,
}

/// Leading `Tue ` or `Tue, ` of a timestamp
static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]{3},?\s+").unwrap());

static RPM_POLICY: LazyLock<ChangelogPolicy> = LazyLock::new(|| ChangelogPolicy {
    name: "rpm",
    section_start: Regex::new(r"^\*").unwrap(),
    section_split: Regex::new(r"(?s)\A\*[ \t]*(?P<header>[^\n]*)\n?(?P<body>.*)\z").unwrap(),
    header_split: Regex::new(r"^(?P<time>\S.*?\s[0-9]{4})\s+(?P<name>\S.*)$").unwrap(),
    trailer_split: None,
    header_name_split: Some(
        Regex::new(r"^(?P<name>[^<]*)\s+<(?P<email>[^>]+)>((\s*-)?\s+(?P<revision>\S+))?$").unwrap(),
    ),
    body_name: Regex::new(r"^\[(?P<name>.*)\]\s*$").unwrap(),
    entry_bullet: "-",
    header_format: "* {time} {name} <{email}> {revision}",
    trailer_format: None,
    header_time_format: "%a %b %d %Y",
    body_name_format: "[{name}]",
    pad_body: false,
});

static DEBIAN_POLICY: LazyLock<ChangelogPolicy> = LazyLock::new(|| ChangelogPolicy {
    name: "debian",
    section_start: Regex::new(r"^\S").unwrap(),
    section_split: Regex::new(r"(?ms)\A(?P<header>[^\n]*)\n(?P<body>.*?)^ -- (?P<trailer>[^\n]*)$")
        .unwrap(),
    header_split: Regex::new(
        r"^(?P<package>\S+) \((?P<revision>[^)]+)\) (?P<distribution>[^;]+); urgency=(?P<urgency>\S+)$",
    )
    .unwrap(),
    trailer_split: Some(
        Regex::new(r"^(?P<name>.*?)\s*<(?P<email>[^>]+)>\s+(?P<time>\S.*?)\s*$").unwrap(),
    ),
    header_name_split: None,
    body_name: Regex::new(r"^\s+\[\s*(?P<name>.*?)\s*\]\s*$").unwrap(),
    entry_bullet: "  *",
    header_format: "{package} ({revision}) {distribution}; urgency={urgency}",
    trailer_format: Some(" -- {name} <{email}>  {time}"),
    header_time_format: "%a, %d %b %Y %H:%M:%S %z",
    body_name_format: "  [ {name} ]",
    pad_body: true,
});

impl ChangelogPolicy {
    /// RPM `%changelog` sections
    pub fn rpm() -> &'static ChangelogPolicy {
        &RPM_POLICY
    }

    /// Debian `debian/changelog` sections
    pub fn debian() -> &'static ChangelogPolicy {
        &DEBIAN_POLICY
    }

    pub fn by_name(name: &str) -> Result<&'static ChangelogPolicy, ChangelogError> {
        match name {
            "rpm" => Ok(Self::rpm()),
            "debian" | "deb" => Ok(Self::debian()),
            other => Err(ChangelogError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Split changelog text into raw sections, each starting at a line that
/// matches the policy's section start.
pub fn raw_parse_string(text: &str, policy: &ChangelogPolicy) -> Result<Vec<String>, ChangelogError> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if policy.section_start.is_match(line) {
            if !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.push_str(line);
        } else if !current.is_empty() {
            current.push_str(line);
        } else {
            return Err(ChangelogError::InvalidFirstLine(line.trim_end().to_string()));
        }
    }
    if !current.is_empty() {
        sections.push(current);
    }
    Ok(sections)
}

/// Parse a whole changelog. Empty text is an empty changelog.
pub fn parse_changelog(text: &str, policy: &ChangelogPolicy) -> Result<Changelog, ChangelogError> {
    let sections = raw_parse_string(text, policy)?
        .iter()
        .map(|raw| parse_section(raw, policy))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Changelog { sections })
}

/// Parse one raw section into header fields and entries
pub fn parse_section(raw: &str, policy: &ChangelogPolicy) -> Result<ChangelogSection, ChangelogError> {
    let first_line = || raw.lines().next().unwrap_or("").to_string();
    let caps = policy
        .section_split
        .captures(raw)
        .ok_or_else(|| ChangelogError::InvalidHeader(first_line()))?;

    let mut fields = IndexMap::new();
    let mut time = None;
    let header = caps.name("header").map_or("", |m| m.as_str()).trim();
    collect_fields(&policy.header_split, header, policy, &mut fields, &mut time)
        .ok_or_else(|| ChangelogError::InvalidHeader(first_line()))?;
    if let (Some(split), Some(trailer)) = (&policy.trailer_split, caps.name("trailer")) {
        collect_fields(split, trailer.as_str().trim(), policy, &mut fields, &mut time)
            .ok_or_else(|| ChangelogError::InvalidHeader(trailer.as_str().to_string()))?;
    }

    let time = time.ok_or_else(|| ChangelogError::InvalidHeader(first_line()))?;
    let time = parse_time(&time, policy.header_time_format)?;

    let body = caps.name("body").map_or("", |m| m.as_str());
    Ok(ChangelogSection {
        header: ChangelogHeader { time, fields },
        entries: parse_entries(body, policy),
        source_text: Some(raw.to_string()),
        dirty: false,
    })
}

/// Match `text` against `re` and store its named groups. Groups that did
/// not participate become empty strings.
fn collect_fields(
    re: &Regex,
    text: &str,
    policy: &ChangelogPolicy,
    fields: &mut IndexMap<String, String>,
    time: &mut Option<String>,
) -> Option<()> {
    let caps = re.captures(text)?;
    for group in re.capture_names().flatten() {
        let value = caps.name(group).map_or("", |m| m.as_str()).trim();
        match (group, &policy.header_name_split) {
            ("time", _) => *time = Some(value.to_string()),
            ("name", Some(split)) => {
                let name_caps = split.captures(value)?;
                for sub in split.capture_names().flatten() {
                    let sub_value = name_caps.name(sub).map_or("", |m| m.as_str()).trim();
                    fields.insert(sub.to_string(), sub_value.to_string());
                }
            }
            _ => {
                fields.insert(group.to_string(), value.to_string());
            }
        }
    }
    Some(())
}

/// Parse a timestamp in the neutral locale. Date-only formats yield
/// midnight UTC.
pub fn parse_time(text: &str, format: &str) -> Result<DateTime<FixedOffset>, ChangelogError> {
    let (date, format) = skip_weekday(text, format);
    with_c_time_locale(|| {
        if let Ok(time) = DateTime::parse_from_str(date, format) {
            return Ok(time);
        }
        if let Ok(time) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(time.and_utc().fixed_offset());
        }
        NaiveDate::parse_from_str(date, format)
            .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
            .map_err(|_| ChangelogError::InvalidTime(text.to_string()))
    })
}

/// Drop a leading weekday from both the timestamp and its format.
///
/// Hand-written changelogs often name the wrong day of the week; the date
/// itself is authoritative.
fn skip_weekday<'a>(text: &'a str, format: &'a str) -> (&'a str, &'a str) {
    let Some(rest) = format.strip_prefix("%a") else {
        return (text, format);
    };
    match WEEKDAY.find(text) {
        Some(day) => (&text[day.end()..], rest.trim_start_matches(',').trim_start()),
        None => (text, format),
    }
}

fn parse_entries(body: &str, policy: &ChangelogPolicy) -> Vec<ChangelogEntry> {
    let mut entries = Vec::new();
    let mut author: Option<String> = None;
    let mut entry_author: Option<String> = None;
    let mut text = String::new();
    let mut noted = false;

    for line in body.lines() {
        if let Some(caps) = policy.body_name.captures(line) {
            author = Some(caps["name"].to_string());
            continue;
        }
        if line.starts_with(policy.entry_bullet) {
            if !text.is_empty() {
                entries.push(ChangelogEntry::new(entry_author.take(), &text));
                text.clear();
            }
            entry_author = author.clone();
        } else if text.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            if !noted {
                tracing::info!("first line of changelog section is not an entry: {}", line);
                noted = true;
            }
            entry_author = author.clone();
        }
        text.push_str(line);
        text.push('\n');
    }
    if !text.is_empty() {
        entries.push(ChangelogEntry::new(entry_author, &text));
    }
    entries
}
