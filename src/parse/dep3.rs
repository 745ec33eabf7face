use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

/// First line of the diff body of a patch file
static DIFF_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((---|\*\*\*|Index:)[ \t][^ \t]|diff -|---\s*$)").unwrap()
});

/// `Name <email>` as used in `Author:` and `From:` fields
static NAME_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*?)\s*<(?P<email>[^>]+)>").unwrap());

/// Whether `line` starts the diff part of a patch
pub fn is_diff_start(line: &str) -> bool {
    DIFF_START.is_match(line)
}

/// One field of a DEP-3 header block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dep3Field {
    /// Header lines exactly as they appeared
    pub raw: Vec<String>,
    /// Decoded value lines; a `.` continuation decodes to an empty line
    pub values: Vec<String>,
}

/// Metadata extracted from a DEP-3 header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dep3Info {
    pub subject: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub long_desc: String,
    /// Number of distinct fields found in the header
    pub field_count: usize,
}

/// Collect the raw fields of the header block at the top of a patch.
///
/// Keys are lowercased; a key seen twice accumulates into the first entry.
pub fn parse_dep3_header(text: &str) -> IndexMap<String, Dep3Field> {
    let mut fields: IndexMap<String, Dep3Field> = IndexMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if is_diff_start(line) {
            break;
        }
        if line.starts_with([' ', '\t']) {
            let Some(field) = current.as_ref().and_then(|key| fields.get_mut(key)) else {
                break;
            };
            let value = line.trim();
            field.raw.push(line.to_string());
            field.values.push(if value == "." { String::new() } else { value.to_string() });
        } else if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let field = fields.entry(key.clone()).or_default();
            field.raw.push(line.to_string());
            field.values.push(value.trim().to_string());
            current = Some(key);
        } else {
            break;
        }
    }

    fields
}

/// Parse the DEP-3 header of a patch into descriptive metadata
pub fn parse_dep3(text: &str) -> Dep3Info {
    let fields = parse_dep3_header(text);
    let mut info = Dep3Info {
        field_count: fields.len(),
        ..Dep3Info::default()
    };
    let mut desc_prefix = Vec::new();
    let mut other = Vec::new();

    for (key, field) in &fields {
        match key.as_str() {
            "author" | "from" => {
                if info.author.is_none() {
                    let (name, email) = split_name_email(&field.values.join(" "));
                    info.author = name;
                    info.email = email;
                }
            }
            "subject" | "description" => {
                if info.subject.is_some() {
                    other.push(field.raw.join("\n"));
                    continue;
                }
                let split = field
                    .values
                    .iter()
                    .position(|v| v.is_empty())
                    .unwrap_or(field.values.len());
                let subject = field.values[..split].join(" ").trim().to_string();
                if !subject.is_empty() {
                    info.subject = Some(subject);
                }
                if split < field.values.len() {
                    desc_prefix.push(field.values[split + 1..].join("\n"));
                }
            }
            _ => other.push(field.raw.join("\n")),
        }
    }

    desc_prefix.extend(other);
    info.long_desc = desc_prefix.join("\n").trim().to_string();
    info
}

/// Split `Jane Doe <jane@example.com>` into name and email.
///
/// Without an angle-bracket address the whole value is the name.
pub fn split_name_email(value: &str) -> (Option<String>, Option<String>) {
    let value = value.trim();
    match NAME_EMAIL.captures(value) {
        Some(caps) => {
            let name = caps["name"].trim();
            (
                (!name.is_empty()).then(|| name.to_string()),
                Some(caps["email"].trim().to_string()),
            )
        }
        None => ((!value.is_empty()).then(|| value.to_string()), None),
    }
}
