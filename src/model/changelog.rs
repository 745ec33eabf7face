use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

/// Header of a changelog section: when it was made plus policy-defined
/// fields such as `name`, `email` and `revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogHeader {
    pub time: DateTime<FixedOffset>,
    pub fields: IndexMap<String, String>,
}

impl ChangelogHeader {
    pub fn new(time: DateTime<FixedOffset>) -> Self {
        ChangelogHeader {
            time,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// One change entry: its text lines (without terminators) and the author
/// in effect when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub author: Option<String>,
    pub lines: Vec<String>,
}

impl ChangelogEntry {
    /// Build an entry from text; trailing blank lines are dropped
    pub fn new(author: Option<String>, text: &str) -> Self {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        ChangelogEntry { author, lines }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// One dated, attributed block of entries
#[derive(Debug, Clone)]
pub struct ChangelogSection {
    pub header: ChangelogHeader,
    pub entries: Vec<ChangelogEntry>,
    /// Original text (present if parsed from disk)
    pub source_text: Option<String>,
    /// Whether this section has been modified since parsing
    pub dirty: bool,
}

impl ChangelogSection {
    /// Create a new section, marked dirty (no source)
    pub fn new(header: ChangelogHeader) -> Self {
        ChangelogSection {
            header,
            entries: Vec::new(),
            source_text: None,
            dirty: true,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn append_entry(&mut self, entry: ChangelogEntry) -> &ChangelogEntry {
        self.mark_dirty();
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }
}

/// Content equality; where the text came from does not matter
impl PartialEq for ChangelogSection {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.entries == other.entries
    }
}

/// A changelog, newest section first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changelog {
    pub sections: Vec<ChangelogSection>,
}

impl Changelog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section as the newest one
    pub fn add_section(&mut self, header: ChangelogHeader) -> &mut ChangelogSection {
        self.sections.insert(0, ChangelogSection::new(header));
        &mut self.sections[0]
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
