use indexmap::IndexMap;
use serde::Serialize;

use crate::model::changelog::ChangelogSection;
use crate::model::patch::{Patch, PatchInfo};
use crate::model::spec::SpecTag;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PatchJson {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct TagJson {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num: Option<i32>,
    pub value: String,
}

#[derive(Serialize)]
pub struct ChangelogSectionJson {
    pub time: String,
    pub fields: IndexMap<String, String>,
    pub entries: Vec<ChangelogEntryJson>,
}

#[derive(Serialize)]
pub struct ChangelogEntryJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub text: String,
}

#[derive(Serialize)]
pub struct CommitsJson {
    pub commits: Vec<String>,
}

#[derive(Serialize)]
pub struct PatchNamesJson {
    pub patches: Vec<String>,
}

#[derive(Serialize)]
pub struct SourceFormatJson {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub fn patch_to_json(patch: &Patch, info: Option<&PatchInfo>) -> PatchJson {
    PatchJson {
        name: patch.file_name(),
        path: patch.path.display().to_string(),
        strip: patch.strip,
        topic: patch.topic.clone(),
        subject: info.map(|i| i.subject.clone()),
        author: info.and_then(|i| i.author.clone()),
        email: info.and_then(|i| i.email.clone()),
        date: info.and_then(|i| i.date.clone()),
    }
}

pub fn tag_to_json(tag: &SpecTag) -> TagJson {
    TagJson {
        name: tag.name.clone(),
        num: tag.num,
        value: tag.value.clone(),
    }
}

pub fn section_to_json(section: &ChangelogSection) -> ChangelogSectionJson {
    ChangelogSectionJson {
        time: section.header.time.to_rfc3339(),
        fields: section.header.fields.clone(),
        entries: section
            .entries
            .iter()
            .map(|e| ChangelogEntryJson {
                author: e.author.clone(),
                text: e.text(),
            })
            .collect(),
    }
}
