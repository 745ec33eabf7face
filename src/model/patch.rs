use std::fs;
use std::path::{Path, PathBuf};

use crate::parse::dep3::parse_dep3;
use crate::parse::mail_header::{MailInfo, MailInfoError};
use crate::parse::series_parser::{self, SeriesError};

/// Error type for patch metadata extraction
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("could not read patch {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse mail headers of {path}: {source}")]
    MailHeader {
        path: PathBuf,
        source: MailInfoError,
    },
    #[error("failed to parse metadata of patch series at {path}: {source}")]
    Batch {
        path: PathBuf,
        source: Box<PatchError>,
    },
}

/// How descriptive metadata is extracted from a patch file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFlavor {
    /// Mail-style headers only (`git format-patch` output)
    Mail,
    /// Mail-style headers, falling back to a DEP-3 header block
    Dep3,
}

/// Descriptive metadata of a patch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchInfo {
    pub subject: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
    pub long_desc: String,
}

/// A single patch of a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub path: PathBuf,
    /// Parent directory inside the patch directory, used for grouping
    pub topic: Option<String>,
    /// `-p` argument used when applying the patch
    pub strip: Option<u32>,
    pub flavor: PatchFlavor,
    /// Parsed on first access, then cached
    info: Option<PatchInfo>,
}

impl Patch {
    pub fn new(path: impl Into<PathBuf>, topic: Option<String>, strip: Option<u32>) -> Self {
        Patch {
            path: path.into(),
            topic,
            strip,
            flavor: PatchFlavor::Mail,
            info: None,
        }
    }

    /// A patch whose metadata may come from a DEP-3 header block
    pub fn dep3(path: impl Into<PathBuf>, topic: Option<String>, strip: Option<u32>) -> Self {
        Patch {
            flavor: PatchFlavor::Dep3,
            ..Patch::new(path, topic, strip)
        }
    }

    /// Metadata if [`Patch::info`] already parsed it
    pub fn parsed_info(&self) -> Option<&PatchInfo> {
        self.info.as_ref()
    }

    /// File name of the patch without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Metadata of the patch, parsing the file on first call.
    pub fn info(&mut self, mailinfo: &dyn MailInfo) -> Result<&PatchInfo, PatchError> {
        let info = match self.info.take() {
            Some(info) => info,
            None => self.parse_info(mailinfo)?,
        };
        Ok(&*self.info.insert(info))
    }

    fn parse_info(&self, mailinfo: &dyn MailInfo) -> Result<PatchInfo, PatchError> {
        let bytes = fs::read(&self.path).map_err(|source| PatchError::Read {
            path: self.path.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let mail = mailinfo
            .parse(&content)
            .map_err(|source| PatchError::MailHeader {
                path: self.path.clone(),
                source,
            })?;
        let found_headers = mail.has_headers();
        let mut info = PatchInfo {
            subject: mail.subject.unwrap_or_default(),
            author: mail.author,
            email: mail.email,
            date: mail.date,
            long_desc: mail.body,
        };

        if self.flavor == PatchFlavor::Dep3 && !found_headers {
            let dep3 = parse_dep3(&content);
            if dep3.field_count > 0 {
                tracing::debug!("using DEP-3 header of {}", self.path.display());
                if let Some(subject) = dep3.subject {
                    info.subject = subject;
                }
                info.author = dep3.author.or(info.author);
                info.email = dep3.email.or(info.email);
                info.long_desc = dep3.long_desc;
            }
        }

        if info.subject.is_empty() {
            info.subject = subject_from_filename(&self.path);
        }
        Ok(info)
    }
}

/// Derive a subject from a patch file name: `0001-fix-build.patch` → `fix-build`
pub fn subject_from_filename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".patch")
        .or_else(|| name.strip_suffix(".diff"))
        .unwrap_or(&name);
    let subject = stem.trim_start_matches(|c: char| c.is_ascii_digit() || c == '-');
    if subject.is_empty() {
        name
    } else {
        subject.to_string()
    }
}

/// An ordered list of patches, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSeries {
    pub patches: Vec<Patch>,
}

impl PatchSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Patch> {
        self.patches.iter_mut()
    }

    /// Read a quilt-style series file. A missing file is an empty series.
    pub fn read_series_file(path: &Path, patch_dir: &Path) -> Result<Self, SeriesError> {
        series_parser::read_series_file(path, patch_dir)
    }
}

impl<'a> IntoIterator for &'a PatchSeries {
    type Item = &'a Patch;
    type IntoIter = std::slice::Iter<'a, Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}
