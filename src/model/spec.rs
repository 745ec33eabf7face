use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::model::archive::{self, ArchiveName};
use crate::model::buffer::{BufferError, LineId, LinkedTextBuffer};
use crate::model::patch::{Patch, PatchSeries};
use crate::parse::spec_parser::{self, LineKind, ParseMode};

/// Error type for spec file queries and edits
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("setting '{0}:' tag is not supported")]
    UnsupportedTag(String),
    #[error("editing '%{0}' macro is not supported")]
    UnsupportedMacro(String),
    #[error("multiple %{0} sections found, don't know which to update")]
    AmbiguousSection(String),
    #[error("couldn't determine where to add {0}")]
    NoInsertionPoint(String),
    #[error("not a valid section name: '%{0}'")]
    UnknownSection(String),
    #[error("cannot set an empty value to '{0}:' tag")]
    EmptyValue(String),
    #[error("invalid patch number '{value}' in line: {line}")]
    InvalidIgnorePatches { value: String, line: String },
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// A preamble tag line such as `Patch3: fix.patch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTag {
    /// Lowercase tag name
    pub name: String,
    /// Numeric suffix; unnumbered `Source` is 0 and unnumbered `Patch` is -1
    pub num: Option<i32>,
    pub value: String,
    pub line: LineId,
}

/// A `%name[N] [args]` directive or section marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDirective {
    /// Lowercase directive name
    pub name: String,
    /// Patch number for `%patch` macros (-1 when implicit), else the numeric suffix
    pub id: Option<i32>,
    pub args: String,
    pub line: LineId,
}

/// A `# gbp-<name>: <args>` annotation comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbpTag {
    pub name: String,
    pub args: Option<String>,
    pub line: LineId,
}

/// Index entries that point at a buffer line
pub trait Indexed {
    fn line(&self) -> LineId;
}

impl Indexed for SpecTag {
    fn line(&self) -> LineId {
        self.line
    }
}

impl Indexed for SpecDirective {
    fn line(&self) -> LineId {
        self.line
    }
}

impl Indexed for GbpTag {
    fn line(&self) -> LineId {
        self.line
    }
}

/// A parsed spec file: the text buffer plus an index of its structure.
///
/// Every index entry refers to a live buffer line. Lines must be removed
/// through [`SpecFile::delete_line`] so the index is purged with them.
#[derive(Debug, Clone, Default)]
pub struct SpecFile {
    pub(crate) buffer: LinkedTextBuffer,
    pub(crate) tags: IndexMap<String, Vec<SpecTag>>,
    pub(crate) directives: IndexMap<String, Vec<SpecDirective>>,
    pub(crate) gbp_tags: IndexMap<String, Vec<GbpTag>>,
    /// Directory patch files referenced by the spec live in
    pub spec_dir: PathBuf,
    /// Invalid UTF-8 was replaced while reading; the text is not the file's
    pub lossy: bool,
}

impl SpecFile {
    pub fn buffer(&self) -> &LinkedTextBuffer {
        &self.buffer
    }

    pub fn tags(&self, name: &str) -> &[SpecTag] {
        self.tags.get(&name.to_lowercase()).map_or(&[], Vec::as_slice)
    }

    pub fn tag(&self, name: &str, num: Option<i32>) -> Option<&SpecTag> {
        self.tags(name).iter().find(|t| t.num == num)
    }

    /// Value of the first occurrence of a tag
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.in_file_order(self.tags(name))
            .first()
            .map(|t| t.value.as_str())
    }

    pub fn directives(&self, name: &str) -> &[SpecDirective] {
        self.directives
            .get(&name.to_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    pub fn gbp_tags(&self, name: &str) -> &[GbpTag] {
        self.gbp_tags
            .get(&name.to_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    pub fn name(&self) -> Option<&str> {
        self.tag_value("name")
    }

    pub fn version(&self) -> Option<&str> {
        self.tag_value("version")
    }

    pub fn release(&self) -> Option<&str> {
        self.tag_value("release")
    }

    pub fn epoch(&self) -> Option<&str> {
        self.tag_value("epoch")
    }

    /// The upstream archive named by `Source0:` (or unnumbered `Source:`)
    pub fn orig_src(&self) -> Option<ArchiveName> {
        let value = &self.tag("source", Some(0))?.value;
        let file_name = value.rsplit('/').next().unwrap_or(value);
        archive::parse_filename(file_name)
    }

    /// Patch numbers listed in the last `# gbp-ignore-patches:` annotation, sorted
    pub fn ignored_patches(&self) -> Result<Vec<i32>, SpecError> {
        let Some(tag) = self.last_in_file(self.gbp_tags("ignore-patches")) else {
            return Ok(Vec::new());
        };
        let mut nums = Vec::new();
        for value in tag.args.as_deref().unwrap_or("").split_whitespace() {
            let num = value
                .parse()
                .map_err(|_| SpecError::InvalidIgnorePatches {
                    value: value.to_string(),
                    line: self.line_text(tag.line).trim_end().to_string(),
                })?;
            nums.push(num);
        }
        nums.sort_unstable();
        Ok(nums)
    }

    /// Patches in application order.
    ///
    /// Patches with a `%patch` macro come first, in macro order, with the
    /// strip level of the macro (default 0). With `unapplied`, tagged patches
    /// without a macro follow in tag number order. Ignored patches are left
    /// out unless `ignored` is set.
    pub fn patchseries(&self, unapplied: bool, ignored: bool) -> Result<PatchSeries, SpecError> {
        let skip: HashSet<i32> = if ignored {
            HashSet::new()
        } else {
            self.ignored_patches()?.into_iter().collect()
        };
        let tags: BTreeMap<i32, &SpecTag> = self
            .tags("patch")
            .iter()
            .filter_map(|t| t.num.map(|n| (n, t)))
            .collect();

        let mut series = PatchSeries::new();
        let mut applied = HashSet::new();
        for macro_ in self.in_file_order(self.directives("patch")) {
            let Some(id) = macro_.id else { continue };
            let Some(tag) = tags.get(&id) else { continue };
            applied.insert(id);
            if skip.contains(&id) {
                continue;
            }
            let opts = spec_parser::parse_patch_macro_args(&macro_.args);
            series.push(self.spec_patch(tag, opts.strip.unwrap_or(0)));
        }

        if unapplied {
            for (num, tag) in &tags {
                if !applied.contains(num) && !skip.contains(num) {
                    series.push(self.spec_patch(tag, 0));
                }
            }
        }
        Ok(series)
    }

    fn spec_patch(&self, tag: &SpecTag, strip: u32) -> Patch {
        let file_name = Path::new(&tag.value)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tag.value.clone());
        Patch::new(self.spec_dir.join(file_name), None, Some(strip))
    }

    /// Text between a section directive and the next section directive.
    ///
    /// With several directives of that name the first one is used.
    pub fn get_section(&self, name: &str) -> Option<String> {
        let header = self.in_file_order(self.directives(name)).first()?.line;
        let mut out = String::new();
        let mut cursor = self.buffer.next(header);
        while let Some(id) = cursor {
            let text = self.line_text(id);
            if spec_parser::is_section_line(text) {
                break;
            }
            out.push_str(text);
            cursor = self.buffer.next(id);
        }
        Some(out)
    }

    /// Entries sorted by their position in the buffer
    pub fn in_file_order<'a, T: Indexed>(&self, entries: &'a [T]) -> Vec<&'a T> {
        let positions = self.line_positions();
        let mut sorted: Vec<&T> = entries.iter().collect();
        sorted.sort_by_key(|e| positions.get(&e.line()).copied().unwrap_or(usize::MAX));
        sorted
    }

    /// The entry that appears last in the buffer
    pub fn last_in_file<'a, T: Indexed>(&self, entries: &'a [T]) -> Option<&'a T> {
        self.in_file_order(entries).pop()
    }

    /// Line of the last tag of the preamble
    pub fn last_tag_line(&self) -> Option<LineId> {
        let all: Vec<&SpecTag> = self.tags.values().flatten().collect();
        let positions = self.line_positions();
        all.into_iter()
            .max_by_key(|t| positions.get(&t.line).copied().unwrap_or(0))
            .map(|t| t.line)
    }

    pub(crate) fn line_text(&self, id: LineId) -> &str {
        self.buffer.get(id).unwrap_or("")
    }

    fn line_positions(&self) -> HashMap<LineId, usize> {
        self.buffer
            .iter()
            .enumerate()
            .map(|(pos, (id, _))| (id, pos))
            .collect()
    }

    /// Remove a line from the buffer and every index entry pointing at it.
    /// Returns the predecessor line.
    pub fn delete_line(&mut self, id: LineId) -> Result<Option<LineId>, SpecError> {
        let prev = self.buffer.delete(id)?;
        self.unindex_line(id);
        Ok(prev)
    }

    /// Rewrite a line in place and re-index it as if it were read in `mode`
    pub fn replace_line(&mut self, id: LineId, text: String, mode: ParseMode) -> Result<(), SpecError> {
        let kind = spec_parser::classify_line(&text, mode);
        self.buffer.set(id, text)?;
        self.unindex_line(id);
        self.index_line(id, kind);
        Ok(())
    }

    fn unindex_line(&mut self, id: LineId) {
        self.tags.retain(|_, v| {
            v.retain(|t| t.line != id);
            !v.is_empty()
        });
        self.directives.retain(|_, v| {
            v.retain(|d| d.line != id);
            !v.is_empty()
        });
        self.gbp_tags.retain(|_, v| {
            v.retain(|g| g.line != id);
            !v.is_empty()
        });
    }

    /// Insert a line after `anchor` and index it as if it were read in `mode`
    pub fn insert_line_after(
        &mut self,
        anchor: LineId,
        text: String,
        mode: ParseMode,
    ) -> Result<LineId, SpecError> {
        let kind = spec_parser::classify_line(&text, mode);
        let id = self.buffer.insert_after(anchor, text)?;
        self.index_line(id, kind);
        Ok(id)
    }

    /// Insert a line before `anchor` and index it as if it were read in `mode`
    pub fn insert_line_before(
        &mut self,
        anchor: LineId,
        text: String,
        mode: ParseMode,
    ) -> Result<LineId, SpecError> {
        let kind = spec_parser::classify_line(&text, mode);
        let id = self.buffer.insert_before(anchor, text)?;
        self.index_line(id, kind);
        Ok(id)
    }

    /// Append a line at the end of the file and index it
    pub fn append_line(&mut self, text: String, mode: ParseMode) -> LineId {
        let kind = spec_parser::classify_line(&text, mode);
        let id = self.buffer.append(text);
        self.index_line(id, kind);
        id
    }

    pub(crate) fn index_line(&mut self, line: LineId, kind: LineKind) {
        match kind {
            LineKind::Tag { name, num, value } => {
                self.tags.entry(name.clone()).or_default().push(SpecTag {
                    name,
                    num,
                    value,
                    line,
                });
            }
            LineKind::Directive { name, id, args } => {
                self.directives
                    .entry(name.clone())
                    .or_default()
                    .push(SpecDirective {
                        name,
                        id,
                        args,
                        line,
                    });
            }
            LineKind::GbpTag { name, args } => {
                self.gbp_tags
                    .entry(name.clone())
                    .or_default()
                    .push(GbpTag { name, args, line });
            }
            LineKind::Other => {}
        }
    }
}

impl fmt::Display for SpecFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.buffer.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::spec_parser::parse_spec;
    use pretty_assertions::assert_eq;

    const SPEC: &str = "\
Name:           hello
Version:        2.10
Release:        1
Source:         https://ftp.gnu.org/gnu/hello/hello-2.10.tar.gz
Patch:          implicit.patch
Patch1:         one.patch
Patch2:         two.patch
Patch3:         three.patch
# gbp-ignore-patches: 3

%description
The GNU hello program.

%prep
%setup -q
%patch2 -p0
%patch -p1
%patch1

%build
make

%changelog
* Mon Jan 01 2024 Jane Doe <jane@example.com> 2.10-1
- Initial package
";

    fn spec() -> SpecFile {
        let mut spec = parse_spec(SPEC);
        spec.spec_dir = PathBuf::from("/pkg");
        spec
    }

    #[test]
    fn test_basic_queries() {
        let spec = spec();
        assert_eq!(spec.name(), Some("hello"));
        assert_eq!(spec.version(), Some("2.10"));
        assert_eq!(spec.release(), Some("1"));
        assert_eq!(spec.epoch(), None);
        let orig = spec.orig_src().unwrap();
        assert_eq!(orig.base, "hello-2.10");
        assert_eq!(orig.compression.as_deref(), Some("gzip"));
        assert_eq!(spec.ignored_patches().unwrap(), vec![3]);
    }

    #[test]
    fn test_patchseries_application_order() {
        let spec = spec();
        let series = spec.patchseries(false, false).unwrap();
        let got: Vec<(PathBuf, Option<u32>)> =
            series.iter().map(|p| (p.path.clone(), p.strip)).collect();
        assert_eq!(
            got,
            vec![
                (PathBuf::from("/pkg/two.patch"), Some(0)),
                (PathBuf::from("/pkg/implicit.patch"), Some(1)),
                (PathBuf::from("/pkg/one.patch"), Some(0)),
            ]
        );
    }

    #[test]
    fn test_patchseries_unapplied_and_ignored() {
        let spec = spec();
        let names = |s: &PatchSeries| s.iter().map(|p| p.file_name()).collect::<Vec<_>>();
        assert_eq!(
            names(&spec.patchseries(true, false).unwrap()),
            vec!["two.patch", "implicit.patch", "one.patch"]
        );
        assert_eq!(
            names(&spec.patchseries(true, true).unwrap()),
            vec!["two.patch", "implicit.patch", "one.patch", "three.patch"]
        );
    }

    #[test]
    fn test_get_section() {
        let spec = spec();
        assert_eq!(
            spec.get_section("prep").as_deref(),
            Some("%setup -q\n%patch2 -p0\n%patch -p1\n%patch1\n\n")
        );
        assert_eq!(
            spec.get_section("changelog").as_deref(),
            Some("* Mon Jan 01 2024 Jane Doe <jane@example.com> 2.10-1\n- Initial package\n")
        );
        assert_eq!(spec.get_section("install"), None);
    }

    #[test]
    fn test_delete_line_purges_index() {
        let mut spec = spec();
        let line = spec.tag("patch", Some(1)).unwrap().line;
        spec.delete_line(line).unwrap();
        assert!(spec.tag("patch", Some(1)).is_none());
        assert_eq!(spec.tags("patch").len(), 3);
        assert!(!spec.to_string().contains("one.patch\n"));
        for tag in spec.tags.values().flatten() {
            assert!(spec.buffer().contains(tag.line));
        }
    }

    #[test]
    fn test_invalid_ignore_patches() {
        let spec = parse_spec("Name: x\n# gbp-ignore-patches: 1 two\n");
        assert_eq!(
            spec.ignored_patches(),
            Err(SpecError::InvalidIgnorePatches {
                value: "two".to_string(),
                line: "# gbp-ignore-patches: 1 two".to_string(),
            })
        );
    }
}
