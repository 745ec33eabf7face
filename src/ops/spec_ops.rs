use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::model::buffer::LineId;
use crate::model::patch::PatchSeries;
use crate::model::spec::{SpecError, SpecFile};
use crate::parse::spec_parser::{ParseMode, is_section_line, is_section_name};

/// Tags that may be rewritten
pub const SUPPORTED_TAGS: &[&str] = &["patch", "vcs"];
/// Macros that may be rewritten
pub const SUPPORTED_MACROS: &[&str] = &["patch"];

const AUTOGEN_HEADER: &str = "# Patches auto-generated by git-buildpackage:\n";
const DEFAULT_TAG_INDENT: usize = 12;

static AUTOGEN_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*#.*patch.*auto-generated").unwrap());

/// Comment naming a patch file, e.g. `# fix-build.patch.gz`
static PATCH_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*#.+(patch|diff)(\.(gz|bz2|xz|lzma))?\s*$").unwrap()
});

static TAG_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-z]+([0-9]+)?\s*:\s*)").unwrap());

/// Per-patch macro commands, keyed by patch name then command (`if`, `ifarch`)
pub type PatchCommands = HashMap<String, IndexMap<String, String>>;

fn tag_label(name: &str, num: Option<i32>) -> String {
    match num {
        Some(n) if n >= 0 => format!("{}{}", name, n),
        _ => name.to_string(),
    }
}

fn check_tag(name: &str, num: Option<i32>) -> Result<String, SpecError> {
    let key = name.to_lowercase();
    if SUPPORTED_TAGS.contains(&key.as_str()) {
        Ok(key)
    } else {
        Err(SpecError::UnsupportedTag(tag_label(name, num)))
    }
}

fn check_macro(name: &str) -> Result<String, SpecError> {
    let key = name.to_lowercase();
    if SUPPORTED_MACROS.contains(&key.as_str()) {
        Ok(key)
    } else {
        Err(SpecError::UnsupportedMacro(name.to_string()))
    }
}

fn indent_of(text: &str) -> Option<usize> {
    TAG_INDENT.captures(text).map(|caps| caps[1].len())
}

/// Set a tag value, or delete the tag when `value` is empty.
///
/// A missing tag is added after the last tag of the same name, else after
/// the last `after` tag, else after the last `Name:` tag.
pub fn set_tag(
    spec: &mut SpecFile,
    name: &str,
    num: Option<i32>,
    value: &str,
    after: Option<&str>,
) -> Result<(), SpecError> {
    let key = check_tag(name, num)?;
    if value.trim().is_empty() {
        if !spec.tags(&key).is_empty() {
            delete_tag(spec, name, num)?;
        }
        return Ok(());
    }

    let anchor_key = if !spec.tags(&key).is_empty() {
        key
    } else {
        after
            .map(str::to_lowercase)
            .filter(|a| !spec.tags(a).is_empty())
            .unwrap_or_else(|| "name".to_string())
    };
    let anchor = spec
        .last_in_file(spec.tags(&anchor_key))
        .map(|t| t.line)
        .ok_or_else(|| SpecError::NoInsertionPoint(format!("'{}:' tag", tag_label(name, num))))?;
    write_tag(spec, name, num, value, anchor)?;
    Ok(())
}

/// Rewrite an existing `(name, num)` tag in place, or insert it after `after`.
/// Returns the line holding the tag.
fn write_tag(
    spec: &mut SpecFile,
    name: &str,
    num: Option<i32>,
    value: &str,
    after: LineId,
) -> Result<LineId, SpecError> {
    let label = tag_label(name, num);
    let value = value.trim();
    if value.is_empty() {
        return Err(SpecError::EmptyValue(label));
    }

    let key = name.to_lowercase();
    let existing = spec
        .in_file_order(spec.tags(&key))
        .into_iter()
        .rev()
        .find(|t| t.num == num)
        .map(|t| t.line);

    let indent = existing
        .and_then(|line| indent_of(spec.line_text(line)))
        .or_else(|| indent_of(spec.line_text(after)))
        .or_else(|| {
            spec.buffer()
                .next(after)
                .and_then(|next| indent_of(spec.line_text(next)))
        })
        .unwrap_or(DEFAULT_TAG_INDENT);
    let field = format!("{}:", label);
    let text = if field.len() < indent {
        format!("{:<width$}{}\n", field, value, width = indent)
    } else {
        format!("{} {}\n", field, value)
    };

    match existing {
        Some(line) => {
            tracing::debug!("updating '{}' tag", field);
            spec.replace_line(line, text, ParseMode::Preamble)?;
            Ok(line)
        }
        None => {
            tracing::debug!("adding '{}' tag", field);
            spec.insert_line_after(after, text, ParseMode::Preamble)
        }
    }
}

/// Delete every `(name, num)` tag. Returns the line preceding the last one
/// removed; deleting a missing tag only logs a warning.
pub fn delete_tag(
    spec: &mut SpecFile,
    name: &str,
    num: Option<i32>,
) -> Result<Option<LineId>, SpecError> {
    let key = check_tag(name, num)?;
    let lines: Vec<LineId> = spec
        .in_file_order(spec.tags(&key))
        .into_iter()
        .filter(|t| t.num == num)
        .map(|t| t.line)
        .collect();
    if lines.is_empty() {
        tracing::warn!("trying to delete non-existent tag '{}:'", tag_label(name, num));
        return Ok(None);
    }
    let mut prev = None;
    for line in lines {
        tracing::debug!("removing '{}:' tag", tag_label(name, num));
        prev = spec.delete_line(line)?;
    }
    Ok(prev)
}

/// Rewrite every `%<name><id>` macro with new arguments, or add one after
/// `after` if there is none. Returns the last line written.
pub fn set_special_macro(
    spec: &mut SpecFile,
    name: &str,
    id: i32,
    args: &str,
    after: LineId,
) -> Result<LineId, SpecError> {
    let key = check_macro(name)?;
    let text = format!("%{}{} {}\n", key, id, args);
    let existing: Vec<LineId> = spec
        .directives(&key)
        .iter()
        .filter(|d| d.id == Some(id))
        .map(|d| d.line)
        .collect();

    if existing.is_empty() {
        tracing::debug!("adding '%{}{}' macro", key, id);
        return spec.insert_line_after(after, text, ParseMode::Body);
    }
    let mut last = after;
    for line in existing {
        tracing::debug!("updating '%{}{}' macro", key, id);
        spec.replace_line(line, text.clone(), ParseMode::Body)?;
        last = line;
    }
    Ok(last)
}

/// Delete every `%<name><id>` macro. Returns the line preceding the last one
/// removed.
pub fn delete_special_macro(
    spec: &mut SpecFile,
    name: &str,
    id: i32,
) -> Result<Option<LineId>, SpecError> {
    let key = check_macro(name)?;
    let lines: Vec<LineId> = spec
        .in_file_order(spec.directives(&key))
        .into_iter()
        .filter(|d| d.id == Some(id))
        .map(|d| d.line)
        .collect();
    if lines.is_empty() {
        tracing::warn!("trying to delete non-existent macro '%{}{}'", key, id);
        return Ok(None);
    }
    let mut prev = None;
    for line in lines {
        prev = spec.delete_line(line)?;
    }
    Ok(prev)
}

/// Replace the body of a section, creating the section at the end of the
/// file if it does not exist.
pub fn set_section(spec: &mut SpecFile, name: &str, text: &str) -> Result<(), SpecError> {
    let key = name.to_lowercase();
    if !is_section_name(&key) {
        return Err(SpecError::UnknownSection(name.to_string()));
    }

    let headers: Vec<LineId> = spec.directives(&key).iter().map(|d| d.line).collect();
    let mut line = match headers.as_slice() {
        [] => {
            tracing::debug!("adding missing %{} section", key);
            if let Some(last) = spec.buffer().last() {
                let last_text = spec.line_text(last);
                if !last_text.ends_with('\n') {
                    // Only the terminator changes, so the index entry stays valid
                    let terminated = format!("{}\n", last_text);
                    spec.buffer.set(last, terminated)?;
                }
            }
            spec.append_line(format!("%{}\n", key), ParseMode::Body)
        }
        [header] => {
            loop {
                let Some(next) = spec.buffer().next(*header) else {
                    break;
                };
                if is_section_line(spec.line_text(next)) {
                    break;
                }
                spec.delete_line(next)?;
            }
            *header
        }
        _ => return Err(SpecError::AmbiguousSection(key)),
    };

    for body_line in text.lines() {
        line = spec.insert_line_after(line, format!("{}\n", body_line), ParseMode::Body)?;
    }
    Ok(())
}

fn live(spec: &SpecFile, line: Option<LineId>) -> Option<LineId> {
    line.filter(|id| spec.buffer().contains(*id))
}

/// Replace the non-ignored patches of the spec with `patches`.
///
/// Old `Patch` tags and `%patch` macros are removed together with their
/// generated comments and bare `%if`/`%endif` wrappers. New patches are
/// numbered after the highest ignored patch and get a `%patch<N> -p1` macro
/// each, wrapped in `%if`/`%ifarch` when `commands` asks for it.
pub fn update_patch_series(
    spec: &mut SpecFile,
    patches: &[String],
    commands: &PatchCommands,
) -> Result<(), SpecError> {
    let ignored = spec.ignored_patches()?;

    let mut tag_prev = None;
    let old_tags: Vec<(LineId, Option<i32>)> = spec
        .in_file_order(spec.tags("patch"))
        .into_iter()
        .map(|t| (t.line, t.num))
        .collect();
    for (line, num) in old_tags {
        if num.is_some_and(|n| ignored.contains(&n)) || !spec.buffer().contains(line) {
            continue;
        }
        tag_prev = spec.delete_line(line)?;
        if let Some(prev) = tag_prev
            && AUTOGEN_COMMENT.is_match(spec.line_text(prev))
        {
            tag_prev = spec.delete_line(prev)?;
        }
    }

    let mut macro_prev = None;
    let old_macros: Vec<(LineId, Option<i32>)> = spec
        .in_file_order(spec.directives("patch"))
        .into_iter()
        .map(|d| (d.line, d.id))
        .collect();
    for (line, id) in old_macros {
        if id.is_some_and(|n| ignored.contains(&n)) || !spec.buffer().contains(line) {
            continue;
        }
        macro_prev = spec.delete_line(line)?;
        let Some(prev) = macro_prev else { continue };

        if let Some(next) = spec.buffer().next(prev)
            && spec.line_text(prev).starts_with("%if")
            && spec.line_text(next).starts_with("%endif")
        {
            spec.delete_line(next)?;
            macro_prev = spec.delete_line(prev)?;
        }
        if let Some(prev) = macro_prev
            && PATCH_COMMENT.is_match(spec.line_text(prev).trim_end_matches(['\n', '\r']))
        {
            macro_prev = spec.delete_line(prev)?;
        }
    }

    if patches.is_empty() {
        return Ok(());
    }

    let last_tag = |spec: &SpecFile, name: &str| spec.last_in_file(spec.tags(name)).map(|t| t.line);
    let tag_anchor = if let Some(line) = live(spec, tag_prev) {
        tracing::debug!("adding 'Patch' tags in place of the removed tags");
        line
    } else if let Some(line) = last_tag(spec, "patch") {
        tracing::debug!("adding new 'Patch' tags after the last 'Patch' tag");
        line
    } else if let Some(line) = last_tag(spec, "source") {
        tracing::debug!("no old 'Patch' tags, adding new patches after the last 'Source' tag");
        line
    } else if let Some(line) = last_tag(spec, "name") {
        tracing::debug!("no 'Patch' or 'Source' tags, adding new patches after the 'Name' tag");
        line
    } else {
        return Err(SpecError::NoInsertionPoint("'Patch' tags".to_string()));
    };

    let last_directive =
        |spec: &SpecFile, name: &str| spec.last_in_file(spec.directives(name)).map(|d| d.line);
    let macro_anchor = if let Some(marker) = spec.last_in_file(spec.gbp_tags("patch-macros")) {
        tracing::debug!("adding '%patch' macros after the start marker");
        marker.line
    } else if let Some(line) = live(spec, macro_prev) {
        tracing::debug!("adding '%patch' macros in place of the removed macros");
        line
    } else if let Some(line) = last_directive(spec, "patch") {
        tracing::debug!("adding new '%patch' macros after the last existing '%patch' macro");
        line
    } else if let Some(line) = last_directive(spec, "setup") {
        tracing::debug!("no old '%patch' macros, adding new patches after the last '%setup' macro");
        line
    } else if let Some(line) = last_directive(spec, "prep") {
        tracing::warn!(
            "didn't find any old '%patch' macros or '%setup' macro, adding new patches directly after '%prep' directive"
        );
        line
    } else {
        return Err(SpecError::NoInsertionPoint("%patch macros".to_string()));
    };

    let start = ignored.last().map_or(0, |max| max + 1);
    tracing::debug!("starting patch numbering from {}", start);

    let mut tag_line = spec.insert_line_after(tag_anchor, AUTOGEN_HEADER.to_string(), ParseMode::Preamble)?;
    let mut macro_line = macro_anchor;
    for (num, patch) in (start..).zip(patches) {
        tag_line = write_tag(spec, "Patch", Some(num), patch, tag_line)?;

        let comment = Path::new(patch)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| patch.clone());
        macro_line = spec.insert_line_after(macro_line, format!("# {}\n", comment), ParseMode::Body)?;
        macro_line = set_special_macro(spec, "patch", num, "-p1", macro_line)?;

        let conditional = commands
            .get(patch)
            .and_then(|cmds| cmds.iter().find(|(cmd, _)| matches!(cmd.as_str(), "if" | "ifarch")));
        if let Some((cmd, args)) = conditional {
            spec.insert_line_before(macro_line, format!("%{} {}\n", cmd, args), ParseMode::Body)?;
            macro_line = spec.insert_line_after(macro_line, "%endif\n".to_string(), ParseMode::Body)?;
        }
    }
    Ok(())
}

/// [`update_patch_series`] for patch files, named relative to the spec directory
pub fn update_patch_series_from(
    spec: &mut SpecFile,
    series: &PatchSeries,
    commands: &PatchCommands,
) -> Result<(), SpecError> {
    let names: Vec<String> = series
        .iter()
        .map(|p| {
            p.path
                .strip_prefix(&spec.spec_dir)
                .unwrap_or(&p.path)
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    update_patch_series(spec, &names, commands)
}
