use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::buffer::LinkedTextBuffer;
use crate::model::spec::SpecFile;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<name>[a-z]+)(?P<num>[0-9]+)?\s*:\s*(?P<value>\S(.*\S)?)\s*$").unwrap()
});

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^%(?P<name>[a-z_]+)(?P<num>[0-9]+)?(\s+(?P<args>.*))?$").unwrap()
});

static GBP_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*#\s*gbp-(?P<name>[a-z-]+)(\s*:\s*(?P<args>.*))?$").unwrap()
});

/// Directives that open a new section and end the preamble
pub const SECTION_NAMES: &[&str] = &[
    "package",
    "description",
    "prep",
    "build",
    "install",
    "clean",
    "check",
    "pre",
    "preun",
    "post",
    "postun",
    "pretrans",
    "posttrans",
    "verifyscript",
    "files",
    "changelog",
    "triggerin",
    "triggerun",
    "triggerprein",
    "triggerpostun",
    "filetriggerin",
    "filetriggerun",
    "filetriggerpostun",
    "transfiletriggerin",
    "transfiletriggerun",
    "transfiletriggerpostun",
    "generate_buildrequires",
    "conf",
    "sourcelist",
    "patchlist",
];

pub fn is_section_name(name: &str) -> bool {
    SECTION_NAMES.contains(&name.to_lowercase().as_str())
}

/// Whether a line is a section-opening directive such as `%build`
pub fn is_section_line(text: &str) -> bool {
    let text = text.trim_end_matches(['\n', '\r']);
    DIRECTIVE
        .captures(text)
        .is_some_and(|caps| caps.name("num").is_none() && is_section_name(&caps["name"]))
}

/// Where in the file a line is read.
///
/// Tags are only recognised in the preamble; the first section directive
/// switches to `Body` for the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Preamble,
    Body,
}

/// Classification of a single spec line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Tag {
        name: String,
        num: Option<i32>,
        value: String,
    },
    Directive {
        name: String,
        id: Option<i32>,
        args: String,
    },
    GbpTag {
        name: String,
        args: Option<String>,
    },
    Other,
}

impl LineKind {
    pub fn opens_section(&self) -> bool {
        matches!(self, LineKind::Directive { name, .. } if is_section_name(name))
    }
}

pub fn classify_line(text: &str, mode: ParseMode) -> LineKind {
    let text = text.trim_end_matches(['\n', '\r']);

    if mode == ParseMode::Preamble
        && let Some(caps) = TAG.captures(text)
    {
        let name = caps["name"].to_lowercase();
        let num = match caps.name("num") {
            Some(m) => m.as_str().parse().ok(),
            None if name == "source" => Some(0),
            None if name == "patch" => Some(-1),
            None => None,
        };
        if caps.name("num").is_none() || num.is_some() {
            return LineKind::Tag {
                name,
                num,
                value: caps["value"].to_string(),
            };
        }
    }

    if let Some(caps) = DIRECTIVE.captures(text) {
        let name = caps["name"].to_lowercase();
        let args = caps
            .name("args")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let num = caps.name("num").and_then(|m| m.as_str().parse().ok());
        let id = if name == "patch" {
            num.or(parse_patch_macro_args(&args).number).or(Some(-1))
        } else {
            num
        };
        return LineKind::Directive { name, id, args };
    }

    if let Some(caps) = GBP_TAG.captures(text) {
        return LineKind::GbpTag {
            name: caps["name"].to_lowercase(),
            args: caps.name("args").map(|m| m.as_str().trim().to_string()),
        };
    }

    LineKind::Other
}

/// Options of a `%patch` macro that matter for patch bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchMacroOpts {
    /// `-P <n>`: number of the patch to apply
    pub number: Option<i32>,
    /// `-p <n>`: strip level
    pub strip: Option<u32>,
}

/// Read `-pN`, `-p N`, `-PN` and `-P N` out of `%patch` arguments.
/// Other options are ignored.
pub fn parse_patch_macro_args(args: &str) -> PatchMacroOpts {
    let mut opts = PatchMacroOpts::default();
    let mut words = args.split_whitespace();
    while let Some(word) = words.next() {
        let Some(flag) = word.strip_prefix('-') else {
            continue;
        };
        let (letter, inline) = match flag.char_indices().nth(1) {
            Some((idx, _)) => (&flag[..idx], &flag[idx..]),
            None => (flag, ""),
        };
        let mut value = || {
            if inline.is_empty() {
                words.next()
            } else {
                Some(inline)
            }
        };
        match letter {
            "p" => opts.strip = value().and_then(|v| v.parse().ok()),
            "P" => opts.number = value().and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    opts
}

/// Build a [`SpecFile`] from spec text. Parsing never fails; lines that match
/// no grammar stay in the buffer unindexed.
pub fn parse_spec(text: &str) -> SpecFile {
    let mut spec = SpecFile {
        buffer: LinkedTextBuffer::from_text(text),
        spec_dir: PathBuf::from("."),
        ..SpecFile::default()
    };
    let mut mode = ParseMode::Preamble;
    let mut lines = Vec::with_capacity(spec.buffer.len());
    for (id, text) in spec.buffer.iter() {
        let kind = classify_line(text, mode);
        if kind.opens_section() {
            mode = ParseMode::Body;
        }
        lines.push((id, kind));
    }
    for (id, kind) in lines {
        spec.index_line(id, kind);
    }
    spec
}
