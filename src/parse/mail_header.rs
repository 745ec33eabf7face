use std::sync::LazyLock;

use mailparse::{MailAddr, MailHeaderMap};
use regex::Regex;

use crate::parse::dep3::{is_diff_start, split_name_email};

/// `From <sha> <date>` separator line written by `git format-patch`
static MBOX_FROM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^From \S+").unwrap());

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*:").unwrap());

/// `[PATCH 1/3]`-style prefixes of a mail subject
static SUBJECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\[[^\]]*\]\s*)+").unwrap());

/// Error type for mail header extraction
#[derive(Debug, thiserror::Error)]
pub enum MailInfoError {
    #[error("malformed mail header: {0}")]
    Malformed(#[from] mailparse::MailParseError),
}

/// Headers and message body extracted from a mail-formatted patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailHeaders {
    pub subject: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
    /// Free text between the headers and the diff
    pub body: String,
}

impl MailHeaders {
    /// Whether any of the recognised headers were found
    pub fn has_headers(&self) -> bool {
        self.subject.is_some() || self.author.is_some() || self.email.is_some() || self.date.is_some()
    }
}

/// Extracts mail headers from patch content.
///
/// Finding no headers is `Ok` with an empty [`MailHeaders`]; `Err` means the
/// content carried a header block that could not be parsed.
pub trait MailInfo {
    fn parse(&self, content: &str) -> Result<MailHeaders, MailInfoError>;
}

/// [`MailInfo`] backed by the `mailparse` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct MailparseInfo;

impl MailInfo for MailparseInfo {
    fn parse(&self, content: &str) -> Result<MailHeaders, MailInfoError> {
        let lines: Vec<&str> = content.lines().collect();
        let start = usize::from(lines.first().is_some_and(|l| MBOX_FROM.is_match(l)));
        let lines = &lines[start..];

        let Some(header_len) = header_block_len(lines) else {
            return Ok(MailHeaders {
                body: body_text(lines),
                ..MailHeaders::default()
            });
        };

        let block = format!("{}\n\n", lines[..header_len].join("\n"));
        let (headers, _) = mailparse::parse_headers(block.as_bytes())?;

        let mut out = MailHeaders::default();
        if let Some(from) = headers.get_first_value("From") {
            let (author, email) = parse_from(&from);
            out.author = author;
            out.email = email;
        }
        out.subject = headers
            .get_first_value("Subject")
            .map(|s| SUBJECT_PREFIX.replace(&s, "").trim().to_string())
            .filter(|s| !s.is_empty());
        out.date = headers
            .get_first_value("Date")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        out.body = body_text(lines.get(header_len + 1..).unwrap_or(&[]));
        Ok(out)
    }
}

/// Number of lines forming an RFC822 header block at the top of `lines`,
/// or `None` if the text does not start with one.
fn header_block_len(lines: &[&str]) -> Option<usize> {
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            return (idx > 0).then_some(idx);
        }
        let continuation = idx > 0 && line.starts_with([' ', '\t']);
        if !HEADER_LINE.is_match(line) && !continuation {
            return None;
        }
    }
    (!lines.is_empty()).then_some(lines.len())
}

fn body_text(lines: &[&str]) -> String {
    lines
        .iter()
        .take_while(|l| !is_diff_start(l))
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn parse_from(value: &str) -> (Option<String>, Option<String>) {
    match mailparse::addrparse(value).ok().as_deref().and_then(|list| list.first()) {
        Some(MailAddr::Single(info)) => (
            info.display_name
                .clone()
                .filter(|n| !n.is_empty())
                .or_else(|| Some(info.addr.clone())),
            Some(info.addr.clone()),
        ),
        _ => split_name_email(value),
    }
}
