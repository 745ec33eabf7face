use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static SOURCE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<version>[0-9]+(\.[0-9]+)*)(\s+\((?P<kind>[a-z0-9]+)\))?$").unwrap()
});

/// Error type for `debian/source/format` content
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceFormatError {
    #[error("invalid source format '{0}'")]
    Invalid(String),
}

/// Content of a Debian `debian/source/format` file, e.g. `3.0 (quilt)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormat {
    pub version: String,
    pub kind: Option<String>,
}

impl SourceFormat {
    /// Whether patches are kept as a quilt series
    pub fn is_quilt(&self) -> bool {
        self.kind.as_deref() == Some("quilt")
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{} ({})", self.version, kind),
            None => write!(f, "{}", self.version),
        }
    }
}

pub fn parse_source_format(text: &str) -> Result<SourceFormat, SourceFormatError> {
    let text = text.trim();
    let caps = SOURCE_FORMAT
        .captures(text)
        .ok_or_else(|| SourceFormatError::Invalid(text.to_string()))?;
    Ok(SourceFormat {
        version: caps["version"].to_string(),
        kind: caps.name("kind").map(|m| m.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quilt_format() {
        let format = parse_source_format("3.0 (quilt)\n").unwrap();
        assert_eq!(format.version, "3.0");
        assert_eq!(format.kind.as_deref(), Some("quilt"));
        assert!(format.is_quilt());
        assert_eq!(format.to_string(), "3.0 (quilt)");
    }

    #[test]
    fn test_parse_plain_version() {
        let format = parse_source_format("1.0").unwrap();
        assert_eq!(format, SourceFormat { version: "1.0".into(), kind: None });
        assert!(!format.is_quilt());
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            parse_source_format("quilt 3.0"),
            Err(SourceFormatError::Invalid("quilt 3.0".to_string()))
        );
    }
}
