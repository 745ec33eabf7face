use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::patch::{Patch, PatchSeries};

/// Trailing `# comment` of a series line
static TRAILING_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+#.*$").unwrap());

/// Error type for series file handling
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("could not read series file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid strip level in series line '{0}'")]
    InvalidStrip(String),
}

/// Read a series file. A missing file yields an empty series.
pub fn read_series_file(path: &Path, patch_dir: &Path) -> Result<PatchSeries, SeriesError> {
    if !path.exists() {
        tracing::debug!("no series file at {}", path.display());
        return Ok(PatchSeries::new());
    }
    let bytes = fs::read(path).map_err(|source| SeriesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_series(&String::from_utf8_lossy(&bytes), patch_dir)
}

/// Parse series file content: one `path [-pN] [# comment]` entry per line
pub fn parse_series(text: &str, patch_dir: &Path) -> Result<PatchSeries, SeriesError> {
    let mut series = PatchSeries::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = TRAILING_COMMENT.replace(line, "");
        let (rel, strip) = split_strip(&line)?;
        let topic = Path::new(rel)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|t| !t.is_empty());
        series.push(Patch::dep3(patch_dir.join(rel), topic, strip));
    }
    Ok(series)
}

/// Split a trailing `-pN` token off a series entry
fn split_strip(line: &str) -> Result<(&str, Option<u32>), SeriesError> {
    let line = line.trim_end();
    if let Some((path, last)) = line.rsplit_once(char::is_whitespace)
        && let Some(level) = last.strip_prefix("-p")
    {
        let level = level
            .parse()
            .map_err(|_| SeriesError::InvalidStrip(line.to_string()))?;
        return Ok((path.trim_end(), Some(level)));
    }
    Ok((line, None))
}

/// Render a series as series file content, paths relative to `patch_dir`
pub fn write_series(series: &PatchSeries, patch_dir: &Path) -> String {
    let mut out = String::new();
    for patch in series {
        let rel = patch.path.strip_prefix(patch_dir).unwrap_or(&patch.path);
        out.push_str(&rel.to_string_lossy());
        if let Some(strip) = patch.strip {
            out.push_str(&format!(" -p{}", strip));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn summary(series: &PatchSeries) -> Vec<(PathBuf, Option<String>, Option<u32>)> {
        series
            .iter()
            .map(|p| (p.path.clone(), p.topic.clone(), p.strip))
            .collect()
    }

    #[test]
    fn test_parse_series_entries() {
        let series = parse_series("a/b\na -p1 # comment\na/b -p2\n", Path::new(".")).unwrap();
        assert_eq!(
            summary(&series),
            vec![
                (PathBuf::from("./a/b"), Some("a".to_string()), None),
                (PathBuf::from("./a"), None, Some(1)),
                (PathBuf::from("./a/b"), Some("a".to_string()), Some(2)),
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let series = parse_series("# header\n\n  \nfix.patch\n", Path::new("debian/patches")).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.patches[0].path, PathBuf::from("debian/patches/fix.patch"));
    }

    #[test]
    fn test_hash_inside_name_is_kept() {
        let series = parse_series("fix#1.patch\n", Path::new(".")).unwrap();
        assert_eq!(series.patches[0].path, PathBuf::from("./fix#1.patch"));
    }

    #[test]
    fn test_invalid_strip_level() {
        let err = parse_series("fix.patch -pX\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidStrip(line) if line == "fix.patch -pX"));
    }

    #[test]
    fn test_missing_series_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let series = read_series_file(&tmp.path().join("series"), tmp.path()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_write_series() {
        let dir = Path::new("debian/patches");
        let series = parse_series("upstream/a.patch\nb.patch -p0\n", dir).unwrap();
        assert_eq!(write_series(&series, dir), "upstream/a.patch\nb.patch -p0\n");
    }
}
