use serde::Serialize;

/// Compression formats recognised in archive file names: `(name, extension)`
const COMPRESSIONS: &[(&str, &str)] = &[
    ("gzip", "gz"),
    ("bzip2", "bz2"),
    ("lzma", "lzma"),
    ("xz", "xz"),
];

/// Archive formats recognised in archive file names
const FORMATS: &[&str] = &["tar", "zip"];

/// Single-extension shorthands: `(extension, format, compression)`
const ALIASES: &[(&str, &str, &str)] = &[
    ("tgz", "tar", "gzip"),
    ("tbz", "tar", "bzip2"),
    ("tbz2", "tar", "bzip2"),
    ("tlz", "tar", "lzma"),
    ("txz", "tar", "xz"),
];

/// An archive file name split into base name, format and compression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveName {
    pub base: String,
    pub format: Option<String>,
    pub compression: Option<String>,
}

/// Split an archive file name like `foo-1.0.tar.bz2`.
///
/// Returns `None` if the name carries neither a known format nor a known
/// compression suffix.
pub fn parse_filename(filename: &str) -> Option<ArchiveName> {
    let (stem, ext) = filename.rsplit_once('.')?;

    if let Some((_, format, compression)) = ALIASES.iter().find(|(e, _, _)| *e == ext) {
        return Some(ArchiveName {
            base: stem.to_string(),
            format: Some(format.to_string()),
            compression: Some(compression.to_string()),
        });
    }

    if FORMATS.contains(&ext) {
        return Some(ArchiveName {
            base: stem.to_string(),
            format: Some(ext.to_string()),
            compression: None,
        });
    }

    let compression = compression_from_extension(ext)?;
    let (base, format) = match stem.rsplit_once('.') {
        Some((base, fmt)) if FORMATS.contains(&fmt) => (base, Some(fmt.to_string())),
        _ => (stem, None),
    };
    Some(ArchiveName {
        base: base.to_string(),
        format,
        compression: Some(compression.to_string()),
    })
}

/// Compression name for a file extension (`bz2` → `bzip2`)
pub fn compression_from_extension(ext: &str) -> Option<&'static str> {
    COMPRESSIONS
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(name, _)| *name)
}

/// File extension for a compression name (`bzip2` → `bz2`)
pub fn compression_extension(name: &str) -> Option<&'static str> {
    COMPRESSIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ext)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> Option<(String, Option<String>, Option<String>)> {
        parse_filename(name).map(|a| (a.base, a.format, a.compression))
    }

    fn owned(base: &str, fmt: Option<&str>, comp: Option<&str>) -> Option<(String, Option<String>, Option<String>)> {
        Some((
            base.to_string(),
            fmt.map(str::to_string),
            comp.map(str::to_string),
        ))
    }

    #[test]
    fn test_parse_filename_table() {
        assert_eq!(split("foo-1.0.tar.bz2"), owned("foo-1.0", Some("tar"), Some("bzip2")));
        assert_eq!(split("foo-1.0.tar.gz"), owned("foo-1.0", Some("tar"), Some("gzip")));
        assert_eq!(split("foo-1.0.tar.xz"), owned("foo-1.0", Some("tar"), Some("xz")));
        assert_eq!(split("foo-1.0.tar"), owned("foo-1.0", Some("tar"), None));
        assert_eq!(split("foo-1.0.zip"), owned("foo-1.0", Some("zip"), None));
        assert_eq!(split("foo-1.0.tgz"), owned("foo-1.0", Some("tar"), Some("gzip")));
        assert_eq!(split("foo-1.0.tbz2"), owned("foo-1.0", Some("tar"), Some("bzip2")));
        assert_eq!(split("foo.gz"), owned("foo", None, Some("gzip")));
    }

    #[test]
    fn test_parse_filename_unknown() {
        assert_eq!(parse_filename("foo-1.0.patch"), None);
        assert_eq!(parse_filename("README"), None);
    }

    #[test]
    fn test_compression_extension_lookup() {
        assert_eq!(compression_extension("bzip2"), Some("bz2"));
        assert_eq!(compression_from_extension("lzma"), Some("lzma"));
        assert_eq!(compression_extension("zstd"), None);
    }
}
