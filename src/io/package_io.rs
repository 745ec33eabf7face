use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::patch::PatchSeries;
use crate::model::spec::SpecFile;
use crate::parse::series_parser::write_series;
use crate::parse::source_format::{SourceFormat, SourceFormatError, parse_source_format};
use crate::parse::spec_parser::parse_spec;

/// Error type for reading and writing packaging files
#[derive(Debug, thiserror::Error)]
pub enum SpecIoError {
    #[error("no spec file found in {0}")]
    NoSpecFile(PathBuf),
    #[error("multiple spec files found in {dir}: {names}")]
    MultipleSpecFiles { dir: PathBuf, names: String },
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("{0} is not valid UTF-8, refusing to rewrite it")]
    NotUtf8(PathBuf),
    #[error("{path}: {source}")]
    SourceFormat {
        path: PathBuf,
        source: SourceFormatError,
    },
}

/// Write a file by way of a temporary file in the same directory, so readers
/// never see a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a text file, replacing invalid UTF-8
pub fn read_text(path: &Path) -> Result<String, SpecIoError> {
    let bytes = fs::read(path).map_err(|source| SpecIoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a text file that is going to be rewritten. Invalid UTF-8 is an
/// error, since writing back a lossy decoding would corrupt the file.
pub fn read_utf8(path: &Path) -> Result<String, SpecIoError> {
    let bytes = fs::read(path).map_err(|source| SpecIoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| SpecIoError::NotUtf8(path.to_path_buf()))
}

pub fn write_text(path: &Path, text: &str) -> Result<(), SpecIoError> {
    atomic_write(path, text.as_bytes()).map_err(|source| SpecIoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Locate the spec file: `name` inside `dir` when given, else the only
/// `*.spec` file there.
pub fn find_spec_file(dir: &Path, name: Option<&str>) -> Result<PathBuf, SpecIoError> {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return Ok(dir.join(name));
    }
    let entries = fs::read_dir(dir).map_err(|source| SpecIoError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut specs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "spec"))
        .collect();
    specs.sort();
    match specs.len() {
        0 => Err(SpecIoError::NoSpecFile(dir.to_path_buf())),
        1 => Ok(specs.remove(0)),
        _ => Err(SpecIoError::MultipleSpecFiles {
            dir: dir.to_path_buf(),
            names: specs
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Load and index a spec file; patch paths resolve against its directory.
///
/// Invalid UTF-8 is replaced so the file can still be queried, but such a
/// spec is marked lossy and [`save_spec`] refuses to write it back.
pub fn load_spec(path: &Path) -> Result<SpecFile, SpecIoError> {
    let bytes = fs::read(path).map_err(|source| SpecIoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut spec = match String::from_utf8(bytes) {
        Ok(text) => parse_spec(&text),
        Err(err) => {
            tracing::warn!("{} is not valid UTF-8, loading it read-only", path.display());
            let mut spec = parse_spec(&String::from_utf8_lossy(err.as_bytes()));
            spec.lossy = true;
            spec
        }
    };
    spec.spec_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(spec)
}

pub fn save_spec(path: &Path, spec: &SpecFile) -> Result<(), SpecIoError> {
    if spec.lossy {
        return Err(SpecIoError::NotUtf8(path.to_path_buf()));
    }
    write_text(path, &spec.to_string())
}

pub fn save_series(path: &Path, series: &PatchSeries, patch_dir: &Path) -> Result<(), SpecIoError> {
    write_text(path, &write_series(series, patch_dir))
}

/// Read `debian/source/format`; a missing file means format 1.0
pub fn read_source_format(path: &Path) -> Result<SourceFormat, SpecIoError> {
    if !path.exists() {
        return Ok(SourceFormat {
            version: "1.0".to_string(),
            kind: None,
        });
    }
    let text = read_text(path)?;
    parse_source_format(&text).map_err(|source| SpecIoError::SourceFormat {
        path: path.to_path_buf(),
        source,
    })
}
