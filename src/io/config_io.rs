use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::PkgConfig;

pub const CONFIG_FILE: &str = "pkgq.toml";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Find pkgq.toml by walking up from `start`
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn read_config(path: &Path) -> Result<PkgConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the configuration that applies to `start`, together with the
/// directory relative paths in it resolve against. Without a config file
/// the defaults apply relative to `start`.
pub fn load_config(start: &Path) -> Result<(PkgConfig, PathBuf), ConfigError> {
    match discover_config(start) {
        Some(path) => {
            tracing::debug!("using config {}", path.display());
            let config = read_config(&path)?;
            let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| start.to_path_buf());
            Ok((config, root))
        }
        None => Ok((PkgConfig::default(), start.to_path_buf())),
    }
}
