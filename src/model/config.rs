use serde::{Deserialize, Serialize};

/// Configuration from pkgq.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgConfig {
    #[serde(default)]
    pub packaging: PackagingConfig,
    #[serde(default)]
    pub changelog: ChangelogConfig,
    #[serde(default)]
    pub pq: PqConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingConfig {
    /// Packaging directory, relative to the config file
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Spec file name; empty means the single `*.spec` in `dir`
    #[serde(default)]
    pub spec_file: String,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        PackagingConfig {
            dir: default_dir(),
            spec_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogConfig {
    /// `rpm` or `debian`
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        ChangelogConfig {
            policy: default_policy(),
            name: String::new(),
            email: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqConfig {
    /// Where exported patches are written, relative to the packaging dir
    #[serde(default = "default_dir")]
    pub patch_dir: String,
}

impl Default for PqConfig {
    fn default() -> Self {
        PqConfig {
            patch_dir: default_dir(),
        }
    }
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_policy() -> String {
    "rpm".to_string()
}
