use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::registry::{Category, CategoryEntry, Column, ColumnSchema, Registry, RegistryError};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub identity_path: Option<String>,
    pub login_path: Option<String>,
    pub logout_path: Option<String>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub tab: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub interactive: Option<bool>,
    pub no_color: Option<bool>,
    pub categories: Option<Vec<CategoryConfig>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    #[serde(default)]
    pub icon: String,
    pub label: String,
    pub endpoint: String,
    #[serde(default, alias = "key")]
    pub identity_field: Option<String>,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    pub header: String,
    pub field: String,
}

impl CategoryConfig {
    fn into_entry(self) -> CategoryEntry {
        CategoryEntry {
            category: Category {
                icon: self.icon,
                label: self.label,
            },
            endpoint: self.endpoint,
            schema: ColumnSchema {
                columns: self
                    .columns
                    .iter()
                    .map(|c| Column::field(&c.header, &c.field))
                    .collect(),
                identity_field: self.identity_field.filter(|f| !f.trim().is_empty()),
            },
        }
    }
}

/// The configured categories, or the built-in pair when none are set.
pub fn build_registry(cfg: &ConfigFile) -> Result<Registry, RegistryError> {
    match cfg.categories.as_ref() {
        Some(categories) => Registry::new(
            categories
                .iter()
                .cloned()
                .map(CategoryConfig::into_entry)
                .collect(),
        ),
        None => Ok(Registry::default()),
    }
}

const CONFIG_DIR: &str = ".databrowse";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write config '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `HOME`, then `USERPROFILE`, then `HOMEDRIVE` + `HOMEPATH`. Empty values
/// count as unset.
fn home_dir() -> Option<PathBuf> {
    let non_empty = |key: &str| env::var_os(key).filter(|v| !v.is_empty());
    if let Some(home) = ["HOME", "USERPROFILE"].into_iter().find_map(non_empty) {
        return Some(PathBuf::from(home));
    }
    let mut home = PathBuf::from(non_empty("HOMEDRIVE")?);
    home.push(non_empty("HOMEPATH")?);
    Some(home)
}

pub fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Expands a leading `~` or `~/...`; `~user` forms are left untouched.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            rest.trim_start_matches(['/', '\\'])
        }
        _ => return PathBuf::from(path),
    };
    match home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Reads and parses `path`. A missing file yields the empty config when
/// `allow_missing` is set (the implicit default location).
pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !allow_missing {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ConfigFile::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
}

fn default_config_yaml() -> String {
    r#"# databrowse config
#
# Location (default):
#   ~/.databrowse/config.yml

# Site hosting the data API and the identity endpoints
# base_url: https://example.azurestaticapps.net/

# Identity provider
identity_path: /.auth/me
login_path: /.auth/login/aad
logout_path: /.auth/logout

# HTTP (optional)
# timeout: 10
# proxy: http://127.0.0.1:8080
# header: "Key: Value"

# Output
# output: ./page.html
# output_format: html
interactive: false
no_color: false

# Tab selected after the page mounts (defaults to the first category)
# tab: Employees

# Categories (order is tab order; the first one is the default tab).
# Omit to use the built-in Transactions/Employees pair.
# categories:
#   - icon: "🍅"
#     label: Transactions
#     endpoint: /data-api/rest/Transaction
#     identity_field: Transaction_ID
#     columns:
#       - { header: ID, field: Transaction_ID }
#       - { header: ProductID, field: Product_ID }
#   - icon: "🥬"
#     label: Employees
#     endpoint: /data-api/rest/Employees
#     identity_field: employee_id
#     columns:
#       - { header: EmployeeID, field: employee_id }
#       - { header: FirstName, field: first_name }
"#
    .to_string()
}

/// Writes the commented template unless a file is already there. Returns
/// whether a new file was created.
pub fn write_default_config(path: &Path) -> Result<bool, ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(write_err(e)),
    };
    file.write_all(default_config_yaml().as_bytes())
        .map_err(write_err)?;
    Ok(true)
}
