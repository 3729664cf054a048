use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::store::StorePath;

const CONFIG_FILE_NAME: &str = "preview.yaml";

pub const DEFAULT_ROOT_ALIAS: &str = "@/";
pub const DEFAULT_EXTENSIONS: [&str; 4] = [".jsx", ".tsx", ".js", ".ts"];
pub const DEFAULT_INDEX_BASENAME: &str = "index";
pub const DEFAULT_ENTRY_POINTS: [&str; 6] = [
    "/App.jsx",
    "/App.tsx",
    "/index.jsx",
    "/index.tsx",
    "/src/App.jsx",
    "/src/App.tsx",
];
pub const DEFAULT_PACKAGE_CDN: &str = "https://esm.sh";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Resolution and preview settings.
///
/// `extensions` doubles as the probing priority: when `Button.jsx` and
/// `Button.tsx` both exist, `./Button` resolves to whichever extension is
/// listed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    pub root_alias: String,
    pub extensions: Vec<String>,
    pub index_basename: String,
    pub entry_points: Vec<StorePath>,
    pub package_cdn: String,
    pub package_versions: BTreeMap<String, String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            root_alias: DEFAULT_ROOT_ALIAS.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            index_basename: DEFAULT_INDEX_BASENAME.to_string(),
            entry_points: DEFAULT_ENTRY_POINTS
                .iter()
                .filter_map(|path| StorePath::parse(path).ok())
                .collect(),
            package_cdn: DEFAULT_PACKAGE_CDN.to_string(),
            package_versions: BTreeMap::new(),
        }
    }
}

impl PreviewConfig {
    /// Reads `preview.yaml` from the project root, falling back to defaults when absent.
    pub async fn read(root: &Path) -> Result<Self, ConfigError> {
        Self::from_path(get_config_file_path(root)).await
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        debug!("Opening config file: {}", path.display());
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No {} found, using default preview settings", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    file_path: path.display().to_string(),
                });
            }
        };
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        contents.as_str().try_into()
    }

    pub fn is_script_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|known| known == extension)
    }

    fn apply_yaml(&mut self, top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<(), ConfigError> {
        for (key, value) in top_level.iter() {
            let Some(key) = key.as_str() else {
                warn!("Skipping non-string config key: {:?}", key);
                continue;
            };
            match key {
                "root_alias" => {
                    let alias = string_field(key, value)?;
                    ensure!(
                        !alias.is_empty() && alias.ends_with('/') && !alias.starts_with('/'),
                        InvalidFieldSnafu {
                            field: key,
                            reason: "must be a non-empty prefix ending in '/' such as '@/'",
                        }
                    );
                    self.root_alias = alias;
                }
                "extensions" => {
                    let extensions = string_list_field(key, value)?;
                    ensure!(
                        !extensions.is_empty()
                            && extensions.iter().all(|ext| ext.len() > 1 && ext.starts_with('.')),
                        InvalidFieldSnafu {
                            field: key,
                            reason: "must be a non-empty list of extensions starting with '.'",
                        }
                    );
                    self.extensions = extensions;
                }
                "index_basename" => {
                    let basename = string_field(key, value)?;
                    ensure!(
                        !basename.is_empty() && !basename.contains('/'),
                        InvalidFieldSnafu {
                            field: key,
                            reason: "must be a plain file name",
                        }
                    );
                    self.index_basename = basename;
                }
                "entry_points" => {
                    let entries = string_list_field(key, value)?
                        .iter()
                        .map(|raw| {
                            StorePath::parse(raw).map_err(|err| ConfigError::InvalidField {
                                field: key.to_string(),
                                reason: err.to_string(),
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    ensure!(
                        !entries.is_empty(),
                        InvalidFieldSnafu {
                            field: key,
                            reason: "must list at least one entry file",
                        }
                    );
                    self.entry_points = entries;
                }
                "package_cdn" => {
                    let cdn = string_field(key, value)?;
                    self.package_cdn = cdn.trim_end_matches('/').to_string();
                }
                "package_versions" => {
                    let mapping = value.as_mapping().context(InvalidFieldSnafu {
                        field: key,
                        reason: "must be a mapping of package name to version",
                    })?;
                    for (package, version) in mapping.iter() {
                        let (Some(package), Some(version)) = (package.as_str(), scalar_text(version))
                        else {
                            warn!("Skipping invalid package version entry: {:?}", package);
                            continue;
                        };
                        self.package_versions.insert(package.to_string(), version);
                    }
                }
                unknown => warn!("Ignoring unknown config key '{}'", unknown),
            }
        }
        Ok(())
    }
}

impl TryFrom<&str> for PreviewConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let mut config = PreviewConfig::default();

        let Some(document) = documents.first() else {
            return Ok(config);
        };
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;
        config.apply_yaml(top_level)?;

        Ok(config)
    }
}

fn string_field(field: &str, value: &Yaml) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_string)
        .context(InvalidFieldSnafu {
            field,
            reason: "must be a string",
        })
}

fn string_list_field(field: &str, value: &Yaml) -> Result<Vec<String>, ConfigError> {
    value
        .as_sequence()
        .context(InvalidFieldSnafu {
            field,
            reason: "must be a list of strings",
        })?
        .iter()
        .map(|item| string_field(field, item))
        .collect()
}

/// Versions are written as `18`, `18.2` or `"^18.2.0"`; keep the text either way.
fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::Value(Scalar::String(text)) => Some(text.to_string()),
        Yaml::Value(Scalar::Integer(number)) => Some(number.to_string()),
        Yaml::Value(Scalar::FloatingPoint(number)) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Config file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Config field '{}' {}", field, reason))]
    InvalidField { field: String, reason: String },
}
