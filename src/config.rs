use std::fs;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

pub const DEFAULT_API_BASE: &str = "https://api.osf.io/v2";
pub const DEFAULT_TAG: &str = "canadian-open-neuroscience-platform";
pub const DEFAULT_LOGIN_URL: &str = "https://accounts.osf.io/login";
pub const DEFAULT_DATASETS_ROOT: &str = "projects";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub osf_token: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub datasets_root: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub tag: String,
    pub login_url: String,
    pub datasets_root: Utf8PathBuf,
}

impl ResolvedConfig {
    /// Listing endpoint for every project carrying the configured tag.
    pub fn query_url(&self) -> String {
        format!(
            "{}/nodes/?filter[tags]={}",
            self.api_base.trim_end_matches('/'),
            self.tag
        )
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MirrorError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => match default_config_path() {
                Some(path) => path,
                None => return Self::resolve_config(Config::default()),
            },
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| MirrorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MirrorError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MirrorError> {
        let token = config
            .osf_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        let tag = config.tag.unwrap_or_else(|| DEFAULT_TAG.to_string());
        if tag.trim().is_empty() {
            return Err(MirrorError::ConfigParse("tag must not be empty".to_string()));
        }

        Ok(ResolvedConfig {
            token,
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            tag,
            login_url: config
                .login_url
                .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
            datasets_root: Utf8PathBuf::from(
                config
                    .datasets_root
                    .unwrap_or_else(|| DEFAULT_DATASETS_ROOT.to_string()),
            ),
        })
    }
}

pub fn default_config_path() -> Option<Utf8PathBuf> {
    BaseDirs::new().and_then(|dirs| {
        Utf8PathBuf::from_path_buf(dirs.config_dir().join("osf-mirror").join("config.json")).ok()
    })
}
