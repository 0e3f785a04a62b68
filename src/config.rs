use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SeqvaultError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub data_path: String,
    pub archived_path: String,
    #[serde(default = "default_rsync_options")]
    pub rsync_options: Vec<String>,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub server: String,
    pub base_path: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_root: Utf8PathBuf,
    pub archive_root: Utf8PathBuf,
    pub rsync_options: Vec<String>,
    pub api: ApiConfig,
}

impl ResolvedConfig {
    /// Test constructor with filesystem roots only.
    pub fn new_with_paths(data_root: Utf8PathBuf, archive_root: Utf8PathBuf) -> Self {
        Self {
            data_root,
            archive_root,
            rsync_options: default_rsync_options(),
            api: ApiConfig {
                server: "http://localhost".to_string(),
                base_path: "/drylab/api/".to_string(),
                user: None,
                password: None,
            },
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SeqvaultError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("seqvault.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(SeqvaultError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SeqvaultError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SeqvaultError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SeqvaultError> {
        let mut api = config.api;
        if let Ok(user) = std::env::var("SEQVAULT_API_USER") {
            if !user.trim().is_empty() {
                api.user = Some(user.trim().to_string());
            }
        }
        if let Ok(password) = std::env::var("SEQVAULT_API_PASSWORD") {
            if !password.trim().is_empty() {
                api.password = Some(password.trim().to_string());
            }
        }

        Ok(ResolvedConfig {
            data_root: Utf8PathBuf::from(config.data_path),
            archive_root: Utf8PathBuf::from(config.archived_path),
            rsync_options: config.rsync_options,
            api,
        })
    }
}

pub fn default_rsync_options() -> Vec<String> {
    vec!["-a".to_string(), "--partial".to_string()]
}
