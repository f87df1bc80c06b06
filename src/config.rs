// src/config.rs

pub mod auth;

use self::auth::load_or_create_external_config;
use crate::{
    catalog::{self, EndpointTemplate, ResourceCatalog},
    cli::Cli,
    constants,
    error::AppResult,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub server_prefixes: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DownloadConfig {
    pub max_workers: Option<usize>,
    pub segment_workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accesstoken: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    /// 覆盖内置的详情页路径 -> 接口模板映射
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<HashMap<String, EndpointTemplate>>,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        let network_config = NetworkConfig {
            server_prefixes: Some(catalog::default_server_prefixes()),
            connect_timeout_secs: Some(10),
            timeout_secs: Some(60),
            max_retries: Some(3),
        };
        let download_config = DownloadConfig {
            max_workers: Some(constants::DEFAULT_MAX_WORKERS),
            segment_workers: Some(constants::DEFAULT_SEGMENT_WORKERS),
        };

        Self {
            accesstoken: None,
            network: network_config,
            download: download_config,
            endpoints: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 批量下载时同时进行的文件数
    pub max_workers: usize,
    /// 单个视频同时下载的分片数
    pub segment_workers: usize,
    pub server_prefixes: Vec<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub endpoints: Option<HashMap<String, EndpointTemplate>>,
    pub access_token: Option<String>,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        Ok(Self::from_parts(args, external_config))
    }

    pub fn from_parts(args: &Cli, external: ExternalConfig) -> Self {
        let server_prefixes = external
            .network
            .server_prefixes
            .filter(|p| !p.is_empty())
            .unwrap_or_else(catalog::default_server_prefixes);

        Self {
            max_workers: args
                .workers
                .or(external.download.max_workers)
                .unwrap_or(constants::DEFAULT_MAX_WORKERS)
                .max(1),
            segment_workers: args
                .segment_workers
                .or(external.download.segment_workers)
                .unwrap_or(constants::DEFAULT_SEGMENT_WORKERS)
                .max(1),
            server_prefixes,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(external.network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(external.network.timeout_secs.unwrap_or(60)),
            max_retries: external.network.max_retries.unwrap_or(3),
            endpoints: external.endpoints,
            access_token: external.accesstoken,
        }
    }

    pub fn catalog(&self) -> ResourceCatalog {
        let catalog = ResourceCatalog::builtin().with_server_prefixes(self.server_prefixes.clone());
        match &self.endpoints {
            Some(endpoints) if !endpoints.is_empty() => catalog.with_endpoints(endpoints.clone()),
            _ => catalog,
        }
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            segment_workers: 4,
            server_prefixes: vec!["s-file-1".to_string()],
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 0,
            endpoints: None,
            access_token: None,
        }
    }
}
