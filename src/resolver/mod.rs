// src/resolver/mod.rs

//! 把用户输入的链接解析为可下载的资源描述。

pub mod asset;
pub mod dedup;
pub mod payload;

use crate::{
    catalog::{self, EndpointTemplate, ResourceCatalog},
    client::RobustClient,
    constants::api::{self, resource_types},
    error::*,
    models::{RequestHeaders, ResourceDescriptor},
};
use anyhow::anyhow;
use log::{debug, info, warn};
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub formats: Vec<String>,
    /// 额外请求音频接口
    pub want_audio: bool,
    pub randomize_server: bool,
    /// 同时请求备用接口
    pub use_backup: bool,
}

impl ResolveOptions {
    /// 格式列表为空时拒绝。包含音频格式时自动请求音频接口。
    pub fn new<I, S>(formats: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for format in formats {
            let format = format.as_ref().trim().to_lowercase();
            if !format.is_empty() && !normalized.contains(&format) {
                normalized.push(format);
            }
        }
        if normalized.is_empty() {
            return Err(AppError::EmptyFormatSelection);
        }
        let want_audio = normalized.iter().any(|f| catalog::is_audio_format(f));
        Ok(Self {
            formats: normalized,
            want_audio,
            randomize_server: false,
            use_backup: false,
        })
    }

    pub fn with_random_server(mut self, randomize: bool) -> Self {
        self.randomize_server = randomize;
        self
    }

    pub fn with_backup(mut self, use_backup: bool) -> Self {
        self.use_backup = use_backup;
        self
    }
}

/// 唯一的准入检查：http(s) 链接，路径是已知详情页或包含直接资源路径。
pub fn is_valid_reference(catalog: &ResourceCatalog, reference: &str) -> bool {
    if !reference.starts_with("http") {
        return false;
    }
    match Url::parse(reference) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && (ResourceCatalog::is_asset_path(url.path()) || catalog.endpoint(url.path()).is_some())
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// 直接资源链接，已合成描述（格式不符时为 `None`）
    Asset(Option<ResourceDescriptor>),
    /// 需要请求的资源接口地址
    Api(Vec<String>),
}

pub struct LinkResolver {
    client: Arc<RobustClient>,
    catalog: Arc<ResourceCatalog>,
}

impl LinkResolver {
    pub fn new(client: Arc<RobustClient>, catalog: Arc<ResourceCatalog>) -> Self {
        Self { client, catalog }
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// 只做本地计算：校验链接并生成接口地址，不发起请求。
    pub fn canonical_urls(&self, reference: &str, options: &ResolveOptions) -> AppResult<ResolvedTarget> {
        if !is_valid_reference(&self.catalog, reference) {
            return Err(AppError::InvalidReference(reference.to_string()));
        }
        let url = Url::parse(reference)?;
        let path = url.path();

        if ResourceCatalog::is_asset_path(path) {
            debug!("直接资源链接: {}", reference);
            return Ok(ResolvedTarget::Asset(asset::descriptor_from_asset_link(
                &url,
                &options.formats,
            )));
        }

        let endpoint = self
            .catalog
            .endpoint(path)
            .ok_or_else(|| AppError::InvalidReference(reference.to_string()))?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if path == api::TCH_MATERIAL_PATH {
            let content_type = query.get(api::CONTENT_TYPE_PARAM).cloned().unwrap_or_default();
            if content_type != resource_types::ASSETS_DOCUMENT {
                warn!("忽略 {}={} 的链接: {}", api::CONTENT_TYPE_PARAM, content_type, reference);
                return Err(AppError::UnsupportedContentType(content_type));
            }
        }

        let id = endpoint
            .id_param()
            .and_then(|param| query.get(param))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidReference(reference.to_string()))?;
        let prefix = self
            .catalog
            .pick_server(options.randomize_server)
            .ok_or_else(|| AppError::Other(anyhow!("服务器前缀列表为空")))?;
        debug!("{} -> id={}, server={}", endpoint.name, id, prefix);

        let mut urls = vec![EndpointTemplate::instantiate(&endpoint.primary, prefix, id)];
        if options.use_backup {
            urls.extend(
                endpoint
                    .backups
                    .iter()
                    .map(|t| EndpointTemplate::instantiate(t, prefix, id)),
            );
        }
        if options.want_audio
            && let Some(audio) = &endpoint.audio
        {
            let audio_url = EndpointTemplate::instantiate(audio, prefix, id);
            debug!("音频接口: {}", audio_url);
            urls.push(audio_url);
        }
        Ok(ResolvedTarget::Api(urls))
    }

    /// 解析单个链接。准入失败返回错误；单个接口请求或解析失败只记录日志并跳过。
    pub async fn resolve(
        &self,
        reference: &str,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<ResourceDescriptor>> {
        let urls = match self.canonical_urls(reference, options)? {
            ResolvedTarget::Asset(descriptor) => return Ok(descriptor.into_iter().collect()),
            ResolvedTarget::Api(urls) => urls,
        };

        let mut descriptors = Vec::new();
        for url in urls {
            debug!("请求资源接口: {}", url);
            let body = match self.client.fetch_bytes(&url, &RequestHeaders::new(), cancel).await {
                Ok(body) => body,
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    warn!("获取资源数据失败，跳过 {}: {}", url, e);
                    continue;
                }
            };
            match payload::extract_descriptors(&body, &options.formats, options.randomize_server) {
                Ok(found) => {
                    debug!("{} 解析出 {} 个资源", url, found.len());
                    descriptors.extend(found);
                }
                Err(e) => warn!("解析资源数据失败，跳过 {}: {}", url, e),
            }
        }
        Ok(descriptors)
    }

    /// 依次解析全部链接，跳过无效链接，最后去重并处理重名。
    pub async fn resolve_all(
        &self,
        references: &[String],
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<ResourceDescriptor>> {
        debug!(
            "formats={:?} audio={} random={} backup={}",
            options.formats, options.want_audio, options.randomize_server, options.use_backup
        );
        let mut result = Vec::new();
        for reference in references {
            match self.resolve(reference, options, cancel).await {
                Ok(found) => result.extend(found),
                Err(e) if e.is_admission() => debug!("跳过链接 {}: {}", reference, e),
                Err(e) => return Err(e),
            }
        }

        let total = result.len();
        let unique = dedup::dedupe(result);
        if unique.len() != total {
            info!("去重后资源数: {} -> {}", total, unique.len());
        }
        Ok(dedup::disambiguate(unique))
    }
}
