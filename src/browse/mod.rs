// src/browse/mod.rs

//! 浏览平台目录：教材和课程包的分类树、课程包目录、语文诵读库。

pub mod course;
pub mod reading;
pub mod tree;

use crate::{
    catalog::{EndpointTemplate, ResourceCatalog},
    client::RobustClient,
    constants,
    error::*,
    models::{
        RequestHeaders,
        browse::{CourseInfo, CourseTree, DataVersion, DocResourceItem, LibraryIndex, ReadingItem, TagBase},
    },
};
use anyhow::anyhow;
use course::CourseToc;
use dashmap::DashMap;
use futures::{StreamExt, stream};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tree::BookNode;
use url::Url;

/// 可浏览的目录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseKind {
    /// 电子教材
    TchMaterial,
    /// 课程包
    SyncClassroom,
    /// 语文示范诵读库
    ReadingLibrary,
}

/// 一个分类目录的数据入口：标签层级和分片清单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSource {
    pub tag_url: String,
    pub version_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseSources {
    pub tch_material: TagSource,
    pub sync_classroom: TagSource,
    pub reading_library: String,
    /// 课程包的分片清单，`{prefix}` 和 `{id}` 为占位符
    pub course_parts: String,
    /// 课程包的章节树，`{id}` 为教材 ID
    pub course_tree: String,
}

impl Default for BrowseSources {
    fn default() -> Self {
        Self {
            tch_material: TagSource {
                tag_url: "https://s-file-1.ykt.cbern.com.cn/zxx/ndrs/tags/tch_material_tag.json".into(),
                version_url: "https://s-file-1.ykt.cbern.com.cn/zxx/ndrs/resources/tch_material/version/data_version.json".into(),
            },
            sync_classroom: TagSource {
                tag_url: "https://s-file-2.ykt.cbern.com.cn/zxx/ndrs/tags/national_lesson_tag.json".into(),
                version_url: "https://s-file-2.ykt.cbern.com.cn/zxx/ndrs/national_lesson/teachingmaterials/version/data_version.json".into(),
            },
            reading_library: "https://s-file-1.ykt.cbern.com.cn/museum/api/zh-CN/a685009e-085c-4d18-9928-daa0ec5dd8a4/elearning_library/v1/libraries/18cd1ab4-5560-472f-953a-85de88736aa2/contents/actions/full/adapter/cd2d42991f0d3597fa8b5a5f5d2e5b5a1722e13d48d4d50db5b2e3c6c8ad9ae4.json".into(),
            course_parts: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrs/national_lesson/teachingmaterials/{id}/resources/parts.json".into(),
            course_tree: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrv2/national_lesson/trees/{id}.json".into(),
        }
    }
}

pub struct CatalogBrowser {
    client: Arc<RobustClient>,
    catalog: Arc<ResourceCatalog>,
    sources: BrowseSources,
    cache: DashMap<String, Value>,
}

impl CatalogBrowser {
    pub fn new(client: Arc<RobustClient>, catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            client,
            catalog,
            sources: BrowseSources::default(),
            cache: DashMap::new(),
        }
    }

    pub fn with_sources(mut self, sources: BrowseSources) -> Self {
        self.sources = sources;
        self
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, cancel: &CancellationToken) -> AppResult<T> {
        let cached = self.cache.get(url).map(|entry| entry.value().clone());
        let value = match cached {
            Some(value) => {
                debug!("目录缓存命中: {}", url);
                value
            }
            None => {
                let value: Value = self.client.fetch_json(url, &RequestHeaders::new(), cancel).await?;
                self.cache.insert(url.to_string(), value.clone());
                value
            }
        };
        serde_json::from_value(value).map_err(|source| AppError::ApiParseFailed {
            url: url.to_string(),
            source,
        })
    }

    /// 逐个取分片，单个失败只记录日志；结果保持清单顺序。
    async fn fetch_parts<T: DeserializeOwned>(&self, urls: &[String], cancel: &CancellationToken) -> AppResult<Vec<T>> {
        let results: Vec<(&String, AppResult<Vec<T>>)> = stream::iter(urls)
            .map(|url| async move { (url, self.fetch::<Vec<T>>(url, cancel).await) })
            .buffered(constants::BROWSE_FETCH_WORKERS)
            .collect()
            .await;
        let mut items = Vec::new();
        for (url, result) in results {
            match result {
                Ok(part) => items.extend(part),
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => warn!("获取目录分片失败，跳过 {}: {}", url, e),
            }
        }
        Ok(items)
    }

    pub async fn category_tree(&self, kind: BrowseKind, cancel: &CancellationToken) -> AppResult<BookNode> {
        match kind {
            BrowseKind::TchMaterial => self.tag_tree(&self.sources.tch_material, cancel).await,
            BrowseKind::SyncClassroom => self.tag_tree(&self.sources.sync_classroom, cancel).await,
            BrowseKind::ReadingLibrary => self.reading_library(cancel).await,
        }
    }

    async fn tag_tree(&self, source: &TagSource, cancel: &CancellationToken) -> AppResult<BookNode> {
        let tag_base: TagBase = self.fetch(&source.tag_url, cancel).await?;
        let version: DataVersion = self.fetch(&source.version_url, cancel).await?;
        let part_urls = version.urls();
        debug!("分片清单 {:?}: {} 个", version.module, part_urls.len());

        let items: Vec<DocResourceItem> = self.fetch_parts(&part_urls, cancel).await?;
        let mut tag_names = HashMap::new();
        let docs = tree::collect_documents(&items, &mut tag_names);
        info!("目录 {} 共 {} 条记录", source.tag_url, docs.len());
        tree::build_tree(&tag_base, &tag_names, &docs)
    }

    async fn reading_library(&self, cancel: &CancellationToken) -> AppResult<BookNode> {
        let index_url = Url::parse(self.sources.reading_library.trim())?;
        let index: LibraryIndex = self.fetch(index_url.as_str(), cancel).await?;
        let part_urls = index
            .files
            .iter()
            .map(|file| -> AppResult<String> { Ok(index_url.join(file)?.to_string()) })
            .collect::<AppResult<Vec<_>>>()?;
        let items: Vec<ReadingItem> = self.fetch_parts(&part_urls, cancel).await?;
        info!("诵读库共 {} 条记录", items.len());
        Ok(reading::build_reading_tree(&items))
    }

    /// 课程包目录：分片清单 -> 课程记录 -> 教材章节树。
    pub async fn course_toc(
        &self,
        course_id: &str,
        randomize_server: bool,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<CourseToc>> {
        let prefix = self
            .catalog
            .pick_server(randomize_server)
            .ok_or_else(|| AppError::Other(anyhow!("服务器前缀列表为空")))?;
        let parts_url = EndpointTemplate::instantiate(&self.sources.course_parts, prefix, course_id);
        let part_urls: Vec<String> = self.fetch(&parts_url, cancel).await?;

        let infos: Vec<CourseInfo> = self.fetch_parts(&part_urls, cancel).await?;
        let tree_id = infos
            .iter()
            .find_map(|c| c.teachingmaterial_ids.first())
            .ok_or_else(|| AppError::EmptyCatalog(format!("课程包 {} 没有课程记录", course_id)))?;
        debug!("课程包 {} 共 {} 条课程记录，章节树 {}", course_id, infos.len(), tree_id);

        let tree_url = EndpointTemplate::instantiate(&self.sources.course_tree, prefix, tree_id);
        let chapters = self.fetch::<CourseTree>(&tree_url, cancel).await?.into_units();
        Ok(course::build_toc(&infos, &chapters))
    }
}
