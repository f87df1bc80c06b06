// src/catalog.rs

//! 平台静态数据：详情页路径到资源接口模板的映射、服务器前缀池和可选格式表。

use crate::constants::api::{self, resource_formats};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 服务器前缀占位符
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";
/// 资源 ID 占位符
pub const ID_PLACEHOLDER: &str = "{id}";

/// 一个详情页路径对应的资源接口模板。
///
/// `required_query_params[0]` 总是资源 ID，它会替换模板中的 `{id}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub name: String,
    pub required_query_params: Vec<String>,
    pub primary: String,
    #[serde(default)]
    pub backups: Vec<String>,
    #[serde(default)]
    pub audio: Option<String>,
}

impl EndpointTemplate {
    pub fn id_param(&self) -> Option<&str> {
        self.required_query_params.first().map(String::as_str)
    }

    pub fn instantiate(template: &str, prefix: &str, id: &str) -> String {
        template
            .replace(PREFIX_PLACEHOLDER, prefix)
            .replace(ID_PLACEHOLDER, id)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    endpoints: HashMap<String, EndpointTemplate>,
    server_prefixes: Vec<String>,
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ResourceCatalog {
    pub fn new(endpoints: HashMap<String, EndpointTemplate>, server_prefixes: Vec<String>) -> Self {
        Self {
            endpoints,
            server_prefixes,
        }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_endpoints(), default_server_prefixes())
    }

    pub fn with_server_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.server_prefixes = prefixes;
        self
    }

    pub fn with_endpoints(mut self, endpoints: HashMap<String, EndpointTemplate>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoint(&self, path: &str) -> Option<&EndpointTemplate> {
        self.endpoints.get(path)
    }

    pub fn endpoints(&self) -> &HashMap<String, EndpointTemplate> {
        &self.endpoints
    }

    pub fn server_prefixes(&self) -> &[String] {
        &self.server_prefixes
    }

    pub fn is_asset_path(path: &str) -> bool {
        path.contains(api::ASSETS_PATH)
    }

    /// 固定取第一个，或均匀随机选取一个服务器前缀。
    pub fn pick_server(&self, randomize: bool) -> Option<&str> {
        if randomize {
            self.server_prefixes
                .choose(&mut rand::rng())
                .map(String::as_str)
        } else {
            self.server_prefixes.first().map(String::as_str)
        }
    }
}

pub fn default_server_prefixes() -> Vec<String> {
    vec!["s-file-1".into(), "s-file-2".into(), "s-file-3".into()]
}

pub fn builtin_endpoints() -> HashMap<String, EndpointTemplate> {
    HashMap::from([
        (
            api::TCH_MATERIAL_PATH.to_string(),
            EndpointTemplate {
                name: "教材".into(),
                required_query_params: vec!["contentId".into()],
                primary: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrv2/resources/tch_material/details/{id}.json".into(),
                backups: vec![
                    "https://{prefix}.ykt.cbern.com.cn/zxx/ndrs/special_edu/resources/details/{id}.json".into(),
                    "https://{prefix}.ykt.cbern.com.cn/zxx/ndrs/resources/tch_material/details/{id}.json".into(),
                    "https://{prefix}.ykt.cbern.com.cn/zxx/ndrs/special_edu/thematic_course/{id}/resources/list.json".into(),
                ],
                audio: Some(
                    "https://{prefix}.ykt.cbern.com.cn/zxx/ndrs/resources/{id}/relation_audios.json".into(),
                ),
            },
        ),
        (
            "/syncClassroom/prepare/detail".to_string(),
            EndpointTemplate {
                name: "课程教学>教师授课备课>课件/教学设计".into(),
                required_query_params: vec!["resourceId".into()],
                primary: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrv2/prepare_sub_type/resources/details/{id}.json".into(),
                backups: vec![],
                audio: None,
            },
        ),
        (
            "/syncClassroom/classActivity".to_string(),
            EndpointTemplate {
                name: "课程教学>学生自主学习, 课程教学>教师备课资源>课程包".into(),
                required_query_params: vec!["activityId".into()],
                primary: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrv2/national_lesson/resources/details/{id}.json".into(),
                backups: vec![],
                audio: None,
            },
        ),
        (
            api::READING_LIBRARY_PATH.to_string(),
            EndpointTemplate {
                name: "语文示范诵读库".into(),
                required_query_params: vec!["contentId".into()],
                primary: "https://{prefix}.ykt.cbern.com.cn/museum/ndrs/special_edu/resources/details/{id}.json".into(),
                backups: vec![],
                audio: None,
            },
        ),
        (
            "/qualityCourse".to_string(),
            EndpointTemplate {
                name: "课程教学>学生自主学习(基础教育精品课程)".into(),
                required_query_params: vec!["courseId".into()],
                primary: "https://{prefix}.ykt.cbern.com.cn/zxx/ndrv2/resources/{id}.json".into(),
                backups: vec![],
                audio: None,
            },
        ),
    ])
}

// --- 格式表 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOption {
    pub name: &'static str,
    pub suffix: &'static str,
    pub enabled: bool,
    pub checked_by_default: bool,
}

pub const FORMAT_LIST: &[FormatOption] = &[
    FormatOption { name: "文档(PDF)", suffix: resource_formats::PDF, enabled: true, checked_by_default: true },
    FormatOption { name: "音频(MP3)", suffix: resource_formats::MP3, enabled: true, checked_by_default: false },
    FormatOption { name: "音频(OGG)", suffix: resource_formats::OGG, enabled: true, checked_by_default: false },
    FormatOption { name: "图片", suffix: "jpg", enabled: true, checked_by_default: false },
    FormatOption { name: "白板", suffix: "whiteboard", enabled: true, checked_by_default: false },
    FormatOption { name: "字幕", suffix: "srt", enabled: true, checked_by_default: false },
];

pub const VIDEO_FORMATS: &[&str] = &[resource_formats::M3U8];

pub fn default_formats() -> Vec<String> {
    FORMAT_LIST
        .iter()
        .filter(|f| f.enabled && f.checked_by_default)
        .map(|f| f.suffix.to_string())
        .collect()
}

pub fn is_known_format(suffix: &str) -> bool {
    FORMAT_LIST.iter().any(|f| f.suffix == suffix) || VIDEO_FORMATS.contains(&suffix)
}

pub fn is_audio_format(suffix: &str) -> bool {
    suffix == resource_formats::MP3 || suffix == resource_formats::OGG
}

// --- 目录浏览生成的引用 ---

/// 目录浏览得到的条目类型，决定如何把 ID 还原为详情页链接。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// 用户直接输入的链接，原样使用
    Input,
    TchMaterial,
    SyncClassroom,
    QualityCourse,
    ReadingLibrary,
}

impl CatalogKind {
    pub fn detail_template(&self) -> Option<&'static str> {
        match self {
            CatalogKind::Input => None,
            CatalogKind::TchMaterial => Some(
                "https://basic.smartedu.cn/tchMaterial/detail?contentType=assets_document&contentId={id}",
            ),
            CatalogKind::SyncClassroom => {
                Some("https://basic.smartedu.cn/syncClassroom/classActivity?activityId={id}")
            }
            CatalogKind::QualityCourse => {
                Some("https://basic.smartedu.cn/qualityCourse?courseId={id}")
            }
            // 诵读库没有平台详情页，使用内置表中的对应条目
            CatalogKind::ReadingLibrary => {
                Some("https://basic.smartedu.cn/readingLibrary/detail?contentId={id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLink {
    pub link: String,
    pub kind: CatalogKind,
}

pub fn generate_references(items: &[CatalogLink]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item.kind.detail_template() {
            Some(template) => template.replace(ID_PLACEHOLDER, &item.link),
            None => item.link.clone(),
        })
        .collect()
}
