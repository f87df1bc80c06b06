// src/resolver/payload.rs

use crate::{
    constants::{self, api::requirement_keys},
    models::{
        ResourceDescriptor,
        api::{ResourceEnvelope, ResourceItem, TiItem},
    },
};
use log::debug;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

static PDF_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^/]+\.pdf$").unwrap());
static PRIVATE_HOST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ndr-(doc-)?private").unwrap());

/// 资源接口可能返回的三种 JSON 结构，按声明顺序尝试解析。
#[derive(Debug, Clone)]
pub enum ResourcePayload {
    /// 课程类信封：嵌套资源列表，附带教材、学校和教师信息
    Extended(ResourceEnvelope),
    /// 资源条目数组
    List(Vec<ResourceItem>),
    /// 单个资源条目；对象顶层的教材、学校和教师信息同样保留
    Single(ResourceItem, TitleContext),
}

impl ResourcePayload {
    pub fn parse(data: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope = serde_json::from_slice::<ResourceEnvelope>(data).ok();
        if let Some(envelope) = envelope.as_ref()
            && has_relation_items(envelope)
        {
            debug!("按课程信封结构解析");
            return Ok(Self::Extended(envelope.clone()));
        }
        if let Ok(items) = serde_json::from_slice::<Vec<ResourceItem>>(data) {
            debug!("按资源数组解析");
            return Ok(Self::List(items));
        }
        debug!("按单个资源解析");
        let context = envelope.as_ref().map(TitleContext::from_envelope).unwrap_or_default();
        serde_json::from_slice::<ResourceItem>(data).map(|item| Self::Single(item, context))
    }

    pub fn into_parts(self) -> (Vec<ResourceItem>, TitleContext) {
        match self {
            Self::Extended(envelope) => {
                let context = TitleContext::from_envelope(&envelope);
                (relation_items(envelope), context)
            }
            Self::List(items) => (items, TitleContext::default()),
            Self::Single(item, context) => (vec![item], context),
        }
    }
}

fn has_relation_items(envelope: &ResourceEnvelope) -> bool {
    envelope.relations.as_ref().is_some_and(|r| {
        [r.national_course_resource.as_ref(), r.course_resource.as_ref()]
            .into_iter()
            .flatten()
            .any(|list| !list.is_empty())
    })
}

fn relation_items(envelope: ResourceEnvelope) -> Vec<ResourceItem> {
    let Some(relations) = envelope.relations else {
        return Vec::new();
    };
    [relations.national_course_resource, relations.course_resource]
        .into_iter()
        .flatten()
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

/// 用于补全标题的上下文信息，尽量避免同名。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleContext {
    pub book_name: String,
    pub school_name: String,
    pub teacher_names: String,
}

impl TitleContext {
    fn from_envelope(envelope: &ResourceEnvelope) -> Self {
        let props = envelope.custom_properties.as_ref();
        let teacher_names = envelope
            .teacher_list
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|t| t.name.as_deref())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            book_name: props
                .and_then(|p| p.teachingmaterial_info.as_ref())
                .and_then(|b| b.title.clone())
                .unwrap_or_default(),
            school_name: props.and_then(|p| p.school_name.clone()).unwrap_or_default(),
            teacher_names,
        }
    }

    /// `<教材>-<标题> (<学校>_<教师>)`
    pub fn compose(&self, title: &str) -> String {
        let mut full = if self.book_name.is_empty() {
            title.to_string()
        } else {
            format!("{}-{}", self.book_name, title)
        };
        let suffix: Vec<&str> = [self.school_name.as_str(), self.teacher_names.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !suffix.is_empty() {
            full = format!("{} ({})", full, suffix.join("_"));
        }
        full
    }
}

/// 条目自身的标题：原始标题（或 title）加别名，都缺失时使用占位名。
pub fn item_title(item: &ResourceItem, index: usize) -> String {
    let props = item.custom_properties.as_ref();
    let mut title = props
        .and_then(|p| p.original_title.as_deref())
        .filter(|t| !t.is_empty())
        .or(item.title.as_deref())
        .unwrap_or_default()
        .to_string();
    if let Some(alias) = props.and_then(|p| p.alias_name.as_deref()).filter(|a| !a.is_empty()) {
        title = if title.is_empty() {
            alias.to_string()
        } else {
            format!("{}-{}", title, alias)
        };
    }
    if title.is_empty() {
        let prefix = item
            .resource_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(constants::UNNAMED_RESOURCE);
        title = format!("{}-{:03}", prefix, index);
    }
    title
}

/// 旧版教材的 PDF 文件名统一为 `pdf.pdf`，私有主机名改为公开主机名。
pub fn convert_url(raw_link: &str) -> String {
    let link = PDF_FILENAME_RE.replace(raw_link, "pdf.pdf");
    PRIVATE_HOST_RE.replace_all(&link, "ndr").into_owned()
}

pub fn clean_url(link: &str) -> String {
    link.replace("ndr-private.", "ndr.")
}

fn declared_size(ti_item: &TiItem) -> i64 {
    ti_item
        .requirement(requirement_keys::TOTAL_SIZE)
        .and_then(|v| v.parse::<i64>().ok())
        .or(ti_item.ti_size)
        .unwrap_or(0)
}

fn pick_storage(storages: &[String], randomize: bool) -> &str {
    let index = if randomize && storages.len() > 1 {
        rand::rng().random_range(0..storages.len())
    } else {
        0
    };
    &storages[index]
}

/// 为一个条目挑选第一个格式匹配且有存储地址的条目。
pub fn select_storage<'a>(item: &'a ResourceItem, formats: &[String]) -> Option<&'a TiItem> {
    item.ti_items
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|ti| !ti.storages().is_empty() && formats.iter().any(|f| f == ti.format()))
}

/// 把接口返回的 JSON 转为资源描述，没有匹配格式的条目被丢弃。
pub fn extract_descriptors(
    data: &[u8],
    formats: &[String],
    randomize: bool,
) -> Result<Vec<ResourceDescriptor>, serde_json::Error> {
    let (items, context) = ResourcePayload::parse(data)?.into_parts();

    let descriptors = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let title = item_title(item, index);
            let ti_item = select_storage(item, formats)?;
            let raw_url = pick_storage(ti_item.storages(), randomize).to_string();
            let url = clean_url(&convert_url(&raw_url));
            let full_title = context.compose(&title);
            debug!("资源 '{}' -> {}", full_title, url);
            Some(ResourceDescriptor {
                format: ti_item.format().to_string(),
                title: full_title,
                id: item.id.clone().unwrap_or_default(),
                url,
                raw_url,
                size: declared_size(ti_item),
            })
        })
        .collect();
    Ok(descriptors)
}
