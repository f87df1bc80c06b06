// src/models/api.rs

use serde::Deserialize;

// --- 通用结构体 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct GlobalTitle {
    #[serde(rename = "zh-CN", default)]
    pub zh_cn: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Requirement {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TiItemCustomProperties {
    pub encryption: Option<String>,
    pub requirements: Option<Vec<Requirement>>,
}

/// 资源的一个存储条目（某一种格式的全部镜像地址）
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TiItem {
    pub ti_format: Option<String>,
    pub ti_storages: Option<Vec<String>>,
    pub ti_size: Option<i64>,
    pub ti_file_flag: Option<String>,
    pub custom_properties: Option<TiItemCustomProperties>,
}

impl TiItem {
    pub fn format(&self) -> &str {
        self.ti_format.as_deref().unwrap_or_default()
    }

    pub fn storages(&self) -> &[String] {
        self.ti_storages.as_deref().unwrap_or_default()
    }

    pub fn requirement(&self, name: &str) -> Option<&str> {
        self.custom_properties
            .as_ref()
            .and_then(|p| p.requirements.as_deref())
            .unwrap_or_default()
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
            .and_then(|r| r.value.as_deref())
    }
}

// --- 资源条目 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemCustomProperties {
    pub original_title: Option<String>,
    pub alias_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResourceItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "resource_type_code_name")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub ti_items: Option<Vec<TiItem>>,
    #[serde(default)]
    pub custom_properties: Option<ItemCustomProperties>,
}

// --- 课程类扩展信封 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Teacher {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookInfo {
    pub id: Option<String>,
    pub title: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct EnvelopeCustomProperties {
    pub school_name: Option<String>,
    pub teachingmaterial_info: Option<BookInfo>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Relations {
    pub national_course_resource: Option<Vec<ResourceItem>>,
    pub course_resource: Option<Vec<ResourceItem>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResourceEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub global_title: Option<GlobalTitle>,
    #[serde(default)]
    pub relations: Option<Relations>,
    #[serde(default)]
    pub teacher_list: Option<Vec<Teacher>>,
    #[serde(default)]
    pub custom_properties: Option<EnvelopeCustomProperties>,
}
