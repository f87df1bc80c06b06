// src/models/browse.rs

//! 目录浏览用到的平台数据：标签层级、版本清单、分片数据、课程目录和诵读库。

use serde::{Deserialize, Deserializer};

/// 平台数据里常见显式的 `null`，按缺省值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- 标签层级 (tch_material_tag.json / national_lesson_tag.json) ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TagHierarchy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hierarchy_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<TagItem>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TagItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_name: String,
    #[serde(default)]
    pub hierarchies: Option<Vec<TagHierarchy>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TagBase {
    #[serde(default, deserialize_with = "null_as_default", rename = "tag_path")]
    pub tag_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hierarchies: Vec<TagHierarchy>,
}

// --- data_version.json ---

/// `urls` 字段可能是逗号分隔的字符串，也可能是数组
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum VersionUrls {
    Joined(String),
    List(Vec<String>),
}

#[derive(Deserialize, Debug, Clone)]
pub struct DataVersion {
    #[serde(default)]
    pub module: Option<String>,
    pub urls: Option<VersionUrls>,
}

impl DataVersion {
    pub fn urls(&self) -> Vec<String> {
        match &self.urls {
            Some(VersionUrls::Joined(joined)) => joined
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(VersionUrls::List(list)) => list.clone(),
            None => Vec::new(),
        }
    }
}

// --- part_*.json ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DocTag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_name: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "tag_dimension_id")]
    pub dimension: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DocResourceItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// 只有教材数据带这个字段，课程数据要按标签维度拼出路径
    #[serde(default)]
    pub tag_paths: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_list: Vec<DocTag>,
}

// --- 课程目录 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CourseInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "teachmeterial_ids")]
    pub teachingmaterial_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapter_paths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", rename = "resource_type_code")]
    pub resource_type: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CourseChapter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_path: String,
    #[serde(default, rename = "child_nodes")]
    pub children: Option<Vec<CourseChapter>>,
}

/// 章节树可能直接是单元数组，也可能包在根节点的 `child_nodes` 里
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum CourseTree {
    Units(Vec<CourseChapter>),
    Root(CourseChapter),
}

impl CourseTree {
    pub fn into_units(self) -> Vec<CourseChapter> {
        match self {
            CourseTree::Units(units) => units,
            CourseTree::Root(root) => root.children.unwrap_or_default(),
        }
    }
}

// --- 诵读库 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LibraryIndex {
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReadingTag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReadingItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<ReadingTag>,
}
