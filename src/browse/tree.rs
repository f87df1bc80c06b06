// src/browse/tree.rs

//! 教材/课程包的分类树：先按标签层级搭骨架，再把分片数据里的条目挂到对应路径上。

use crate::{
    error::*,
    models::browse::{DocResourceItem, DocTag, TagBase, TagItem},
};
use log::debug;
use regex::Regex;
use std::{collections::HashMap, sync::LazyLock};

static PRIMARY_GRADE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[一二三四五六七八九至]+年级").unwrap());

/// 拼接路径时的标签维度顺序：学段/年级/学科/版本/册次/新旧教材
pub const DIMENSION_ORDER: &[&str] = &["zxxxd", "zxxnj", "zxxxk", "zxxbb", "zxxcc", "zxxxjjc"];
const STAGE_DIMENSION: &str = "zxxxd";
const GRADE_DIMENSION: &str = "zxxnj";
const HIGH_SCHOOL: &str = "高中";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookNode {
    pub level: usize,
    /// 层级名称，如“学段”“学科”
    pub name: String,
    pub tag_id: String,
    pub tag_name: String,
    /// 叶子上的教材或课程包
    pub book: Option<BookRef>,
    pub children: Vec<BookNode>,
}

impl BookNode {
    pub fn is_book(&self) -> bool {
        self.book.is_some()
    }

    /// 子树中的教材总数
    pub fn book_count(&self) -> usize {
        usize::from(self.is_book()) + self.children.iter().map(BookNode::book_count).sum::<usize>()
    }
}

/// 分片数据中的一条教材记录，`tag_path` 形如 `学段ID/年级ID/...`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub id: String,
    pub title: String,
    pub tag_path: String,
}

/// 高中不区分年级；其他学段只保留一至九年级，年级不符时整条记录作废。
fn filter_tags(tags: &[DocTag]) -> Vec<&DocTag> {
    let high_school = tags
        .iter()
        .any(|t| t.dimension == STAGE_DIMENSION && t.tag_name == HIGH_SCHOOL);
    let mut kept: Vec<&DocTag> = tags.iter().filter(|t| t.dimension != GRADE_DIMENSION).collect();
    if !high_school {
        for tag in tags.iter().filter(|t| t.dimension == GRADE_DIMENSION) {
            if !PRIMARY_GRADE_RE.is_match(&tag.tag_name) {
                return Vec::new();
            }
            kept.push(tag);
        }
    }
    kept
}

pub fn concat_tag_path(tags: &[DocTag]) -> Option<String> {
    let kept = filter_tags(tags);
    if kept.is_empty() {
        return None;
    }
    let by_dimension: HashMap<&str, &str> = kept
        .iter()
        .map(|t| (t.dimension.as_str(), t.tag_id.as_str()))
        .collect();
    let parts: Vec<&str> = DIMENSION_ORDER
        .iter()
        .filter_map(|dim| by_dimension.get(dim).copied())
        .collect();
    Some(parts.join("/"))
}

/// 汇总所有分片：标签名表和每条教材的挂载路径。
pub fn collect_documents(items: &[DocResourceItem], tag_names: &mut HashMap<String, String>) -> Vec<DocEntry> {
    let mut entries = Vec::new();
    for item in items {
        for tag in &item.tag_list {
            tag_names.insert(tag.tag_id.clone(), tag.tag_name.clone());
        }
        let paths = match &item.tag_paths {
            Some(paths) => paths.clone(),
            None => match concat_tag_path(&item.tag_list) {
                Some(path) => vec![path],
                None => continue,
            },
        };
        entries.extend(paths.into_iter().filter(|p| !p.is_empty()).map(|tag_path| DocEntry {
            id: item.id.clone(),
            title: item.title.clone(),
            tag_path,
        }));
    }
    entries
}

fn from_tag_item(level: usize, item: &TagItem, tag_names: &HashMap<String, String>) -> BookNode {
    let Some(hierarchy) = item.hierarchies.as_ref().and_then(|h| h.first()) else {
        return BookNode {
            level,
            name: "-".to_string(),
            tag_id: item.tag_id.clone(),
            tag_name: tag_names
                .get(&item.tag_id)
                .cloned()
                .unwrap_or_else(|| item.tag_name.clone()),
            ..BookNode::default()
        };
    };
    BookNode {
        level,
        name: hierarchy.hierarchy_name.clone(),
        tag_id: item.tag_id.clone(),
        tag_name: item.tag_name.clone(),
        book: None,
        children: hierarchy
            .children
            .iter()
            .map(|child| from_tag_item(level + 1, child, tag_names))
            .collect(),
    }
}

/// 把教材挂到路径上，缺失的中间节点按标签名补建。
fn attach(root: &mut BookNode, doc: &DocEntry, tag_names: &HashMap<String, String>) {
    let parts: Vec<&str> = doc.tag_path.split('/').collect();
    let start = usize::from(parts.first() == Some(&root.tag_id.as_str()));
    let mut current = root;
    for (i, part) in parts.iter().enumerate().skip(start) {
        let is_last = i + 1 == parts.len();
        let tag_name = tag_names.get(*part).cloned().unwrap_or_default();
        let node = |level: usize| BookNode {
            level,
            name: tag_name.clone(),
            tag_id: part.to_string(),
            tag_name: tag_name.clone(),
            book: is_last.then(|| BookRef {
                id: doc.id.clone(),
                title: doc.title.clone(),
            }),
            children: Vec::new(),
        };
        match current.children.iter().position(|c| c.tag_id == *part) {
            Some(pos) if !is_last => current = &mut current.children[pos],
            Some(pos) => {
                // 叶子标签已存在：教材作为它的子节点
                let found = &mut current.children[pos];
                let child = node(found.level + 1);
                found.children.push(child);
                return;
            }
            None => {
                let child = node(current.level + 1);
                current.children.push(child);
                let last = current.children.len() - 1;
                current = &mut current.children[last];
            }
        }
    }
}

/// 由标签层级和分片数据生成完整的分类树。
pub fn build_tree(tag_base: &TagBase, tag_names: &HashMap<String, String>, docs: &[DocEntry]) -> AppResult<BookNode> {
    let top = tag_base
        .hierarchies
        .first()
        .ok_or_else(|| AppError::EmptyCatalog("标签层级".to_string()))?;
    let mut root = BookNode {
        level: 0,
        name: top.hierarchy_name.clone(),
        tag_id: tag_base.tag_id.clone(),
        children: top
            .children
            .iter()
            .map(|child| from_tag_item(1, child, tag_names))
            .collect(),
        ..BookNode::default()
    };
    for doc in docs {
        attach(&mut root, doc, tag_names);
    }
    debug!("分类树 '{}' 共 {} 本", root.name, root.book_count());
    Ok(root)
}

/// 供选择的一项：分类或教材
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub options: Vec<BrowseOption>,
    /// `options` 是教材还是下一级分类
    pub books: bool,
}

fn normalize_name(name: &str) -> String {
    name.replace('•', "·").replace(' ', "")
}

fn collect_books(node: &BookNode, mut prefixes: Vec<String>, out: &mut Vec<BrowseOption>) {
    prefixes.push(node.tag_name.clone());
    for child in &node.children {
        match &child.book {
            Some(book) => {
                let mut name = format!("《{}》", book.title.replace('•', "·"));
                if prefixes.len() > 1 {
                    name = format!("[{}] {}", prefixes.join("-"), name);
                }
                out.push(BrowseOption {
                    id: book.id.clone(),
                    name,
                });
            }
            None => collect_books(child, prefixes.clone(), out),
        }
    }
}

/// 列出一个节点下的选项：子节点是教材时列出整棵子树的教材，否则列出下一级分类。
pub fn list(node: &BookNode) -> Listing {
    if node.children.first().is_some_and(BookNode::is_book) {
        let mut options = Vec::new();
        collect_books(node, Vec::new(), &mut options);
        return Listing {
            title: node.name.clone(),
            options,
            books: true,
        };
    }
    Listing {
        title: node.name.clone(),
        options: node
            .children
            .iter()
            .map(|c| BrowseOption {
                id: c.tag_id.clone(),
                name: normalize_name(&c.tag_name),
            })
            .collect(),
        books: false,
    }
}

/// 按分类名（或标签 ID）逐级下钻。
pub fn select<'a>(root: &'a BookNode, path: &[String]) -> AppResult<&'a BookNode> {
    let mut current = root;
    for wanted in path {
        let wanted_name = normalize_name(wanted);
        current = current
            .children
            .iter()
            .find(|c| c.tag_id == *wanted || normalize_name(&c.tag_name) == wanted_name)
            .ok_or_else(|| AppError::UnknownCategory {
                name: wanted.clone(),
                choices: current
                    .children
                    .iter()
                    .map(|c| normalize_name(&c.tag_name))
                    .collect::<Vec<_>>()
                    .join("、"),
            })?;
    }
    Ok(current)
}
