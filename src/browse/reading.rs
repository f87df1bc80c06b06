// src/browse/reading.rs

//! 语文示范诵读库：按年级分段组织的两层目录。

use super::tree::{BookNode, BookRef};
use crate::models::browse::ReadingItem;
use regex::Regex;
use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

pub const LIBRARY_TITLE: &str = "中小学语文示范诵读库";
pub const AUDIO_RESOURCE_TYPE: &str = "assets_audio";

static LOWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[一二三]年级[上下]?").unwrap());
static MIDDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[四五六]年级[上下]?").unwrap());
static UPPER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[七八九]年级[上下]?").unwrap());

const GRADE_GROUPS: [&str; 4] = ["一～三年级", "四～六年级", "七～九年级", "其他年级"];

fn group_of(grade: &str) -> &'static str {
    if LOWER_RE.is_match(grade) {
        GRADE_GROUPS[0]
    } else if MIDDLE_RE.is_match(grade) {
        GRADE_GROUPS[1]
    } else if UPPER_RE.is_match(grade) {
        GRADE_GROUPS[2]
    } else {
        GRADE_GROUPS[3]
    }
}

/// 年级排序键：学段、年级数字、学期（无 < 上 < 下）
fn grade_key(raw: &str) -> (u8, u8, u8) {
    let mut s = raw.replace(' ', "");
    let mut stage = 1;
    if let Some(rest) = s.strip_prefix('初') {
        stage = 2;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('高') {
        stage = 3;
        s = rest.to_string();
    }

    let mut term = 0;
    if let Some(rest) = s.strip_suffix("上册") {
        term = 1;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_suffix("下册") {
        term = 2;
        s = rest.to_string();
    }

    loop {
        let trimmed = s
            .strip_suffix("年级")
            .or_else(|| s.strip_suffix('年'))
            .or_else(|| s.strip_suffix('级'));
        match trimmed {
            Some(rest) => s = rest.to_string(),
            None => break,
        }
    }

    let num = match s.as_str() {
        "一" => 1,
        "二" => 2,
        "三" => 3,
        "四" => 4,
        "五" => 5,
        "六" => 6,
        "七" => 7,
        "八" => 8,
        "九" => 9,
        "十" => 10,
        "十一" => 11,
        "十二" => 12,
        _ => 0,
    };
    (stage, num, term)
}

/// 稳定排序：小学 < 初中 < 高中，同学段按年级和学期。
pub fn sort_grades(mut grades: Vec<String>) -> Vec<String> {
    grades.sort_by_key(|g| grade_key(g));
    grades
}

/// 只收录恰好带两个标签（诵读库 + 年级）的音频条目。
pub fn build_reading_tree(items: &[ReadingItem]) -> BookNode {
    let mut library_tag_id = String::new();
    let mut grade_tags: BTreeMap<String, String> = BTreeMap::new();
    let mut readings: HashMap<String, Vec<BookNode>> = HashMap::new();

    for item in items.iter().filter(|i| i.tags.len() == 2) {
        let Some(library_tag) = item.tags.iter().find(|t| t.title == LIBRARY_TITLE) else {
            continue;
        };
        if library_tag_id.is_empty() {
            library_tag_id = library_tag.id.clone();
        }
        let Some(grade_tag) = item.tags.iter().find(|t| t.title != LIBRARY_TITLE) else {
            continue;
        };
        grade_tags.insert(grade_tag.title.clone(), grade_tag.id.clone());
        if item.resource_type == AUDIO_RESOURCE_TYPE && !grade_tag.id.is_empty() {
            readings.entry(grade_tag.id.clone()).or_default().push(BookNode {
                level: 4,
                name: item.title.clone(),
                book: Some(BookRef {
                    id: item.unit_id.clone(),
                    title: item.title.clone(),
                }),
                ..BookNode::default()
            });
        }
    }

    let mut grouped: HashMap<&str, Vec<String>> = HashMap::new();
    for grade in grade_tags.keys().filter(|g| g.contains("年级")) {
        grouped.entry(group_of(grade)).or_default().push(grade.clone());
    }

    let groups = GRADE_GROUPS
        .iter()
        .filter_map(|group| {
            let grades = sort_grades(grouped.remove(group)?);
            let children: Vec<BookNode> = grades
                .into_iter()
                .filter_map(|grade| {
                    let tag_id = grade_tags.get(&grade)?.clone();
                    let books = readings.remove(&tag_id).filter(|b| !b.is_empty())?;
                    Some(BookNode {
                        level: 3,
                        name: group.to_string(),
                        tag_id,
                        tag_name: grade,
                        book: None,
                        children: books,
                    })
                })
                .collect();
            (!children.is_empty()).then(|| BookNode {
                level: 2,
                name: "年级分段".to_string(),
                tag_name: group.to_string(),
                children,
                ..BookNode::default()
            })
        })
        .collect();

    BookNode {
        level: 0,
        name: "分类".to_string(),
        tag_id: library_tag_id.clone(),
        tag_name: LIBRARY_TITLE.to_string(),
        book: None,
        children: vec![BookNode {
            level: 1,
            name: "年级".to_string(),
            tag_id: library_tag_id,
            tag_name: LIBRARY_TITLE.to_string(),
            book: None,
            children: groups,
        }],
    }
}
