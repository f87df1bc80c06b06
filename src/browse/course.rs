// src/browse/course.rs

use crate::{
    catalog::CatalogKind,
    models::browse::{CourseChapter, CourseInfo},
};
use std::collections::HashMap;

const NATIONAL_LESSON: &str = "national_lesson";
const ELITE_LESSON: &str = "elite_lesson";

/// 课程目录中的一课
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLesson {
    /// `<上级章节> / <本节>`
    pub title: String,
    pub node_id: String,
    pub node_path: String,
    pub parents: Vec<String>,
    pub course_id: String,
    pub course_title: String,
    pub resource_type: String,
}

impl CourseLesson {
    /// 国家课走课程包详情页，精品课走精品课详情页。
    pub fn catalog_kind(&self) -> CatalogKind {
        if self.resource_type == ELITE_LESSON {
            CatalogKind::QualityCourse
        } else {
            CatalogKind::SyncClassroom
        }
    }
}

/// 一个单元及其下的课
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseToc {
    pub index: usize,
    pub title: String,
    pub lessons: Vec<CourseLesson>,
}

fn lessons_by_chapter(infos: &[CourseInfo]) -> HashMap<&str, &CourseInfo> {
    infos
        .iter()
        .filter(|c| c.resource_type == NATIONAL_LESSON || c.resource_type == ELITE_LESSON)
        .flat_map(|c| c.chapter_paths.iter().map(move |path| (path.as_str(), c)))
        .collect()
}

fn collect_lessons(
    chapters: &[CourseChapter],
    by_chapter: &HashMap<&str, &CourseInfo>,
    parents: &[String],
    out: &mut Vec<CourseLesson>,
) {
    for chapter in chapters {
        match &chapter.children {
            Some(children) => {
                let mut nested = parents.to_vec();
                nested.push(chapter.title.clone());
                collect_lessons(children, by_chapter, &nested, out);
            }
            None => {
                let Some(course) = by_chapter.get(chapter.node_path.as_str()) else {
                    continue;
                };
                let title = match parents.last() {
                    Some(parent) => format!("{} / {}", parent, chapter.title),
                    None => chapter.title.clone(),
                };
                out.push(CourseLesson {
                    title,
                    node_id: chapter.id.clone(),
                    node_path: chapter.node_path.clone(),
                    parents: parents.to_vec(),
                    course_id: course.id.clone(),
                    course_title: course.title.clone(),
                    resource_type: course.resource_type.clone(),
                });
            }
        }
    }
}

/// 把章节树的叶子与课程记录按 `node_path` 对上，按顶层单元分组。
pub fn build_toc(infos: &[CourseInfo], chapters: &[CourseChapter]) -> Vec<CourseToc> {
    let by_chapter = lessons_by_chapter(infos);
    chapters
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            let mut lessons = Vec::new();
            collect_lessons(unit.children.as_deref().unwrap_or_default(), &by_chapter, &[], &mut lessons);
            CourseToc {
                index,
                title: unit.title.clone(),
                lessons,
            }
        })
        .collect()
}
