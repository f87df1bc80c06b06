// src/utils.rs

use crate::constants::{self, api::resource_formats};
use md5::{Digest, Md5};
use regex::Regex;
use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|]"#).unwrap());

pub fn md5_hex(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 去掉非法字符，截断到 255 个字符，空名回退为 `Untitled`。
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = ILLEGAL_CHARS_RE.replace_all(name, "");
    let mut name = cleaned.trim().to_string();
    if name.chars().count() > constants::MAX_FILENAME_CHARS {
        name = name
            .chars()
            .take(constants::MAX_FILENAME_CHARS)
            .collect::<String>()
            .trim()
            .to_string();
    }
    if name.is_empty() {
        constants::UNTITLED.to_string()
    } else {
        name
    }
}

/// 合并后的 m3u8 视频以 `.ts` 保存。
pub fn output_extension(format: &str) -> &str {
    if format == resource_formats::M3U8 {
        resource_formats::TS
    } else {
        format
    }
}

fn candidate_name(stem: &str, ext: &str, index: usize) -> String {
    match (index, ext.is_empty()) {
        (0, true) => stem.to_string(),
        (0, false) => format!("{}.{}", stem, ext),
        (n, true) => format!("{} ({})", stem, n),
        (n, false) => format!("{} ({}).{}", stem, n, ext),
    }
}

/// 返回目录中第一个不存在的 `{stem}.{ext}` 或 `{stem} (n).{ext}`，不创建文件。
pub fn unique_save_path(dir: &Path, title: &str, format: &str) -> PathBuf {
    let stem = sanitize_filename(title);
    let ext = output_extension(format);
    (0..)
        .map(|i| dir.join(candidate_name(&stem, ext, i)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(candidate_name(&stem, ext, 0)))
}

/// 与 [`unique_save_path`] 规则相同，但以 `create_new` 原子地占用文件名，
/// 避免并发任务选中同一路径。
pub fn reserve_save_path(dir: &Path, title: &str, format: &str) -> io::Result<(PathBuf, File)> {
    let stem = sanitize_filename(title);
    let ext = output_extension(format);
    let mut index = 0;
    loop {
        let path = dir.join(candidate_name(&stem, ext, index));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(e) => return Err(e),
        }
    }
}

/// 由播放列表基地址哈希得到的固定临时目录，重复下载同一视频会复用它。
pub fn scratch_dir_for(root: &Path, base_url: &str) -> PathBuf {
    root.join(constants::SCRATCH_DIR_NAME)
        .join(format!("video_{}", &md5_hex(base_url)[..8]))
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}
