// src/downloader/ledger.rs

use crate::{constants, models::DownloadOutcome};
use chrono::{DateTime, Local};
use log::info;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";
const CSV_HEADER: &str = "log-time,success,file-size,save-path,raw-url,extra-url";

pub fn format_time(time: &DateTime<Local>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn format_row(outcome: &DownloadOutcome) -> String {
    format!(
        "{},{},{},{},{},{}",
        format_time(&outcome.timestamp),
        outcome.success,
        outcome.size,
        outcome
            .saved_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        outcome.source_url,
        outcome.extra_url
    )
}

/// 一次批量任务的台账块：统计行加每个结果一行 CSV。
pub fn format_block(outcomes: &[DownloadOutcome], success: usize, failed: usize, now: &DateTime<Local>) -> String {
    let mut lines = vec![
        String::new(),
        "=".repeat(63),
        format!("## {} 下载统计：成功/失败 = {}/{}", format_time(now), success, failed),
        "-".repeat(63),
        "**详细信息：**".to_string(),
        String::new(),
        CSV_HEADER.to_string(),
    ];
    lines.extend(outcomes.iter().map(format_row));
    lines.push(String::new());
    lines.join("\n")
}

/// 以追加方式写入 `dir/log-smartedudl.txt`，从不截断已有内容。
pub fn append(dir: &Path, block: &str) -> io::Result<PathBuf> {
    let path = dir.join(constants::LEDGER_FILE_NAME);
    info!("保存下载台账到 {:?}", path);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(block.as_bytes())?;
    Ok(path)
}
