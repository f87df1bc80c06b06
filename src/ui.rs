// src/ui.rs

use crate::{
    browse::{course::CourseToc, tree::Listing},
    catalog::{self, CatalogKind, CatalogLink, FORMAT_LIST},
    constants,
    downloader::{BatchReport, ProgressSink},
    models::{DownloadOutcome, ResourceDescriptor},
    symbols, utils,
};
use colored::*;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::time::Duration;

const BAR_SCALE: u64 = 1000;

pub fn print_header(title: &str) {
    println!("\n{}", "═".repeat(constants::UI_WIDTH));
    println!(" {}", title.cyan().bold());
    println!("{}", "═".repeat(constants::UI_WIDTH));
}

pub fn print_sub_header(title: &str) {
    println!("\n--- {} ---", title.bold());
}

pub fn box_message(title: &str, content: &[&str], color_func: fn(ColoredString) -> ColoredString) {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", color_func(title.bold()));
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    for line in content {
        println!("  {}", line);
    }
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));
}

pub fn print_format_list() {
    print_sub_header("可选格式");
    for option in FORMAT_LIST.iter().filter(|f| f.enabled) {
        let mark = if option.checked_by_default { "(默认)".green() } else { "".normal() };
        println!("  {:<12} {} {}", option.suffix.yellow(), option.name, mark);
    }
    println!("  {:<12} 视频 (使用 --video)", "m3u8".yellow());
}

pub fn print_resource_list(descriptors: &[ResourceDescriptor]) {
    print_sub_header(&format!("解析到 {} 个资源", descriptors.len()));
    let pad = descriptors.len().to_string().len();
    for (i, d) in descriptors.iter().enumerate() {
        let size = if d.size > 0 {
            HumanBytes(d.known_size()).to_string()
        } else {
            "未知大小".to_string()
        };
        println!(
            "  [{}] {} {} {}",
            format!("{:>pad$}", i + 1, pad = pad).yellow(),
            utils::truncate_text(&d.title, constants::FILENAME_TRUNCATE_LENGTH),
            format!("[{}]", d.format).cyan(),
            size.dimmed()
        );
    }
}

/// 分类只列名称；教材同时给出可直接下载的链接。
pub fn print_listing(listing: &Listing, kind: CatalogKind) {
    if listing.options.is_empty() {
        println!("\n{} {} 下没有可选项。", *symbols::WARN, listing.title);
        return;
    }
    if !listing.books {
        print_sub_header(&format!("{} ({} 项，使用 --select 继续选择)", listing.title, listing.options.len()));
        for option in &listing.options {
            println!("  - {}", option.name.yellow());
        }
        return;
    }
    print_sub_header(&format!("共 {} 项", listing.options.len()));
    let links: Vec<CatalogLink> = listing
        .options
        .iter()
        .map(|o| CatalogLink {
            link: o.id.clone(),
            kind,
        })
        .collect();
    let pad = listing.options.len().to_string().len();
    for (i, (option, reference)) in listing.options.iter().zip(catalog::generate_references(&links)).enumerate() {
        println!(
            "  [{}] {}",
            format!("{:>pad$}", i + 1, pad = pad).yellow(),
            utils::truncate_text(&option.name, constants::UI_WIDTH - pad - 5)
        );
        println!("      {}", reference.dimmed());
    }
}

pub fn print_course_toc(toc: &[CourseToc]) {
    for unit in toc {
        print_sub_header(&format!("{}. {}", unit.index + 1, unit.title));
        if unit.lessons.is_empty() {
            println!("  {}", "(无课程)".dimmed());
        }
        for lesson in &unit.lessons {
            let links = [CatalogLink {
                link: lesson.course_id.clone(),
                kind: lesson.catalog_kind(),
            }];
            println!("  - {}", lesson.title);
            for reference in catalog::generate_references(&links) {
                println!("      {}", reference.dimmed());
            }
        }
    }
}

fn outcome_line(outcome: &DownloadOutcome) -> String {
    let (symbol, color_fn, default_msg) = outcome.status.get_display_info();
    let name = outcome
        .saved_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| outcome.title.clone());
    if outcome.success {
        if outcome.possibly_undecrypted() {
            format!("{} {} {}", *symbols::WARN, name, "(密钥获取失败，可能未解密)".yellow())
        } else {
            format!("{} {}", symbol, name)
        }
    } else {
        let detail = outcome.message.as_deref().unwrap_or_default();
        format!(
            "{} {} {}",
            symbol,
            name,
            color_fn(format!("失败: {} (详情: {})", default_msg, detail).into())
        )
    }
}

pub fn print_report(report: &BatchReport) {
    let failures = report.failures();
    if !failures.is_empty() {
        print_sub_header("下载详情报告");
        println!("\n{} 失败的文件 ({}个):", *symbols::ERROR, failures.len());
        let grouped = failures
            .iter()
            .into_group_map_by(|o| o.status.get_display_info().2);
        for reason in grouped.keys().sorted() {
            println!("  - {}", format!("原因: {}", reason).red());
            for outcome in grouped[reason].iter().sorted_by(|a, b| a.title.cmp(&b.title)) {
                println!("    - {}", outcome.title);
            }
        }
    }

    let undecrypted = report.undecrypted();
    if !undecrypted.is_empty() {
        println!("\n{} 以下视频声明了加密但密钥获取失败，内容可能无法播放:", *symbols::WARN);
        for outcome in undecrypted {
            println!("    - {}", outcome.title);
        }
    }

    print_sub_header("任务总结");
    if report.cancelled {
        println!("{} 任务已被中断。", *symbols::WARN);
    }
    println!(
        "{} | {} | 总计: {}",
        format!("成功: {}", report.success).green(),
        format!("失败: {}", report.failed).red(),
        report.outcomes.len()
    );
    if let Some(path) = &report.ledger_path {
        println!("{} 下载台账已追加到 {}", *symbols::INFO, path.display());
    }
}

/// 终端进度条
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:7.bold.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        let bar = ProgressBar::hidden();
        bar.set_style(style);
        bar.set_prefix("总进度");
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn batch_started(&self, total_files: usize, total_bytes: u64) {
        let size = if total_bytes > 0 {
            format!(" (总大小: {})", HumanBytes(total_bytes))
        } else {
            String::new()
        };
        println!("\n{} 开始下载 {} 个文件{}...", *symbols::INFO, total_files, size);
        self.bar.set_length(BAR_SCALE);
        self.bar.set_position(0);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_progress(&self, fraction: f64, completed: usize, total: usize) {
        self.bar.set_position((fraction.clamp(0.0, 1.0) * BAR_SCALE as f64) as u64);
        self.bar.set_message(format!("{}/{} 个文件", completed, total));
    }

    fn item_finished(&self, outcome: &DownloadOutcome) {
        self.bar.println(outcome_line(outcome));
    }

    fn batch_finished(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}
