// src/lib.rs

pub mod browse;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod models;
pub mod resolver;
pub mod symbols;
pub mod ui;
pub mod utils;

use crate::{
    browse::{CatalogBrowser, tree},
    catalog::{CatalogKind, CatalogLink},
    cli::Cli,
    client::RobustClient,
    config::AppConfig,
    downloader::{BatchOptions, DownloadManager, ProgressSink},
    error::{AppError, AppResult},
    resolver::{LinkResolver, ResolveOptions},
};
use anyhow::anyhow;
use colored::*;
use log::{debug, info, warn};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancel: CancellationToken) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    if args.list_formats {
        ui::print_format_list();
        return Ok(());
    }

    let config = AppConfig::new(&args)?;
    debug!("加载的应用配置: {:?}", config);

    if args.browse.is_some() || args.toc.is_some() {
        return run_browse(&args, &config, &cancel).await;
    }

    let (token, source) = config::auth::resolve_token(args.token.as_deref(), config.access_token.as_deref());
    if token.is_some() {
        info!("从 {} 加载 Access Token", source);
        println!("\n{} 已从 {} 加载 Access Token。", *symbols::INFO, source);
    } else {
        info!("未找到 Access Token");
        println!("\n{}", format!("{} 未找到 Access Token，将以匿名方式下载。", *symbols::INFO).yellow());
    }
    let headers = config::auth::build_headers(token.as_deref(), &args.headers)?;

    let references = collect_references(&args)?;
    if references.is_empty() {
        return Err(AppError::Other(anyhow!("没有可处理的链接")));
    }

    let formats = if args.video {
        catalog::VIDEO_FORMATS.iter().map(|f| f.to_string()).collect()
    } else {
        args.format.clone()
    };
    for format in formats.iter().filter(|f| !catalog::is_known_format(f)) {
        warn!("未知的资源格式 '{}'，仍将尝试匹配", format);
        println!("{} 未知的资源格式 '{}'，仍将尝试匹配。", *symbols::WARN, format);
    }
    let options = ResolveOptions::new(&formats)?
        .with_random_server(args.random_server)
        .with_backup(args.backup);

    let client = Arc::new(RobustClient::new(&config)?);
    let resolver = LinkResolver::new(client.clone(), Arc::new(config.catalog()));

    ui::print_header(&format!("解析 {} 个链接 (按 {} 可随时中断)", references.len(), *symbols::CTRL_C));
    for reference in references.iter().filter(|r| !resolver::is_valid_reference(resolver.catalog(), r)) {
        println!("{} 跳过无效链接: {}", *symbols::WARN, utils::truncate_text(reference, constants::UI_WIDTH));
    }
    let descriptors = resolver.resolve_all(&references, &options, &cancel).await?;
    if descriptors.is_empty() {
        println!("\n{} 没有找到符合所选格式 ({}) 的资源。", *symbols::WARN, options.formats.join(","));
        return Ok(());
    }
    ui::print_resource_list(&descriptors);
    if args.dry_run {
        ui::box_message(
            "仅解析模式",
            &["已跳过下载。", "去掉 --dry-run 即可开始下载以上资源。"],
            |s| s.cyan(),
        );
        return Ok(());
    }

    let manager = DownloadManager::new(client, &args.output);
    let batch = BatchOptions::new(headers)
        .with_ledger(args.ledger)
        .with_video(args.video)
        .with_segment_workers(config.segment_workers)
        .with_batch_workers(config.max_workers);
    let sink: Arc<dyn ProgressSink> = Arc::new(ui::BarProgress::new());
    let report = manager.run(&descriptors, &batch, sink, &cancel).await?;

    ui::print_report(&report);
    if report.success > 0 {
        let saved_to = dunce::canonicalize(manager.output_dir()).unwrap_or_else(|_| manager.output_dir().to_path_buf());
        println!("{} 文件已保存至 {}", *symbols::OK, saved_to.display());
    }
    if report.cancelled {
        return Err(AppError::Cancelled);
    }
    if report.failed > 0 {
        return Err(AppError::Other(anyhow!("{} 个文件下载失败。", report.failed)));
    }
    Ok(())
}

/// 浏览目录或课程包目录，只打印可下载的链接。
async fn run_browse(args: &Cli, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
    let client = Arc::new(RobustClient::new(config)?);
    let browser = CatalogBrowser::new(client, Arc::new(config.catalog()));

    if let Some(target) = args.browse {
        ui::print_header(&format!("正在获取目录 (按 {} 可随时中断)", *symbols::CTRL_C));
        let root = browser.category_tree(target.browse_kind(), cancel).await?;
        let node = tree::select(&root, &args.select)?;
        let listing = tree::list(node);
        info!("目录 '{}' 下共 {} 项", listing.title, listing.options.len());
        match target.catalog_kind() {
            Some(kind) => ui::print_listing(&listing, kind),
            // 课程包条目是教材 ID，用它展开课时目录
            None => {
                ui::print_listing(&listing, CatalogKind::Input);
                if listing.books {
                    println!("\n{} 使用 --toc <ID> 查看课程包中的课时。", *symbols::INFO);
                }
            }
        }
    }

    if let Some(course_id) = &args.toc {
        ui::print_header(&format!("课程包目录: {}", course_id));
        let toc = browser.course_toc(course_id.trim(), args.random_server, cancel).await?;
        if toc.iter().all(|unit| unit.lessons.is_empty()) {
            println!("\n{} 课程包 {} 中没有找到课时。", *symbols::WARN, course_id);
            return Ok(());
        }
        ui::print_course_toc(&toc);
    }
    Ok(())
}

/// 汇总 `--url`、`--id` 和批量文件中的输入，ID 按 `--type` 还原为详情页链接。
pub fn collect_references(args: &Cli) -> AppResult<Vec<String>> {
    let kind = args.r#type.map(cli::ResourceType::catalog_kind);
    let mut links: Vec<CatalogLink> = args
        .url
        .iter()
        .map(|url| CatalogLink {
            link: url.trim().to_string(),
            kind: CatalogKind::Input,
        })
        .collect();
    if let Some(kind) = kind {
        links.extend(args.id.iter().map(|id| CatalogLink {
            link: id.trim().to_string(),
            kind,
        }));
    }
    if let Some(batch_file) = &args.batch_file {
        links.extend(read_batch_file(batch_file, kind)?);
    }
    Ok(catalog::generate_references(&links))
}

fn read_batch_file(path: &Path, kind: Option<CatalogKind>) -> AppResult<Vec<CatalogLink>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        log::error!("读取批量文件 '{}' 失败: {}", path.display(), e);
        AppError::from(e)
    })?;
    let mut links = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
        if line.starts_with("http") {
            links.push(CatalogLink {
                link: line.to_string(),
                kind: CatalogKind::Input,
            });
        } else if let Some(kind) = kind {
            links.push(CatalogLink {
                link: line.to_string(),
                kind,
            });
        } else {
            warn!("批量文件中的条目 '{}' 是 ID 但未提供 --type，跳过", line);
            println!("{} 跳过条目 '{}' (ID 需配合 --type 使用)", *symbols::WARN, line);
        }
    }
    if links.is_empty() {
        warn!("批量文件 '{}' 为空或不含有效行", path.display());
    }
    Ok(links)
}
