// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use smartedu_dl::{cli::Cli, error::AppError, logging, run_from_cli, symbols};
use std::{env, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| clap::crate_name!().to_string());
    let after_help = format!(
        "示例:\n  # 下载教材 PDF\n  {bin} --url \"https://basic.smartedu.cn/tchMaterial/detail?contentType=assets_document&contentId=...\"\n\n  # 按 ID 下载课程视频\n  {bin} --id <ID> --type qualityCourse --video\n\n  # 批量下载 PDF 和音频，并记录下载台账\n  {bin} -b my_links.txt -f pdf,mp3 --ledger\n\n  # 查看可选格式\n  {bin} --list-formats",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };
    logging::init(args.log_level);

    // 第一次 Ctrl+C 取消所有任务并等待收尾，第二次直接退出。
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        println!("\n{} 收到 {}，正在取消任务...", *symbols::WARN, *symbols::CTRL_C);
        log::warn!("用户中断，取消所有任务");
        signal_token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户强制中断程序。", *symbols::WARN);
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::process::exit(130);
        }
    });

    match run_from_cli(args, cancel).await {
        Ok(()) => {}
        Err(AppError::Cancelled) => {
            eprintln!("\n{} {}", *symbols::WARN, "操作已取消。".yellow());
            std::process::exit(130);
        }
        Err(e) => {
            log::error!("程序执行出错: {}", e);
            eprintln!("\n{} {}", *symbols::ERROR, format!("程序执行出错: {}", e).red());
            std::process::exit(1);
        }
    }
}
