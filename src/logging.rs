// src/logging.rs

use crate::{cli::LogLevel, constants};
use log::LevelFilter;
use std::{env, path::PathBuf};

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// 默认写入 `~/.smartedu-dl/smartedu-dl.log`，无法获取主目录时写入临时目录。
pub fn log_file_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(constants::CONFIG_DIR_NAME).join(constants::LOG_FILE_NAME),
        None => {
            eprintln!("警告: 无法获取用户主目录，日志将写入临时目录。");
            env::temp_dir()
                .join(clap::crate_name!())
                .join(constants::LOG_FILE_NAME)
        }
    }
}

/// 安装文件日志。级别为 `Off` 时什么也不做，失败只打印警告。
pub fn init(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }

    let path = log_file_path();
    if let Some(dir) = path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("警告: 无法创建日志目录 {:?}: {}", dir, e);
    }

    let file = match fern::log_file(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("警告: 无法打开日志文件 {:?}: {}。日志将不会被记录到文件。", path, e);
            return;
        }
    };

    let result = fern::Dispatch::new()
        .level(level.into())
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file)
        .apply();

    if let Err(e) = result {
        eprintln!("警告: 日志系统初始化失败: {}", e);
    }
}
