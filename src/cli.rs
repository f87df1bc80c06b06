// src/cli.rs

use crate::{
    browse::BrowseKind,
    catalog::{self, CatalogKind},
    constants,
};
use clap::{Parser, ValueEnum, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// `--id` 所指资源的类型
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceType {
    #[value(name = "tchMaterial")]
    TchMaterial,
    #[value(name = "syncClassroom/classActivity")]
    SyncClassroom,
    #[value(name = "qualityCourse")]
    QualityCourse,
    #[value(name = "readingLibrary")]
    ReadingLibrary,
}

impl ResourceType {
    pub fn catalog_kind(self) -> CatalogKind {
        match self {
            ResourceType::TchMaterial => CatalogKind::TchMaterial,
            ResourceType::SyncClassroom => CatalogKind::SyncClassroom,
            ResourceType::QualityCourse => CatalogKind::QualityCourse,
            ResourceType::ReadingLibrary => CatalogKind::ReadingLibrary,
        }
    }
}

/// `--browse` 可浏览的目录
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum BrowseTarget {
    #[value(name = "tchMaterial")]
    TchMaterial,
    #[value(name = "syncClassroom")]
    SyncClassroom,
    #[value(name = "readingLibrary")]
    ReadingLibrary,
}

impl BrowseTarget {
    pub fn browse_kind(self) -> BrowseKind {
        match self {
            BrowseTarget::TchMaterial => BrowseKind::TchMaterial,
            BrowseTarget::SyncClassroom => BrowseKind::SyncClassroom,
            BrowseTarget::ReadingLibrary => BrowseKind::ReadingLibrary,
        }
    }

    /// 目录中的条目如何还原为可下载的链接；课程包需要先展开目录。
    pub fn catalog_kind(self) -> Option<CatalogKind> {
        match self {
            BrowseTarget::TchMaterial => Some(CatalogKind::TchMaterial),
            BrowseTarget::SyncClassroom => None,
            BrowseTarget::ReadingLibrary => Some(CatalogKind::ReadingLibrary),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .multiple(true)
        .args(&["url", "id", "batch_file", "list_formats", "browse", "toc"]),
))]
pub struct Cli {
    // --- 输入 (Input) ---
    /// 资源详情页链接或直接资源链接，可重复
    #[arg(long, value_name = "URL", help_heading = "Input")]
    pub url: Vec<String>,
    /// 通过资源ID下载 (需配合 --type 使用)，可重复
    #[arg(long, value_name = "ID", help_heading = "Input", requires = "type")]
    pub id: Vec<String>,
    /// 从文本文件读取链接 (每行一个，# 开头为注释)
    #[arg(short, long, value_name = "FILE", help_heading = "Input")]
    pub batch_file: Option<PathBuf>,
    /// 列出可选的资源格式并退出
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Input")]
    pub list_formats: bool,

    // --- 浏览 (Browse) ---
    /// 浏览平台目录，配合 --select 逐级选择分类
    #[arg(long, value_enum, value_name = "CATALOG", help_heading = "Browse")]
    pub browse: Option<BrowseTarget>,
    /// [浏览模式] 选择分类 (名称或标签ID)，按层级重复使用
    #[arg(long, value_name = "NAME", requires = "browse", help_heading = "Browse")]
    pub select: Vec<String>,
    /// 列出课程包的单元和课时
    #[arg(long, value_name = "COURSE_ID", help_heading = "Browse")]
    pub toc: Option<String>,

    // --- 解析选项 (Resolve) ---
    /// [ID模式] 指定资源类型
    #[arg(long, value_enum, help_heading = "Resolve")]
    pub r#type: Option<ResourceType>,
    /// 要下载的格式，逗号分隔 (例如 'pdf,mp3')
    #[arg(short, long, value_delimiter = ',', default_values_t = catalog::default_formats(), help_heading = "Resolve")]
    pub format: Vec<String>,
    /// 下载视频 (m3u8 分片合并为 .ts)，忽略 --format
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Resolve")]
    pub video: bool,
    /// 随机选择资源服务器
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Resolve")]
    pub random_server: bool,
    /// 同时请求备用资源接口
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Resolve")]
    pub backup: bool,
    /// 只解析并列出资源，不下载
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Resolve")]
    pub dry_run: bool,

    // --- 下载选项 (Download) ---
    /// 设置文件保存目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Download")]
    pub output: PathBuf,
    /// 同时下载的文件数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Download")]
    pub workers: Option<usize>,
    /// 单个视频同时下载的分片数
    #[arg(long, value_parser = clap::value_parser!(usize), help_heading = "Download")]
    pub segment_workers: Option<usize>,
    /// 在下载目录追加写入下载台账 (log-smartedudl.txt)
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Download")]
    pub ledger: bool,
    /// 提供访问令牌 (Access Token)，优先级最高
    #[arg(long, help_heading = "Download")]
    pub token: Option<String>,
    /// 附加请求头，格式 'Name: Value'，可重复
    #[arg(short = 'H', long = "header", value_name = "HEADER", help_heading = "Download")]
    pub headers: Vec<String>,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
