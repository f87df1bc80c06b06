// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("无效的资源链接: {0}")]
    InvalidReference(String),
    #[error("不支持的内容类型 contentType='{0}' (仅支持 assets_document)")]
    UnsupportedContentType(String),
    #[error("未选择任何资源格式")]
    EmptyFormatSelection,
    #[error("下载目录 '{path}' 创建失败: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("服务器返回状态 {status}: {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无法解析来自 '{url}' 的API响应: {source}")]
    ApiParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("Base64 解码错误: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("M3U8 解析错误: {0}")]
    M3u8Parse(String),
    #[error("视频分片合并失败: {0}")]
    Merge(String),
    #[error("安全错误: {0}")]
    Security(String),
    #[error("未找到分类 '{name}'，可选: {choices}")]
    UnknownCategory { name: String, choices: String },
    #[error("目录数据为空: {0}")]
    EmptyCatalog(String),
    #[error("任务已取消")]
    Cancelled,
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 准入阶段的错误：在发起任何网络请求之前即被拒绝。
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            AppError::InvalidReference(_)
                | AppError::UnsupportedContentType(_)
                | AppError::EmptyFormatSelection
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
