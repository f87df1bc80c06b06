// src/models/mod.rs

pub mod api;
pub mod browse;

use crate::error::AppError;
use crate::{constants, symbols};
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

/// 解析得到的单个可下载资源。创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub format: String,
    pub title: String,
    pub id: String,
    /// 处理后的下载链接
    pub url: String,
    /// 接口返回的原始链接
    pub raw_url: String,
    /// 字节数，`-1` 表示未知
    pub size: i64,
}

impl ResourceDescriptor {
    /// 携带认证头时部分镜像只接受原始链接。
    pub fn fetch_url<'a>(&'a self, headers: &RequestHeaders) -> &'a str {
        if headers.is_active() {
            &self.raw_url
        } else {
            &self.url
        }
    }

    pub fn known_size(&self) -> u64 {
        u64::try_from(self.size).unwrap_or(0)
    }

    pub fn is_video(&self) -> bool {
        self.format == constants::api::resource_formats::M3U8
    }
}

/// 请求头集合，值为空的条目视为不存在。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(BTreeMap<String, String>);

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.0.values().any(|v| !v.is_empty())
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extend(&mut self, other: RequestHeaders) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DownloadStatus {
    Success,
    HttpError,
    NetworkError,
    ConnectionError,
    TimeoutError,
    IoError,
    MergeError,
    KeyError,
    Cancelled,
    UnexpectedError,
}

impl DownloadStatus {
    pub fn get_display_info(
        &self,
    ) -> (
        &'static ColoredString,
        fn(ColoredString) -> ColoredString,
        &'static str,
    ) {
        match self {
            DownloadStatus::Success => (&symbols::OK, |s| s.green(), "下载成功"),
            DownloadStatus::HttpError => (&symbols::ERROR, |s| s.red(), "服务器返回错误"),
            DownloadStatus::NetworkError => (&symbols::ERROR, |s| s.red(), "网络请求失败"),
            DownloadStatus::ConnectionError => (&symbols::ERROR, |s| s.red(), "无法建立连接"),
            DownloadStatus::TimeoutError => (&symbols::WARN, |s| s.yellow(), "网络连接超时"),
            DownloadStatus::IoError => (&symbols::ERROR, |s| s.red(), "本地文件读写错误"),
            DownloadStatus::MergeError => (&symbols::ERROR, |s| s.red(), "视频分片合并失败"),
            DownloadStatus::KeyError => (&symbols::ERROR, |s| s.red(), "视频解密失败"),
            DownloadStatus::Cancelled => (&symbols::WARN, |s| s.yellow(), "任务已取消"),
            DownloadStatus::UnexpectedError => {
                (&symbols::ERROR, |s| s.red(), "发生未预期的程序错误")
            }
        }
    }
}

impl From<&AppError> for DownloadStatus {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::HttpStatus { .. } => DownloadStatus::HttpError,
            AppError::Network(err)
            | AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(err)) => {
                if err.is_timeout() {
                    DownloadStatus::TimeoutError
                } else if err.is_connect() {
                    DownloadStatus::ConnectionError
                } else if err.is_status() {
                    DownloadStatus::HttpError
                } else {
                    DownloadStatus::NetworkError
                }
            }
            AppError::NetworkMiddleware(_) => DownloadStatus::NetworkError,
            AppError::Io(_) | AppError::TempFilePersist(_) | AppError::OutputDir { .. } => {
                DownloadStatus::IoError
            }
            AppError::M3u8Parse(_) | AppError::Merge(_) => DownloadStatus::MergeError,
            AppError::Security(_) => DownloadStatus::KeyError,
            AppError::Cancelled => DownloadStatus::Cancelled,
            _ => DownloadStatus::UnexpectedError,
        }
    }
}

/// 视频内容的加密处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionState {
    /// 播放列表未声明密钥
    Plain,
    Decrypted,
    /// 声明了密钥但密钥交换失败，分片按原样保存
    PossiblyUndecrypted,
}

/// 一次下载尝试的结果，按完成顺序追加到台账中。
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub timestamp: DateTime<Local>,
    pub success: bool,
    pub status: DownloadStatus,
    pub size: i64,
    pub saved_path: Option<PathBuf>,
    pub source_url: String,
    pub extra_url: String,
    pub title: String,
    pub encryption: Option<EncryptionState>,
    pub message: Option<String>,
}

impl DownloadOutcome {
    pub fn possibly_undecrypted(&self) -> bool {
        self.encryption == Some(EncryptionState::PossiblyUndecrypted)
    }
}

/// 分片在播放列表中的位置决定临时文件名和合并顺序，与完成顺序无关。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTask {
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionContext {
    pub key_url: String,
    pub key_id: String,
    pub iv: Option<Vec<u8>>,
}

impl EncryptionContext {
    pub fn is_declared(&self) -> bool {
        !self.key_url.is_empty()
    }
}
