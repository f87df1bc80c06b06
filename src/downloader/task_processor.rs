// src/downloader/task_processor.rs

use super::{BatchOptions, BatchProgress, m3u8::SegmentedVideoDownloader};
use crate::{
    client::{RobustClient, cancellable},
    constants,
    error::*,
    models::*,
    utils,
};
use chrono::Local;
use futures::StreamExt;
use log::{debug, error, info};
use reqwest::Response;
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::{Arc, atomic::Ordering},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::{io::StreamReader, sync::CancellationToken};

/// 单个资源的处理结果，失败时也可能已经占用了保存路径。
struct Attempt {
    saved_path: Option<PathBuf>,
    result: AppResult<Option<EncryptionState>>,
}

/// `TaskProcessor` 封装了处理单个下载任务的所有逻辑。
pub(super) struct TaskProcessor {
    client: Arc<RobustClient>,
    video: Arc<SegmentedVideoDownloader>,
    output_dir: PathBuf,
    options: BatchOptions,
    progress: Arc<BatchProgress>,
    cancel: CancellationToken,
}

impl TaskProcessor {
    pub(super) fn new(
        client: Arc<RobustClient>,
        video: Arc<SegmentedVideoDownloader>,
        output_dir: PathBuf,
        options: BatchOptions,
        progress: Arc<BatchProgress>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            video,
            output_dir,
            options,
            progress,
            cancel,
        }
    }

    pub(super) fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    /// 处理单个资源，任何错误都转为失败的结果，不会向上传播。
    pub(super) async fn process(&self, descriptor: &ResourceDescriptor) -> DownloadOutcome {
        let url = descriptor.fetch_url(&self.options.headers);
        debug!("开始下载 '{}': {}", descriptor.title, url);

        let attempt = if self.options.is_video || descriptor.is_video() {
            self.download_video(descriptor, url).await
        } else {
            self.download_standard_file(descriptor, url).await
        };

        let (success, status, encryption, message) = match attempt.result {
            Ok(encryption) => {
                info!("'{}' 下载完成: {:?}", descriptor.title, attempt.saved_path);
                (true, DownloadStatus::Success, encryption, None)
            }
            Err(e) => {
                error!("处理任务 '{}' 时发生错误: {}", descriptor.title, e);
                (false, DownloadStatus::from(&e), None, Some(e.to_string()))
            }
        };

        DownloadOutcome {
            timestamp: Local::now(),
            success,
            status,
            size: descriptor.size,
            saved_path: attempt.saved_path,
            source_url: descriptor.raw_url.clone(),
            extra_url: descriptor.url.clone(),
            title: descriptor.title.clone(),
            encryption,
            message,
        }
    }

    /// 先确认响应为 200 再占用文件名，失败时保留已写入的部分文件。
    async fn download_standard_file(&self, descriptor: &ResourceDescriptor, url: &str) -> Attempt {
        let res = match self.client.get(url, &self.options.headers, &self.cancel).await {
            Ok(res) => res,
            Err(e) => {
                return Attempt {
                    saved_path: None,
                    result: Err(e),
                };
            }
        };
        let (path, file) = match utils::reserve_save_path(&self.output_dir, &descriptor.title, &descriptor.format) {
            Ok(reserved) => reserved,
            Err(e) => {
                return Attempt {
                    saved_path: None,
                    result: Err(e.into()),
                };
            }
        };
        let result = self.stream_to_file(res, file).await.map(|written| {
            debug!("'{}' 写入 {} 字节", descriptor.title, written);
            None
        });
        Attempt {
            saved_path: Some(path),
            result,
        }
    }

    /// 以固定大小的缓冲区把响应体写入文件，每写一块累加一次字节计数。
    async fn stream_to_file(&self, res: Response, file: File) -> AppResult<u64> {
        let stream = res.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
        let mut reader = StreamReader::new(Box::pin(stream));
        let mut file = tokio::fs::File::from_std(file);
        let mut buffer = vec![0u8; constants::DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = cancellable(&self.cancel, async {
                reader.read(&mut buffer).await.map_err(read_error)
            })
            .await?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).await?;
            written += n as u64;
            self.progress.bytes.fetch_add(n as u64, Ordering::Relaxed);
        }
        file.flush().await?;
        Ok(written)
    }

    /// 视频先占用最终文件名，合并成功后覆盖；失败时删除占位文件。
    async fn download_video(&self, descriptor: &ResourceDescriptor, url: &str) -> Attempt {
        let path = match utils::reserve_save_path(&self.output_dir, &descriptor.title, &descriptor.format) {
            Ok((path, _placeholder)) => path,
            Err(e) => {
                return Attempt {
                    saved_path: None,
                    result: Err(e.into()),
                };
            }
        };

        let result = self
            .video
            .download(
                url,
                &path,
                &self.options.headers,
                self.options.max_concurrency,
                self.progress.bytes.clone(),
                &self.cancel,
            )
            .await;

        match result {
            Ok(video) => Attempt {
                saved_path: Some(path),
                result: Ok(Some(video.encryption)),
            },
            Err(e) => {
                remove_placeholder(&path);
                Attempt {
                    saved_path: None,
                    result: Err(e),
                }
            }
        }
    }
}

/// 读取响应体的错误里若包着网络错误，还原为网络错误以便正确分类。
fn read_error(e: io::Error) -> AppError {
    if e.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>()) {
        if let Some(inner) = e.into_inner()
            && let Ok(err) = inner.downcast::<reqwest::Error>()
        {
            return AppError::Network(*err);
        }
        return AppError::Other(anyhow::anyhow!("读取响应体失败"));
    }
    AppError::Io(e)
}

fn remove_placeholder(path: &Path) {
    if path.metadata().is_ok_and(|m| m.len() == 0)
        && let Err(e) = std::fs::remove_file(path)
    {
        debug!("删除占位文件 {:?} 失败: {}", path, e);
    }
}
