// src/downloader/mod.rs

pub mod key_exchange;
pub mod ledger;
pub mod m3u8;
mod task_processor;
mod task_runner;

pub use m3u8::{SegmentedVideoDownloader, VideoDownload};

use self::task_processor::TaskProcessor;
use crate::{
    client::RobustClient,
    constants,
    error::*,
    models::{DownloadOutcome, RequestHeaders, ResourceDescriptor},
};
use chrono::Local;
use log::{error, info, warn};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 应用到本批次每个请求的请求头
    pub headers: RequestHeaders,
    /// 是否追加写入下载台账
    pub enable_log: bool,
    /// 整批按视频处理（单个描述的格式为 m3u8 时也会按视频处理）
    pub is_video: bool,
    /// 单个视频的分片并发数
    pub max_concurrency: usize,
    /// 同时处理的资源数
    pub batch_workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            headers: RequestHeaders::new(),
            enable_log: false,
            is_video: false,
            max_concurrency: constants::DEFAULT_SEGMENT_WORKERS,
            batch_workers: constants::DEFAULT_MAX_WORKERS,
        }
    }
}

impl BatchOptions {
    pub fn new(headers: RequestHeaders) -> Self {
        Self {
            headers,
            ..Default::default()
        }
    }

    pub fn with_ledger(mut self, enable: bool) -> Self {
        self.enable_log = enable;
        self
    }

    pub fn with_video(mut self, is_video: bool) -> Self {
        self.is_video = is_video;
        self
    }

    pub fn with_segment_workers(mut self, workers: usize) -> Self {
        self.max_concurrency = workers.max(1);
        self
    }

    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers.max(1);
        self
    }
}

/// 批量任务的共享计数器，只通过原子操作更新。
#[derive(Debug, Default)]
pub struct BatchProgress {
    pub bytes: Arc<AtomicU64>,
    pub files: AtomicUsize,
    pub total_bytes: u64,
    pub total_files: usize,
}

impl BatchProgress {
    pub fn new(total_bytes: u64, total_files: usize) -> Self {
        Self {
            total_bytes,
            total_files,
            ..Default::default()
        }
    }

    pub fn completed(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    /// 按字节计算进度；总大小未知时退回按文件数计算。结果不超过 1.0。
    pub fn fraction(&self) -> f64 {
        let fraction = if self.total_bytes > 0 {
            self.bytes.load(Ordering::Relaxed) as f64 / self.total_bytes as f64
        } else if self.total_files > 0 {
            self.completed() as f64 / self.total_files as f64
        } else {
            1.0
        };
        fraction.min(1.0)
    }
}

/// 调用方的进度回调。`batch_started`/`batch_finished` 用于禁用和恢复调用方的控件。
pub trait ProgressSink: Send + Sync {
    fn batch_started(&self, _total_files: usize, _total_bytes: u64) {}
    fn on_progress(&self, fraction: f64, completed: usize, total: usize);
    fn item_finished(&self, _outcome: &DownloadOutcome) {}
    fn batch_finished(&self, _report: &BatchReport) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _fraction: f64, _completed: usize, _total: usize) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64, usize, usize) + Send + Sync,
{
    fn on_progress(&self, fraction: f64, completed: usize, total: usize) {
        self(fraction, completed, total)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub success: usize,
    pub failed: usize,
    /// 按完成顺序排列
    pub outcomes: Vec<DownloadOutcome>,
    pub ledger_path: Option<PathBuf>,
    pub cancelled: bool,
}

impl BatchReport {
    /// 声明了加密但未能取得密钥、按原样保存的视频
    pub fn undecrypted(&self) -> Vec<&DownloadOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.possibly_undecrypted())
            .collect()
    }

    pub fn failures(&self) -> Vec<&DownloadOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }
}

pub struct DownloadManager {
    client: Arc<RobustClient>,
    video: Arc<SegmentedVideoDownloader>,
    output_dir: PathBuf,
}

impl DownloadManager {
    pub fn new(client: Arc<RobustClient>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            video: Arc::new(SegmentedVideoDownloader::new(client.clone())),
            client,
            output_dir: output_dir.into(),
        }
    }

    /// 视频分片的临时目录根，默认是系统临时目录。
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.video = Arc::new(SegmentedVideoDownloader::new(self.client.clone()).with_scratch_root(root));
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 执行一批下载。只有下载目录无法创建时返回错误，单个资源失败只计入结果。
    pub async fn run(
        &self,
        descriptors: &[ResourceDescriptor],
        options: &BatchOptions,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> AppResult<BatchReport> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| {
            error!("下载目录创建失败 {:?}: {}", self.output_dir, source);
            AppError::OutputDir {
                path: self.output_dir.display().to_string(),
                source,
            }
        })?;

        let total_bytes: u64 = descriptors.iter().map(ResourceDescriptor::known_size).sum();
        info!("开始下载 {} 个资源，总大小 {} 字节", descriptors.len(), total_bytes);
        let progress = Arc::new(BatchProgress::new(total_bytes, descriptors.len()));
        sink.batch_started(descriptors.len(), total_bytes);

        let stop = CancellationToken::new();
        let reporter = task_runner::spawn_progress_reporter(progress.clone(), sink.clone(), stop.clone());

        let processor = TaskProcessor::new(
            self.client.clone(),
            self.video.clone(),
            self.output_dir.clone(),
            options.clone(),
            progress.clone(),
            cancel.clone(),
        );
        let outcomes = task_runner::execute_tasks(&processor, descriptors, options.batch_workers, sink.as_ref()).await;

        stop.cancel();
        if let Err(e) = reporter.await {
            warn!("进度报告任务异常退出: {}", e);
        }
        sink.on_progress(1.0, progress.completed(), descriptors.len());

        let success = outcomes.iter().filter(|o| o.success).count();
        let mut report = BatchReport {
            success,
            failed: outcomes.len() - success,
            outcomes,
            ledger_path: None,
            cancelled: cancel.is_cancelled(),
        };
        info!("下载完成：成功/失败 = {}/{}", report.success, report.failed);
        for outcome in report.undecrypted() {
            warn!("视频可能未解密: {}", outcome.title);
        }

        if options.enable_log {
            let block = ledger::format_block(&report.outcomes, report.success, report.failed, &Local::now());
            match ledger::append(&self.output_dir, &block) {
                Ok(path) => report.ledger_path = Some(path),
                Err(e) => error!("写入下载台账失败: {}", e),
            }
        }

        sink.batch_finished(&report);
        Ok(report)
    }
}
