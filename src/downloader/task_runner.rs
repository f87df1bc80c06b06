// src/downloader/task_runner.rs

use super::{BatchProgress, ProgressSink, task_processor::TaskProcessor};
use crate::{constants, models::*};
use futures::{StreamExt, stream};
use log::{debug, warn};
use std::{
    cmp::min,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// 以有界并发执行一批下载，结果按完成顺序返回。
pub(super) async fn execute_tasks(
    processor: &TaskProcessor,
    descriptors: &[ResourceDescriptor],
    batch_workers: usize,
    sink: &dyn ProgressSink,
) -> Vec<DownloadOutcome> {
    let workers = min(batch_workers.max(1), descriptors.len().max(1));
    debug!("批量下载并发数: {}", workers);
    let outcomes = Mutex::new(Vec::with_capacity(descriptors.len()));

    stream::iter(descriptors)
        .for_each_concurrent(workers, |descriptor| {
            run_single_concurrent_task(processor, descriptor, &outcomes, sink)
        })
        .await;

    outcomes.into_inner()
}

async fn run_single_concurrent_task(
    processor: &TaskProcessor,
    descriptor: &ResourceDescriptor,
    outcomes: &Mutex<Vec<DownloadOutcome>>,
    sink: &dyn ProgressSink,
) {
    let outcome = processor.process(descriptor).await;
    processor.progress().files.fetch_add(1, Ordering::Relaxed);

    if !outcome.success {
        let (_, _, default_msg) = outcome.status.get_display_info();
        warn!(
            "'{}' 下载失败: {} ({})",
            outcome.title,
            default_msg,
            outcome.message.as_deref().unwrap_or_default()
        );
    }
    sink.item_finished(&outcome);
    outcomes.lock().await.push(outcome);
}

/// 定时读取计数器并推送给进度回调，直到 `stop` 被触发。
pub(super) fn spawn_progress_reporter(
    progress: Arc<BatchProgress>,
    sink: Arc<dyn ProgressSink>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(constants::PROGRESS_INTERVAL_MS));
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    sink.on_progress(progress.fraction(), progress.completed(), progress.total_files);
                }
            }
        }
    })
}
