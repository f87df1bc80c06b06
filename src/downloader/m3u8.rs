// src/downloader/m3u8.rs

use super::key_exchange;
use crate::{
    client::RobustClient,
    error::*,
    models::{EncryptionContext, EncryptionState, RequestHeaders, SegmentTask},
    utils,
};
use dashmap::DashMap;
use futures::{StreamExt, stream};
use log::{debug, info, warn};
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// 一次视频下载的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDownload {
    pub segments: usize,
    pub encryption: EncryptionState,
}

/// 合并阶段使用的解密参数
#[derive(Debug, Clone)]
pub struct SegmentCipher {
    pub key: Vec<u8>,
    /// 播放列表声明的 IV；缺省时按媒体序号推导
    pub iv: Option<Vec<u8>>,
    pub media_sequence: u64,
}

impl SegmentCipher {
    fn iv_for(&self, index: usize) -> Vec<u8> {
        match &self.iv {
            Some(iv) => iv.clone(),
            None => key_exchange::default_iv(self.media_sequence + index as u64).to_vec(),
        }
    }
}

pub fn segment_file_name(index: usize) -> String {
    format!("{:05}.ts", index)
}

/// 播放列表地址截至最后一个 `/`（含）。
fn base_url_of(playlist_url: &str) -> &str {
    match playlist_url.rfind('/') {
        Some(pos) => &playlist_url[..=pos],
        None => playlist_url,
    }
}

pub struct SegmentedVideoDownloader {
    client: Arc<RobustClient>,
    scratch_root: PathBuf,
    /// 同一基地址的视频共用临时目录，持锁期间独占
    scratch_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl SegmentedVideoDownloader {
    pub fn new(client: Arc<RobustClient>) -> Self {
        Self {
            client,
            scratch_root: std::env::temp_dir(),
            scratch_locks: DashMap::new(),
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// 下载、解密并按播放列表顺序合并为 `output`。
    ///
    /// 密钥握手失败不会中止下载，结果中以 [`EncryptionState::PossiblyUndecrypted`] 标记。
    /// 任一分片失败则整个视频失败，`output` 不会被写入。
    pub async fn download(
        &self,
        playlist_url: &str,
        output: &Path,
        headers: &RequestHeaders,
        max_concurrency: usize,
        downloaded: Arc<AtomicU64>,
        cancel: &CancellationToken,
    ) -> AppResult<VideoDownload> {
        let url = Url::parse(playlist_url)?;
        let body = self.client.fetch_bytes(url.as_str(), headers, cancel).await?;
        let playlist = match m3u8_rs::parse_playlist_res(&body) {
            Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => media,
            Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => {
                return Err(AppError::M3u8Parse("预期的M3U8文件不是媒体播放列表".to_string()));
            }
            Err(e) => return Err(AppError::M3u8Parse(format!("解析 M3U8 播放列表失败: {}", e))),
        };

        let segments = playlist
            .segments
            .iter()
            .enumerate()
            .map(|(index, seg)| {
                Ok(SegmentTask {
                    index,
                    url: url.join(&seg.uri)?.to_string(),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        if segments.is_empty() {
            return Err(AppError::M3u8Parse("M3U8文件不含分片".to_string()));
        }

        let context = encryption_context(&url, &playlist)?;
        let key = if context.is_declared() {
            key_exchange::try_exchange(&self.client, &context, headers, cancel).await?
        } else {
            None
        };
        let encryption = match (context.is_declared(), &key) {
            (false, _) => EncryptionState::Plain,
            (true, Some(_)) => EncryptionState::Decrypted,
            (true, None) => EncryptionState::PossiblyUndecrypted,
        };
        debug!("视频 {} 共 {} 个分片，加密状态: {:?}", playlist_url, segments.len(), encryption);

        let scratch = utils::scratch_dir_for(&self.scratch_root, base_url_of(playlist_url));
        let lock = self.scratch_locks.entry(scratch.clone()).or_default().clone();
        let _guard = lock.lock().await;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        prepare_scratch_dir(&scratch).await?;

        fetch_segments(
            &self.client,
            &segments,
            &scratch,
            headers,
            max_concurrency,
            &downloaded,
            cancel,
        )
        .await?;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let cipher = key.map(|key| SegmentCipher {
            key,
            iv: context.iv.clone(),
            media_sequence: playlist.media_sequence,
        });
        let count = segments.len();
        let scratch_for_merge = scratch.clone();
        let output_for_merge = output.to_path_buf();
        tokio::task::spawn_blocking(move || {
            merge_segments(&scratch_for_merge, count, &output_for_merge, cipher.as_ref())
        })
        .await
        .map_err(|e| AppError::Merge(format!("合并任务异常退出: {}", e)))??;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            debug!("清理临时目录 {:?} 失败: {}", scratch, e);
        }
        info!("视频已保存: {:?} ({} 个分片)", output, count);
        Ok(VideoDownload {
            segments: count,
            encryption,
        })
    }
}

/// 取第一个带 URI 的 `EXT-X-KEY`。密钥地址相对播放列表解析。
pub fn encryption_context(playlist_url: &Url, playlist: &m3u8_rs::MediaPlaylist) -> AppResult<EncryptionContext> {
    let key_info = playlist.segments.iter().find_map(|seg| match &seg.key {
        Some(m3u8_rs::Key { uri: Some(uri), iv, .. }) => Some((uri.clone(), iv.clone())),
        _ => None,
    });
    let Some((uri, iv)) = key_info else {
        return Ok(EncryptionContext::default());
    };

    let key_url = playlist_url.join(&uri)?;
    let key_id = key_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::M3u8Parse(format!("无法从密钥URL中提取文件名: {}", key_url)))?
        .to_string();
    let iv = iv
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(key_exchange::parse_iv)
        .transpose()?;
    debug!("密钥地址: {}, key_id: {}, iv: {:?}", key_url, key_id, iv.as_ref().map(hex::encode));

    Ok(EncryptionContext {
        key_url: key_url.to_string(),
        key_id,
        iv,
    })
}

async fn prepare_scratch_dir(scratch: &Path) -> AppResult<()> {
    match tokio::fs::remove_dir_all(scratch).await {
        Ok(()) => debug!("已清空临时目录 {:?}", scratch),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(scratch).await?;
    Ok(())
}

/// 有界并发下载全部分片。所有分片结束后才返回按完成顺序的第一个错误。
async fn fetch_segments(
    client: &RobustClient,
    segments: &[SegmentTask],
    scratch: &Path,
    headers: &RequestHeaders,
    max_concurrency: usize,
    downloaded: &AtomicU64,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let results: Vec<AppResult<()>> = stream::iter(segments)
        .map(|task| async move {
            let res = client.get(&task.url, headers, cancel).await?;
            let declared = res.content_length().unwrap_or(0);
            let data = crate::client::cancellable(cancel, async { Ok::<_, AppError>(res.bytes().await?) }).await?;
            tokio::fs::write(scratch.join(segment_file_name(task.index)), &data).await?;
            downloaded.fetch_add(declared, Ordering::Relaxed);
            Ok::<_, AppError>(())
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    match results.into_iter().find_map(Result::err) {
        Some(e) => {
            warn!("{} 个分片下载失败，首个错误: {}", failed, e);
            Err(e)
        }
        None => Ok(()),
    }
}

/// 按序号升序读取 `{:05}.ts`，解密后写入临时文件，全部成功才落到 `output`。
pub fn merge_segments(
    scratch: &Path,
    count: usize,
    output: &Path,
    cipher: Option<&SegmentCipher>,
) -> AppResult<()> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        for index in 0..count {
            let segment_path = scratch.join(segment_file_name(index));
            let mut data = Vec::new();
            File::open(&segment_path)
                .and_then(|mut f| f.read_to_end(&mut data))
                .map_err(|e| AppError::Merge(format!("读取分片 {:?} 失败: {}", segment_path, e)))?;
            let data = match cipher {
                Some(cipher) => key_exchange::decrypt_segment(&data, &cipher.key, &cipher.iv_for(index))?,
                None => data,
            };
            writer.write_all(&data)?;
        }
        writer.flush()?;
    }
    temp.persist(output)?;
    Ok(())
}
