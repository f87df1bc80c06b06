// src/client.rs

use crate::{config::AppConfig, error::*, models::RequestHeaders};
use log::debug;
use reqwest::{Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// 带重试、超时和取消支持的 HTTP 客户端。
#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
}

impl RobustClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(30))
            .build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .connect_timeout(config.connect_timeout)
                .timeout(config.timeout)
                .pool_max_idle_per_host(config.max_workers.max(config.segment_workers) * 2)
                .build()?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        Ok(Self { client })
    }

    /// 发送 GET 请求，只接受 200 状态码。
    pub async fn get(
        &self,
        url: &str,
        headers: &RequestHeaders,
        cancel: &CancellationToken,
    ) -> AppResult<Response> {
        let mut request = self.client.get(url);
        for (name, value) in headers.iter_active() {
            request = request.header(name, value);
        }
        let res = cancellable(cancel, async { Ok::<_, AppError>(request.send().await?) }).await?;
        debug!("GET {} -> {}", url, res.status());
        if res.status() != StatusCode::OK {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: res.status(),
            });
        }
        Ok(res)
    }

    pub async fn fetch_bytes(
        &self,
        url: &str,
        headers: &RequestHeaders,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<u8>> {
        let res = self.get(url, headers, cancel).await?;
        cancellable(cancel, async { Ok::<_, AppError>(res.bytes().await?.to_vec()) }).await
    }

    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &RequestHeaders,
        cancel: &CancellationToken,
    ) -> AppResult<T> {
        let body = self.fetch_bytes(url, headers, cancel).await?;
        serde_json::from_slice(&body).map_err(|source| AppError::ApiParseFailed {
            url: url.to_string(),
            source,
        })
    }
}

/// 在取消令牌触发时放弃等待中的操作。
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        res = fut => res,
    }
}
